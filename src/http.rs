// author: kodeholic (powered by Claude)
//
// HTTP REST API
//
// GET /code               → 새 룸 코드 발급
// GET /admin/...          → admin.rs
// GET /trace[/{code}]     → trace.rs (SSE)

pub mod admin;
pub mod dto;
pub mod state;
pub mod trace;

use axum::{response::IntoResponse, Json};

use crate::protocol::code;

pub use admin::{admin_get_room, admin_list_rooms, admin_status};
pub use state::HttpState;
pub use trace::trace_stream;

/// GET /code
/// 아직 아무도 쓰지 않았을 가능성이 높은 임의 코드: 룸은 첫 입장 시 생성
pub async fn new_code() -> impl IntoResponse {
    Json(dto::RoomCode { code: code::generate() })
}
