// author: kodeholic (powered by Claude)
// Admin REST API 핸들러
//
//   GET /admin/status        → 릴레이 상태 요약
//   GET /admin/rooms         → Room 전체 목록
//   GET /admin/rooms/{code}  → Room 상세 (멤버 목록)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::error::RtcError;
use crate::utils::current_timestamp;

use super::dto::*;
use super::state::HttpState;

/// GET /admin/status
pub async fn admin_status(State(state): State<HttpState>) -> impl IntoResponse {
    let uptime_secs = current_timestamp().saturating_sub(state.start_time_ms) / 1000;

    Json(ServerStatus {
        uptime_secs,
        room_count:   state.room_hub.count(),
        member_count: state.room_hub.member_count(),
    })
}

/// GET /admin/rooms
pub async fn admin_list_rooms(State(state): State<HttpState>) -> impl IntoResponse {
    let mut list: Vec<AdminRoomSummary> = state.room_hub
        .all_rooms()
        .into_iter()
        .map(|room| AdminRoomSummary {
            code:         room.code.clone(),
            member_count: room.member_count(),
            capacity:     room.capacity,
            created_at:   room.created_at,
        })
        .collect();
    list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(list)
}

/// GET /admin/rooms/{code}
pub async fn admin_get_room(
    State(state): State<HttpState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    let room = match state.room_hub.get(&code) {
        Some(r) => r,
        None => return (StatusCode::NOT_FOUND, Json(serde_json::json!({
            "error": RtcError::RoomNotFound(code.clone()).to_string()
        }))).into_response(),
    };

    let now = current_timestamp();
    let members: Vec<AdminMember> = room.participants()
        .into_iter()
        .filter_map(|p| room.member(p.id))
        .map(|m| AdminMember {
            id:        m.id,
            name:      m.name(),
            joined_at: m.joined_at,
            age_secs:  now.saturating_sub(m.joined_at) / 1000,
        })
        .collect();

    Json(AdminRoomDetail {
        code:       room.code.clone(),
        capacity:   room.capacity,
        created_at: room.created_at,
        members,
    }).into_response()
}
