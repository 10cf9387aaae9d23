// author: kodeholic (powered by Claude)

pub mod capability;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod trace;
pub mod utils;

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::RtcResult;
use crate::http::HttpState;
use crate::relay::{ws_handler, AppState, RoomHub};
use crate::trace::TraceHub;

pub use crate::session::{run_session, SessionController};

/// CLI에서 주입되는 릴레이 런타임 설정 (기본값은 config.rs 상수)
pub struct RelayArgs {
    pub port: u16,
}

/// 릴레이 라우터: WS 시그널링 + 룸 코드 발급 + admin/trace
pub fn build_router(room_hub: Arc<RoomHub>, trace_hub: Arc<TraceHub>) -> Router {
    let app_state = AppState {
        room_hub:  Arc::clone(&room_hub),
        trace_hub: Arc::clone(&trace_hub),
    };

    let http_router = Router::new()
        .route("/code",                get(http::new_code))
        .route("/admin/status",        get(http::admin_status))
        .route("/admin/rooms",         get(http::admin_list_rooms))
        .route("/admin/rooms/{code}",  get(http::admin_get_room))
        .route("/trace",               get(http::trace_stream))
        .route("/trace/{code}",        get(http::trace_stream))
        .with_state(HttpState::new(room_hub, trace_hub));

    // CORS: 브라우저 클라이언트 / admin 대시보드 로컬 접속
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/signal", get(ws_handler))
        .with_state(app_state)
        .merge(http_router)
        .layer(cors)
}

pub async fn run_relay(args: RelayArgs) -> RtcResult<()> {
    let room_hub  = Arc::new(RoomHub::new());
    let trace_hub = TraceHub::new();
    let app       = build_router(room_hub, trace_hub);

    let addr     = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("[mini-rtcsession] Relay on ws://{}/signal?code=...", addr);
    info!("[mini-rtcsession] Room codes on http://{}/code", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
