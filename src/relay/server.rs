// author: kodeholic (powered by Claude)
// 릴레이 WS 핸들러: 룸 안에서 시그널링 메시지를 전달만 함 (미디어 종단 없음)
//
// GET /signal?code=abc-def-ghi
//   코드 누락/형식 오류 → 400 JSON
//   업그레이드 후: {id} → {peers} → (수신 루프)
//
// 수신 메시지 처리:
//   {name}                                → 이름 저장 + 나머지에게 {peerJoined}
//   {offer|answer|candidate|pli} + peer   → 대상에게 전달, peer는 발신자 id로 교체
//   peer 없는 미디어 시그널링             → 경고 후 버림
// 종료: 멤버 제거 → 나머지에게 {peerLeft} → 빈 룸 제거

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::room::{Member, Room, RoomHub};
use crate::config;
use crate::error::{RtcError, RtcResult};
use crate::protocol::{
    code, ClientEnvelope, ClientMessage, Participant, ParticipantId, ServerEnvelope, ServerMessage,
};
use crate::trace::{TraceDir, TraceEvent, TraceHub};

// ----------------------------------------------------------------------------
// [공유 상태]
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub room_hub:  Arc<RoomHub>,
    pub trace_hub: Arc<TraceHub>,
}

// ----------------------------------------------------------------------------
// [WS 진입점]
// ----------------------------------------------------------------------------

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let room_code = match params.get("code").map(|c| code::parse(c)) {
        Some(Ok(c))  => c,
        Some(Err(e)) => return bad_request(e),
        None         => return bad_request(RtcError::InvalidRoomCode("missing".into())),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_code))
}

fn bad_request(e: RtcError) -> Response {
    warn!("[relay] upgrade rejected: {}", e);
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

// ----------------------------------------------------------------------------
// [핵심] 멤버 1명의 WS 생명주기
// ----------------------------------------------------------------------------

async fn handle_socket(socket: WebSocket, state: AppState, room_code: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (egress_tx, mut egress_rx) = mpsc::channel::<String>(config::EGRESS_QUEUE_SIZE);

    let member = Arc::new(Member::new(state.room_hub.next_participant_id(), egress_tx));
    let me     = member.id;

    let room = match state.room_hub.join(&room_code, Arc::clone(&member)) {
        Ok((room, others)) => {
            info!("[relay] member {} joined room {} ({} others)", me, room_code, others.len());
            room
        }
        Err(e) => {
            let json = serde_json::json!({ "error": e.to_string() }).to_string();
            let _ = ws_tx.send(Message::Text(json.into())).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };
    publish(&state, &room_code, me, TraceDir::Sys, "JOIN", "");

    // [egress] 큐 → WS 송신
    let egress = tokio::spawn(async move {
        while let Some(json) = egress_rx.recv().await {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // [ingress] WS 수신 → dispatch
    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t))  => t,
            Ok(Message::Close(_)) => break,
            Err(e) => { warn!("[relay] member {} ws error: {}", me, e); break; }
            _ => continue,
        };

        let env: ClientEnvelope = match serde_json::from_str(&text) {
            Ok(env) => env,
            Err(e)  => {
                warn!("[relay] member {} sent invalid payload: {}", me, e);
                continue;
            }
        };

        if let Err(e) = dispatch(&state, &room, &member, env).await {
            error!("[relay] member {} handler error: {}", me, e);
        }
    }

    cleanup(&state, &room, me).await;
    egress.abort();
}

async fn dispatch(state: &AppState, room: &Room, member: &Member, env: ClientEnvelope) -> RtcResult<()> {
    let me = member.id;
    trace!("[relay] {} from {} (peer={:?})", env.body.kind(), me, env.peer);

    let forwarded = match env.body {
        ClientMessage::Name(name) => return handle_name(state, room, member, name).await,
        ClientMessage::Offer(sdp)     => ServerMessage::Offer(sdp),
        ClientMessage::Answer(sdp)    => ServerMessage::Answer(sdp),
        ClientMessage::Candidate(c)   => ServerMessage::Candidate(c),
        ClientMessage::Pli(id)        => ServerMessage::Pli(id),
    };

    let Some(target) = env.peer else {
        warn!("[relay] unaddressed {} from {} dropped (no media termination)", forwarded.kind(), me);
        return Ok(());
    };
    forward(state, room, me, target, forwarded).await
}

async fn handle_name(state: &AppState, room: &Room, member: &Member, name: String) -> RtcResult<()> {
    member.set_name(&name);
    debug!("[relay] member {} named '{}'", member.id, name);
    publish(state, &room.code, member.id, TraceDir::In, "NAME", &name);

    let json = serde_json::to_string(&ServerEnvelope::relay(
        ServerMessage::PeerJoined(Participant::new(member.id, name)),
    ))?;
    room.broadcast(&json, Some(member.id)).await;
    Ok(())
}

async fn forward(
    state:  &AppState,
    room:   &Room,
    from:   ParticipantId,
    to:     ParticipantId,
    body:   ServerMessage,
) -> RtcResult<()> {
    let kind = body.kind();
    let json = serde_json::to_string(&ServerEnvelope::new(Some(from), body))?;
    if !room.send_to(to, json).await {
        warn!("[relay] {} from {} to unknown member {} dropped", kind, from, to);
        return Ok(());
    }
    publish(state, &room.code, from, TraceDir::Out, kind, &format!("→ {}", to));
    Ok(())
}

async fn cleanup(state: &AppState, room: &Room, me: ParticipantId) {
    state.room_hub.leave(&room.code, me);

    let json = match serde_json::to_string(&ServerEnvelope::relay(ServerMessage::PeerLeft(me))) {
        Ok(j)  => j,
        Err(e) => { error!("[relay] peerLeft encode failed: {}", e); return; }
    };
    room.broadcast(&json, Some(me)).await;

    publish(state, &room.code, me, TraceDir::Sys, "LEAVE", "");
    info!("[relay] member {} left room {}", me, room.code);
}

fn publish(state: &AppState, room: &str, peer: ParticipantId, dir: TraceDir, kind: &str, summary: &str) {
    state.trace_hub.publish(TraceEvent::new(dir, Some(room), Some(peer), kind, summary));
}
