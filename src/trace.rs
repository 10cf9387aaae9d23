// author: kodeholic (powered by Claude)
//
// TraceHub: 협상/릴레이 이벤트 실시간 관찰 버스
//
// 구조:
//   SignalingStateMachine / SessionController / 릴레이 핸들러
//       └── TraceHub::publish(event)
//               └── broadcast::Sender  (구독자 수에 무관하게 O(1) publish)
//                       ├── SSE subscriber (GET /trace)
//                       └── 테스트 (rollback 횟수, candidate flush 순서 검증)
//
// 구독자가 없을 때 publish는 그냥 drop
// 구독자가 느리면 lagged 에러 반환: 구독자 쪽에서 처리

use std::sync::Arc;
use tokio::sync::broadcast;
use serde::Serialize;

use crate::utils::current_timestamp;

/// 브로드캐스트 채널 버퍼 크기
const TRACE_BUF: usize = 512;

/// 이벤트 방향
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TraceDir {
    /// 상대 → 나 (릴레이 수신)
    In,
    /// 나 → 상대 (릴레이 송신)
    Out,
    /// 내부 전이 (rollback, candidate 큐잉 등)
    Sys,
}

/// 하나의 관찰 이벤트
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Unix millis
    pub ts:      u64,
    pub dir:     TraceDir,
    /// 룸 코드 (릴레이 쪽 이벤트만)
    pub room:    Option<String>,
    /// 관련 participant id (릴레이가 상대면 None)
    pub peer:    Option<u32>,
    /// 이벤트 이름 (예: "OFFER", "ROLLBACK")
    pub kind:    String,
    pub summary: String,
}

impl TraceEvent {
    pub fn new(
        dir:     TraceDir,
        room:    Option<&str>,
        peer:    Option<u32>,
        kind:    &str,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            ts:      current_timestamp(),
            dir,
            room:    room.map(str::to_string),
            peer,
            kind:    kind.to_string(),
            summary: summary.into(),
        }
    }
}

pub struct TraceHub {
    tx: broadcast::Sender<TraceEvent>,
}

impl TraceHub {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(TRACE_BUF);
        Arc::new(Self { tx })
    }

    /// 이벤트 publish: 구독자가 없으면 조용히 무시
    pub fn publish(&self, event: TraceEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.tx.subscribe()
    }
}
