// author: kodeholic (powered by Claude)
// 매직 넘버를 배제하고 협상 엔진 / 릴레이의 동작을 제어하는 상수 모음입니다.

use crate::core::Topology;

// ----------------------------------------------------------------------------
// 협상 엔진 (클라이언트)
// ----------------------------------------------------------------------------

/// LossProbe 실행 주기 (100ms): 프레임레이트와 무관하게 고정
pub const LOSS_PROBE_INTERVAL_MS: u64 = 100;

/// 트랙 식별자에서 participant id를 떼어내는 구분자 ("7-video" → 7)
pub const TRACK_ID_SEPARATOR: char = '-';

/// 릴레이 송신 큐 사이즈 (ClientEnvelope 단위)
pub const RELAY_QUEUE_SIZE: usize = 64;

/// 미디어 capability 이벤트 큐 사이즈
pub const MEDIA_EVENT_QUEUE_SIZE: usize = 256;

/// 표시 이름을 지정하지 않았을 때의 기본값
pub const DEFAULT_DISPLAY_NAME: &str = "anonymous";

// ----------------------------------------------------------------------------
// 릴레이 서버
// ----------------------------------------------------------------------------

/// 릴레이 WS/HTTP 공용 TCP 포트
pub const RELAY_PORT: u16 = 3000;

/// 룸당 최대 수용 인원 (mesh 기준: 인원² 만큼 연결이 생김)
pub const MAX_PEERS_PER_ROOM: usize = 16;

/// 룸 코드 길이 ("abc-def-ghi")
pub const ROOM_CODE_LEN: usize = 11;

/// 멤버별 송신(Egress) 큐 사이즈 (직렬화된 JSON 단위)
pub const EGRESS_QUEUE_SIZE: usize = 256;

// ----------------------------------------------------------------------------
// [SessionConfig] 세션 단위 설정
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 릴레이에 알릴 표시 이름 ({name})
    pub display_name:      String,
    /// 시그널링 상대 구성 (Relay = 단일 상대, Mesh = 피어별)
    pub topology:          Topology,
    /// LossProbe 주기 (ms)
    pub probe_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name:      DEFAULT_DISPLAY_NAME.to_string(),
            topology:          Topology::Relay,
            probe_interval_ms: LOSS_PROBE_INTERVAL_MS,
        }
    }
}

impl SessionConfig {
    pub fn with_name(name: impl Into<String>) -> Self {
        Self { display_name: name.into(), ..Self::default() }
    }

    pub fn mesh(mut self) -> Self {
        self.topology = Topology::Mesh;
        self
    }
}
