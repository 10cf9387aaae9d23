// author: kodeholic (powered by Claude)
// 시그널링 상대 식별: 세션당 상대 수만큼 SignalingStateMachine이 생김

use std::fmt;

use crate::protocol::ParticipantId;

/// 시그널링 상대
///   Relay   : 릴레이가 미디어를 종단 (SFU), 봉투에 peer 없음
///   Peer(id): mesh 구성의 직접 상대, 봉투 peer = id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partner {
    Relay,
    Peer(ParticipantId),
}

impl Partner {
    /// 수신 봉투의 peer 필드 → 상대
    pub fn from_envelope(peer: Option<ParticipantId>) -> Self {
        match peer {
            Some(id) => Partner::Peer(id),
            None     => Partner::Relay,
        }
    }

    /// 송신 봉투에 실을 peer 필드
    pub fn envelope_peer(&self) -> Option<ParticipantId> {
        match self {
            Partner::Relay    => None,
            Partner::Peer(id) => Some(*id),
        }
    }
}

impl fmt::Display for Partner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partner::Relay    => write!(f, "relay"),
            Partner::Peer(id) => write!(f, "peer:{}", id),
        }
    }
}

/// 세션의 시그널링 구성
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// 릴레이 하나와만 협상 (채널 open 직후 initial offer)
    #[default]
    Relay,
    /// 참가자마다 별도 협상 (peers 스냅샷 수신 시 각자에게 offer)
    Mesh,
}
