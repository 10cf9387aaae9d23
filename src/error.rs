// author: kodeholic (powered by Claude)

use std::fmt;

#[derive(Debug)]
pub enum RtcError {
    // 협상 (capability가 description/candidate를 거부: 세션은 계속)
    Negotiation(String),
    ProtocolViolation(String),

    // 세션 수명주기
    MediaAcquisition(String),
    RelayClosed,
    SessionClosed,
    Transport(String),

    // 릴레이 / 페이로드
    InvalidPayload(String),
    InvalidRoomCode(String),
    RoomNotFound(String),
    RoomFull(String),

    // 내부
    InternalError(String),
    IoError(std::io::Error),
}

impl fmt::Display for RtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtcError::Negotiation(msg)       => write!(f, "Negotiation failed: {}", msg),
            RtcError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            RtcError::MediaAcquisition(msg)  => write!(f, "Cannot acquire local media: {}", msg),
            RtcError::RelayClosed            => write!(f, "Relay channel closed"),
            RtcError::SessionClosed          => write!(f, "Session already closed"),
            RtcError::Transport(msg)         => write!(f, "Relay transport error: {}", msg),
            RtcError::InvalidPayload(msg)    => write!(f, "Invalid payload: {}", msg),
            RtcError::InvalidRoomCode(code)  => write!(f, "Invalid room code: {}", code),
            RtcError::RoomNotFound(code)     => write!(f, "Room not found: {}", code),
            RtcError::RoomFull(code)         => write!(f, "Capacity exceeded for room: {}", code),
            RtcError::InternalError(msg)     => write!(f, "Internal error: {}", msg),
            RtcError::IoError(err)           => write!(f, "Network I/O error: {}", err),
        }
    }
}

impl std::error::Error for RtcError {}

impl From<std::io::Error> for RtcError {
    fn from(err: std::io::Error) -> Self {
        RtcError::IoError(err)
    }
}

impl From<serde_json::Error> for RtcError {
    fn from(err: serde_json::Error) -> Self {
        RtcError::InvalidPayload(err.to_string())
    }
}

pub type RtcResult<T> = Result<T, RtcError>;
