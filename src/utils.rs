// author: kodeholic (powered by Gemini)

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::TRACK_ID_SEPARATOR;

/// 현재 시간을 밀리초 단위의 Unix Timestamp로 반환합니다.
/// 에러 발생 시 시스템 패닉 대신 0(기본값)을 반환하여 장애를 방어합니다.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// 트랙 식별자의 첫 토큰(구분자 전까지)을 participant id로 파싱
/// "7-video" → Some(7), "video" → None
pub fn participant_of_track(track_id: &str) -> Option<u32> {
    track_id
        .split(TRACK_ID_SEPARATOR)
        .next()
        .and_then(|token| token.trim().parse().ok())
}
