// author: kodeholic (powered by Claude)
// 룸 코드: "abc-def-ghi" (소문자 9자 + 3/7번째 자리 '-')

use rand::Rng;

use crate::config::ROOM_CODE_LEN;
use crate::error::{RtcError, RtcResult};

pub fn is_valid(code: &str) -> bool {
    if code.len() != ROOM_CODE_LEN {
        return false;
    }
    code.bytes().enumerate().all(|(i, c)| match i {
        3 | 7 => c == b'-',
        _     => c.is_ascii_lowercase(),
    })
}

/// 형식 검증 후 소유 문자열로 반환: 릴레이 핸들러 진입부에서 사용
pub fn parse(code: &str) -> RtcResult<String> {
    if is_valid(code) {
        Ok(code.to_string())
    } else {
        Err(RtcError::InvalidRoomCode(code.to_string()))
    }
}

pub fn generate() -> String {
    let mut rng  = rand::thread_rng();
    let mut code = String::with_capacity(ROOM_CODE_LEN);
    for i in 0..9 {
        code.push(rng.gen_range(b'a'..=b'z') as char);
        if i == 2 || i == 5 {
            code.push('-');
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate();
            assert!(is_valid(&code), "invalid code generated: {}", code);
        }
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(is_valid("abc-def-ghi"));
        assert!(!is_valid("abc-def-gh"));
        assert!(!is_valid("abcdefghijk"));
        assert!(!is_valid("ABC-def-ghi"));
        assert!(!is_valid("ab1-def-ghi"));
        assert!(!is_valid("abc_def-ghi"));
    }

    #[test]
    fn parse_maps_to_error() {
        assert_eq!(parse("xyz-xyz-xyz").unwrap(), "xyz-xyz-xyz");
        assert!(matches!(parse("nope"), Err(RtcError::InvalidRoomCode(_))));
    }
}
