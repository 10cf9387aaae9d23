// author: kodeholic (powered by Claude)

use serde::{Deserialize, Serialize};

/// 릴레이가 발급하는 참가자 식별자
pub type ParticipantId = u32;

// ----------------------------------------------------------------------------
// [공통] 릴레이 패킷 봉투 (Envelope)
// ----------------------------------------------------------------------------

/// 모든 WebSocket 메시지의 최상위 구조체
/// body는 외부 태그 방식(camelCase)으로 펼쳐지고, peer는 mesh 구성에서만 붙습니다.
///
/// 예시:
///   { "offer": "v=0..." }                : 릴레이가 상대인 경우
///   { "peer": 7, "answer": "v=0..." }     : mesh: 송신 시 "to", 수신 시 "from"
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope<M> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<ParticipantId>,
    #[serde(flatten)]
    pub body: M,
}

impl<M> Envelope<M> {
    pub fn new(peer: Option<ParticipantId>, body: M) -> Self {
        Self { peer, body }
    }

    /// 릴레이 자신을 상대로 하는 봉투 (peer 없음)
    pub fn relay(body: M) -> Self {
        Self { peer: None, body }
    }
}

pub type ClientEnvelope = Envelope<ClientMessage>;
pub type ServerEnvelope = Envelope<ServerMessage>;

// ----------------------------------------------------------------------------
// [C→R] 피어 → 릴레이
// ----------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Candidate(CandidateInit),
    Offer(String),
    Answer(String),
    /// 자기 소개 (표시 이름)
    Name(String),
    /// 화면 복구 요청: 대상 트랙 소유자의 participant id
    Pli(ParticipantId),
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Candidate(_) => "CANDIDATE",
            ClientMessage::Offer(_)     => "OFFER",
            ClientMessage::Answer(_)    => "ANSWER",
            ClientMessage::Name(_)      => "NAME",
            ClientMessage::Pli(_)       => "PLI",
        }
    }
}

// ----------------------------------------------------------------------------
// [R→C] 릴레이 → 피어
// ----------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    Candidate(CandidateInit),
    Offer(String),
    Answer(String),
    /// 릴레이가 발급한 본인 id
    Id(ParticipantId),
    /// 접속 시점의 참가자 스냅샷
    Peers(Vec<Participant>),
    PeerJoined(Participant),
    PeerLeft(ParticipantId),
    /// mesh 전용: 상대가 우리 비디오의 새 기준 프레임을 요청
    Pli(ParticipantId),
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Candidate(_)  => "CANDIDATE",
            ServerMessage::Offer(_)      => "OFFER",
            ServerMessage::Answer(_)     => "ANSWER",
            ServerMessage::Id(_)         => "ID",
            ServerMessage::Peers(_)      => "PEERS",
            ServerMessage::PeerJoined(_) => "PEER_JOINED",
            ServerMessage::PeerLeft(_)   => "PEER_LEFT",
            ServerMessage::Pli(_)        => "PLI",
        }
    }
}

// ----------------------------------------------------------------------------
// [공통] 페이로드 타입
// ----------------------------------------------------------------------------

/// 네트워크 도달 후보: 엔진은 내용을 해석하지 않고 그대로 전달
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInit {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl CandidateInit {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate:         candidate.into(),
            sdp_mid:           None,
            sdp_mline_index:   None,
            username_fragment: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Participant {
    pub id:   ParticipantId,
    #[serde(default, alias = "displayName")]
    pub name: String,
}

impl Participant {
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relay_envelope_omits_peer() {
        let env = ClientEnvelope::relay(ClientMessage::Offer("v=0".into()));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({ "offer": "v=0" }));
    }

    #[test]
    fn addressed_envelope_carries_peer() {
        let env = ClientEnvelope::new(Some(7), ClientMessage::Pli(3));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({ "peer": 7, "pli": 3 }));
    }

    #[test]
    fn server_messages_parse_from_wire() {
        let env: ServerEnvelope = serde_json::from_str(r#"{"peerLeft":7}"#).unwrap();
        assert_eq!(env.peer, None);
        assert_eq!(env.body, ServerMessage::PeerLeft(7));

        let env: ServerEnvelope =
            serde_json::from_str(r#"{"peers":[{"id":1,"name":"alice"},{"id":2}]}"#).unwrap();
        match env.body {
            ServerMessage::Peers(list) => {
                assert_eq!(list.len(), 2);
                assert_eq!(list[0].name, "alice");
                assert_eq!(list[1].name, "");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn candidate_uses_browser_field_names() {
        let raw = r#"{"peer":4,"candidate":{"candidate":"candidate:1 1 udp 1 10.0.0.1 5000 typ host","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"abcd"}}"#;
        let env: ServerEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.peer, Some(4));
        match env.body {
            ServerMessage::Candidate(c) => {
                assert_eq!(c.sdp_mid.as_deref(), Some("0"));
                assert_eq!(c.sdp_mline_index, Some(0));
                assert_eq!(c.username_fragment.as_deref(), Some("abcd"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn participant_accepts_display_name_alias() {
        let p: Participant = serde_json::from_str(r#"{"id":9,"displayName":"bob"}"#).unwrap();
        assert_eq!(p, Participant::new(9, "bob"));
    }

    #[test]
    fn unknown_message_is_rejected() {
        let res: Result<ServerEnvelope, _> = serde_json::from_str(r#"{"rollback":null}"#);
        assert!(res.is_err());
    }
}
