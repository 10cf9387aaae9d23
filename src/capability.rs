// author: kodeholic (powered by Claude)
// 외부 협력자 경계: 미디어 협상 능력(capability)과 화면 표시(presentation)
//
// 엔진은 SDP / candidate 내용을 절대 해석하지 않습니다.
//   MediaEngine     : 로컬 미디어 확보 + 상대별 MediaNegotiator 생성
//   MediaNegotiator : offer/answer 생성, description 적용, candidate 적용, 통계
//   Presentation    : 미디어 표면 attach/detach (엔진으로 되먹임 없음)
//
// capability 이벤트(icecandidate / track / 연결상태 / negotiationNeeded)는
// connect() 시 넘겨준 MediaEventTx로 보고됩니다.

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::Partner;
use crate::error::RtcResult;
use crate::protocol::{CandidateInit, ParticipantId};

// ----------------------------------------------------------------------------
// [Session Description]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
    /// 아직 수락되지 않은 로컬 offer 폐기 (glare 해소용)
    Rollback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp:  String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpKind::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpKind::Answer, sdp: sdp.into() }
    }

    pub fn rollback() -> Self {
        Self { kind: SdpKind::Rollback, sdp: String::new() }
    }
}

// ----------------------------------------------------------------------------
// [미디어 타입]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaStream {
    pub id: String,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub id:   String,
    pub kind: TrackKind,
}

/// 로컬 오디오/비디오: 세션 open 시 확보, close 시 반납
#[derive(Debug, Clone)]
pub struct LocalMedia {
    pub stream: MediaStream,
    pub tracks: Vec<LocalTrack>,
}

/// getStats() 보고서 한 건: LossProbe가 보는 필드만
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub kind:                TrackKind,
    pub inbound:             bool,
    pub decoded_frame_count: u64,
    pub track_identifier:    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

// ----------------------------------------------------------------------------
// [capability 이벤트]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum MediaEventKind {
    /// None = 후보 수집 종료
    IceCandidate(Option<CandidateInit>),
    Track {
        stream:   MediaStream,
        kind:     TrackKind,
        track_id: String,
    },
    ConnectionState(ConnectionState),
    NegotiationNeeded,
}

#[derive(Debug, Clone)]
pub struct MediaEvent {
    pub partner: Partner,
    pub kind:    MediaEventKind,
}

impl MediaEvent {
    pub fn new(partner: Partner, kind: MediaEventKind) -> Self {
        Self { partner, kind }
    }
}

pub type MediaEventTx = mpsc::Sender<MediaEvent>;
pub type MediaEventRx = mpsc::Receiver<MediaEvent>;

// ----------------------------------------------------------------------------
// [Traits]
// ----------------------------------------------------------------------------

/// 상대 하나와의 미디어 협상 능력 (RTCPeerConnection 상당)
#[async_trait]
pub trait MediaNegotiator: Send + Sync {
    async fn create_offer(&self) -> RtcResult<String>;

    async fn create_answer(&self) -> RtcResult<String>;

    async fn set_local_description(&self, desc: SessionDescription) -> RtcResult<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> RtcResult<()>;

    async fn add_candidate(&self, candidate: CandidateInit) -> RtcResult<()>;

    async fn get_stats(&self) -> RtcResult<Vec<StatsReport>>;

    /// 상대가 우리 비디오의 새 기준 프레임을 요청 (mesh PLI 수신)
    async fn request_keyframe(&self) -> RtcResult<()> {
        Ok(())
    }

    async fn close(&self);
}

#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// 실패 시 세션 시작 자체가 실패
    async fn acquire_local_media(&self) -> RtcResult<LocalMedia>;

    async fn release_local_media(&self, media: LocalMedia);

    async fn connect(
        &self,
        partner: Partner,
        local:   &LocalMedia,
        events:  MediaEventTx,
    ) -> RtcResult<Arc<dyn MediaNegotiator>>;
}

/// 화면 표시 협력자: participant 식별이 안 되는 트랙은 None으로 attach
pub trait Presentation: Send + Sync {
    fn attach_surface(
        &self,
        participant:  Option<ParticipantId>,
        stream:       &MediaStream,
        kind:         TrackKind,
        display_name: Option<&str>,
    );

    fn detach_surface(&self, participant: ParticipantId);
}
