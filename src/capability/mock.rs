// author: kodeholic (powered by Claude)
// 테스트용 in-memory capability: 호출 이력을 기록하고 브라우저의 기본 규칙을 흉내냄
//   - remote description 없이 add_candidate → 에러
//   - 대기 중인 로컬 offer 없이 rollback → 에러
//   - fail_offer 설정 시 create_offer 실패 (로컬 트랙 없음 상황)

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    LocalMedia, LocalTrack, MediaEngine, MediaEvent, MediaEventKind, MediaEventTx, MediaNegotiator,
    MediaStream, Presentation, SdpKind, SessionDescription, StatsReport, TrackKind,
};
use crate::core::Partner;
use crate::error::{RtcError, RtcResult};
use crate::protocol::{CandidateInit, ParticipantId};

#[derive(Debug, Clone, PartialEq)]
pub enum NegotiatorCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(CandidateInit),
    GetStats,
    RequestKeyframe,
    Close,
}

// ----------------------------------------------------------------------------
// [MockNegotiator]
// ----------------------------------------------------------------------------

pub struct MockNegotiator {
    label:           String,
    calls:           Mutex<Vec<NegotiatorCall>>,
    scripted:        Mutex<VecDeque<String>>,
    seq:             AtomicUsize,
    has_remote:      AtomicBool,
    offer_pending:   AtomicBool,
    fail_offer:      AtomicBool,
    fail_answer:     AtomicBool,
    fail_remote:     AtomicBool,
    fail_rollback:   AtomicBool,
    rejected:        Mutex<HashSet<String>>,
    stats:           Mutex<Vec<StatsReport>>,
    call_delay:      Mutex<Duration>,
    in_flight:       AtomicUsize,
    max_in_flight:   AtomicUsize,
}

impl MockNegotiator {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label:         label.into(),
            calls:         Mutex::new(Vec::new()),
            scripted:      Mutex::new(VecDeque::new()),
            seq:           AtomicUsize::new(0),
            has_remote:    AtomicBool::new(false),
            offer_pending: AtomicBool::new(false),
            fail_offer:    AtomicBool::new(false),
            fail_answer:   AtomicBool::new(false),
            fail_remote:   AtomicBool::new(false),
            fail_rollback: AtomicBool::new(false),
            rejected:      Mutex::new(HashSet::new()),
            stats:         Mutex::new(Vec::new()),
            call_delay:    Mutex::new(Duration::ZERO),
            in_flight:     AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// 다음 create_offer/create_answer가 돌려줄 SDP 지정 (FIFO)
    pub fn script_sdp(&self, sdp: impl Into<String>) {
        self.scripted.lock().unwrap().push_back(sdp.into());
    }

    pub fn set_fail_offer(&self, fail: bool) {
        self.fail_offer.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_answer(&self, fail: bool) {
        self.fail_answer.store(fail, Ordering::SeqCst);
    }

    /// set_remote_description 거부 (offer/answer 공통)
    pub fn set_fail_remote(&self, fail: bool) {
        self.fail_remote.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_rollback(&self, fail: bool) {
        self.fail_rollback.store(fail, Ordering::SeqCst);
    }

    /// 해당 candidate 문자열은 add_candidate에서 거부
    pub fn reject_candidate(&self, candidate: &str) {
        self.rejected.lock().unwrap().insert(candidate.to_string());
    }

    pub fn set_stats(&self, reports: Vec<StatsReport>) {
        *self.stats.lock().unwrap() = reports;
    }

    /// description 관련 호출마다 지연: 임계구역 중첩 검출용
    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<NegotiatorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                NegotiatorCall::AddCandidate(c) => Some(c.candidate),
                _ => None,
            })
            .collect()
    }

    pub fn rollback_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, NegotiatorCall::SetLocal(d) if d.kind == SdpKind::Rollback))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.calls().contains(&NegotiatorCall::Close)
    }

    /// 동시에 진행된 capability 호출 수의 최대값
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: NegotiatorCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_sdp(&self, kind: &str) -> String {
        if let Some(sdp) = self.scripted.lock().unwrap().pop_front() {
            return sdp;
        }
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}-{}", self.label, kind, n)
    }

    async fn suspend(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.call_delay.lock().unwrap();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaNegotiator for MockNegotiator {
    async fn create_offer(&self) -> RtcResult<String> {
        self.record(NegotiatorCall::CreateOffer);
        self.suspend().await;
        if self.fail_offer.load(Ordering::SeqCst) {
            return Err(RtcError::Negotiation("no local tracks".into()));
        }
        Ok(self.next_sdp("offer"))
    }

    async fn create_answer(&self) -> RtcResult<String> {
        self.record(NegotiatorCall::CreateAnswer);
        self.suspend().await;
        if self.fail_answer.load(Ordering::SeqCst) {
            return Err(RtcError::Negotiation("answer creation failed".into()));
        }
        Ok(self.next_sdp("answer"))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> RtcResult<()> {
        self.record(NegotiatorCall::SetLocal(desc.clone()));
        self.suspend().await;
        match desc.kind {
            SdpKind::Offer    => self.offer_pending.store(true, Ordering::SeqCst),
            SdpKind::Answer   => {}
            SdpKind::Rollback => {
                if self.fail_rollback.load(Ordering::SeqCst) {
                    return Err(RtcError::Negotiation("rollback rejected".into()));
                }
                if !self.offer_pending.swap(false, Ordering::SeqCst) {
                    return Err(RtcError::Negotiation("nothing to roll back".into()));
                }
            }
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> RtcResult<()> {
        self.record(NegotiatorCall::SetRemote(desc.clone()));
        self.suspend().await;
        if self.fail_remote.load(Ordering::SeqCst) {
            return Err(RtcError::Negotiation(format!("remote {:?} rejected", desc.kind)));
        }
        match desc.kind {
            SdpKind::Offer if self.offer_pending.load(Ordering::SeqCst) => {
                return Err(RtcError::Negotiation("remote offer while local offer pending".into()));
            }
            SdpKind::Answer => self.offer_pending.store(false, Ordering::SeqCst),
            _ => {}
        }
        self.has_remote.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add_candidate(&self, candidate: CandidateInit) -> RtcResult<()> {
        self.record(NegotiatorCall::AddCandidate(candidate.clone()));
        if !self.has_remote.load(Ordering::SeqCst) {
            return Err(RtcError::Negotiation("remote description not set".into()));
        }
        if self.rejected.lock().unwrap().contains(&candidate.candidate) {
            return Err(RtcError::Negotiation(format!("bad candidate {}", candidate.candidate)));
        }
        Ok(())
    }

    async fn get_stats(&self) -> RtcResult<Vec<StatsReport>> {
        self.record(NegotiatorCall::GetStats);
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn request_keyframe(&self) -> RtcResult<()> {
        self.record(NegotiatorCall::RequestKeyframe);
        Ok(())
    }

    async fn close(&self) {
        self.record(NegotiatorCall::Close);
    }
}

// ----------------------------------------------------------------------------
// [MockEngine]
// ----------------------------------------------------------------------------

pub struct MockEngine {
    fail_media:  AtomicBool,
    rejected:    Mutex<HashSet<Partner>>,
    acquired:    AtomicUsize,
    released:    AtomicUsize,
    negotiators: Mutex<HashMap<Partner, Arc<MockNegotiator>>>,
    events:      Mutex<HashMap<Partner, MediaEventTx>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_media:  AtomicBool::new(false),
            rejected:    Mutex::new(HashSet::new()),
            acquired:    AtomicUsize::new(0),
            released:    AtomicUsize::new(0),
            negotiators: Mutex::new(HashMap::new()),
            events:      Mutex::new(HashMap::new()),
        })
    }

    /// 카메라/마이크 권한 거부 상황
    pub fn failing_media() -> Arc<Self> {
        let engine = Self::new();
        engine.fail_media.store(true, Ordering::SeqCst);
        engine
    }

    /// 해당 상대로의 connect 실패 (peer connection 생성 실패 상황)
    pub fn reject_partner(&self, partner: Partner) {
        self.rejected.lock().unwrap().insert(partner);
    }

    pub fn negotiator(&self, partner: Partner) -> Option<Arc<MockNegotiator>> {
        self.negotiators.lock().unwrap().get(&partner).cloned()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// capability 이벤트 주입 (icecandidate / track / negotiationNeeded ...)
    pub async fn emit(&self, partner: Partner, kind: MediaEventKind) -> bool {
        let tx = self.events.lock().unwrap().get(&partner).cloned();
        match tx {
            Some(tx) => tx.send(MediaEvent::new(partner, kind)).await.is_ok(),
            None     => false,
        }
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    async fn acquire_local_media(&self) -> RtcResult<LocalMedia> {
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(RtcError::MediaAcquisition("permission denied".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(LocalMedia {
            stream: MediaStream::new("local"),
            tracks: vec![
                LocalTrack { id: "local-audio".into(), kind: TrackKind::Audio },
                LocalTrack { id: "local-video".into(), kind: TrackKind::Video },
            ],
        })
    }

    async fn release_local_media(&self, _media: LocalMedia) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    async fn connect(
        &self,
        partner: Partner,
        _local:  &LocalMedia,
        events:  MediaEventTx,
    ) -> RtcResult<Arc<dyn MediaNegotiator>> {
        if self.rejected.lock().unwrap().contains(&partner) {
            return Err(RtcError::Negotiation(format!("connection to {} not constructed", partner)));
        }
        let negotiator = Arc::new(MockNegotiator::new(partner.to_string()));
        self.negotiators.lock().unwrap().insert(partner, Arc::clone(&negotiator));
        self.events.lock().unwrap().insert(partner, events);
        Ok(negotiator)
    }
}

// ----------------------------------------------------------------------------
// [RecordingPresentation]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Attach {
        participant:  Option<ParticipantId>,
        stream:       String,
        kind:         TrackKind,
        display_name: Option<String>,
    },
    Detach(ParticipantId),
}

#[derive(Default)]
pub struct RecordingPresentation {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingPresentation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn detached(&self) -> Vec<ParticipantId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SurfaceCall::Detach(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl Presentation for RecordingPresentation {
    fn attach_surface(
        &self,
        participant:  Option<ParticipantId>,
        stream:       &MediaStream,
        kind:         TrackKind,
        display_name: Option<&str>,
    ) {
        self.calls.lock().unwrap().push(SurfaceCall::Attach {
            participant,
            stream:       stream.id.clone(),
            kind,
            display_name: display_name.map(str::to_string),
        });
    }

    fn detach_surface(&self, participant: ParticipantId) {
        self.calls.lock().unwrap().push(SurfaceCall::Detach(participant));
    }
}
