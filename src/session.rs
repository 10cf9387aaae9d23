// author: kodeholic (powered by Claude)
// SessionController: 세션 1개의 생명주기 소유자
//
// open (릴레이 채널 열림):
//   1. 로컬 미디어 확보: 실패하면 세션 자체가 없음
//   2. 이벤트 소스 연결: 릴레이 메시지 / capability 이벤트 / LossProbe 타이머
//   3. {name} 자기소개 + (Relay 구성이면) initial offer
//
// close (릴레이 채널 닫힘: 정상/비정상 구분 없음):
//   LossProbe 정지 → 모든 SignalingStateMachine 종료 → 로컬 미디어 반납 → roster 비움
//   닫힌 세션은 재사용하지 않음: 다시 시작하려면 전부 새로 생성
//
// 상대 테이블: HashMap<Partner, Arc<SignalingStateMachine>>
//   Relay 구성: Partner::Relay 하나
//   Mesh  구성: peers 스냅샷의 각 id에 offer, 모르는 상대의 offer/candidate는 lazy 생성

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::capability::{
    ConnectionState, LocalMedia, MediaEngine, MediaEvent, MediaEventKind, MediaEventRx,
    MediaEventTx, Presentation,
};
use crate::config::{self, SessionConfig};
use crate::core::{
    LossProbe, LossProbeHandle, Partner, ProbeTarget, RelayTx, RosterManager,
    SignalingStateMachine, Topology,
};
use crate::error::{RtcError, RtcResult};
use crate::protocol::{
    ClientEnvelope, ClientMessage, Participant, ParticipantId, ServerEnvelope, ServerMessage,
};
use crate::relay::link::{RelayEvent, RelayLink};
use crate::trace::{TraceDir, TraceEvent, TraceHub};
use crate::utils::participant_of_track;

pub struct SessionController {
    config:       SessionConfig,
    engine:       Arc<dyn MediaEngine>,
    presentation: Arc<dyn Presentation>,
    roster:       RosterManager,
    relay_tx:     RelayTx,
    media_tx:     MediaEventTx,
    trace_hub:    Arc<TraceHub>,
    local:        Mutex<Option<LocalMedia>>,
    partners:     RwLock<HashMap<Partner, Arc<SignalingStateMachine>>>,
    self_id:      RwLock<Option<ParticipantId>>,
    probe:        Mutex<Option<LossProbeHandle>>,
    tasks:        Mutex<Vec<JoinHandle<()>>>,
    closed:       AtomicBool,
}

impl SessionController {
    /// 릴레이 채널 open 시 호출
    pub async fn open(
        config:       SessionConfig,
        engine:       Arc<dyn MediaEngine>,
        presentation: Arc<dyn Presentation>,
        relay_tx:     RelayTx,
        trace_hub:    Arc<TraceHub>,
    ) -> RtcResult<Arc<Self>> {
        let local = match engine.acquire_local_media().await {
            Ok(m)  => m,
            Err(e) => {
                error!("[session] local media unavailable, session not started: {}", e);
                return Err(e);
            }
        };
        debug!("[session] local media acquired ({} tracks)", local.tracks.len());

        let (media_tx, media_rx) = mpsc::channel(config::MEDIA_EVENT_QUEUE_SIZE);

        let controller = Arc::new(Self {
            roster: RosterManager::new(Arc::clone(&presentation)),
            config,
            engine,
            presentation,
            relay_tx,
            media_tx,
            trace_hub,
            local:    Mutex::new(Some(local)),
            partners: RwLock::new(HashMap::new()),
            self_id:  RwLock::new(None),
            probe:    Mutex::new(None),
            tasks:    Mutex::new(Vec::new()),
            closed:   AtomicBool::new(false),
        });

        // [media-events] capability 이벤트 → 엔진 (도착 순서대로)
        let media_task = tokio::spawn(run_media_events(Arc::downgrade(&controller), media_rx));
        controller.tasks.lock().unwrap().push(media_task);

        // [loss-probe] 타이머: lock과 무관하게 독립 실행
        let weak  = Arc::downgrade(&controller);
        let probe = LossProbe::new(controller.relay_tx.clone(), Arc::clone(&controller.trace_hub))
            .spawn(controller.config.probe_interval_ms, move || {
                weak.upgrade().map(|c| c.probe_targets()).unwrap_or_default()
            });
        *controller.probe.lock().unwrap() = Some(probe);

        let name = ClientEnvelope::relay(ClientMessage::Name(controller.config.display_name.clone()));
        if controller.relay_tx.send(name).await.is_err() {
            controller.close().await;
            return Err(RtcError::RelayClosed);
        }

        if controller.config.topology == Topology::Relay {
            let ssm = match controller.connect_partner(Partner::Relay).await {
                Ok(ssm) => ssm,
                Err(e)  => {
                    error!("[session] relay partner not connected, session not started: {}", e);
                    controller.close().await;
                    return Err(e);
                }
            };
            // 실패해도 세션은 유지: 다음 negotiationNeeded가 재시도
            if let Err(e) = ssm.send_initial_offer().await {
                warn!("[session] initial offer failed: {}", e);
            }
        }

        info!("[session] opened name='{}' topology={:?}",
            controller.config.display_name, controller.config.topology);
        Ok(controller)
    }

    // ------------------------------------------------------------------------
    // [조회]
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn roster(&self) -> &RosterManager {
        &self.roster
    }

    pub fn self_id(&self) -> Option<ParticipantId> {
        *self.self_id.read().unwrap()
    }

    pub fn partner(&self, partner: Partner) -> Option<Arc<SignalingStateMachine>> {
        self.partners.read().unwrap().get(&partner).cloned()
    }

    pub fn partners(&self) -> Vec<Partner> {
        let mut list: Vec<Partner> = self.partners.read().unwrap().keys().copied().collect();
        list.sort_by_key(|p| p.envelope_peer());
        list
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 로컬 미디어를 아직 들고 있는지
    pub fn holds_local_media(&self) -> bool {
        self.local.lock().unwrap().is_some()
    }

    // ------------------------------------------------------------------------
    // [릴레이 메시지]
    // ------------------------------------------------------------------------

    pub async fn handle_message(&self, env: ServerEnvelope) -> RtcResult<()> {
        if self.is_closed() {
            return Err(RtcError::SessionClosed);
        }
        let partner = Partner::from_envelope(env.peer);
        trace!("[session] {} from {}", env.body.kind(), partner);

        match env.body {
            ServerMessage::Id(id)           => self.on_id(id),
            ServerMessage::Peers(list)      => self.on_peers(list).await,
            ServerMessage::PeerJoined(p)    => {
                self.publish(TraceDir::In, Some(p.id), "PEER_JOINED", &p.name);
                self.roster.add(&p);
                Ok(())
            }
            ServerMessage::PeerLeft(id)     => self.on_peer_left(id).await,
            ServerMessage::Offer(sdp)       => match self.route(partner).await? {
                Some(ssm) => ssm.on_remote_offer(sdp).await,
                None      => Ok(()),
            },
            ServerMessage::Answer(sdp)      => match self.route(partner).await? {
                Some(ssm) => ssm.on_remote_answer(sdp).await,
                None      => Ok(()),
            },
            ServerMessage::Candidate(c)     => {
                if let Some(ssm) = self.route(partner).await? {
                    ssm.on_remote_candidate(c).await;
                }
                Ok(())
            }
            ServerMessage::Pli(id)          => self.on_pli(partner, id).await,
        }
    }

    fn on_id(&self, id: ParticipantId) -> RtcResult<()> {
        *self.self_id.write().unwrap() = Some(id);
        info!("[session] assigned participant id={}", id);
        Ok(())
    }

    async fn on_peers(&self, list: Vec<Participant>) -> RtcResult<()> {
        self.publish(TraceDir::In, None, "PEERS", &format!("{} participants", list.len()));
        self.roster.replace_all(&list);

        if self.config.topology != Topology::Mesh {
            return Ok(());
        }

        // 새로 들어온 쪽이 기존 참가자 각각에게 offer
        let me = self.self_id();
        for p in list.iter().filter(|p| Some(p.id) != me) {
            let ssm = match self.connect_partner(Partner::Peer(p.id)).await {
                Ok(ssm) => ssm,
                Err(e)  => {
                    warn!("[session] connect to peer {} failed: {}", p.id, e);
                    continue;
                }
            };
            if let Err(e) = ssm.send_initial_offer().await {
                warn!("[session] initial offer to peer {} failed: {}", p.id, e);
            }
        }
        Ok(())
    }

    async fn on_peer_left(&self, id: ParticipantId) -> RtcResult<()> {
        self.publish(TraceDir::In, Some(id), "PEER_LEFT", "");
        self.roster.remove(id);

        let removed = self.partners.write().unwrap().remove(&Partner::Peer(id));
        if let Some(ssm) = removed {
            ssm.close().await;
            debug!("[session] mesh partner {} closed", id);
        }
        Ok(())
    }

    /// 상대가 우리 비디오의 새 기준 프레임을 요청
    async fn on_pli(&self, partner: Partner, id: ParticipantId) -> RtcResult<()> {
        let Some(ssm) = self.partner(partner) else {
            debug!("[session] pli for unknown partner {} ignored", partner);
            return Ok(());
        };
        trace!("[session] keyframe requested by {} (pli={})", partner, id);
        self.publish(TraceDir::In, partner.envelope_peer(), "PLI", &id.to_string());
        ssm.negotiator().request_keyframe().await
    }

    /// 수신 메시지의 상대 → state machine. Mesh에서 처음 보는 peer면 새로 생성
    async fn route(&self, partner: Partner) -> RtcResult<Option<Arc<SignalingStateMachine>>> {
        if let Some(ssm) = self.partner(partner) {
            return Ok(Some(ssm));
        }
        match (self.config.topology, partner) {
            (Topology::Mesh, Partner::Peer(_)) => self.connect_partner(partner).await.map(Some),
            _ => {
                warn!("[session] message for unknown partner {} dropped ({:?} topology)",
                    partner, self.config.topology);
                Ok(None)
            }
        }
    }

    async fn connect_partner(&self, partner: Partner) -> RtcResult<Arc<SignalingStateMachine>> {
        if let Some(ssm) = self.partner(partner) {
            return Ok(ssm);
        }
        if self.is_closed() {
            return Err(RtcError::SessionClosed);
        }

        let local = self.local.lock().unwrap().clone().ok_or(RtcError::SessionClosed)?;
        let negotiator = self.engine.connect(partner, &local, self.media_tx.clone()).await?;
        let ssm = Arc::new(SignalingStateMachine::new(
            partner,
            negotiator,
            self.relay_tx.clone(),
            Arc::clone(&self.trace_hub),
        ));

        let existing = {
            let mut partners = self.partners.write().unwrap();
            match partners.get(&partner) {
                Some(existing) => Some(Arc::clone(existing)),
                None => {
                    partners.insert(partner, Arc::clone(&ssm));
                    None
                }
            }
        };
        // 동시에 누가 먼저 만들었으면 그쪽을 사용하고 이번 것은 정리
        if let Some(existing) = existing {
            ssm.close().await;
            return Ok(existing);
        }

        debug!("[session] partner {} connected", partner);
        Ok(ssm)
    }

    // ------------------------------------------------------------------------
    // [capability 이벤트]
    // ------------------------------------------------------------------------

    pub async fn handle_media_event(&self, event: MediaEvent) -> RtcResult<()> {
        if self.is_closed() {
            return Err(RtcError::SessionClosed);
        }
        let partner = event.partner;

        match event.kind {
            MediaEventKind::IceCandidate(Some(candidate)) => {
                let env = ClientEnvelope::new(partner.envelope_peer(), ClientMessage::Candidate(candidate));
                self.relay_tx.send(env).await.map_err(|_| RtcError::RelayClosed)?;
                self.publish(TraceDir::Out, partner.envelope_peer(), "CANDIDATE", "");
                Ok(())
            }
            MediaEventKind::IceCandidate(None) => {
                debug!("[session] {} candidate gathering complete", partner);
                Ok(())
            }
            MediaEventKind::Track { stream, kind, track_id } => {
                let participant = participant_of_track(&track_id).or(partner.envelope_peer());
                let name = self.roster.resolve_name(&track_id)
                    .or_else(|| participant.and_then(|id| self.roster.get(id)));
                debug!("[session] {} track '{}' ({}) → participant={:?} name={:?}",
                    partner, track_id, kind, participant, name);
                self.presentation.attach_surface(participant, &stream, kind, name.as_deref());
                Ok(())
            }
            MediaEventKind::ConnectionState(state) => {
                match state {
                    ConnectionState::Failed | ConnectionState::Disconnected =>
                        warn!("[session] {} connection {:?}", partner, state),
                    _ => debug!("[session] {} connection {:?}", partner, state),
                }
                Ok(())
            }
            MediaEventKind::NegotiationNeeded => match self.partner(partner) {
                Some(ssm) => ssm.renegotiate().await,
                None      => Ok(()),
            },
        }
    }

    // ------------------------------------------------------------------------
    // [teardown]
    // ------------------------------------------------------------------------

    /// 멱등: 두 번째 호출부터는 아무 일도 안 함
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let probe = self.probe.lock().unwrap().take();
        if let Some(probe) = probe {
            probe.stop();
        }

        let partners: Vec<Arc<SignalingStateMachine>> =
            self.partners.write().unwrap().drain().map(|(_, ssm)| ssm).collect();
        for ssm in &partners {
            ssm.close().await;
        }

        let local = self.local.lock().unwrap().take();
        if let Some(local) = local {
            self.engine.release_local_media(local).await;
        }

        self.roster.clear();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().unwrap().drain(..).collect();
        for task in tasks {
            task.abort();
        }

        self.publish(TraceDir::Sys, self.self_id(), "SESSION_CLOSED", "");
        info!("[session] closed ({} partners torn down)", partners.len());
    }

    fn probe_targets(&self) -> Vec<ProbeTarget> {
        self.partners.read().unwrap()
            .iter()
            .map(|(partner, ssm)| ProbeTarget {
                partner:    *partner,
                negotiator: Arc::clone(ssm.negotiator()),
            })
            .collect()
    }

    fn publish(&self, dir: TraceDir, peer: Option<ParticipantId>, kind: &str, summary: &str) {
        self.trace_hub.publish(TraceEvent::new(dir, None, peer, kind, summary));
    }
}

async fn run_media_events(controller: Weak<SessionController>, mut rx: MediaEventRx) {
    while let Some(event) = rx.recv().await {
        let Some(controller) = controller.upgrade() else { break };
        if let Err(e) = controller.handle_media_event(event).await {
            match e {
                RtcError::SessionClosed => break,
                e => error!("[session] media event handler error: {}", e),
            }
        }
    }
    trace!("[session] media event loop finished");
}

// ----------------------------------------------------------------------------
// [run_session] 릴레이 링크 하나로 세션 하나를 끝까지 구동
// ----------------------------------------------------------------------------

pub async fn run_session(
    config:       SessionConfig,
    engine:       Arc<dyn MediaEngine>,
    presentation: Arc<dyn Presentation>,
    mut link:     RelayLink,
    trace_hub:    Arc<TraceHub>,
) -> RtcResult<()> {
    match link.next_event().await {
        Some(RelayEvent::Open) => {}
        _ => return Err(RtcError::RelayClosed),
    }

    let controller = match SessionController::open(
        config, engine, presentation, link.sender(), trace_hub,
    ).await {
        Ok(c)  => c,
        Err(e) => {
            link.shutdown();
            return Err(e);
        }
    };

    // 릴레이 메시지는 이 태스크에서 도착 순서대로 하나씩 처리
    while let Some(event) = link.next_event().await {
        match event {
            RelayEvent::Message(env) => {
                if let Err(e) = controller.handle_message(env).await {
                    error!("[session] relay message handler error: {}", e);
                }
            }
            RelayEvent::Close => break,
            RelayEvent::Open  => {}
        }
    }

    controller.close().await;
    link.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::{MockEngine, RecordingPresentation, SurfaceCall};
    use crate::capability::{MediaStream, TrackKind};
    use crate::core::SignalingPhase;

    struct Fixture {
        controller:   Arc<SessionController>,
        engine:       Arc<MockEngine>,
        presentation: Arc<RecordingPresentation>,
        relay_rx:     mpsc::Receiver<ClientEnvelope>,
    }

    async fn open(config: SessionConfig) -> Fixture {
        let engine       = MockEngine::new();
        let presentation = RecordingPresentation::new();
        let (relay_tx, relay_rx) = mpsc::channel(64);
        let controller = SessionController::open(
            config,
            Arc::clone(&engine) as Arc<dyn MediaEngine>,
            Arc::clone(&presentation) as Arc<dyn Presentation>,
            relay_tx,
            TraceHub::new(),
        ).await.unwrap();
        Fixture { controller, engine, presentation, relay_rx }
    }

    fn server(peer: Option<ParticipantId>, body: ServerMessage) -> ServerEnvelope {
        ServerEnvelope::new(peer, body)
    }

    #[tokio::test]
    async fn open_announces_name_then_offers() {
        let mut f = open(SessionConfig::with_name("alice")).await;

        let first = f.relay_rx.recv().await.unwrap();
        assert_eq!(first, ClientEnvelope::relay(ClientMessage::Name("alice".into())));
        let second = f.relay_rx.recv().await.unwrap();
        assert!(matches!(second.body, ClientMessage::Offer(_)));
        assert_eq!(second.peer, None);

        assert_eq!(f.controller.partners(), vec![Partner::Relay]);
        assert_eq!(f.engine.acquired(), 1);
    }

    #[tokio::test]
    async fn media_failure_creates_no_session() {
        let engine = MockEngine::failing_media();
        let (relay_tx, mut relay_rx) = mpsc::channel(8);
        let res = SessionController::open(
            SessionConfig::default(),
            Arc::clone(&engine) as Arc<dyn MediaEngine>,
            RecordingPresentation::new(),
            relay_tx,
            TraceHub::new(),
        ).await;

        assert!(matches!(res, Err(RtcError::MediaAcquisition(_))));
        assert!(relay_rx.try_recv().is_err());
        assert!(engine.negotiator(Partner::Relay).is_none());
    }

    #[tokio::test]
    async fn answer_from_relay_reaches_stable() {
        let f = open(SessionConfig::default()).await;
        f.controller.handle_message(server(None, ServerMessage::Answer("S2".into()))).await.unwrap();

        let ssm = f.controller.partner(Partner::Relay).unwrap();
        assert_eq!(ssm.phase().await, SignalingPhase::Stable);
    }

    #[tokio::test]
    async fn local_candidates_are_forwarded() {
        let mut f = open(SessionConfig::default()).await;
        f.relay_rx.recv().await.unwrap(); // name
        f.relay_rx.recv().await.unwrap(); // offer

        let candidate = crate::protocol::CandidateInit::new("candidate:1 1 udp 1 10.0.0.1 5000 typ host");
        assert!(f.engine.emit(Partner::Relay, MediaEventKind::IceCandidate(Some(candidate.clone()))).await);

        let env = f.relay_rx.recv().await.unwrap();
        assert_eq!(env, ClientEnvelope::relay(ClientMessage::Candidate(candidate)));
    }

    #[tokio::test]
    async fn track_attaches_with_resolved_name() {
        let f = open(SessionConfig::default()).await;
        f.controller.handle_message(server(None, ServerMessage::Peers(vec![
            Participant::new(7, "grace"),
        ]))).await.unwrap();

        f.controller.handle_media_event(MediaEvent::new(Partner::Relay, MediaEventKind::Track {
            stream:   MediaStream::new("s7"),
            kind:     TrackKind::Video,
            track_id: "7-video".into(),
        })).await.unwrap();
        f.controller.handle_media_event(MediaEvent::new(Partner::Relay, MediaEventKind::Track {
            stream:   MediaStream::new("sx"),
            kind:     TrackKind::Audio,
            track_id: "mixer".into(),
        })).await.unwrap();

        assert_eq!(f.presentation.calls(), vec![
            SurfaceCall::Attach {
                participant:  Some(7),
                stream:       "s7".into(),
                kind:         TrackKind::Video,
                display_name: Some("grace".into()),
            },
            SurfaceCall::Attach {
                participant:  None,
                stream:       "sx".into(),
                kind:         TrackKind::Audio,
                display_name: None,
            },
        ]);
    }

    #[tokio::test]
    async fn negotiation_needed_renegotiates_after_stable() {
        let mut f = open(SessionConfig::default()).await;
        f.relay_rx.recv().await.unwrap(); // name
        f.relay_rx.recv().await.unwrap(); // offer
        f.controller.handle_message(server(None, ServerMessage::Answer("S2".into()))).await.unwrap();

        f.controller.handle_media_event(
            MediaEvent::new(Partner::Relay, MediaEventKind::NegotiationNeeded),
        ).await.unwrap();

        let env = f.relay_rx.recv().await.unwrap();
        assert!(matches!(env.body, ClientMessage::Offer(_)));
    }

    #[tokio::test]
    async fn mesh_newcomer_offers_to_every_listed_peer() {
        let mut f = open(SessionConfig::with_name("carol").mesh()).await;
        f.relay_rx.recv().await.unwrap(); // name

        f.controller.handle_message(server(None, ServerMessage::Id(3))).await.unwrap();
        f.controller.handle_message(server(None, ServerMessage::Peers(vec![
            Participant::new(1, "alice"),
            Participant::new(2, ""),
        ]))).await.unwrap();

        let a = f.relay_rx.recv().await.unwrap();
        let b = f.relay_rx.recv().await.unwrap();
        let mut targets = vec![a.peer, b.peer];
        targets.sort();
        assert_eq!(targets, vec![Some(1), Some(2)]);
        assert!(matches!(a.body, ClientMessage::Offer(_)));
        assert_eq!(f.controller.partners(), vec![Partner::Peer(1), Partner::Peer(2)]);
    }

    #[tokio::test]
    async fn mesh_connect_failure_skips_only_that_peer() {
        let engine       = MockEngine::new();
        engine.reject_partner(Partner::Peer(1));
        let (relay_tx, mut relay_rx) = mpsc::channel(64);
        let controller = SessionController::open(
            SessionConfig::with_name("carol").mesh(),
            Arc::clone(&engine) as Arc<dyn MediaEngine>,
            RecordingPresentation::new(),
            relay_tx,
            TraceHub::new(),
        ).await.unwrap();
        relay_rx.recv().await.unwrap(); // name

        controller.handle_message(server(None, ServerMessage::Peers(vec![
            Participant::new(1, "alice"),
            Participant::new(2, "bob"),
        ]))).await.unwrap();

        let env = relay_rx.recv().await.unwrap();
        assert_eq!(env.peer, Some(2));
        assert!(matches!(env.body, ClientMessage::Offer(_)));
        assert_eq!(controller.partners(), vec![Partner::Peer(2)]);
        assert_eq!(controller.roster().count(), 2);
    }

    #[tokio::test]
    async fn relay_connect_failure_releases_local_media() {
        let engine = MockEngine::new();
        engine.reject_partner(Partner::Relay);
        let (relay_tx, _relay_rx) = mpsc::channel(8);

        let res = SessionController::open(
            SessionConfig::default(),
            Arc::clone(&engine) as Arc<dyn MediaEngine>,
            RecordingPresentation::new(),
            relay_tx,
            TraceHub::new(),
        ).await;

        assert!(matches!(res, Err(RtcError::Negotiation(_))));
        assert_eq!(engine.acquired(), 1);
        assert_eq!(engine.released(), 1);
    }

    #[tokio::test]
    async fn mesh_incoming_offer_creates_partner_lazily() {
        let mut f = open(SessionConfig::default().mesh()).await;
        f.relay_rx.recv().await.unwrap(); // name
        assert!(f.controller.partners().is_empty());

        f.controller.handle_message(server(Some(9), ServerMessage::Offer("S3".into()))).await.unwrap();

        let env = f.relay_rx.recv().await.unwrap();
        assert_eq!(env.peer, Some(9));
        assert!(matches!(env.body, ClientMessage::Answer(_)));
        let ssm = f.controller.partner(Partner::Peer(9)).unwrap();
        assert_eq!(ssm.phase().await, SignalingPhase::Stable);
    }

    #[tokio::test]
    async fn mesh_peer_left_closes_partner() {
        let f = open(SessionConfig::default().mesh()).await;
        f.controller.handle_message(server(None, ServerMessage::PeerJoined(Participant::new(4, "dave")))).await.unwrap();
        f.controller.handle_message(server(Some(4), ServerMessage::Offer("S3".into()))).await.unwrap();
        let negotiator = f.engine.negotiator(Partner::Peer(4)).unwrap();

        f.controller.handle_message(server(None, ServerMessage::PeerLeft(4))).await.unwrap();

        assert!(f.controller.partner(Partner::Peer(4)).is_none());
        assert!(negotiator.is_closed());
        assert_eq!(f.presentation.detached(), vec![4]);
        assert_eq!(f.controller.roster().count(), 0);
    }

    #[tokio::test]
    async fn addressed_message_in_relay_topology_is_dropped() {
        let f = open(SessionConfig::default()).await;
        f.controller.handle_message(server(Some(5), ServerMessage::Offer("S3".into()))).await.unwrap();
        assert_eq!(f.controller.partners(), vec![Partner::Relay]);
    }

    #[tokio::test]
    async fn pli_requests_keyframe_from_partner() {
        let f = open(SessionConfig::default().mesh()).await;
        f.controller.handle_message(server(Some(6), ServerMessage::Offer("S3".into()))).await.unwrap();
        f.controller.handle_message(server(Some(6), ServerMessage::Pli(3))).await.unwrap();

        let negotiator = f.engine.negotiator(Partner::Peer(6)).unwrap();
        assert!(negotiator.calls().contains(&crate::capability::mock::NegotiatorCall::RequestKeyframe));
    }

    #[tokio::test]
    async fn close_tears_everything_down_once() {
        let f = open(SessionConfig::default()).await;
        f.controller.handle_message(server(None, ServerMessage::PeerJoined(Participant::new(2, "bob")))).await.unwrap();
        let negotiator = f.engine.negotiator(Partner::Relay).unwrap();

        f.controller.close().await;
        f.controller.close().await;

        assert!(f.controller.is_closed());
        assert!(!f.controller.holds_local_media());
        assert_eq!(f.engine.released(), 1);
        assert!(negotiator.is_closed());
        assert!(f.controller.partners().is_empty());
        assert_eq!(f.controller.roster().count(), 0);

        let res = f.controller.handle_message(server(None, ServerMessage::Answer("S2".into()))).await;
        assert!(matches!(res, Err(RtcError::SessionClosed)));
    }
}
