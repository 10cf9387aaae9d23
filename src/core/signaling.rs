// author: kodeholic (powered by Claude)
// SignalingStateMachine: offer/answer/ICE 교환 프로토콜 (상대 1개당 1 인스턴스)
//
// 상태머신:
//   Idle            → send_initial_offer          → HaveLocalOffer
//   HaveLocalOffer  → on_remote_answer            → Stable
//   HaveLocalOffer  → on_remote_offer (glare)     → rollback → HaveRemoteOffer → Stable
//   Idle | Stable   → on_remote_offer             → HaveRemoteOffer → Stable
//   Stable          → renegotiate                 → HaveLocalOffer
//
// Glare 정책: 로컬 offer 중 remote offer 수신 시 무조건 로컬 offer rollback (remote 우선).
// 협상 없는 고정 tie-break.
//
// 모든 변경 작업은 NegotiationLock 안에서만 NegotiationSession을 만짐.
// 실패 시 이미 커밋된 단계까지만 반영되고 나머지는 버림 (자동 재시도 없음).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::candidate::CandidateBuffer;
use super::lock::NegotiationLock;
use super::partner::Partner;
use crate::capability::{MediaNegotiator, SessionDescription};
use crate::error::{RtcError, RtcResult};
use crate::protocol::{CandidateInit, ClientEnvelope, ClientMessage};
use crate::trace::{TraceDir, TraceEvent, TraceHub};

/// 릴레이 송신 채널 (직렬화 전 봉투)
pub type RelayTx = mpsc::Sender<ClientEnvelope>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalingPhase {
    #[default]
    Idle,
    HaveLocalOffer,
    /// remote offer 적용 후 answer 생성 전까지의 과도 상태
    HaveRemoteOffer,
    Stable,
}

/// 협상 컨텍스트: NegotiationLock 보유 중에만 변경
#[derive(Debug, Default)]
pub struct NegotiationSession {
    pub phase:     SignalingPhase,
    pub local:     Option<SessionDescription>,
    pub remote:    Option<SessionDescription>,
    pub pending:   CandidateBuffer,
    pub rollbacks: u32,
}

/// 진단/테스트용 스냅샷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationSnapshot {
    pub phase:      SignalingPhase,
    pub has_local:  bool,
    pub has_remote: bool,
    pub pending:    usize,
    pub rollbacks:  u32,
}

pub struct SignalingStateMachine {
    partner:    Partner,
    negotiator: Arc<dyn MediaNegotiator>,
    relay_tx:   RelayTx,
    trace_hub:  Arc<TraceHub>,
    session:    NegotiationLock<NegotiationSession>,
}

impl SignalingStateMachine {
    pub fn new(
        partner:    Partner,
        negotiator: Arc<dyn MediaNegotiator>,
        relay_tx:   RelayTx,
        trace_hub:  Arc<TraceHub>,
    ) -> Self {
        trace!("[signaling] state machine created for {}", partner);
        Self {
            partner,
            negotiator,
            relay_tx,
            trace_hub,
            session: NegotiationLock::new(NegotiationSession::default()),
        }
    }

    pub fn partner(&self) -> Partner {
        self.partner
    }

    pub fn negotiator(&self) -> &Arc<dyn MediaNegotiator> {
        &self.negotiator
    }

    pub async fn phase(&self) -> SignalingPhase {
        self.session.inspect(|s| s.phase).await
    }

    pub async fn snapshot(&self) -> NegotiationSnapshot {
        self.session.inspect(|s| NegotiationSnapshot {
            phase:      s.phase,
            has_local:  s.local.is_some(),
            has_remote: s.remote.is_some(),
            pending:    s.pending.len(),
            rollbacks:  s.rollbacks,
        }).await
    }

    // ------------------------------------------------------------------------
    // [협상 작업]: 전부 NegotiationLock 보유
    // ------------------------------------------------------------------------

    /// Idle에서만 유효. capability가 offer를 못 만들면 에러 반환 (재시도는 호출자 몫)
    pub async fn send_initial_offer(&self) -> RtcResult<()> {
        let mut session = self.session.acquire("send_initial_offer").await?;
        if session.phase != SignalingPhase::Idle {
            self.violation(&format!("initial offer requested in {:?}", session.phase));
            return Ok(());
        }
        self.offer_locked(&mut session).await
    }

    /// negotiationNeeded / 로컬 트랙 추가 시 호출
    /// Stable → 새 offer (roster, 버퍼 상태는 유지)
    /// Idle   → initial offer 실패 후의 재시도로 보고 동일하게 offer
    /// offer 진행 중 → 이번 트리거는 버림
    pub async fn renegotiate(&self) -> RtcResult<()> {
        let mut session = self.session.acquire("renegotiate").await?;
        match session.phase {
            SignalingPhase::Idle | SignalingPhase::Stable => self.offer_locked(&mut session).await,
            phase => {
                debug!("[signaling] {} renegotiation skipped, offer in flight ({:?})", self.partner, phase);
                Ok(())
            }
        }
    }

    /// remote description 있으면 즉시 적용, 없으면 버퍼에 보관
    /// 개별 candidate 실패는 로그만 남기고 버림: 세션은 계속
    pub async fn on_remote_candidate(&self, candidate: CandidateInit) {
        let mut session = match self.session.acquire("on_remote_candidate").await {
            Ok(s)  => s,
            Err(e) => {
                debug!("[signaling] {} candidate ignored: {}", self.partner, e);
                return;
            }
        };

        if session.remote.is_some() {
            let label = candidate.candidate.clone();
            match self.negotiator.add_candidate(candidate).await {
                Ok(())  => self.publish(TraceDir::In, "CANDIDATE", &label),
                Err(e)  => warn!("[signaling] {} candidate dropped: {} ({})", self.partner, label, e),
            }
        } else {
            self.publish(TraceDir::Sys, "CANDIDATE_QUEUED", &candidate.candidate);
            session.pending.enqueue(candidate);
            trace!("[signaling] {} candidate queued (pending={})", self.partner, session.pending.len());
        }
    }

    /// remote offer 수신: HaveLocalOffer면 rollback 먼저 (glare)
    pub async fn on_remote_offer(&self, sdp: String) -> RtcResult<()> {
        let mut session = self.session.acquire("on_remote_offer").await?;
        self.publish(TraceDir::In, "OFFER", &format!("{} bytes", sdp.len()));

        if session.phase == SignalingPhase::HaveLocalOffer {
            self.negotiator.set_local_description(SessionDescription::rollback()).await?;
            session.local     = None;
            session.rollbacks += 1;
            session.phase     = if session.remote.is_some() {
                SignalingPhase::Stable
            } else {
                SignalingPhase::Idle
            };
            debug!("[signaling] {} glare: local offer rolled back", self.partner);
            self.publish(TraceDir::Sys, "ROLLBACK", "local offer discarded, remote wins");
        }

        let remote = SessionDescription::offer(sdp);
        self.negotiator.set_remote_description(remote.clone()).await?;
        session.remote = Some(remote);
        session.phase  = SignalingPhase::HaveRemoteOffer;

        self.flush_pending(&mut session).await;

        match self.answer_locked(&mut session).await {
            Ok(answer) => self.emit(ClientMessage::Answer(answer)).await,
            Err(e) => {
                // remote는 이미 설치됨: Stable로 정리해야 다음 renegotiate가 offer를 다시 냄
                session.phase = SignalingPhase::Stable;
                warn!("[signaling] {} answer failed, settled in Stable: {}", self.partner, e);
                self.publish(TraceDir::Sys, "ANSWER_FAILED", &e.to_string());
                Err(e)
            }
        }
    }

    /// remote answer 수신: HaveLocalOffer에서만 유효
    pub async fn on_remote_answer(&self, sdp: String) -> RtcResult<()> {
        let mut session = self.session.acquire("on_remote_answer").await?;
        if session.phase != SignalingPhase::HaveLocalOffer {
            self.violation(&format!("answer received in {:?}", session.phase));
            return Ok(());
        }
        self.publish(TraceDir::In, "ANSWER", &format!("{} bytes", sdp.len()));

        let remote = SessionDescription::answer(sdp);
        self.negotiator.set_remote_description(remote.clone()).await?;
        session.remote = Some(remote);

        self.flush_pending(&mut session).await;

        session.phase = SignalingPhase::Stable;
        debug!("[signaling] {} answer applied → Stable", self.partner);
        Ok(())
    }

    /// 이후 작업 차단 + capability 종료. 진행 중인 작업은 자연 종료
    pub async fn close(&self) {
        self.session.close();
        self.negotiator.close().await;
        debug!("[signaling] {} closed", self.partner);
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    // ------------------------------------------------------------------------
    // [내부 유틸]
    // ------------------------------------------------------------------------

    async fn answer_locked(&self, session: &mut NegotiationSession) -> RtcResult<String> {
        let answer = self.negotiator.create_answer().await?;
        let local  = SessionDescription::answer(answer.clone());
        self.negotiator.set_local_description(local.clone()).await?;
        session.local = Some(local);
        session.phase = SignalingPhase::Stable;
        debug!("[signaling] {} offer answered → Stable", self.partner);
        Ok(answer)
    }

    async fn offer_locked(&self, session: &mut NegotiationSession) -> RtcResult<()> {
        let sdp   = self.negotiator.create_offer().await?;
        let local = SessionDescription::offer(sdp.clone());
        self.negotiator.set_local_description(local.clone()).await?;
        session.local = Some(local);
        session.phase = SignalingPhase::HaveLocalOffer;
        debug!("[signaling] {} local offer installed → HaveLocalOffer", self.partner);

        self.emit(ClientMessage::Offer(sdp)).await
    }

    /// remote description 수락 직후 1회: 도착 순서대로 적용 후 비움
    async fn flush_pending(&self, session: &mut NegotiationSession) {
        if session.pending.is_empty() {
            return;
        }
        let negotiator = Arc::clone(&self.negotiator);
        let report = session.pending.drain_into(move |candidate| {
            let negotiator = Arc::clone(&negotiator);
            async move { negotiator.add_candidate(candidate).await }
        }).await;

        debug!("[signaling] {} pending candidates flushed: applied={} failed={}",
            self.partner, report.applied, report.failed);
        self.publish(
            TraceDir::Sys,
            "CANDIDATE_FLUSH",
            &format!("applied={} failed={}", report.applied, report.failed),
        );
    }

    async fn emit(&self, message: ClientMessage) -> RtcResult<()> {
        let kind    = message.kind();
        let summary = match &message {
            ClientMessage::Offer(sdp) | ClientMessage::Answer(sdp) => format!("{} bytes", sdp.len()),
            _ => String::new(),
        };
        self.relay_tx
            .send(ClientEnvelope::new(self.partner.envelope_peer(), message))
            .await
            .map_err(|_| RtcError::RelayClosed)?;
        self.publish(TraceDir::Out, kind, &summary);
        Ok(())
    }

    fn violation(&self, detail: &str) {
        let e = RtcError::ProtocolViolation(detail.to_string());
        warn!("[signaling] {} ignored: {}", self.partner, e);
        self.publish(TraceDir::Sys, "PROTOCOL_VIOLATION", detail);
    }

    fn publish(&self, dir: TraceDir, kind: &str, summary: &str) {
        self.trace_hub.publish(TraceEvent::new(
            dir, None, self.partner.envelope_peer(), kind, summary,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::{MockNegotiator, NegotiatorCall};
    use crate::capability::SdpKind;
    use std::time::Duration;

    struct Fixture {
        ssm:        Arc<SignalingStateMachine>,
        negotiator: Arc<MockNegotiator>,
        relay_rx:   mpsc::Receiver<ClientEnvelope>,
    }

    fn fixture(partner: Partner) -> Fixture {
        let negotiator = Arc::new(MockNegotiator::new("local"));
        let (relay_tx, relay_rx) = mpsc::channel(32);
        let ssm = Arc::new(SignalingStateMachine::new(
            partner,
            Arc::clone(&negotiator) as Arc<dyn MediaNegotiator>,
            relay_tx,
            TraceHub::new(),
        ));
        Fixture { ssm, negotiator, relay_rx }
    }

    fn cand(s: &str) -> CandidateInit {
        CandidateInit::new(s)
    }

    #[tokio::test]
    async fn initial_offer_moves_to_have_local_offer() {
        let mut f = fixture(Partner::Relay);
        f.negotiator.script_sdp("S1");

        f.ssm.send_initial_offer().await.unwrap();

        assert_eq!(f.ssm.phase().await, SignalingPhase::HaveLocalOffer);
        let sent = f.relay_rx.recv().await.unwrap();
        assert_eq!(sent, ClientEnvelope::relay(ClientMessage::Offer("S1".into())));
        assert_eq!(f.negotiator.calls()[..2], [
            NegotiatorCall::CreateOffer,
            NegotiatorCall::SetLocal(SessionDescription::offer("S1")),
        ]);
    }

    #[tokio::test]
    async fn initial_offer_failure_leaves_idle() {
        let mut f = fixture(Partner::Relay);
        f.negotiator.set_fail_offer(true);

        assert!(matches!(f.ssm.send_initial_offer().await, Err(RtcError::Negotiation(_))));
        assert_eq!(f.ssm.phase().await, SignalingPhase::Idle);
        assert!(f.relay_rx.try_recv().is_err());

        // 호출자가 재시도: 이번엔 성공
        f.negotiator.set_fail_offer(false);
        f.ssm.send_initial_offer().await.unwrap();
        assert_eq!(f.ssm.phase().await, SignalingPhase::HaveLocalOffer);
    }

    #[tokio::test]
    async fn initial_offer_outside_idle_is_noop() {
        let mut f = fixture(Partner::Relay);
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();

        f.ssm.send_initial_offer().await.unwrap();
        assert!(f.relay_rx.try_recv().is_err());
        let offers = f.negotiator.calls().iter()
            .filter(|c| **c == NegotiatorCall::CreateOffer)
            .count();
        assert_eq!(offers, 1);
    }

    #[tokio::test]
    async fn answer_completes_negotiation() {
        let mut f = fixture(Partner::Relay);
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();

        f.ssm.on_remote_answer("S2".into()).await.unwrap();

        let snap = f.ssm.snapshot().await;
        assert_eq!(snap.phase, SignalingPhase::Stable);
        assert!(snap.has_remote);
        assert_eq!(snap.rollbacks, 0);
        assert!(f.relay_rx.try_recv().is_err(), "no further automatic offer");
    }

    #[tokio::test]
    async fn answer_in_idle_is_ignored() {
        let f = fixture(Partner::Relay);
        f.ssm.on_remote_answer("S2".into()).await.unwrap();
        assert_eq!(f.ssm.phase().await, SignalingPhase::Idle);
        assert!(f.negotiator.calls().is_empty());
    }

    #[tokio::test]
    async fn glare_rolls_back_exactly_once() {
        let mut f = fixture(Partner::Relay);
        f.negotiator.script_sdp("S1");
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();

        f.negotiator.script_sdp("S4");
        f.ssm.on_remote_offer("S3".into()).await.unwrap();

        let snap = f.ssm.snapshot().await;
        assert_eq!(snap.phase, SignalingPhase::Stable);
        assert_eq!(snap.rollbacks, 1);
        assert_eq!(f.negotiator.rollback_count(), 1);

        // rollback이 remote 적용보다 먼저
        let calls = f.negotiator.calls();
        let rollback_at = calls.iter()
            .position(|c| matches!(c, NegotiatorCall::SetLocal(d) if d.kind == SdpKind::Rollback))
            .unwrap();
        let remote_at = calls.iter()
            .position(|c| *c == NegotiatorCall::SetRemote(SessionDescription::offer("S3")))
            .unwrap();
        assert!(rollback_at < remote_at);

        let sent = f.relay_rx.recv().await.unwrap();
        assert_eq!(sent.body, ClientMessage::Answer("S4".into()));
    }

    #[tokio::test]
    async fn offer_from_idle_needs_no_rollback() {
        let mut f = fixture(Partner::Peer(4));
        f.ssm.on_remote_offer("S3".into()).await.unwrap();

        assert_eq!(f.ssm.phase().await, SignalingPhase::Stable);
        assert_eq!(f.negotiator.rollback_count(), 0);
        let sent = f.relay_rx.recv().await.unwrap();
        assert_eq!(sent.peer, Some(4));
        assert!(matches!(sent.body, ClientMessage::Answer(_)));
    }

    #[tokio::test]
    async fn early_candidates_flush_in_order_on_answer() {
        let mut f = fixture(Partner::Relay);
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();

        for c in ["C1", "C2", "C3"] {
            f.ssm.on_remote_candidate(cand(c)).await;
        }
        assert_eq!(f.ssm.snapshot().await.pending, 3);
        assert!(f.negotiator.applied_candidates().is_empty());

        f.ssm.on_remote_answer("S2".into()).await.unwrap();

        assert_eq!(f.negotiator.applied_candidates(), vec!["C1", "C2", "C3"]);
        assert_eq!(f.ssm.snapshot().await.pending, 0);
    }

    #[tokio::test]
    async fn early_candidates_flush_before_answer_is_created() {
        let f = fixture(Partner::Relay);
        f.ssm.on_remote_candidate(cand("C1")).await;
        f.ssm.on_remote_candidate(cand("C2")).await;

        f.ssm.on_remote_offer("S3".into()).await.unwrap();

        let calls = f.negotiator.calls();
        let flushed_at = calls.iter()
            .rposition(|c| matches!(c, NegotiatorCall::AddCandidate(_)))
            .unwrap();
        let answer_at = calls.iter().position(|c| *c == NegotiatorCall::CreateAnswer).unwrap();
        assert!(flushed_at < answer_at);
        assert_eq!(f.negotiator.applied_candidates(), vec!["C1", "C2"]);
    }

    #[tokio::test]
    async fn late_candidate_applies_immediately() {
        let f = fixture(Partner::Relay);
        f.ssm.on_remote_offer("S3".into()).await.unwrap();

        f.ssm.on_remote_candidate(cand("C9")).await;
        assert_eq!(f.negotiator.applied_candidates(), vec!["C9"]);
        assert_eq!(f.ssm.snapshot().await.pending, 0);
    }

    #[tokio::test]
    async fn bad_candidate_is_dropped_and_negotiation_continues() {
        let f = fixture(Partner::Relay);
        f.negotiator.reject_candidate("BAD");
        f.ssm.on_remote_candidate(cand("C1")).await;
        f.ssm.on_remote_candidate(cand("BAD")).await;
        f.ssm.on_remote_candidate(cand("C2")).await;

        f.ssm.on_remote_offer("S3".into()).await.unwrap();

        assert_eq!(f.ssm.phase().await, SignalingPhase::Stable);
        assert_eq!(f.negotiator.applied_candidates(), vec!["C1", "BAD", "C2"]);
        assert_eq!(f.ssm.snapshot().await.pending, 0);

        // 이후 단독 bad candidate도 세션에 영향 없음
        f.ssm.on_remote_candidate(cand("BAD")).await;
        assert_eq!(f.ssm.phase().await, SignalingPhase::Stable);
    }

    #[tokio::test]
    async fn renegotiate_from_stable_sends_new_offer() {
        let mut f = fixture(Partner::Relay);
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();
        f.ssm.on_remote_answer("S2".into()).await.unwrap();

        f.negotiator.script_sdp("S5");
        f.ssm.renegotiate().await.unwrap();

        let snap = f.ssm.snapshot().await;
        assert_eq!(snap.phase, SignalingPhase::HaveLocalOffer);
        assert!(snap.has_remote, "remote description survives renegotiation");
        let sent = f.relay_rx.recv().await.unwrap();
        assert_eq!(sent.body, ClientMessage::Offer("S5".into()));
    }

    #[tokio::test]
    async fn renegotiate_while_offering_is_skipped() {
        let mut f = fixture(Partner::Relay);
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();

        f.ssm.renegotiate().await.unwrap();
        assert!(f.relay_rx.try_recv().is_err());
        assert_eq!(f.ssm.phase().await, SignalingPhase::HaveLocalOffer);
    }

    #[tokio::test]
    async fn concurrent_triggers_never_overlap() {
        let f = fixture(Partner::Relay);
        f.negotiator.set_call_delay(Duration::from_millis(2));

        let a = { let s = Arc::clone(&f.ssm); tokio::spawn(async move { s.send_initial_offer().await }) };
        let b = { let s = Arc::clone(&f.ssm); tokio::spawn(async move { s.on_remote_offer("S3".into()).await }) };
        let c = { let s = Arc::clone(&f.ssm); tokio::spawn(async move { s.renegotiate().await }) };
        let d = { let s = Arc::clone(&f.ssm); tokio::spawn(async move { s.on_remote_answer("S2".into()).await }) };

        for h in [a, b, c, d] {
            h.await.unwrap().unwrap();
        }
        assert_eq!(f.negotiator.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn closed_machine_rejects_new_operations() {
        let mut f = fixture(Partner::Relay);
        f.ssm.close().await;

        assert!(matches!(f.ssm.send_initial_offer().await, Err(RtcError::SessionClosed)));
        f.ssm.on_remote_candidate(cand("C1")).await;
        assert!(f.relay_rx.try_recv().is_err());
        assert!(f.negotiator.is_closed());
    }

    // ------------------------------------------------------------------------
    // capability 중도 실패: 이미 확정된 단계까지만 남고 재시도 가능
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn answer_failure_settles_stable_and_renegotiate_recovers() {
        let mut f = fixture(Partner::Relay);
        f.ssm.on_remote_candidate(cand("C1")).await;
        f.negotiator.set_fail_answer(true);

        assert!(matches!(f.ssm.on_remote_offer("S3".into()).await, Err(RtcError::Negotiation(_))));
        assert!(f.relay_rx.try_recv().is_err(), "실패한 answer는 송신되지 않음");

        let snap = f.ssm.snapshot().await;
        assert_eq!(snap.phase, SignalingPhase::Stable);
        assert!(snap.has_remote);
        assert_eq!(snap.pending, 0);
        assert_eq!(f.negotiator.applied_candidates(), vec!["C1"]);

        f.negotiator.set_fail_answer(false);
        f.negotiator.script_sdp("S5");
        f.ssm.renegotiate().await.unwrap();

        assert_eq!(f.relay_rx.recv().await.unwrap().body, ClientMessage::Offer("S5".into()));
        assert_eq!(f.ssm.phase().await, SignalingPhase::HaveLocalOffer);
    }

    #[tokio::test]
    async fn rejected_remote_offer_keeps_phase_and_queue() {
        let mut f = fixture(Partner::Relay);
        f.ssm.on_remote_candidate(cand("C1")).await;
        f.negotiator.set_fail_remote(true);

        assert!(f.ssm.on_remote_offer("S3".into()).await.is_err());

        let snap = f.ssm.snapshot().await;
        assert_eq!(snap.phase, SignalingPhase::Idle);
        assert!(!snap.has_remote);
        assert_eq!(snap.pending, 1);
        assert!(f.relay_rx.try_recv().is_err());

        // 같은 offer 재전송 시 정상 처리
        f.negotiator.set_fail_remote(false);
        f.ssm.on_remote_offer("S3".into()).await.unwrap();
        assert_eq!(f.ssm.phase().await, SignalingPhase::Stable);
        assert_eq!(f.negotiator.applied_candidates(), vec!["C1"]);
        assert!(matches!(f.relay_rx.recv().await.unwrap().body, ClientMessage::Answer(_)));
    }

    #[tokio::test]
    async fn rejected_remote_offer_after_rollback_leaves_idle() {
        let mut f = fixture(Partner::Relay);
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();
        f.negotiator.set_fail_remote(true);

        assert!(f.ssm.on_remote_offer("S3".into()).await.is_err());

        // rollback까지는 확정
        let snap = f.ssm.snapshot().await;
        assert_eq!(snap.phase, SignalingPhase::Idle);
        assert_eq!(snap.rollbacks, 1);
        assert!(!snap.has_local);

        f.negotiator.set_fail_remote(false);
        f.ssm.renegotiate().await.unwrap();
        assert!(matches!(f.relay_rx.recv().await.unwrap().body, ClientMessage::Offer(_)));
        assert_eq!(f.ssm.phase().await, SignalingPhase::HaveLocalOffer);
    }

    #[tokio::test]
    async fn rejected_rollback_keeps_local_offer() {
        let mut f = fixture(Partner::Relay);
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();
        f.negotiator.set_fail_rollback(true);

        assert!(f.ssm.on_remote_offer("S3".into()).await.is_err());

        let snap = f.ssm.snapshot().await;
        assert_eq!(snap.phase, SignalingPhase::HaveLocalOffer);
        assert_eq!(snap.rollbacks, 0);
        assert!(snap.has_local);
        assert!(!f.negotiator.calls().iter().any(|c| matches!(c, NegotiatorCall::SetRemote(_))));

        // 우리 offer는 여전히 유효: answer 수락
        f.ssm.on_remote_answer("S2".into()).await.unwrap();
        assert_eq!(f.ssm.phase().await, SignalingPhase::Stable);
    }

    #[tokio::test]
    async fn rejected_remote_answer_keeps_have_local_offer() {
        let mut f = fixture(Partner::Relay);
        f.ssm.send_initial_offer().await.unwrap();
        f.relay_rx.recv().await.unwrap();
        f.ssm.on_remote_candidate(cand("C1")).await;
        f.negotiator.set_fail_remote(true);

        assert!(f.ssm.on_remote_answer("S2".into()).await.is_err());

        let snap = f.ssm.snapshot().await;
        assert_eq!(snap.phase, SignalingPhase::HaveLocalOffer);
        assert!(!snap.has_remote);
        assert_eq!(snap.pending, 1);

        f.negotiator.set_fail_remote(false);
        f.ssm.on_remote_answer("S2".into()).await.unwrap();
        assert_eq!(f.ssm.phase().await, SignalingPhase::Stable);
        assert_eq!(f.negotiator.applied_candidates(), vec!["C1"]);
        assert_eq!(f.ssm.snapshot().await.pending, 0);
    }
}
