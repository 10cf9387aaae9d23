// author: kodeholic (powered by Claude)
// LossProbe: 수신 비디오 디코딩 정체 감지 → PLI 요청
//
// 주기마다 (기본 100ms, 프레임레이트와 무관):
//   1. 살아있는 모든 negotiator에 get_stats()
//   2. inbound video 이면서 decoded_frame_count == 0 인 보고서마다 {pli: participantId}
//
// 중복 억제 없음: 같은 트랙이 연속 0이면 요청도 연속 (덜 보내는 것보다 더 보내는 쪽)
// NegotiationLock을 잡지 않음: 통계 읽기와 릴레이 송신만 함

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::partner::Partner;
use super::signaling::RelayTx;
use crate::capability::{MediaNegotiator, StatsReport, TrackKind};
use crate::protocol::{ClientEnvelope, ClientMessage, ParticipantId};
use crate::trace::{TraceDir, TraceEvent, TraceHub};
use crate::utils::participant_of_track;

/// 한 틱에서 통계를 볼 대상
#[derive(Clone)]
pub struct ProbeTarget {
    pub partner:    Partner,
    pub negotiator: Arc<dyn MediaNegotiator>,
}

pub struct LossProbe {
    relay_tx:  RelayTx,
    trace_hub: Arc<TraceHub>,
    sent:      AtomicU64,
}

impl LossProbe {
    pub fn new(relay_tx: RelayTx, trace_hub: Arc<TraceHub>) -> Arc<Self> {
        Arc::new(Self { relay_tx, trace_hub, sent: AtomicU64::new(0) })
    }

    /// 지금까지 보낸 PLI 수
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// 한 틱: 이번에 보낸 PLI 수 반환
    pub async fn run_once(&self, targets: &[ProbeTarget]) -> usize {
        let mut requested = 0;
        for target in targets {
            let reports = match target.negotiator.get_stats().await {
                Ok(r)  => r,
                Err(e) => {
                    debug!("[loss-probe] {} stats unavailable: {}", target.partner, e);
                    continue;
                }
            };

            for report in reports.iter().filter(|r| is_stalled(r)) {
                let Some(owner) = owner_of(target.partner, report) else {
                    trace!("[loss-probe] {} unbound track '{}' skipped",
                        target.partner, report.track_identifier);
                    continue;
                };

                let env = ClientEnvelope::new(target.partner.envelope_peer(), ClientMessage::Pli(owner));
                if self.relay_tx.send(env).await.is_err() {
                    // 릴레이가 닫힘: 세션 teardown이 곧 probe를 멈춤
                    return requested;
                }
                requested += 1;
                self.trace_hub.publish(TraceEvent::new(
                    TraceDir::Out, None, Some(owner), "PLI", report.track_identifier.as_str(),
                ));
            }
        }

        if requested > 0 {
            self.sent.fetch_add(requested as u64, Ordering::Relaxed);
            trace!("[loss-probe] {} PLI requested", requested);
        }
        requested
    }

    /// 주기 실행 태스크 시작. targets는 틱마다 호출되어 현재 상대 목록을 돌려줌
    pub fn spawn<F>(self: Arc<Self>, interval_ms: u64, targets: F) -> LossProbeHandle
    where
        F: Fn() -> Vec<ProbeTarget> + Send + Sync + 'static,
    {
        // 0ms 주기는 tokio interval이 거부: 최소 1ms
        let interval_ms = interval_ms.max(1);
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_millis(interval_ms));
            timer.tick().await; // 첫 틱 skip (open 직후엔 수신 트랙 없음)

            info!("[loss-probe] Started (interval={}ms)", interval_ms);
            loop {
                timer.tick().await;
                if self.relay_tx.is_closed() {
                    warn!("[loss-probe] relay closed, stopping");
                    break;
                }
                let current = targets();
                self.run_once(&current).await;
            }
        });
        LossProbeHandle { task }
    }
}

pub struct LossProbeHandle {
    task: JoinHandle<()>,
}

impl LossProbeHandle {
    pub fn stop(&self) {
        self.task.abort();
        debug!("[loss-probe] stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LossProbeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_stalled(report: &StatsReport) -> bool {
    report.inbound && report.kind == TrackKind::Video && report.decoded_frame_count == 0
}

/// 트랙 식별자 우선, 안 되면 mesh 상대 자신
fn owner_of(partner: Partner, report: &StatsReport) -> Option<ParticipantId> {
    participant_of_track(&report.track_identifier).or(partner.envelope_peer())
}
