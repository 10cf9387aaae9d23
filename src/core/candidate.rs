// author: kodeholic (powered by Claude)
// CandidateBuffer: remote description 확정 전에 도착한 candidate 보관
//
// 불변식:
//   - remote description이 비어있는 동안에만 비어있지 않음
//   - remote description 수락 직후 도착 순서대로 정확히 1회 drain, 이후 비움
//   - 개별 candidate 적용 실패가 나머지를 막지 않음 (best-effort)

use std::collections::VecDeque;
use std::future::Future;

use tracing::warn;

use crate::error::RtcResult;
use crate::protocol::CandidateInit;

/// drain 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: usize,
    pub failed:  usize,
}

impl DrainReport {
    pub fn total(&self) -> usize {
        self.applied + self.failed
    }
}

#[derive(Debug, Default)]
pub struct CandidateBuffer {
    queue: VecDeque<CandidateInit>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }

    pub fn enqueue(&mut self, candidate: CandidateInit) {
        self.queue.push_back(candidate);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 보관된 candidate를 도착 순서대로 모두 적용한 뒤 비움
    /// 빈 버퍼에서는 아무 일도 하지 않음
    pub async fn drain_into<F, Fut>(&mut self, mut apply: F) -> DrainReport
    where
        F:   FnMut(CandidateInit) -> Fut,
        Fut: Future<Output = RtcResult<()>>,
    {
        let mut report = DrainReport::default();
        // 먼저 통째로 꺼내서 apply 도중 실패해도 버퍼는 반드시 비워짐
        let pending: Vec<CandidateInit> = self.queue.drain(..).collect();
        for candidate in pending {
            let label = candidate.candidate.clone();
            match apply(candidate).await {
                Ok(())  => report.applied += 1,
                Err(e)  => {
                    warn!("[candidate] buffered candidate dropped: {} ({})", label, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
