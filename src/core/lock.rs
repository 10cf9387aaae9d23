// author: kodeholic (powered by Claude)
// NegotiationLock: description 상태를 건드리는 모든 작업의 직렬화
//
// [비동기 임계구역]
//   capability 호출(.await) 동안에도 lock을 쥔 채로 대기 → 다른 트리거는 뒤에 줄 섬
//   tokio::sync::Mutex는 lock() 호출 순서대로 깨움 (FIFO) → 메시지 종류가 아닌 도착 순서
//   guard drop 시 해제 → 에러/조기 return 경로에서도 반드시 해제됨
//
// [종료]
//   close() 이후에는 새 작업이 lock을 얻지 못함 (RtcError::SessionClosed)
//   이미 대기열에 있던 작업도 깨어난 직후 closed를 다시 보고 포기
//   이미 임계구역 안에 있는 작업은 자연스럽게 끝까지 진행

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

use crate::error::{RtcError, RtcResult};

pub struct NegotiationLock<T> {
    inner:        Mutex<T>,
    closed:       AtomicBool,
    acquisitions: AtomicU64,
}

impl<T> NegotiationLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner:        Mutex::new(value),
            closed:       AtomicBool::new(false),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// 임계구역 진입: op는 로그용 작업 이름
    pub async fn acquire(&self, op: &'static str) -> RtcResult<NegotiationGuard<'_, T>> {
        if self.is_closed() {
            return Err(RtcError::SessionClosed);
        }

        let guard = self.inner.lock().await;

        // 대기 중에 세션이 닫혔으면 시작하지 않음
        if self.is_closed() {
            trace!("[lock] {} abandoned after close", op);
            return Err(RtcError::SessionClosed);
        }

        let seq = self.acquisitions.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("[lock] #{} {} acquired", seq, op);
        Ok(NegotiationGuard { guard, op, seq })
    }

    /// 진단용 읽기: closed 여부와 무관하게 현재 상태를 들여다봄
    pub async fn inspect<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().await;
        f(&guard)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 지금까지 임계구역에 진입한 횟수
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }
}

pub struct NegotiationGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    op:    &'static str,
    seq:   u64,
}

impl<T> Deref for NegotiationGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for NegotiationGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for NegotiationGuard<'_, T> {
    fn drop(&mut self) {
        trace!("[lock] #{} {} released", self.seq, self.op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn guard_gives_mutable_access() {
        let lock = NegotiationLock::new(0u32);
        {
            let mut g = lock.acquire("inc").await.unwrap();
            *g += 1;
        }
        assert_eq!(lock.inspect(|v| *v).await, 1);
        assert_eq!(lock.acquisitions(), 1);
    }

    #[tokio::test]
    async fn waiters_are_served_in_arrival_order() {
        let lock  = Arc::new(NegotiationLock::new(Vec::<u32>::new()));
        let first = lock.acquire("holder").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..5u32 {
            let lock = Arc::clone(&lock);
            handles.push(tokio::spawn(async move {
                let mut g = lock.acquire("waiter").await.unwrap();
                g.push(i);
            }));
            // 각 waiter가 lock() 대기열에 들어갈 때까지 양보
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drop(first);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(lock.inspect(|v| v.clone()).await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn closed_lock_rejects_new_operations() {
        let lock = NegotiationLock::new(());
        lock.close();
        assert!(matches!(lock.acquire("late").await, Err(RtcError::SessionClosed)));
    }

    #[tokio::test]
    async fn queued_operation_gives_up_after_close() {
        let lock   = Arc::new(NegotiationLock::new(0u32));
        let holder = lock.acquire("holder").await.unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move { lock.acquire("waiter").await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        lock.close();
        drop(holder);

        let res = waiter.await.unwrap();
        assert!(matches!(res, Err(RtcError::SessionClosed)));
        assert_eq!(lock.acquisitions(), 1);
    }

    #[tokio::test]
    async fn guard_released_on_error_path() {
        let lock = NegotiationLock::new(0u32);

        async fn failing(lock: &NegotiationLock<u32>) -> RtcResult<()> {
            let mut g = lock.acquire("failing").await?;
            *g = 7;
            Err(RtcError::Negotiation("boom".into()))
        }

        assert!(failing(&lock).await.is_err());
        // 해제되지 않았다면 여기서 영원히 대기
        let g = lock.acquire("after").await.unwrap();
        assert_eq!(*g, 7);
    }
}
