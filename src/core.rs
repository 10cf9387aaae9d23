// author: kodeholic (powered by Claude)
// 협상 엔진: 네트워크 전송과 분리된 순수 상태/프로토콜 모듈

pub mod candidate;
pub mod lock;
pub mod partner;
pub mod probe;
pub mod roster;
pub mod signaling;

pub use candidate::{CandidateBuffer, DrainReport};
pub use lock::{NegotiationGuard, NegotiationLock};
pub use partner::{Partner, Topology};
pub use probe::{LossProbe, LossProbeHandle, ProbeTarget};
pub use roster::RosterManager;
pub use signaling::{
    NegotiationSession, NegotiationSnapshot, RelayTx, SignalingPhase, SignalingStateMachine,
};
