// author: kodeholic (powered by Claude)

pub mod code;
pub mod message;

pub use message::{
    CandidateInit, ClientEnvelope, ClientMessage, Envelope, Participant, ParticipantId,
    ServerEnvelope, ServerMessage,
};
