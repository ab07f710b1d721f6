pub mod envelope;
pub mod provenance;
pub mod sample;

pub use envelope::{
    COMMAND_ENVELOPE_SCHEMA_VERSION, CommandEnvelope, CommandEnvelopeError, CommandFailure,
};
pub use provenance::{NodeId, Traced, merge_provenance};
pub use sample::{FailureKind, GoldQuery, Question, ScoreFailure, ScoreRecord};
