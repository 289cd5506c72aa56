pub mod engine;
pub mod orchestrator;
pub mod parser;
pub mod reporter;
pub mod resolver;

pub use crate::domain::model::{EntityKind, EntityRequest, ImportRun, Outcome, OutcomeStatus};
pub use crate::domain::ports::{Gateway, GatewayError, GatewayResult, ProgressSink, Storage};
pub use crate::utils::error::Result;
