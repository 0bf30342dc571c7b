//! # Repository Layer
//!
//! Thin wrappers around SeaORM operations for connections and change events.

pub mod change_event;
pub mod connection;

pub use change_event::{ChangeEventRepository, StageOutcome, TargetBatch, UpsertOutcome};
pub use connection::ConnectionRepository;
