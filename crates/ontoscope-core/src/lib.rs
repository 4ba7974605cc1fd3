// Public fallible APIs in this crate share one concrete error contract (`OntoscopeError`).
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod client;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod inference;
#[cfg(feature = "narrative-http")]
pub(crate) mod llm_io;
pub mod models;
#[cfg(feature = "narrative-http")]
pub mod narrative_http;
pub mod ontology;
pub mod state;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{EvaluateRequest, Ontoscope};
pub use config::EngineConfig;
pub use engine::{CancelFlag, Collaborators, EvaluationReport, OntologyEngine};
pub use error::{OntoscopeError, Result};
pub use state::SqliteStateStore;
