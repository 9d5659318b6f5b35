//! Signal fusion decision engine.
//!
//! Normalizes heterogeneous analyst reports, adjusts their confidence for data quality,
//! runs weighted voting with conflict detection and a confidence gate, and falls back to
//! single-source rules or LLM synthesis when too few reports are usable.

pub mod aggregator;
pub mod composer;
pub mod confidence;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod fallback;
pub mod gate;
pub mod normalizer;
pub mod sanity;

pub use aggregator::{aggregate, Aggregation, VoteTally};
pub use config::EngineConfig;
pub use conflict::ConflictState;
pub use engine::{DecisionEngine, PreparedInputs};
pub use signal_core::*;
