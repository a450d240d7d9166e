//! Floorproof - model-driven proofing of exhibition-floor CAD drawings
//!
//! A language model surveys the drawing and plans a sequence of commands; the
//! dispatcher runs them against a drawing host; a validator judges the result
//! and a failed run is retried once with the validator's feedback.

pub mod error;
pub mod geometry;
pub mod host;
pub mod layers;
pub mod llm;
pub mod orchestrator;
pub mod plan;
pub mod tools;

pub use error::{ProofError, Result};
