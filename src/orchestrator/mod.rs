//! Model-driven proofing runs

pub mod agents;
pub mod journal;
pub mod runner;
pub mod verdict;

pub use agents::Agents;
pub use journal::{JournalEntry, RunJournal};
pub use runner::{AttemptRecord, FEEDBACK_HEADER, Orchestrator, OrchestratorConfig, RunOutcome, RunReport, plan_context};
pub use verdict::{ValidationVerdict, parse_verdict};
