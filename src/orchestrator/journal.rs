//! On-disk record of each run attempt
//!
//! Every attempt writes its planner context, raw plan document and execution
//! log as separate files, and appends one summary line to `runs.jsonl`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::runner::AttemptRecord;
use crate::error::Result;

/// One line of `runs.jsonl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub objective: String,
    pub attempt: u32,
    pub steps: usize,
    pub success: Option<bool>,
    pub feedback: Option<String>,
}

pub struct RunJournal {
    dir: PathBuf,
    run_id: String,
}

impl RunJournal {
    /// Journal for a new run under `dir`, which is created if missing
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let run_id = Utc::now().format("%Y%m%d-%H%M%S%3f").to_string();
        Ok(Self { dir, run_id })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn attempt_path(&self, attempt: u32, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}-attempt-{}-{}", self.run_id, attempt, suffix))
    }

    pub fn record(&self, objective: &str, attempt: &AttemptRecord) -> Result<()> {
        fs::write(self.attempt_path(attempt.attempt, "context.txt"), &attempt.context)?;
        fs::write(self.attempt_path(attempt.attempt, "plan.json"), &attempt.plan_document)?;
        fs::write(self.attempt_path(attempt.attempt, "log.txt"), attempt.log.render())?;

        let entry = JournalEntry {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            objective: objective.to_string(),
            attempt: attempt.attempt,
            steps: attempt.log.len(),
            success: attempt.verdict.as_ref().map(|v| v.success),
            feedback: attempt.verdict.as_ref().map(|v| v.feedback.clone()),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join("runs.jsonl"))?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        Ok(())
    }
}
