//! Explode-until-stable convergence engine
//!
//! Drives the drawing toward a fixed point where only whitelisted primitive
//! types remain: repeated explode passes, a stall detector for irreducible
//! residue, a hard pass ceiling, then one erase sweep.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::host::{DrawingHost, EntityKind, EntityQuery};

/// Polling barrier used after each explode pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Final-form entity types
    pub whitelist: Vec<EntityKind>,
    pub max_passes: u32,
    /// Consecutive repeats of the same count that mean no further progress
    pub stall_threshold: u32,
    pub settle: SettleConfig,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            whitelist: vec![
                EntityKind::Arc,
                EntityKind::Line,
                EntityKind::Circle,
                EntityKind::Ellipse,
                EntityKind::LwPolyline,
                EntityKind::Text,
                EntityKind::Solid,
            ],
            max_passes: 30,
            stall_threshold: 2,
            settle: SettleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceOutcome {
    /// Nothing outside the whitelist remained
    Converged,
    /// Explode stopped making progress
    Stalled { residual: usize },
    /// Ran out of passes while counts were still moving
    PassLimit { residual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub passes: u32,
    pub erased: usize,
    pub flattened: usize,
    pub outcome: ConvergenceOutcome,
}

impl fmt::Display for ConvergenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            ConvergenceOutcome::Converged => "converged".to_string(),
            ConvergenceOutcome::Stalled { residual } => format!("stalled with {} unexplodable", residual),
            ConvergenceOutcome::PassLimit { residual } => format!("pass limit hit with {} remaining", residual),
        };
        write!(
            f,
            "Geometry prepared in {} pass(es), {}; flattened {}, erased {}",
            self.passes, outcome, self.flattened, self.erased
        )
    }
}

enum PassDecision {
    Converged,
    Stalled,
    Explode,
}

/// Per-call loop state; dropped when the call returns
#[derive(Debug, Default)]
struct ConvergenceState {
    pass_count: u32,
    previous_count: Option<usize>,
    identical_streak: u32,
}

impl ConvergenceState {
    fn observe(&mut self, count: usize, stall_threshold: u32) -> PassDecision {
        if count == 0 {
            return PassDecision::Converged;
        }
        if self.previous_count == Some(count) {
            self.identical_streak += 1;
            if self.identical_streak >= stall_threshold {
                return PassDecision::Stalled;
            }
        } else {
            self.identical_streak = 0;
        }
        self.previous_count = Some(count);
        PassDecision::Explode
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConvergenceEngine {
    config: ConvergenceConfig,
}

impl ConvergenceEngine {
    pub fn new(config: ConvergenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    fn non_standard(&self) -> EntityQuery {
        EntityQuery::excluding(self.config.whitelist.iter().cloned())
    }

    /// Full preparation: shield output layers, flatten splines, explode to a
    /// fixed point, then erase whatever could not be reduced
    pub async fn prepare_geometry(&self, host: &dyn DrawingHost, shielded_layers: &[String]) -> Result<ConvergenceReport> {
        self.shield_layers(host, shielded_layers).await?;
        let flattened = self.flatten_curves(host).await?;
        let (passes, outcome) = self.converge(host).await?;
        let erased = self.delete_non_standard(host).await?;

        let report = ConvergenceReport {
            passes,
            erased,
            flattened,
            outcome,
        };
        tracing::info!(passes, erased, flattened, outcome = ?report.outcome, "geometry prepared");
        Ok(report)
    }

    /// Unlock every layer, then re-lock the shielded ones that exist
    pub async fn shield_layers(&self, host: &dyn DrawingHost, shielded_layers: &[String]) -> Result<()> {
        for layer in host.list_layers().await? {
            if layer.locked {
                host.set_layer_lock(&layer.name, false).await?;
            }
        }
        for name in shielded_layers {
            if let Some(layer) = host.find_layer(name).await? {
                host.set_layer_lock(&layer.name, true).await?;
            }
        }
        Ok(())
    }

    /// Reduce splines to polylines; explode is the wrong tool for curves
    pub async fn flatten_curves(&self, host: &dyn DrawingHost) -> Result<usize> {
        let splines = host.query_entities(&EntityQuery::of_kinds([EntityKind::Spline])).await?;
        if splines.is_empty() {
            return Ok(0);
        }
        host.flatten_selection(&splines).await
    }

    /// The explode loop. Returns passes taken and how it ended.
    pub async fn converge(&self, host: &dyn DrawingHost) -> Result<(u32, ConvergenceOutcome)> {
        let query = self.non_standard();
        let mut state = ConvergenceState::default();
        let mut last_count = 0;

        while state.pass_count < self.config.max_passes {
            state.pass_count += 1;
            let targets = host.query_entities(&query).await?;
            last_count = targets.len();
            tracing::debug!(pass = state.pass_count, non_standard = last_count, "convergence pass");

            match state.observe(last_count, self.config.stall_threshold) {
                PassDecision::Converged => return Ok((state.pass_count, ConvergenceOutcome::Converged)),
                PassDecision::Stalled => {
                    return Ok((
                        state.pass_count,
                        ConvergenceOutcome::Stalled { residual: last_count },
                    ));
                }
                PassDecision::Explode => {
                    host.explode_selection(&targets).await?;
                    last_count = self.settle(host, &query).await?;
                }
            }
        }

        tracing::warn!(passes = state.pass_count, residual = last_count, "convergence pass limit reached");
        Ok((state.pass_count, ConvergenceOutcome::PassLimit { residual: last_count }))
    }

    /// Poll the count until two consecutive reads agree or the timeout passes
    async fn settle(&self, host: &dyn DrawingHost, query: &EntityQuery) -> Result<usize> {
        let interval = Duration::from_millis(self.config.settle.poll_interval_ms);
        let deadline = Instant::now() + Duration::from_millis(self.config.settle.timeout_ms);
        let mut previous = host.count_entities(query).await?;
        loop {
            tokio::time::sleep(interval).await;
            let current = host.count_entities(query).await?;
            if current == previous || Instant::now() >= deadline {
                return Ok(current);
            }
            previous = current;
        }
    }

    /// Erase everything outside the whitelist; returns how many went
    pub async fn delete_non_standard(&self, host: &dyn DrawingHost) -> Result<usize> {
        let remainder = host.query_entities(&self.non_standard()).await?;
        if remainder.is_empty() {
            return Ok(0);
        }
        host.erase_selection(&remainder).await
    }

    /// One explode pass over every entity of `kind`; returns counts before and after
    pub async fn qselect_explode(&self, host: &dyn DrawingHost, kind: &EntityKind) -> Result<(usize, usize)> {
        let query = EntityQuery::of_kinds([kind.clone()]);
        let targets = host.query_entities(&query).await?;
        if targets.is_empty() {
            return Ok((0, 0));
        }
        host.explode_selection(&targets).await?;
        let after = self.settle(host, &query).await?;
        Ok((targets.len(), after))
    }
}
