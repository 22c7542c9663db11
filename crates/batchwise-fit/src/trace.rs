use std::time::Duration;

use batchwise_core::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};

/// Why the fitting loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Improvement fell to or below the threshold.
    Converged,
    /// The iteration limit was reached first. Not an error.
    MaxIterations,
}

/// One update-then-summarize round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub improvement: f64,
    pub score: f64,
    pub elapsed: Duration,
}

/// Outcome of a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitTrace {
    /// Score of the initial parameters.
    pub initial_score: f64,
    pub final_score: f64,
    pub batches_per_epoch: usize,
    pub records: Vec<IterationRecord>,
    pub termination: Termination,
    pub total_elapsed: Duration,
}

impl FitTrace {
    pub fn iterations(&self) -> usize {
        self.records.len()
    }

    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }

    /// Final minus initial score.
    pub fn total_improvement(&self) -> f64 {
        self.final_score - self.initial_score
    }

    pub fn to_json(&self) -> BatchResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BatchError::Format(format!("cannot serialize trace: {}", e)))
    }
}
