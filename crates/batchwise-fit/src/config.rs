//! Fitting-loop configuration.
//!
//! ```
//! use batchwise_fit::FitConfig;
//!
//! let config = FitConfig::builder()
//!     .stop_threshold(1e-4)
//!     .max_iterations(50)
//!     .n_jobs(4)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.n_jobs, 4);
//! ```

use std::path::Path;

use batchwise_core::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};

/// Parameters of one call to the fitting loop.
///
/// Iteration continues while the improvement of the aggregate score exceeds
/// `stop_threshold` and fewer than `max_iterations` updates have been made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub stop_threshold: f64,
    pub max_iterations: usize,
    /// Summarization workers; 1 is sequential, 0 uses every core.
    pub n_jobs: usize,
    /// Batch size used when fitting an in-memory array; `None` = one batch.
    pub batch_size: Option<usize>,
    /// Log each iteration at info level instead of debug.
    pub verbose: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            stop_threshold: 1e-3,
            max_iterations: 1_000,
            n_jobs: 1,
            batch_size: None,
            verbose: false,
        }
    }
}

impl FitConfig {
    pub fn builder() -> FitConfigBuilder {
        FitConfigBuilder::default()
    }

    pub fn validate(&self) -> BatchResult<()> {
        if self.stop_threshold.is_nan() {
            return Err(BatchError::InvalidConfig(
                "stop_threshold must be a number".to_string(),
            ));
        }
        if self.batch_size == Some(0) {
            return Err(BatchError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> BatchResult<Self> {
        let config: FitConfig = serde_json::from_str(json)
            .map_err(|e| BatchError::InvalidConfig(format!("bad fit config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> BatchResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        FitConfig::from_json_str(&json)
    }
}

/// Builder for [`FitConfig`], validated on [`build`](FitConfigBuilder::build).
#[derive(Debug, Clone, Default)]
pub struct FitConfigBuilder {
    config: FitConfig,
}

impl FitConfigBuilder {
    pub fn stop_threshold(mut self, threshold: f64) -> Self {
        self.config.stop_threshold = threshold;
        self
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.config.max_iterations = n;
        self
    }

    pub fn n_jobs(mut self, n: usize) -> Self {
        self.config.n_jobs = n;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = Some(size);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> BatchResult<FitConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
