pub mod config;
pub mod driver;
pub mod executor;
pub mod models;
pub mod summary;
pub mod trace;

pub use config::{FitConfig, FitConfigBuilder};
pub use driver::{fit, fit_array, FitDriver};
pub use executor::Executor;
pub use models::{KMeans, NormalDistribution};
pub use summary::{reduce, Fittable, Summary};
pub use trace::{FitTrace, IterationRecord, Termination};
