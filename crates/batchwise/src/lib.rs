//! # batchwise
//!
//! Lazy batch generation and out-of-core iterative model fitting.
//!
//! ## Modules
//!
//! - **core** — `Tensor`, `Shape`, the `Float` element trait and `BatchError`
//! - **io** — NumPy `.npy` headers and row-window reads, CSV tables
//! - **data** — `BatchSource` trait with array, disk and sequence adapters
//! - **fit** — summarize / reduce / update driver, executor, reference models
//! - **datasets** — synthetic blobs and sequences
//!
//! ```
//! use batchwise::core::Tensor;
//! use batchwise::data::{ArrayGenerator, BatchSource};
//! use batchwise::fit::{fit, FitConfig, NormalDistribution};
//!
//! let x = Tensor::new((0..100).map(|i| i as f64).collect(), vec![50, 2]).unwrap();
//! let source = ArrayGenerator::new(x, Some(16)).unwrap();
//! assert_eq!(source.batches().count(), 4);
//!
//! let mut model = NormalDistribution::new(2);
//! let trace = fit(&mut model, &source, &FitConfig::default()).unwrap();
//! assert!(trace.converged());
//! ```

/// Tensors, shapes and errors.
pub use batchwise_core as core;

/// On-disk formats.
pub use batchwise_io as io;

/// Batch sources.
pub use batchwise_data as data;

/// Fitting driver and models.
pub use batchwise_fit as fit;

/// Synthetic datasets.
pub use batchwise_datasets as datasets;
