//! Lazy batch sources.
//!
//! A [`BatchSource`] hands out one epoch of [`Batch`]es per call to
//! `batches()`. Adapters:
//!
//! - [`ArrayGenerator`] — an in-memory array (or a named-column [`Table`]),
//!   contiguous fixed-size chunks, optional per-epoch shuffling
//! - [`DiskGenerator`] — a `.npy` file read one window at a time
//! - [`SequenceGenerator`] — variable-length sequences, one per batch

pub mod array;
pub mod batch;
pub mod disk;
pub mod sequence;
pub mod source;

pub use array::ArrayGenerator;
pub use batch::Batch;
pub use batchwise_io::Table;
pub use disk::DiskGenerator;
pub use sequence::SequenceGenerator;
pub use source::{require_semi_supervised, BatchSource, Batches, SemiSupervised, Windows};
