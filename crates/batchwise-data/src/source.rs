use batchwise_core::{BatchError, BatchResult, Float, Shape};

use crate::batch::Batch;

/// One epoch of batches, pulled lazily.
pub type Batches<'a, T> = Box<dyn Iterator<Item = BatchResult<Batch<T>>> + Send + 'a>;

/// A dataset that can be traversed batch by batch.
///
/// Every call to [`batches`](BatchSource::batches) starts a new, independent
/// epoch: cursor state lives in the returned iterator only. Within an epoch
/// the batches are disjoint and together cover all `len()` examples.
pub trait BatchSource<T: Float>: Send + Sync {
    /// Total number of examples; always equal to `shape().leading()`.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape(&self) -> Shape;

    fn ndim(&self) -> usize {
        self.shape().ndim()
    }

    /// Start a fresh traversal over the whole dataset.
    fn batches(&self) -> Batches<'_, T>;

    /// Capability query for labeled/unlabeled splitting.
    fn semi_supervised(&self) -> Option<&dyn SemiSupervised<T>> {
        None
    }
}

/// Sources that can restrict a traversal to labeled or unlabeled examples.
pub trait SemiSupervised<T: Float>: BatchSource<T> {
    fn labeled_batches(&self) -> Batches<'_, T>;
    fn unlabeled_batches(&self) -> Batches<'_, T>;
}

/// Like [`BatchSource::semi_supervised`] but as a `Result`.
pub fn require_semi_supervised<T, S>(source: &S) -> BatchResult<&dyn SemiSupervised<T>>
where
    T: Float,
    S: BatchSource<T> + ?Sized,
{
    source
        .semi_supervised()
        .ok_or(BatchError::NotImplemented("labeled/unlabeled batches"))
}

/// Resolve an optional batch size against the dataset length.
/// `None` means a single batch per epoch.
pub(crate) fn resolve_batch_size(batch_size: Option<usize>, len: usize) -> BatchResult<usize> {
    match batch_size {
        Some(0) => Err(BatchError::InvalidConfig(
            "batch size must be at least 1".to_string(),
        )),
        Some(b) => Ok(b),
        None => Ok(len.max(1)),
    }
}

/// Sources hold `[examples, features]` data; 1-D input is viewed as a
/// column before this check.
pub(crate) fn check_matrix(shape: &Shape) -> BatchResult<()> {
    if shape.ndim() != 2 {
        log::warn!("rejecting source data of shape {}", shape);
        return Err(BatchError::DimensionMismatch(format!(
            "source data must be 1-D or 2-D, got shape {}",
            shape
        )));
    }
    Ok(())
}

pub(crate) fn check_aligned(what: &str, expected: usize, got: usize) -> BatchResult<()> {
    if expected != got {
        log::warn!("{} length {} does not match dataset length {}", what, got, expected);
        return Err(BatchError::ShapeMismatch {
            expected: vec![expected],
            got: vec![got],
        });
    }
    Ok(())
}

/// `[start, end)` windows of a fixed width over `0..len`, last one clamped.
#[derive(Debug, Clone)]
pub struct Windows {
    start: usize,
    len: usize,
    size: usize,
}

impl Windows {
    pub fn new(len: usize, size: usize) -> Self {
        Windows {
            start: 0,
            len,
            size: size.max(1),
        }
    }
}

impl Iterator for Windows {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.len {
            return None;
        }
        let end = self.start.saturating_add(self.size).min(self.len);
        let window = (self.start, end);
        self.start = end;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len.saturating_sub(self.start).div_ceil(self.size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}
