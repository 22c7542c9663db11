use batchwise_core::{BatchError, BatchResult, Float, Tensor};

/// One unit of work handed to a summarization step.
///
/// `x` is always 2-D (`[rows, features]`); `weights` and, when present,
/// `labels` are aligned with its rows. A `None` label marks an unlabeled
/// example.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T: Float> {
    pub x: Tensor<T>,
    pub weights: Vec<T>,
    pub labels: Option<Vec<Option<usize>>>,
}

impl<T: Float> Batch<T> {
    pub fn new(x: Tensor<T>, weights: Vec<T>) -> BatchResult<Self> {
        let x = x.into_matrix();
        if x.ndim() != 2 {
            return Err(BatchError::DimensionMismatch(format!(
                "batch features must be 2-D, got shape {}",
                x.shape()
            )));
        }
        if weights.len() != x.rows() {
            return Err(BatchError::ShapeMismatch {
                expected: vec![x.rows()],
                got: vec![weights.len()],
            });
        }
        Ok(Batch {
            x,
            weights,
            labels: None,
        })
    }

    /// Batch with every weight set to one.
    pub fn unweighted(x: Tensor<T>) -> BatchResult<Self> {
        let n = x.rows();
        Batch::new(x, vec![T::ONE; n])
    }

    pub fn with_labels(mut self, labels: Vec<Option<usize>>) -> BatchResult<Self> {
        if labels.len() != self.len() {
            return Err(BatchError::ShapeMismatch {
                expected: vec![self.len()],
                got: vec![labels.len()],
            });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.x.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_features(&self) -> usize {
        self.x.row_len()
    }

    pub fn total_weight(&self) -> T {
        self.weights.iter().copied().sum()
    }
}
