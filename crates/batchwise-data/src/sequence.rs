use batchwise_core::{BatchError, BatchResult, Float, Shape, Tensor};
use log::debug;

use crate::batch::Batch;
use crate::source::{check_aligned, BatchSource, Batches};

/// Batches over a collection of variable-length sequences.
///
/// Order-dependent models summarize a whole sequence at a time, so every
/// batch is exactly one sequence, in input order. `shape()` reports
/// `[n_sequences, n_features]`; step counts are available from
/// [`lengths`](SequenceGenerator::lengths).
pub struct SequenceGenerator<T: Float> {
    sequences: Vec<Tensor<T>>,
    weights: Option<Vec<T>>,
    n_features: usize,
}

impl<T: Float> SequenceGenerator<T> {
    /// Each sequence is `[steps, features]`; a 1-D sequence has one feature.
    /// All sequences must agree on the feature count.
    pub fn new(sequences: Vec<Tensor<T>>) -> BatchResult<Self> {
        let sequences: Vec<Tensor<T>> = sequences.into_iter().map(Tensor::into_matrix).collect();
        let n_features = sequences.first().map_or(0, Tensor::row_len);
        for seq in &sequences {
            if seq.ndim() != 2 || seq.row_len() != n_features {
                return Err(BatchError::ShapeMismatch {
                    expected: vec![seq.rows(), n_features],
                    got: seq.shape_vec(),
                });
            }
        }
        debug!("sequence generator over {} sequences of {} features", sequences.len(), n_features);
        Ok(SequenceGenerator {
            sequences,
            weights: None,
            n_features,
        })
    }

    /// Single-feature sequences from plain vectors.
    pub fn from_vecs(sequences: Vec<Vec<T>>) -> BatchResult<Self> {
        SequenceGenerator::new(sequences.iter().map(|s| Tensor::from_slice(s)).collect())
    }

    /// One weight per sequence, applied to each of its steps.
    pub fn with_weights(mut self, weights: Vec<T>) -> BatchResult<Self> {
        check_aligned("sequence weights", self.sequences.len(), weights.len())?;
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Step count of every sequence.
    pub fn lengths(&self) -> Vec<usize> {
        self.sequences.iter().map(Tensor::rows).collect()
    }

    pub fn total_steps(&self) -> usize {
        self.sequences.iter().map(Tensor::rows).sum()
    }
}

impl<T: Float> BatchSource<T> for SequenceGenerator<T> {
    fn len(&self) -> usize {
        self.sequences.len()
    }

    fn shape(&self) -> Shape {
        Shape::new(vec![self.sequences.len(), self.n_features])
    }

    fn batches(&self) -> Batches<'_, T> {
        Box::new(self.sequences.iter().enumerate().map(move |(i, seq)| {
            let w = self.weights.as_ref().map_or(T::ONE, |w| w[i]);
            Batch::new(seq.clone(), vec![w; seq.rows()])
        }))
    }
}
