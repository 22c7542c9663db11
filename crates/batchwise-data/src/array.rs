use batchwise_core::{BatchResult, Float, Shape, Tensor};
use batchwise_io::Table;
use log::debug;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::batch::Batch;
use crate::source::{check_aligned, check_matrix, resolve_batch_size, BatchSource, Batches, SemiSupervised, Windows};

/// Batches over an array that is already in memory.
///
/// Each epoch splits the rows into contiguous chunks of `batch_size` in
/// original order (the last chunk may be shorter). With
/// [`with_shuffle`](ArrayGenerator::with_shuffle) each epoch instead draws a
/// fresh permutation from the supplied random source.
pub struct ArrayGenerator<T: Float> {
    x: Tensor<T>,
    weights: Option<Vec<T>>,
    labels: Option<Vec<Option<usize>>>,
    columns: Option<Vec<String>>,
    batch_size: usize,
    rng: Option<Mutex<StdRng>>,
}

impl<T: Float> ArrayGenerator<T> {
    /// Wrap `x`; a 1-D array is treated as a single feature column and
    /// anything above rank 2 is rejected.
    /// `batch_size = None` yields the whole array as one batch.
    pub fn new(x: Tensor<T>, batch_size: Option<usize>) -> BatchResult<Self> {
        let x = x.into_matrix();
        check_matrix(x.shape())?;
        let batch_size = resolve_batch_size(batch_size, x.rows())?;
        debug!("array generator over {} in batches of {}", x.shape(), batch_size);
        Ok(ArrayGenerator {
            x,
            weights: None,
            labels: None,
            columns: None,
            batch_size,
            rng: None,
        })
    }

    /// Normalize a named-column table, remembering the column order.
    pub fn from_table(table: Table<T>, batch_size: Option<usize>) -> BatchResult<Self> {
        let (columns, values) = table.into_parts();
        let mut gen = ArrayGenerator::new(values, batch_size)?;
        gen.columns = Some(columns);
        Ok(gen)
    }

    /// One weight per row.
    pub fn with_weights(mut self, weights: Vec<T>) -> BatchResult<Self> {
        check_aligned("weights", self.x.rows(), weights.len())?;
        self.weights = Some(weights);
        Ok(self)
    }

    /// One label per row; `None` marks an unlabeled example. Enables
    /// [`BatchSource::semi_supervised`].
    pub fn with_labels(mut self, labels: Vec<Option<usize>>) -> BatchResult<Self> {
        check_aligned("labels", self.x.rows(), labels.len())?;
        self.labels = Some(labels);
        Ok(self)
    }

    /// Visit rows in a new random order every epoch.
    pub fn with_shuffle(mut self, rng: StdRng) -> Self {
        self.rng = Some(Mutex::new(rng));
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Column names when built from a table.
    pub fn column_names(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn data(&self) -> &Tensor<T> {
        &self.x
    }

    fn traverse(&self, mut order: Option<Vec<usize>>) -> Batches<'_, T> {
        if let Some(rng) = &self.rng {
            let mut indices = order.unwrap_or_else(|| (0..self.x.rows()).collect());
            indices.shuffle(&mut *rng.lock());
            order = Some(indices);
        }
        let len = order.as_ref().map_or(self.x.rows(), Vec::len);
        Box::new(Windows::new(len, self.batch_size).map(move |(start, end)| match &order {
            Some(indices) => self.gather(&indices[start..end]),
            None => self.contiguous(start, end),
        }))
    }

    fn contiguous(&self, start: usize, end: usize) -> BatchResult<Batch<T>> {
        let x = self.x.slice_rows(start, end)?;
        let weights = match &self.weights {
            Some(w) => w[start..end].to_vec(),
            None => vec![T::ONE; end - start],
        };
        let batch = Batch::new(x, weights)?;
        match &self.labels {
            Some(labels) => batch.with_labels(labels[start..end].to_vec()),
            None => Ok(batch),
        }
    }

    fn gather(&self, indices: &[usize]) -> BatchResult<Batch<T>> {
        let x = self.x.select_rows(indices)?;
        let weights = match &self.weights {
            Some(w) => indices.iter().map(|&i| w[i]).collect(),
            None => vec![T::ONE; indices.len()],
        };
        let batch = Batch::new(x, weights)?;
        match &self.labels {
            Some(labels) => batch.with_labels(indices.iter().map(|&i| labels[i]).collect()),
            None => Ok(batch),
        }
    }

    fn indices_where(&self, labeled: bool) -> Vec<usize> {
        self.labels
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, l)| l.is_some() == labeled)
            .map(|(i, _)| i)
            .collect()
    }
}

impl<T: Float> BatchSource<T> for ArrayGenerator<T> {
    fn len(&self) -> usize {
        self.x.rows()
    }

    fn shape(&self) -> Shape {
        self.x.shape().clone()
    }

    fn batches(&self) -> Batches<'_, T> {
        self.traverse(None)
    }

    fn semi_supervised(&self) -> Option<&dyn SemiSupervised<T>> {
        match self.labels {
            Some(_) => Some(self),
            None => None,
        }
    }
}

impl<T: Float> SemiSupervised<T> for ArrayGenerator<T> {
    fn labeled_batches(&self) -> Batches<'_, T> {
        self.traverse(Some(self.indices_where(true)))
    }

    fn unlabeled_batches(&self) -> Batches<'_, T> {
        self.traverse(Some(self.indices_where(false)))
    }
}
