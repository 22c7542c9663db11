use crate::error::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};

/// Ordered dimension sizes of a dataset, batch or tensor.
///
/// For batch sources the first dimension is always the example count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    pub fn from_slice(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Size along a specific axis.
    pub fn dim(&self, axis: usize) -> BatchResult<usize> {
        self.dims.get(axis).copied().ok_or(BatchError::InvalidAxis {
            axis,
            ndim: self.ndim(),
        })
    }

    /// Size of the leading dimension, 0 for a rank-0 shape.
    pub fn leading(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Number of elements in one entry along the leading dimension.
    pub fn row_numel(&self) -> usize {
        self.dims.iter().skip(1).product()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        if self.dims.is_empty() {
            1
        } else {
            self.dims.iter().product()
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.dims.clone()
    }

    /// Same trailing dimensions with a different leading size.
    pub fn with_leading(&self, n: usize) -> Shape {
        let mut dims = self.dims.clone();
        match dims.first_mut() {
            Some(d) => *d = n,
            None => dims.push(n),
        }
        Shape::new(dims)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}
