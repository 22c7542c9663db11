use crate::dtype::Float;
use crate::error::{BatchError, BatchResult};
use crate::shape::Shape;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense row-major tensor holding dataset contents and batch slices.
///
/// Stores data in a flat contiguous `Vec<T>`; the leading dimension indexes
/// examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Tensor<T: Float> {
    data: Vec<T>,
    shape: Shape,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Tensor<T> {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> BatchResult<Self> {
        let s = Shape::new(shape);
        if data.len() != s.numel() {
            return Err(BatchError::ShapeMismatch {
                expected: s.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: s })
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![T::ZERO; s.numel()],
            shape: s,
        }
    }

    /// Create a 1-D tensor from a slice.
    pub fn from_slice(data: &[T]) -> Self {
        Tensor {
            data: data.to_vec(),
            shape: Shape::new(vec![data.len()]),
        }
    }

    /// Create a 2-D tensor from a nested slice.
    pub fn from_vec2d(data: &[Vec<T>]) -> BatchResult<Self> {
        if data.is_empty() {
            return Ok(Tensor::zeros(vec![0, 0]));
        }
        let rows = data.len();
        let cols = data[0].len();
        if let Some(bad) = data.iter().find(|r| r.len() != cols) {
            return Err(BatchError::ShapeMismatch {
                expected: vec![cols],
                got: vec![bad.len()],
            });
        }
        let flat: Vec<T> = data.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::new(flat, vec![rows, cols])
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_vec(&self) -> Vec<usize> {
        self.shape.to_vec()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Size of the leading (example) dimension.
    pub fn rows(&self) -> usize {
        self.shape.leading()
    }

    /// Elements per leading-dimension entry.
    pub fn row_len(&self) -> usize {
        self.shape.row_numel()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Borrow one row (leading-dimension entry) as a flat slice.
    pub fn row(&self, i: usize) -> BatchResult<&[T]> {
        let rows = self.rows();
        if self.ndim() == 0 || i >= rows {
            return Err(BatchError::IndexOutOfBounds {
                index: i,
                axis: 0,
                size: rows,
            });
        }
        let width = self.row_len();
        Ok(&self.data[i * width..(i + 1) * width])
    }

    // ─── Shape Manipulation ─────────────────────────────────────────────────

    /// View a 1-D tensor as a single column; higher ranks are returned as-is.
    pub fn into_matrix(self) -> Tensor<T> {
        if self.ndim() == 1 {
            let n = self.data.len();
            return Tensor {
                data: self.data,
                shape: Shape::new(vec![n, 1]),
            };
        }
        self
    }

    /// Stack tensors along the leading dimension.
    pub fn concat_rows(tensors: &[&Tensor<T>]) -> BatchResult<Tensor<T>> {
        let first = tensors.first().ok_or_else(|| {
            BatchError::InvalidOperation("concat_rows needs at least one tensor".to_string())
        })?;
        if first.ndim() == 0 {
            return Err(BatchError::InvalidOperation(
                "concat_rows requires tensors of rank 1 or more".to_string(),
            ));
        }
        let trailing = &first.shape.dims()[1..];
        let mut data = Vec::new();
        let mut total_rows = 0usize;
        for t in tensors {
            if t.ndim() == 0 || &t.shape.dims()[1..] != trailing {
                return Err(BatchError::ShapeMismatch {
                    expected: first.shape_vec(),
                    got: t.shape_vec(),
                });
            }
            data.extend_from_slice(&t.data);
            total_rows += t.rows();
        }
        Ok(Tensor {
            data,
            shape: first.shape.with_leading(total_rows),
        })
    }

    // ─── Slicing ────────────────────────────────────────────────────────────

    /// Rows `[start, end)` as a new tensor; `start == end` gives an empty one.
    pub fn slice_rows(&self, start: usize, end: usize) -> BatchResult<Tensor<T>> {
        let rows = self.rows();
        if self.ndim() == 0 || start > end || end > rows {
            return Err(BatchError::IndexOutOfBounds {
                index: end,
                axis: 0,
                size: rows,
            });
        }
        let width = self.row_len();
        Ok(Tensor {
            data: self.data[start * width..end * width].to_vec(),
            shape: self.shape.with_leading(end - start),
        })
    }

    /// Gather the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> BatchResult<Tensor<T>> {
        let width = self.row_len();
        let mut data = Vec::with_capacity(indices.len() * width);
        for &i in indices {
            data.extend_from_slice(self.row(i)?);
        }
        Ok(Tensor {
            data,
            shape: self.shape.with_leading(indices.len()),
        })
    }
}

impl<T: Float> PartialEq for Tensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data == other.data
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

impl<T: Float> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor(shape={}, [", self.shape)?;
        for (i, v) in self.data.iter().take(6).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", v)?;
        }
        if self.data.len() > 6 {
            write!(f, ", ...")?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, cols: usize) -> Tensor<f64> {
        let data = (0..rows * cols).map(|v| v as f64).collect();
        Tensor::new(data, vec![rows, cols]).unwrap()
    }

    #[test]
    fn test_creation() {
        let t: Tensor<f64> = Tensor::zeros(vec![3, 4]);
        assert_eq!(t.shape_vec(), vec![3, 4]);
        assert_eq!(t.numel(), 12);
        assert!(Tensor::<f64>::new(vec![1.0; 5], vec![2, 3]).is_err());
    }

    #[test]
    fn test_from_vec2d() {
        let t: Tensor<f64> = Tensor::from_vec2d(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(t.shape_vec(), vec![2, 3]);
        assert_eq!(t.row(1).unwrap(), &[4.0, 5.0, 6.0]);

        let ragged = Tensor::<f64>::from_vec2d(&[vec![1.0], vec![2.0, 3.0]]);
        assert!(matches!(ragged, Err(BatchError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_row_access() {
        let t = grid(4, 3);
        assert_eq!(t.row(2).unwrap(), &[6.0, 7.0, 8.0]);
        assert!(t.row(4).is_err());
    }

    #[test]
    fn test_slice_rows() {
        let t = grid(5, 2);
        let s = t.slice_rows(3, 5).unwrap();
        assert_eq!(s.shape_vec(), vec![2, 2]);
        assert_eq!(s.data(), &[6.0, 7.0, 8.0, 9.0]);

        let empty = t.slice_rows(5, 5).unwrap();
        assert_eq!(empty.shape_vec(), vec![0, 2]);
        assert!(t.slice_rows(2, 6).is_err());
    }

    #[test]
    fn test_select_and_concat() {
        let t = grid(4, 2);
        let picked = t.select_rows(&[3, 0]).unwrap();
        assert_eq!(picked.data(), &[6.0, 7.0, 0.0, 1.0]);

        let a = t.slice_rows(0, 1).unwrap();
        let b = t.slice_rows(1, 4).unwrap();
        let joined = Tensor::concat_rows(&[&a, &b]).unwrap();
        assert_eq!(joined, t);

        let other = grid(2, 3);
        assert!(Tensor::concat_rows(&[&a, &other]).is_err());
    }

    #[test]
    fn test_into_matrix() {
        let v = Tensor::from_slice(&[1.0f64, 2.0, 3.0]).into_matrix();
        assert_eq!(v.shape_vec(), vec![3, 1]);
        assert_eq!(v.rows(), 3);
        assert_eq!(v.row_len(), 1);
    }
}
