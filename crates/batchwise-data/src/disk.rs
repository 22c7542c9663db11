use std::marker::PhantomData;
use std::path::Path;

use batchwise_core::{BatchError, BatchResult, Float, Shape};
use batchwise_io::{NpyFile, NpyReader};
use log::{debug, info};

use crate::batch::Batch;
use crate::source::{check_aligned, check_matrix, resolve_batch_size, BatchSource, Batches, Windows};

/// Batches read from a `.npy` file on disk, one window at a time.
///
/// Only headers are read at construction. Each traversal opens its own file
/// handles and materializes rows `[start, start + batch_size)` as it goes, so
/// at most one batch of the dataset is resident per traversal.
pub struct DiskGenerator<T: Float> {
    data: NpyFile,
    weights: Option<NpyFile>,
    shape: Shape,
    batch_size: usize,
    _elem: PhantomData<fn() -> T>,
}

impl<T: Float> DiskGenerator<T> {
    /// `weights`, when given, must be a 1-D array with one entry per row;
    /// without it every row weighs 1.0. `batch_size = None` reads the whole
    /// file as a single batch.
    pub fn new<P: AsRef<Path>>(data: P, weights: Option<P>, batch_size: Option<usize>) -> BatchResult<Self> {
        let data = NpyFile::open(data)?;
        let mut shape = data.shape().clone();
        if shape.ndim() == 1 {
            shape = Shape::new(vec![shape.leading(), 1]);
        }
        check_matrix(&shape)?;

        let weights = match weights {
            Some(path) => {
                let w = NpyFile::open(path)?;
                if w.shape().row_numel() != 1 {
                    return Err(BatchError::ShapeMismatch {
                        expected: vec![shape.leading()],
                        got: w.shape().to_vec(),
                    });
                }
                check_aligned("weights", shape.leading(), w.len())?;
                Some(w)
            }
            None => None,
        };

        let batch_size = resolve_batch_size(batch_size, shape.leading())?;
        info!(
            "disk generator over {} shape={} batch_size={} weights={}",
            data.path().display(),
            shape,
            batch_size,
            weights.is_some()
        );
        Ok(DiskGenerator {
            data,
            weights,
            shape,
            batch_size,
            _elem: PhantomData,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn path(&self) -> &Path {
        self.data.path()
    }

    fn open_readers(&self) -> BatchResult<(NpyReader, Option<NpyReader>)> {
        let weights = match &self.weights {
            Some(w) => Some(w.reader()?),
            None => None,
        };
        Ok((self.data.reader()?, weights))
    }
}

impl<T: Float> BatchSource<T> for DiskGenerator<T> {
    fn len(&self) -> usize {
        self.shape.leading()
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn batches(&self) -> Batches<'_, T> {
        debug!("new traversal over {}", self.data.path().display());
        Box::new(DiskBatches {
            source: self,
            windows: Windows::new(self.len(), self.batch_size),
            readers: None,
            failed: false,
        })
    }
}

struct DiskBatches<'a, T: Float> {
    source: &'a DiskGenerator<T>,
    windows: Windows,
    readers: Option<(NpyReader, Option<NpyReader>)>,
    failed: bool,
}

impl<T: Float> DiskBatches<'_, T> {
    fn read(&mut self, start: usize, end: usize) -> BatchResult<Batch<T>> {
        let readers = match self.readers.take() {
            Some(readers) => readers,
            None => self.source.open_readers()?,
        };
        let (data, weights) = self.readers.insert(readers);

        let x = data.read_rows::<T>(start, end)?;
        let w = match weights {
            Some(reader) => reader.read_rows::<T>(start, end)?.into_data(),
            None => vec![T::ONE; end - start],
        };
        Batch::new(x, w)
    }
}

impl<T: Float> Iterator for DiskBatches<'_, T> {
    type Item = BatchResult<Batch<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (start, end) = self.windows.next()?;
        let batch = self.read(start, end);
        self.failed = batch.is_err();
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            self.windows.size_hint()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayGenerator;
    use batchwise_core::Tensor;
    use batchwise_io::{write_npy, DType};
    use std::path::PathBuf;

    fn temp_npy(name: &str, t: &Tensor<f64>) -> PathBuf {
        let path = std::env::temp_dir().join(format!("batchwise-disk-{}-{}.npy", std::process::id(), name));
        write_npy(&path, t, DType::F8).unwrap();
        path
    }

    fn arange(rows: usize, cols: usize) -> Tensor<f64> {
        Tensor::new((0..rows * cols).map(|v| v as f64).collect(), vec![rows, cols]).unwrap()
    }

    #[test]
    fn test_windows_match_in_memory() {
        let t = arange(23, 3);
        let path = temp_npy("match", &t);
        let disk: DiskGenerator<f64> = DiskGenerator::new(&path, None, Some(5)).unwrap();
        let mem = ArrayGenerator::new(t, Some(5)).unwrap();

        let a: Vec<_> = disk.batches().collect::<BatchResult<_>>().unwrap();
        let b: Vec<_> = mem.batches().collect::<BatchResult<_>>().unwrap();
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_weights_read_from_disk() {
        let t = arange(6, 2);
        let w = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let data_path = temp_npy("wdata", &t);
        let weight_path = temp_npy("wweights", &w);

        let disk: DiskGenerator<f64> = DiskGenerator::new(&data_path, Some(&weight_path), Some(4)).unwrap();
        let batches: Vec<_> = disk.batches().collect::<BatchResult<_>>().unwrap();
        assert_eq!(batches[0].weights, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(batches[1].weights, vec![5.0, 6.0]);
        std::fs::remove_file(&data_path).ok();
        std::fs::remove_file(&weight_path).ok();
    }

    #[test]
    fn test_weight_length_mismatch_fails_at_construction() {
        let data_path = temp_npy("mmdata", &arange(6, 2));
        let weight_path = temp_npy("mmweights", &Tensor::from_slice(&[1.0; 5]));
        let result = DiskGenerator::<f64>::new(&data_path, Some(&weight_path), Some(2));
        assert!(matches!(result, Err(BatchError::ShapeMismatch { .. })));
        std::fs::remove_file(&data_path).ok();
        std::fs::remove_file(&weight_path).ok();
    }

    #[test]
    fn test_default_batch_size_is_whole_file() {
        let path = temp_npy("whole", &arange(12, 4));
        let disk: DiskGenerator<f64> = DiskGenerator::new(&path, None, None).unwrap();
        assert_eq!(disk.batch_size(), 12);
        assert_eq!(disk.batches().count(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_one_dim_file_is_a_column() {
        let path = temp_npy("column", &Tensor::from_slice(&[4.0, 5.0, 6.0]));
        let disk: DiskGenerator<f32> = DiskGenerator::new(&path, None, Some(2)).unwrap();
        assert_eq!(disk.shape().dims(), &[3, 1]);
        let first = disk.batches().next().unwrap().unwrap();
        assert_eq!(first.x.data(), &[4.0f32, 5.0]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rank_three_file_rejected_at_construction() {
        let cube = Tensor::new((0..24).map(|v| v as f64).collect(), vec![4, 2, 3]).unwrap();
        let path = temp_npy("cube", &cube);
        let result = DiskGenerator::<f64>::new(&path, None, Some(2));
        assert!(matches!(result, Err(BatchError::DimensionMismatch(_))));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_traversal_stops_after_read_error() {
        let path = temp_npy("truncated", &arange(10, 2));
        let disk: DiskGenerator<f64> = DiskGenerator::new(&path, None, Some(4)).unwrap();

        // Keep the header and the first four rows only.
        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 6 * 2 * 8).unwrap();
        drop(file);

        let mut batches = disk.batches();
        assert_eq!(batches.next().unwrap().unwrap().len(), 4);
        assert!(matches!(batches.next(), Some(Err(BatchError::Io(_)))));
        assert!(batches.next().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_oversized_batch_is_whole_file() {
        let path = temp_npy("oversized", &arange(5, 2));
        let disk: DiskGenerator<f64> = DiskGenerator::new(&path, None, Some(usize::MAX)).unwrap();
        let batches = disk.batches();
        assert_eq!(batches.size_hint(), (1, Some(1)));
        assert_eq!(batches.count(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = DiskGenerator::<f64>::new("/nonexistent/batchwise.npy", None, None);
        assert!(matches!(result, Err(BatchError::Io(_))));
    }
}
