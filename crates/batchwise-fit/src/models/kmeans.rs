use batchwise_core::{BatchError, BatchResult, Float, Tensor};
use batchwise_data::{Batch, BatchSource};
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;

use crate::summary::{add_into, Fittable, Summary};

/// K-Means clustering fit from per-batch cluster sums (Lloyd's algorithm).
///
/// Centroids must be set before fitting, either directly or with
/// [`initialize`](KMeans::initialize) (k-means++ on the first batch).
#[derive(Debug, Clone)]
pub struct KMeans<T: Float> {
    pub n_clusters: usize,
    centroids: Option<Tensor<T>>,
}

/// Per-cluster weighted sums and weights, plus weighted inertia.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KMeansSummary {
    pub sums: Vec<f64>,
    pub weights: Vec<f64>,
    pub inertia: f64,
}

impl Summary for KMeansSummary {
    fn merge(&mut self, other: Self) {
        add_into(&mut self.sums, other.sums);
        add_into(&mut self.weights, other.weights);
        self.inertia += other.inertia;
    }

    /// Negative inertia, so that improvement is positive as clusters tighten.
    fn score(&self) -> f64 {
        -self.inertia
    }
}

impl<T: Float> KMeans<T> {
    pub fn new(n_clusters: usize) -> Self {
        KMeans {
            n_clusters,
            centroids: None,
        }
    }

    /// Start from explicit `[n_clusters, n_features]` centroids.
    pub fn with_centroids(centroids: Tensor<T>) -> BatchResult<Self> {
        if centroids.ndim() != 2 || centroids.rows() == 0 {
            return Err(BatchError::DimensionMismatch(format!(
                "centroids must be a non-empty 2-D tensor, got shape {}",
                centroids.shape()
            )));
        }
        Ok(KMeans {
            n_clusters: centroids.rows(),
            centroids: Some(centroids),
        })
    }

    pub fn centroids(&self) -> Option<&Tensor<T>> {
        self.centroids.as_ref()
    }

    /// k-means++ seeding from the first batch of a fresh traversal.
    pub fn initialize<S>(&mut self, source: &S, rng: &mut StdRng) -> BatchResult<()>
    where
        S: BatchSource<T> + ?Sized,
    {
        if self.n_clusters == 0 {
            return Err(BatchError::InvalidConfig("n_clusters must be at least 1".to_string()));
        }
        let batch = match source.batches().next() {
            Some(batch) => batch?,
            None => return Err(BatchError::EmptyBatchSource),
        };
        if batch.is_empty() {
            return Err(BatchError::EmptyBatchSource);
        }
        let x = &batch.x;
        let n = x.rows();
        let d = x.row_len();

        let mut centroids: Vec<T> = Vec::with_capacity(self.n_clusters * d);
        let first = rng.gen_range(0..n);
        centroids.extend_from_slice(x.row(first)?);

        // Remaining centroids proportional to distance²
        let mut distances = vec![T::INFINITY; n];
        for k in 1..self.n_clusters {
            let newest = &centroids[(k - 1) * d..k * d];
            for (i, dist) in distances.iter_mut().enumerate() {
                let candidate = squared_distance(x.row(i)?, newest);
                if candidate < *dist {
                    *dist = candidate;
                }
            }

            let total: f64 = distances.iter().map(|v| v.to_f64()).sum();
            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut selected = n - 1;
            for (i, dist) in distances.iter().enumerate() {
                cumulative += dist.to_f64();
                if cumulative >= threshold {
                    selected = i;
                    break;
                }
            }
            centroids.extend_from_slice(x.row(selected)?);
        }

        debug!("seeded {} centroids from a batch of {}", self.n_clusters, n);
        self.centroids = Some(Tensor::new(centroids, vec![self.n_clusters, d])?);
        Ok(())
    }

    fn fitted(&self) -> BatchResult<&Tensor<T>> {
        self.centroids.as_ref().ok_or_else(|| {
            BatchError::InvalidOperation("KMeans centroids are not initialized".into())
        })
    }

    fn nearest(centroids: &Tensor<T>, row: &[T]) -> BatchResult<(usize, T)> {
        let mut best_dist = T::INFINITY;
        let mut best_k = 0;
        for k in 0..centroids.rows() {
            let dist = squared_distance(row, centroids.row(k)?);
            if dist < best_dist {
                best_dist = dist;
                best_k = k;
            }
        }
        Ok((best_k, best_dist))
    }

    /// Index of the nearest centroid for every row of `x`.
    pub fn predict(&self, x: &Tensor<T>) -> BatchResult<Vec<usize>> {
        let centroids = self.fitted()?;
        (0..x.rows())
            .map(|i| Ok(Self::nearest(centroids, x.row(i)?)?.0))
            .collect()
    }
}

fn squared_distance<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b)
        .map(|(&p, &q)| {
            let diff = p - q;
            diff * diff
        })
        .sum()
}

impl<T: Float> Fittable<T> for KMeans<T> {
    type Summary = KMeansSummary;

    fn summarize(&self, batch: &Batch<T>) -> BatchResult<KMeansSummary> {
        let centroids = self.fitted()?;
        let k = centroids.rows();
        let d = centroids.row_len();
        if batch.n_features() != d {
            return Err(BatchError::ShapeMismatch {
                expected: vec![batch.len(), d],
                got: batch.x.shape_vec(),
            });
        }

        let mut s = KMeansSummary {
            sums: vec![0.0; k * d],
            weights: vec![0.0; k],
            inertia: 0.0,
        };
        for (i, &w) in batch.weights.iter().enumerate() {
            let row = batch.x.row(i)?;
            let (best, dist) = Self::nearest(centroids, row)?;
            let w = w.to_f64();
            s.weights[best] += w;
            s.inertia += w * dist.to_f64();
            for (j, &v) in row.iter().enumerate() {
                s.sums[best * d + j] += w * v.to_f64();
            }
        }
        Ok(s)
    }

    /// Move each centroid to the weighted mean of its members; clusters
    /// with no weight keep their position.
    fn update(&mut self, summary: KMeansSummary) -> BatchResult<()> {
        if summary.weights.is_empty() {
            return Ok(());
        }
        let centroids = self.fitted()?;
        let d = centroids.row_len();
        let mut data = centroids.data().to_vec();
        for (k, &w) in summary.weights.iter().enumerate() {
            if w > 0.0 {
                for j in 0..d {
                    data[k * d + j] = T::from_f64(summary.sums[k * d + j] / w);
                }
            }
        }
        self.centroids = Some(Tensor::new(data, centroids.shape_vec())?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitConfig;
    use crate::driver::fit;
    use approx::assert_abs_diff_eq;
    use batchwise_data::ArrayGenerator;
    use rand::SeedableRng;

    fn two_clusters() -> Tensor<f64> {
        Tensor::from_vec2d(&[
            vec![0.0, 0.0], vec![0.5, 0.5], vec![1.0, 0.0],
            vec![10.0, 10.0], vec![10.5, 10.5], vec![11.0, 10.0],
        ]).unwrap()
    }

    #[test]
    fn test_kmeans_from_batches() {
        let source = ArrayGenerator::new(two_clusters(), Some(2)).unwrap();
        let start = Tensor::from_vec2d(&[vec![0.0, 0.0], vec![1.0, 0.0]]).unwrap();
        let mut km = KMeans::with_centroids(start).unwrap();

        let trace = fit(&mut km, &source, &FitConfig::default()).unwrap();
        assert!(trace.converged());

        let labels = km.predict(&two_clusters()).unwrap();
        assert_ne!(labels[0], labels[3]);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);

        let c = km.centroids().unwrap();
        let low = c.row(labels[0]).unwrap();
        assert_abs_diff_eq!(low[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(low[1], 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_initialize_picks_rows_of_first_batch() {
        let source = ArrayGenerator::new(two_clusters(), Some(4)).unwrap();
        let mut km = KMeans::new(2);
        km.initialize(&source, &mut StdRng::seed_from_u64(7)).unwrap();

        let c = km.centroids().unwrap();
        assert_eq!(c.shape_vec(), vec![2, 2]);
        let first = two_clusters().slice_rows(0, 4).unwrap();
        for k in 0..2 {
            let centroid = c.row(k).unwrap();
            assert!((0..4).any(|i| first.row(i).unwrap() == centroid));
        }
    }

    #[test]
    fn test_update_keeps_empty_cluster() {
        let start = Tensor::from_vec2d(&[vec![0.0], vec![100.0]]).unwrap();
        let mut km = KMeans::with_centroids(start).unwrap();
        let batch = Batch::unweighted(Tensor::from_slice(&[1.0, 2.0, 3.0])).unwrap();
        let summary = km.summarize(&batch).unwrap();
        assert_eq!(summary.weights, vec![3.0, 0.0]);
        assert_abs_diff_eq!(summary.inertia, 14.0);

        km.update(summary).unwrap();
        assert_eq!(km.centroids().unwrap().data(), &[2.0, 100.0]);
    }

    #[test]
    fn test_uninitialized_and_empty() {
        let km: KMeans<f64> = KMeans::new(2);
        let batch = Batch::unweighted(Tensor::from_slice(&[1.0])).unwrap();
        assert!(matches!(km.summarize(&batch), Err(BatchError::InvalidOperation(_))));

        let empty = ArrayGenerator::new(Tensor::<f64>::zeros(vec![0, 2]), None).unwrap();
        let mut km: KMeans<f64> = KMeans::new(2);
        assert!(matches!(
            km.initialize(&empty, &mut StdRng::seed_from_u64(0)),
            Err(BatchError::EmptyBatchSource)
        ));
    }
}
