use batchwise_core::{BatchError, BatchResult, Float};
use batchwise_data::Batch;
use serde::{Deserialize, Serialize};

use crate::summary::{add_into, Fittable, Summary};

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Independent per-feature Gaussian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct NormalDistribution<T: Float> {
    pub means: Vec<T>,
    pub variances: Vec<T>,
    /// Variances are floored here after every update.
    pub min_variance: T,
}

/// Weighted moments and log-likelihood of the examples seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalSummary {
    pub weight: f64,
    pub sum: Vec<f64>,
    pub sum_sq: Vec<f64>,
    pub log_likelihood: f64,
}

impl Summary for NormalSummary {
    fn merge(&mut self, other: Self) {
        self.weight += other.weight;
        add_into(&mut self.sum, other.sum);
        add_into(&mut self.sum_sq, other.sum_sq);
        self.log_likelihood += other.log_likelihood;
    }

    fn score(&self) -> f64 {
        self.log_likelihood
    }
}

impl<T: Float> NormalDistribution<T> {
    /// Standard normal in every feature.
    pub fn new(n_features: usize) -> Self {
        NormalDistribution {
            means: vec![T::ZERO; n_features],
            variances: vec![T::ONE; n_features],
            min_variance: T::from_f64(1e-8),
        }
    }

    pub fn with_params(means: Vec<T>, variances: Vec<T>) -> BatchResult<Self> {
        if means.len() != variances.len() {
            return Err(BatchError::ShapeMismatch {
                expected: vec![means.len()],
                got: vec![variances.len()],
            });
        }
        if variances.iter().any(|&v| !(v > T::ZERO)) {
            return Err(BatchError::InvalidOperation(
                "variances must be positive".to_string(),
            ));
        }
        let mut dist = NormalDistribution::new(means.len());
        dist.means = means;
        dist.variances = variances;
        Ok(dist)
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn log_probability(&self, row: &[T]) -> f64 {
        row.iter()
            .zip(self.means.iter().zip(&self.variances))
            .map(|(&x, (&mu, &var))| {
                let (x, mu, var) = (x.to_f64(), mu.to_f64(), var.to_f64());
                -0.5 * (LN_2PI + var.ln() + (x - mu) * (x - mu) / var)
            })
            .sum()
    }
}

impl<T: Float> Fittable<T> for NormalDistribution<T> {
    type Summary = NormalSummary;

    fn summarize(&self, batch: &Batch<T>) -> BatchResult<NormalSummary> {
        let d = self.n_features();
        if batch.n_features() != d {
            return Err(BatchError::ShapeMismatch {
                expected: vec![batch.len(), d],
                got: batch.x.shape_vec(),
            });
        }
        let mut s = NormalSummary {
            weight: 0.0,
            sum: vec![0.0; d],
            sum_sq: vec![0.0; d],
            log_likelihood: 0.0,
        };
        for (i, &w) in batch.weights.iter().enumerate() {
            let row = batch.x.row(i)?;
            let w = w.to_f64();
            s.weight += w;
            s.log_likelihood += w * self.log_probability(row);
            for (j, &x) in row.iter().enumerate() {
                let x = x.to_f64();
                s.sum[j] += w * x;
                s.sum_sq[j] += w * x * x;
            }
        }
        Ok(s)
    }

    fn update(&mut self, summary: NormalSummary) -> BatchResult<()> {
        if summary.weight <= 0.0 || summary.sum.is_empty() {
            return Ok(());
        }
        let floor = self.min_variance.to_f64();
        for j in 0..self.n_features() {
            let mean = summary.sum[j] / summary.weight;
            let var = summary.sum_sq[j] / summary.weight - mean * mean;
            self.means[j] = T::from_f64(mean);
            self.variances[j] = T::from_f64(var.max(floor));
        }
        Ok(())
    }
}
