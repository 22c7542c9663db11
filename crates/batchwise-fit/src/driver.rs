use std::time::Instant;

use batchwise_core::{BatchResult, Float, Tensor};
use batchwise_data::{ArrayGenerator, BatchSource};
use log::{debug, info, log, warn, Level};

use crate::config::FitConfig;
use crate::executor::Executor;
use crate::summary::{Fittable, Summary};
use crate::trace::{FitTrace, IterationRecord, Termination};

/// Runs the summarize / reduce / update loop over a batch source.
///
/// Every epoch requests a fresh traversal with `batches()`. With more than
/// one worker, batches are pulled in chunks of twice the worker count and
/// summarized concurrently; summaries are merged once the whole chunk has
/// returned, so no more than one chunk of batches is resident at a time.
#[derive(Debug)]
pub struct FitDriver {
    config: FitConfig,
    executor: Executor,
}

impl FitDriver {
    pub fn new(config: FitConfig) -> BatchResult<Self> {
        config.validate()?;
        let executor = Executor::new(config.n_jobs)?;
        debug!("fit driver with {} worker(s)", executor.workers());
        Ok(FitDriver { config, executor })
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.executor.workers()
    }

    /// Summarize one full epoch; returns the merged summary and batch count.
    ///
    /// The first failing batch aborts the epoch.
    pub fn summarize_epoch<T, M, S>(&self, model: &M, source: &S) -> BatchResult<(M::Summary, usize)>
    where
        T: Float,
        M: Fittable<T>,
        S: BatchSource<T> + ?Sized,
    {
        let chunk_size = match self.executor {
            Executor::Sequential => 1,
            Executor::Pool(_) => 2 * self.executor.workers(),
        };

        let mut total = M::Summary::default();
        let mut n_batches = 0usize;
        let mut batches = source.batches();
        loop {
            let chunk = batches
                .by_ref()
                .take(chunk_size)
                .collect::<BatchResult<Vec<_>>>()?;
            if chunk.is_empty() {
                break;
            }
            n_batches += chunk.len();

            let parts = self.executor.map(chunk, |batch| model.summarize(&batch));
            for part in parts {
                match part {
                    Ok(summary) => total.merge(summary),
                    Err(e) => {
                        warn!("summarize failed after {} batches, aborting epoch: {}", n_batches, e);
                        return Err(e);
                    }
                }
            }
        }
        Ok((total, n_batches))
    }

    /// Fit `model` until the improvement drops to the threshold or the
    /// iteration limit is reached.
    ///
    /// The initial parameters are scored first. Each iteration then applies
    /// the previous epoch's statistics and summarizes a new epoch. The last
    /// epoch's statistics are applied before returning.
    pub fn fit<T, M, S>(&self, model: &mut M, source: &S) -> BatchResult<FitTrace>
    where
        T: Float,
        M: Fittable<T>,
        S: BatchSource<T> + ?Sized,
    {
        let level = if self.config.verbose { Level::Info } else { Level::Debug };
        let threshold = self.config.stop_threshold;
        let started = Instant::now();

        let (mut summary, batches_per_epoch) = self.summarize_epoch(model, source)?;
        let initial_score = summary.score();
        let mut last_score = initial_score;
        debug!(
            "initial score {:.6} over {} examples in {} batches",
            initial_score,
            source.len(),
            batches_per_epoch
        );

        let mut records = Vec::new();
        let mut improvement = f64::INFINITY;
        let mut iteration = 0usize;
        while improvement > threshold && iteration < self.config.max_iterations {
            iteration += 1;
            let tick = Instant::now();

            model.update(summary)?;
            let (next, _) = self.summarize_epoch(model, source)?;
            let score = next.score();
            improvement = score - last_score;
            last_score = score;
            summary = next;

            let elapsed = tick.elapsed();
            log!(
                level,
                "[{}] Improvement: {:.6}\tTime (s): {:.4}",
                iteration,
                improvement,
                elapsed.as_secs_f64()
            );
            if improvement.is_nan() {
                warn!("improvement is NaN at iteration {}, stopping", iteration);
            }
            records.push(IterationRecord {
                iteration,
                improvement,
                score,
                elapsed,
            });
        }
        model.update(summary)?;

        let termination = if improvement > threshold {
            Termination::MaxIterations
        } else {
            Termination::Converged
        };
        let total_elapsed = started.elapsed();
        log!(
            level,
            "Total Improvement: {:.6}\tTotal Time (s): {:.4}",
            last_score - initial_score,
            total_elapsed.as_secs_f64()
        );
        if termination == Termination::MaxIterations {
            info!(
                "stopped after {} iterations without reaching threshold {}",
                iteration, threshold
            );
        }

        Ok(FitTrace {
            initial_score,
            final_score: last_score,
            batches_per_epoch,
            records,
            termination,
            total_elapsed,
        })
    }
}

/// Fit `model` over `source` with a driver built from `config`.
pub fn fit<T, M, S>(model: &mut M, source: &S, config: &FitConfig) -> BatchResult<FitTrace>
where
    T: Float,
    M: Fittable<T>,
    S: BatchSource<T> + ?Sized,
{
    FitDriver::new(config.clone())?.fit(model, source)
}

/// Fit `model` over an in-memory array, batched by `config.batch_size`.
pub fn fit_array<T, M>(
    model: &mut M,
    x: Tensor<T>,
    weights: Option<Vec<T>>,
    config: &FitConfig,
) -> BatchResult<FitTrace>
where
    T: Float,
    M: Fittable<T>,
{
    let mut source = ArrayGenerator::new(x, config.batch_size)?;
    if let Some(w) = weights {
        source = source.with_weights(w)?;
    }
    fit(model, &source, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::reduce;
    use approx::assert_abs_diff_eq;
    use batchwise_core::BatchError;
    use batchwise_data::Batch;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Estimates a single location; score is the negative weighted squared error.
    struct Location {
        value: f64,
        updates: usize,
    }

    #[derive(Default)]
    struct LocationSummary {
        weight: f64,
        weighted_sum: f64,
        sq_error: f64,
    }

    impl Summary for LocationSummary {
        fn merge(&mut self, other: Self) {
            self.weight += other.weight;
            self.weighted_sum += other.weighted_sum;
            self.sq_error += other.sq_error;
        }

        fn score(&self) -> f64 {
            -self.sq_error
        }
    }

    impl Fittable<f64> for Location {
        type Summary = LocationSummary;

        fn summarize(&self, batch: &Batch<f64>) -> BatchResult<LocationSummary> {
            let mut s = LocationSummary::default();
            for (x, w) in batch.x.data().iter().zip(&batch.weights) {
                s.weight += w;
                s.weighted_sum += w * x;
                s.sq_error += w * (x - self.value).powi(2);
            }
            Ok(s)
        }

        fn update(&mut self, summary: LocationSummary) -> BatchResult<()> {
            self.updates += 1;
            if summary.weight > 0.0 {
                self.value = summary.weighted_sum / summary.weight;
            }
            Ok(())
        }
    }

    fn column(values: &[f64]) -> Tensor<f64> {
        Tensor::from_slice(values)
    }

    #[test]
    fn test_converges_to_weighted_mean() {
        let mut model = Location { value: 0.0, updates: 0 };
        let config = FitConfig::builder().batch_size(3).build().unwrap();
        let trace = fit_array(
            &mut model,
            column(&[1.0, 2.0, 3.0, 4.0, 10.0]),
            Some(vec![1.0, 1.0, 1.0, 1.0, 0.0]),
            &config,
        )
        .unwrap();

        assert_abs_diff_eq!(model.value, 2.5, epsilon = 1e-12);
        assert!(trace.converged());
        assert_eq!(trace.batches_per_epoch, 2);
        assert_eq!(trace.iterations(), 2);
        assert!(trace.records[0].improvement > 0.0);
        assert_abs_diff_eq!(trace.records[1].improvement, 0.0, epsilon = 1e-12);
        assert_eq!(model.updates, trace.iterations() + 1);
    }

    #[test]
    fn test_empty_source_runs_one_iteration() {
        let mut model = Location { value: 7.0, updates: 0 };
        let source = ArrayGenerator::new(Tensor::<f64>::zeros(vec![0, 1]), Some(10)).unwrap();
        let trace = fit(&mut model, &source, &FitConfig::default()).unwrap();

        assert_eq!(trace.batches_per_epoch, 0);
        assert_eq!(trace.iterations(), 1);
        assert_eq!(trace.records[0].improvement, 0.0);
        assert_eq!(trace.termination, Termination::Converged);
        assert_eq!(model.value, 7.0);
    }

    #[test]
    fn test_max_iterations_is_not_an_error() {
        let mut model = Location { value: 0.0, updates: 0 };
        let config = FitConfig::builder()
            .stop_threshold(-1.0)
            .max_iterations(3)
            .build()
            .unwrap();
        let trace = fit_array(&mut model, column(&[1.0, 3.0]), None, &config).unwrap();
        assert_eq!(trace.iterations(), 3);
        assert_eq!(trace.termination, Termination::MaxIterations);
        assert_abs_diff_eq!(model.value, 2.0);
    }

    #[test]
    fn test_zero_iterations_scores_and_updates_once() {
        let mut model = Location { value: 0.0, updates: 0 };
        let config = FitConfig::builder().max_iterations(0).build().unwrap();
        let trace = fit_array(&mut model, column(&[4.0, 6.0]), None, &config).unwrap();
        assert_eq!(trace.iterations(), 0);
        assert_eq!(trace.initial_score, -52.0);
        assert_eq!(model.updates, 1);
        assert_abs_diff_eq!(model.value, 5.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data: Vec<f64> = (0..997).map(|i| ((i * 37) % 101) as f64 * 0.25).collect();
        let run = |n_jobs| {
            let mut model = Location { value: -3.0, updates: 0 };
            let config = FitConfig::builder().batch_size(50).n_jobs(n_jobs).build().unwrap();
            let trace = fit_array(&mut model, column(&data), None, &config).unwrap();
            (model.value, trace.iterations(), trace.batches_per_epoch)
        };
        let (seq_value, seq_iters, seq_batches) = run(1);
        let (par_value, par_iters, par_batches) = run(4);
        assert_abs_diff_eq!(seq_value, par_value, epsilon = 1e-9);
        assert_eq!(seq_iters, par_iters);
        assert_eq!(seq_batches, 20);
        assert_eq!(par_batches, 20);
    }

    #[test]
    fn test_epoch_summary_independent_of_batch_order() {
        let model = Location { value: 1.0, updates: 0 };
        let source = ArrayGenerator::new(column(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]), Some(2)).unwrap();
        let batches: Vec<Batch<f64>> = source.batches().collect::<BatchResult<_>>().unwrap();

        let forward = reduce(batches.iter().map(|b| model.summarize(b).unwrap()));
        let backward = reduce(batches.iter().rev().map(|b| model.summarize(b).unwrap()));
        assert_eq!(forward.weight, backward.weight);
        assert_eq!(forward.weighted_sum, backward.weighted_sum);
        assert_eq!(forward.sq_error, backward.sq_error);

        let driver = FitDriver::new(FitConfig::builder().n_jobs(3).build().unwrap()).unwrap();
        let (pooled, n) = driver.summarize_epoch(&model, &source).unwrap();
        assert_eq!(n, 4);
        assert_eq!(pooled.weighted_sum, forward.weighted_sum);
    }

    /// Scores every epoch as NaN.
    struct Undefined;

    #[derive(Default)]
    struct UndefinedSummary;

    impl Summary for UndefinedSummary {
        fn merge(&mut self, _other: Self) {}

        fn score(&self) -> f64 {
            f64::NAN
        }
    }

    impl Fittable<f64> for Undefined {
        type Summary = UndefinedSummary;

        fn summarize(&self, _batch: &Batch<f64>) -> BatchResult<UndefinedSummary> {
            Ok(UndefinedSummary)
        }

        fn update(&mut self, _summary: UndefinedSummary) -> BatchResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_nan_improvement_stops_as_converged() {
        let source = ArrayGenerator::new(column(&[1.0, 2.0, 3.0]), Some(2)).unwrap();
        let trace = fit(&mut Undefined, &source, &FitConfig::default()).unwrap();
        assert_eq!(trace.iterations(), 1);
        assert!(trace.records[0].improvement.is_nan());
        assert_eq!(trace.termination, Termination::Converged);
    }

    struct FailsOnBatch {
        bad_batch_first_value: f64,
        summarized: AtomicUsize,
    }

    impl Fittable<f64> for FailsOnBatch {
        type Summary = LocationSummary;

        fn summarize(&self, batch: &Batch<f64>) -> BatchResult<LocationSummary> {
            self.summarized.fetch_add(1, Ordering::SeqCst);
            if batch.x.data()[0] == self.bad_batch_first_value {
                return Err(BatchError::Model("corrupt batch".to_string()));
            }
            Ok(LocationSummary::default())
        }

        fn update(&mut self, _summary: LocationSummary) -> BatchResult<()> {
            panic!("update must not run after a failed epoch");
        }
    }

    #[test]
    fn test_failing_batch_aborts_fit() {
        for n_jobs in [1, 3] {
            let mut model = FailsOnBatch {
                bad_batch_first_value: 4.0,
                summarized: AtomicUsize::new(0),
            };
            let config = FitConfig::builder().batch_size(2).n_jobs(n_jobs).build().unwrap();
            let result = fit_array(&mut model, column(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), None, &config);
            assert!(matches!(result, Err(BatchError::Model(_))));
        }
    }

    #[test]
    fn test_sequential_stops_at_first_failure() {
        let model = FailsOnBatch {
            bad_batch_first_value: 2.0,
            summarized: AtomicUsize::new(0),
        };
        let source = ArrayGenerator::new(column(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), Some(2)).unwrap();
        let driver = FitDriver::new(FitConfig::default()).unwrap();
        assert!(driver.summarize_epoch(&model, &source).is_err());
        assert_eq!(model.summarized.load(Ordering::SeqCst), 2);
    }
}
