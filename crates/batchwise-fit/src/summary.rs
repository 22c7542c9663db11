use batchwise_core::{BatchResult, Float};
use batchwise_data::Batch;

/// Combinable statistics produced by summarizing one or more batches.
///
/// `Default` must be the identity of `merge`, and `merge` must be
/// associative and commutative: batches may be summarized on any worker in
/// any order.
pub trait Summary: Default + Send {
    fn merge(&mut self, other: Self);

    /// Scalar the driver measures improvement on (higher is better).
    fn score(&self) -> f64;
}

/// A model that can be fit from batch summaries.
pub trait Fittable<T: Float>: Sync {
    type Summary: Summary;

    /// Statistics of one batch under the current parameters.
    fn summarize(&self, batch: &Batch<T>) -> BatchResult<Self::Summary>;

    /// Replace the parameters using statistics aggregated over an epoch.
    /// An identity summary (no examples) should leave the model unchanged.
    fn update(&mut self, summary: Self::Summary) -> BatchResult<()>;
}

/// Merge summaries into one, starting from the identity.
pub fn reduce<S: Summary, I: IntoIterator<Item = S>>(parts: I) -> S {
    parts.into_iter().fold(S::default(), |mut acc, part| {
        acc.merge(part);
        acc
    })
}

/// Elementwise `dst += src`; an empty `dst` adopts `src`.
pub(crate) fn add_into(dst: &mut Vec<f64>, src: Vec<f64>) {
    if dst.is_empty() {
        *dst = src;
    } else if !src.is_empty() {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Counts {
        per_class: Vec<f64>,
        total: f64,
    }

    impl Summary for Counts {
        fn merge(&mut self, other: Self) {
            add_into(&mut self.per_class, other.per_class);
            self.total += other.total;
        }

        fn score(&self) -> f64 {
            self.total
        }
    }

    fn part(c: [f64; 3]) -> Counts {
        Counts {
            per_class: c.to_vec(),
            total: c.iter().sum(),
        }
    }

    #[test]
    fn test_reduce_of_nothing_is_identity() {
        assert_eq!(reduce(Vec::<Counts>::new()), Counts::default());
    }

    #[test]
    fn test_reduce_is_order_invariant() {
        let parts = || vec![part([1.0, 0.0, 2.0]), part([0.0, 5.0, 1.0]), part([3.0, 3.0, 0.0])];
        let forward = reduce(parts());
        let mut reversed = parts();
        reversed.reverse();
        let backward = reduce(reversed);
        let mut rotated = parts();
        rotated.rotate_left(1);

        assert_eq!(forward, backward);
        assert_eq!(forward, reduce(rotated));
        assert_eq!(forward.per_class, vec![4.0, 8.0, 3.0]);
        assert_eq!(forward.score(), 15.0);
    }
}
