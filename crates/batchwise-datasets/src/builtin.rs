use batchwise_core::{BatchError, BatchResult, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Standard normal draw (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Gaussian blobs, `n_samples` rows split evenly between `n_centers`
/// (the last center takes the remainder). Returns features and the
/// generating center of each row.
pub fn make_blobs(
    n_samples: usize,
    n_features: usize,
    n_centers: usize,
    cluster_std: f64,
    seed: Option<u64>,
) -> BatchResult<(Tensor<f64>, Vec<usize>)> {
    if n_centers == 0 || n_features == 0 {
        return Err(BatchError::InvalidConfig(
            "make_blobs needs at least one center and one feature".to_string(),
        ));
    }
    let mut rng = rng_from(seed);

    // Centers spread out along the diagonal
    let mut centers = vec![0.0; n_centers * n_features];
    for c in 0..n_centers {
        for f in 0..n_features {
            centers[c * n_features + f] = (c as f64) * 5.0 + rng.gen::<f64>();
        }
    }

    let per_center = n_samples / n_centers;
    let mut features = Vec::with_capacity(n_samples * n_features);
    let mut labels = Vec::with_capacity(n_samples);
    for c in 0..n_centers {
        let count = if c == n_centers - 1 {
            n_samples - per_center * (n_centers - 1)
        } else {
            per_center
        };
        for _ in 0..count {
            for f in 0..n_features {
                features.push(centers[c * n_features + f] + gaussian(&mut rng) * cluster_std);
            }
            labels.push(c);
        }
    }

    Ok((Tensor::new(features, vec![n_samples, n_features])?, labels))
}

/// Random-walk sequences, one `[steps, n_features]` tensor per entry of
/// `lengths`.
pub fn make_sequences(
    lengths: &[usize],
    n_features: usize,
    seed: Option<u64>,
) -> BatchResult<Vec<Tensor<f64>>> {
    let mut rng = rng_from(seed);
    lengths
        .iter()
        .map(|&steps| {
            let mut position = vec![0.0; n_features];
            let mut data = Vec::with_capacity(steps * n_features);
            for _ in 0..steps {
                for p in position.iter_mut() {
                    *p += gaussian(&mut rng);
                    data.push(*p);
                }
            }
            Tensor::new(data, vec![steps, n_features])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_blobs() {
        let (x, y) = make_blobs(100, 2, 3, 0.5, Some(42)).unwrap();
        assert_eq!(x.shape_vec(), vec![100, 2]);
        assert_eq!(y.len(), 100);
        assert_eq!(y.iter().filter(|&&c| c == 2).count(), 34);
    }

    #[test]
    fn test_make_blobs_is_seeded() {
        let (a, _) = make_blobs(20, 3, 2, 1.0, Some(7)).unwrap();
        let (b, _) = make_blobs(20, 3, 2, 1.0, Some(7)).unwrap();
        assert_eq!(a, b);
        assert!(make_blobs(10, 2, 0, 1.0, None).is_err());
    }

    #[test]
    fn test_make_sequences() {
        let seqs = make_sequences(&[5, 12, 7], 3, Some(1)).unwrap();
        let steps: Vec<usize> = seqs.iter().map(|s| s.rows()).collect();
        assert_eq!(steps, vec![5, 12, 7]);
        assert!(seqs.iter().all(|s| s.row_len() == 3));
    }
}
