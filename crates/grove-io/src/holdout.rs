//! Seeded train/test partitioning.

use grove_rf::Sample;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::IoError;

/// Send each sample to the test set with probability `test_fraction`.
///
/// Every sample gets an independent draw from a ChaCha8 stream seeded with
/// `seed`, so a given file, fraction, and seed always yield the same split.
/// File order is kept within each side. A fraction of 0.0 keeps everything
/// for training.
///
/// # Errors
///
/// Returns [`IoError::InvalidTestFraction`] unless `0.0 <= test_fraction < 1.0`.
#[instrument(skip(samples), fields(n_samples = samples.len()))]
pub fn holdout_split(
    samples: Vec<Sample>,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<Sample>, Vec<Sample>), IoError> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(IoError::InvalidTestFraction {
            fraction: test_fraction,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (test, train): (Vec<Sample>, Vec<Sample>) = samples
        .into_iter()
        .partition(|_| rng.r#gen::<f64>() < test_fraction);

    debug!(n_train = train.len(), n_test = test.len(), "holdout split");
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_rf::Label;

    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new([("i", i as f64)], Label::new("Up")))
            .collect()
    }

    #[test]
    fn split_is_seeded_and_complete() {
        let (train_a, test_a) = holdout_split(samples(200), 0.2, 9).unwrap();
        let (train_b, test_b) = holdout_split(samples(200), 0.2, 9).unwrap();
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a.len() + test_a.len(), 200);
        assert!((20..=60).contains(&test_a.len()), "test size {}", test_a.len());
    }

    #[test]
    fn order_is_preserved() {
        let (train, _) = holdout_split(samples(50), 0.5, 1).unwrap();
        let idx: Vec<f64> = train.iter().map(|s| s.numeric("i").unwrap()).collect();
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_fraction_keeps_everything() {
        let (train, test) = holdout_split(samples(10), 0.0, 3).unwrap();
        assert_eq!(train.len(), 10);
        assert!(test.is_empty());
    }

    #[test]
    fn invalid_fraction_rejected() {
        for fraction in [1.0, -0.1, f64::NAN] {
            assert!(matches!(
                holdout_split(samples(3), fraction, 0),
                Err(IoError::InvalidTestFraction { .. })
            ));
        }
    }
}
