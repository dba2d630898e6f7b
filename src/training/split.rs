// Deterministic train/test split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::errors::{Result, ServiceError};

/// Row indices of each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with a seeded RNG and cut off `ceil(test_size * n)` test rows.
///
/// The same `(n, test_size, seed)` always yields the same partitions.
/// At least one test row and two training rows are required.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ServiceError::Validation(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train < 2 {
        return Err(ServiceError::Dataset(format!(
            "{} rows cannot be split with test_size {} (train {}, test {})",
            n, test_size, n_train, n_test
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(Split {
        train,
        test: indices,
    })
}
