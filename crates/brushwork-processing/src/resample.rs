//! Train/test splitting and V-fold cross-validation resamples.
//!
//! All index sets are positions into the dataset they were drawn from and
//! are returned sorted, so applying a split keeps the original record order.

use crate::config::SplitConfig;
use crate::dataset::Dataset;
use crate::error::{ProcessingError, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Disjoint training and test positions covering a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub training: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    /// Materialize the (training, test) datasets.
    pub fn apply(&self, data: &Dataset) -> (Dataset, Dataset) {
        (data.subset(&self.training), data.subset(&self.test))
    }
}

/// Randomly assign `floor(n * train_prop)` records to training, the rest to test.
pub fn initial_split(n: usize, config: &SplitConfig) -> Result<Split> {
    config.validate()?;
    let n_train = (n as f64 * config.train_prop).floor() as usize;
    if n_train == 0 || n_train == n {
        return Err(ProcessingError::InsufficientData(format!(
            "{n} records cannot be split with train_prop {} into non-empty training and test sets",
            config.train_prop
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    indices.shuffle(&mut rng);

    let mut training = indices[..n_train].to_vec();
    let mut test = indices[n_train..].to_vec();
    training.sort_unstable();
    test.sort_unstable();
    Ok(Split { training, test })
}

/// One cross-validation resample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// `Fold01`, `Fold02`, ...
    pub id: String,
    /// Records used to fit.
    pub analysis: Vec<usize>,
    /// Held-out records used to score.
    pub assessment: Vec<usize>,
}

/// Partition `n` records into `k` folds.
///
/// Every record lands in exactly one assessment set and in the analysis set
/// of the other `k - 1` folds. Assessment sizes differ by at most one, with
/// the larger folds first.
pub fn vfold(n: usize, k: usize, seed: u64) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(ProcessingError::InvalidConfig(format!(
            "number of folds must be at least 2, got {k}"
        )));
    }
    if n < k {
        return Err(ProcessingError::InsufficientData(format!(
            "{n} records cannot be divided into {k} folds"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n / k;
    let remainder = n % k;
    let width = k.to_string().len().max(2);

    let mut folds = Vec::with_capacity(k);
    let mut current = 0;
    for fold_idx in 0..k {
        let size = if fold_idx < remainder { base + 1 } else { base };
        let mut assessment = indices[current..current + size].to_vec();
        let mut analysis: Vec<usize> = indices[..current]
            .iter()
            .chain(indices[current + size..].iter())
            .copied()
            .collect();
        assessment.sort_unstable();
        analysis.sort_unstable();
        folds.push(Fold {
            id: format!("Fold{:0width$}", fold_idx + 1),
            analysis,
            assessment,
        });
        current += size;
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_sizes_and_disjointness() {
        let split = initial_split(403, &SplitConfig::new(0.75, 1)).unwrap();
        assert_eq!(split.training.len(), 302);
        assert_eq!(split.test.len(), 101);

        let mut all: Vec<usize> = split.training.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..403).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        let a = initial_split(50, &SplitConfig::new(0.75, 9)).unwrap();
        let b = initial_split(50, &SplitConfig::new(0.75, 9)).unwrap();
        let c = initial_split(50, &SplitConfig::new(0.75, 10)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_too_small() {
        let err = initial_split(1, &SplitConfig::new(0.75, 1)).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_DATA");
    }

    #[test]
    fn test_ten_records_five_folds() {
        let folds = vfold(10, 5, 3).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen = vec![0usize; 10];
        for fold in &folds {
            assert_eq!(fold.assessment.len(), 2);
            assert_eq!(fold.analysis.len(), 8);
            for &i in &fold.assessment {
                seen[i] += 1;
                assert!(!fold.analysis.contains(&i));
            }
        }
        assert_eq!(seen, vec![1; 10]);
    }

    #[test]
    fn test_fold_sizes_differ_by_at_most_one() {
        let folds = vfold(302, 10, 42).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.assessment.len()).collect();
        assert_eq!(sizes, vec![31, 31, 30, 30, 30, 30, 30, 30, 30, 30]);
        assert_eq!(folds[0].id, "Fold01");
        assert_eq!(folds[9].id, "Fold10");

        let mut analysis_count = vec![0usize; 302];
        for fold in &folds {
            for &i in &fold.analysis {
                analysis_count[i] += 1;
            }
        }
        assert!(analysis_count.iter().all(|&c| c == 9));
    }

    #[test]
    fn test_vfold_rejects_bad_k() {
        assert_eq!(vfold(10, 1, 0).unwrap_err().error_code(), "INVALID_CONFIG");
        assert_eq!(vfold(3, 5, 0).unwrap_err().error_code(), "INSUFFICIENT_DATA");
    }
}
