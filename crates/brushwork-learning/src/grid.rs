//! Candidate grids: domain finalization and Latin-hypercube designs.

use crate::error::{LearningError, Result};
use brushwork_processing::{Assignment, Domain, Tunable};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

/// Resolve unknown upper bounds of integer domains to `max_features`.
///
/// Parameters whose range depends on the number of predictors (such as a
/// random forest's `mtry`) are declared with an unknown upper bound. A
/// finalized range whose upper bound falls below its lower bound is an
/// error, and so is a range that was already empty.
pub fn finalize(tunables: &[Tunable], max_features: usize) -> Result<Vec<Tunable>> {
    tunables
        .iter()
        .map(|t| {
            let domain = match &t.domain {
                Domain::Int { lower, upper: None } => Domain::Int {
                    lower: *lower,
                    upper: Some(max_features as i64),
                },
                other => other.clone(),
            };
            match domain {
                Domain::Int {
                    lower,
                    upper: Some(upper),
                } if upper < lower => {
                    return Err(LearningError::EmptyDomain {
                        parameter: t.id.clone(),
                        lower,
                        upper,
                    });
                }
                _ => {}
            }
            if domain.is_empty() {
                return Err(LearningError::InvalidConfig(format!(
                    "parameter '{}' has no admissible values",
                    t.id
                )));
            }
            Ok(Tunable::new(&t.id, domain))
        })
        .collect()
}

/// Space-filling design of up to `size` candidates.
///
/// Every dimension is cut into `size` equal strata; each stratum is used
/// exactly once per dimension, in an independent random order, and a point
/// is drawn uniformly inside it. Integer and categorical values are then
/// discretized, so duplicates can arise on narrow domains; they are removed,
/// keeping the first occurrence. Without tunables the grid is a single empty
/// assignment.
pub fn latin_hypercube(tunables: &[Tunable], size: usize, seed: u64) -> Result<Vec<Assignment>> {
    if tunables.is_empty() {
        return Ok(vec![Assignment::new()]);
    }
    if size == 0 {
        return Err(LearningError::InvalidConfig(
            "grid size must be at least 1".to_string(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(tunables.len());
    for _ in tunables {
        let mut strata: Vec<usize> = (0..size).collect();
        strata.shuffle(&mut rng);
        let coords = strata
            .into_iter()
            .map(|s| (s as f64 + rng.gen_range(0.0..1.0)) / size as f64)
            .collect();
        columns.push(coords);
    }

    let mut seen = HashSet::with_capacity(size);
    let mut grid = Vec::with_capacity(size);
    for point in 0..size {
        let mut assignment = Assignment::new();
        for (dim, tunable) in tunables.iter().enumerate() {
            let value = tunable.domain.value_at(columns[dim][point]).ok_or_else(|| {
                LearningError::InvalidConfig(format!(
                    "parameter '{}' must be finalized before building a grid",
                    tunable.id
                ))
            })?;
            assignment.insert(&tunable.id, value);
        }
        if seen.insert(assignment.key()) {
            grid.push(assignment);
        }
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_processing::ParamValue;
    use pretty_assertions::assert_eq;

    fn tunables() -> Vec<Tunable> {
        vec![
            Tunable::new("penalty", Domain::log10(-10.0, 0.0)),
            Tunable::new("mixture", Domain::float(0.05, 1.0)),
        ]
    }

    #[test]
    fn test_grid_is_seeded() {
        let a = latin_hypercube(&tunables(), 25, 7).unwrap();
        let b = latin_hypercube(&tunables(), 25, 7).unwrap();
        let c = latin_hypercube(&tunables(), 25, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 25);
    }

    #[test]
    fn test_each_stratum_used_once() {
        let grid = latin_hypercube(&[Tunable::new("x", Domain::float(0.0, 1.0))], 10, 3).unwrap();
        let mut strata: Vec<usize> = grid
            .iter()
            .map(|a| (a.get("x").unwrap().as_f64().unwrap() * 10.0).floor() as usize)
            .collect();
        strata.sort_unstable();
        assert_eq!(strata, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_values_stay_in_domain() {
        let tunables = vec![
            Tunable::new("neighbors", Domain::int(1, 15)),
            Tunable::new("weight_func", Domain::categorical(&["rectangular", "inv", "gaussian"])),
            Tunable::new("cost", Domain::log2(-10.0, 5.0)),
        ];
        for assignment in latin_hypercube(&tunables, 25, 11).unwrap() {
            for t in &tunables {
                assert!(t.domain.contains(assignment.get(&t.id).unwrap()));
            }
        }
    }

    #[test]
    fn test_narrow_integer_domain_deduplicated() {
        let grid = latin_hypercube(&[Tunable::new("num_comp", Domain::int(1, 4))], 25, 5).unwrap();
        assert_eq!(grid.len(), 4);
        let mut values: Vec<i64> = grid
            .iter()
            .map(|a| a.get("num_comp").and_then(ParamValue::as_i64).unwrap())
            .collect();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_no_tunables_gives_single_empty_candidate() {
        let grid = latin_hypercube(&[], 25, 1).unwrap();
        assert_eq!(grid, vec![Assignment::new()]);
    }

    #[test]
    fn test_unfinalized_domain_rejected() {
        let err = latin_hypercube(&[Tunable::new("mtry", Domain::int_unknown_upper(1))], 5, 1)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_finalize_fills_unknown_upper() {
        let finalized = finalize(
            &[
                Tunable::new("mtry", Domain::int_unknown_upper(1)),
                Tunable::new("min_n", Domain::int(2, 40)),
            ],
            4,
        )
        .unwrap();
        assert_eq!(finalized[0].domain, Domain::int(1, 4));
        assert_eq!(finalized[1].domain, Domain::int(2, 40));
    }

    #[test]
    fn test_finalize_empty_domain() {
        let err = finalize(&[Tunable::new("mtry", Domain::int_unknown_upper(1))], 0).unwrap_err();
        assert!(matches!(
            err,
            LearningError::EmptyDomain { ref parameter, lower: 1, upper: 0 } if parameter == "mtry"
        ));
    }
}
