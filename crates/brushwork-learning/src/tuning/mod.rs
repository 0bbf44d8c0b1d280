//! Racing hyperparameter search over cross-validation folds.
//!
//! For every workflow the tuner finalizes the search domain, draws a
//! space-filling candidate grid and evaluates the candidates fold by fold.
//! After the burn-in folds an elimination test drops candidates that are
//! significantly worse than the current best; eliminated candidates are never
//! evaluated again.

mod racing;
mod tuner;

pub use racing::{Contender, eliminate};
pub use tuner::{CandidateResult, Evaluation, TuningResult, TuningStatus, tune_workflow};

/// Deterministic seed derivation.
///
/// Seeds for grids and model fits are derived from the run seed and the
/// identity of the work item, never from scheduling order.
pub(crate) mod seeds {
    /// SplitMix64 finalizer.
    pub fn mix(seed: u64, value: u64) -> u64 {
        let mut z = seed ^ value.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// FNV-1a over the UTF-8 bytes of `text`.
    pub fn of_str(text: &str) -> u64 {
        text.bytes().fold(0xCBF2_9CE4_8422_2325, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01B3)
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mix_is_stable_and_spreads() {
            assert_eq!(mix(42, 1), mix(42, 1));
            assert_ne!(mix(42, 1), mix(42, 2));
            assert_ne!(mix(42, 1), mix(43, 1));
            assert_ne!(of_str("basic_glmnet"), of_str("basic_kknn"));
        }
    }
}
