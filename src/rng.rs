use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::constants::seeds::{
    ALL_PROBLEMS_SEED, ALL_SOLUTIONS_SEED, PROBLEM_SOLUTIONS_SEED, TEST_PAIRS_SEED,
    TEST_SHUFFLE_SEED, TRAIN_PAIRS_SEED, TRAIN_SHUFFLE_SEED, VALIDATION_PAIRS_SEED,
    VALIDATION_SHUFFLE_SEED,
};
use crate::splits::SplitLabel;

/// Small deterministic RNG used for reproducible sampling.
///
/// SplitMix64: the stream depends only on the seed, so the same seed yields the
/// same shuffles and draws on every platform and toolchain.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Create a generator starting from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Resume a generator from a previously captured state.
    pub fn from_state(state: u64) -> Self {
        Self { state }
    }

    /// Current internal state.
    pub fn state(&self) -> u64 {
        self.state
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl rand::RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let value = self.next_u64_internal();
            let bytes = value.to_le_bytes();
            let remaining = dest.len() - offset;
            let copy_len = remaining.min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

/// Named purposes for which a reproducible seed is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedPurpose {
    /// Shuffle of the candidate problem list.
    AllProblems,
    /// Shuffle of solutions inside each problem.
    ProblemSolutions,
    /// Shuffle of all solution samples.
    AllSolutions,
    /// Training pair generation.
    TrainPairs,
    /// Validation pair generation.
    ValidationPairs,
    /// Test pair generation.
    TestPairs,
    /// Balanced split test cut.
    TestShuffle,
    /// Balanced split validation cut.
    ValidationShuffle,
    /// Balanced split training shuffle.
    TrainShuffle,
}

impl SeedPurpose {
    /// Every purpose, in registration order.
    pub const ALL: [SeedPurpose; 9] = [
        SeedPurpose::AllProblems,
        SeedPurpose::ProblemSolutions,
        SeedPurpose::AllSolutions,
        SeedPurpose::TrainPairs,
        SeedPurpose::ValidationPairs,
        SeedPurpose::TestPairs,
        SeedPurpose::TestShuffle,
        SeedPurpose::ValidationShuffle,
        SeedPurpose::TrainShuffle,
    ];

    /// Base seed registered for this purpose before any offset.
    pub const fn base_seed(self) -> u64 {
        match self {
            SeedPurpose::AllProblems => ALL_PROBLEMS_SEED,
            SeedPurpose::ProblemSolutions => PROBLEM_SOLUTIONS_SEED,
            SeedPurpose::AllSolutions => ALL_SOLUTIONS_SEED,
            SeedPurpose::TrainPairs => TRAIN_PAIRS_SEED,
            SeedPurpose::ValidationPairs => VALIDATION_PAIRS_SEED,
            SeedPurpose::TestPairs => TEST_PAIRS_SEED,
            SeedPurpose::TestShuffle => TEST_SHUFFLE_SEED,
            SeedPurpose::ValidationShuffle => VALIDATION_SHUFFLE_SEED,
            SeedPurpose::TrainShuffle => TRAIN_SHUFFLE_SEED,
        }
    }

    /// Pair-generation purpose for a split.
    pub const fn pairs_for(label: SplitLabel) -> Self {
        match label {
            SplitLabel::Train => SeedPurpose::TrainPairs,
            SplitLabel::Validation => SeedPurpose::ValidationPairs,
            SplitLabel::Test => SeedPurpose::TestPairs,
        }
    }
}

impl fmt::Display for SeedPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeedPurpose::AllProblems => "all_problems",
            SeedPurpose::ProblemSolutions => "problem_solutions",
            SeedPurpose::AllSolutions => "all_solutions",
            SeedPurpose::TrainPairs => "train_pairs",
            SeedPurpose::ValidationPairs => "validation_pairs",
            SeedPurpose::TestPairs => "test_pairs",
            SeedPurpose::TestShuffle => "test_shuffle",
            SeedPurpose::ValidationShuffle => "validation_shuffle",
            SeedPurpose::TrainShuffle => "train_shuffle",
        };
        f.write_str(name)
    }
}

/// Table of seeds keyed by purpose.
///
/// The registry never holds generator state itself: every `activate` hands out a
/// freshly seeded `DeterministicRng`, so shuffles for one purpose cannot disturb
/// the draws of another.
#[derive(Clone, Debug)]
pub struct SeedRegistry {
    seeds: HashMap<SeedPurpose, u64>,
}

impl Default for SeedRegistry {
    fn default() -> Self {
        Self {
            seeds: SeedPurpose::ALL
                .iter()
                .map(|purpose| (*purpose, purpose.base_seed()))
                .collect(),
        }
    }
}

impl SeedRegistry {
    /// Registry with base seeds shifted by `base_offset`.
    pub fn with_offset(base_offset: u64) -> Self {
        let mut registry = Self::default();
        registry.apply_offset(base_offset);
        registry
    }

    /// Add `base_offset` to every registered seed.
    ///
    /// Not idempotent: a second call offsets again. Call once per run.
    pub fn apply_offset(&mut self, base_offset: u64) {
        for seed in self.seeds.values_mut() {
            *seed = seed.wrapping_add(base_offset);
        }
    }

    /// Seed currently registered for `purpose`.
    pub fn seed(&self, purpose: SeedPurpose) -> u64 {
        self.seeds
            .get(&purpose)
            .copied()
            .unwrap_or_else(|| purpose.base_seed())
    }

    /// Fresh generator seeded for `purpose`.
    pub fn activate(&self, purpose: SeedPurpose) -> DeterministicRng {
        DeterministicRng::new(self.seed(purpose))
    }

    /// Shuffle `items` in place with a private generator for `purpose`.
    ///
    /// The input order must itself be reproducible; use `shuffle_after_sort`
    /// when it is not.
    pub fn shuffle_reproducible<T>(&self, items: &mut [T], purpose: SeedPurpose) {
        let mut rng = self.activate(purpose);
        items.shuffle(&mut rng);
    }

    /// Sort `items` into canonical order, then shuffle them for `purpose`.
    pub fn shuffle_after_sort<T: Ord>(&self, items: &mut [T], purpose: SeedPurpose) {
        items.sort();
        self.shuffle_reproducible(items, purpose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn deterministic_rng_state_roundtrip_and_fill_bytes_are_stable() {
        let mut rng_a = DeterministicRng::new(123);
        let first = rng_a.next_u64();
        let saved = rng_a.state();
        assert_ne!(first, 0);
        let mut rng_b = DeterministicRng::from_state(saved);
        assert_eq!(rng_a.next_u64(), rng_b.next_u64());

        let mut bytes_a = [0u8; 13];
        let mut bytes_b = [0u8; 13];
        let mut rng_c = DeterministicRng::new(999);
        let mut rng_d = DeterministicRng::new(999);
        rng_c.fill_bytes(&mut bytes_a);
        rng_d.fill_bytes(&mut bytes_b);
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn offset_shifts_every_seed_and_is_not_idempotent() {
        let mut registry = SeedRegistry::default();
        registry.apply_offset(10);
        for purpose in SeedPurpose::ALL {
            assert_eq!(registry.seed(purpose), purpose.base_seed() + 10);
        }
        registry.apply_offset(10);
        assert_eq!(
            registry.seed(SeedPurpose::AllProblems),
            SeedPurpose::AllProblems.base_seed() + 20
        );
    }

    #[test]
    fn shuffle_reproducible_is_repeatable_and_purpose_specific() {
        let registry = SeedRegistry::with_offset(101);
        let base: Vec<u32> = (0..64).collect();

        let mut first = base.clone();
        let mut second = base.clone();
        registry.shuffle_reproducible(&mut first, SeedPurpose::TrainPairs);
        registry.shuffle_reproducible(&mut second, SeedPurpose::TrainPairs);
        assert_eq!(first, second);
        assert_ne!(first, base);

        let mut other = base.clone();
        registry.shuffle_reproducible(&mut other, SeedPurpose::TestPairs);
        assert_ne!(first, other);
    }

    #[test]
    fn shuffle_after_sort_ignores_input_order() {
        let registry = SeedRegistry::default();
        let mut forward = vec!["p1", "p2", "p3", "p4", "p5", "p6"];
        let mut backward = forward.iter().rev().copied().collect::<Vec<_>>();
        registry.shuffle_after_sort(&mut forward, SeedPurpose::AllProblems);
        registry.shuffle_after_sort(&mut backward, SeedPurpose::AllProblems);
        assert_eq!(forward, backward);
    }

    #[test]
    fn activate_hands_out_independent_generators() {
        let registry = SeedRegistry::default();
        let mut a = registry.activate(SeedPurpose::ValidationPairs);
        let _ = a.next_u64();
        let mut b = registry.activate(SeedPurpose::ValidationPairs);
        let mut c = registry.activate(SeedPurpose::ValidationPairs);
        assert_eq!(b.next_u64(), c.next_u64());
    }

    #[test]
    fn pairs_purpose_follows_split() {
        assert_eq!(
            SeedPurpose::pairs_for(SplitLabel::Train),
            SeedPurpose::TrainPairs
        );
        assert_eq!(
            SeedPurpose::pairs_for(SplitLabel::Validation),
            SeedPurpose::ValidationPairs
        );
        assert_eq!(SeedPurpose::pairs_for(SplitLabel::Test), SeedPurpose::TestPairs);
        assert_eq!(SeedPurpose::TestShuffle.to_string(), "test_shuffle");
    }
}
