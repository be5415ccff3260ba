use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::constants::sampler::SEL_SIZE;
use crate::data::PairSample;
use crate::errors::DatasetError;
use crate::rng::{DeterministicRng, SeedPurpose, SeedRegistry};
use crate::splits::PartitionGroup;
use crate::types::ProblemIdx;

/// Pairs generated for one partition group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratedPairs {
    /// Shuffled similar and dissimilar pairs.
    pub pairs: Vec<PairSample>,
    /// Number of similar pairs.
    pub n_similar: usize,
    /// Number of dissimilar pairs.
    pub n_dissimilar: usize,
}

impl GeneratedPairs {
    /// Total number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair was generated.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Observed share of similar pairs.
    pub fn similar_fraction(&self) -> f64 {
        if self.pairs.is_empty() {
            0.0
        } else {
            self.n_similar as f64 / self.pairs.len() as f64
        }
    }
}

/// Discretised table mapping uniform slots to problems in proportion to
/// their share of solutions.
#[derive(Clone, Debug)]
pub struct SelectionTable {
    /// Slot → position in the group's problem list.
    slots: Vec<usize>,
    distinct: usize,
}

impl SelectionTable {
    /// Build a table of `size` slots over the problems of `group`.
    pub fn new(group: &PartitionGroup, size: usize) -> Self {
        let total = group.n_solutions();
        let mut slots = vec![0usize; size];
        let mut distinct = 0;
        let mut current = 0usize;
        let mut last_non_empty = None;
        if total > 0 {
            for (position, slice) in group.problems.iter().enumerate() {
                if slice.is_empty() {
                    continue;
                }
                let share = slice.len() as f64 / total as f64;
                let next = ((current as f64 + share * size as f64) as usize).min(size);
                if next > current {
                    distinct += 1;
                }
                slots[current..next].fill(position);
                current = next;
                last_non_empty = Some(position);
            }
        }
        if let Some(position) = last_non_empty {
            if current < size && slots[..current].iter().all(|slot| *slot != position) {
                distinct += 1;
            }
            slots[current..].fill(position);
        }
        Self { slots, distinct }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of problems reachable through the table.
    pub fn distinct_problems(&self) -> usize {
        self.distinct
    }

    /// Problem position stored in `slot`.
    pub fn slot(&self, slot: usize) -> usize {
        self.slots[slot]
    }

    /// Draw a problem position with probability proportional to its slots.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.slots[rng.random_range(0..self.slots.len())]
    }

    /// Number of slots owned by each problem position.
    pub fn slot_counts(&self, n_problems: usize) -> Vec<usize> {
        let mut counts = vec![0usize; n_problems];
        for slot in &self.slots {
            if let Some(count) = counts.get_mut(*slot) {
                *count += 1;
            }
        }
        counts
    }
}

/// Similar-pair budget per problem of `group`, proportional to ordered pair counts.
pub fn similar_allocation(group: &PartitionGroup, budget: usize) -> Vec<(ProblemIdx, usize)> {
    let total_pairs: usize = group
        .problems
        .iter()
        .map(|slice| slice.len() * slice.len().saturating_sub(1))
        .sum();
    if total_pairs == 0 {
        return Vec::new();
    }
    group
        .problems
        .iter()
        .filter(|slice| slice.len() >= 2)
        .map(|slice| {
            let pairs = slice.len() * (slice.len() - 1);
            let share = (budget as f64 * pairs as f64 / total_pairs as f64) as usize;
            (slice.problem, share)
        })
        .collect()
}

/// Generates reproducible similar/dissimilar solution pairs for a partition group.
#[derive(Clone, Debug)]
pub struct PairSampler {
    selection_size: usize,
}

impl Default for PairSampler {
    fn default() -> Self {
        Self {
            selection_size: SEL_SIZE,
        }
    }
}

impl PairSampler {
    /// Sampler with the default selection table size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the number of selection table slots.
    pub fn with_selection_size(mut self, selection_size: usize) -> Self {
        self.selection_size = selection_size.max(1);
        self
    }

    /// Number of selection table slots.
    pub fn selection_size(&self) -> usize {
        self.selection_size
    }

    /// Generate pairs with a generator freshly seeded for `purpose`.
    pub fn generate(
        &self,
        group: &PartitionGroup,
        target_size: usize,
        similar_fraction: f64,
        seeds: &SeedRegistry,
        purpose: SeedPurpose,
    ) -> Result<GeneratedPairs, DatasetError> {
        let mut rng = seeds.activate(purpose);
        self.generate_with_rng(group, target_size, similar_fraction, &mut rng)
    }

    /// Generate pairs drawing from `rng`.
    pub fn generate_with_rng(
        &self,
        group: &PartitionGroup,
        target_size: usize,
        similar_fraction: f64,
        rng: &mut DeterministicRng,
    ) -> Result<GeneratedPairs, DatasetError> {
        if !(0.0..=1.0).contains(&similar_fraction) {
            return Err(DatasetError::Configuration(format!(
                "similar fraction must be in [0, 1], got {similar_fraction}"
            )));
        }
        let budget = (target_size as f64 * similar_fraction).round() as usize;
        let mut pairs = Vec::with_capacity(target_size);
        self.add_similar(group, budget, rng, &mut pairs);
        let n_similar = pairs.len();
        let n_dissimilar = target_size - n_similar;
        self.add_dissimilar(group, n_dissimilar, rng, &mut pairs)?;
        pairs.shuffle(rng);
        info!(
            "[solution_pairs:sampler] pair dataset of {} samples is ready ({} similar, {} dissimilar)",
            pairs.len(),
            n_similar,
            n_dissimilar
        );
        Ok(GeneratedPairs {
            pairs,
            n_similar,
            n_dissimilar,
        })
    }

    fn add_similar(
        &self,
        group: &PartitionGroup,
        budget: usize,
        rng: &mut DeterministicRng,
        pairs: &mut Vec<PairSample>,
    ) {
        if budget == 0 {
            return;
        }
        let allocation = similar_allocation(group, budget);
        if allocation.is_empty() {
            debug!(
                start_problem = group.start_problem,
                "no problem has two solutions; skipping similar pairs"
            );
            return;
        }
        for (slice, (_, count)) in group
            .problems
            .iter()
            .filter(|slice| slice.len() >= 2)
            .zip(allocation)
        {
            let n = slice.len();
            for _ in 0..count {
                let (first, second) = loop {
                    let first = rng.random_range(0..n);
                    let second = rng.random_range(0..n);
                    if first != second {
                        break (first, second);
                    }
                };
                pairs.push(PairSample::new(
                    slice.problem,
                    slice.solutions[first],
                    slice.problem,
                    slice.solutions[second],
                ));
            }
        }
    }

    fn add_dissimilar(
        &self,
        group: &PartitionGroup,
        count: usize,
        rng: &mut DeterministicRng,
        pairs: &mut Vec<PairSample>,
    ) -> Result<(), DatasetError> {
        if count == 0 {
            return Ok(());
        }
        let table = SelectionTable::new(group, self.selection_size);
        if table.distinct_problems() < 2 {
            return Err(DatasetError::Sampling(format!(
                "{count} dissimilar pairs requested but only {} problems with solutions are available",
                table.distinct_problems()
            )));
        }
        for _ in 0..count {
            let (left, right) = loop {
                let left = table.draw(rng);
                let right = table.draw(rng);
                if left != right {
                    break (left, right);
                }
            };
            let left = &group.problems[left];
            let right = &group.problems[right];
            let solution1 = left.solutions[rng.random_range(0..left.len())];
            let solution2 = right.solutions[rng.random_range(0..right.len())];
            pairs.push(PairSample::new(
                left.problem,
                solution1,
                right.problem,
                solution2,
            ));
        }
        Ok(())
    }
}
