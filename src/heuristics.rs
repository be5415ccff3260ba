use crate::data::Corpus;
use crate::splits::{Partition, PartitionGroup, SplitLabel};

/// Number of distinct ordered pairs a group can produce.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PairCapacity {
    /// Ordered same-problem pairs without self-pairs.
    pub similar: u128,
    /// Ordered cross-problem pairs.
    pub dissimilar: u128,
}

impl PairCapacity {
    /// Similar plus dissimilar capacity.
    pub fn total(&self) -> u128 {
        self.similar.saturating_add(self.dissimilar)
    }
}

fn capacity_from_counts(counts: impl Iterator<Item = u128> + Clone) -> PairCapacity {
    let total: u128 = counts.clone().sum();
    let mut capacity = PairCapacity::default();
    for n in counts {
        capacity.similar += n.saturating_mul(n.saturating_sub(1));
        capacity.dissimilar += n.saturating_mul(total - n);
    }
    capacity
}

/// Capacity of the solutions a group exposes.
pub fn group_pair_capacity(group: &PartitionGroup) -> PairCapacity {
    capacity_from_counts(group.problems.iter().map(|slice| slice.len() as u128))
}

/// Capacity of the whole corpus as one group.
pub fn corpus_pair_capacity(corpus: &Corpus) -> PairCapacity {
    capacity_from_counts(
        corpus
            .problems
            .iter()
            .map(|problem| problem.n_solutions() as u128),
    )
}

/// Capacity of every group the partition produced, in split order.
pub fn partition_capacity(partition: &Partition) -> Vec<(SplitLabel, PairCapacity)> {
    SplitLabel::ALL
        .into_iter()
        .filter_map(|label| {
            partition
                .group(label)
                .map(|group| (label, group_pair_capacity(group)))
        })
        .collect()
}

/// Format `value` with thousands separators.
pub fn format_u128_with_commas(value: u128) -> String {
    let raw = value.to_string();
    let mut grouped = String::with_capacity(raw.len() + raw.len() / 3);
    for (idx, ch) in raw.chars().enumerate() {
        if idx > 0 && (raw.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// How many times each distinct pair is drawn on average when `requested` pairs
/// come from `capacity` distinct ones.
pub fn format_reuse_factor(requested: u128, capacity: u128) -> String {
    if requested == 0 || capacity == 0 {
        return "n/a".to_string();
    }
    let factor = requested as f64 / capacity as f64;
    format!("{factor:.2}x")
}
