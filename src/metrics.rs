use std::collections::{BTreeMap, HashMap, HashSet};

use crate::data::{LabelMode, PairSample};
use crate::errors::DatasetError;
use crate::splits::{PartitionGroup, SplitLabel};
use crate::types::{ProblemIdx, SolutionIdx};

/// Pair statistics of one problem within a pair dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemPairStats {
    /// Problem label.
    pub problem: ProblemIdx,
    /// Similar pairs of this problem.
    pub same: usize,
    /// Dissimilar pairs with this problem on the left.
    pub left: usize,
    /// Dissimilar pairs with this problem on the right.
    pub right: usize,
    /// Fewest pairs with any partner problem.
    pub min_pairs: usize,
    /// Most pairs with any partner problem.
    pub max_pairs: usize,
    /// Median pairs per partner problem.
    pub median_pairs: f64,
    /// Mean pairs per partner problem.
    pub mean_pairs: f64,
    /// Population standard deviation of the row of the pair-count matrix.
    pub std_pairs: f64,
    /// Least frequent right-hand partner, when it appears at least once.
    pub least_partner: Option<ProblemIdx>,
    /// Most frequent right-hand partner, when it appears at least once.
    pub most_partner: Option<ProblemIdx>,
}

/// How often each problem of a contiguous range appears in a pair dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemDistribution {
    /// First problem of the range.
    pub start_problem: ProblemIdx,
    /// Number of problems in the range.
    pub n_problems: usize,
    /// Number of pairs aggregated.
    pub n_samples: usize,
    /// Rows for problems present in at least one pair.
    pub rows: Vec<ProblemPairStats>,
    /// `pair_counts[i][j]` counts pairs `(start + i, start + j)`.
    pub pair_counts: Vec<Vec<usize>>,
    /// Pairs referencing problems outside the range.
    pub out_of_range: usize,
    /// Problems absent from every pair.
    pub fully_omitted: Vec<ProblemIdx>,
    /// Present problems absent from similar pairs.
    pub same_omitted: Vec<ProblemIdx>,
    /// Present problems absent from dissimilar pairs.
    pub different_omitted: Vec<ProblemIdx>,
    /// Present problems never on the left of a dissimilar pair.
    pub left_omitted: Vec<ProblemIdx>,
    /// Present problems never on the right of a dissimilar pair.
    pub right_omitted: Vec<ProblemIdx>,
}

impl ProblemDistribution {
    /// Share of all samples represented by `count`, in percent.
    pub fn percent(&self, count: usize) -> f64 {
        if self.n_samples == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.n_samples as f64
        }
    }

    /// Number of dissimilar pairs each present problem takes part in.
    pub fn cross_problem_counts(&self) -> HashMap<ProblemIdx, usize> {
        self.rows
            .iter()
            .map(|row| (row.problem, row.left + row.right))
            .collect()
    }
}

/// Per-problem pair statistics for problems `start_problem..start_problem + n_problems`.
pub fn problem_distribution(
    pairs: &[PairSample],
    start_problem: ProblemIdx,
    n_problems: usize,
) -> ProblemDistribution {
    let mut same = vec![0usize; n_problems];
    let mut left = vec![0usize; n_problems];
    let mut right = vec![0usize; n_problems];
    let mut pair_counts = vec![vec![0usize; n_problems]; n_problems];
    let mut out_of_range = 0;
    let local = |problem: ProblemIdx| {
        problem
            .checked_sub(start_problem)
            .filter(|offset| *offset < n_problems)
    };
    for pair in pairs {
        let (Some(p1), Some(p2)) = (local(pair.problem1), local(pair.problem2)) else {
            out_of_range += 1;
            continue;
        };
        pair_counts[p1][p2] += 1;
        if p1 == p2 {
            same[p1] += 1;
        } else {
            left[p1] += 1;
            right[p2] += 1;
        }
    }

    let mut distribution = ProblemDistribution {
        start_problem,
        n_problems,
        n_samples: pairs.len(),
        rows: Vec::new(),
        pair_counts: Vec::new(),
        out_of_range,
        fully_omitted: Vec::new(),
        same_omitted: Vec::new(),
        different_omitted: Vec::new(),
        left_omitted: Vec::new(),
        right_omitted: Vec::new(),
    };
    for i in 0..n_problems {
        let problem = start_problem + i;
        if same[i] + left[i] + right[i] == 0 {
            distribution.fully_omitted.push(problem);
            continue;
        }
        let row = &pair_counts[i];
        let (min_at, min_pairs) = arg_extreme(row, |candidate, best| candidate < best);
        let (max_at, max_pairs) = arg_extreme(row, |candidate, best| candidate > best);
        let mean_pairs = row.iter().sum::<usize>() as f64 / n_problems as f64;
        let variance = row
            .iter()
            .map(|count| {
                let delta = *count as f64 - mean_pairs;
                delta * delta
            })
            .sum::<f64>()
            / n_problems as f64;
        distribution.rows.push(ProblemPairStats {
            problem,
            same: same[i],
            left: left[i],
            right: right[i],
            min_pairs,
            max_pairs,
            median_pairs: median(row),
            mean_pairs,
            std_pairs: variance.sqrt(),
            least_partner: (min_pairs > 0).then_some(start_problem + min_at),
            most_partner: (max_pairs > 0).then_some(start_problem + max_at),
        });
        if same[i] == 0 {
            distribution.same_omitted.push(problem);
        }
        if left[i] == 0 {
            distribution.left_omitted.push(problem);
        }
        if right[i] == 0 {
            distribution.right_omitted.push(problem);
        }
        if left[i] + right[i] == 0 {
            distribution.different_omitted.push(problem);
        }
    }
    distribution.pair_counts = pair_counts;
    distribution
}

/// First position whose value wins `better` against every earlier value.
fn arg_extreme(row: &[usize], better: impl Fn(usize, usize) -> bool) -> (usize, usize) {
    let mut best_at = 0;
    let mut best = row.first().copied().unwrap_or(0);
    for (idx, value) in row.iter().enumerate().skip(1) {
        if better(*value, best) {
            best = *value;
            best_at = idx;
        }
    }
    (best_at, best)
}

fn median(row: &[usize]) -> f64 {
    if row.is_empty() {
        return 0.0;
    }
    let mut sorted = row.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

/// Aggregate skew metrics for per-problem pair counts.
#[derive(Clone, Debug, PartialEq)]
pub struct PairCountSkew {
    /// Dissimilar pair slots counted.
    pub total: usize,
    /// Problems counted.
    pub problems: usize,
    /// Smallest per-problem count.
    pub min: usize,
    /// Largest per-problem count.
    pub max: usize,
    /// Mean per-problem count.
    pub mean: f64,
    /// Share of the largest count.
    pub max_share: f64,
    /// Share of the smallest count.
    pub min_share: f64,
    /// `max / min`, infinite when a problem has no pairs.
    pub ratio: f64,
    /// Shares by descending count.
    pub per_problem: Vec<ProblemShare>,
}

/// Share of a pair dataset taken by one problem.
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemShare {
    /// Problem label.
    pub problem: ProblemIdx,
    /// Dissimilar pairs it takes part in.
    pub count: usize,
    /// Share of all counted slots.
    pub share: f64,
}

/// Skew of the cross-problem pair counts of `distribution`.
pub fn pair_count_skew(distribution: &ProblemDistribution) -> Option<PairCountSkew> {
    count_skew(&distribution.cross_problem_counts())
}

/// Compute skew metrics from per-problem pair counts.
pub fn count_skew(counts: &HashMap<ProblemIdx, usize>) -> Option<PairCountSkew> {
    let min = *counts.values().min()?;
    let max = *counts.values().max()?;
    let total: usize = counts.values().sum();
    let problems = counts.len();
    let share_of = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    let ratio = if min == 0 {
        f64::INFINITY
    } else {
        max as f64 / min as f64
    };
    let mut per_problem: Vec<ProblemShare> = counts
        .iter()
        .map(|(problem, count)| ProblemShare {
            problem: *problem,
            count: *count,
            share: share_of(*count),
        })
        .collect();
    per_problem.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.problem.cmp(&b.problem)));
    Some(PairCountSkew {
        total,
        problems,
        min,
        max,
        mean: total as f64 / problems as f64,
        max_share: share_of(max),
        min_share: share_of(min),
        ratio,
        per_problem,
    })
}

/// Usage statistics of one side of a pair dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct SideUsage {
    /// Smallest fraction of a problem's solutions that appear on this side.
    pub min_fraction_used: f64,
    /// Largest fraction of a problem's solutions used on this side.
    pub max_fraction_used: f64,
    /// Smallest ratio of distinct solutions to draws for a problem.
    pub min_uniqueness: f64,
    /// Largest ratio of distinct solutions to draws for a problem.
    pub max_uniqueness: f64,
    /// Distinct solutions used, summed over problems.
    pub solutions_used: usize,
    /// Solutions available, summed over problems.
    pub total_solutions: usize,
}

impl Default for SideUsage {
    fn default() -> Self {
        Self {
            min_fraction_used: 1.0,
            max_fraction_used: 0.0,
            min_uniqueness: 1.0,
            max_uniqueness: 0.0,
            solutions_used: 0,
            total_solutions: 0,
        }
    }
}

impl SideUsage {
    fn update(&mut self, n_unique: usize, n_used: usize, n_total: usize) {
        if n_total == 0 {
            return;
        }
        let fraction = n_unique as f64 / n_total as f64;
        self.min_fraction_used = self.min_fraction_used.min(fraction);
        self.max_fraction_used = self.max_fraction_used.max(fraction);
        if n_used > 0 {
            let uniqueness = n_unique as f64 / n_used as f64;
            self.min_uniqueness = self.min_uniqueness.min(uniqueness);
            self.max_uniqueness = self.max_uniqueness.max(uniqueness);
        }
        self.solutions_used += n_unique;
        self.total_solutions += n_total;
    }
}

#[derive(Default)]
struct ProblemUsage {
    similar_left: HashSet<SolutionIdx>,
    similar_right: HashSet<SolutionIdx>,
    n_similar: usize,
    left: HashSet<SolutionIdx>,
    n_left: usize,
    right: HashSet<SolutionIdx>,
    n_right: usize,
}

/// How thoroughly and how repetitively a pair dataset uses a group's solutions.
#[derive(Clone, Debug, PartialEq)]
pub struct SolutionUsage {
    /// Left side of similar pairs.
    pub similar_left: SideUsage,
    /// Right side of similar pairs.
    pub similar_right: SideUsage,
    /// Left side of dissimilar pairs.
    pub dissimilar_left: SideUsage,
    /// Right side of dissimilar pairs.
    pub dissimilar_right: SideUsage,
    /// Problems in the group.
    pub n_problems: usize,
    /// Solutions available across the group.
    pub total_solutions: usize,
    /// Problem with the fewest solutions and its count.
    pub min_solutions: Option<(ProblemIdx, usize)>,
    /// Problem with the most solutions and its count.
    pub max_solutions: Option<(ProblemIdx, usize)>,
}

/// Solution usage of `pairs` against the solutions available in `group`.
pub fn solution_usage(pairs: &[PairSample], group: &PartitionGroup) -> SolutionUsage {
    let mut per_problem: HashMap<ProblemIdx, ProblemUsage> = HashMap::new();
    for pair in pairs {
        if pair.is_similar() {
            let usage = per_problem.entry(pair.problem1).or_default();
            usage.similar_left.insert(pair.solution1);
            usage.similar_right.insert(pair.solution2);
            usage.n_similar += 1;
        } else {
            let usage = per_problem.entry(pair.problem1).or_default();
            usage.left.insert(pair.solution1);
            usage.n_left += 1;
            let usage = per_problem.entry(pair.problem2).or_default();
            usage.right.insert(pair.solution2);
            usage.n_right += 1;
        }
    }

    let mut result = SolutionUsage {
        similar_left: SideUsage::default(),
        similar_right: SideUsage::default(),
        dissimilar_left: SideUsage::default(),
        dissimilar_right: SideUsage::default(),
        n_problems: 0,
        total_solutions: 0,
        min_solutions: None,
        max_solutions: None,
    };
    let empty = ProblemUsage::default();
    for slice in &group.problems {
        let n_total = slice.len();
        let usage = per_problem.get(&slice.problem).unwrap_or(&empty);
        result
            .similar_left
            .update(usage.similar_left.len(), usage.n_similar, n_total);
        result
            .similar_right
            .update(usage.similar_right.len(), usage.n_similar, n_total);
        result
            .dissimilar_left
            .update(usage.left.len(), usage.n_left, n_total);
        result
            .dissimilar_right
            .update(usage.right.len(), usage.n_right, n_total);
        result.total_solutions += n_total;
        result.n_problems += 1;
        if result.min_solutions.is_none_or(|(_, min)| n_total < min) {
            result.min_solutions = Some((slice.problem, n_total));
        }
        if result.max_solutions.is_none_or(|(_, max)| n_total > max) {
            result.max_solutions = Some((slice.problem, n_total));
        }
    }
    result
}

/// Distribution, skew and usage statistics of one split's pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitStatistics {
    /// Split the pairs were generated for.
    pub split: SplitLabel,
    /// Per-problem pair distribution.
    pub distribution: ProblemDistribution,
    /// Cross-problem skew; `None` when no problem appears in any pair.
    pub skew: Option<PairCountSkew>,
    /// Solution usage per pair side.
    pub usage: SolutionUsage,
}

impl SplitStatistics {
    /// Aggregate `pairs` sampled from `group`.
    pub fn compute(split: SplitLabel, pairs: &[PairSample], group: &PartitionGroup) -> Self {
        let distribution = problem_distribution(pairs, group.start_problem, group.n_problems());
        let skew = pair_count_skew(&distribution);
        Self {
            split,
            distribution,
            skew,
            usage: solution_usage(pairs, group),
        }
    }
}

/// Accuracy of similarity detection for one problem.
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemAccuracy {
    /// Problem label.
    pub problem: ProblemIdx,
    /// Similar pairs evaluated.
    pub tests: usize,
    /// Correctly classified similar pairs.
    pub correct: usize,
}

impl ProblemAccuracy {
    /// Share of correct predictions.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.tests)
    }
}

/// Accuracy of dissimilarity detection for an unordered problem pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemPairAccuracy {
    /// Smaller problem label.
    pub problem1: ProblemIdx,
    /// Larger problem label.
    pub problem2: ProblemIdx,
    /// `(tests, correct)` for pairs ordered `(problem1, problem2)`.
    pub forward: (usize, usize),
    /// `(tests, correct)` for pairs ordered `(problem2, problem1)`.
    pub backward: (usize, usize),
}

impl ProblemPairAccuracy {
    /// Accuracy of `(problem1, problem2)` pairs, if any were evaluated.
    pub fn forward_accuracy(&self) -> Option<f64> {
        (self.forward.0 > 0).then(|| ratio(self.forward.1, self.forward.0))
    }

    /// Accuracy of `(problem2, problem1)` pairs, if any were evaluated.
    pub fn backward_accuracy(&self) -> Option<f64> {
        (self.backward.0 > 0).then(|| ratio(self.backward.1, self.backward.0))
    }

    /// Accuracy over both directions.
    pub fn combined_accuracy(&self) -> f64 {
        ratio(
            self.forward.1 + self.backward.1,
            self.forward.0 + self.backward.0,
        )
    }

    /// Difference between the two directional accuracies, zero if one is missing.
    pub fn asymmetry(&self) -> f64 {
        match (self.forward_accuracy(), self.backward_accuracy()) {
            (Some(forward), Some(backward)) => (forward - backward).abs(),
            _ => 0.0,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Post-hoc evaluation of pair predictions.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityEvaluation {
    /// Dissimilar pairs predicted dissimilar.
    pub tn: usize,
    /// Dissimilar pairs predicted similar.
    pub fp: usize,
    /// Similar pairs predicted dissimilar.
    pub fn_: usize,
    /// Similar pairs predicted similar.
    pub tp: usize,
    /// Similar-pair accuracy per problem, ascending by problem.
    pub similar: Vec<ProblemAccuracy>,
    /// Dissimilar-pair accuracy per unordered problem pair.
    pub dissimilar: Vec<ProblemPairAccuracy>,
    /// Problems taking part in at least one evaluated pair.
    pub tested_problems: Vec<ProblemIdx>,
}

impl SimilarityEvaluation {
    /// Evaluate model scores against pair labels.
    ///
    /// Bipolar scores and labels are mapped to `[0, 1]` with `(s + 1) / 2`;
    /// a probability above one half predicts "similar".
    pub fn new(
        predictions: &[f32],
        labels: &[i32],
        pairs: &[PairSample],
        label_mode: LabelMode,
    ) -> Result<Self, DatasetError> {
        if predictions.len() != labels.len() || labels.len() != pairs.len() {
            return Err(DatasetError::Configuration(format!(
                "evaluation inputs differ in length: {} predictions, {} labels, {} pairs",
                predictions.len(),
                labels.len(),
                pairs.len()
            )));
        }
        let to_probability = |score: f64| match label_mode {
            LabelMode::Binary => score,
            LabelMode::Bipolar => (score + 1.0) / 2.0,
        };

        let mut evaluation = Self {
            tn: 0,
            fp: 0,
            fn_: 0,
            tp: 0,
            similar: Vec::new(),
            dissimilar: Vec::new(),
            tested_problems: Vec::new(),
        };
        let mut similar: BTreeMap<ProblemIdx, (usize, usize)> = BTreeMap::new();
        let mut dissimilar: BTreeMap<(ProblemIdx, ProblemIdx), ProblemPairAccuracy> =
            BTreeMap::new();
        let mut tested: HashSet<ProblemIdx> = HashSet::new();

        for ((score, label), pair) in predictions.iter().zip(labels).zip(pairs) {
            let predicted = to_probability(f64::from(*score)) > 0.5;
            let actual = to_probability(f64::from(*label)) > 0.5;
            match (actual, predicted) {
                (false, false) => evaluation.tn += 1,
                (false, true) => evaluation.fp += 1,
                (true, false) => evaluation.fn_ += 1,
                (true, true) => evaluation.tp += 1,
            }
            let correct = usize::from(actual == predicted);
            tested.insert(pair.problem1);
            tested.insert(pair.problem2);
            if pair.is_similar() {
                let entry = similar.entry(pair.problem1).or_default();
                entry.0 += 1;
                entry.1 += correct;
            } else {
                let key = (
                    pair.problem1.min(pair.problem2),
                    pair.problem1.max(pair.problem2),
                );
                let entry = dissimilar
                    .entry(key)
                    .or_insert_with(|| ProblemPairAccuracy {
                        problem1: key.0,
                        problem2: key.1,
                        forward: (0, 0),
                        backward: (0, 0),
                    });
                let direction = if pair.problem1 == key.0 {
                    &mut entry.forward
                } else {
                    &mut entry.backward
                };
                direction.0 += 1;
                direction.1 += correct;
            }
        }

        evaluation.similar = similar
            .into_iter()
            .map(|(problem, (tests, correct))| ProblemAccuracy {
                problem,
                tests,
                correct,
            })
            .collect();
        evaluation.dissimilar = dissimilar.into_values().collect();
        let mut tested: Vec<ProblemIdx> = tested.into_iter().collect();
        tested.sort_unstable();
        evaluation.tested_problems = tested;
        Ok(evaluation)
    }

    /// Number of evaluated pairs.
    pub fn n_samples(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    /// Share of correct predictions.
    pub fn accuracy(&self) -> f64 {
        ratio(self.tn + self.tp, self.n_samples())
    }

    /// `tp / (tp + fp)`.
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// `tp / (tp + fn)`.
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Weighted harmonic mean of precision and recall.
    pub fn fbeta(&self, beta: f64) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        let beta2 = beta * beta;
        let denominator = beta2 * precision + recall;
        if denominator == 0.0 {
            0.0
        } else {
            (1.0 + beta2) * precision * recall / denominator
        }
    }

    /// Harmonic mean of precision and recall.
    pub fn f1(&self) -> f64 {
        self.fbeta(1.0)
    }

    /// Up to `k` problems with the lowest similar-pair accuracy.
    pub fn worst_similar(&self, k: usize) -> Vec<&ProblemAccuracy> {
        let mut sorted: Vec<&ProblemAccuracy> = self.similar.iter().collect();
        sorted.sort_by(|a, b| a.accuracy().total_cmp(&b.accuracy()));
        sorted.truncate(k);
        sorted
    }

    /// Up to `k` problem pairs with the lowest combined dissimilar-pair accuracy.
    pub fn worst_dissimilar(&self, k: usize) -> Vec<&ProblemPairAccuracy> {
        let mut sorted: Vec<&ProblemPairAccuracy> = self.dissimilar.iter().collect();
        sorted.sort_by(|a, b| a.combined_accuracy().total_cmp(&b.combined_accuracy()));
        sorted.truncate(k);
        sorted
    }

    /// Up to `k` problem pairs whose two directions disagree the most.
    pub fn most_asymmetric(&self, k: usize) -> Vec<&ProblemPairAccuracy> {
        let mut sorted: Vec<&ProblemPairAccuracy> = self.dissimilar.iter().collect();
        sorted.sort_by(|a, b| b.asymmetry().total_cmp(&a.asymmetry()));
        sorted.truncate(k);
        sorted
    }
}
