use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::splits::{
    DEFAULT_VALIDATION_FRACTION, MIN_GROUP_PROBLEMS, MIN_SOLUTIONS_THREE_WAY,
    MIN_SOLUTIONS_TWO_WAY,
};
use crate::data::Corpus;
use crate::errors::DatasetError;
use crate::rng::{SeedPurpose, SeedRegistry};
use crate::types::{ProblemIdx, SolutionIdx};

/// Logical dataset partitions used during sampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitLabel {
    /// Training split.
    Train,
    /// Validation split.
    Validation,
    /// Test split.
    Test,
}

impl SplitLabel {
    /// Every split, in report order.
    pub const ALL: [SplitLabel; 3] = [SplitLabel::Train, SplitLabel::Validation, SplitLabel::Test];
}

impl fmt::Display for SplitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SplitLabel::Train => "training",
            SplitLabel::Validation => "validation",
            SplitLabel::Test => "test",
        })
    }
}

/// Amount of problems reserved for testing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TestAmount {
    /// No test group.
    #[default]
    None,
    /// Fraction of the corpus problems, in `[0, 1)`.
    Fraction(f64),
    /// Absolute number of problems.
    Count(usize),
}

impl TestAmount {
    /// Parse a CLI-style amount: values below 1 are fractions, others counts.
    pub fn from_value(value: f64) -> Result<Self, DatasetError> {
        if !value.is_finite() || value < 0.0 {
            return Err(DatasetError::Configuration(format!(
                "test amount must be a non-negative number, got {value}"
            )));
        }
        if value == 0.0 {
            Ok(TestAmount::None)
        } else if value < 1.0 {
            Ok(TestAmount::Fraction(value))
        } else if value.fract() == 0.0 {
            Ok(TestAmount::Count(value as usize))
        } else {
            Err(DatasetError::Configuration(format!(
                "test problem count must be an integer, got {value}"
            )))
        }
    }

    /// Number of test problems for a corpus of `n_problems`.
    pub fn resolve(self, n_problems: usize) -> Result<usize, DatasetError> {
        let count = match self {
            TestAmount::None => 0,
            TestAmount::Fraction(fraction) => {
                if !(0.0..1.0).contains(&fraction) {
                    return Err(DatasetError::Configuration(format!(
                        "test fraction must be in [0, 1), got {fraction}"
                    )));
                }
                (n_problems as f64 * fraction).floor() as usize
            }
            TestAmount::Count(count) => count,
        };
        if count == 1 {
            return Err(DatasetError::TooFewSplitProblems {
                split: SplitLabel::Test,
                count,
            });
        }
        if count > n_problems {
            return Err(DatasetError::InsufficientProblems {
                requested: count,
                available: n_problems,
            });
        }
        Ok(count)
    }
}

/// How problems and solutions are assigned to splits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PartitionStrategy {
    /// Test, validation and training use pairwise disjoint problem sets.
    DisjointProblems {
        /// Problems reserved for testing.
        test: TestAmount,
        /// Share of the remaining problems used for validation.
        validation_fraction: f64,
    },
    /// Test problems are disjoint; validation and training split the solutions
    /// of every remaining problem.
    SameProblems {
        /// Problems reserved for testing.
        test: TestAmount,
        /// Share of every remaining problem's solutions used for validation.
        validation_fraction: f64,
    },
    /// Every problem contributes solutions to every split.
    Balanced {
        /// Share of every problem's solutions used for testing.
        test_fraction: f64,
        /// Share of the remaining solutions used for validation.
        validation_fraction: f64,
    },
}

impl Default for PartitionStrategy {
    fn default() -> Self {
        PartitionStrategy::DisjointProblems {
            test: TestAmount::None,
            validation_fraction: DEFAULT_VALIDATION_FRACTION,
        }
    }
}

/// Solutions of one problem assigned to a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSlice {
    /// Global problem label.
    pub problem: ProblemIdx,
    /// Positions in the problem's full solution list.
    pub solutions: Vec<SolutionIdx>,
}

impl ProblemSlice {
    fn whole(problem: ProblemIdx, n_solutions: usize) -> Self {
        Self {
            problem,
            solutions: (0..n_solutions).collect(),
        }
    }

    /// Number of assigned solutions.
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Whether no solution is assigned.
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }
}

/// Problems and solutions available to one split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionGroup {
    /// Label of the first problem of the group.
    pub start_problem: ProblemIdx,
    /// Assigned solutions per problem.
    pub problems: Vec<ProblemSlice>,
}

impl PartitionGroup {
    /// Number of problems.
    pub fn n_problems(&self) -> usize {
        self.problems.len()
    }

    /// Total solutions across the group.
    pub fn n_solutions(&self) -> usize {
        self.problems.iter().map(ProblemSlice::len).sum()
    }

    /// Global labels of the problems in the group.
    pub fn problem_labels(&self) -> Vec<ProblemIdx> {
        self.problems.iter().map(|slice| slice.problem).collect()
    }

    /// Whether `problem` belongs to the group.
    pub fn contains_problem(&self, problem: ProblemIdx) -> bool {
        self.problems.iter().any(|slice| slice.problem == problem)
    }

    /// Slice of `problem`, if it belongs to the group.
    pub fn slice(&self, problem: ProblemIdx) -> Option<&ProblemSlice> {
        self.problems.iter().find(|slice| slice.problem == problem)
    }
}

/// Assignment of problems or solutions to train/validation/test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Strategy that produced the partition.
    pub strategy: PartitionStrategy,
    /// Training group.
    pub train: PartitionGroup,
    /// Validation group, if any.
    pub validation: Option<PartitionGroup>,
    /// Test group, if any.
    pub test: Option<PartitionGroup>,
}

impl Partition {
    /// Group for `label`, if the strategy produced one.
    pub fn group(&self, label: SplitLabel) -> Option<&PartitionGroup> {
        match label {
            SplitLabel::Train => Some(&self.train),
            SplitLabel::Validation => self.validation.as_ref(),
            SplitLabel::Test => self.test.as_ref(),
        }
    }

    /// Labels of the problems used for training or validation, ascending.
    pub fn train_valid_problems(&self) -> Vec<ProblemIdx> {
        let mut labels = self.train.problem_labels();
        if let Some(validation) = &self.validation {
            labels.extend(validation.problem_labels());
        }
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

/// Split `corpus` according to `strategy`.
pub fn partition(
    corpus: &Corpus,
    strategy: PartitionStrategy,
    seeds: &SeedRegistry,
) -> Result<Partition, DatasetError> {
    match strategy {
        PartitionStrategy::DisjointProblems {
            test,
            validation_fraction,
        } => partition_disjoint(corpus, strategy, test, validation_fraction),
        PartitionStrategy::SameProblems {
            test,
            validation_fraction,
        } => partition_same_problems(corpus, strategy, test, validation_fraction),
        PartitionStrategy::Balanced {
            test_fraction,
            validation_fraction,
        } => partition_balanced(corpus, strategy, test_fraction, validation_fraction, seeds),
    }
}

fn check_fraction(name: &str, value: f64) -> Result<(), DatasetError> {
    if !(0.0..1.0).contains(&value) {
        return Err(DatasetError::Configuration(format!(
            "{name} must be in [0, 1), got {value}"
        )));
    }
    Ok(())
}

fn whole_problems(corpus: &Corpus, range: std::ops::Range<ProblemIdx>) -> PartitionGroup {
    PartitionGroup {
        start_problem: range.start,
        problems: range
            .map(|label| ProblemSlice::whole(label, corpus.problems[label].n_solutions()))
            .collect(),
    }
}

/// Reserve the trailing problems for testing; returns the remaining count.
fn reserve_test(
    corpus: &Corpus,
    test: TestAmount,
) -> Result<(usize, Option<PartitionGroup>), DatasetError> {
    let n_problems = corpus.n_problems();
    let n_test = test.resolve(n_problems)?;
    let remaining = n_problems - n_test;
    let group = (n_test > 0).then(|| whole_problems(corpus, remaining..n_problems));
    Ok((remaining, group))
}

fn partition_disjoint(
    corpus: &Corpus,
    strategy: PartitionStrategy,
    test: TestAmount,
    validation_fraction: f64,
) -> Result<Partition, DatasetError> {
    check_fraction("validation fraction", validation_fraction)?;
    let (remaining, test) = reserve_test(corpus, test)?;
    let n_validation = (remaining as f64 * validation_fraction).floor() as usize;
    let n_train = remaining - n_validation;
    if validation_fraction > 0.0 && n_validation < MIN_GROUP_PROBLEMS {
        return Err(DatasetError::TooFewSplitProblems {
            split: SplitLabel::Validation,
            count: n_validation,
        });
    }
    if n_train < MIN_GROUP_PROBLEMS {
        return Err(DatasetError::TooFewSplitProblems {
            split: SplitLabel::Train,
            count: n_train,
        });
    }
    let validation = (n_validation > 0).then(|| whole_problems(corpus, 0..n_validation));
    let train = whole_problems(corpus, n_validation..remaining);
    Ok(Partition {
        strategy,
        train,
        validation,
        test,
    })
}

fn partition_same_problems(
    corpus: &Corpus,
    strategy: PartitionStrategy,
    test: TestAmount,
    validation_fraction: f64,
) -> Result<Partition, DatasetError> {
    check_fraction("validation fraction", validation_fraction)?;
    let (remaining, test) = reserve_test(corpus, test)?;
    if remaining < MIN_GROUP_PROBLEMS {
        return Err(DatasetError::TooFewSplitProblems {
            split: SplitLabel::Train,
            count: remaining,
        });
    }
    let mut train = Vec::with_capacity(remaining);
    let mut validation = Vec::with_capacity(remaining);
    for problem in &corpus.problems[..remaining] {
        let n = problem.n_solutions();
        let cut = (n as f64 * validation_fraction).floor() as usize;
        validation.push(ProblemSlice {
            problem: problem.label,
            solutions: (0..cut).collect(),
        });
        train.push(ProblemSlice {
            problem: problem.label,
            solutions: (cut..n).collect(),
        });
    }
    let validation = (validation_fraction > 0.0).then_some(PartitionGroup {
        start_problem: 0,
        problems: validation,
    });
    Ok(Partition {
        strategy,
        train: PartitionGroup {
            start_problem: 0,
            problems: train,
        },
        validation,
        test,
    })
}

fn partition_balanced(
    corpus: &Corpus,
    strategy: PartitionStrategy,
    test_fraction: f64,
    validation_fraction: f64,
    seeds: &SeedRegistry,
) -> Result<Partition, DatasetError> {
    check_fraction("test fraction", test_fraction)?;
    check_fraction("validation fraction", validation_fraction)?;
    let with_test = test_fraction > 0.0;
    let with_validation = validation_fraction > 0.0;
    let required = match (with_test, with_validation) {
        (true, true) => MIN_SOLUTIONS_THREE_WAY,
        (true, false) | (false, true) => MIN_SOLUTIONS_TWO_WAY,
        (false, false) => 1,
    };

    let mut test_rng = seeds.activate(SeedPurpose::TestShuffle);
    let mut validation_rng = seeds.activate(SeedPurpose::ValidationShuffle);
    let mut train_rng = seeds.activate(SeedPurpose::TrainShuffle);

    let mut test = Vec::new();
    let mut validation = Vec::new();
    let mut train = Vec::with_capacity(corpus.n_problems());
    for problem in &corpus.problems {
        let n = problem.n_solutions();
        if n < required {
            return Err(DatasetError::InsufficientSolutions {
                problem: problem.name.clone(),
                solutions: n,
                required,
            });
        }
        let mut order: Vec<SolutionIdx> = (0..n).collect();
        order.shuffle(&mut test_rng);

        let n_test = if with_test {
            ((n as f64 * test_fraction).floor() as usize).max(1)
        } else {
            0
        };
        let mut train_valid = order;
        let test_part = train_valid.split_off(n - n_test);
        if with_test {
            test.push(ProblemSlice {
                problem: problem.label,
                solutions: test_part,
            });
        }

        train_valid.shuffle(&mut validation_rng);
        let r = train_valid.len();
        let n_validation = if with_validation {
            ((r as f64 * validation_fraction).floor() as usize).max(1)
        } else {
            0
        };
        let mut train_part = train_valid.split_off(n_validation);
        if train_part.is_empty() {
            return Err(DatasetError::Configuration(format!(
                "problem {} has {n} solutions; test ({n_test}) and validation ({n_validation}) cuts leave none for training",
                problem.name
            )));
        }
        if with_validation {
            validation.push(ProblemSlice {
                problem: problem.label,
                solutions: train_valid,
            });
        }
        train_part.shuffle(&mut train_rng);
        train.push(ProblemSlice {
            problem: problem.label,
            solutions: train_part,
        });
    }

    let group = |problems: Vec<ProblemSlice>| PartitionGroup {
        start_problem: 0,
        problems,
    };
    Ok(Partition {
        strategy,
        train: group(train),
        validation: with_validation.then(|| group(validation)),
        test: with_test.then(|| group(test)),
    })
}
