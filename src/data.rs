use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use crate::types::{
    ProblemIdx, ProblemName, SolutionIdx, SolutionName, TokenId, TokenSetName,
};

/// One tokenized source file solving a problem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Solution name from the tokenized file.
    pub name: SolutionName,
    /// Token ids, each below the corpus vocabulary size.
    pub tokens: Vec<TokenId>,
}

impl Solution {
    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the solution has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A named group of solutions to one programming task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Problem {
    /// Problem name, the tokenized file stem.
    pub name: ProblemName,
    /// Dense label in `0..N-1`, equal to the problem's position in the corpus.
    pub label: ProblemIdx,
    /// Retained solutions in reproducibly shuffled order.
    pub solutions: Vec<Solution>,
}

impl Problem {
    /// Number of retained solutions.
    pub fn n_solutions(&self) -> usize {
        self.solutions.len()
    }

    /// Number of ordered similar pairs (no self-pairs) this problem can produce.
    pub fn ordered_pair_count(&self) -> usize {
        let n = self.solutions.len();
        n * n.saturating_sub(1)
    }
}

/// A solution excluded for its length, kept for operator reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedSolution {
    /// Omitted solution name.
    pub solution: SolutionName,
    /// Its token count.
    pub n_tokens: usize,
}

/// Bookkeeping produced while loading a corpus.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoadReport {
    /// Too-short solutions keyed by problem, in discovery order.
    pub too_short: IndexMap<ProblemName, Vec<OmittedSolution>>,
    /// Too-long solutions keyed by problem, in discovery order.
    pub too_long: IndexMap<ProblemName, Vec<OmittedSolution>>,
    /// Problems whose file could not be read.
    pub unreadable: Vec<ProblemName>,
    /// Problems dropped for having too few retained solutions.
    pub underpopulated: Vec<(ProblemName, usize)>,
    /// Number of rejected tokenized lines.
    pub rejected_lines: usize,
    /// Set whenever a per-item data error was recovered from.
    pub bad_data: bool,
}

impl LoadReport {
    pub(crate) fn register_short(&mut self, problem: &str, solution: OmittedSolution) {
        self.too_short
            .entry(problem.to_string())
            .or_default()
            .push(solution);
    }

    pub(crate) fn register_long(&mut self, problem: &str, solution: OmittedSolution) {
        self.too_long
            .entry(problem.to_string())
            .or_default()
            .push(solution);
    }

    /// Total number of solutions excluded for their length.
    pub fn omitted_solutions(&self) -> usize {
        self.too_short
            .values()
            .chain(self.too_long.values())
            .map(Vec::len)
            .sum()
    }
}

/// Immutable set of problems produced by the corpus loader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Corpus {
    /// Token-set name from `info.json`.
    pub token_set: TokenSetName,
    /// Vocabulary size; every token id is strictly below it.
    pub n_tokens: usize,
    /// Problems in label order.
    pub problems: Vec<Problem>,
    /// Length of the longest retained solution.
    pub code_max_length: usize,
    /// Load bookkeeping for reports.
    pub report: LoadReport,
}

impl Corpus {
    /// Build a corpus from already-finalised problems, relabelling them densely.
    pub fn from_problems(
        token_set: impl Into<TokenSetName>,
        n_tokens: usize,
        problems: Vec<(ProblemName, Vec<Solution>)>,
    ) -> Self {
        let problems: Vec<Problem> = problems
            .into_iter()
            .enumerate()
            .map(|(label, (name, solutions))| Problem {
                name,
                label,
                solutions,
            })
            .collect();
        let code_max_length = problems
            .iter()
            .flat_map(|problem| problem.solutions.iter().map(Solution::len))
            .max()
            .unwrap_or(0);
        Self {
            token_set: token_set.into(),
            n_tokens,
            problems,
            code_max_length,
            report: LoadReport::default(),
        }
    }

    /// Number of problems.
    pub fn n_problems(&self) -> usize {
        self.problems.len()
    }

    /// Total number of retained solutions across all problems.
    pub fn n_solutions(&self) -> usize {
        self.problems.iter().map(Problem::n_solutions).sum()
    }

    /// Problem with label `label`.
    pub fn problem(&self, label: ProblemIdx) -> Option<&Problem> {
        self.problems.get(label)
    }

    /// Name of the problem with label `label`.
    pub fn problem_name(&self, label: ProblemIdx) -> Option<&str> {
        self.problems.get(label).map(|problem| problem.name.as_str())
    }

    /// Label for a problem name, if loaded.
    pub fn label_of(&self, name: &str) -> Option<ProblemIdx> {
        self.problems
            .iter()
            .position(|problem| problem.name == name)
    }

    /// Solution `solution` of problem `problem`.
    pub fn solution(&self, problem: ProblemIdx, solution: SolutionIdx) -> Option<&Solution> {
        self.problems
            .get(problem)
            .and_then(|problem| problem.solutions.get(solution))
    }

    /// Solution counts in label order.
    pub fn solution_counts(&self) -> Vec<usize> {
        self.problems.iter().map(Problem::n_solutions).collect()
    }
}

/// Label encoding for pair datasets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelMode {
    /// Similar = 1, dissimilar = 0.
    #[default]
    Binary,
    /// Similar = +1, dissimilar = -1.
    Bipolar,
}

impl LabelMode {
    /// Label value of a similar pair.
    pub const fn similar(self) -> i32 {
        1
    }

    /// Label value of a dissimilar pair.
    pub const fn dissimilar(self) -> i32 {
        match self {
            LabelMode::Binary => 0,
            LabelMode::Bipolar => -1,
        }
    }
}

/// Pair label for supervised pair datasets.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PairLabel {
    /// Both solutions solve the same problem.
    Similar,
    /// The solutions solve different problems.
    Dissimilar,
}

impl PairLabel {
    /// Numeric value of the label under `mode`.
    pub fn value(self, mode: LabelMode) -> i32 {
        match self {
            PairLabel::Similar => mode.similar(),
            PairLabel::Dissimilar => mode.dissimilar(),
        }
    }
}

/// A pair of solutions, addressed by global problem label and solution position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairSample {
    /// Problem of the left solution.
    pub problem1: ProblemIdx,
    /// Left solution position.
    pub solution1: SolutionIdx,
    /// Problem of the right solution.
    pub problem2: ProblemIdx,
    /// Right solution position.
    pub solution2: SolutionIdx,
}

impl PairSample {
    /// Pair `(problem1, solution1)` with `(problem2, solution2)`.
    pub fn new(
        problem1: ProblemIdx,
        solution1: SolutionIdx,
        problem2: ProblemIdx,
        solution2: SolutionIdx,
    ) -> Self {
        Self {
            problem1,
            solution1,
            problem2,
            solution2,
        }
    }

    /// Whether both solutions share a problem.
    pub fn is_similar(&self) -> bool {
        self.problem1 == self.problem2
    }

    /// Label derived from the problem indices.
    pub fn label(&self) -> PairLabel {
        if self.is_similar() {
            PairLabel::Similar
        } else {
            PairLabel::Dissimilar
        }
    }

    /// `(problem1, solution1, problem2, solution2)`.
    pub fn as_tuple(&self) -> (ProblemIdx, SolutionIdx, ProblemIdx, SolutionIdx) {
        (self.problem1, self.solution1, self.problem2, self.solution2)
    }
}

/// Numeric labels for `pairs` under `mode`.
pub fn pair_labels(pairs: &[PairSample], mode: LabelMode) -> Vec<i32> {
    pairs.iter().map(|pair| pair.label().value(mode)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(name: &str, len: usize) -> Solution {
        Solution {
            name: name.to_string(),
            tokens: (0..len as TokenId).collect(),
        }
    }

    #[test]
    fn corpus_from_problems_assigns_dense_labels_and_max_length() {
        let corpus = Corpus::from_problems(
            "java",
            16,
            vec![
                ("p1".into(), vec![solution("a", 3), solution("b", 7)]),
                ("p2".into(), vec![solution("c", 5)]),
            ],
        );
        assert_eq!(corpus.n_problems(), 2);
        assert_eq!(corpus.n_solutions(), 3);
        assert_eq!(corpus.code_max_length, 7);
        assert_eq!(corpus.problems[1].label, 1);
        assert_eq!(corpus.label_of("p2"), Some(1));
        assert_eq!(corpus.problem_name(0), Some("p1"));
        assert_eq!(corpus.solution(0, 1).map(|s| s.name.as_str()), Some("b"));
        assert!(corpus.solution(1, 1).is_none());
        assert_eq!(corpus.solution_counts(), vec![2, 1]);
    }

    #[test]
    fn ordered_pair_count_excludes_self_pairs() {
        let problem = Problem {
            name: "p".into(),
            label: 0,
            solutions: (0..5).map(|i| solution(&format!("s{i}"), 4)).collect(),
        };
        assert_eq!(problem.ordered_pair_count(), 20);
        let single = Problem {
            name: "q".into(),
            label: 1,
            solutions: vec![solution("only", 4)],
        };
        assert_eq!(single.ordered_pair_count(), 0);
    }

    #[test]
    fn labels_follow_problem_equality_in_both_modes() {
        let pairs = vec![PairSample::new(2, 0, 2, 1), PairSample::new(2, 0, 3, 0)];
        assert_eq!(pair_labels(&pairs, LabelMode::Binary), vec![1, 0]);
        assert_eq!(pair_labels(&pairs, LabelMode::Bipolar), vec![1, -1]);
        assert_eq!(pairs[0].label(), PairLabel::Similar);
        assert_eq!(pairs[1].as_tuple(), (2, 0, 3, 0));
    }

    #[test]
    fn load_report_counts_omissions_in_discovery_order() {
        let mut report = LoadReport::default();
        report.register_long(
            "p9",
            OmittedSolution {
                solution: "x".into(),
                n_tokens: 900,
            },
        );
        report.register_short(
            "p2",
            OmittedSolution {
                solution: "y".into(),
                n_tokens: 1,
            },
        );
        report.register_short(
            "p1",
            OmittedSolution {
                solution: "z".into(),
                n_tokens: 2,
            },
        );
        assert_eq!(report.omitted_solutions(), 3);
        let order: Vec<&str> = report.too_short.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["p2", "p1"]);
    }
}
