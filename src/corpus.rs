use rand::seq::SliceRandom;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
pub use crate::constants::corpus::{
    SKIP_BAD_LINE_MSG, SKIP_UNREADABLE_MSG, SOLUTION_DELIMITER, TOKEN_DELIMITER,
    TOKENIZED_EXTENSION,
};
use crate::data::{Corpus, LoadReport, OmittedSolution, Problem, Solution};
use crate::errors::DatasetError;
use crate::metadata::{DatasetInfo, read_dataset_info, read_problem_counts};
use crate::rng::{SeedPurpose, SeedRegistry};
use crate::types::{ProblemName, TokenId};

/// Reason a tokenized line was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineError {
    /// No `:` separating the solution name from its tokens.
    MissingDelimiter,
    /// A token is not a non-negative integer.
    InvalidToken(String),
    /// A token id is not below the vocabulary size.
    TokenOutOfRange { token: u64, n_tokens: usize },
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineError::MissingDelimiter => write!(f, "missing '{SOLUTION_DELIMITER}' delimiter"),
            LineError::InvalidToken(raw) => write!(f, "token '{raw}' is not a valid number"),
            LineError::TokenOutOfRange { token, n_tokens } => {
                write!(f, "token {token} exceeds vocabulary size {n_tokens}")
            }
        }
    }
}

/// Parse `<solution_name>:<t1>,<t2>,...` into a solution.
///
/// An empty token list yields a solution with no tokens.
pub fn parse_solution_line(line: &str, n_tokens: usize) -> Result<Solution, LineError> {
    let (name, raw_tokens) = line
        .split_once(SOLUTION_DELIMITER)
        .ok_or(LineError::MissingDelimiter)?;
    let raw_tokens = raw_tokens.trim();
    let mut tokens = Vec::new();
    if !raw_tokens.is_empty() {
        for raw in raw_tokens.split(TOKEN_DELIMITER) {
            let raw = raw.trim();
            let token: u64 = raw
                .parse()
                .map_err(|_| LineError::InvalidToken(raw.to_string()))?;
            if token >= n_tokens as u64 {
                return Err(LineError::TokenOutOfRange { token, n_tokens });
            }
            tokens.push(token as TokenId);
        }
    }
    Ok(Solution {
        name: name.trim().to_string(),
        tokens,
    })
}

/// Length statistics of the solutions retained for one problem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProblemLoadStats {
    /// Retained solutions.
    pub n_solutions: usize,
    /// Tokens summed over retained solutions.
    pub n_tokens: usize,
    /// Length of the shortest solution.
    pub min_len: usize,
    /// Length of the longest solution.
    pub max_len: usize,
    /// Name of the shortest solution.
    pub shortest: String,
    /// Name of the longest solution.
    pub longest: String,
}

impl ProblemLoadStats {
    fn observe(&mut self, solution: &Solution) {
        let len = solution.len();
        if self.n_solutions == 0 || len <= self.min_len {
            self.min_len = len;
            self.shortest = solution.name.clone();
        }
        if self.n_solutions == 0 || len >= self.max_len {
            self.max_len = len;
            self.longest = solution.name.clone();
        }
        self.n_solutions += 1;
        self.n_tokens += len;
    }

    /// Mean retained solution length.
    pub fn mean_len(&self) -> f64 {
        if self.n_solutions == 0 {
            0.0
        } else {
            self.n_tokens as f64 / self.n_solutions as f64
        }
    }
}

/// Loads a tokenized corpus directory into an immutable `Corpus`.
#[derive(Clone, Debug)]
pub struct CorpusLoader {
    config: CorpusConfig,
}

impl CorpusLoader {
    /// Loader for the corpus described by `config`.
    pub fn new(config: CorpusConfig) -> Self {
        Self { config }
    }

    /// Settings the loader was built with.
    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Load, filter and label the corpus.
    pub fn load(&self, seeds: &SeedRegistry) -> Result<Corpus, DatasetError> {
        self.config.validate()?;
        let dir = &self.config.dataset_dir;
        if !dir.is_dir() {
            return Err(DatasetError::MissingPath {
                what: "dataset directory",
                path: dir.clone(),
            });
        }
        let info = read_dataset_info(dir)?;
        info!(
            "[solution_pairs:corpus] loading dataset tokenized with {} token set having {} tokens",
            info.token_set, info.n_tokens
        );

        let mut report = LoadReport::default();
        let mut candidates = self.candidate_problems(dir, &mut report)?;
        seeds.shuffle_after_sort(&mut candidates, SeedPurpose::AllProblems);
        if let Some(max_n_problems) = self.config.max_n_problems {
            if max_n_problems > candidates.len() {
                return Err(DatasetError::InsufficientProblems {
                    requested: max_n_problems,
                    available: candidates.len(),
                });
            }
            candidates.truncate(max_n_problems);
        }

        let mut problems: Vec<(ProblemName, Vec<Solution>)> = Vec::with_capacity(candidates.len());
        for problem in candidates {
            let path = self.problem_path(&problem);
            let solutions = match self.load_problem(&problem, &path, &info, &mut report) {
                Ok(solutions) => solutions,
                Err(err) => {
                    warn!(
                        problem = %problem,
                        path = %path.display(),
                        error = %err,
                        "{}",
                        SKIP_UNREADABLE_MSG
                    );
                    report.unreadable.push(problem);
                    report.bad_data = true;
                    continue;
                }
            };
            if solutions.is_empty() {
                warn!(problem = %problem, "problem has 0 solutions loaded");
                report.underpopulated.push((problem, 0));
                report.bad_data = true;
                continue;
            }
            if solutions.len() < self.config.min_n_solutions {
                debug!(
                    problem = %problem,
                    solutions = solutions.len(),
                    required = self.config.min_n_solutions,
                    "dropping problem with too few retained solutions"
                );
                report.underpopulated.push((problem, solutions.len()));
                continue;
            }
            problems.push((problem, solutions));
        }

        let n_problems = problems.len();
        let n_solutions: usize = problems.iter().map(|(_, solutions)| solutions.len()).sum();
        if n_problems < 2 || n_solutions < 2 * n_problems {
            return Err(DatasetError::InsufficientCorpus {
                solutions: n_solutions,
                problems: n_problems,
            });
        }

        let mut solution_rng = seeds.activate(SeedPurpose::ProblemSolutions);
        for (_, solutions) in problems.iter_mut() {
            solutions.sort_by(|a, b| a.name.cmp(&b.name));
            solutions.shuffle(&mut solution_rng);
        }

        let mut corpus = Corpus::from_problems(info.token_set, info.n_tokens, problems);
        if report.bad_data {
            warn!("[solution_pairs:corpus] there are errors in data samples");
        }
        if !report.too_short.is_empty() {
            info!(
                "[solution_pairs:corpus] {} problems have too short solutions",
                report.too_short.len()
            );
        }
        if !report.too_long.is_empty() {
            info!(
                "[solution_pairs:corpus] {} problems have too long solutions",
                report.too_long.len()
            );
        }
        corpus.report = report;
        log_problem_table(&corpus);
        info!(
            "[solution_pairs:corpus] loaded {} code solutions for {} problems; longest code has {} tokens",
            corpus.n_solutions(),
            corpus.n_problems(),
            corpus.code_max_length
        );
        Ok(corpus)
    }

    fn problem_path(&self, problem: &str) -> PathBuf {
        self.config
            .dataset_dir
            .join(format!("{problem}.{TOKENIZED_EXTENSION}"))
    }

    fn candidate_problems(
        &self,
        dir: &Path,
        report: &mut LoadReport,
    ) -> Result<Vec<ProblemName>, DatasetError> {
        let counts = read_problem_counts(dir)?;
        if let Some(problem_list) = &self.config.problem_list {
            let mut selected = Vec::with_capacity(problem_list.len());
            for problem in problem_list {
                let known = match &counts {
                    Some(counts) => counts.contains_key(problem),
                    None => self.problem_path(problem).is_file(),
                };
                if known {
                    selected.push(problem.clone());
                } else {
                    warn!(
                        problem = %problem,
                        dir = %dir.display(),
                        "requested problem is not in the dataset"
                    );
                    report.bad_data = true;
                }
            }
            return Ok(selected);
        }
        match counts {
            Some(counts) => Ok(counts
                .into_iter()
                .filter(|(_, count)| *count >= self.config.min_n_solutions)
                .map(|(problem, _)| problem)
                .collect()),
            None => {
                debug!(
                    dir = %dir.display(),
                    "problem index missing; discovering tokenized problem files"
                );
                Ok(discover_tokenized_problems(dir))
            }
        }
    }

    fn load_problem(
        &self,
        problem: &str,
        path: &Path,
        info: &DatasetInfo,
        report: &mut LoadReport,
    ) -> Result<Vec<Solution>, DatasetError> {
        let content = fs::read_to_string(path)?;
        let long_code_th = self.config.long_code_th.unwrap_or(usize::MAX);
        let mut solutions = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let solution = match parse_solution_line(line, info.n_tokens) {
                Ok(solution) => solution,
                Err(err) => {
                    warn!(
                        problem = %problem,
                        line = line_no + 1,
                        error = %err,
                        "{}",
                        SKIP_BAD_LINE_MSG
                    );
                    report.rejected_lines += 1;
                    report.bad_data = true;
                    continue;
                }
            };
            let n_tokens = solution.len();
            if n_tokens < self.config.short_code_th {
                report.register_short(
                    problem,
                    OmittedSolution {
                        solution: solution.name,
                        n_tokens,
                    },
                );
            } else if n_tokens > long_code_th {
                report.register_long(
                    problem,
                    OmittedSolution {
                        solution: solution.name,
                        n_tokens,
                    },
                );
            } else {
                solutions.push(solution);
            }
        }
        Ok(solutions)
    }
}

/// Problem names of `*.tkn` files directly inside `dir`.
pub fn discover_tokenized_problems(dir: &Path) -> Vec<ProblemName> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == TOKENIZED_EXTENSION)
        })
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .collect()
}

/// Length statistics for every problem of a corpus, in label order.
pub fn problem_load_stats(corpus: &Corpus) -> Vec<ProblemLoadStats> {
    corpus
        .problems
        .iter()
        .map(|problem: &Problem| {
            let mut stats = ProblemLoadStats::default();
            for solution in &problem.solutions {
                stats.observe(solution);
            }
            stats
        })
        .collect()
}

fn log_problem_table(corpus: &Corpus) {
    for (problem, stats) in corpus.problems.iter().zip(problem_load_stats(corpus)) {
        info!(
            problem = %problem.name,
            label = problem.label,
            solutions = stats.n_solutions,
            mean_len = %format!("{:.1}", stats.mean_len()),
            min_len = stats.min_len,
            max_len = stats.max_len,
            shortest = %stats.shortest,
            longest = %stats.longest,
            "[solution_pairs:corpus] problem loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::corpus::{INFO_FILE, PROBLEMS_FILE};
    use tempfile::tempdir;

    fn write_corpus(dir: &Path, problems: &[(&str, &[&str])]) {
        fs::write(
            dir.join(INFO_FILE),
            r#"{"token_set": "java", "n_tokens": 10}"#,
        )
        .unwrap();
        let index: serde_json::Map<String, serde_json::Value> = problems
            .iter()
            .map(|(name, lines)| (name.to_string(), serde_json::json!(lines.len())))
            .collect();
        fs::write(
            dir.join(PROBLEMS_FILE),
            serde_json::to_string(&index).unwrap(),
        )
        .unwrap();
        for (name, lines) in problems {
            fs::write(dir.join(format!("{name}.tkn")), lines.join("\n")).unwrap();
        }
    }

    #[test]
    fn parse_solution_line_accepts_valid_and_rejects_bad_tokens() {
        let solution = parse_solution_line("s1:1,2, 3\n", 10).unwrap();
        assert_eq!(solution.name, "s1");
        assert_eq!(solution.tokens, vec![1, 2, 3]);

        assert_eq!(parse_solution_line("s2:", 10).unwrap().tokens, Vec::<TokenId>::new());
        assert_eq!(
            parse_solution_line("no delimiter", 10),
            Err(LineError::MissingDelimiter)
        );
        assert_eq!(
            parse_solution_line("s3:1,x,2", 10),
            Err(LineError::InvalidToken("x".to_string()))
        );
        assert_eq!(
            parse_solution_line("s4:1,10", 10),
            Err(LineError::TokenOutOfRange {
                token: 10,
                n_tokens: 10
            })
        );
    }

    #[test]
    fn loader_filters_lengths_and_records_bad_data() {
        let dir = tempdir().unwrap();
        write_corpus(
            dir.path(),
            &[
                ("p1", &["a:1,2,3,4", "b:1,2", "c:1,2,3,4,5,6,7", "d:1,2,3,4,5"]),
                ("p2", &["e:1,2,3,4", "f:9,9,9,9", "g:1,2,x,4"]),
            ],
        );
        let config = CorpusConfig::new(dir.path()).with_long_code_th(Some(6));
        let corpus = CorpusLoader::new(config)
            .load(&SeedRegistry::default())
            .unwrap();

        assert_eq!(corpus.n_problems(), 2);
        assert_eq!(corpus.n_solutions(), 4);
        assert_eq!(corpus.code_max_length, 5);
        assert!(corpus.report.bad_data);
        assert_eq!(corpus.report.rejected_lines, 1);
        assert_eq!(
            corpus.report.too_short["p1"],
            vec![OmittedSolution {
                solution: "b".into(),
                n_tokens: 2
            }]
        );
        assert_eq!(corpus.report.too_long["p1"][0].solution, "c");
        for (label, problem) in corpus.problems.iter().enumerate() {
            assert_eq!(problem.label, label);
        }
    }

    #[test]
    fn loading_is_reproducible_for_a_fixed_offset() {
        let dir = tempdir().unwrap();
        let lines: Vec<String> = (0..8).map(|i| format!("s{i}:1,2,3,4")).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let problems: Vec<(String, &[&str])> = (0..6)
            .map(|p| (format!("p{p}"), lines.as_slice()))
            .collect();
        let problems: Vec<(&str, &[&str])> =
            problems.iter().map(|(n, l)| (n.as_str(), *l)).collect();
        write_corpus(dir.path(), &problems);

        let loader = CorpusLoader::new(CorpusConfig::new(dir.path()));
        let first = loader.load(&SeedRegistry::with_offset(101)).unwrap();
        let second = loader.load(&SeedRegistry::with_offset(101)).unwrap();
        let names = |corpus: &Corpus| -> Vec<(String, Vec<String>)> {
            corpus
                .problems
                .iter()
                .map(|p| {
                    (
                        p.name.clone(),
                        p.solutions.iter().map(|s| s.name.clone()).collect(),
                    )
                })
                .collect()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn problem_list_skips_unknown_names_and_missing_files() {
        let dir = tempdir().unwrap();
        write_corpus(
            dir.path(),
            &[
                ("p1", &["a:1,2,3,4", "b:1,2,3,4"]),
                ("p2", &["c:1,2,3,4", "d:1,2,3,4"]),
                ("p3", &["e:1,2,3,4", "f:1,2,3,4"]),
            ],
        );
        fs::remove_file(dir.path().join("p3.tkn")).unwrap();
        let config = CorpusConfig::new(dir.path()).with_problem_list(vec![
            "p1".into(),
            "p2".into(),
            "p3".into(),
            "p9".into(),
        ]);
        let corpus = CorpusLoader::new(config)
            .load(&SeedRegistry::default())
            .unwrap();
        assert_eq!(corpus.n_problems(), 2);
        assert_eq!(corpus.report.unreadable, vec!["p3".to_string()]);
        assert!(corpus.report.bad_data);
    }

    #[test]
    fn missing_problem_index_falls_back_to_directory_discovery() {
        let dir = tempdir().unwrap();
        write_corpus(
            dir.path(),
            &[
                ("p1", &["a:1,2,3,4", "b:1,2,3,4"]),
                ("p2", &["c:1,2,3,4", "d:1,2,3,4"]),
            ],
        );
        fs::remove_file(dir.path().join(PROBLEMS_FILE)).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let mut discovered = discover_tokenized_problems(dir.path());
        discovered.sort();
        assert_eq!(discovered, vec!["p1".to_string(), "p2".to_string()]);

        let corpus = CorpusLoader::new(CorpusConfig::new(dir.path()))
            .load(&SeedRegistry::default())
            .unwrap();
        assert_eq!(corpus.n_problems(), 2);
    }

    #[test]
    fn min_n_solutions_excludes_problems_after_filtering() {
        let dir = tempdir().unwrap();
        write_corpus(
            dir.path(),
            &[
                ("p1", &["a:1,2,3,4", "b:1,2,3,4", "c:1,2,3,4"]),
                ("p2", &["d:1,2,3,4", "e:1,2,3,4", "f:1,2,3,4"]),
                ("p3", &["g:1,2,3,4", "h:1", "i:1"]),
            ],
        );
        let config = CorpusConfig::new(dir.path()).with_min_n_solutions(2);
        let corpus = CorpusLoader::new(config)
            .load(&SeedRegistry::default())
            .unwrap();
        assert_eq!(corpus.n_problems(), 2);
        assert!(corpus.label_of("p3").is_none());
        assert_eq!(corpus.report.underpopulated, vec![("p3".to_string(), 1)]);
    }

    #[test]
    fn too_small_corpus_is_fatal() {
        let dir = tempdir().unwrap();
        write_corpus(
            dir.path(),
            &[("p1", &["a:1,2,3,4", "b:1,2,3,4"]), ("p2", &["c:1,2,3,4"])],
        );
        let err = CorpusLoader::new(CorpusConfig::new(dir.path()))
            .load(&SeedRegistry::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InsufficientCorpus {
                solutions: 3,
                problems: 2
            }
        ));
    }

    #[test]
    fn problem_stats_track_shortest_and_longest() {
        let corpus = Corpus::from_problems(
            "java",
            10,
            vec![(
                "p1".into(),
                vec![
                    Solution {
                        name: "a".into(),
                        tokens: vec![1; 4],
                    },
                    Solution {
                        name: "b".into(),
                        tokens: vec![1; 8],
                    },
                ],
            )],
        );
        let stats = problem_load_stats(&corpus);
        assert_eq!(stats[0].shortest, "a");
        assert_eq!(stats[0].longest, "b");
        assert!((stats[0].mean_len() - 6.0).abs() < 1e-9);
    }
}
