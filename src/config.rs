use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::assembly::SampleEncoding;
use crate::constants::corpus::{DEFAULT_MIN_N_SOLUTIONS, DEFAULT_SHORT_CODE_TH};
use crate::constants::reports::DEFAULT_REPORT_DIR;
use crate::constants::sampler::{
    DEFAULT_SIMILAR_FRACTION, DEFAULT_TEST_SIZE, DEFAULT_TRAIN_SIZE, DEFAULT_VALIDATION_SIZE,
    SEL_SIZE,
};
use crate::constants::seeds::DEFAULT_SEED_OFFSET;
use crate::data::LabelMode;
use crate::errors::DatasetError;
use crate::splits::{PartitionStrategy, SplitLabel};
use crate::types::ProblemName;

/// Controls which problems and solutions the corpus loader keeps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory holding `info.json`, `problems.json` and `*.tkn` files.
    pub dataset_dir: PathBuf,
    /// Solutions with fewer tokens are excluded.
    pub short_code_th: usize,
    /// Solutions with more tokens are excluded; `None` keeps everything.
    pub long_code_th: Option<usize>,
    /// Problems with fewer retained solutions are excluded.
    pub min_n_solutions: usize,
    /// Upper bound on the number of problems; fewer qualifying problems is fatal.
    pub max_n_problems: Option<usize>,
    /// Explicit problem selection instead of the whole index.
    pub problem_list: Option<Vec<ProblemName>>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("."),
            short_code_th: DEFAULT_SHORT_CODE_TH,
            long_code_th: None,
            min_n_solutions: DEFAULT_MIN_N_SOLUTIONS,
            max_n_problems: None,
            problem_list: None,
        }
    }
}

impl CorpusConfig {
    /// Config for the corpus stored in `dataset_dir`.
    pub fn new<P: Into<PathBuf>>(dataset_dir: P) -> Self {
        Self {
            dataset_dir: dataset_dir.into(),
            ..Self::default()
        }
    }

    /// Drop solutions shorter than `short_code_th` tokens.
    pub fn with_short_code_th(mut self, short_code_th: usize) -> Self {
        self.short_code_th = short_code_th;
        self
    }

    /// Drop solutions longer than `long_code_th` tokens; `None` keeps all.
    pub fn with_long_code_th(mut self, long_code_th: Option<usize>) -> Self {
        self.long_code_th = long_code_th;
        self
    }

    /// Require at least `min_n_solutions` retained solutions per problem.
    pub fn with_min_n_solutions(mut self, min_n_solutions: usize) -> Self {
        self.min_n_solutions = min_n_solutions;
        self
    }

    /// Cap the number of problems selected from the corpus.
    pub fn with_max_n_problems(mut self, max_n_problems: Option<usize>) -> Self {
        self.max_n_problems = max_n_problems;
        self
    }

    /// Restrict candidates to the named problems.
    pub fn with_problem_list(mut self, problem_list: Vec<ProblemName>) -> Self {
        self.problem_list = Some(problem_list);
        self
    }

    /// Reject inconsistent thresholds.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if let Some(long) = self.long_code_th
            && long < self.short_code_th
        {
            return Err(DatasetError::Configuration(format!(
                "long code threshold {long} is below short code threshold {}",
                self.short_code_th
            )));
        }
        if self.max_n_problems == Some(0) {
            return Err(DatasetError::Configuration(
                "max_n_problems must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Size and balance of the generated pair datasets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    /// Pairs generated for training.
    pub train_size: usize,
    /// Pairs generated for validation.
    pub validation_size: usize,
    /// Pairs generated for testing.
    pub test_size: usize,
    /// Target fraction of similar pairs in every dataset.
    pub similar_fraction: f64,
    /// Numeric labels used for similar and dissimilar pairs.
    pub label_mode: LabelMode,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            train_size: DEFAULT_TRAIN_SIZE,
            validation_size: DEFAULT_VALIDATION_SIZE,
            test_size: DEFAULT_TEST_SIZE,
            similar_fraction: DEFAULT_SIMILAR_FRACTION,
            label_mode: LabelMode::Binary,
        }
    }
}

impl PairConfig {
    /// Set the train, validation and test dataset sizes.
    pub fn with_sizes(mut self, train: usize, validation: usize, test: usize) -> Self {
        self.train_size = train;
        self.validation_size = validation;
        self.test_size = test;
        self
    }

    /// Set the target share of similar pairs.
    pub fn with_similar_fraction(mut self, similar_fraction: f64) -> Self {
        self.similar_fraction = similar_fraction;
        self
    }

    /// Set the label encoding.
    pub fn with_label_mode(mut self, label_mode: LabelMode) -> Self {
        self.label_mode = label_mode;
        self
    }

    /// Requested number of pairs for `split`.
    pub fn size_for(&self, split: SplitLabel) -> usize {
        match split {
            SplitLabel::Train => self.train_size,
            SplitLabel::Validation => self.validation_size,
            SplitLabel::Test => self.test_size,
        }
    }

    /// Check the similar fraction lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if !(0.0..=1.0).contains(&self.similar_fraction) {
            return Err(DatasetError::Configuration(format!(
                "similar fraction must be in [0, 1], got {}",
                self.similar_fraction
            )));
        }
        Ok(())
    }
}

/// Everything needed to build one set of pair datasets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Corpus location and filters.
    pub corpus: CorpusConfig,
    /// Split strategy.
    pub partition: PartitionStrategy,
    /// Dataset sizes and labels.
    pub pairs: PairConfig,
    /// Feature layout of the assembled arrays.
    pub encoding: SampleEncoding,
    /// Added to every registered seed once per run.
    pub seed_offset: u64,
    /// Number of slots in the dissimilar-pair selection table.
    pub selection_size: usize,
    /// Where reports are written; `None` disables report files.
    pub report_dir: Option<PathBuf>,
    /// Dump generated pairs as CSV next to the reports.
    pub dump_samples: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig::default(),
            partition: PartitionStrategy::default(),
            pairs: PairConfig::default(),
            encoding: SampleEncoding::default(),
            seed_offset: DEFAULT_SEED_OFFSET,
            selection_size: SEL_SIZE,
            report_dir: Some(PathBuf::from(DEFAULT_REPORT_DIR)),
            dump_samples: false,
        }
    }
}

impl DatasetConfig {
    /// Load a run description from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, DatasetError> {
        if !path.is_file() {
            return Err(DatasetError::MissingPath {
                what: "configuration file",
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|err| DatasetError::Metadata {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// Replace the corpus settings.
    pub fn with_corpus(mut self, corpus: CorpusConfig) -> Self {
        self.corpus = corpus;
        self
    }

    /// Replace the partition strategy.
    pub fn with_partition(mut self, partition: PartitionStrategy) -> Self {
        self.partition = partition;
        self
    }

    /// Replace the pair dataset settings.
    pub fn with_pairs(mut self, pairs: PairConfig) -> Self {
        self.pairs = pairs;
        self
    }

    /// Replace the sample encoding.
    pub fn with_encoding(mut self, encoding: SampleEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the seed offset.
    pub fn with_seed_offset(mut self, seed_offset: u64) -> Self {
        self.seed_offset = seed_offset;
        self
    }

    /// Set the selection table size.
    pub fn with_selection_size(mut self, selection_size: usize) -> Self {
        self.selection_size = selection_size;
        self
    }

    /// Set or clear the report directory.
    pub fn with_report_dir(mut self, report_dir: Option<PathBuf>) -> Self {
        self.report_dir = report_dir;
        self
    }

    /// Enable or disable CSV sample dumps.
    pub fn with_dump_samples(mut self, dump_samples: bool) -> Self {
        self.dump_samples = dump_samples;
        self
    }

    /// Check every nested section.
    pub fn validate(&self) -> Result<(), DatasetError> {
        self.corpus.validate()?;
        self.pairs.validate()?;
        if self.selection_size == 0 {
            return Err(DatasetError::Configuration(
                "selection table size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splits::TestAmount;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let config = DatasetConfig::default();
        assert_eq!(config.seed_offset, 101);
        assert_eq!(config.selection_size, 128 * 1024);
        assert_eq!(config.corpus.short_code_th, 4);
        assert_eq!(config.corpus.min_n_solutions, 1);
        assert!(config.corpus.long_code_th.is_none());
        assert!((config.pairs.similar_fraction - 0.5).abs() < 1e-9);
        assert_eq!(config.pairs.size_for(SplitLabel::Validation), 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inconsistent_values_are_rejected() {
        let corpus = CorpusConfig::new("/data")
            .with_short_code_th(10)
            .with_long_code_th(Some(5));
        assert!(matches!(
            corpus.validate(),
            Err(DatasetError::Configuration(msg)) if msg.contains("below")
        ));
        let pairs = PairConfig::default().with_similar_fraction(1.5);
        assert!(pairs.validate().is_err());
        let config = DatasetConfig::default().with_selection_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_file_overrides_only_given_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{
                "corpus": {"dataset_dir": "/corpora/java", "max_n_problems": 50},
                "partition": {"DisjointProblems": {"test": {"Count": 10}, "validation_fraction": 0.25}},
                "pairs": {"train_size": 1000, "label_mode": "Bipolar"},
                "seed_offset": 7
            }"#,
        )
        .unwrap();
        let config = DatasetConfig::from_json_file(&path).unwrap();
        assert_eq!(config.corpus.dataset_dir, PathBuf::from("/corpora/java"));
        assert_eq!(config.corpus.max_n_problems, Some(50));
        assert_eq!(config.corpus.short_code_th, 4);
        assert_eq!(config.pairs.train_size, 1000);
        assert_eq!(config.pairs.test_size, 5_000);
        assert_eq!(config.pairs.label_mode, LabelMode::Bipolar);
        assert_eq!(config.seed_offset, 7);
        assert_eq!(
            config.partition,
            PartitionStrategy::DisjointProblems {
                test: TestAmount::Count(10),
                validation_fraction: 0.25
            }
        );
    }

    #[test]
    fn missing_json_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = DatasetConfig::from_json_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, DatasetError::MissingPath { .. }));
    }
}
