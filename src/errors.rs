use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::splits::SplitLabel;
use crate::types::ProblemName;

/// Error type for corpus loading, partitioning, sampling, and report failures.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A required directory or file does not exist.
    #[error("{what} {} is not found", path.display())]
    MissingPath {
        /// Kind of path, e.g. "dataset directory".
        what: &'static str,
        /// Missing path.
        path: PathBuf,
    },
    /// A metadata file could not be read or parsed.
    #[error("failed to read metadata {}: {reason}", path.display())]
    Metadata {
        /// Metadata file.
        path: PathBuf,
        /// Parse or read failure.
        reason: String,
    },
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Invalid parameter values.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Fewer problems qualify than were requested.
    #[error("cannot select required {requested} problems because only {available} qualify")]
    InsufficientProblems {
        /// Requested problem count.
        requested: usize,
        /// Qualifying problem count.
        available: usize,
    },
    /// The loaded corpus is too small to sample pairs from.
    #[error("loaded only {solutions} solutions of {problems} problems")]
    InsufficientCorpus {
        /// Retained solutions.
        solutions: usize,
        /// Retained problems.
        problems: usize,
    },
    /// A problem has too few solutions for a per-problem split.
    #[error(
        "problem {problem} has only {solutions} solutions, at least {required} are required for the split"
    )]
    InsufficientSolutions {
        /// Offending problem.
        problem: ProblemName,
        /// Its solution count.
        solutions: usize,
        /// Minimum for the split.
        required: usize,
    },
    /// A problem-level split would hold too few problems.
    #[error("too few problems ({count}) for the {split} split")]
    TooFewSplitProblems {
        /// Affected split.
        split: SplitLabel,
        /// Problems it would hold.
        count: usize,
    },
    /// Pair generation cannot satisfy the request.
    #[error("sampling failed: {0}")]
    Sampling(String),
    /// A report could not be written.
    #[error("report failure: {0}")]
    Report(String),
}

impl From<csv::Error> for DatasetError {
    fn from(err: csv::Error) -> Self {
        DatasetError::Report(err.to_string())
    }
}
