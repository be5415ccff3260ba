#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command runners shared by the demo binaries.
pub mod apps;
/// Pair encodings and array assembly.
pub mod assembly;
/// Run configuration types.
pub mod config;
/// Centralized constants used across loading, sampling, and reports.
pub mod constants;
/// Corpus loading and filtering.
pub mod corpus;
/// Corpus, problem, solution, and pair sample types.
pub mod data;
/// Distinct pair capacity helpers.
pub mod heuristics;
/// Dataset metadata files.
pub mod metadata;
/// Sampling statistics and post-hoc evaluation.
pub mod metrics;
/// End-to-end dataset construction.
pub mod pipeline;
/// Report files written next to a run.
pub mod reports;
/// Seed registry and deterministic generators.
pub mod rng;
/// Similar and dissimilar pair generation.
pub mod sampler;
/// Train/validation/test partitioning.
pub mod splits;
/// Shared type aliases.
pub mod types;

mod errors;

pub use assembly::{AssembledDataset, PairFeatures, SampleEncoding, assemble, records};
pub use config::{CorpusConfig, DatasetConfig, PairConfig};
pub use corpus::CorpusLoader;
pub use data::{Corpus, LabelMode, LoadReport, PairLabel, PairSample, Problem, Solution};
pub use errors::DatasetError;
pub use metrics::{SimilarityEvaluation, problem_distribution, solution_usage};
pub use pipeline::{SimilarityDatasets, build_similarity_datasets};
pub use rng::{DeterministicRng, SeedPurpose, SeedRegistry};
pub use sampler::{GeneratedPairs, PairSampler};
pub use splits::{Partition, PartitionGroup, PartitionStrategy, SplitLabel, TestAmount, partition};
pub use types::{ProblemIdx, ProblemName, SolutionIdx, SolutionName, TokenId};
