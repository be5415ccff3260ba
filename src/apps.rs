use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::assembly::{PairFeatures, SampleEncoding};
use crate::config::{CorpusConfig, DatasetConfig};
use crate::constants::splits::DEFAULT_VALIDATION_FRACTION;
use crate::corpus::{CorpusLoader, problem_load_stats};
use crate::data::LabelMode;
use crate::heuristics::{corpus_pair_capacity, format_u128_with_commas};
use crate::pipeline::build_similarity_datasets;
use crate::reports::ReportWriter;
use crate::rng::SeedRegistry;
use crate::splits::{PartitionStrategy, TestAmount};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Validation and test use problems unseen in training.
    Disjoint,
    /// Validation splits the solutions of the training problems.
    SameProblems,
    /// Every problem contributes solutions to every split.
    Balanced,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EncodingArg {
    Bag,
    Sequence,
    OneHot,
}

#[derive(Debug, Parser)]
#[command(
    name = "build_pairs",
    disable_help_subcommand = true,
    about = "Build similar/dissimilar solution pair datasets",
    long_about = "Load a tokenized solution corpus, partition it, sample reproducible similar and dissimilar pairs for every split, and write statistics reports.",
    after_help = "Options given on the command line override values read from --config."
)]
struct BuildPairsCli {
    #[arg(long, value_name = "PATH", help = "JSON run description to start from")]
    config: Option<PathBuf>,
    #[arg(
        long = "dataset-dir",
        value_name = "DIR",
        help = "Directory with info.json and tokenized *.tkn problem files"
    )]
    dataset_dir: Option<PathBuf>,
    #[arg(long, value_enum, help = "Partitioning strategy")]
    strategy: Option<StrategyArg>,
    #[arg(
        long,
        value_name = "AMOUNT",
        help = "Test problems: a fraction below 1 or an absolute count (balanced: fraction of solutions)"
    )]
    test: Option<f64>,
    #[arg(
        long = "validation-fraction",
        value_parser = parse_fraction,
        help = "Fraction of problems or solutions used for validation"
    )]
    validation_fraction: Option<f64>,
    #[arg(long = "train-size", help = "Number of training pairs")]
    train_size: Option<usize>,
    #[arg(long = "validation-size", help = "Number of validation pairs")]
    validation_size: Option<usize>,
    #[arg(long = "test-size", help = "Number of test pairs")]
    test_size: Option<usize>,
    #[arg(
        long = "similar-fraction",
        value_parser = parse_fraction,
        help = "Target fraction of similar pairs"
    )]
    similar_fraction: Option<f64>,
    #[arg(long = "short-code-th", help = "Minimum number of tokens of a solution")]
    short_code_th: Option<usize>,
    #[arg(
        long = "long-code-th",
        value_parser = parse_positive_usize,
        help = "Maximum number of tokens of a solution"
    )]
    long_code_th: Option<usize>,
    #[arg(
        long = "min-n-solutions",
        help = "Minimum number of retained solutions per problem"
    )]
    min_n_solutions: Option<usize>,
    #[arg(
        long = "max-n-problems",
        value_parser = parse_positive_usize,
        help = "Number of problems to use"
    )]
    max_n_problems: Option<usize>,
    #[arg(
        long = "problem-list",
        value_name = "PATH",
        help = "File listing the problems to use, one per line"
    )]
    problem_list: Option<PathBuf>,
    #[arg(long, value_enum, help = "Sample representation handed to the model")]
    encoding: Option<EncodingArg>,
    #[arg(
        long = "max-len",
        value_parser = parse_positive_usize,
        help = "Sequence length for sequence and one-hot encodings"
    )]
    max_len: Option<usize>,
    #[arg(long, help = "Label dissimilar pairs -1 instead of 0")]
    bipolar: bool,
    #[arg(long = "seed-offset", help = "Offset added to every registered seed")]
    seed_offset: Option<u64>,
    #[arg(
        long = "selection-size",
        value_parser = parse_positive_usize,
        help = "Slots in the dissimilar-pair selection table"
    )]
    selection_size: Option<usize>,
    #[arg(long = "report-dir", value_name = "DIR", help = "Directory for reports")]
    report_dir: Option<PathBuf>,
    #[arg(long = "no-reports", conflicts_with = "report_dir", help = "Do not write report files")]
    no_reports: bool,
    #[arg(long = "dump-samples", help = "Write generated pairs as CSV")]
    dump_samples: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "corpus_summary",
    disable_help_subcommand = true,
    about = "Summarise a tokenized solution corpus",
    long_about = "Load and filter a tokenized solution corpus and report per-problem solution statistics and distinct pair capacity."
)]
struct CorpusSummaryCli {
    #[arg(long = "dataset-dir", value_name = "DIR")]
    dataset_dir: PathBuf,
    #[arg(long = "short-code-th", help = "Minimum number of tokens of a solution")]
    short_code_th: Option<usize>,
    #[arg(
        long = "long-code-th",
        value_parser = parse_positive_usize,
        help = "Maximum number of tokens of a solution"
    )]
    long_code_th: Option<usize>,
    #[arg(
        long = "min-n-solutions",
        help = "Minimum number of retained solutions per problem"
    )]
    min_n_solutions: Option<usize>,
    #[arg(
        long = "max-n-problems",
        value_parser = parse_positive_usize,
        help = "Number of problems to use"
    )]
    max_n_problems: Option<usize>,
    #[arg(long = "seed-offset", default_value_t = crate::constants::seeds::DEFAULT_SEED_OFFSET)]
    seed_offset: u64,
    #[arg(
        long,
        default_value_t = 10,
        value_parser = parse_positive_usize,
        help = "Number of problems listed"
    )]
    top: usize,
    #[arg(
        long = "report-dir",
        value_name = "DIR",
        help = "Write too-short and too-long listings here"
    )]
    report_dir: Option<PathBuf>,
}

/// Build pair datasets from command-line arguments (program name excluded).
pub fn run_build_pairs<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<BuildPairsCli, _>(
        std::iter::once("build_pairs".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };
    let config = build_pairs_config(cli)?;
    let datasets = build_similarity_datasets(&config)?;

    println!(
        "Corpus: {} problems, {} solutions, token set {} ({} tokens), longest code {} tokens",
        datasets.corpus.n_problems(),
        datasets.corpus.n_solutions(),
        datasets.corpus.token_set,
        datasets.corpus.n_tokens,
        datasets.corpus.code_max_length
    );
    for dataset in &datasets.splits {
        let shape = match &dataset.assembled.features {
            PairFeatures::Bag(features) => format!("{:?}", features.dim()),
            PairFeatures::Sequences { left, right } => {
                format!("{:?} + {:?}", left.dim(), right.dim())
            }
            PairFeatures::OneHot(features) => format!("{:?}", features.dim()),
        };
        println!(
            "{:>10}: {:6} pairs ({} similar, {} dissimilar, {:.3} similar), features {}",
            dataset.split.to_string(),
            dataset.generated.len(),
            dataset.generated.n_similar,
            dataset.generated.n_dissimilar,
            dataset.generated.similar_fraction(),
            shape
        );
    }
    if let Some(dir) = &config.report_dir {
        println!("Reports written to {}", dir.display());
    }
    Ok(())
}

fn build_pairs_config(cli: BuildPairsCli) -> Result<DatasetConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => DatasetConfig::from_json_file(path)?,
        None => DatasetConfig::default(),
    };
    match cli.dataset_dir {
        Some(dir) => config.corpus.dataset_dir = dir,
        None if cli.config.is_none() => {
            return Err("either --dataset-dir or --config is required".into());
        }
        None => {}
    }
    config.corpus = apply_corpus_overrides(
        config.corpus,
        cli.short_code_th,
        cli.long_code_th,
        cli.min_n_solutions,
        cli.max_n_problems,
    );
    if let Some(path) = &cli.problem_list {
        config.corpus = config.corpus.with_problem_list(read_problem_list(path)?);
    }

    if cli.strategy.is_some() || cli.test.is_some() || cli.validation_fraction.is_some() {
        config.partition = partition_override(
            config.partition,
            cli.strategy,
            cli.test,
            cli.validation_fraction,
        )?;
    }

    let mut pairs = config.pairs;
    pairs.train_size = cli.train_size.unwrap_or(pairs.train_size);
    pairs.validation_size = cli.validation_size.unwrap_or(pairs.validation_size);
    pairs.test_size = cli.test_size.unwrap_or(pairs.test_size);
    pairs.similar_fraction = cli.similar_fraction.unwrap_or(pairs.similar_fraction);
    if cli.bipolar {
        pairs.label_mode = LabelMode::Bipolar;
    }
    config.pairs = pairs;

    if let Some(encoding) = cli.encoding {
        config.encoding = match encoding {
            EncodingArg::Bag => SampleEncoding::BagOfTokens,
            EncodingArg::Sequence => SampleEncoding::PaddedSequence {
                max_len: cli.max_len,
            },
            EncodingArg::OneHot => SampleEncoding::OneHot {
                max_len: cli.max_len,
            },
        };
    }
    config.seed_offset = cli.seed_offset.unwrap_or(config.seed_offset);
    config.selection_size = cli.selection_size.unwrap_or(config.selection_size);
    if cli.no_reports {
        config.report_dir = None;
    } else if let Some(dir) = cli.report_dir {
        config.report_dir = Some(dir);
    }
    config.dump_samples |= cli.dump_samples;
    config.validate()?;
    Ok(config)
}

fn apply_corpus_overrides(
    corpus: CorpusConfig,
    short_code_th: Option<usize>,
    long_code_th: Option<usize>,
    min_n_solutions: Option<usize>,
    max_n_problems: Option<usize>,
) -> CorpusConfig {
    let short = short_code_th.unwrap_or(corpus.short_code_th);
    let min_n = min_n_solutions.unwrap_or(corpus.min_n_solutions);
    let long = long_code_th.or(corpus.long_code_th);
    let max_n = max_n_problems.or(corpus.max_n_problems);
    corpus
        .with_short_code_th(short)
        .with_long_code_th(long)
        .with_min_n_solutions(min_n)
        .with_max_n_problems(max_n)
}

fn partition_override(
    current: PartitionStrategy,
    strategy: Option<StrategyArg>,
    test: Option<f64>,
    validation_fraction: Option<f64>,
) -> Result<PartitionStrategy, Box<dyn Error>> {
    let (current_kind, current_validation) = match current {
        PartitionStrategy::DisjointProblems {
            validation_fraction,
            ..
        } => (StrategyArg::Disjoint, validation_fraction),
        PartitionStrategy::SameProblems {
            validation_fraction,
            ..
        } => (StrategyArg::SameProblems, validation_fraction),
        PartitionStrategy::Balanced {
            validation_fraction,
            ..
        } => (StrategyArg::Balanced, validation_fraction),
    };
    let kind = strategy.unwrap_or(current_kind);
    let validation_fraction = validation_fraction.unwrap_or(if strategy.is_some() {
        DEFAULT_VALIDATION_FRACTION
    } else {
        current_validation
    });
    let current_test = match current {
        PartitionStrategy::DisjointProblems { test, .. }
        | PartitionStrategy::SameProblems { test, .. } => test,
        PartitionStrategy::Balanced { test_fraction, .. } => TestAmount::from_value(test_fraction)?,
    };
    let test_amount = match test {
        Some(value) => TestAmount::from_value(value)?,
        None => current_test,
    };
    Ok(match kind {
        StrategyArg::Disjoint => PartitionStrategy::DisjointProblems {
            test: test_amount,
            validation_fraction,
        },
        StrategyArg::SameProblems => PartitionStrategy::SameProblems {
            test: test_amount,
            validation_fraction,
        },
        StrategyArg::Balanced => PartitionStrategy::Balanced {
            test_fraction: match test_amount {
                TestAmount::None => 0.0,
                TestAmount::Fraction(fraction) => fraction,
                TestAmount::Count(count) => {
                    return Err(format!(
                        "balanced splits take a test fraction below 1, got {count}"
                    )
                    .into());
                }
            },
            validation_fraction,
        },
    })
}

fn read_problem_list(path: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("cannot read problem list {}: {err}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Print a summary of a tokenized corpus from command-line arguments.
pub fn run_corpus_summary<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<CorpusSummaryCli, _>(
        std::iter::once("corpus_summary".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };
    let corpus_config = apply_corpus_overrides(
        CorpusConfig::new(cli.dataset_dir),
        cli.short_code_th,
        cli.long_code_th,
        cli.min_n_solutions,
        cli.max_n_problems,
    );
    let corpus = CorpusLoader::new(corpus_config).load(&SeedRegistry::with_offset(cli.seed_offset))?;

    println!(
        "Token set {} with {} tokens: {} problems, {} solutions, longest code {} tokens",
        corpus.token_set,
        corpus.n_tokens,
        corpus.n_problems(),
        corpus.n_solutions(),
        corpus.code_max_length
    );
    println!(
        "Omitted: {} short or long solutions, {} unreadable problems, {} underpopulated problems, {} rejected lines",
        corpus.report.omitted_solutions(),
        corpus.report.unreadable.len(),
        corpus.report.underpopulated.len(),
        corpus.report.rejected_lines
    );
    let capacity = corpus_pair_capacity(&corpus);
    println!(
        "Distinct ordered pairs: {} similar, {} dissimilar",
        format_u128_with_commas(capacity.similar),
        format_u128_with_commas(capacity.dissimilar)
    );

    let mut stats: Vec<_> = corpus
        .problems
        .iter()
        .map(|problem| problem.name.as_str())
        .zip(problem_load_stats(&corpus))
        .collect();
    stats.sort_by(|a, b| b.1.n_solutions.cmp(&a.1.n_solutions));
    println!();
    println!("Problem          Solutions  Mean len  Min len  Max len");
    for (name, entry) in stats.iter().take(cli.top) {
        println!(
            "{:16} {:9} {:9.1} {:8} {:8}",
            name,
            entry.n_solutions,
            entry.mean_len(),
            entry.min_len,
            entry.max_len
        );
    }
    if stats.len() > cli.top {
        println!("... {} more problems", stats.len() - cli.top);
    }

    if let Some(dir) = cli.report_dir {
        let writer = ReportWriter::new(dir);
        writer.write_wrong_length(&corpus.report)?;
        println!("Wrong-length listings written to {}", writer.dir().display());
    }
    Ok(())
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_fraction(raw: &str) -> Result<f64, String> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid fraction '{}': must be a float", raw.trim()))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("fraction must be in [0, 1], got {parsed}"));
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
