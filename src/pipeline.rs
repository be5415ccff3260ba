use tracing::{debug, info, warn};

use crate::assembly::{AssembledDataset, assemble};
use crate::config::DatasetConfig;
use crate::corpus::CorpusLoader;
use crate::data::Corpus;
use crate::errors::DatasetError;
use crate::heuristics::{
    PairCapacity, format_reuse_factor, format_u128_with_commas, partition_capacity,
};
use crate::metrics::{SimilarityEvaluation, SplitStatistics};
use crate::reports::ReportWriter;
use crate::rng::{SeedPurpose, SeedRegistry};
use crate::sampler::{GeneratedPairs, PairSampler};
use crate::splits::{Partition, SplitLabel, partition};

/// Pairs and arrays produced for one split.
#[derive(Clone, Debug)]
pub struct SplitDataset {
    /// Split the pairs belong to.
    pub split: SplitLabel,
    /// Sampled pairs with their similar/dissimilar counts.
    pub generated: GeneratedPairs,
    /// Encoded features and labels, in pair order.
    pub assembled: AssembledDataset,
}

/// Output of one dataset-construction run.
#[derive(Clone, Debug)]
pub struct SimilarityDatasets {
    /// Loaded corpus; pair indices refer to it.
    pub corpus: Corpus,
    /// Problem and solution groups per split.
    pub partition: Partition,
    /// Produced splits in train, validation, test order.
    pub splits: Vec<SplitDataset>,
    /// Seeds used for the run, already offset.
    pub seeds: SeedRegistry,
}

impl SimilarityDatasets {
    /// Dataset produced for `label`, if that split has a group.
    pub fn split(&self, label: SplitLabel) -> Option<&SplitDataset> {
        self.splits.iter().find(|dataset| dataset.split == label)
    }

    /// Evaluate model scores for the pairs of `label`.
    pub fn evaluate(
        &self,
        label: SplitLabel,
        predictions: &[f32],
        config: &DatasetConfig,
    ) -> Result<SimilarityEvaluation, DatasetError> {
        let dataset = self.split(label).ok_or_else(|| {
            DatasetError::Configuration(format!("no {label} dataset was produced"))
        })?;
        let labels = dataset.assembled.labels.to_vec();
        SimilarityEvaluation::new(
            predictions,
            &labels,
            &dataset.generated.pairs,
            config.pairs.label_mode,
        )
    }
}

/// Load, partition, sample, assemble and report in one run.
pub fn build_similarity_datasets(config: &DatasetConfig) -> Result<SimilarityDatasets, DatasetError> {
    config.validate()?;
    let seeds = SeedRegistry::with_offset(config.seed_offset);
    let corpus = CorpusLoader::new(config.corpus.clone()).load(&seeds)?;
    let partition = partition(&corpus, config.partition, &seeds)?;
    let sampler = PairSampler::new().with_selection_size(config.selection_size);
    let writer = config.report_dir.as_ref().map(ReportWriter::new);

    if let Some(writer) = &writer {
        writer.write_wrong_length(&corpus.report)?;
        writer.write_problem_lists(&corpus, &partition)?;
    }

    for (label, capacity) in partition_capacity(&partition) {
        log_capacity(label, capacity, config.pairs.size_for(label));
    }

    let mut splits = Vec::new();
    let mut statistics = Vec::new();
    for label in SplitLabel::ALL {
        let target_size = config.pairs.size_for(label);
        let Some(group) = partition.group(label) else {
            if target_size > 0 {
                debug!(split = %label, "no group for split; skipping pair generation");
            }
            continue;
        };
        let generated = sampler.generate(
            group,
            target_size,
            config.pairs.similar_fraction,
            &seeds,
            SeedPurpose::pairs_for(label),
        )?;
        info!(
            split = %label,
            problems = group.n_problems(),
            solutions = group.n_solutions(),
            similar = generated.n_similar,
            dissimilar = generated.n_dissimilar,
            "[solution_pairs:pipeline] split sampled"
        );
        let assembled = assemble(
            &corpus,
            &generated.pairs,
            config.encoding,
            config.pairs.label_mode,
        )?;
        if let Some(writer) = &writer {
            if config.dump_samples {
                writer.write_samples(&corpus, label, &generated.pairs)?;
            }
            statistics.push(SplitStatistics::compute(label, &generated.pairs, group));
        }
        splits.push(SplitDataset {
            split: label,
            generated,
            assembled,
        });
    }

    if let Some(writer) = &writer {
        writer.write_statistics(&corpus, &statistics)?;
    }

    Ok(SimilarityDatasets {
        corpus,
        partition,
        splits,
        seeds,
    })
}

fn log_capacity(label: SplitLabel, capacity: PairCapacity, target_size: usize) {
    let requested = target_size as u128;
    if requested > capacity.total() {
        warn!(
            split = %label,
            requested = %format_u128_with_commas(requested),
            distinct = %format_u128_with_commas(capacity.total()),
            reuse = %format_reuse_factor(requested, capacity.total()),
            "[solution_pairs:pipeline] more pairs requested than distinct pairs exist"
        );
    } else {
        debug!(
            split = %label,
            similar = %format_u128_with_commas(capacity.similar),
            dissimilar = %format_u128_with_commas(capacity.dissimilar),
            "distinct pair capacity"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{PairFeatures, SampleEncoding};
    use crate::config::{CorpusConfig, PairConfig};
    use crate::constants::reports::{
        TEST_STATISTICS_FILE, TRAIN_SAMPLES_FILE, TRAIN_STATISTICS_FILE,
    };
    use crate::splits::{PartitionStrategy, TestAmount};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_corpus(dir: &Path, n_problems: usize, n_solutions: usize) {
        fs::write(
            dir.join("info.json"),
            r#"{"token_set": "java", "n_tokens": 10}"#,
        )
        .unwrap();
        for problem in 0..n_problems {
            let lines: String = (0..n_solutions)
                .map(|solution| {
                    format!("s{solution}:{},{},{},{},{}\n", problem % 10, solution % 10, 1, 2, 3)
                })
                .collect();
            fs::write(dir.join(format!("p{problem:02}.tkn")), lines).unwrap();
        }
    }

    fn config(dataset: &Path, reports: Option<&Path>) -> DatasetConfig {
        DatasetConfig::default()
            .with_corpus(CorpusConfig::new(dataset))
            .with_partition(PartitionStrategy::DisjointProblems {
                test: TestAmount::Count(2),
                validation_fraction: 0.25,
            })
            .with_pairs(PairConfig::default().with_sizes(40, 10, 12))
            .with_report_dir(reports.map(Path::to_path_buf))
    }

    #[test]
    fn run_produces_every_split_and_reports() {
        let dataset = tempdir().unwrap();
        let reports = tempdir().unwrap();
        write_corpus(dataset.path(), 10, 4);
        let config = config(dataset.path(), Some(&reports.path().join("out")))
            .with_dump_samples(true);

        let datasets = build_similarity_datasets(&config).unwrap();
        assert_eq!(datasets.corpus.n_problems(), 10);
        assert_eq!(datasets.splits.len(), 3);
        let train = datasets.split(SplitLabel::Train).unwrap();
        assert_eq!(train.generated.len(), 40);
        assert_eq!(train.assembled.labels.len(), 40);
        match &train.assembled.features {
            PairFeatures::Bag(features) => assert_eq!(features.dim(), (40, 20)),
            other => panic!("unexpected features {other:?}"),
        }
        let test = datasets.split(SplitLabel::Test).unwrap();
        for pair in &test.generated.pairs {
            assert!(pair.problem1 >= 8 && pair.problem2 >= 8);
        }

        let out = reports.path().join("out");
        assert!(out.join(TRAIN_SAMPLES_FILE).is_file());
        let test_statistics = fs::read_to_string(out.join(TEST_STATISTICS_FILE)).unwrap();
        assert!(test_statistics.starts_with("Statistics of the test dataset: 12 samples"));

        let train_statistics = fs::read_to_string(out.join(TRAIN_STATISTICS_FILE)).unwrap();
        assert!(train_statistics.starts_with("Statistics of the validation dataset: 10 samples"));
        let training_at = train_statistics
            .find("Statistics of the training dataset: 40 samples")
            .expect("training section follows validation");
        assert!(training_at > 0);
        assert!(!train_statistics.contains("test dataset"));
    }

    #[test]
    fn runs_are_reproducible_without_reports() {
        let dataset = tempdir().unwrap();
        write_corpus(dataset.path(), 10, 3);
        let config = config(dataset.path(), None)
            .with_encoding(SampleEncoding::PaddedSequence { max_len: Some(6) });
        let first = build_similarity_datasets(&config).unwrap();
        let second = build_similarity_datasets(&config).unwrap();
        for label in SplitLabel::ALL {
            assert_eq!(
                first.split(label).unwrap().generated,
                second.split(label).unwrap().generated
            );
        }
    }

    #[test]
    fn evaluation_uses_split_labels() {
        let dataset = tempdir().unwrap();
        write_corpus(dataset.path(), 10, 3);
        let config = config(dataset.path(), None);
        let datasets = build_similarity_datasets(&config).unwrap();
        let validation = datasets.split(SplitLabel::Validation).unwrap();
        let perfect: Vec<f32> = validation
            .assembled
            .labels
            .iter()
            .map(|label| *label as f32)
            .collect();
        let evaluation = datasets
            .evaluate(SplitLabel::Validation, &perfect, &config)
            .unwrap();
        assert!((evaluation.accuracy() - 1.0).abs() < 1e-9);
        assert!(
            datasets
                .evaluate(SplitLabel::Validation, &[], &config)
                .is_err()
        );
    }
}
