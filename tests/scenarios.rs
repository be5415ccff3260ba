use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tempfile::tempdir;

use solution_pairs::constants::reports::{
    ALL_PROBLEMS_FILE, TEST_PROBLEMS_FILE, TEST_SAMPLES_FILE, TEST_STATISTICS_FILE,
    TRAIN_STATISTICS_FILE, TRAINING_PROBLEMS_FILE, VALIDATION_PROBLEMS_FILE,
};
use solution_pairs::splits::{PartitionGroup, ProblemSlice};
use solution_pairs::{
    Corpus, CorpusConfig, CorpusLoader, DatasetConfig, DatasetError, LabelMode, PairConfig,
    PairSampler, PartitionStrategy, SampleEncoding, SeedPurpose, SeedRegistry, Solution,
    SplitLabel, TestAmount, build_similarity_datasets, partition,
};

fn write_corpus(dir: &Path, counts: &[(&str, usize)]) {
    fs::write(
        dir.join("info.json"),
        r#"{"token_set": "java", "n_tokens": 12}"#,
    )
    .unwrap();
    let index: serde_json::Map<String, serde_json::Value> = counts
        .iter()
        .map(|(name, n)| (name.to_string(), serde_json::json!(n)))
        .collect();
    fs::write(
        dir.join("problems.json"),
        serde_json::Value::Object(index).to_string(),
    )
    .unwrap();
    for (problem, n) in counts {
        let lines: String = (0..*n)
            .map(|solution| format!("{problem}_{solution}:{},1,2,3,4\n", solution % 12))
            .collect();
        fs::write(dir.join(format!("{problem}.tkn")), lines).unwrap();
    }
}

#[test]
fn uneven_problem_sizes_share_similar_pairs_by_ordered_pair_count() {
    let group = PartitionGroup {
        start_problem: 0,
        problems: [5usize, 2, 10]
            .iter()
            .enumerate()
            .map(|(problem, n)| ProblemSlice {
                problem,
                solutions: (0..*n).collect(),
            })
            .collect(),
    };
    let generated = PairSampler::new()
        .generate(
            &group,
            100,
            0.5,
            &SeedRegistry::with_offset(101),
            SeedPurpose::TrainPairs,
        )
        .unwrap();
    let mut similar: HashMap<usize, usize> = HashMap::new();
    for pair in generated.pairs.iter().filter(|pair| pair.is_similar()) {
        *similar.entry(pair.problem1).or_default() += 1;
    }
    assert_eq!(similar.get(&0), Some(&8));
    assert_eq!(similar.get(&1), None);
    assert_eq!(similar.get(&2), Some(&40));
    assert_eq!(generated.n_dissimilar, 52);
}

#[test]
fn requesting_more_problems_than_qualify_fails() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[("p1", 4), ("p2", 4), ("p3", 4), ("p4", 1), ("p5", 1)],
    );
    let config = CorpusConfig::new(dir.path())
        .with_min_n_solutions(2)
        .with_max_n_problems(Some(5));
    let err = CorpusLoader::new(config)
        .load(&SeedRegistry::default())
        .unwrap_err();
    match err {
        DatasetError::InsufficientProblems {
            requested,
            available,
        } => {
            assert_eq!(requested, 5);
            assert_eq!(available, 3);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn three_way_balanced_split_rejects_two_solution_problems() {
    let solutions = |n: usize| {
        (0..n)
            .map(|idx| Solution {
                name: format!("s{idx}"),
                tokens: vec![1, 2, 3, 4],
            })
            .collect::<Vec<_>>()
    };
    let corpus = Corpus::from_problems(
        "java",
        8,
        vec![
            ("roomy".to_string(), solutions(6)),
            ("tight".to_string(), solutions(2)),
        ],
    );
    let err = partition(
        &corpus,
        PartitionStrategy::Balanced {
            test_fraction: 0.2,
            validation_fraction: 0.2,
        },
        &SeedRegistry::default(),
    )
    .unwrap_err();
    match &err {
        DatasetError::InsufficientSolutions {
            problem,
            solutions,
            required,
        } => {
            assert_eq!(problem, "tight");
            assert_eq!(*solutions, 2);
            assert_eq!(*required, 3);
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(err.to_string().contains("tight"));

    let two_way = partition(
        &corpus,
        PartitionStrategy::Balanced {
            test_fraction: 0.0,
            validation_fraction: 0.2,
        },
        &SeedRegistry::default(),
    )
    .unwrap();
    assert!(two_way.test.is_none());
}

#[test]
fn full_run_writes_reports_and_dumps() {
    let dataset = tempdir().unwrap();
    let reports = tempdir().unwrap();
    let problems: Vec<(String, usize)> = (0..12)
        .map(|idx| (format!("p{idx:05}"), 4 + idx % 5))
        .collect();
    let borrowed: Vec<(&str, usize)> = problems
        .iter()
        .map(|(name, n)| (name.as_str(), *n))
        .collect();
    write_corpus(dataset.path(), &borrowed);

    let report_dir = reports.path().join("statistics");
    let config = DatasetConfig::default()
        .with_corpus(CorpusConfig::new(dataset.path()).with_max_n_problems(Some(10)))
        .with_partition(PartitionStrategy::DisjointProblems {
            test: TestAmount::Fraction(0.2),
            validation_fraction: 0.25,
        })
        .with_pairs(
            PairConfig::default()
                .with_sizes(200, 50, 60)
                .with_label_mode(LabelMode::Bipolar),
        )
        .with_encoding(SampleEncoding::OneHot { max_len: Some(8) })
        .with_report_dir(Some(report_dir.clone()))
        .with_dump_samples(true);
    let datasets = build_similarity_datasets(&config).unwrap();

    assert_eq!(datasets.corpus.n_problems(), 10);
    let test = datasets.split(SplitLabel::Test).unwrap();
    assert_eq!(test.generated.len(), 60);
    assert_eq!(test.assembled.features.n_samples(), 60);
    assert!(
        test.assembled
            .labels
            .iter()
            .all(|label| *label == 1 || *label == -1)
    );

    let lines = |file: &str| -> Vec<String> {
        fs::read_to_string(report_dir.join(file))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    };
    assert_eq!(lines(ALL_PROBLEMS_FILE).len(), 10);
    assert_eq!(lines(TEST_PROBLEMS_FILE).len(), 2);
    assert_eq!(lines(VALIDATION_PROBLEMS_FILE).len(), 2);
    assert_eq!(lines(TRAINING_PROBLEMS_FILE).len(), 6);
    let samples = lines(TEST_SAMPLES_FILE);
    assert_eq!(samples[0], "problem1,solution1,problem2,solution2");
    assert_eq!(samples.len(), 61);
    let test_problems = lines(TEST_PROBLEMS_FILE);
    for row in &samples[1..] {
        let fields: Vec<&str> = row.split(',').collect();
        assert!(test_problems.iter().any(|name| name == fields[0]));
        assert!(fields[1].starts_with(fields[0]));
    }
    assert!(report_dir.join(TRAIN_STATISTICS_FILE).is_file());
    assert!(report_dir.join(TEST_STATISTICS_FILE).is_file());
}
