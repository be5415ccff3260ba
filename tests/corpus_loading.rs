use std::fs;
use std::path::Path;

use tempfile::tempdir;

use solution_pairs::constants::reports::{TOO_LONG_FILE, TOO_SHORT_FILE};
use solution_pairs::reports::ReportWriter;
use solution_pairs::{CorpusConfig, CorpusLoader, DatasetError, SeedRegistry};

fn write_info(dir: &Path, n_tokens: usize) {
    fs::write(
        dir.join("info.json"),
        format!(r#"{{"token_set": "c++", "n_tokens": {n_tokens}}}"#),
    )
    .unwrap();
}

fn write_problem(dir: &Path, name: &str, lines: &[&str]) {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(dir.join(format!("{name}.tkn")), content).unwrap();
}

#[test]
fn malformed_lines_are_skipped_and_flagged() {
    let dir = tempdir().unwrap();
    write_info(dir.path(), 20);
    fs::write(
        dir.path().join("problems.json"),
        r#"{"alpha": 4, "beta": "3"}"#,
    )
    .unwrap();
    write_problem(
        dir.path(),
        "alpha",
        &["a0:1,2,3,4", "no delimiter here", "a1:1,2,x,4", "", "a2:5,6,7,8,9"],
    );
    write_problem(dir.path(), "beta", &["b0:1,1,1,1", "b1:19,20,1,1", "b2:0,0,0,0"]);

    let corpus = CorpusLoader::new(CorpusConfig::new(dir.path()))
        .load(&SeedRegistry::default())
        .unwrap();
    assert_eq!(corpus.n_problems(), 2);
    assert_eq!(corpus.n_solutions(), 4);
    assert_eq!(corpus.report.rejected_lines, 3);
    assert!(corpus.report.bad_data);
    assert_eq!(corpus.token_set, "c++");
    assert_eq!(corpus.code_max_length, 5);
    let alpha = corpus.label_of("alpha").unwrap();
    let mut names: Vec<&str> = corpus.problems[alpha]
        .solutions
        .iter()
        .map(|solution| solution.name.as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a0", "a2"]);
}

#[test]
fn wrong_length_solutions_are_listed_per_problem() {
    let dir = tempdir().unwrap();
    write_info(dir.path(), 10);
    write_problem(
        dir.path(),
        "p1",
        &["s0:1,2", "s1:1,2,3,4", "s2:1,2,3,4,5", "s3:1,2,3,4,5,6,7,8,9"],
    );
    write_problem(dir.path(), "p2", &["t0:1,2,3,4", "t1:4,3,2,1", "t2:1"]);

    let config = CorpusConfig::new(dir.path())
        .with_short_code_th(4)
        .with_long_code_th(Some(6));
    let corpus = CorpusLoader::new(config)
        .load(&SeedRegistry::with_offset(3))
        .unwrap();
    assert_eq!(corpus.n_solutions(), 4);
    assert_eq!(corpus.report.too_short.len(), 2);
    assert_eq!(corpus.report.too_long.len(), 1);
    assert_eq!(corpus.report.too_long["p1"][0].n_tokens, 9);
    assert_eq!(corpus.report.omitted_solutions(), 3);
    assert!(!corpus.report.bad_data);

    let reports = tempdir().unwrap();
    let writer = ReportWriter::new(reports.path().join("stats"));
    writer.write_wrong_length(&corpus.report).unwrap();
    let short = fs::read_to_string(writer.path(TOO_SHORT_FILE)).unwrap();
    assert!(short.contains("s0/2"));
    assert!(short.contains("t2/1"));
    let long = fs::read_to_string(writer.path(TOO_LONG_FILE)).unwrap();
    assert_eq!(long, format!("{:3} {:16}: s3/9\n", 1, "p1"));
}

#[test]
fn index_counts_prefilter_candidates() {
    let dir = tempdir().unwrap();
    write_info(dir.path(), 10);
    fs::write(
        dir.path().join("problems.json"),
        r#"{"big1": 3, "big2": 3, "small": 1}"#,
    )
    .unwrap();
    for name in ["big1", "big2"] {
        write_problem(dir.path(), name, &["x:1,2,3,4", "y:2,3,4,5", "z:3,4,5,6"]);
    }
    let config = CorpusConfig::new(dir.path()).with_min_n_solutions(2);
    let corpus = CorpusLoader::new(config)
        .load(&SeedRegistry::default())
        .unwrap();
    assert_eq!(corpus.n_problems(), 2);
    assert!(corpus.label_of("small").is_none());
    assert!(corpus.report.unreadable.is_empty());
}

#[test]
fn unreadable_problem_files_are_skipped() {
    let dir = tempdir().unwrap();
    write_info(dir.path(), 10);
    fs::write(
        dir.path().join("problems.json"),
        r#"{"present1": 2, "present2": 2, "missing": 2}"#,
    )
    .unwrap();
    write_problem(dir.path(), "present1", &["a:1,2,3,4", "b:1,2,3,4"]);
    write_problem(dir.path(), "present2", &["c:1,2,3,4", "d:1,2,3,4"]);
    let corpus = CorpusLoader::new(CorpusConfig::new(dir.path()))
        .load(&SeedRegistry::default())
        .unwrap();
    assert_eq!(corpus.n_problems(), 2);
    assert_eq!(corpus.report.unreadable, vec!["missing".to_string()]);
    assert!(corpus.report.bad_data);
}

#[test]
fn missing_metadata_is_fatal() {
    let dir = tempdir().unwrap();
    write_problem(dir.path(), "p", &["a:1,2,3,4"]);
    let err = CorpusLoader::new(CorpusConfig::new(dir.path()))
        .load(&SeedRegistry::default())
        .unwrap_err();
    assert!(matches!(err, DatasetError::MissingPath { .. }));

    let err = CorpusLoader::new(CorpusConfig::new(dir.path().join("absent")))
        .load(&SeedRegistry::default())
        .unwrap_err();
    assert!(matches!(err, DatasetError::MissingPath { .. }));
}
