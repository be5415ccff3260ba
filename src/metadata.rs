use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub use crate::constants::corpus::{INFO_FILE, PROBLEMS_FILE};
use crate::errors::DatasetError;
use crate::types::{ProblemName, TokenSetName};

/// Token-set description stored next to a tokenized corpus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Token-set name, e.g. `java`.
    pub token_set: TokenSetName,
    /// Vocabulary size.
    pub n_tokens: usize,
}

/// Read `<dir>/info.json`.
pub fn read_dataset_info(dir: &Path) -> Result<DatasetInfo, DatasetError> {
    let path = dir.join(INFO_FILE);
    let raw = read_metadata_file(&path, "dataset info file")?;
    let info: DatasetInfo = serde_json::from_str(&raw).map_err(|err| DatasetError::Metadata {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    if info.n_tokens == 0 {
        return Err(DatasetError::Metadata {
            path,
            reason: "n_tokens must be positive".to_string(),
        });
    }
    Ok(info)
}

/// Path of the problem index file inside `dir`.
pub fn problems_path(dir: &Path) -> PathBuf {
    dir.join(PROBLEMS_FILE)
}

/// Read `<dir>/problems.json` as problem name → solution count.
///
/// Counts may be JSON integers or numeric strings. Returns `Ok(None)` when the
/// file does not exist.
pub fn read_problem_counts(
    dir: &Path,
) -> Result<Option<IndexMap<ProblemName, usize>>, DatasetError> {
    let path = problems_path(dir);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = read_metadata_file(&path, "problem index file")?;
    let parsed: IndexMap<ProblemName, Value> =
        serde_json::from_str(&raw).map_err(|err| DatasetError::Metadata {
            path: path.clone(),
            reason: err.to_string(),
        })?;
    let mut counts = IndexMap::with_capacity(parsed.len());
    for (problem, value) in parsed {
        let Some(count) = solution_count(&value) else {
            return Err(DatasetError::Metadata {
                path,
                reason: format!("invalid solution count {value} for problem {problem}"),
            });
        };
        counts.insert(problem, count);
    }
    Ok(Some(counts))
}

fn solution_count(value: &Value) -> Option<usize> {
    match value {
        Value::Number(number) => number.as_u64().map(|count| count as usize),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn read_metadata_file(path: &Path, what: &'static str) -> Result<String, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::MissingPath {
            what,
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|err| DatasetError::Metadata {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dataset_info_is_read_and_validated() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(INFO_FILE),
            r#"{"token_set": "java", "n_tokens": 96}"#,
        )
        .unwrap();
        let info = read_dataset_info(dir.path()).unwrap();
        assert_eq!(info.token_set, "java");
        assert_eq!(info.n_tokens, 96);

        fs::write(
            dir.path().join(INFO_FILE),
            r#"{"token_set": "java", "n_tokens": 0}"#,
        )
        .unwrap();
        assert!(matches!(
            read_dataset_info(dir.path()),
            Err(DatasetError::Metadata { .. })
        ));
    }

    #[test]
    fn missing_info_file_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let err = read_dataset_info(dir.path()).unwrap_err();
        match err {
            DatasetError::MissingPath { path, .. } => {
                assert_eq!(path, dir.path().join(INFO_FILE));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn problem_counts_accept_numbers_and_numeric_strings() {
        let dir = tempdir().unwrap();
        assert!(read_problem_counts(dir.path()).unwrap().is_none());

        fs::write(
            dir.path().join(PROBLEMS_FILE),
            r#"{"p02": 12, "p01": "7", "p03": " 3 "}"#,
        )
        .unwrap();
        let counts = read_problem_counts(dir.path()).unwrap().unwrap();
        let entries: Vec<(&str, usize)> =
            counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(entries, vec![("p02", 12), ("p01", 7), ("p03", 3)]);

        fs::write(dir.path().join(PROBLEMS_FILE), r#"{"p01": [1]}"#).unwrap();
        assert!(matches!(
            read_problem_counts(dir.path()),
            Err(DatasetError::Metadata { .. })
        ));
    }
}
