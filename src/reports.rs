use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::reports::{
    ALL_PROBLEMS_FILE, LISTING_WRAP, SAMPLES_CSV_HEADER, TEST_PROBLEMS_FILE, TEST_SAMPLES_FILE,
    TEST_STATISTICS_FILE, TOO_LONG_FILE, TOO_SHORT_FILE, TRAIN_SAMPLES_FILE,
    TRAIN_STATISTICS_FILE, TRAIN_VALID_PROBLEMS_FILE, TRAINING_PROBLEMS_FILE,
    VALIDATION_PROBLEMS_FILE, VALIDATION_SAMPLES_FILE,
};
use crate::data::{Corpus, LoadReport, OmittedSolution, PairSample};
use crate::errors::DatasetError;
use crate::metrics::{
    PairCountSkew, ProblemDistribution, SimilarityEvaluation, SideUsage, SolutionUsage,
    SplitStatistics,
};
use crate::splits::{Partition, SplitLabel};
use crate::types::{ProblemIdx, ProblemName};

const NO_PARTNER: &str = "   -   ";
const LISTING_INDENT: &str = "     ";

/// Sample CSV file written for `split`.
pub fn samples_file(split: SplitLabel) -> &'static str {
    match split {
        SplitLabel::Train => TRAIN_SAMPLES_FILE,
        SplitLabel::Validation => VALIDATION_SAMPLES_FILE,
        SplitLabel::Test => TEST_SAMPLES_FILE,
    }
}

/// Statistics file holding the section of `split`; validation shares the training file.
pub fn statistics_file(split: SplitLabel) -> &'static str {
    match split {
        SplitLabel::Train | SplitLabel::Validation => TRAIN_STATISTICS_FILE,
        SplitLabel::Test => TEST_STATISTICS_FILE,
    }
}

fn section_rank(split: SplitLabel) -> usize {
    match split {
        SplitLabel::Validation => 0,
        SplitLabel::Train => 1,
        SplitLabel::Test => 2,
    }
}

/// Render one split's statistics section.
pub fn format_statistics(statistics: &SplitStatistics, corpus: &Corpus) -> String {
    let mut out = format!(
        "Statistics of the {} dataset: {} samples\n\n",
        statistics.split, statistics.distribution.n_samples
    );
    out.push_str(&format_distribution(&statistics.distribution, corpus));
    if let Some(skew) = &statistics.skew {
        out.push('\n');
        out.push_str(&format_skew(skew));
    }
    out.push('\n');
    out.push_str(&format_usage(&statistics.usage));
    out
}

/// Render omitted solutions, one problem per block, wrapped at a fixed width.
pub fn format_omitted_listing(omitted: &IndexMap<ProblemName, Vec<OmittedSolution>>) -> String {
    let mut out = String::new();
    for (index, (problem, solutions)) in omitted.iter().enumerate() {
        let mut line = format!("{:3} {:16}", index + 1, problem);
        let mut sep = ":";
        for solution in solutions {
            line.push_str(&format!("{sep} {}/{}", solution.solution, solution.n_tokens));
            sep = ",";
            if line.len() > LISTING_WRAP {
                out.push_str(&line);
                out.push('\n');
                line = LISTING_INDENT.to_string();
                sep = "";
            }
        }
        if line.len() > LISTING_INDENT.len() {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Render the per-problem pair distribution table and its omission summary.
pub fn format_distribution(distribution: &ProblemDistribution, corpus: &Corpus) -> String {
    let name = |problem: ProblemIdx| corpus.problem_name(problem).unwrap_or("?").to_string();
    let mut out = String::new();
    out.push_str(
        "Probl  Same  Same%   Left  Left%  Right Right% Min N  Max N  Median Mean N Std N  Problem   Pare  Often\n",
    );
    out.push_str(
        "Index    samples       sample       samples    pairs  pairs  pairs  pairs  pairs  name    problem Problem\n",
    );
    out.push_str(&"-".repeat(105));
    out.push('\n');
    for row in &distribution.rows {
        out.push_str(&format!(
            "{:4} {:6} {:5.2}  {:6} {:5.2}  {:6} {:5.2} {:6} {:6} {:6.1} {:8.1} {:6.2} {:7} {:7} {:7}\n",
            row.problem,
            row.same,
            distribution.percent(row.same),
            row.left,
            distribution.percent(row.left),
            row.right,
            distribution.percent(row.right),
            row.min_pairs,
            row.max_pairs,
            row.median_pairs,
            row.mean_pairs,
            row.std_pairs,
            name(row.problem),
            row.least_partner.map_or_else(|| NO_PARTNER.to_string(), name),
            row.most_partner.map_or_else(|| NO_PARTNER.to_string(), name),
        ));
    }
    let present = distribution.n_problems - distribution.fully_omitted.len();
    out.push_str(&"-".repeat(43));
    out.push('\n');
    out.push_str(&format!(
        "{} problems are not present in ANY samples\n",
        distribution.fully_omitted.len()
    ));
    out.push_str(&format!("Among the other {present} problems:\n"));
    for (count, what) in [
        (distribution.same_omitted.len(), "SAME samples"),
        (distribution.different_omitted.len(), "DIFFERENT samples"),
        (distribution.left_omitted.len(), "left side of DIFFERENT samples"),
        (distribution.right_omitted.len(), "right side of DIFFERENT samples"),
    ] {
        out.push_str(&format!("  - {count} problems are not present in {what}\n"));
    }
    if distribution.out_of_range > 0 {
        out.push_str(&format!(
            "{} samples reference problems outside the reported range\n",
            distribution.out_of_range
        ));
    }
    out
}

/// Render the skew summary of cross-problem pair counts.
pub fn format_skew(skew: &PairCountSkew) -> String {
    format!(
        "Cross-problem pairs: total {} over {} problems, min {} max {} mean {:.2}, max/min {:.2}, shares {:.4}..{:.4}\n",
        skew.total,
        skew.problems,
        skew.min,
        skew.max,
        skew.mean,
        skew.ratio,
        skew.min_share,
        skew.max_share
    )
}

/// Render solution usage per dataset side.
pub fn format_usage(usage: &SolutionUsage) -> String {
    let mut out = format!(
        "Dataset of {} problems with {} solutions\n",
        usage.n_problems, usage.total_solutions
    );
    if let (Some((min_problem, min)), Some((max_problem, max))) =
        (usage.min_solutions, usage.max_solutions)
    {
        out.push_str(&format!(
            "Solutions per problem: min {min} (problem {min_problem}), max {max} (problem {max_problem})\n"
        ));
    }
    out.push_str("Side                  Used  Total  Min used  Max used  Min uniq  Max uniq\n");
    let side = |label: &str, stats: &SideUsage| {
        format!(
            "{:18} {:7} {:6} {:9.3} {:9.3} {:9.3} {:9.3}\n",
            label,
            stats.solutions_used,
            stats.total_solutions,
            stats.min_fraction_used,
            stats.max_fraction_used,
            stats.min_uniqueness,
            stats.max_uniqueness
        )
    };
    out.push_str(&side("similar left", &usage.similar_left));
    out.push_str(&side("similar right", &usage.similar_right));
    out.push_str(&side("dissimilar left", &usage.dissimilar_left));
    out.push_str(&side("dissimilar right", &usage.dissimilar_right));
    out
}

/// Render a post-hoc evaluation: confusion counts, scores and the weakest problems.
pub fn format_evaluation(evaluation: &SimilarityEvaluation, corpus: &Corpus, top: usize) -> String {
    let name = |problem: ProblemIdx| corpus.problem_name(problem).unwrap_or("?");
    let percent = |value: Option<f64>| {
        value.map_or_else(|| "   -  ".to_string(), |value| format!("{:6.2}", 100.0 * value))
    };
    let mut out = format!(
        "Confusion matrix over {} samples (rows = actual, columns = predicted)\n",
        evaluation.n_samples()
    );
    out.push_str("            dissimilar  similar\n");
    out.push_str(&format!(
        "dissimilar  {:10} {:8}\n",
        evaluation.tn, evaluation.fp
    ));
    out.push_str(&format!(
        "similar     {:10} {:8}\n",
        evaluation.fn_, evaluation.tp
    ));
    out.push_str(&format!(
        "Accuracy {:.4}  Precision {:.4}  Recall {:.4}  F1 {:.4}\n",
        evaluation.accuracy(),
        evaluation.precision(),
        evaluation.recall(),
        evaluation.f1()
    ));
    out.push_str(&format!(
        "{} problems took part in evaluated pairs\n",
        evaluation.tested_problems.len()
    ));

    out.push_str("\nLowest similar-pair accuracy\n");
    for accuracy in evaluation.worst_similar(top) {
        out.push_str(&format!(
            "{:16} {:6} tests {:6.2}%\n",
            name(accuracy.problem),
            accuracy.tests,
            100.0 * accuracy.accuracy()
        ));
    }
    out.push_str("\nLowest dissimilar-pair accuracy\n");
    for pair in evaluation.worst_dissimilar(top) {
        out.push_str(&format!(
            "{:16} {:16} {}% {}% combined {:6.2}%\n",
            name(pair.problem1),
            name(pair.problem2),
            percent(pair.forward_accuracy()),
            percent(pair.backward_accuracy()),
            100.0 * pair.combined_accuracy()
        ));
    }
    out.push_str("\nMost asymmetric dissimilar-pair accuracy\n");
    for pair in evaluation.most_asymmetric(top) {
        out.push_str(&format!(
            "{:16} {:16} difference {:6.2}%\n",
            name(pair.problem1),
            name(pair.problem2),
            100.0 * pair.asymmetry()
        ));
    }
    out
}

/// Writes dataset reports under one directory, creating it on first use.
#[derive(Clone, Debug)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    /// Writer for reports under `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Report directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `file_name` inside the report directory.
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    fn write_text(&self, file_name: &str, contents: &str) -> Result<PathBuf, DatasetError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(file_name);
        fs::write(&path, contents)?;
        debug!(path = %path.display(), "[solution_pairs:reports] report written");
        Ok(path)
    }

    /// Write the too-short and too-long solution listings.
    pub fn write_wrong_length(&self, report: &LoadReport) -> Result<(), DatasetError> {
        self.write_text(TOO_SHORT_FILE, &format_omitted_listing(&report.too_short))?;
        self.write_text(TOO_LONG_FILE, &format_omitted_listing(&report.too_long))?;
        Ok(())
    }

    /// Write problem name lists for the corpus and every produced split.
    pub fn write_problem_lists(
        &self,
        corpus: &Corpus,
        partition: &Partition,
    ) -> Result<(), DatasetError> {
        let names = |labels: &[ProblemIdx]| -> String {
            labels
                .iter()
                .filter_map(|label| corpus.problem_name(*label))
                .map(|name| format!("{name}\n"))
                .collect()
        };
        let all: Vec<ProblemIdx> = (0..corpus.n_problems()).collect();
        self.write_text(ALL_PROBLEMS_FILE, &names(&all))?;
        self.write_text(
            TRAIN_VALID_PROBLEMS_FILE,
            &names(&partition.train_valid_problems()),
        )?;
        self.write_text(
            TRAINING_PROBLEMS_FILE,
            &names(&partition.train.problem_labels()),
        )?;
        if let Some(validation) = &partition.validation {
            self.write_text(VALIDATION_PROBLEMS_FILE, &names(&validation.problem_labels()))?;
        }
        if let Some(test) = &partition.test {
            self.write_text(TEST_PROBLEMS_FILE, &names(&test.problem_labels()))?;
        }
        Ok(())
    }

    /// Dump `pairs` of `split` as CSV using problem and solution names.
    pub fn write_samples(
        &self,
        corpus: &Corpus,
        split: SplitLabel,
        pairs: &[PairSample],
    ) -> Result<PathBuf, DatasetError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(samples_file(split));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(SAMPLES_CSV_HEADER)?;
        for pair in pairs {
            let (Some(left), Some(right)) = (
                corpus.solution(pair.problem1, pair.solution1),
                corpus.solution(pair.problem2, pair.solution2),
            ) else {
                return Err(DatasetError::Report(format!(
                    "sample {:?} references a solution missing from the corpus",
                    pair.as_tuple()
                )));
            };
            writer.write_record([
                corpus.problem_name(pair.problem1).unwrap_or_default(),
                left.name.as_str(),
                corpus.problem_name(pair.problem2).unwrap_or_default(),
                right.name.as_str(),
            ])?;
        }
        writer.flush()?;
        info!(
            split = %split,
            samples = pairs.len(),
            path = %path.display(),
            "[solution_pairs:reports] samples written"
        );
        Ok(path)
    }

    /// Write the statistics sections of every split, grouped by statistics file.
    ///
    /// The validation section precedes the training section in the training file.
    pub fn write_statistics(
        &self,
        corpus: &Corpus,
        statistics: &[SplitStatistics],
    ) -> Result<Vec<PathBuf>, DatasetError> {
        let mut ordered: Vec<&SplitStatistics> = statistics.iter().collect();
        ordered.sort_by_key(|section| section_rank(section.split));
        let mut files: IndexMap<&'static str, String> = IndexMap::new();
        for section in ordered {
            let contents = files.entry(statistics_file(section.split)).or_default();
            if !contents.is_empty() {
                contents.push('\n');
            }
            contents.push_str(&format_statistics(section, corpus));
        }
        files
            .into_iter()
            .map(|(file_name, contents)| self.write_text(file_name, &contents))
            .collect()
    }

    /// Write an evaluation report to `file_name`.
    pub fn write_evaluation(
        &self,
        file_name: &str,
        evaluation: &SimilarityEvaluation,
        corpus: &Corpus,
        top: usize,
    ) -> Result<PathBuf, DatasetError> {
        self.write_text(file_name, &format_evaluation(evaluation, corpus, top))
    }
}
