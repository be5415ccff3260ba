/// Base seeds registered for each randomisation purpose.
pub mod seeds {
    /// Shuffle of the candidate problem list.
    pub const ALL_PROBLEMS_SEED: u64 = 1812;
    /// Shuffle of solutions inside each problem.
    pub const PROBLEM_SOLUTIONS_SEED: u64 = 1870;
    /// Shuffle of all solution samples.
    pub const ALL_SOLUTIONS_SEED: u64 = 1905;
    /// Training pair generation.
    pub const TRAIN_PAIRS_SEED: u64 = 1917;
    /// Validation pair generation.
    pub const VALIDATION_PAIRS_SEED: u64 = 1937;
    /// Test pair generation.
    pub const TEST_PAIRS_SEED: u64 = 1941;
    /// Balanced split: test cut shuffle.
    pub const TEST_SHUFFLE_SEED: u64 = 1945;
    /// Balanced split: validation cut shuffle.
    pub const VALIDATION_SHUFFLE_SEED: u64 = 1961;
    /// Balanced split: training shuffle.
    pub const TRAIN_SHUFFLE_SEED: u64 = 1980;
    /// Default base offset added to every seed (`--seed-offset`).
    pub const DEFAULT_SEED_OFFSET: u64 = 101;
}

/// Constants used by the pair sampler.
pub mod sampler {
    /// Number of slots in the problem selection table (128Ki).
    pub const SEL_SIZE: usize = 128 * 1024;
    /// Default fraction of similar pairs in a generated dataset.
    pub const DEFAULT_SIMILAR_FRACTION: f64 = 0.5;
    /// Default number of training pairs.
    pub const DEFAULT_TRAIN_SIZE: usize = 20_000;
    /// Default number of validation pairs.
    pub const DEFAULT_VALIDATION_SIZE: usize = 5_000;
    /// Default number of test pairs.
    pub const DEFAULT_TEST_SIZE: usize = 5_000;
}

/// Constants used by corpus loading.
pub mod corpus {
    /// Extension of tokenized problem files.
    pub const TOKENIZED_EXTENSION: &str = "tkn";
    /// Token-set metadata file name.
    pub const INFO_FILE: &str = "info.json";
    /// Problem → solution-count metadata file name.
    pub const PROBLEMS_FILE: &str = "problems.json";
    /// Separator between solution name and token list.
    pub const SOLUTION_DELIMITER: char = ':';
    /// Separator between tokens.
    pub const TOKEN_DELIMITER: char = ',';
    /// Default minimum number of tokens of a retained solution.
    pub const DEFAULT_SHORT_CODE_TH: usize = 4;
    /// Default minimum number of retained solutions per problem.
    pub const DEFAULT_MIN_N_SOLUTIONS: usize = 1;
    /// Warning emitted when a problem file cannot be read.
    pub const SKIP_UNREADABLE_MSG: &str = "skipping unreadable problem file";
    /// Warning emitted when a tokenized line is rejected.
    pub const SKIP_BAD_LINE_MSG: &str = "skipping malformed tokenized solution";
}

/// Constants used by partitioning.
pub mod splits {
    /// Minimum number of problems in a disjoint validation/train/test group.
    pub const MIN_GROUP_PROBLEMS: usize = 2;
    /// Minimum solutions per problem for a 3-way balanced split.
    pub const MIN_SOLUTIONS_THREE_WAY: usize = 3;
    /// Minimum solutions per problem for a 2-way balanced split.
    pub const MIN_SOLUTIONS_TWO_WAY: usize = 2;
    /// Default fraction used for validation cuts.
    pub const DEFAULT_VALIDATION_FRACTION: f64 = 0.2;
}

/// Report file names written under the report directory.
pub mod reports {
    /// Default report directory.
    pub const DEFAULT_REPORT_DIR: &str = "./dataset_statistics";
    /// Listing of solutions below the short-code threshold.
    pub const TOO_SHORT_FILE: &str = "TooShortCode.lst";
    /// Listing of solutions above the long-code threshold.
    pub const TOO_LONG_FILE: &str = "TooLongCode.lst";
    /// Every selected problem, in label order.
    pub const ALL_PROBLEMS_FILE: &str = "all_problems.txt";
    /// Problems used for training or validation.
    pub const TRAIN_VALID_PROBLEMS_FILE: &str = "train_valid_problems.txt";
    /// Problems reserved for testing.
    pub const TEST_PROBLEMS_FILE: &str = "test_problems.txt";
    /// Problems of the training group.
    pub const TRAINING_PROBLEMS_FILE: &str = "training_problems.txt";
    /// Problems of the validation group.
    pub const VALIDATION_PROBLEMS_FILE: &str = "validation_problems.txt";
    /// Training pair dump.
    pub const TRAIN_SAMPLES_FILE: &str = "train_samples.csv";
    /// Validation pair dump.
    pub const VALIDATION_SAMPLES_FILE: &str = "val_samples.csv";
    /// Test pair dump.
    pub const TEST_SAMPLES_FILE: &str = "test_samples.csv";
    /// Validation and training statistics.
    pub const TRAIN_STATISTICS_FILE: &str = "TrainDatasetStatistics.lst";
    /// Test statistics.
    pub const TEST_STATISTICS_FILE: &str = "TestDatasetStatistics.lst";
    /// Wrap width used by the wrong-length solution listings.
    pub const LISTING_WRAP: usize = 80;
    /// Header of sample CSV dumps.
    pub const SAMPLES_CSV_HEADER: [&str; 4] = ["problem1", "solution1", "problem2", "solution2"];
}
