/// Problem identifier (file stem of the tokenized problem file).
/// Example: `p02547`
pub type ProblemName = String;
/// Solution identifier (the part before `:` in a tokenized line).
/// Example: `s123456789`
pub type SolutionName = String;
/// Token id produced by the external tokenizer; always `< n_tokens`.
pub type TokenId = u32;
/// Dense problem label (`0..N-1`) assigned after corpus loading settles.
pub type ProblemIdx = usize;
/// Position of a solution inside its problem's solution list.
pub type SolutionIdx = usize;
/// Name of the token set used for tokenization.
/// Examples: `java`, `cpp`, `python`
pub type TokenSetName = String;
