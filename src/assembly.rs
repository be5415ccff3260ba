use ndarray::{Array, Array1, Array2, Array3, ArrayView, Axis, s};
use serde::{Deserialize, Serialize};

use crate::data::{Corpus, LabelMode, PairSample, Solution};
use crate::errors::DatasetError;
use crate::types::TokenId;

/// Representation of a solution fed to a pair model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleEncoding {
    /// L2-normalised token frequency vector.
    #[default]
    BagOfTokens,
    /// Token ids shifted by one, truncated or zero-padded to `max_len`.
    PaddedSequence { max_len: Option<usize> },
    /// One row per timestep with the token column set to one.
    OneHot { max_len: Option<usize> },
}

impl SampleEncoding {
    /// Fill an unset `max_len` with `code_max_length`.
    pub fn resolve(self, code_max_length: usize) -> Self {
        match self {
            SampleEncoding::BagOfTokens => SampleEncoding::BagOfTokens,
            SampleEncoding::PaddedSequence { max_len } => SampleEncoding::PaddedSequence {
                max_len: Some(max_len.unwrap_or(code_max_length)),
            },
            SampleEncoding::OneHot { max_len } => SampleEncoding::OneHot {
                max_len: Some(max_len.unwrap_or(code_max_length)),
            },
        }
    }

    fn max_len_for(max_len: Option<usize>, tokens: &[TokenId]) -> usize {
        max_len.unwrap_or(tokens.len())
    }
}

/// One encoded solution.
#[derive(Clone, Debug, PartialEq)]
pub enum EncodedSolution {
    /// Bag-of-tokens vector of length `vocab`.
    Bag(Array1<f32>),
    /// Shifted token ids, zero-padded.
    Sequence(Array1<i32>),
    /// `(max_len, vocab)` one-hot rows.
    OneHot(Array2<f32>),
}

/// Tokens must lie below `vocab`.
fn check_vocab(tokens: &[TokenId], vocab: usize) -> Result<(), DatasetError> {
    match tokens.iter().find(|token| **token as usize >= vocab) {
        Some(token) => Err(DatasetError::Configuration(format!(
            "token {token} is outside the vocabulary of {vocab} tokens"
        ))),
        None => Ok(()),
    }
}

/// Encode a token sequence.
///
/// An unset `max_len` keeps the sequence length; resolve the encoding against a
/// corpus first for fixed-width output. Tokens at or above `vocab` are rejected.
pub fn encode(
    tokens: &[TokenId],
    encoding: SampleEncoding,
    vocab: usize,
) -> Result<EncodedSolution, DatasetError> {
    check_vocab(tokens, vocab)?;
    let encoded = match encoding {
        SampleEncoding::BagOfTokens => EncodedSolution::Bag(bag_of_tokens(tokens, vocab)?),
        SampleEncoding::PaddedSequence { max_len } => {
            let max_len = SampleEncoding::max_len_for(max_len, tokens);
            let mut row = Array1::<i32>::zeros(max_len);
            fill_sequence(row.view_mut(), tokens);
            EncodedSolution::Sequence(row)
        }
        SampleEncoding::OneHot { max_len } => {
            let max_len = SampleEncoding::max_len_for(max_len, tokens);
            let mut rows = Array2::<f32>::zeros((max_len, vocab));
            for (t, token) in tokens.iter().take(max_len).enumerate() {
                rows[[t, *token as usize]] = 1.0;
            }
            EncodedSolution::OneHot(rows)
        }
    };
    Ok(encoded)
}

/// L2-normalised token frequencies; an empty sequence gives the zero vector.
pub fn bag_of_tokens(tokens: &[TokenId], vocab: usize) -> Result<Array1<f32>, DatasetError> {
    check_vocab(tokens, vocab)?;
    let mut bag = Array1::<f32>::zeros(vocab);
    for token in tokens {
        bag[*token as usize] += 1.0;
    }
    let norm = bag.dot(&bag).sqrt();
    if norm > 0.0 {
        bag.mapv_inplace(|value| value / norm);
    }
    Ok(bag)
}

fn fill_sequence(mut row: ndarray::ArrayViewMut1<'_, i32>, tokens: &[TokenId]) {
    for (slot, token) in row.iter_mut().zip(tokens) {
        *slot = *token as i32 + 1;
    }
}

/// Pair features in the layout selected by `SampleEncoding`.
#[derive(Clone, Debug, PartialEq)]
pub enum PairFeatures {
    /// `(n, 2 * vocab)`: left bag followed by right bag.
    Bag(Array2<f32>),
    /// Two `(n, max_len)` id matrices.
    Sequences { left: Array2<i32>, right: Array2<i32> },
    /// `(n, max_len, 2 * vocab)`.
    OneHot(Array3<f32>),
}

impl PairFeatures {
    /// Number of encoded pairs.
    pub fn n_samples(&self) -> usize {
        match self {
            PairFeatures::Bag(features) => features.nrows(),
            PairFeatures::Sequences { left, .. } => left.nrows(),
            PairFeatures::OneHot(features) => features.dim().0,
        }
    }
}

/// Arrays handed to a pair model, aligned with the pairs they came from.
#[derive(Clone, Debug)]
pub struct AssembledDataset {
    /// Encoded pair features.
    pub features: PairFeatures,
    /// Pair labels under the requested `LabelMode`.
    pub labels: Array1<i32>,
    /// Pairs in feature row order.
    pub pairs: Vec<PairSample>,
}

impl AssembledDataset {
    /// Number of assembled pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair was assembled.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn lookup<'a>(
    corpus: &'a Corpus,
    pair: &PairSample,
) -> Result<(&'a Solution, &'a Solution), DatasetError> {
    let left = corpus.solution(pair.problem1, pair.solution1);
    let right = corpus.solution(pair.problem2, pair.solution2);
    match (left, right) {
        (Some(left), Some(right)) => {
            check_vocab(&left.tokens, corpus.n_tokens)?;
            check_vocab(&right.tokens, corpus.n_tokens)?;
            Ok((left, right))
        }
        _ => Err(DatasetError::Sampling(format!(
            "pair {:?} references a solution missing from the corpus",
            pair.as_tuple()
        ))),
    }
}

/// Encode every pair of `pairs` against `corpus`.
///
/// The first dimension of every output array equals `pairs.len()`.
pub fn assemble(
    corpus: &Corpus,
    pairs: &[PairSample],
    encoding: SampleEncoding,
    label_mode: LabelMode,
) -> Result<AssembledDataset, DatasetError> {
    let vocab = corpus.n_tokens;
    let n = pairs.len();
    let features = match encoding.resolve(corpus.code_max_length) {
        SampleEncoding::BagOfTokens => {
            let mut features = Array2::<f32>::zeros((n, 2 * vocab));
            for (row, pair) in pairs.iter().enumerate() {
                let (left, right) = lookup(corpus, pair)?;
                features
                    .slice_mut(s![row, ..vocab])
                    .assign(&bag_of_tokens(&left.tokens, vocab)?);
                features
                    .slice_mut(s![row, vocab..])
                    .assign(&bag_of_tokens(&right.tokens, vocab)?);
            }
            PairFeatures::Bag(features)
        }
        SampleEncoding::PaddedSequence { max_len } => {
            let max_len = max_len.unwrap_or(corpus.code_max_length);
            let mut left_rows = Array2::<i32>::zeros((n, max_len));
            let mut right_rows = Array2::<i32>::zeros((n, max_len));
            for (row, pair) in pairs.iter().enumerate() {
                let (left, right) = lookup(corpus, pair)?;
                fill_sequence(left_rows.row_mut(row), &left.tokens);
                fill_sequence(right_rows.row_mut(row), &right.tokens);
            }
            PairFeatures::Sequences {
                left: left_rows,
                right: right_rows,
            }
        }
        SampleEncoding::OneHot { max_len } => {
            let max_len = max_len.unwrap_or(corpus.code_max_length);
            let mut features = Array3::<f32>::zeros((n, max_len, 2 * vocab));
            for (row, pair) in pairs.iter().enumerate() {
                let (left, right) = lookup(corpus, pair)?;
                for (t, token) in left.tokens.iter().take(max_len).enumerate() {
                    features[[row, t, *token as usize]] = 1.0;
                }
                for (t, token) in right.tokens.iter().take(max_len).enumerate() {
                    features[[row, t, vocab + *token as usize]] = 1.0;
                }
            }
            PairFeatures::OneHot(features)
        }
    };
    let labels = pairs
        .iter()
        .map(|pair| pair.label().value(label_mode))
        .collect::<Array1<i32>>();
    Ok(AssembledDataset {
        features,
        labels,
        pairs: pairs.to_vec(),
    })
}

/// One encoded pair yielded by `records`.
#[derive(Clone, Debug, PartialEq)]
pub enum EncodedPair {
    /// Concatenated bags, length `2 * vocab`.
    Bag(Array1<f32>),
    /// Left and right padded id sequences.
    Sequences(Array1<i32>, Array1<i32>),
    /// `(max_len, 2 * vocab)`.
    OneHot(Array2<f32>),
}

/// Pull-based iterator over encoded pairs and their labels.
pub struct PairRecords<'a> {
    corpus: &'a Corpus,
    pairs: std::slice::Iter<'a, PairSample>,
    encoding: SampleEncoding,
    label_mode: LabelMode,
}

/// Encode pairs lazily, one at a time.
pub fn records<'a>(
    corpus: &'a Corpus,
    pairs: &'a [PairSample],
    encoding: SampleEncoding,
    label_mode: LabelMode,
) -> PairRecords<'a> {
    PairRecords {
        corpus,
        pairs: pairs.iter(),
        encoding: encoding.resolve(corpus.code_max_length),
        label_mode,
    }
}

impl PairRecords<'_> {
    fn encode_pair(&self, pair: &PairSample) -> Result<EncodedPair, DatasetError> {
        let vocab = self.corpus.n_tokens;
        let (left, right) = lookup(self.corpus, pair)?;
        let encoded = match (
            encode(&left.tokens, self.encoding, vocab)?,
            encode(&right.tokens, self.encoding, vocab)?,
        ) {
            (EncodedSolution::Bag(left), EncodedSolution::Bag(right)) => {
                EncodedPair::Bag(join(Axis(0), left.view(), right.view())?)
            }
            (EncodedSolution::Sequence(left), EncodedSolution::Sequence(right)) => {
                EncodedPair::Sequences(left, right)
            }
            (EncodedSolution::OneHot(left), EncodedSolution::OneHot(right)) => {
                EncodedPair::OneHot(join(Axis(1), left.view(), right.view())?)
            }
            _ => {
                return Err(DatasetError::Sampling(
                    "mismatched encodings within one pair".to_string(),
                ));
            }
        };
        Ok(encoded)
    }
}

fn join<'a, D: ndarray::RemoveAxis>(
    axis: Axis,
    left: ArrayView<'a, f32, D>,
    right: ArrayView<'a, f32, D>,
) -> Result<Array<f32, D>, DatasetError> {
    ndarray::concatenate(axis, &[left, right])
        .map_err(|err| DatasetError::Sampling(format!("cannot join pair encodings: {err}")))
}

impl Iterator for PairRecords<'_> {
    type Item = Result<(EncodedPair, i32), DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        let pair = *self.pairs.next()?;
        let label = pair.label().value(self.label_mode);
        Some(self.encode_pair(&pair).map(|encoded| (encoded, label)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}

impl ExactSizeIterator for PairRecords<'_> {}
