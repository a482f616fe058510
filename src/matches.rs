//! Similarity matrices flattened into scored document pairs.

use std::fmt;

use sprs::CsMat;

use crate::corpus::DescriptionCorpus;
use crate::error::{ChainError, Result};
use crate::similarity::{cosine_rows_top_n, cosine_top_n};
use crate::vectorizer::tf_idf;

/// One explicit entry of a similarity matrix, with its texts attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch<'a> {
    pub left: &'a str,
    pub right: &'a str,
    pub score: f64,
    pub left_idx: usize,
    pub right_idx: usize,
}

impl SimilarityMatch<'_> {
    #[must_use]
    pub fn is_self_match(&self) -> bool {
        self.left_idx == self.right_idx
    }
}

impl fmt::Display for SimilarityMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Left: {:<35} | Right: {:<35} | Score: {:>5.2} | Positions: {} -> {}",
            self.left, self.right, self.score, self.left_idx, self.right_idx
        )
    }
}

/// Flatten a similarity matrix into match records, row by row in storage
/// order. Self-matches and low scores are kept; callers decide what to drop.
///
/// # Errors
/// [`ChainError::DimensionMismatch`] if the matrix is larger than the corpus
/// in either direction.
pub fn extract_matches<'a>(
    similarity: &CsMat<f64>,
    corpus: &'a DescriptionCorpus,
) -> Result<Vec<SimilarityMatch<'a>>> {
    extract_rows(similarity, corpus, 0)
}

/// Like [`extract_matches`], for a matrix whose row `i` is document
/// `first_row + i`.
fn extract_rows<'a>(
    similarity: &CsMat<f64>,
    corpus: &'a DescriptionCorpus,
    first_row: usize,
) -> Result<Vec<SimilarityMatch<'a>>> {
    let (rows, cols) = similarity.shape();
    if first_row + rows > corpus.len() || cols > corpus.len() {
        return Err(ChainError::DimensionMismatch(format!(
            "{rows}x{cols} similarity matrix for a corpus of {} documents",
            corpus.len()
        )));
    }

    let csr;
    let similarity = if similarity.is_csr() {
        similarity
    } else {
        csr = similarity.to_csr();
        &csr
    };

    let documents = corpus.documents();
    let mut matches = Vec::with_capacity(similarity.nnz());
    for (offset, row) in similarity.outer_iterator().enumerate() {
        let left_idx = first_row + offset;
        for (right_idx, &score) in row.iter() {
            matches.push(SimilarityMatch {
                left: &documents[left_idx].text,
                right: &documents[right_idx].text,
                score,
                left_idx,
                right_idx,
            });
        }
    }
    Ok(matches)
}

/// Run one matching round over `corpus`: TF-IDF over `ngram_size`-grams,
/// cosine top-`ntop` above `lower_bound`, then flatten.
///
/// # Errors
/// Propagates vectorizer and similarity errors.
pub fn match_corpus(
    corpus: &DescriptionCorpus,
    ngram_size: usize,
    ntop: usize,
    lower_bound: f64,
) -> Result<Vec<SimilarityMatch<'_>>> {
    let texts: Vec<&str> = corpus.texts().collect();
    let weights = tf_idf(&texts, ngram_size)?;
    let similarity = cosine_top_n(&weights, ntop, lower_bound)?;
    extract_matches(&similarity, corpus)
}

/// Like [`match_corpus`], but only the entity document is scored against
/// the corpus. Every match has the entity on the left.
///
/// # Errors
/// Propagates vectorizer and similarity errors.
pub fn match_entity(
    corpus: &DescriptionCorpus,
    ngram_size: usize,
    ntop: usize,
    lower_bound: f64,
) -> Result<Vec<SimilarityMatch<'_>>> {
    let texts: Vec<&str> = corpus.texts().collect();
    let weights = tf_idf(&texts, ngram_size)?;
    let entity = corpus.entity_index();
    let entity_row = weights.slice_outer(entity..entity + 1);
    let similarity = cosine_rows_top_n(entity_row, &weights, ntop, lower_bound)?;
    extract_rows(&similarity, corpus, entity)
}
