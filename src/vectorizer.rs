//! TF-IDF document-term matrices over character n-grams.

use linfa_preprocessing::tf_idf_vectorization::TfIdfVectorizer;
use ndarray::Array1;
use sprs::CsMat;

use crate::error::{ChainError, Result};
use crate::tokenizer::clean;

/// Every character is a token; n-grams are built over characters.
const CHAR_TOKEN: &str = r"(?s).";

/// Row-major sparse TF-IDF matrix: one row per document, one column per n-gram.
pub type TfIdfMatrix = CsMat<f64>;

trait RowNorms {
    fn row_norms(&self) -> Vec<f64>;
}

impl RowNorms for CsMat<f64> {
    #[inline]
    fn row_norms(&self) -> Vec<f64> {
        self.outer_iterator()
            .map(|row| row.data().iter().map(|x| x * x).sum::<f64>().sqrt())
            .collect()
    }
}

/// Scale every non-empty row to unit L2 norm.
fn l2_normalize_rows(mut matrix: CsMat<f64>) -> CsMat<f64> {
    if !matrix.is_csr() {
        matrix = matrix.to_csr();
    }
    let norms = matrix.row_norms();
    let lengths: Vec<usize> = matrix.outer_iterator().map(|row| row.nnz()).collect();

    let data = matrix.data_mut();
    let mut offset = 0;
    for (norm, len) in norms.into_iter().zip(lengths) {
        if norm > 0.0 {
            for x in &mut data[offset..offset + len] {
                *x /= norm;
            }
        }
        offset += len;
    }
    matrix
}

/// Renumber columns so that column `j` is the `j`-th vocabulary entry in
/// sorted order. The fitted vocabulary comes out in hash order.
fn sort_columns(matrix: CsMat<f64>, vocabulary: &[String]) -> CsMat<f64> {
    let matrix = if matrix.is_csr() { matrix } else { matrix.to_csr() };

    let mut order: Vec<usize> = (0..vocabulary.len()).collect();
    order.sort_unstable_by(|&x, &y| vocabulary[x].cmp(&vocabulary[y]));
    let mut rank = vec![0; order.len()];
    for (new, &old) in order.iter().enumerate() {
        rank[old] = new;
    }

    let mut indptr = Vec::with_capacity(matrix.rows() + 1);
    let mut indices = Vec::with_capacity(matrix.nnz());
    let mut data = Vec::with_capacity(matrix.nnz());
    indptr.push(0);
    let mut entries: Vec<(usize, f64)> = Vec::new();
    for row in matrix.outer_iterator() {
        entries.extend(row.iter().map(|(j, &v)| (rank[j], v)));
        entries.sort_unstable_by_key(|&(j, _)| j);
        for (j, v) in entries.drain(..) {
            indices.push(j);
            data.push(v);
        }
        indptr.push(indices.len());
    }
    CsMat::new(matrix.shape(), indptr, indices, data)
}

/// Build the L2-normalized TF-IDF matrix of `corpus` using `ngram_size`
/// character n-grams as terms. The vocabulary is fitted on `corpus` itself.
///
/// Term frequency is the raw count, IDF is smoothed
/// (`ln((1 + docs) / (1 + df)) + 1`) and every term seen at least once is
/// kept. Documents too short to yield an n-gram get an all-zero row.
/// Columns follow the sorted n-gram vocabulary, so repeated calls on the
/// same corpus produce bit-identical matrices.
///
/// # Errors
/// [`ChainError::InvalidParameter`] for a zero `ngram_size`, or the
/// vectorizer's own error if fitting fails.
pub fn tf_idf<S: AsRef<str>>(corpus: &[S], ngram_size: usize) -> Result<TfIdfMatrix> {
    if ngram_size == 0 {
        return Err(ChainError::invalid(
            "ngram_size",
            "n-gram size must be at least 1",
        ));
    }

    let documents: Vec<String> = corpus
        .iter()
        .map(|text| clean(text.as_ref()).into_owned())
        .collect();

    // Nothing to fit: every row is a zero row.
    if documents
        .iter()
        .all(|doc| doc.chars().count() < ngram_size)
    {
        return Ok(CsMat::zero((documents.len(), 0)));
    }

    let documents = Array1::from_vec(documents);
    let fitted = TfIdfVectorizer::default()
        .convert_to_lowercase(false)
        .normalize(false)
        .split_regex(CHAR_TOKEN)
        .n_gram_range(ngram_size, ngram_size)
        .fit(&documents)?;

    let weights = sort_columns(fitted.transform(&documents), fitted.vocabulary());
    log::trace!(
        "tf-idf matrix: {} documents x {} features ({} non-zeros)",
        weights.rows(),
        weights.cols(),
        weights.nnz()
    );
    Ok(l2_normalize_rows(weights))
}
