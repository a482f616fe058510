#![warn(clippy::pedantic)]
//! Contracting-chain reconstruction.
//!
//! Contracts a public entity issued to municipalities and departments are
//! matched, by description, against the contracts those municipalities and
//! departments later issued to third parties. Descriptions are compared as
//! TF-IDF vectors of character n-grams and only the best few cosine matches
//! per description are kept.

pub mod chain;
pub mod config;
pub mod contract;
pub mod corpus;
pub mod error;
pub mod export;
pub mod matches;
pub mod normalize;
pub mod similarity;
pub mod source;
pub mod tokenizer;
pub mod vectorizer;


pub use chain::{ChainAssembler, ChainLink, ChainRecord, ChainTable, eligible_candidates};
pub use config::ChainConfig;
pub use contract::{ContractRecord, EligibilityRule, RawContract};
pub use corpus::{DescriptionCorpus, Document, Role};
pub use error::{ChainError, Result};
pub use matches::{SimilarityMatch, extract_matches, match_corpus, match_entity};
pub use normalize::normalize_description;
pub use similarity::{cosine_rows_top_n, cosine_top_n, sparse_dot_topn};
pub use source::{ContractSource, InMemorySource, TimeoutSource};
pub use tokenizer::ngrams;
pub use vectorizer::{TfIdfMatrix, tf_idf};
