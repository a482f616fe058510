//! Per-round description corpora.

use crate::normalize::normalize_description;

/// What a document in a [`DescriptionCorpus`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The entity contract the round is matching for.
    Entity,
    /// A target contract, by its index in the candidate slice.
    Candidate(usize),
}

#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub role: Role,
}

/// Ordered descriptions of one matching round.
///
/// Candidates come first in the order they were given, the entity
/// description is always the last document. Row and column indices of the
/// similarity matrix are positions in this corpus.
#[derive(Debug, Clone)]
pub struct DescriptionCorpus {
    documents: Vec<Document>,
}

impl DescriptionCorpus {
    /// Build a corpus from already standardized texts.
    pub fn new<I, S>(candidates: I, entity: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut documents: Vec<Document> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, text)| Document {
                text: text.into(),
                role: Role::Candidate(i),
            })
            .collect();
        documents.push(Document {
            text: entity.into(),
            role: Role::Entity,
        });
        Self { documents }
    }

    /// Build a corpus from raw descriptions, standardizing each one.
    pub fn from_raw<'a, I>(candidates: I, entity: &str) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::new(
            candidates.into_iter().map(normalize_description),
            normalize_description(entity),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Never true: a corpus always holds its entity document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn entity_index(&self) -> usize {
        self.documents.len() - 1
    }

    #[must_use]
    pub fn role(&self, idx: usize) -> Option<Role> {
        self.documents.get(idx).map(|doc| doc.role)
    }

    #[must_use]
    pub fn text(&self, idx: usize) -> Option<&str> {
        self.documents.get(idx).map(|doc| doc.text.as_str())
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|doc| doc.text.as_str())
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
}
