use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::normalize_vector;

lazy_static! {
    // Two or more word characters, unicode aware.
    static ref TOKEN_PATTERN: Regex = Regex::new(r"\b\w\w+\b").expect("valid token pattern");
}

/// Lowercases `text` and extracts its tokens in order.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Sparse feature vector: `(feature index, value)` pairs sorted by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f32)>,
}

impl SparseVector {
    pub(crate) fn from_sorted(entries: Vec<(usize, f32)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, index: usize) -> f32 {
        match self.entries.binary_search_by_key(&index, |&(i, _)| i) {
            Ok(pos) => self.entries[pos].1,
            Err(_) => 0.0,
        }
    }

    /// Number of stored non-zero entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_zero(&self) -> bool {
        self.entries.iter().all(|&(_, v)| v == 0.0)
    }

    pub fn entries(&self) -> &[(usize, f32)] {
        &self.entries
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.entries.iter().map(|&(_, v)| v)
    }

    pub(crate) fn scale(&mut self, factor: f32) {
        for (_, v) in self.entries.iter_mut() {
            *v *= factor;
        }
    }
}

/// Term-frequency / inverse-document-frequency vectorizer.
///
/// The vocabulary is fixed by [`TfidfVectorizer::fit`]; terms never seen during
/// fitting contribute nothing at transform time. Feature indices follow the
/// sorted order of the vocabulary and idf is smoothed as
/// `ln((1 + n) / (1 + df)) + 1`. Every output row is l2-normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Result<Self, ClassifierError> {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let terms: BTreeSet<&str> = tokenized.iter().flatten().map(String::as_str).collect();
        if terms.is_empty() {
            return Err(ClassifierError::ValidationError(
                "Training descriptions contain no usable terms".into(),
            ));
        }
        let vocabulary: BTreeMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        let mut document_frequency = vec![0usize; vocabulary.len()];
        for tokens in &tokenized {
            let unique: BTreeSet<usize> = tokens.iter().filter_map(|t| vocabulary.get(t).copied()).collect();
            for idx in unique {
                document_frequency[idx] += 1;
            }
        }

        let n = documents.len() as f32;
        let idf = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        debug!("Fitted vocabulary of {} terms over {} documents", vocabulary.len(), documents.len());
        Ok(Self { vocabulary, idf })
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let entries = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        let mut vector = SparseVector::from_sorted(entries);
        normalize_vector(&mut vector);
        vector
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// Checks the internal tables agree with each other, e.g. after deserializing.
    pub(crate) fn validate(&self) -> Result<(), ClassifierError> {
        if self.idf.len() != self.vocabulary.len() {
            return Err(ClassifierError::ValidationError(format!(
                "idf table has {} entries for {} terms",
                self.idf.len(),
                self.vocabulary.len()
            )));
        }
        if self.vocabulary.values().any(|&idx| idx >= self.idf.len()) {
            return Err(ClassifierError::ValidationError("Vocabulary index out of range".into()));
        }
        Ok(())
    }
}
