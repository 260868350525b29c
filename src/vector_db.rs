use ndarray::{Array1, ArrayView1};
use serde::Serialize;

use crate::error::{Result, RetrievalError};
use crate::retriever::Metadata;

/// A stored chunk with its embedding. Never mutated after insertion.
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    pub id: u64,
    pub text: String,
    pub metadata: Metadata,
    pub vector: Array1<f64>,
}

/// One ranked hit. Owns copies of the passage data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub passage_id: u64,
    pub text: String,
    pub metadata: Metadata,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub total_characters: usize,
    pub average_chunk_size: f64,
}

/// Divides by the largest absolute component so the dot products below
/// neither underflow nor overflow. `None` for a zero vector.
fn scaled(v: ArrayView1<f64>) -> Option<Array1<f64>> {
    let max = v.fold(0.0_f64, |max, x| max.max(x.abs()));
    if max == 0.0 {
        return None;
    }
    Some(v.mapv(|x| x / max))
}

/// Cosine similarity of two vectors.
///
/// Returns 0 when the lengths differ, either vector is empty or has zero norm,
/// or the result is not finite.
pub fn cosine_similarity(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (Some(a), Some(b)) = (scaled(a), scaled(b)) else {
        return 0.0;
    };

    let dot_product = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_finite() { similarity } else { 0.0 }
}

/// Append-only, brute-force cosine similarity index.
#[derive(Debug, Default)]
pub struct VectorDB {
    passages: Vec<Passage>,
    dimensions: Option<usize>,
    next_id: u64,
}

impl VectorDB {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index whose vectors must all have `dimensions` entries.
    pub fn with_dimensions(dimensions: usize) -> Self {
        VectorDB {
            dimensions: Some(dimensions),
            ..Self::default()
        }
    }

    /// Vector length enforced by this index; fixed by the first insertion
    /// unless given up front.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// Appends a passage and returns a copy of what was stored.
    pub fn add(&mut self, text: String, metadata: Metadata, vector: Vec<f64>) -> Result<Passage> {
        if text.trim().is_empty() {
            return Err(RetrievalError::EmptyPassage);
        }
        if vector.is_empty() {
            return Err(RetrievalError::EmptyVector);
        }
        match self.dimensions {
            Some(expected) if expected != vector.len() => {
                return Err(RetrievalError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => self.dimensions = Some(vector.len()),
        }

        let passage = Passage {
            id: self.next_id,
            text,
            metadata,
            vector: Array1::from(vector),
        };
        self.next_id += 1;
        self.passages.push(passage.clone());
        Ok(passage)
    }

    /// Returns up to `top_k` passages ranked by descending cosine similarity.
    /// Equal scores keep insertion order.
    pub fn search_similar(&self, query: &[f64], top_k: usize) -> Vec<SearchResult> {
        let query = ArrayView1::from(query);

        let mut similarities: Vec<(f64, &Passage)> = self
            .passages
            .iter()
            .map(|passage| (cosine_similarity(passage.vector.view(), query), passage))
            .collect();

        // sort_by is stable; scores are always finite.
        similarities.sort_by(|a, b| b.0.total_cmp(&a.0));
        similarities
            .into_iter()
            .take(top_k)
            .map(|(score, passage)| SearchResult {
                passage_id: passage.id,
                text: passage.text.clone(),
                metadata: passage.metadata.clone(),
                score,
            })
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let count = self.passages.len();
        let total_characters = self
            .passages
            .iter()
            .map(|passage| passage.text.chars().count())
            .sum();
        let average_chunk_size = if count == 0 {
            0.0
        } else {
            total_characters as f64 / count as f64
        };

        IndexStats {
            count,
            total_characters,
            average_chunk_size,
        }
    }
}
