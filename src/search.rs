//! Similarity search over a user's library
//!
//! Loads every persisted set for the user and ranks chunks against the
//! query, either by pure cosine similarity or by a hybrid score that blends
//! cosine with a BM25 lexical score. Both components are min-max normalized
//! over the candidate set before blending, so neither scale dominates.

use crate::embedding::EmbeddingService;
use crate::error::{Error, Result};
use crate::store::VectorStore;
use crate::types::{PersistedEmbeddingSet, SearchResponse, SearchResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Hybrid blend weight for the semantic component.
const HYBRID_ALPHA: f32 = 0.7;
/// BM25 term-frequency saturation.
const BM25_K1: f32 = 1.5;
/// BM25 length normalization.
const BM25_B: f32 = 0.75;

pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Cosine,
    Hybrid,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Hybrid => "hybrid",
        }
    }

    /// Every supported algorithm, for the discovery endpoint.
    pub fn all() -> &'static [&'static str] {
        &["cosine", "hybrid"]
    }
}

impl std::str::FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// One scoreable chunk pulled out of a persisted set.
struct Candidate<'a> {
    document_id: &'a str,
    chunk_index: usize,
    source_filename: &'a str,
    text: &'a str,
    embedding: &'a [f32],
}

pub struct SearchEngine {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingService>,
}

impl SearchEngine {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { store, embedder }
    }

    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        algorithm: &str,
        limit: usize,
    ) -> Result<SearchResponse> {
        let algorithm: Algorithm = algorithm.parse()?;
        let limit = limit.clamp(1, MAX_LIMIT);
        let started = Instant::now();

        let library = self.store.load_user_library(user_id)?;
        if library.is_empty() {
            return Err(Error::EmptyLibrary(user_id.to_string()));
        }

        let (model, model_restricted) = dominant_model(&library);
        let documents_searched = library.len();

        let candidates: Vec<Candidate> = library
            .iter()
            .flat_map(|set| {
                set.embeddings
                    .iter()
                    .enumerate()
                    .filter(|(_, chunk)| chunk.embedding_model == model)
                    .map(move |(index, chunk)| Candidate {
                        document_id: &set.file_id,
                        chunk_index: index,
                        source_filename: &set.metadata.original_filename,
                        text: &chunk.text,
                        embedding: &chunk.embedding,
                    })
            })
            .collect();
        let chunks_searched = candidates.len();

        let query_vector = self
            .embedder
            .embed(&[query.to_string()], &model)
            .await
            .map_err(|e| Error::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingFailed("provider returned no vector".to_string()))?;

        let cosine_scores: Vec<f32> = candidates
            .iter()
            .map(|c| cosine_similarity(&query_vector, c.embedding))
            .collect();

        let final_scores: Vec<f32> = match algorithm {
            Algorithm::Cosine => cosine_scores,
            Algorithm::Hybrid => {
                let lexical = bm25_scores(query, &candidates);
                let semantic = normalize_scores(&cosine_scores);
                let lexical = normalize_scores(&lexical);
                semantic
                    .iter()
                    .zip(&lexical)
                    .map(|(s, l)| HYBRID_ALPHA * s + (1.0 - HYBRID_ALPHA) * l)
                    .collect()
            }
        };

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            final_scores[b]
                .partial_cmp(&final_scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| candidates[a].document_id.cmp(candidates[b].document_id))
                .then_with(|| candidates[a].chunk_index.cmp(&candidates[b].chunk_index))
        });

        let results: Vec<SearchResult> = order
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, idx)| {
                let c = &candidates[idx];
                SearchResult {
                    rank: rank + 1,
                    score: final_scores[idx],
                    text: c.text.to_string(),
                    document_id: c.document_id.to_string(),
                    chunk_index: c.chunk_index,
                    source_filename: c.source_filename.to_string(),
                }
            })
            .collect();

        debug!(
            user_id,
            algorithm = algorithm.name(),
            documents_searched,
            chunks_searched,
            returned = results.len(),
            "search complete"
        );

        Ok(SearchResponse {
            query: query.to_string(),
            algorithm: algorithm.name().to_string(),
            results,
            documents_searched,
            chunks_searched,
            took_ms: started.elapsed().as_millis() as u64,
            model_restricted,
        })
    }
}

/// The model that produced the most chunks in the library, and whether the
/// library had to be restricted to it. Ties go to the lexicographically
/// smallest identifier so repeated searches agree.
fn dominant_model(library: &[PersistedEmbeddingSet]) -> (String, Option<String>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for set in library {
        for chunk in &set.embeddings {
            *counts.entry(chunk.embedding_model.as_str()).or_default() += 1;
        }
    }

    let mixed = counts.len() > 1;
    let dominant = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(model, _)| model.to_string())
        .unwrap_or_default();

    let note = mixed.then(|| dominant.clone());
    (dominant, note)
}

/// Cosine similarity with a zero-norm guard: either zero vector scores 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Min-max normalization to [0, 1]. A flat score set maps to all ones.
fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range == 0.0 {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

fn terms_of(text: &str) -> Vec<String> {
    text.split_whitespace().map(|t| t.to_lowercase()).collect()
}

/// BM25 over the candidate chunks: document frequency is computed per
/// chunk, not per source document.
fn bm25_scores(query: &str, candidates: &[Candidate]) -> Vec<f32> {
    let query_terms = terms_of(query);
    if query_terms.is_empty() || candidates.is_empty() {
        return vec![0.0; candidates.len()];
    }

    let chunk_terms: Vec<Vec<String>> = candidates.iter().map(|c| terms_of(c.text)).collect();
    let n = chunk_terms.len() as f32;
    let avg_len = chunk_terms.iter().map(|t| t.len() as f32).sum::<f32>() / n;

    let mut df: HashMap<&str, f32> = HashMap::new();
    for terms in &chunk_terms {
        let mut seen: Vec<&str> = Vec::new();
        for term in terms {
            if query_terms.contains(term) && !seen.contains(&term.as_str()) {
                seen.push(term);
                *df.entry(term).or_default() += 1.0;
            }
        }
    }

    chunk_terms
        .iter()
        .map(|terms| {
            let len = terms.len() as f32;
            query_terms
                .iter()
                .map(|q| {
                    let tf = terms.iter().filter(|t| *t == q).count() as f32;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let df_q = df.get(q.as_str()).copied().unwrap_or(0.0);
                    let idf = (1.0 + (n - df_q + 0.5) / (df_q + 0.5)).ln();
                    idf * tf * (BM25_K1 + 1.0)
                        / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len / avg_len.max(1.0)))
                })
                .sum()
        })
        .collect()
}
