//! Embedding providers turn text into fixed-length vectors.
//!
//! The retrieval core only talks to [`EmbeddingProvider`]. Two providers ship
//! with the crate: [`HashingEmbedder`], an offline feature-hashing model, and
//! [`HttpEmbedder`], a client for an OpenAI-compatible embeddings endpoint.

use std::hash::Hasher;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, RetrievalError};

/// Converts text into a vector. Failures are reported as
/// [`RetrievalError::EmbeddingUnavailable`]; callers never get retries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;

    /// Vector length this provider produces, when known up front.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

lazy_static! {
    static ref STOP_WORDS: FxHashSet<&'static str> = {
        let words = vec![
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from",
            "has", "he", "in", "is", "it", "its", "of", "on", "that", "the",
            "to", "was", "were", "will", "with"
        ];
        words.into_iter().collect()
    };
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("valid token regex");
}

/// Normalizes, lowercases and strips punctuation, then drops stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let text = text.nfc().collect::<String>().to_lowercase();
    let text = NON_WORD.replace_all(&text, " ");

    text.split_whitespace()
        .filter(|&token| !STOP_WORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

/// Deterministic offline embedder.
///
/// Tokens are hashed into `dimensions` buckets and weighted by normalized term
/// frequency. Texts sharing vocabulary land close under cosine similarity.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 256;

    pub fn new(dimensions: usize) -> Self {
        HashingEmbedder {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = FxHasher::default();
        hasher.write(token.as_bytes());
        (hasher.finish() % self.dimensions as u64) as usize
    }

    fn embed_tokens(&self, tokens: &[String]) -> Vec<f64> {
        let mut term_freq: FxHashMap<&str, f64> = FxHashMap::default();
        for token in tokens {
            *term_freq.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let tokens_count = tokens.len() as f64;
        let mut vector = vec![0.0; self.dimensions];
        for (term, freq) in term_freq {
            vector[self.bucket(term)] += freq / tokens_count;
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(RetrievalError::EmbeddingUnavailable(
                "text has no indexable tokens".to_string(),
            ));
        }
        Ok(self.embed_tokens(&tokens))
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }
}

/// Connection settings for [`HttpEmbedder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
        }
    }
}

impl EmbedderConfig {
    /// Reads `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `EMBEDDING_MODEL`.
    /// Returns `None` when no API key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.model = model;
        }
        Some(config)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

/// Client for a hosted, OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbedderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpEmbedder { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let unavailable = |e: reqwest::Error| RetrievalError::EmbeddingUnavailable(e.to_string());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::EmbeddingUnavailable(format!(
                "embedding request returned {status}: {body}"
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(unavailable)?;
        body.data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| {
                RetrievalError::EmbeddingUnavailable("response contained no embedding".to_string())
            })
    }
}
