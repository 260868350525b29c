use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RetrieverConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, RetrievalError};
use crate::utils::split_into_chunks;
use crate::vector_db::{IndexStats, Passage, SearchResult, VectorDB};

/// Opaque string key/value pairs attached to a document and all its passages.
pub type Metadata = HashMap<String, String>;

/// Input to [`Retriever::ingest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Document {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Chunks, embeds and indexes documents, then answers top-K queries over them.
pub struct Retriever {
    vector_db: VectorDB,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: RetrieverConfig) -> Result<Self> {
        config.validate()?;

        let vector_db = match embedder.dimensions() {
            Some(dimensions) => VectorDB::with_dimensions(dimensions),
            None => VectorDB::new(),
        };

        Ok(Retriever {
            vector_db,
            embedder,
            config,
        })
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Splits `document` into chunks and indexes each one in order.
    ///
    /// A chunk whose embedding fails is skipped and the rest still go in, so
    /// the returned passages may cover only part of the document.
    pub async fn ingest(&mut self, document: &Document) -> Result<Vec<Passage>> {
        let chunks = split_into_chunks(&document.text, self.config.max_chunk_length)?;
        let chunk_count = chunks.len();
        let mut passages = Vec::with_capacity(chunk_count);

        // One embedding at a time so ids follow chunk order.
        for (index, chunk) in chunks.into_iter().enumerate() {
            let vector = match self.embedder.embed(&chunk).await {
                Ok(vector) => vector,
                Err(e) => {
                    warn!(chunk_index = index, error = %e, "skipping chunk: embedding failed");
                    continue;
                }
            };

            match self.vector_db.add(chunk, document.metadata.clone(), vector) {
                Ok(passage) => passages.push(passage),
                Err(e @ RetrievalError::DimensionMismatch { .. }) => {
                    warn!(chunk_index = index, error = %e, "skipping chunk: bad embedding");
                }
                Err(RetrievalError::EmptyVector) => {
                    warn!(chunk_index = index, "skipping chunk: provider returned an empty vector");
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            chunk_count,
            stored = passages.len(),
            skipped = chunk_count - passages.len(),
            "ingested document"
        );

        Ok(passages)
    }

    /// Ingests each document in turn, returning every stored passage.
    pub async fn ingest_all(&mut self, documents: &[Document]) -> Result<Vec<Passage>> {
        let mut all_passages = Vec::new();
        for document in documents {
            all_passages.extend(self.ingest(document).await?);
        }
        Ok(all_passages)
    }

    /// Top-K passages for `text`, using the configured default K.
    pub async fn query(&self, text: &str) -> Result<Vec<SearchResult>> {
        self.query_top_k(text, self.config.default_k).await
    }

    pub async fn query_top_k(&self, text: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let query_vector = self.embedder.embed(text).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            match e {
                RetrievalError::EmbeddingUnavailable(message) => {
                    RetrievalError::QueryEmbeddingFailed(message)
                }
                other => RetrievalError::QueryEmbeddingFailed(other.to_string()),
            }
        })?;

        let results = self.vector_db.search_similar(&query_vector, top_k);
        debug!(top_k, result_count = results.len(), "query completed");

        Ok(results)
    }

    pub fn stats(&self) -> IndexStats {
        self.vector_db.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails on any text containing "FAIL", otherwise delegates.
    struct FlakyEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    impl FlakyEmbedder {
        fn new() -> Self {
            FlakyEmbedder {
                inner: HashingEmbedder::new(64),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                return Err(RetrievalError::EmbeddingUnavailable("upstream down".to_string()));
            }
            self.inner.embed(text).await
        }
    }

    /// Always fails.
    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f64>> {
            Err(RetrievalError::EmbeddingUnavailable("no route to host".to_string()))
        }
    }

    /// No fixed dimensions: vector length depends on the text.
    struct ShapeShiftingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShapeShiftingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f64>> {
            if text.contains("Wide") {
                Ok(vec![1.0, 0.0, 0.0])
            } else if text.contains("Empty") {
                Ok(Vec::new())
            } else {
                Ok(vec![1.0, 0.0])
            }
        }
    }

    fn config(max_chunk_length: usize, default_k: usize) -> RetrieverConfig {
        RetrieverConfig {
            max_chunk_length,
            default_k,
        }
    }

    #[tokio::test]
    async fn test_ingest_chunks_in_order_with_metadata() {
        let mut retriever =
            Retriever::new(Arc::new(HashingEmbedder::default()), config(20, 3)).unwrap();
        let doc = Document::new("A cat sat. A dog ran. A bird flew.").with_metadata("title", "pets");

        let passages = retriever.ingest(&doc).await.unwrap();

        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["A cat sat.", "A dog ran.", "A bird flew."]);
        let ids: Vec<u64> = passages.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(passages.iter().all(|p| p.metadata["title"] == "pets"));
    }

    #[tokio::test]
    async fn test_query_finds_relevant_passage() {
        let mut retriever =
            Retriever::new(Arc::new(HashingEmbedder::default()), config(40, 2)).unwrap();
        retriever
            .ingest_all(&[
                Document::new("Rust guarantees memory safety without garbage collection.")
                    .with_metadata("title", "rust"),
                Document::new("Bananas are yellow fruit rich in potassium.")
                    .with_metadata("title", "fruit"),
            ])
            .await
            .unwrap();

        let results = retriever.query("memory safety in Rust").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metadata["title"], "rust");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_query_top_k_overrides_default() {
        let mut retriever =
            Retriever::new(Arc::new(HashingEmbedder::default()), config(15, 1)).unwrap();
        retriever
            .ingest(&Document::new("Red apples. Green apples. Blue apples."))
            .await
            .unwrap();

        assert_eq!(retriever.query("apples").await.unwrap().len(), 1);
        assert_eq!(retriever.query_top_k("apples", 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ingest_skips_failed_chunks() {
        let embedder = Arc::new(FlakyEmbedder::new());
        let mut retriever = Retriever::new(embedder.clone(), config(20, 5)).unwrap();

        let passages = retriever
            .ingest(&Document::new("Good first part. This will FAIL now. Good last part."))
            .await
            .unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Good first part.", "Good last part."]);
        assert_eq!(retriever.stats().count, 2);
    }

    #[tokio::test]
    async fn test_failed_single_chunk_then_empty_query() {
        let mut retriever = Retriever::new(Arc::new(FlakyEmbedder::new()), config(100, 3)).unwrap();

        let passages = retriever.ingest(&Document::new("Everything will FAIL.")).await.unwrap();
        assert!(passages.is_empty());

        let results = retriever.query("anything at all").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_surfaced() {
        let retriever = Retriever::new(Arc::new(DownEmbedder), config(100, 3)).unwrap();
        let err = retriever.query("hello").await.unwrap_err();
        assert!(matches!(err, RetrievalError::QueryEmbeddingFailed(_)));
        assert_eq!(err.to_string(), "query embedding failed: no route to host");
    }

    #[tokio::test]
    async fn test_ingest_skips_vectors_that_break_dimensions() {
        let mut retriever = Retriever::new(Arc::new(ShapeShiftingEmbedder), config(12, 5)).unwrap();

        let passages = retriever
            .ingest(&Document::new("First one. Wide one. Empty one. Last one."))
            .await
            .unwrap();

        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["First one.", "Last one."]);
        let ids: Vec<u64> = passages.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(retriever.stats().count, 2);
    }

    #[tokio::test]
    async fn test_empty_document_ingests_nothing() {
        let mut retriever =
            Retriever::new(Arc::new(HashingEmbedder::default()), RetrieverConfig::default())
                .unwrap();
        assert!(retriever.ingest(&Document::new("   ")).await.unwrap().is_empty());
        assert_eq!(retriever.stats().count, 0);
        assert_eq!(retriever.stats().average_chunk_size, 0.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let embedder = Arc::new(HashingEmbedder::default());
        assert!(matches!(
            Retriever::new(embedder.clone(), config(0, 3)),
            Err(RetrievalError::InvalidChunkLength(0))
        ));
        assert!(matches!(
            Retriever::new(embedder, config(100, 0)),
            Err(RetrievalError::Config(_))
        ));
    }
}
