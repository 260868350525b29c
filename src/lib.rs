//! In-memory passage retrieval: sentence-aware chunking, pluggable embeddings
//! and brute-force cosine top-K search.

pub mod config;
pub mod embedding;
pub mod error;
pub mod retriever;
pub mod utils;
pub mod vector_db;

pub use config::RetrieverConfig;
pub use embedding::{EmbedderConfig, EmbeddingProvider, HashingEmbedder, HttpEmbedder};
pub use error::{Result, RetrievalError};
pub use retriever::{Document, Metadata, Retriever};
pub use utils::{load_text_files, split_into_chunks};
pub use vector_db::{IndexStats, Passage, SearchResult, VectorDB, cosine_similarity};
