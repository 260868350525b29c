use thiserror::Error;

/// Failure kinds surfaced by chunking, embedding, indexing and retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding provider could not produce a vector for a text.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The embedding provider failed while embedding a query.
    #[error("query embedding failed: {0}")]
    QueryEmbeddingFailed(String),

    /// The chunker was asked for chunks of zero characters.
    #[error("invalid chunk length {0}: must be greater than zero")]
    InvalidChunkLength(usize),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector must not be empty")]
    EmptyVector,

    #[error("passage text must not be empty")]
    EmptyPassage,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
