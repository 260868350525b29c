use std::env;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use passage_retrieval::{
    EmbedderConfig, EmbeddingProvider, HashingEmbedder, HttpEmbedder, Retriever, RetrieverConfig,
    load_text_files,
};
use tracing_subscriber::EnvFilter;

fn select_embedder() -> Result<Arc<dyn EmbeddingProvider>> {
    match EmbedderConfig::from_env() {
        Some(config) => {
            println!("Using hosted embeddings ({})", config.model);
            Ok(Arc::new(HttpEmbedder::new(config)?))
        }
        None => {
            println!("OPENAI_API_KEY not set, using local hashing embeddings");
            Ok(Arc::new(HashingEmbedder::default()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RetrieverConfig::load()?;
    let mut retriever = Retriever::new(select_embedder()?, config)?;

    // Load documents from a directory
    let docs_dir = env::args()
        .nth(1)
        .unwrap_or_else(|| "docs".to_string());

    println!("Loading documents from '{}'...", docs_dir);
    match load_text_files(&docs_dir) {
        Ok(documents) => {
            retriever.ingest_all(&documents).await?;
        }
        Err(e) => eprintln!("Warning: Failed to load documents: {}", e),
    }

    let stats = retriever.stats();
    println!(
        "Indexed {} passages ({} characters, {:.1} average). Enter your questions (Ctrl+D to exit)",
        stats.count, stats.total_characters, stats.average_chunk_size
    );

    // Interactive query loop
    loop {
        let mut query = String::new();
        print!("> ");
        std::io::stdout().flush()?;

        if std::io::stdin().read_line(&mut query)? == 0 {
            break; // EOF (Ctrl+D)
        }

        let query = query.trim();
        if query.is_empty() {
            continue;
        }

        match retriever.query(query).await {
            Ok(results) if results.is_empty() => println!("No passages indexed.\n"),
            Ok(results) => {
                for (rank, result) in results.iter().enumerate() {
                    let source = result
                        .metadata
                        .get("title")
                        .map(String::as_str)
                        .unwrap_or("unknown");
                    println!("{}. [{:.3}] ({}) {}", rank + 1, result.score, source, result.text);
                }
                println!();
            }
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }

    Ok(())
}
