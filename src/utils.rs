use std::fs::{self, DirBuilder};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, RetrievalError};
use crate::retriever::{Document, Metadata};

lazy_static! {
    // Sentence-terminal punctuation followed by whitespace.
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]\s+").expect("valid sentence regex");
}

/// Creates a directory if it doesn't exist
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .create(path)?;
    Ok(())
}

/// Splits text into sentences, keeping the terminal punctuation with each one.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        // The punctuation mark is a single ASCII byte.
        let sentence = text[start..m.start() + 1].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}

/// Splits text into chunks of at most `max_chars` characters at sentence boundaries.
///
/// Sentences are joined with a single space. A sentence longer than `max_chars`
/// becomes a chunk of its own and is never truncated.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Result<Vec<String>> {
    if max_chars == 0 {
        return Err(RetrievalError::InvalidChunkLength(max_chars));
    }

    let mut chunks = Vec::new();
    let mut current_chunk = String::new();
    let mut current_length = 0;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        if !current_chunk.is_empty() && current_length + 1 + sentence_len > max_chars {
            chunks.push(current_chunk.trim().to_string());
            current_chunk.clear();
            current_length = 0;
        }

        if !current_chunk.is_empty() {
            current_chunk.push(' ');
            current_length += 1;
        }
        current_chunk.push_str(sentence);
        current_length += sentence_len;
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    Ok(chunks)
}

/// Loads all `.txt` files under a directory recursively, in path order.
///
/// Each file becomes a [`Document`] carrying `source` (the path) and `title`
/// (the file stem) metadata. A missing directory is created and yields nothing.
pub fn load_text_files(dir_path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let mut paths = Vec::new();

    if !dir_path.as_ref().exists() {
        ensure_dir(&dir_path)?;
        return Ok(Vec::new());
    }

    collect_text_paths(dir_path.as_ref(), &mut paths)?;
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path)?;
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), path.display().to_string());
        if let Some(stem) = path.file_stem() {
            metadata.insert("title".to_string(), stem.to_string_lossy().into_owned());
        }
        documents.push(Document { text, metadata });
    }

    Ok(documents)
}

fn collect_text_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_file() {
            if path.extension().is_some_and(|ext| ext == "txt") {
                paths.push(path);
            }
        } else if path.is_dir() {
            collect_text_paths(&path, paths)?;
        }
    }
    Ok(())
}
