use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Soft upper bound on chunk length, in characters.
    pub max_chunk_length: usize,
    /// Number of passages returned by a query when no K is given.
    pub default_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_chunk_length: 500,
            default_k: 3,
        }
    }
}

impl RetrieverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_length == 0 {
            return Err(RetrievalError::InvalidChunkLength(self.max_chunk_length));
        }
        if self.default_k == 0 {
            return Err(RetrievalError::Config(
                "default_k must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Reads a JSON config file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/passage-retrieval/config.json`, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("passage-retrieval").join("config.json"))
    }

    /// Loads from [`default_path`](Self::default_path), falling back to defaults
    /// when no file is present.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        assert!(RetrieverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_file_fills_missing_fields() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_k": 7 }"#)?;

        let config = RetrieverConfig::from_file(&path)?;
        assert_eq!(config.default_k, 7);
        assert_eq!(config.max_chunk_length, 500);

        Ok(())
    }

    #[test]
    fn test_from_file_rejects_bad_values() -> Result<()> {
        let dir = tempdir()?;
        let zero = dir.path().join("zero.json");
        fs::write(&zero, r#"{ "max_chunk_length": 0 }"#)?;
        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "not json")?;

        assert!(matches!(
            RetrieverConfig::from_file(&zero),
            Err(RetrievalError::InvalidChunkLength(0))
        ));
        assert!(matches!(
            RetrieverConfig::from_file(&garbage),
            Err(RetrievalError::Config(_))
        ));
        assert!(matches!(
            RetrieverConfig::from_file(dir.path().join("missing.json")),
            Err(RetrievalError::Io(_))
        ));

        Ok(())
    }
}
