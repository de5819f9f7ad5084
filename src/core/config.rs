use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// Filesystem layout for the backend.
///
/// Everything lives under a single data directory which can be pinned
/// with `DOCCHAT_DATA_DIR` (tests point this at a tempdir).
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let upload_dir = data_dir.join("uploads");
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("docchat.db");
        let config_path = data_dir.join("config.toml");

        for dir in [&data_dir, &upload_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            upload_dir,
            log_dir,
            db_path,
            config_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("DOCCHAT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("data");
    }

    let base = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.local/share", home)
    });
    PathBuf::from(base).join("docchat")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint serving chat and embeddings.
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1234".to_string(),
            chat_model: "local-chat".to_string(),
            embedding_model: "local-embedding".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Qdrant REST endpoint. Empty string selects the in-process store.
    pub qdrant_url: String,
    pub dense_dim: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://127.0.0.1:6333".to_string(),
            dense_dim: 768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub dense_weight: f32,
    pub sparse_weight: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            dense_weight: 0.7,
            sparse_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub vector: VectorConfig,
    pub rag: RagConfig,
}

impl AppConfig {
    /// Load `config.toml` if present, then apply env overrides.
    pub fn load(paths: &AppPaths) -> Result<Self, RagError> {
        let mut config = if paths.config_path.exists() {
            let raw = fs::read_to_string(&paths.config_path).map_err(RagError::internal)?;
            toml::from_str(&raw)
                .map_err(|e| RagError::BadRequest(format!("invalid config.toml: {}", e)))?
        } else {
            AppConfig::default()
        };

        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(url) = env::var("DOCCHAT_LLM_URL") {
            config.llm.base_url = url;
        }
        if let Ok(url) = env::var("DOCCHAT_QDRANT_URL") {
            config.vector.qdrant_url = url;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_indexing_parameters() {
        let config = AppConfig::default();
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 50);
        assert_eq!(config.vector.dense_dim, 768);
        assert!(config.rag.dense_weight > config.rag.sparse_weight);
    }

    #[test]
    fn parses_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [rag]
            top_k = 8
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(config.rag.top_k, 8);
        assert_eq!(config.rag.chunk_size, 500);
    }
}
