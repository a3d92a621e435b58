//! TOML configuration.
//!
//! Every section is optional; a missing file or section falls back to the
//! defaults below, so `pdfctx ask` works out of the box against `./docs`
//! and a local Ollama.
//!
//! ```toml
//! [source]
//! folder = "docs"
//! include_globs = ["**/*.pdf"]
//!
//! [metadata]
//! path = "metadata.json"
//!
//! [index]
//! backend = "sqlite"
//! path = "data/index.sqlite"
//!
//! [retrieval]
//! top_k = 3
//!
//! [chat]
//! provider = "ollama"
//! model = "llama3:latest"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub metadata: MetadataConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub folder: PathBuf,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    /// Descend into subfolders. Off by default: only the folder's own
    /// entries are listed.
    pub recursive: bool,
    pub follow_symlinks: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("docs"),
            include_globs: vec!["**/*.pdf".to_string()],
            exclude_globs: Vec::new(),
            recursive: false,
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetadataConfig {
    pub path: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("metadata.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// `"sqlite"` (persistent) or `"memory"` (lives for one process).
    pub backend: String,
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: PathBuf::from("data/index.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: Option<String>,
    pub dims: Option<usize>,
    pub url: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "The following is relevant information retrieved from the documents. \
Answer the user's question focusing on this context:";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub provider: String,
    pub model: String,
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3:latest".to_string(),
            url: None,
            timeout_secs: 120,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ChatConfig {
    pub fn base_url(&self) -> &str {
        match (self.url.as_deref(), self.provider.as_str()) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, "openai") => "https://api.openai.com",
            (None, _) => "http://localhost:11434",
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if given, otherwise run on defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.source.include_globs.is_empty() {
        bail!("source.include_globs must not be empty");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    match config.index.backend.as_str() {
        "sqlite" | "memory" => {}
        other => bail!("Unknown index backend: '{}'. Must be sqlite or memory.", other),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
    }

    match config.chat.provider.as_str() {
        "ollama" | "openai" => {}
        other => bail!(
            "Unknown chat provider: '{}'. Must be ollama or openai.",
            other
        ),
    }

    if config.chat.model.trim().is_empty() {
        bail!("chat.model must not be empty");
    }

    Ok(())
}
