use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
    #[serde(default)]
    pub markdown_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory holding raw uploaded files.
    pub fn uploads_dir(&self) -> PathBuf {
        self.uploads_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("uploads"))
    }

    /// Directory holding one rendered markdown artifact per document.
    pub fn markdown_dir(&self) -> PathBuf {
        self.markdown_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("markdown"))
    }

    /// The document index file.
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl UploadConfig {
    /// Whether `ext` (with or without a leading dot, any case) is on the allow-list.
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim().trim_start_matches('.').to_lowercase() == ext)
    }
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}
fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "txt", "docx", "md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            api_key: None,
            api_version: default_api_version(),
            deployment: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key: config value first, then the provider's env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        let var = match self.provider.as_str() {
            "azure" => "AZURE_OPENAI_API_KEY",
            "openai" => "OPENAI_API_KEY",
            _ => return None,
        };
        std::env::var(var).ok().filter(|k| !k.is_empty())
    }
}

fn default_provider() -> String {
    "mock".to_string()
}
fn default_api_version() -> String {
    "2024-02-15-preview".to_string()
}
fn default_model() -> String {
    "gpt-4".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_concurrent() -> usize {
    4
}

impl Config {
    /// A config with every default filled in, rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig {
                data_dir: data_dir.into(),
                uploads_dir: None,
                markdown_dir: None,
            },
            chunking: ChunkingConfig::default(),
            upload: UploadConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
        }
    }

    /// Check the cross-field invariants `load_config` enforces.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        if self.upload.max_file_size == 0 {
            anyhow::bail!("upload.max_file_size must be > 0");
        }
        if self.upload.allowed_extensions.is_empty() {
            anyhow::bail!("upload.allowed_extensions must not be empty");
        }

        if self.retrieval.default_max_results < 1 {
            anyhow::bail!("retrieval.default_max_results must be >= 1");
        }

        if self.llm.max_concurrent < 1 {
            anyhow::bail!("llm.max_concurrent must be >= 1");
        }
        match self.llm.provider.as_str() {
            "mock" | "openai" => {}
            "azure" => {
                if self.llm.endpoint.is_none() {
                    anyhow::bail!("llm.endpoint must be specified when provider is 'azure'");
                }
                if self.llm.deployment.is_none() {
                    anyhow::bail!("llm.deployment must be specified when provider is 'azure'");
                }
            }
            other => anyhow::bail!(
                "Unknown llm provider: '{}'. Must be mock, azure, or openai.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
