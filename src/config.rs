use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Weight applied to lexical (BM25) scores in the hybrid sum.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    /// Weight applied to vector similarity scores in the hybrid sum.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    /// Each retrieval path fetches `limit * overfetch_factor` candidates
    /// before merging.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_weight: default_lexical_weight(),
            vector_weight: default_vector_weight(),
            overfetch_factor: default_overfetch_factor(),
            default_limit: default_limit(),
        }
    }
}

fn default_lexical_weight() -> f64 {
    0.4
}
fn default_vector_weight() -> f64 {
    0.6
}
fn default_overfetch_factor() -> usize {
    2
}
fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"disabled"`, `"openai"`, `"ollama"`, or `"local"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Per-call embedding budget; a call past this deadline counts as
    /// failed and the operation degrades to lexical-only.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_ms() -> u64 {
    400
}
fn default_max_retries() -> u32 {
    2
}
fn default_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;
    for (name, w) in [
        ("retrieval.lexical_weight", r.lexical_weight),
        ("retrieval.vector_weight", r.vector_weight),
    ] {
        if !w.is_finite() || w < 0.0 {
            anyhow::bail!("{} must be a finite value >= 0", name);
        }
    }
    if r.overfetch_factor < 1 {
        anyhow::bail!("retrieval.overfetch_factor must be >= 1");
    }
    if r.default_limit < 1 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.timeout_ms == 0 {
            anyhow::bail!("embedding.timeout_ms must be > 0");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse("[db]\npath = \"/tmp/recall.sqlite\"\n").unwrap();
        assert_eq!(config.embedding.provider, "disabled");
        assert!((config.retrieval.lexical_weight - 0.4).abs() < 1e-12);
        assert!((config.retrieval.vector_weight - 0.6).abs() < 1e-12);
        assert_eq!(config.retrieval.overfetch_factor, 2);
        assert_eq!(config.retrieval.default_limit, 10);
        assert_eq!(config.embedding.timeout_ms, 400);
    }

    #[test]
    fn negative_weight_rejected() {
        let err = parse(
            "[db]\npath = \"/tmp/recall.sqlite\"\n[retrieval]\nlexical_weight = -0.1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("lexical_weight"));
    }

    #[test]
    fn enabled_provider_requires_model_and_dims() {
        let err = parse(
            "[db]\npath = \"/tmp/recall.sqlite\"\n[embedding]\nprovider = \"ollama\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = parse(
            "[db]\npath = \"/tmp/r.sqlite\"\n[embedding]\nprovider = \"word2vec\"\nmodel = \"m\"\ndims = 8\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }
}
