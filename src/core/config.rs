//! Runtime configuration loaded from `config.yml`. The tracker must run with
//! no configuration at all, so every field has a default and a missing or
//! unusable file falls back to [`Config::default`].

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const STORE_FILE: &str = "tsundoku-books.json";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Directory holding the persisted shelf document.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    /// `gemini`, `ollama`, or `none`.
    #[serde(default = "default_provider")]
    pub provider: String,

    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    /// May stay empty; the `GEMINI_API_KEY` environment variable is consulted
    /// as a fallback.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_provider() -> String {
    "gemini".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gemini: None,
            ollama: None,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Config {
    /// Reads `config.yml` from the working directory. A missing file is
    /// normal; an unreadable or unparseable one is logged and replaced by
    /// defaults so startup never blocks on configuration.
    pub fn load_or_default() -> Self {
        match Self::try_load(Path::new("config.yml")) {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                warn!("ignoring unusable config.yml, falling back to defaults: {e:#}");
                Config::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
        let config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("failed to parse {path:?}"))?;
        Ok(Some(config))
    }

    /// Path of the single persisted shelf document.
    pub fn store_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(STORE_FILE)
    }
}
