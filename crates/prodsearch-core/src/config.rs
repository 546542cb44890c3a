//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_ENGINE__URL`). `RUST_ENV` selects the environment file.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::MAX_SIZE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub url: String,
    pub index: String,
    pub username: String,
    pub password: String,
    pub timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "amazon_products".to_string(),
            username: String::new(),
            password: String::new(),
            timeout_ms: 5_000,
        }
    }
}

impl EngineSettings {
    /// Basic-auth credentials, only when both parts are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() || self.password.is_empty() {
            None
        } else {
            Some((&self.username, &self.password))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub model_dir: String,
    pub dimension: usize,
    pub min_input_chars: usize,
    pub max_input_chars: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: "~/.cache/prodsearch/all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            min_input_chars: 3,
            max_input_chars: 100_000,
            use_fake: false,
        }
    }
}

impl EmbeddingSettings {
    pub fn model_path(&self) -> PathBuf {
        expand_path(&self.model_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_size: usize,
    pub max_size: usize,
    pub num_candidates: usize,
    pub facet_size: usize,
    pub lexical_prefilter: bool,
    pub highlight_pre_tag: String,
    pub highlight_post_tag: String,
    pub range_fields: Vec<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_size: 10,
            max_size: MAX_SIZE,
            num_candidates: 100,
            facet_size: 20,
            lexical_prefilter: true,
            highlight_pre_tag: "<em>".to_string(),
            highlight_post_tag: "</em>".to_string(),
            range_fields: vec!["reviews.rating".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestSettings {
    pub field: String,
    pub default_size: usize,
}

impl Default for SuggestSettings {
    fn default() -> Self {
        Self { field: "name.completion".to_string(), default_size: 5 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub suggest: SuggestSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(Error::InvalidConfig(msg)) };
        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be > 0".into());
        }
        if self.embedding.min_input_chars >= self.embedding.max_input_chars {
            return invalid(format!(
                "embedding.min_input_chars ({}) must be below max_input_chars ({})",
                self.embedding.min_input_chars, self.embedding.max_input_chars
            ));
        }
        let s = &self.search;
        if s.default_size == 0 || s.default_size > s.max_size || s.max_size > MAX_SIZE {
            return invalid(format!(
                "search sizes must satisfy 1 <= default_size ({}) <= max_size ({}) <= {MAX_SIZE}",
                s.default_size, s.max_size
            ));
        }
        if s.num_candidates < s.max_size {
            return invalid(format!(
                "search.num_candidates ({}) must be >= max_size ({})",
                s.num_candidates, s.max_size
            ));
        }
        if self.suggest.default_size == 0 {
            return invalid("suggest.default_size must be > 0".into());
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
