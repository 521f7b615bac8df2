//! Configuration file support for qbank-pdf
//!
//! Supports TOML configuration files with the following search order:
//! 1. `--config <path>` - explicitly specified path
//! 2. `./qbank.toml` - current directory
//! 3. `~/.config/qbank-pdf/config.toml` - user config
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [sources]
//! questions = "alls/questions"
//! excluded_questions = "excludeds/questions"
//!
//! [store]
//! questions = "all-q-parsed.csv"
//!
//! [selection]
//! shuffle = true
//! seed = 42
//!
//! [answer_key]
//! font_size = 12.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::selection::{SelectionError, TierProbabilities};
use crate::PipelineConfig;

/// Local config file name
pub const CONFIG_FILE_NAME: &str = "qbank.toml";

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// File not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// `[selection]` probabilities that do not form a distribution
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Source document directories
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourcesConfig {
    #[serde(default)]
    pub questions: Option<PathBuf>,

    #[serde(default)]
    pub excluded_questions: Option<PathBuf>,

    #[serde(default)]
    pub answers: Option<PathBuf>,

    #[serde(default)]
    pub excluded_answers: Option<PathBuf>,
}

/// Record store and manifest locations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Question store CSV
    #[serde(default)]
    pub questions: Option<PathBuf>,

    /// Answer store CSV
    #[serde(default)]
    pub answers: Option<PathBuf>,

    #[serde(default)]
    pub question_manifest: Option<PathBuf>,

    #[serde(default)]
    pub answer_manifest: Option<PathBuf>,
}

/// Question-set selection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectionConfig {
    /// Shuffle assembled sets
    #[serde(default)]
    pub shuffle: Option<bool>,

    /// RNG seed
    #[serde(default)]
    pub seed: Option<u64>,

    /// Tier probabilities; all three switch selection to proportion mode
    #[serde(default)]
    pub easy: Option<f64>,

    #[serde(default)]
    pub medium: Option<f64>,

    #[serde(default)]
    pub hard: Option<f64>,
}

impl SelectionConfig {
    /// Tier probabilities when all three are set
    pub fn probabilities(&self) -> Result<Option<TierProbabilities>, ConfigError> {
        match (self.easy, self.medium, self.hard) {
            (Some(easy), Some(medium), Some(hard)) => {
                Ok(Some(TierProbabilities::new(easy, medium, hard)?))
            }
            (None, None, None) => Ok(None),
            _ => {
                tracing::warn!("[selection] needs all of easy, medium and hard; probabilities ignored");
                Ok(None)
            }
        }
    }
}

/// Answer key page settings (points)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnswerKeyConfig {
    #[serde(default)]
    pub page_width: Option<f32>,

    #[serde(default)]
    pub page_height: Option<f32>,

    #[serde(default)]
    pub margin: Option<f32>,

    #[serde(default)]
    pub font_size: Option<f32>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub answer_key: AnswerKeyConfig,
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default search path
    ///
    /// Search order:
    /// 1. `./qbank.toml`
    /// 2. `~/.config/qbank-pdf/config.toml`
    /// 3. Default values (if no file found)
    pub fn load() -> Result<Self, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::load_from_path(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Convert to PipelineConfig
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut config = PipelineConfig::default();

        let sources = &self.sources;
        if let Some(dir) = &sources.questions {
            config.question_dir = dir.clone();
        }
        if let Some(dir) = &sources.excluded_questions {
            config.excluded_question_dir = dir.clone();
        }
        if let Some(dir) = &sources.answers {
            config.answer_dir = dir.clone();
        }
        if let Some(dir) = &sources.excluded_answers {
            config.excluded_answer_dir = dir.clone();
        }

        let store = &self.store;
        if let Some(path) = &store.questions {
            config.question_store = path.clone();
        }
        if let Some(path) = &store.answers {
            config.answer_store = path.clone();
        }
        if let Some(path) = &store.question_manifest {
            config.question_manifest = path.clone();
        }
        if let Some(path) = &store.answer_manifest {
            config.answer_manifest = path.clone();
        }

        if let Some(shuffle) = self.selection.shuffle {
            config = config.with_shuffle(shuffle);
        }
        if let Some(seed) = self.selection.seed {
            config = config.with_seed(Some(seed));
        }
        if let Some(probs) = self.selection.probabilities()? {
            config = config.with_probabilities(Some(probs));
        }

        let key = &self.answer_key;
        let options = &mut config.answer_key;
        if let Some(width) = key.page_width {
            options.page_width = width;
        }
        if let Some(height) = key.page_height {
            options.page_height = height;
        }
        if let Some(margin) = key.margin {
            options.margin = margin;
        }
        if let Some(size) = key.font_size {
            options.font_size = size;
        }

        Ok(config)
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&self, cli: &CliOverrides) -> Result<PipelineConfig, ConfigError> {
        let mut config = self.to_pipeline_config()?;

        if let Some(path) = &cli.question_store {
            config.question_store = path.clone();
        }
        if let Some(path) = &cli.answer_store {
            config.answer_store = path.clone();
        }
        if let Some(shuffle) = cli.shuffle {
            config = config.with_shuffle(shuffle);
        }
        if let Some(seed) = cli.seed {
            config = config.with_seed(Some(seed));
        }
        if let Some(probs) = cli.probabilities {
            probs.validate()?;
            config = config.with_probabilities(Some(probs));
        }

        Ok(config)
    }

    /// Get config file search paths
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("qbank-pdf").join("config.toml"));
        }

        paths
    }
}

/// CLI override values for merging with config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub question_store: Option<PathBuf>,
    pub answer_store: Option<PathBuf>,
    pub shuffle: Option<bool>,
    pub seed: Option<u64>,
    pub probabilities: Option<TierProbabilities>,
}

impl CliOverrides {
    /// Create new empty overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Set question store override
    pub fn with_question_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.question_store = Some(path.into());
        self
    }

    /// Set answer store override
    pub fn with_answer_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.answer_store = Some(path.into());
        self
    }

    /// Set shuffle override
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = Some(shuffle);
        self
    }

    /// Set seed override
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set tier probability override
    pub fn with_probabilities(mut self, probabilities: TierProbabilities) -> Self {
        self.probabilities = Some(probabilities);
        self
    }
}
