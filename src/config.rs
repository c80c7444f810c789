//! Configuration management for the schema critic
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (flaqes.toml)
//! - Environment variables (FLAQES__*)
//!
//! ## Example config file (flaqes.toml):
//! ```toml
//! [analysis]
//! disabled_patterns = ["json_payload"]
//!
//! [analysis.thresholds]
//! soft_delete = 0.6
//!
//! [intent]
//! preset = "oltp"
//!
//! [intent.weights]
//! auditability = 0.8
//!
//! [introspection]
//! dialect = "json"
//! exclude_schemas = ["pg_catalog"]
//! ```
//!
//! The loaded [`CriticConfig`] is converted into the validated
//! [`AnalysisConfig`] the pipeline is built from.

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::analysis::PatternType;
use crate::error::ConfigurationError;
use crate::intent::Intent;

// =============================================================================
// Analysis Configuration
// =============================================================================

/// Entry configuration of the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Pattern detectors that run
    pub enabled_patterns: BTreeSet<PatternType>,

    /// Per-pattern confidence thresholds; missing entries use
    /// [`PatternType::DEFAULT_THRESHOLD`]
    pub confidence_thresholds: BTreeMap<PatternType, f64>,

    pub intent: Intent,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled_patterns: PatternType::ALL.into_iter().collect(),
            confidence_thresholds: PatternType::ALL
                .into_iter()
                .map(|p| (p, PatternType::DEFAULT_THRESHOLD))
                .collect(),
            intent: Intent::balanced(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    /// Override one threshold. Range is checked by [`AnalysisConfig::validate`].
    pub fn with_threshold(mut self, pattern: PatternType, threshold: f64) -> Self {
        self.confidence_thresholds.insert(pattern, threshold);
        self
    }

    pub fn disable(mut self, pattern: PatternType) -> Self {
        self.enabled_patterns.remove(&pattern);
        self
    }

    pub fn threshold(&self, pattern: PatternType) -> f64 {
        self.confidence_thresholds
            .get(&pattern)
            .copied()
            .unwrap_or(PatternType::DEFAULT_THRESHOLD)
    }

    /// Fail fast on out-of-range thresholds or intent weights
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (pattern, &value) in &self.confidence_thresholds {
            if value.is_nan() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::ThresholdOutOfRange {
                    pattern: pattern.to_string(),
                    value,
                });
            }
        }
        self.intent.validate()
    }
}

// =============================================================================
// File / Environment Configuration
// =============================================================================

/// Main configuration as read from files and the environment. Keys are kept
/// as plain strings here and checked in [`CriticConfig::analysis_config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriticConfig {
    #[serde(default)]
    pub analysis: AnalysisSection,

    #[serde(default)]
    pub intent: IntentSection,

    #[serde(default)]
    pub introspection: IntrospectionSection,

    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSection {
    /// Patterns to skip
    #[serde(default)]
    pub disabled_patterns: Vec<String>,

    /// Pattern name -> confidence threshold
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSection {
    /// Starting point: balanced, oltp, analytics, audit_heavy
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Priority name -> weight, applied on top of the preset
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionSection {
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// Snapshot path or connection source
    #[serde(default)]
    pub source: Option<PathBuf>,

    #[serde(default)]
    pub include_schemas: Vec<String>,

    #[serde(default)]
    pub exclude_schemas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_format")]
    pub format: OutputFormat,
}

/// Report format of the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// Default value functions
fn default_preset() -> String {
    "balanced".to_string()
}

fn default_dialect() -> String {
    "json".to_string()
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Text
}

impl Default for IntentSection {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            weights: BTreeMap::new(),
        }
    }
}

impl Default for IntrospectionSection {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            source: None,
            include_schemas: Vec::new(),
            exclude_schemas: Vec::new(),
        }
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format: default_output_format(),
        }
    }
}

impl CriticConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["flaqes.toml", ".flaqes.toml", "config/flaqes.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "flaqes", "flaqes") {
            let xdg_config = config_dir.config_dir().join("flaqes.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Load from environment variables (FLAQES__INTENT__PRESET=oltp)
        builder = builder.add_source(
            Environment::with_prefix("FLAQES")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Resolve the configured intent: preset first, then explicit weights
    pub fn intent(&self) -> Result<Intent, ConfigurationError> {
        let mut intent = Intent::preset(&self.intent.preset)
            .ok_or_else(|| ConfigurationError::UnknownPreset(self.intent.preset.clone()))?;
        for (key, &value) in &self.intent.weights {
            intent = intent.with(key.parse()?, value)?;
        }
        Ok(intent)
    }

    /// Validated pipeline configuration
    pub fn analysis_config(&self) -> Result<AnalysisConfig, ConfigurationError> {
        let mut config = AnalysisConfig::default().with_intent(self.intent()?);

        for name in &self.analysis.disabled_patterns {
            config = config.disable(name.parse()?);
        }
        for (name, &threshold) in &self.analysis.thresholds {
            config = config.with_threshold(name.parse()?, threshold);
        }

        config.validate()?;
        Ok(config)
    }
}
