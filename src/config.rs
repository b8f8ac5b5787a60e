//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.climadash.toml` files.

use crate::analysis::{default_rules, default_vocabulary, KeywordRule};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".climadash.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// API connection settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Session storage.
    #[serde(default)]
    pub session: SessionConfig,

    /// Defaults for document queries.
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Defaults for temperature queries.
    #[serde(default)]
    pub temperature: TemperatureConfig,

    /// Keyword rules and scoring vocabulary.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report path. Reports go to stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Server root URL (the `/api/v1` prefix is added by the client).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries after an HTTP 503 on climate endpoints.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Fixed delay between retries, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

/// Where the login session is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> String {
    ".climadash/session.json".to_string()
}

/// Document query defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Region code sent as `admreg_exact`.
    #[serde(default = "default_region")]
    pub region: String,

    /// How many years back to query.
    #[serde(default = "default_years")]
    pub years: u32,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            region: default_region(),
            years: default_years(),
        }
    }
}

fn default_topic() -> String {
    "climate change".to_string()
}

fn default_region() -> String {
    "WLD".to_string()
}

fn default_years() -> u32 {
    5
}

/// Temperature query defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureConfig {
    /// City alias (`nyc`, `la`, `chicago`) or raw location id.
    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default = "default_datatype")]
    pub datatype: String,

    /// How many days back to query.
    #[serde(default = "default_days")]
    pub days: u32,

    #[serde(default = "default_units")]
    pub units: String,

    /// Topic of the documents scored against temperature.
    #[serde(default = "default_economic_topic")]
    pub document_topic: String,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
            datatype: default_datatype(),
            days: default_days(),
            units: default_units(),
            document_topic: default_economic_topic(),
        }
    }
}

fn default_location() -> String {
    "nyc".to_string()
}

fn default_datatype() -> String {
    "TMAX".to_string()
}

fn default_days() -> u32 {
    180
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_economic_topic() -> String {
    "climate change AND economic".to_string()
}

/// Keyword rules for yearly aggregation and the economic vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Terms whose presence makes up the economic score.
    #[serde(default = "default_vocabulary")]
    pub economic_vocabulary: Vec<String>,

    /// Keyword set -> counter rules.
    #[serde(default = "default_rules")]
    pub rules: Vec<KeywordRule>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            economic_vocabulary: default_vocabulary(),
            rules: default_rules(),
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// List documents in the yearly drilldown.
    #[serde(default = "default_true")]
    pub include_documents: bool,

    /// Maximum rows in the correlation data table.
    #[serde(default = "default_max_rows")]
    pub max_table_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_documents: true,
            max_table_rows: default_max_rows(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_rows() -> usize {
    60
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually provided. Verbosity is a command-line concern
    /// only, since logging starts before the config file is read.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }

        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }

        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MentionCounter;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.retries, 3);
        assert_eq!(config.api.retry_delay_ms, 2000);
        assert_eq!(config.documents.region, "WLD");
        assert_eq!(config.temperature.datatype, "TMAX");
        assert_eq!(config.analysis.economic_vocabulary.len(), 7);
        assert_eq!(config.analysis.rules.len(), 3);
        assert!(config.general.output.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "climate_report.md"

[api]
base_url = "https://climate.example.org"
retries = 5

[documents]
years = 3

[[analysis.rules]]
counter = "risk"
keywords = ["risk", "hazard"]

[[analysis.rules]]
counter = "mitigation"
keywords = ["resilience"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output.as_deref(), Some("climate_report.md"));
        assert_eq!(config.api.base_url, "https://climate.example.org");
        assert_eq!(config.api.retries, 5);
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.documents.years, 3);
        assert_eq!(config.documents.topic, "climate change");

        assert_eq!(config.analysis.rules.len(), 2);
        assert_eq!(config.analysis.rules[0].counter, MentionCounter::Risk);
        assert_eq!(config.analysis.rules[0].keywords, vec!["risk", "hazard"]);
        // Vocabulary keeps its default when only rules are overridden
        assert_eq!(config.analysis.economic_vocabulary.len(), 7);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[documents]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(!toml_str.contains("verbose"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.analysis.rules, default_rules());
    }

    #[test]
    fn test_merge_with_args() {
        let mut args = crate::cli::Args::try_parse_from([
            "climadash",
            "--api-url",
            "https://climate.example.org",
            "--timeout",
            "5",
            "-o",
            "out.md",
            "-v",
            "whoami",
        ])
        .unwrap();
        args.token = None;

        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(config.api.base_url, "https://climate.example.org");
        assert_eq!(config.api.timeout_seconds, 5);
        assert_eq!(config.general.output.as_deref(), Some("out.md"));

        // An older file that still sets `verbose` keeps loading
        let legacy: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert!(legacy.general.output.is_none());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("nope.toml")).is_err());
    }
}
