//! Configuration file parsing
//!
//! Reads mm-ready.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::parser::ParserOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserOptions,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output format: "summary" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "summary".to_string()
}

/// How the parsed model is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Summary,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "summary" => Some(Self::Summary),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let schema = self.parser.default_schema.trim();
        if schema.is_empty() {
            return Err(ConfigError::Validation(
                "parser.default_schema must not be empty".to_string(),
            ));
        }
        if self.parser.is_excluded(schema) {
            return Err(ConfigError::Validation(format!(
                "parser.default_schema '{}' is an excluded schema",
                schema
            )));
        }
        if OutputFormat::parse(&self.output.format).is_none() {
            return Err(ConfigError::Validation(format!(
                "invalid output format '{}'. Valid values: summary, json",
                self.output.format
            )));
        }
        Ok(())
    }

    /// The configured output format. Falls back to summary for values
    /// `validate` would reject.
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::parse(&self.output.format).unwrap_or(OutputFormat::Summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Helper: parse TOML into Config and run validation.
    fn parse_and_validate(toml_str: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = parse_and_validate("").unwrap();
        assert_eq!(config.parser, ParserOptions::default());
        assert_eq!(config.parser.default_schema, "public");
        assert_eq!(config.parser.replication_schema, "spock");
        assert_eq!(config.output_format(), OutputFormat::Summary);
    }

    #[test]
    fn test_full_config() {
        let config = parse_and_validate(
            r#"
[parser]
default_schema = "app"
replication_schema = "bdr"
extra_excluded_schemas = ["audit", "staging"]

[output]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.parser.default_schema, "app");
        assert_eq!(config.parser.replication_schema, "bdr");
        assert!(config.parser.is_excluded("audit"));
        assert!(config.parser.is_excluded("bdr"));
        assert!(!config.parser.is_excluded("spock"));
        assert_eq!(config.output_format(), OutputFormat::Json);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse_and_validate("[parser]\nextra_excluded_schemas = [\"x\"]").unwrap();
        assert_eq!(config.parser.default_schema, "public");
        assert_eq!(config.parser.replication_schema, "spock");
    }

    #[test]
    fn test_empty_default_schema_rejected() {
        let err = parse_and_validate("[parser]\ndefault_schema = \"  \"").unwrap_err();
        assert!(
            err.to_string().contains("must not be empty"),
            "Expected validation error, got: {}",
            err
        );
    }

    #[test]
    fn test_excluded_default_schema_rejected() {
        let err = parse_and_validate("[parser]\ndefault_schema = \"pg_catalog\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_format_rejected() {
        let err = parse_and_validate("[output]\nformat = \"sarif\"").unwrap_err();
        assert!(
            err.to_string().contains("invalid output format"),
            "Expected validation error, got: {}",
            err
        );
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = parse_and_validate("[parser\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\nformat = \"JSON\"").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.output_format(), OutputFormat::Json);
    }

    #[test]
    fn test_from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("mm-ready.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
