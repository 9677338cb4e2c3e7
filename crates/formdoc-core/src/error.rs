//! Error types for report configuration and context building

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a report configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Report directory has no `manifest.yaml`
    #[error("manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// Configuration directory named by the manifest does not exist
    #[error("configuration directory not found: {0}")]
    ConfigDirNotFound(PathBuf),

    /// A configuration file could not be read
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid YAML, or the manifest has the wrong shape
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Semantic problems found by validation
    #[error("invalid configuration:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),
}

/// Errors raised while building a report context
#[derive(Error, Debug)]
pub enum ReportError {
    /// No builder registered under this id
    #[error("unknown report builder: {0}")]
    UnknownBuilder(String),

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Inputs the builder cannot work with
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
