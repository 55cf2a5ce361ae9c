use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{ProjectId, SectionPrefix, UserId};

/// Configuration for a requirements workspace.
///
/// Holds the defaults the application boundary needs to drive the library:
/// which prefix to fall back on, where the document snapshot lives, and which
/// project and user to act as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Prefix for root paths when neither the project nor the node names one.
    default_prefix: SectionPrefix,

    /// Snapshot file, relative to the workspace data directory.
    store_file: PathBuf,

    /// The project commands operate on.
    pub project: Option<ProjectId>,

    /// The acting user.
    pub user: Option<UserId>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_prefix: SectionPrefix::default(),
            store_file: default_store_file(),
            project: None,
            user: None,
        }
    }
}

/// Errors that can occur while reading or writing a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        /// The config file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file is not valid configuration TOML.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The prefix used for root paths when nothing more specific applies.
    #[must_use]
    pub const fn default_prefix(&self) -> &SectionPrefix {
        &self.default_prefix
    }

    /// Replaces the default prefix.
    pub fn set_default_prefix(&mut self, prefix: SectionPrefix) {
        self.default_prefix = prefix;
    }

    /// The snapshot file, relative to the workspace data directory.
    #[must_use]
    pub fn store_file(&self) -> &Path {
        &self.store_file
    }
}

fn default_store_file() -> PathBuf {
    PathBuf::from("requirements.json")
}

/// The serialized versions of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        default_prefix: SectionPrefix,

        #[serde(default = "default_store_file")]
        store_file: PathBuf,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<ProjectId>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<UserId>,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                default_prefix,
                store_file,
                project,
                user,
            } => Self {
                default_prefix,
                store_file,
                project,
                user,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            default_prefix: config.default_prefix,
            store_file: config.store_file,
            project: config.project,
            user: config.user,
        }
    }
}
