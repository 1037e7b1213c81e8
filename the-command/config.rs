use std::{
  collections::BTreeMap,
  fs,
  io::Error as IOError,
  path::{
    Path,
    PathBuf,
  },
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;
use toml::de::Error as TomlError;

/// What to do when a line names no registered root alias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCommandPolicy {
  /// Return the failure without telling the issuer.
  #[default]
  Ignore,
  /// Send the unknown command message.
  Report,
}

/// Manager settings, usually read from a `commands.toml`.
///
/// ```toml
/// unknown_command = "report"
/// filter_completions = true
///
/// [replacements]
/// admin = "plugin.admin"
///
/// [messages]
/// permission_denied = "Nope."
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
  pub unknown_command:    UnknownCommandPolicy,
  /// Drop suggestions that do not start with the partial token.
  pub filter_completions: bool,
  /// `%key` templates installed when the manager is created.
  pub replacements:       BTreeMap<String, String>,
  /// Message catalog overrides by key name.
  pub messages:           BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}", .path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: IOError,
  },
  #[error("bad command config: {0}")]
  BadConfig(#[from] TomlError),
}

impl ManagerConfig {
  pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(input)?)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let input = fs::read_to_string(path).map_err(|source| {
      ConfigError::Io {
        path: path.to_path_buf(),
        source,
      }
    })?;
    Self::from_toml_str(&input)
  }
}
