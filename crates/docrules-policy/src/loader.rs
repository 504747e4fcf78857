//! Reading policy definitions from disk.

use std::path::Path;

use tracing::debug;

use crate::definition::PolicyDefinition;
use crate::error::ConfigError;
use crate::store::PolicyStore;

/// Serialization format of a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Toml,
}

impl DefinitionFormat {
    /// Pick the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedFormat`] for anything but `.json` and
    /// `.toml`.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse `input` in this format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the input does not parse.
    pub fn parse(self, input: &str) -> Result<PolicyDefinition, ConfigError> {
        match self {
            Self::Json => PolicyDefinition::from_json_str(input),
            Self::Toml => PolicyDefinition::from_toml_str(input),
        }
    }
}

/// Read and parse a definition file. The rules are not validated here; that
/// happens when the definition is loaded into a store.
///
/// # Errors
///
/// Returns [`ConfigError::Io`], [`ConfigError::UnsupportedFormat`] or
/// [`ConfigError::Parse`].
pub fn load_definition_file(path: &Path) -> Result<PolicyDefinition, ConfigError> {
    let format = DefinitionFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), ?format, "Read policy definition");
    format.parse(&content)
}

/// Read a definition file and load it into `store`.
///
/// # Errors
///
/// Any error from [`load_definition_file`] or [`PolicyStore::load_policy`].
/// The store is left unchanged on error.
pub fn reload_from_file(store: &PolicyStore, path: &Path) -> Result<(), ConfigError> {
    let definition = load_definition_file(path)?;
    store.load_policy(&definition)
}
