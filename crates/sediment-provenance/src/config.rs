//! Layer options
//!
//! Loaded from a TOML file such as:
//!
//! ```toml
//! layer_name = "ext-1"
//! runtime_class_loading = true
//! max_vtable_index = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default maximum vtable slot count pre-stubbed for runtime-loaded classes
pub const DEFAULT_MAX_VTABLE_INDEX: u32 = 0x100;

/// Upper bound accepted for `max_vtable_index`
pub const MAX_VTABLE_INDEX_LIMIT: u32 = 0x10000;

/// Options for writing one layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerOptions {
    /// Name stored in the layer snapshot
    pub layer_name: String,

    /// Whether classes unknown at build time may be loaded at run time
    pub runtime_class_loading: bool,

    /// Number of vtable slots to pre-stub
    pub max_vtable_index: u32,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            layer_name: "base".to_string(),
            runtime_class_loading: false,
            max_vtable_index: DEFAULT_MAX_VTABLE_INDEX,
        }
    }
}

impl LayerOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let options: LayerOptions = toml::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate option values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layer_name.is_empty() {
            return Err(ConfigError::Invalid("layer_name cannot be empty".to_string()));
        }

        if self.max_vtable_index == 0 || self.max_vtable_index > MAX_VTABLE_INDEX_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_vtable_index must be between 1 and {}, got {}",
                MAX_VTABLE_INDEX_LIMIT, self.max_vtable_index
            )));
        }

        Ok(())
    }
}

/// Errors that can occur while loading layer options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Invalid option value
    #[error("Invalid layer options: {0}")]
    Invalid(String),
}
