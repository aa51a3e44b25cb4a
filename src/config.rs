//! The configuration surface consumed from the external settings object
//! (§6). Loading/merging settings from disk or CLI flags is out of this
//! crate's scope; this struct is the shape a caller hands in, with
//! `from_toml_str`/`to_toml_string` covering the common case of a settings
//! file serialized as TOML.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShroudError};

/// Rewriter configuration, mirroring the three independent options the
/// spec's configuration surface names.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShroudConfig {
    /// If true, apply the `EncryptAllStrings` stage.
    pub encrypt_strings: bool,
    /// If true, apply the `ImportantStrings` stage.
    pub encrypt_important_strings: bool,
    /// Upper bound on key-table length.
    pub decrypt_table_len: usize,
}

impl ShroudConfig {
    /// Parse a `ShroudConfig` from a TOML settings document using the
    /// spec's own `PascalCase` option spelling (`EncryptStrings`,
    /// `EncryptImportantStrings`, `DecryptTableLen`).
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ShroudError::InvalidConfig { message: e.to_string() })
    }

    /// Serialize this config back to a TOML settings document.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ShroudError::InvalidConfig { message: e.to_string() })
    }
}

impl Default for ShroudConfig {
    fn default() -> Self {
        ShroudConfig { encrypt_strings: false, encrypt_important_strings: false, decrypt_table_len: 32 }
    }
}
