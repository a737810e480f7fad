//! Engine configuration
//!
//! Registry-wide defaults that schema options fall back to when they are
//! not set explicitly. Loadable from a JSON file; every field is optional.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{OdmError, OdmResult};
use crate::observability::{Logger, Severity};
use crate::schema::StrictMode;

/// Defaults applied to every schema compiled by a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OdmConfig {
    /// Handling of unknown paths on documents and updates.
    pub strict: StrictMode,
    /// Handling of unknown paths in query filters.
    pub strict_query: StrictMode,
    /// Field holding the discriminator value.
    pub discriminator_key: String,
    /// Key marking an object literal as a type declaration.
    pub type_key: String,
    /// Whether schemas get an ObjectId `_id` path automatically.
    #[serde(rename = "_id")]
    pub auto_id: bool,
    /// Aggregate update cast failures instead of failing on the first.
    pub multiple_cast_error: bool,
    /// Minimum severity of emitted log lines.
    pub log_severity: Severity,
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            strict: StrictMode::Drop,
            strict_query: StrictMode::Allow,
            discriminator_key: "__t".to_string(),
            type_key: "type".to_string(),
            auto_id: true,
            multiple_cast_error: false,
            log_severity: Severity::Warn,
        }
    }
}

impl OdmConfig {
    /// Config that rejects unknown paths everywhere.
    pub fn strict_throw() -> Self {
        Self {
            strict: StrictMode::Throw,
            strict_query: StrictMode::Throw,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> OdmResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| OdmError::Schema(format!("Invalid configuration: {}", e)))
    }

    pub fn from_file(path: &Path) -> OdmResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            OdmError::Schema(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Applies the logging threshold process-wide.
    pub fn apply_logging(&self) {
        Logger::set_min_severity(self.log_severity);
    }
}
