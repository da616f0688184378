//! Trace configuration
//!
//! Every limit the walker, resolver and decoder apply lives here. Defaults
//! come from `frametrace-common`, and any subset can be overridden from a
//! JSON file:
//!
//! ```json
//! { "max_string_chars": 40, "legacy_double_width": true }
//! ```

use crate::domain::ConfigError;
use frametrace_common::{
    ARGS_MAX_NUM, FUNCTS_MAX_NUM, MAX_BUF_SIZE, MAX_FRAMES, MAX_FUNCTION_SIZE_BYTES,
    STRING_ARRAY_MAX_STRINGS, STRING_MAX_CHARACTERS, STRING_SCAN_LIMIT,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Limits and decoding options for one trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Table entries scanned per resolution
    pub max_functions: usize,
    /// Arguments decoded per function
    pub max_arguments: usize,
    /// Largest distance from a function start still attributed to it
    pub max_function_size: u64,
    /// Characters of a string shown before the ellipsis
    pub max_string_chars: usize,
    /// Entries of a string array shown before `, ...`
    pub max_array_entries: usize,
    /// Bytes scanned for a string's terminator
    pub string_scan_limit: usize,
    /// Capacity of a rendered line; longer lines are cut
    pub max_line_bytes: usize,
    /// Frames visited before the walk stops
    pub max_frames: usize,
    /// Decode `double` arguments as 32-bit floats
    pub legacy_double_width: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_functions: FUNCTS_MAX_NUM,
            max_arguments: ARGS_MAX_NUM,
            max_function_size: MAX_FUNCTION_SIZE_BYTES,
            max_string_chars: STRING_MAX_CHARACTERS,
            max_array_entries: STRING_ARRAY_MAX_STRINGS,
            string_scan_limit: STRING_SCAN_LIMIT,
            max_line_bytes: MAX_BUF_SIZE,
            max_frames: MAX_FRAMES,
            legacy_double_width: false,
        }
    }
}

impl TraceConfig {
    /// Load a configuration file, filling unspecified fields with defaults
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        debug!("Loaded trace configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse a configuration from JSON text
    ///
    /// # Errors
    /// Returns an error if the text is not valid JSON or fails validation
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limit combinations the decoder cannot honour
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid("max_line_bytes must be positive".to_string()));
        }
        if self.max_string_chars == 0 {
            return Err(ConfigError::Invalid("max_string_chars must be positive".to_string()));
        }
        if self.string_scan_limit <= self.max_string_chars {
            return Err(ConfigError::Invalid(format!(
                "string_scan_limit ({}) must exceed max_string_chars ({})",
                self.string_scan_limit, self.max_string_chars
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = TraceConfig::default();
        assert_eq!(config.max_arguments, 6);
        assert_eq!(config.max_string_chars, 25);
        assert_eq!(config.max_array_entries, 3);
        assert_eq!(config.max_function_size, 1 << 20);
        assert_eq!(config.max_line_bytes, 8192);
        assert!(!config.legacy_double_width);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            TraceConfig::from_json_str(r#"{"max_string_chars": 40, "legacy_double_width": true}"#)
                .unwrap();
        assert_eq!(config.max_string_chars, 40);
        assert!(config.legacy_double_width);
        assert_eq!(config.max_array_entries, 3);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(TraceConfig::from_json_str(r#"{"max_strings": 4}"#).is_err());
    }

    #[test]
    fn test_scan_limit_must_exceed_string_chars() {
        let result = TraceConfig::from_json_str(r#"{"string_scan_limit": 10}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("string_scan_limit"));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        fs::write(&path, r#"{"max_frames": 12}"#).unwrap();

        let config = TraceConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_frames, 12);
    }
}
