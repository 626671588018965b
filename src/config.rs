//! Configuration for parsing and listing generation.
//!
//! All structs implement `Default` with values suitable for ordinary
//! 32-bit images; a JSON file can override any subset of fields.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ListingError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Bounds applied while walking untrusted structures.
    pub limits: ParseLimits,
    /// Rendering options for the disassembly listing.
    pub render: RenderConfig,
    /// Disassembly driver options.
    pub disasm: DisasmConfig,
}

impl ListingConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ListingError::Config(e.to_string()))
    }
}

/// Hard caps for structure walks over untrusted input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseLimits {
    /// Maximum DLL name length in bytes (default: 256).
    pub max_name_length: usize,
    /// Maximum imported function name length in bytes (default: 512).
    pub max_function_name_length: usize,
    /// Maximum number of import descriptors before a terminator (default: 4096).
    pub max_import_descriptors: u32,
    /// Maximum thunks per imported module (default: 65536).
    pub max_thunks_per_import: u32,
    /// Maximum input file size (default: 104857600 = 100MB).
    pub max_file_size: u64,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_name_length: 256,
            max_function_name_length: 512,
            max_import_descriptors: 4096,
            max_thunks_per_import: 65536,
            max_file_size: 104857600, // 100MB
        }
    }
}

/// Listing layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Marker characters per nesting level (default: 4).
    pub indent_width: usize,
    /// Marker character (default: '-').
    pub indent_char: char,
    /// Label given to the entry point after disassembly.
    pub entry_point_label: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent_width: 4,
            indent_char: '-',
            entry_point_label: "entry_point".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisasmConfig {
    /// Add the instruction's hex bytes below its text.
    pub annotate_bytes: bool,
    /// Name indirect calls that go through import-address slots.
    pub resolve_imports: bool,
}

impl Default for DisasmConfig {
    fn default() -> Self {
        Self {
            annotate_bytes: true,
            resolve_imports: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ListingConfig::default();
        assert_eq!(config.limits.max_name_length, 256);
        assert_eq!(config.limits.max_import_descriptors, 4096);
        assert_eq!(config.render.indent_width, 4);
        assert_eq!(config.render.indent_char, '-');
        assert_eq!(config.render.entry_point_label, "entry_point");
        assert!(config.disasm.annotate_bytes);
        assert!(config.disasm.resolve_imports);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = ListingConfig::from_json_str(
            r#"{ "render": { "indent_char": "=" }, "disasm": { "annotate_bytes": false } }"#,
        )
        .unwrap();
        assert_eq!(config.render.indent_char, '=');
        assert_eq!(config.render.indent_width, 4);
        assert!(!config.disasm.annotate_bytes);
        assert_eq!(config.limits, ParseLimits::default());
    }

    #[test]
    fn test_round_trip_json() {
        let config = ListingConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(ListingConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ListingConfig::from_json_str("{ not json"),
            Err(ListingError::Config(_))
        ));
    }
}
