//! Configuration loading and validation (§4.J, §6).
//!
//! `Configuration` is the read-only, nested structure the rest of the crate
//! borrows for the lifetime of a session. It deserializes from either the
//! property-list document the surrounding firmware extension actually ships
//! (via the `plist` crate) or JSON (convenient for tests and the demo CLI),
//! and then runs the handful of cross-field checks `serde` itself cannot
//! express.

mod kernel;
mod loader;
mod security;

pub use kernel::{
    AddEntry, BlockEntry, EmulateConfig, ForceEntry, KernelCacheType, KernelConfig, PatchEntry,
    PatchTarget, Quirks, SchemeConfig,
};
pub use loader::ConfigError;
pub use security::SecureBootModel;

use serde::Deserialize;

/// Root configuration consulted by the core (§6).
///
/// Only the `Kernel.*` and `Misc.Security.SecureBootModel` sections this
/// crate reads are modeled; the surrounding extension's full schema (ACPI,
/// UEFI driver order, ...) is out of scope (§4.J).
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    /// `Kernel.*` section.
    #[serde(default)]
    pub kernel: KernelConfig,
    /// `Misc.Security.*` section.
    #[serde(default)]
    pub misc: MiscConfig,
}

/// `Misc.*` section; only `Security.SecureBootModel` is consumed here.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MiscConfig {
    /// `Misc.Security.*` fields.
    #[serde(default)]
    pub security: SecurityConfig,
}

/// `Misc.Security.*` fields consumed by this core.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Gates whether a kernel digest is captured for the secure-boot sink (§3, §6).
    #[serde(default)]
    pub secure_boot_model: SecureBootModel,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secure_boot_model: SecureBootModel::Disabled,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            kernel: KernelConfig::default(),
            misc: MiscConfig::default(),
        }
    }
}

impl Configuration {
    /// Parses and validates a configuration from a JSON document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed JSON and
    /// [`ConfigError::Invalid`] when a cross-field check in [`Self::validate`] fails.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration from a binary or XML property list.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed plist data and
    /// [`ConfigError::Invalid`] when a cross-field check in [`Self::validate`] fails.
    pub fn from_plist(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self =
            plist::from_bytes(bytes).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants `serde` cannot express on its own
    /// (§4.J): non-empty identifiers, and `MinKernel <= MaxKernel` for every
    /// version-gated list entry.
    ///
    /// Malformed individual patches (find/replace/mask length mismatches)
    /// are intentionally *not* rejected here — per the original behavior,
    /// those are validated lazily at apply time and skipped with a warning
    /// (§4.D), not treated as a fatal configuration error.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first offending entry found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for force in &self.kernel.force {
            validate_identifier(&force.identifier)?;
            validate_range(force.min_kernel, force.max_kernel, &force.identifier)?;
        }
        for add in &self.kernel.add {
            validate_identifier(&add.identifier)?;
            validate_range(add.min_kernel, add.max_kernel, &add.identifier)?;
        }
        for block in &self.kernel.block {
            validate_identifier(&block.identifier)?;
            validate_range(block.min_kernel, block.max_kernel, &block.identifier)?;
        }
        for patch in &self.kernel.patch {
            validate_range(patch.min_kernel, patch.max_kernel, &patch.comment)?;
        }
        Ok(())
    }
}

fn validate_identifier(identifier: &str) -> Result<(), ConfigError> {
    if identifier.trim().is_empty() {
        return Err(ConfigError::Invalid("empty identifier".to_string()));
    }
    Ok(())
}

fn validate_range(
    min: crate::common::DarwinVersion,
    max: crate::common::DarwinVersion,
    context: &str,
) -> Result<(), ConfigError> {
    if !min.is_unset() && !max.is_unset() && min > max {
        return Err(ConfigError::Invalid(format!(
            "'{context}': MinKernel ({min}) > MaxKernel ({max})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_json() {
        let config = Configuration::from_json("{}").expect("defaults should validate");
        assert_eq!(config.kernel.scheme.kernel_cache, KernelCacheType::Prelinked);
        assert!(!config.kernel.scheme.fuzzy_match);
        assert_eq!(config.misc.security.secure_boot_model, SecureBootModel::Disabled);
    }

    #[test]
    fn rejects_inverted_version_range() {
        let json = r#"{
            "kernel": { "add": [ { "identifier": "com.x.A", "bundle_path": "A.kext",
                "min_kernel": 18, "max_kernel": 10 } ] }
        }"#;
        let err = Configuration::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_empty_identifier() {
        let json = r#"{
            "kernel": { "add": [ { "identifier": "", "bundle_path": "A.kext" } ] }
        }"#;
        let err = Configuration::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
