//! `Misc.Security.SecureBootModel` (§6).

use serde::{Deserialize, Deserializer};

/// Secure-boot model selection.
///
/// Only the `Disabled` vs. "anything else" distinction matters to this
/// crate: a kernel digest is captured only when the model is non-`Disabled`
/// (§3, §6). `Named` covers the real OpenCore secure-boot model strings
/// (e.g. `"j185"`), kept only so configuration documents that name one
/// deserialize instead of erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecureBootModel {
    /// No digest capture; no secure boot enforcement.
    Disabled,
    /// Follow the booting Mac's default model.
    Default,
    /// A specific named Mac model's secure boot policy.
    Named(String),
}

impl Default for SecureBootModel {
    fn default() -> Self {
        Self::Disabled
    }
}

impl SecureBootModel {
    /// Whether a kernel digest should be captured this session (§3).
    #[must_use]
    pub fn requires_digest(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl<'de> Deserialize<'de> for SecureBootModel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "Disabled" => Self::Disabled,
            "Default" => Self::Default,
            _ => Self::Named(raw),
        })
    }
}
