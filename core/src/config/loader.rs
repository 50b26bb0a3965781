//! Errors raised while loading and validating a [`super::Configuration`].

use thiserror::Error;

/// Failure modes for [`super::Configuration::from_json`] and
/// [`super::Configuration::from_plist`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be deserialized at all.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// The document parsed but violated a cross-field invariant (§4.J).
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
