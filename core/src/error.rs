//! Error taxonomy for the interception core (§7).
//!
//! Every fallible entry point returns `CoreError`. The variants are the
//! kinds enumerated in §7; propagation rules (skip-and-continue vs.
//! tear-down-and-return) are implemented by the callers, not by this type.

use thiserror::Error;

/// Errors produced anywhere in the interception pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Path absent, or deliberately rejected by a downgrade gate (§6).
    #[error("not found: {0}")]
    NotFound(String),

    /// OS version regressed relative to the session's recorded version (§4.C).
    #[error("invalid cache: detected version {detected} is older than session version {session}")]
    InvalidCache {
        /// Version parsed from the newly read kernel.
        detected: u32,
        /// Version already recorded on the session.
        session: u32,
    },

    /// Planned reservation or size arithmetic exceeded the word width or a
    /// policy cap (§4.B, §8 property 4).
    #[error("reservation overflow: {0}")]
    Overflow(String),

    /// A plist or executable referenced by an enabled entry could not be read (§4.B).
    #[error("missing asset for '{identifier}': {detail}")]
    MissingAsset {
        /// Identifier of the extension entry that failed to load.
        identifier: String,
        /// Human-readable detail (I/O error, path too long, ...).
        detail: String,
    },

    /// A patch entry violated the size-consistency constraints of §4.D / §8 property 5.
    #[error("borked patch: {0}")]
    BorkedPatch(String),

    /// The required architecture was not available after the single retry
    /// permitted by §4.C / §9.
    #[error("architecture unavailable")]
    ArchUnavailable,

    /// Allocation failed while building a transformed buffer.
    #[error("out of memory")]
    OutOfMemory,

    /// An error from the underlying reader that this taxonomy does not
    /// otherwise classify (§7).
    #[error("passthrough error: {0}")]
    Passthrough(#[from] std::io::Error),
}

impl CoreError {
    /// True for the two kinds a fuzzy-locator retry loop should treat as
    /// "try the next candidate" (§9, open question 2).
    #[must_use]
    pub fn is_retryable_by_fuzzy_locator(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidCache { .. })
    }
}
