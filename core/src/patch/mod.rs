//! Patch and quirk engine (§4.D, component D).

pub mod engine;
pub mod matcher;
pub mod quirks;

pub use engine::{apply_extension_patches, apply_kernel_patches, validate_patch};
pub use quirks::{active_quirks, QuirkKind, QuirkMode};
