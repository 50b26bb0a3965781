//! Common types shared across the interception pipeline.
//!
//! This module provides the small vocabulary of value types every other module
//! builds on:
//! 1. **Version:** a packed Darwin kernel version and the release boundaries
//!    the downgrade gates (§6) compare against.
//! 2. **Architecture:** the 32/64-bit preference and its once-per-session retry
//!    state machine.
//! 3. **Constants:** size-reservation and path-matching constants mirrored from
//!    the original implementation.

pub mod arch;
pub mod constants;
pub mod version;

pub use arch::{Architecture, ArchPreference};
pub use version::DarwinVersion;
