//! Kernel-cache interception core: the filesystem-shim logic a pre-OS boot
//! loader extension runs in front of every read-open call so it can serve a
//! patched, extension-injected kernel/cache/extensions-directory without the
//! OS loader ever noticing (§1 OVERVIEW).
//!
//! This crate owns exactly the orchestration: path classification,
//! reservation planning, patch/quirk application bookkeeping, the
//! architecture-retry and version-monotonicity state machines, the fuzzy
//! cache locator, and the top-level [`Session`] that ties them together. It
//! does not parse Mach-O/prelinked-kernel/mkext container formats itself —
//! those collaborators are named as traits in [`collaborators`] for a
//! production embedder to implement.

pub mod classify;
pub mod collaborators;
pub mod common;
pub mod config;
pub mod error;
pub mod extension;
pub mod fuzzy;
pub mod kernel_reader;
pub mod patch;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod vfile;

pub use collaborators::{
    ArchPreferenceOracle, CacheContextFactory, CachelessCacheContext, CpuIdEditor, CpuInfo,
    KernelPatcher, MkextCacheContext, OsVersionParser, PatchableCache, PrelinkedCacheContext,
    RawKernelReader, SecureBootDigestSink,
};
pub use config::Configuration;
pub use error::CoreError;
pub use session::Session;
pub use storage::{BootVolume, FsVolume, MemoryVolume};
pub use vfile::InterceptedFile;
