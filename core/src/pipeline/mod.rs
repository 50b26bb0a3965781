//! Kernel-cache pipelines (§2 components E/F/G, §9 design note "dynamic
//! dispatch over cache type").

pub mod cacheless;
pub mod mkext;
pub mod prelinked;

use crate::collaborators::{CachelessCacheContext, MkextCacheContext, PrelinkedCacheContext};

/// Tagged variant over the three mutually exclusive cache strategies (§9).
/// `Session` holds the currently-active cacheless arm, if any, to enforce
/// "at most one cacheless context exists at a time" (§3, §8 property 9).
pub enum CacheContext {
    Prelinked(Box<dyn PrelinkedCacheContext>),
    Mkext(Box<dyn MkextCacheContext>),
    Cacheless(Box<dyn CachelessCacheContext>),
}
