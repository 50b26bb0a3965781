//! Constants mirrored from the original implementation's reservation and
//! path-matching rules.

/// Fixed slack reserved in a prelinked kernel's info dictionary for every
/// injected extension, independent of its actual plist size (§4.B).
pub const PRELINK_INFO_RESERVE_SIZE: u32 = 0x2000;

/// Policy cap on the total injected executable bytes for the Prelinked
/// strategy (§4.B, §8 property 4).
pub const PRELINKED_KEXTS_MAX_SIZE: u32 = 0x1000_0000;

/// Canonical kernel path the classifier must not match as `kernel` (§4.A rule 2).
pub const CANONICAL_KERNEL_PATH: &str = "System/Library/Kernels/kernel";

/// Root of the (possibly overlaid) extensions directory.
pub const EXTENSIONS_DIR: &str = "System/Library/Extensions";

/// Prefix recognized for synthetic/injected bundles inside the overlay (§4.A rule 1).
pub const INJECTED_BUNDLE_PREFIX: &str = "System/Library/Extensions/Oc";

/// Substring identifying the multi-extension archive container.
pub const MKEXT_ARCHIVE_NAME: &str = "Extensions.mkext";

/// Substrings identifying a prelinked-kernel-shaped path (§4.A rule 3).
pub const PRELINKED_NAME_HINTS: [&str; 2] = ["kernelcache", "prelinkedkernel"];

/// Substring every `kernel`-classified path must contain.
pub const KERNEL_NAME_HINT: &str = "kernel";
