//! Path classifier (§4.A, component A).
//!
//! Maps an incoming read path to the tag the rest of the pipeline dispatches
//! on. Rules are evaluated top-to-bottom; the first match wins.

use crate::common::constants::{
    CANONICAL_KERNEL_PATH, EXTENSIONS_DIR, INJECTED_BUNDLE_PREFIX, KERNEL_NAME_HINT,
    MKEXT_ARCHIVE_NAME, PRELINKED_NAME_HINTS,
};

/// Classification outcome for a single path (§4.A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathClass {
    /// A kernel image read, including the prelinked/mkext container names
    /// (rules 2 and 3 only distinguish *which pipeline* later; both produce
    /// this tag here).
    Kernel,
    /// `.../Extensions.mkext`.
    MkextArchive,
    /// The extensions directory itself.
    ExtensionsDir,
    /// A child path under an active cacheless overlay.
    ExtensionsChild {
        /// Path relative to the extensions directory.
        sub_path: String,
    },
    /// A synthetic/injected bundle file under an active cacheless overlay.
    InjectedBundleFile {
        /// Path relative to the extensions directory.
        sub_path: String,
    },
    /// Anything else; re-enters the passthrough wrapper (§4.I).
    Passthrough,
}

/// Classifies `path` given whether a cacheless session is currently active (§4.A, §3).
#[must_use]
pub fn classify(path: &str, cacheless_active: bool) -> PathClass {
    if cacheless_active {
        if let Some(sub_path) = path.strip_prefix(INJECTED_BUNDLE_PREFIX) {
            return PathClass::InjectedBundleFile {
                sub_path: sub_path.to_string(),
            };
        }
    }

    if path.contains(KERNEL_NAME_HINT)
        && path != CANONICAL_KERNEL_PATH
        && !path.contains(".kext/")
        && !path.contains(".im4m")
    {
        return PathClass::Kernel;
    }

    if PRELINKED_NAME_HINTS.iter().any(|hint| path.contains(hint)) {
        return PathClass::Kernel;
    }

    if path.contains(MKEXT_ARCHIVE_NAME) {
        return PathClass::MkextArchive;
    }

    if path == EXTENSIONS_DIR {
        return PathClass::ExtensionsDir;
    }

    if cacheless_active {
        if let Some(sub_path) = path.strip_prefix(&format!("{EXTENSIONS_DIR}/")) {
            return PathClass::ExtensionsChild {
                sub_path: sub_path.to_string(),
            };
        }
    }

    PathClass::Passthrough
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_kernel_path_is_not_kernel_class() {
        assert_eq!(classify(CANONICAL_KERNEL_PATH, false), PathClass::Passthrough);
    }

    #[test]
    fn kernel_substring_matches() {
        assert_eq!(classify("System/Library/Kernels/kernel.debug", false), PathClass::Kernel);
    }

    #[test]
    fn kext_contents_are_not_kernel_class() {
        assert_eq!(
            classify("System/Library/Extensions/Foo.kext/Contents/kernel", false),
            PathClass::Passthrough
        );
    }

    #[test]
    fn prelinked_names_classify_as_kernel() {
        assert_eq!(
            classify(
                "System/Library/Caches/com.apple.kext.caches/Startup/kernelcache",
                false
            ),
            PathClass::Kernel
        );
        assert_eq!(classify("prelinkedkernel", false), PathClass::Kernel);
    }

    #[test]
    fn mkext_archive_classifies() {
        assert_eq!(
            classify("System/Library/Extensions.mkext", false),
            PathClass::MkextArchive
        );
    }

    #[test]
    fn extensions_dir_requires_active_gate_for_children() {
        assert_eq!(classify(EXTENSIONS_DIR, false), PathClass::ExtensionsDir);
        assert_eq!(
            classify("System/Library/Extensions/Foo.kext", false),
            PathClass::Passthrough
        );
        assert_eq!(
            classify("System/Library/Extensions/Foo.kext", true),
            PathClass::ExtensionsChild {
                sub_path: "Foo.kext".to_string()
            }
        );
    }

    #[test]
    fn injected_bundle_hook_requires_active_gate() {
        assert_eq!(
            classify("System/Library/Extensions/OcA.kext/Contents/Info.plist", false),
            PathClass::Passthrough
        );
        assert_eq!(
            classify("System/Library/Extensions/OcA.kext/Contents/Info.plist", true),
            PathClass::InjectedBundleFile {
                sub_path: "A.kext/Contents/Info.plist".to_string()
            }
        );
    }

    #[test]
    fn everything_else_passes_through() {
        assert_eq!(classify("EFI/BOOT/BOOTX64.efi", false), PathClass::Passthrough);
    }
}
