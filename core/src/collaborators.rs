//! Trait seams for the collaborators this crate treats as external (§1, §6):
//! the Mach-O/prelinked-kernel/mkext binary format codecs, the CPU-ID editor,
//! the architecture-preference oracle, and the secure-boot digest sink.
//!
//! None of these are reimplemented here — doing so would mean inventing a
//! kernel cache format, which §1's Non-goals forbid. Each trait is the exact
//! shape §6 lists under "Consumed"; production embedders provide real
//! implementations, and this crate's test suite provides small in-memory
//! fakes (see each pipeline module's `tests` submodule) that are obviously
//! not production code, used only to exercise the orchestration logic this
//! crate *does* own (gating, ordering, state machines, reservation
//! accounting, error propagation).

use crate::common::{Architecture, DarwinVersion};
use crate::error::CoreError;

/// Constructs the three cache-context strategies from raw container bytes
/// (§6 Consumed: "Cache contexts: init, free, ..."). Production embedders
/// wire this to the real prelinked/mkext/cacheless container implementations.
pub trait CacheContextFactory {
    fn new_prelinked(
        &self,
        kernel_bytes: Vec<u8>,
        os_version: DarwinVersion,
    ) -> Box<dyn PrelinkedCacheContext>;
    fn new_mkext(&self, archive_bytes: Vec<u8>, os_version: DarwinVersion) -> Box<dyn MkextCacheContext>;
    fn new_cacheless(&self, os_version: DarwinVersion) -> Box<dyn CachelessCacheContext>;
}

/// CPU feature flags needed by the CPU-ID editor (§3).
///
/// A bare-bones stand-in for the real SMBIOS/CPUID probe, which requires
/// running on (or convincingly emulating) the target firmware platform and
/// is out of scope here.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuInfo {
    pub family_id: u32,
    pub model: u32,
    pub stepping: u32,
    pub supports_64_bit: bool,
}

/// Edits CPUID(1) leaf data reported to the guest kernel (§4.D).
pub trait CpuIdEditor {
    /// Applies `data`/`mask` over the CPUID(1) leaf for `cpu`.
    fn apply(&mut self, cpu: CpuInfo, data: &[u8; 16], mask: &[u8; 16]);
}

/// Resolves which architecture the session should prefer (§4.C).
pub trait ArchPreferenceOracle {
    /// A command-line-style override, if one was supplied; wins over the
    /// SMBIOS-capability check when present.
    fn cmdline_preference(&self) -> Option<Architecture>;
    /// Whether the platform's SMBIOS data claims 64-bit kernel support at
    /// the given detected OS version.
    fn supports_64_bit(&self, version: DarwinVersion) -> bool;
}

/// Receives the most recently computed kernel digest for secure-boot
/// enforcement outside this crate (§3, §6).
pub trait SecureBootDigestSink {
    fn record(&mut self, digest: [u8; 48]);
}

/// Parses the embedded OS version out of a kernel image (§4.C, §6).
pub trait OsVersionParser {
    /// # Errors
    /// Returns [`CoreError::NotFound`] if no version marker is present.
    fn parse(&self, kernel_bytes: &[u8]) -> Result<DarwinVersion, CoreError>;
}

/// Outcome of the low-level "read kernel" primitive (§6): the underlying
/// fat/thin Mach-O selection and allocation, performed by an out-of-scope
/// format codec.
#[derive(Debug, Clone)]
pub struct RawKernelRead {
    pub architecture: Architecture,
    pub bytes: Vec<u8>,
    /// Logical size of the kernel payload before padding.
    pub size: usize,
    /// Total bytes allocated, including the caller's requested padding.
    pub allocated: usize,
    /// Bytes still available for injection/patching beyond `size`.
    pub reserved_full: usize,
    /// SHA-384 digest, present only when the caller requested one.
    pub digest: Option<[u8; 48]>,
}

/// Low-level kernel image reader (§6: "Read kernel primitive").
///
/// Selects the architecture slice, allocates a buffer padded by the
/// caller-supplied reservation, and optionally computes a digest. The actual
/// Mach-O fat-header parsing this implies is out of scope (§1); this crate
/// only defines and drives the interface.
pub trait RawKernelReader {
    /// # Errors
    /// Returns [`CoreError::NotFound`] if the path has no kernel at all, or
    /// [`CoreError::ArchUnavailable`] if `arch_pref` has no matching slice.
    fn read(
        &self,
        raw_bytes: &[u8],
        arch_pref: Architecture,
        reserve: usize,
        want_digest: bool,
    ) -> Result<RawKernelRead, CoreError>;
}

/// A single resolved byte-pattern substitution request, post symbolic-base
/// resolution (§4.D). `find`/`replace`/masks are always equal length here;
/// validation happens before a [`ResolvedPatch`] is constructed (see
/// `crate::patch::engine`).
#[derive(Debug, Clone)]
pub struct ResolvedPatch<'a> {
    pub find: &'a [u8],
    pub replace: &'a [u8],
    pub find_mask: Option<&'a [u8]>,
    pub replace_mask: Option<&'a [u8]>,
    pub count: u32,
    pub skip: u32,
    pub limit: u32,
}

/// Shared patch/quirk surface of the three cache-context strategies (§4.D
/// "extension mode"), factored out so `crate::patch::engine` can drive any
/// of them through one object-safe trait rather than matching on a tagged
/// enum of method names.
pub trait PatchableCache {
    /// Applies a resolved patch scoped to `identifier`'s executable inside the container.
    fn apply_patch(&mut self, identifier: &str, patch: &ResolvedPatch<'_>) -> Result<u32, CoreError>;
    /// Applies a named extension-mode quirk scoped to `identifier`.
    fn apply_quirk(&mut self, identifier: &str, quirk: &str) -> Result<(), CoreError>;
}

/// The out-of-scope "byte-pattern patcher" / "patcher context initialized
/// from that buffer" collaborator named in §1 and §6, for kernel-mode
/// patches (no cache context): init-from-buffer is implicit since every
/// method takes the buffer directly, matching this crate's buffers-as-moves
/// discipline (§5) rather than the original's stateful init/apply split.
pub trait KernelPatcher {
    /// Applies one resolved patch directly to the kernel buffer.
    fn apply_patch(&mut self, buffer: &mut [u8], patch: &ResolvedPatch<'_>) -> Result<u32, CoreError>;
    /// Applies a named kernel-mode quirk directly to the kernel buffer.
    fn apply_quirk(&mut self, buffer: &mut [u8], quirk: &str) -> Result<(), CoreError>;
}

/// Cache-context operations specific to the Prelinked strategy (§4.E, §6).
///
/// Owns the pre-linked kernel container's internal layout; this crate drives
/// it but does not parse the container format itself.
pub trait PrelinkedCacheContext: PatchableCache {
    /// # Errors
    /// Returns [`CoreError::Overflow`] if the container cannot grow enough.
    fn inject_prepare(&mut self, reserved_exe: u32, linked_expansion: u32) -> Result<(), CoreError>;
    /// # Errors
    /// Returns [`CoreError::MissingAsset`] or [`CoreError::Overflow`].
    fn inject_kext(
        &mut self,
        identifier: &str,
        bundle_path: &str,
        plist: &[u8],
        executable: Option<&[u8]>,
    ) -> Result<(), CoreError>;
    /// Neutralizes (e.g. zeroes the start routine of) the named bundle (§4.E step 4).
    fn block(&mut self, identifier: &str) -> Result<(), CoreError>;
    /// Finalizes the container, returning the complete transformed buffer.
    fn inject_complete(&mut self) -> Result<Vec<u8>, CoreError>;
    /// Current logical kernel size, updated as injection proceeds.
    fn kernel_size(&self) -> usize;
}

/// Cache-context operations specific to the Mkext strategy (§4.F, §6).
pub trait MkextCacheContext: PatchableCache {
    fn add_kext(
        &mut self,
        identifier: &str,
        bundle_path: &str,
        plist: &[u8],
        executable: Option<&[u8]>,
    ) -> Result<(), CoreError>;
    fn finalize(&mut self) -> Result<Vec<u8>, CoreError>;
}

/// One entry in a cacheless overlay's synthetic-directory listing (§4.G, §9).
#[derive(Debug, Clone)]
pub struct OverlayEntry {
    pub name: String,
    pub is_synthetic: bool,
}

/// Cache-context operations specific to the Cacheless strategy (§4.G, §6).
pub trait CachelessCacheContext: PatchableCache {
    fn add_synthetic(
        &mut self,
        identifier: &str,
        bundle_name: &str,
        plist: &[u8],
        executable: Option<&[u8]>,
    ) -> Result<(), CoreError>;
    fn add_forced_builtin(&mut self, identifier: &str, real_path: &str) -> Result<(), CoreError>;
    /// Enumerates the merged real+synthetic directory (§4.G step 6, §9).
    fn overlay_dir(&self) -> Vec<OverlayEntry>;
    /// Serves a read of `System/Library/Extensions/Oc...` from a synthetic bundle.
    fn perform_inject(&self, sub_path: &str) -> Option<Vec<u8>>;
    /// Possibly substitutes a patched version of a real child read.
    fn hook_builtin(&self, sub_path: &str, real_bytes: &[u8]) -> Option<Vec<u8>>;
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Minimal in-memory fakes for the collaborator traits above, used only
    //! by this crate's own tests to exercise the orchestration logic.
    use super::{CpuIdEditor, CpuInfo, KernelPatcher, ResolvedPatch};
    use super::{ArchPreferenceOracle};
    use crate::common::{Architecture, DarwinVersion};
    use crate::error::CoreError;

    #[derive(Default)]
    pub(crate) struct NoopCpuIdEditor {
        pub applied: Option<([u8; 16], [u8; 16])>,
    }

    impl CpuIdEditor for NoopCpuIdEditor {
        fn apply(&mut self, _cpu: CpuInfo, data: &[u8; 16], mask: &[u8; 16]) {
            self.applied = Some((*data, *mask));
        }
    }

    pub(crate) struct FixedArchOracle {
        pub cmdline: Option<Architecture>,
        pub supports_64_bit: bool,
    }

    impl ArchPreferenceOracle for FixedArchOracle {
        fn cmdline_preference(&self) -> Option<Architecture> {
            self.cmdline
        }
        fn supports_64_bit(&self, _version: DarwinVersion) -> bool {
            self.supports_64_bit
        }
    }

    /// A `KernelPatcher` that performs the real masked byte-pattern
    /// substitution from `crate::patch::matcher`. Not a stub: the matcher
    /// itself is in-scope logic, only the notion of a stateful "patcher
    /// context" construct from the original is out of scope.
    #[derive(Default)]
    pub(crate) struct InMemoryKernelPatcher {
        pub quirks_applied: Vec<String>,
    }

    impl KernelPatcher for InMemoryKernelPatcher {
        fn apply_patch(&mut self, buffer: &mut [u8], patch: &ResolvedPatch<'_>) -> Result<u32, CoreError> {
            Ok(crate::patch::matcher::apply(
                buffer,
                patch.find,
                patch.replace,
                patch.find_mask,
                patch.replace_mask,
                patch.skip,
                patch.limit,
                patch.count,
            ))
        }

        fn apply_quirk(&mut self, _buffer: &mut [u8], quirk: &str) -> Result<(), CoreError> {
            self.quirks_applied.push(quirk.to_string());
            Ok(())
        }
    }
}
