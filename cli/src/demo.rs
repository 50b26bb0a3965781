//! Stand-in collaborator implementations for the demonstration harness.
//!
//! None of these parse a real Mach-O, prelinked-kernel, or mkext container —
//! that knowledge is exactly what `bootcache-core` treats as external (see
//! `bootcache_core::collaborators`). These exist only so `intercept-cli` has
//! something concrete to drive the core's orchestration with; they are not
//! part of the tested library surface and a production embedder replaces
//! every one of them.

use log::info;

use bootcache_core::collaborators::{
    ArchPreferenceOracle, CacheContextFactory, CachelessCacheContext, CpuIdEditor, CpuInfo,
    KernelPatcher, MkextCacheContext, OsVersionParser, OverlayEntry, PatchableCache,
    PrelinkedCacheContext, RawKernelRead, RawKernelReader, ResolvedPatch, SecureBootDigestSink,
};
use bootcache_core::common::{Architecture, DarwinVersion};
use bootcache_core::error::CoreError;
use bootcache_core::patch::matcher;

/// Returns the raw bytes unchanged, padded by the requested reservation, in
/// whatever architecture was asked for (no fat-Mach-O slice selection).
#[derive(Debug)]
pub struct FixedVersionKernelReader;

impl RawKernelReader for FixedVersionKernelReader {
    fn read(
        &self,
        raw_bytes: &[u8],
        arch_pref: Architecture,
        reserve: usize,
        want_digest: bool,
    ) -> Result<RawKernelRead, CoreError> {
        Ok(RawKernelRead {
            architecture: arch_pref,
            bytes: raw_bytes.to_vec(),
            size: raw_bytes.len(),
            allocated: raw_bytes.len() + reserve,
            reserved_full: reserve,
            digest: want_digest.then_some([0u8; 48]),
        })
    }
}

/// Always reports the version given on the command line.
#[derive(Debug)]
pub struct FixedVersionParser(pub DarwinVersion);

impl OsVersionParser for FixedVersionParser {
    fn parse(&self, _kernel_bytes: &[u8]) -> Result<DarwinVersion, CoreError> {
        Ok(self.0)
    }
}

/// Always prefers 64-bit, never supplies a command-line override.
#[derive(Debug)]
pub struct AlwaysSixtyFourBitOracle;

impl ArchPreferenceOracle for AlwaysSixtyFourBitOracle {
    fn cmdline_preference(&self) -> Option<Architecture> {
        None
    }

    fn supports_64_bit(&self, _version: DarwinVersion) -> bool {
        true
    }
}

/// Logs the digest instead of forwarding it to a secure-boot enforcement path.
#[derive(Debug)]
pub struct NoopDigestSink;

impl SecureBootDigestSink for NoopDigestSink {
    fn record(&mut self, digest: [u8; 48]) {
        info!("kernel digest captured: {} bytes", digest.len());
    }
}

/// Logs CPUID(1) edits instead of applying them to a real guest CPU state.
#[derive(Debug)]
pub struct NoopCpuIdEditor;

impl CpuIdEditor for NoopCpuIdEditor {
    fn apply(&mut self, _cpu: CpuInfo, data: &[u8; 16], _mask: &[u8; 16]) {
        info!("cpuid(1) override requested: {data:02x?}");
    }
}

/// Runs the real masked byte-pattern matcher directly on the kernel buffer;
/// named quirks are only logged since their byte patterns are proprietary.
#[derive(Debug, Default)]
pub struct TracingKernelPatcher;

impl KernelPatcher for TracingKernelPatcher {
    fn apply_patch(&mut self, buffer: &mut [u8], patch: &ResolvedPatch<'_>) -> Result<u32, CoreError> {
        Ok(matcher::apply(
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
        info!("kernel quirk '{quirk}' requested (not applied: no real kernel layout here)");
        Ok(())
    }
}

/// A container stand-in that just concatenates bytes and logs what would
/// have happened to a real prelinked/mkext/cacheless container.
#[derive(Debug, Default)]
struct TracingContainer {
    buffer: Vec<u8>,
    injected: Vec<String>,
    blocked: Vec<String>,
}

impl PatchableCache for TracingContainer {
    fn apply_patch(&mut self, identifier: &str, patch: &ResolvedPatch<'_>) -> Result<u32, CoreError> {
        let applied = matcher::apply(
            &mut self.buffer,
            patch.find,
            patch.replace,
            patch.find_mask,
            patch.replace_mask,
            patch.skip,
            patch.limit,
            patch.count,
        );
        info!("'{identifier}': {applied} substitution(s) applied to the demo container buffer");
        Ok(applied)
    }

    fn apply_quirk(&mut self, identifier: &str, quirk: &str) -> Result<(), CoreError> {
        info!("extension quirk '{quirk}' requested for '{identifier}' (not applied)");
        Ok(())
    }
}

impl PrelinkedCacheContext for TracingContainer {
    fn inject_prepare(&mut self, reserved_exe: u32, linked_expansion: u32) -> Result<(), CoreError> {
        info!("prelinked: reserving {reserved_exe} bytes (+{linked_expansion} fixup expansion)");
        Ok(())
    }

    fn inject_kext(
        &mut self,
        identifier: &str,
        bundle_path: &str,
        plist: &[u8],
        executable: Option<&[u8]>,
    ) -> Result<(), CoreError> {
        info!("prelinked: injecting '{identifier}' at '{bundle_path}' ({} plist bytes)", plist.len());
        if let Some(exe) = executable {
            self.buffer.extend_from_slice(exe);
        }
        self.injected.push(identifier.to_string());
        Ok(())
    }

    fn block(&mut self, identifier: &str) -> Result<(), CoreError> {
        info!("prelinked: blocking '{identifier}'");
        self.blocked.push(identifier.to_string());
        Ok(())
    }

    fn inject_complete(&mut self) -> Result<Vec<u8>, CoreError> {
        Ok(self.buffer.clone())
    }

    fn kernel_size(&self) -> usize {
        self.buffer.len()
    }
}

impl MkextCacheContext for TracingContainer {
    fn add_kext(
        &mut self,
        identifier: &str,
        bundle_path: &str,
        plist: &[u8],
        executable: Option<&[u8]>,
    ) -> Result<(), CoreError> {
        info!("mkext: adding '{identifier}' at '{bundle_path}' ({} plist bytes)", plist.len());
        if let Some(exe) = executable {
            self.buffer.extend_from_slice(exe);
        }
        self.injected.push(identifier.to_string());
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>, CoreError> {
        Ok(self.buffer.clone())
    }
}

impl CachelessCacheContext for TracingContainer {
    fn add_synthetic(
        &mut self,
        identifier: &str,
        bundle_name: &str,
        plist: &[u8],
        executable: Option<&[u8]>,
    ) -> Result<(), CoreError> {
        info!("cacheless: synthesizing '{identifier}' as '{bundle_name}' ({} plist bytes)", plist.len());
        if let Some(exe) = executable {
            self.buffer.extend_from_slice(exe);
        }
        self.injected.push(bundle_name.to_string());
        Ok(())
    }

    fn add_forced_builtin(&mut self, identifier: &str, real_path: &str) -> Result<(), CoreError> {
        info!("cacheless: forcing built-in '{identifier}' from '{real_path}'");
        self.injected.push(identifier.to_string());
        Ok(())
    }

    fn overlay_dir(&self) -> Vec<OverlayEntry> {
        self.injected
            .iter()
            .map(|name| OverlayEntry {
                name: name.clone(),
                is_synthetic: true,
            })
            .collect()
    }

    fn perform_inject(&self, _sub_path: &str) -> Option<Vec<u8>> {
        None
    }

    fn hook_builtin(&self, _sub_path: &str, _real_bytes: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

/// Constructs a fresh [`TracingContainer`] for whichever strategy is asked for.
#[derive(Debug, Default)]
pub struct TracingCacheFactory;

impl CacheContextFactory for TracingCacheFactory {
    fn new_prelinked(&self, kernel_bytes: Vec<u8>, os_version: DarwinVersion) -> Box<dyn PrelinkedCacheContext> {
        info!("constructing demo prelinked container for Darwin {os_version}");
        Box::new(TracingContainer {
            buffer: kernel_bytes,
            injected: Vec::new(),
            blocked: Vec::new(),
        })
    }

    fn new_mkext(&self, archive_bytes: Vec<u8>, os_version: DarwinVersion) -> Box<dyn MkextCacheContext> {
        info!("constructing demo mkext container for Darwin {os_version}");
        Box::new(TracingContainer {
            buffer: archive_bytes,
            injected: Vec::new(),
            blocked: Vec::new(),
        })
    }

    fn new_cacheless(&self, os_version: DarwinVersion) -> Box<dyn CachelessCacheContext> {
        info!("constructing demo cacheless overlay for Darwin {os_version}");
        Box::new(TracingContainer::default())
    }
}
