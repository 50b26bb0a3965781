//! Session bootstrap & the single intercept entry point (§4.L, component L).
//!
//! `Session` is the sole owner of §3's global session state; it is created
//! once per boot by the bootstrap and threaded explicitly through every
//! call, per the "no process-wide mutable globals" design note (§9).

use log::{info, warn};

use crate::classify::{classify, PathClass};
use crate::collaborators::{
    ArchPreferenceOracle, CacheContextFactory, CachelessCacheContext, CpuIdEditor, CpuInfo,
    KernelPatcher, OsVersionParser, RawKernelReader, SecureBootDigestSink,
};
use crate::common::constants::PRELINKED_NAME_HINTS;
use crate::common::{Architecture, ArchPreference, DarwinVersion};
use crate::config::{Configuration, KernelCacheType};
use crate::error::CoreError;
use crate::extension::plan_reservations;
use crate::fuzzy;
use crate::kernel_reader::read_kernel;
use crate::patch::apply_kernel_patches;
use crate::pipeline::{cacheless, mkext, prelinked};
use crate::storage::BootVolume;
use crate::vfile::InterceptedFile;

/// The currently-active cacheless overlay, if any (§3, §8 property 9: at
/// most one exists at a time — enforced by this field being a plain `Option`
/// that `open_extensions_dir` always replaces wholesale).
struct CachelessState {
    ctx: Box<dyn CachelessCacheContext>,
}

/// Owns every piece of §3's session state and exposes the single
/// `intercept` entry point.
pub struct Session {
    config: Configuration,
    root: Box<dyn BootVolume>,
    overlay: Box<dyn BootVolume>,
    cpu_info: CpuInfo,
    kernel_reader: Box<dyn RawKernelReader>,
    version_parser: Box<dyn OsVersionParser>,
    arch_oracle: Box<dyn ArchPreferenceOracle>,
    cache_factory: Box<dyn CacheContextFactory>,
    digest_sink: Box<dyn SecureBootDigestSink>,
    cpuid_editor: Box<dyn CpuIdEditor>,
    kernel_patcher: Box<dyn KernelPatcher>,

    version: DarwinVersion,
    arch_pref: ArchPreference,
    cacheless: Option<CachelessState>,
}

#[allow(clippy::too_many_arguments)]
impl Session {
    /// Constructs a new session for one boot (§4.L).
    pub fn new(
        config: Configuration,
        root: Box<dyn BootVolume>,
        overlay: Box<dyn BootVolume>,
        cpu_info: CpuInfo,
        kernel_reader: Box<dyn RawKernelReader>,
        version_parser: Box<dyn OsVersionParser>,
        arch_oracle: Box<dyn ArchPreferenceOracle>,
        cache_factory: Box<dyn CacheContextFactory>,
        digest_sink: Box<dyn SecureBootDigestSink>,
        cpuid_editor: Box<dyn CpuIdEditor>,
        kernel_patcher: Box<dyn KernelPatcher>,
    ) -> Self {
        Self {
            config,
            root,
            overlay,
            cpu_info,
            kernel_reader,
            version_parser,
            arch_oracle,
            cache_factory,
            digest_sink,
            cpuid_editor,
            kernel_patcher,
            version: DarwinVersion::UNSET,
            arch_pref: ArchPreference::new(Architecture::Bit64),
            cacheless: None,
        }
    }

    #[must_use]
    pub fn detected_version(&self) -> DarwinVersion {
        self.version
    }

    /// The single entry point every read-open request enters (§2, §4.L).
    ///
    /// # Errors
    /// See §7 for the full error taxonomy; most commonly
    /// [`CoreError::NotFound`] for a rejected or absent path.
    pub fn intercept(&mut self, path: &str) -> Result<InterceptedFile, CoreError> {
        match classify(path, self.cacheless.is_some()) {
            PathClass::Passthrough => self.read_passthrough(path),
            PathClass::ExtensionsDir => self.open_extensions_dir(path),
            PathClass::ExtensionsChild { sub_path } => self.read_extensions_child(path, &sub_path),
            PathClass::InjectedBundleFile { sub_path } => self.read_injected(path, &sub_path),
            PathClass::MkextArchive => self.read_mkext(path),
            PathClass::Kernel => self.read_kernel_class(path),
        }
    }

    fn read_passthrough(&mut self, path: &str) -> Result<InterceptedFile, CoreError> {
        let bytes = self.root.read(path)?;
        let modified = self.root.modified(path).ok().flatten();
        Ok(InterceptedFile::new(path, bytes, modified))
    }

    fn read_kernel_class(&mut self, path: &str) -> Result<InterceptedFile, CoreError> {
        if is_prelinked_name(path) {
            self.read_prelinked_name(path)
        } else {
            self.read_plain_kernel(path)
        }
    }

    /// Runs the Prelinked pipeline, optionally through the fuzzy locator
    /// (§4.H). The §6 downgrade gates are applied in
    /// [`Self::run_prelinked_cache`], after the kernel has actually been
    /// read and `self.version` reflects the detected version — not the
    /// session's pre-read version, which is a poor proxy for "what cache
    /// format does this specific file actually need."
    fn read_prelinked_name(&mut self, path: &str) -> Result<InterceptedFile, CoreError> {
        if self.config.kernel.scheme.fuzzy_match {
            let found = fuzzy::candidates(self.root.as_ref(), path)?;
            return fuzzy::try_each(path, &found, |candidate| self.run_prelinked_cache(candidate));
        }

        self.run_prelinked_cache(path)
    }

    fn run_prelinked_cache(&mut self, path: &str) -> Result<InterceptedFile, CoreError> {
        let plan = plan_reservations(
            KernelCacheType::Prelinked,
            self.version,
            self.arch_pref.current(),
            &self.config.kernel.force,
            &self.config.kernel.add,
            self.root.as_ref(),
            self.overlay.as_ref(),
        )?;
        let reserve = (plan.reserved_info + plan.reserved_exe + linked_expansion(plan.reserved_exe)) as usize;

        let raw_bytes = self.root.read(path)?;
        let want_digest = self.config.misc.security.secure_boot_model.requires_digest();
        let read = read_kernel(
            self.kernel_reader.as_ref(),
            self.version_parser.as_ref(),
            self.arch_oracle.as_ref(),
            &raw_bytes,
            &mut self.arch_pref,
            &mut self.version,
            reserve,
            want_digest,
        )?;

        // The gate depends on the version just detected from this specific
        // file, not on whatever version the session happened to carry
        // before this read (e.g. 0/unset on a session's first kernel read).
        let cap = self.config.kernel.scheme.kernel_cache;
        if cap == KernelCacheType::Mkext && self.version.within(DarwinVersion::UNSET, DarwinVersion::SNOW_LEOPARD_MAX) {
            return Err(CoreError::NotFound(path.to_string()));
        }
        if cap == KernelCacheType::Cacheless
            && self.version.within(DarwinVersion::UNSET, DarwinVersion::MAVERICKS_MAX)
        {
            return Err(CoreError::NotFound(path.to_string()));
        }

        if let Some(digest) = read.digest {
            self.digest_sink.record(digest);
        }

        let mut ctx = self.cache_factory.new_prelinked(read.bytes, self.version);
        let buffer = prelinked::run(
            ctx.as_mut(),
            &self.config.kernel,
            self.version,
            self.arch_pref.current(),
            self.root.as_ref(),
            self.overlay.as_ref(),
            linked_expansion,
        )?;

        let modified = self.root.modified(path).ok().flatten();
        Ok(InterceptedFile::new(path, buffer, modified))
    }

    fn read_plain_kernel(&mut self, path: &str) -> Result<InterceptedFile, CoreError> {
        let raw_bytes = self.root.read(path)?;
        let want_digest = self.config.misc.security.secure_boot_model.requires_digest();
        let read = read_kernel(
            self.kernel_reader.as_ref(),
            self.version_parser.as_ref(),
            self.arch_oracle.as_ref(),
            &raw_bytes,
            &mut self.arch_pref,
            &mut self.version,
            0,
            want_digest,
        )?;
        if let Some(digest) = read.digest {
            self.digest_sink.record(digest);
        }

        let mut buffer = read.bytes;
        apply_kernel_patches(
            self.kernel_patcher.as_mut(),
            &mut buffer,
            &self.config.kernel.patch,
            self.version,
            self.arch_pref.current(),
            &self.config.kernel.quirks,
            &self.config.kernel.emulate,
            self.cpuid_editor.as_mut(),
            self.cpu_info,
        );

        let modified = self.root.modified(path).ok().flatten();
        Ok(InterceptedFile::new(path, buffer, modified))
    }

    fn read_mkext(&mut self, path: &str) -> Result<InterceptedFile, CoreError> {
        if self.config.kernel.scheme.kernel_cache == KernelCacheType::Cacheless {
            return Err(CoreError::NotFound(path.to_string()));
        }
        let raw_bytes = self.root.read(path)?;
        let mut ctx = self.cache_factory.new_mkext(raw_bytes, self.version);
        let buffer = mkext::run(
            ctx.as_mut(),
            &self.config.kernel,
            self.version,
            self.arch_pref.current(),
            self.root.as_ref(),
            self.overlay.as_ref(),
        )?;
        let modified = self.root.modified(path).ok().flatten();
        Ok(InterceptedFile::new(path, buffer, modified))
    }

    /// Tears down any previous cacheless context (§4.G, §8 property 9) and
    /// builds a fresh overlay over the real extensions directory.
    fn open_extensions_dir(&mut self, path: &str) -> Result<InterceptedFile, CoreError> {
        self.cacheless = None;

        let mut ctx = self.cache_factory.new_cacheless(self.version);
        let listing = cacheless::run(
            ctx.as_mut(),
            &self.config.kernel,
            self.version,
            self.arch_pref.current(),
            self.root.as_ref(),
            self.overlay.as_ref(),
        )?;
        info!("cacheless overlay active: {} synthetic/forced entries", listing.len());

        let serialized = listing
            .iter()
            .map(|e| e.name.clone())
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes();
        self.cacheless = Some(CachelessState { ctx });

        let modified = self.root.modified(path).ok().flatten();
        Ok(InterceptedFile::new(path, serialized, modified))
    }

    fn read_extensions_child(&mut self, path: &str, sub_path: &str) -> Result<InterceptedFile, CoreError> {
        let real_bytes = self.root.read(path)?;
        let bytes = match &self.cacheless {
            Some(state) => state.ctx.hook_builtin(sub_path, &real_bytes).unwrap_or(real_bytes),
            None => real_bytes,
        };
        let modified = self.root.modified(path).ok().flatten();
        Ok(InterceptedFile::new(path, bytes, modified))
    }

    fn read_injected(&mut self, path: &str, sub_path: &str) -> Result<InterceptedFile, CoreError> {
        let state = self.cacheless.as_ref().ok_or_else(|| CoreError::NotFound(path.to_string()))?;
        match state.ctx.perform_inject(sub_path) {
            Some(bytes) => Ok(InterceptedFile::new(path, bytes, None)),
            None => {
                warn!("injected bundle read for '{path}' had no synthetic match");
                Err(CoreError::NotFound(path.to_string()))
            }
        }
    }
}

fn is_prelinked_name(path: &str) -> bool {
    PRELINKED_NAME_HINTS.iter().any(|hint| path.contains(hint))
}

/// Fixup-chain overhead a prelinked container needs for `reserved_exe` bytes
/// of newly injected executables (§4.C). The exact formula is an internal
/// detail of the real prelinked-kernel container format (out of scope here);
/// this uses a fixed fractional model, generous enough that the planner's
/// overflow check (§8 property 4) still catches genuinely oversized plans.
fn linked_expansion(reserved_exe: u32) -> u32 {
    reserved_exe / 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::fakes::{FixedArchOracle, InMemoryKernelPatcher, NoopCpuIdEditor};
    use crate::collaborators::{
        CachelessCacheContext, MkextCacheContext, OverlayEntry, PatchableCache, PrelinkedCacheContext,
        RawKernelRead, ResolvedPatch,
    };
    use crate::storage::MemoryVolume;

    struct PassthroughReader;
    impl RawKernelReader for PassthroughReader {
        fn read(
            &self,
            raw_bytes: &[u8],
            arch_pref: Architecture,
            _reserve: usize,
            _want_digest: bool,
        ) -> Result<RawKernelRead, CoreError> {
            Ok(RawKernelRead {
                architecture: arch_pref,
                bytes: raw_bytes.to_vec(),
                size: raw_bytes.len(),
                allocated: raw_bytes.len(),
                reserved_full: 0,
                digest: None,
            })
        }
    }

    struct FixedVersionParser(DarwinVersion);
    impl OsVersionParser for FixedVersionParser {
        fn parse(&self, _kernel_bytes: &[u8]) -> Result<DarwinVersion, CoreError> {
            Ok(self.0)
        }
    }

    struct NoopDigestSink;
    impl SecureBootDigestSink for NoopDigestSink {
        fn record(&mut self, _digest: [u8; 48]) {}
    }

    struct UnusedCacheFactory;
    impl CacheContextFactory for UnusedCacheFactory {
        fn new_prelinked(&self, _kernel_bytes: Vec<u8>, _os_version: DarwinVersion) -> Box<dyn PrelinkedCacheContext> {
            unreachable!("not exercised by this test")
        }
        fn new_mkext(&self, _archive_bytes: Vec<u8>, _os_version: DarwinVersion) -> Box<dyn MkextCacheContext> {
            unreachable!("not exercised by this test")
        }
        fn new_cacheless(&self, _os_version: DarwinVersion) -> Box<dyn CachelessCacheContext> {
            unreachable!("not exercised by this test")
        }
    }

    fn new_session(root: MemoryVolume, version: DarwinVersion) -> Session {
        let mut session = Session::new(
            Configuration::default(),
            Box::new(root),
            Box::new(MemoryVolume::new()),
            CpuInfo::default(),
            Box::new(PassthroughReader),
            Box::new(FixedVersionParser(version)),
            Box::new(FixedArchOracle {
                cmdline: None,
                supports_64_bit: true,
            }),
            Box::new(UnusedCacheFactory),
            Box::new(NoopDigestSink),
            Box::new(NoopCpuIdEditor::default()),
            Box::new(InMemoryKernelPatcher::default()),
        );
        session.arch_pref = ArchPreference::new(Architecture::Bit64);
        session
    }

    #[test]
    fn scenario_1_plain_kernel_round_trips_and_updates_version() {
        let mut root = MemoryVolume::new();
        root.insert("System/Library/Kernels/kernel", vec![1, 2, 3, 4], None);
        let mut session = new_session(root, DarwinVersion(18));

        let file = session.intercept("System/Library/Kernels/kernel").unwrap();
        assert_eq!(file.as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(session.detected_version(), DarwinVersion(18));
    }

    #[test]
    fn scenario_3_mkext_cap_rejects_old_prelinked_name() {
        let mut root = MemoryVolume::new();
        root.insert("Boot/prelinkedkernel", vec![1], None);
        // The parser reports the cache's own detected version (Snow Leopard);
        // the gate must reject based on that, not on the session's pre-read
        // (unset/zero) version.
        let mut session = new_session(root, DarwinVersion(10));
        session.config.kernel.scheme.kernel_cache = KernelCacheType::Mkext;

        let err = session.intercept("Boot/prelinkedkernel").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[derive(Default)]
    struct FakePrelinkedCtx {
        finalized_bytes: Vec<u8>,
    }

    impl PatchableCache for FakePrelinkedCtx {
        fn apply_patch(&mut self, _identifier: &str, _patch: &ResolvedPatch<'_>) -> Result<u32, CoreError> {
            Ok(0)
        }
        fn apply_quirk(&mut self, _identifier: &str, _quirk: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    impl PrelinkedCacheContext for FakePrelinkedCtx {
        fn inject_prepare(&mut self, _reserved_exe: u32, _linked_expansion: u32) -> Result<(), CoreError> {
            Ok(())
        }
        fn inject_kext(
            &mut self,
            _identifier: &str,
            _bundle_path: &str,
            _plist: &[u8],
            _executable: Option<&[u8]>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
        fn block(&mut self, _identifier: &str) -> Result<(), CoreError> {
            Ok(())
        }
        fn inject_complete(&mut self) -> Result<Vec<u8>, CoreError> {
            Ok(self.finalized_bytes.clone())
        }
        fn kernel_size(&self) -> usize {
            self.finalized_bytes.len()
        }
    }

    struct PrelinkedOnlyFactory;
    impl CacheContextFactory for PrelinkedOnlyFactory {
        fn new_prelinked(&self, kernel_bytes: Vec<u8>, _os_version: DarwinVersion) -> Box<dyn PrelinkedCacheContext> {
            Box::new(FakePrelinkedCtx {
                finalized_bytes: kernel_bytes,
            })
        }
        fn new_mkext(&self, _archive_bytes: Vec<u8>, _os_version: DarwinVersion) -> Box<dyn MkextCacheContext> {
            unreachable!("not exercised by this test")
        }
        fn new_cacheless(&self, _os_version: DarwinVersion) -> Box<dyn CachelessCacheContext> {
            unreachable!("not exercised by this test")
        }
    }

    #[test]
    fn scenario_3b_mkext_cap_allows_modern_prelinked_name() {
        let mut root = MemoryVolume::new();
        root.insert("Boot/prelinkedkernel", vec![1, 2, 3], None);
        let mut session = Session::new(
            Configuration::default(),
            Box::new(root),
            Box::new(MemoryVolume::new()),
            CpuInfo::default(),
            Box::new(PassthroughReader),
            Box::new(FixedVersionParser(DarwinVersion(18))),
            Box::new(FixedArchOracle {
                cmdline: None,
                supports_64_bit: true,
            }),
            Box::new(PrelinkedOnlyFactory),
            Box::new(NoopDigestSink),
            Box::new(NoopCpuIdEditor::default()),
            Box::new(InMemoryKernelPatcher::default()),
        );
        session.config.kernel.scheme.kernel_cache = KernelCacheType::Mkext;

        let file = session.intercept("Boot/prelinkedkernel").unwrap();
        assert_eq!(file.as_bytes(), &[1, 2, 3]);
        assert_eq!(session.detected_version(), DarwinVersion(18));
    }

    #[test]
    fn passthrough_reads_return_exact_bytes() {
        let mut root = MemoryVolume::new();
        root.insert("EFI/BOOT/BOOTX64.efi", vec![9, 9, 9], None);
        let mut session = new_session(root, DarwinVersion(18));

        let file = session.intercept("EFI/BOOT/BOOTX64.efi").unwrap();
        assert_eq!(file.as_bytes(), &[9, 9, 9]);
    }

    struct FakeCacheless;
    impl PatchableCache for FakeCacheless {
        fn apply_patch(&mut self, _identifier: &str, _patch: &ResolvedPatch<'_>) -> Result<u32, CoreError> {
            Ok(0)
        }
        fn apply_quirk(&mut self, _identifier: &str, _quirk: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }
    impl CachelessCacheContext for FakeCacheless {
        fn add_synthetic(
            &mut self,
            _identifier: &str,
            _bundle_name: &str,
            _plist: &[u8],
            _executable: Option<&[u8]>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
        fn add_forced_builtin(&mut self, _identifier: &str, _real_path: &str) -> Result<(), CoreError> {
            Ok(())
        }
        fn overlay_dir(&self) -> Vec<OverlayEntry> {
            vec![OverlayEntry {
                name: "OcA".to_string(),
                is_synthetic: true,
            }]
        }
        fn perform_inject(&self, sub_path: &str) -> Option<Vec<u8>> {
            if sub_path == "A.kext/Contents/Info.plist" {
                Some(b"synthetic-plist".to_vec())
            } else {
                None
            }
        }
        fn hook_builtin(&self, _sub_path: &str, _real_bytes: &[u8]) -> Option<Vec<u8>> {
            None
        }
    }

    struct CachelessOnlyFactory;
    impl CacheContextFactory for CachelessOnlyFactory {
        fn new_prelinked(&self, _kernel_bytes: Vec<u8>, _os_version: DarwinVersion) -> Box<dyn PrelinkedCacheContext> {
            unreachable!()
        }
        fn new_mkext(&self, _archive_bytes: Vec<u8>, _os_version: DarwinVersion) -> Box<dyn MkextCacheContext> {
            unreachable!()
        }
        fn new_cacheless(&self, _os_version: DarwinVersion) -> Box<dyn CachelessCacheContext> {
            Box::new(FakeCacheless)
        }
    }

    #[test]
    fn scenario_5_extensions_dir_then_injected_bundle_read() {
        let root = MemoryVolume::new();
        let mut session = Session::new(
            Configuration::default(),
            Box::new(root),
            Box::new(MemoryVolume::new()),
            CpuInfo::default(),
            Box::new(PassthroughReader),
            Box::new(FixedVersionParser(DarwinVersion(18))),
            Box::new(FixedArchOracle {
                cmdline: None,
                supports_64_bit: true,
            }),
            Box::new(CachelessOnlyFactory),
            Box::new(NoopDigestSink),
            Box::new(NoopCpuIdEditor::default()),
            Box::new(InMemoryKernelPatcher::default()),
        );

        session.intercept("System/Library/Extensions").unwrap();
        let file = session
            .intercept("System/Library/Extensions/OcA.kext/Contents/Info.plist")
            .unwrap();
        assert_eq!(file.as_bytes(), b"synthetic-plist");
    }
}
