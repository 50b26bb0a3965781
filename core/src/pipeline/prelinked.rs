//! Prelinked pipeline (§4.E, component E).

use log::warn;

use crate::collaborators::PrelinkedCacheContext;
use crate::common::constants::EXTENSIONS_DIR;
use crate::common::{Architecture, DarwinVersion};
use crate::config::{KernelCacheType, KernelConfig};
use crate::error::CoreError;
use crate::extension::{plan_reservations, LoadedExtension};
use crate::patch::apply_extension_patches;
use crate::storage::BootVolume;

/// Runs the Prelinked pipeline end to end (§4.E steps 1-5).
///
/// # Errors
/// Propagates [`CoreError::Overflow`] from planning, or any error the
/// collaborator context raises while preparing, finalizing, or injecting.
pub fn run(
    ctx: &mut dyn PrelinkedCacheContext,
    config: &KernelConfig,
    version: DarwinVersion,
    arch: Architecture,
    root: &dyn BootVolume,
    overlay: &dyn BootVolume,
    linked_expansion: impl Fn(u32) -> u32,
) -> Result<Vec<u8>, CoreError> {
    let plan = plan_reservations(
        KernelCacheType::Prelinked,
        version,
        arch,
        &config.force,
        &config.add,
        root,
        overlay,
    )?;

    let expansion = linked_expansion(plan.reserved_exe);
    ctx.inject_prepare(plan.reserved_exe, expansion)?;

    for entry in &plan.entries {
        let path = injection_path(entry);
        if let Err(e) = ctx.inject_kext(&entry.identifier, &path, &entry.plist, entry.executable.as_deref()) {
            warn!("prelinked: '{}' failed to inject, skipping: {e}", entry.identifier);
        }
    }

    for entry in &plan.entries {
        apply_extension_patches(ctx, &entry.identifier, &config.patch, version, arch, &config.quirks);
    }

    for block in &config.block {
        if !block.enabled || !version.within(block.min_kernel, block.max_kernel) {
            continue;
        }
        if let Err(e) = ctx.block(&block.identifier) {
            warn!("prelinked: failed to block '{}': {e}", block.identifier);
        }
    }

    ctx.inject_complete()
}

/// Computes the path handed to `inject_kext` (§4.E step 2): force entries
/// already living under `System/Library/Extensions` use the identifier-only
/// variant; everything else is synthesized under `/Library/Extensions/<bundle>`.
fn injection_path(entry: &LoadedExtension) -> String {
    if entry.force && entry.bundle_path.starts_with(EXTENSIONS_DIR) {
        entry.identifier.clone()
    } else {
        let bundle_name = entry.bundle_path.rsplit('/').next().unwrap_or(&entry.bundle_path);
        format!("/Library/Extensions/{bundle_name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{PatchableCache, ResolvedPatch};
    use crate::storage::MemoryVolume;

    #[derive(Default)]
    struct FakePrelinked {
        prepared: Option<(u32, u32)>,
        injected: Vec<(String, String)>,
        blocked: Vec<String>,
        finalized: bool,
    }

    impl PatchableCache for FakePrelinked {
        fn apply_patch(&mut self, _identifier: &str, _patch: &ResolvedPatch<'_>) -> Result<u32, CoreError> {
            Ok(0)
        }
        fn apply_quirk(&mut self, _identifier: &str, _quirk: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    impl PrelinkedCacheContext for FakePrelinked {
        fn inject_prepare(&mut self, reserved_exe: u32, linked_expansion: u32) -> Result<(), CoreError> {
            self.prepared = Some((reserved_exe, linked_expansion));
            Ok(())
        }
        fn inject_kext(
            &mut self,
            identifier: &str,
            bundle_path: &str,
            _plist: &[u8],
            _executable: Option<&[u8]>,
        ) -> Result<(), CoreError> {
            self.injected.push((identifier.to_string(), bundle_path.to_string()));
            Ok(())
        }
        fn block(&mut self, identifier: &str) -> Result<(), CoreError> {
            self.blocked.push(identifier.to_string());
            Ok(())
        }
        fn inject_complete(&mut self) -> Result<Vec<u8>, CoreError> {
            self.finalized = true;
            Ok(vec![0xDE, 0xAD])
        }
        fn kernel_size(&self) -> usize {
            0
        }
    }

    #[test]
    fn scenario_2_injects_one_add_entry_and_finalizes() {
        let mut overlay = MemoryVolume::new();
        overlay.insert("A.kext/Contents/Info.plist", vec![0u8; 400], None);
        overlay.insert("A.kext/Contents/MacOS/Exe", vec![0u8; 2048], None);

        let mut config = KernelConfig::default();
        config.add.push(crate::config::AddEntry {
            identifier: "com.x.A".to_string(),
            bundle_path: "A.kext".to_string(),
            plist_path: "Contents/Info.plist".to_string(),
            executable_path: "Contents/MacOS/Exe".to_string(),
            comment: String::new(),
            enabled: true,
            min_kernel: DarwinVersion::UNSET,
            max_kernel: DarwinVersion::UNSET,
            arch: None,
        });

        let mut ctx = FakePrelinked::default();
        let buffer = run(
            &mut ctx,
            &config,
            DarwinVersion(18),
            Architecture::Bit64,
            &MemoryVolume::new(),
            &overlay,
            |exe| exe / 4,
        )
        .unwrap();

        assert_eq!(buffer, vec![0xDE, 0xAD]);
        assert_eq!(ctx.injected, vec![("com.x.A".to_string(), "/Library/Extensions/A.kext".to_string())]);
        assert!(ctx.finalized);
    }
}
