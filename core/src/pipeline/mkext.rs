//! Mkext pipeline (§4.F, component F).
//!
//! Same contract as the Prelinked pipeline minus blocking and linked
//! expansion, over the multi-extension archive container.

use log::warn;

use crate::collaborators::MkextCacheContext;
use crate::common::{Architecture, DarwinVersion};
use crate::config::{KernelCacheType, KernelConfig};
use crate::error::CoreError;
use crate::extension::{plan_reservations, LoadedExtension};
use crate::patch::apply_extension_patches;
use crate::storage::BootVolume;

/// Runs the Mkext pipeline end to end (§4.F).
///
/// # Errors
/// Propagates planning errors, or any error the collaborator context raises
/// while adding kexts or finalizing.
pub fn run(
    ctx: &mut dyn MkextCacheContext,
    config: &KernelConfig,
    version: DarwinVersion,
    arch: Architecture,
    root: &dyn BootVolume,
    overlay: &dyn BootVolume,
) -> Result<Vec<u8>, CoreError> {
    let plan = plan_reservations(KernelCacheType::Mkext, version, arch, &config.force, &config.add, root, overlay)?;

    for entry in &plan.entries {
        let bundle_path = archive_bundle_path(entry);
        if let Err(e) = ctx.add_kext(&entry.identifier, &bundle_path, &entry.plist, entry.executable.as_deref()) {
            warn!("mkext: '{}' failed to add, skipping: {e}", entry.identifier);
        }
    }

    for entry in &plan.entries {
        apply_extension_patches(ctx, &entry.identifier, &config.patch, version, arch, &config.quirks);
    }

    ctx.finalize()
}

/// Force entries are placed under `/Library/Extensions/<bundle>`; add
/// entries are added keyed by identifier + their own bundle path (§4.F).
fn archive_bundle_path(entry: &LoadedExtension) -> String {
    if entry.force {
        let bundle_name = entry.bundle_path.rsplit('/').next().unwrap_or(&entry.bundle_path);
        format!("/Library/Extensions/{bundle_name}")
    } else {
        entry.bundle_path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{PatchableCache, ResolvedPatch};
    use crate::config::AddEntry;
    use crate::storage::MemoryVolume;

    #[derive(Default)]
    struct FakeMkext {
        added: Vec<(String, String)>,
        finalized: bool,
    }

    impl PatchableCache for FakeMkext {
        fn apply_patch(&mut self, _identifier: &str, _patch: &ResolvedPatch<'_>) -> Result<u32, CoreError> {
            Ok(0)
        }
        fn apply_quirk(&mut self, _identifier: &str, _quirk: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    impl MkextCacheContext for FakeMkext {
        fn add_kext(
            &mut self,
            identifier: &str,
            bundle_path: &str,
            _plist: &[u8],
            _executable: Option<&[u8]>,
        ) -> Result<(), CoreError> {
            self.added.push((identifier.to_string(), bundle_path.to_string()));
            Ok(())
        }
        fn finalize(&mut self) -> Result<Vec<u8>, CoreError> {
            self.finalized = true;
            Ok(vec![1, 2, 3])
        }
    }

    #[test]
    fn add_entry_keeps_its_own_bundle_path() {
        let mut overlay = MemoryVolume::new();
        overlay.insert("A.kext/Contents/Info.plist", vec![0u8; 10], None);

        let mut config = KernelConfig::default();
        config.add.push(AddEntry {
            identifier: "com.x.A".to_string(),
            bundle_path: "A.kext".to_string(),
            plist_path: "Contents/Info.plist".to_string(),
            executable_path: String::new(),
            comment: String::new(),
            enabled: true,
            min_kernel: DarwinVersion::UNSET,
            max_kernel: DarwinVersion::UNSET,
            arch: None,
        });

        let mut ctx = FakeMkext::default();
        let buffer = run(
            &mut ctx,
            &config,
            DarwinVersion(18),
            Architecture::Bit64,
            &MemoryVolume::new(),
            &overlay,
        )
        .unwrap();

        assert_eq!(buffer, vec![1, 2, 3]);
        assert_eq!(ctx.added, vec![("com.x.A".to_string(), "A.kext".to_string())]);
        assert!(ctx.finalized);
    }
}
