//! Cacheless pipeline (§4.G, component G).
//!
//! Unlike the other two strategies this does not rewrite a single buffer —
//! it installs an overlay over the real extensions directory enumeration.

use log::warn;

use crate::collaborators::{CachelessCacheContext, OverlayEntry};
use crate::common::constants::EXTENSIONS_DIR;
use crate::common::{Architecture, DarwinVersion};
use crate::config::{KernelCacheType, KernelConfig};
use crate::error::CoreError;
use crate::extension::plan_reservations;
use crate::patch::apply_extension_patches;
use crate::storage::BootVolume;

/// Runs the Cacheless pipeline end to end (§4.G steps 1-6), returning the
/// merged real+synthetic directory listing.
///
/// # Errors
/// Propagates planning errors from [`plan_reservations`].
pub fn run(
    ctx: &mut dyn CachelessCacheContext,
    config: &KernelConfig,
    version: DarwinVersion,
    arch: Architecture,
    root: &dyn BootVolume,
    overlay: &dyn BootVolume,
) -> Result<Vec<OverlayEntry>, CoreError> {
    let plan = plan_reservations(
        KernelCacheType::Cacheless,
        version,
        arch,
        &config.force,
        &config.add,
        root,
        overlay,
    )?;

    for entry in &plan.entries {
        if !entry.force {
            continue;
        }
        let result = if entry.bundle_path.starts_with(EXTENSIONS_DIR) {
            ctx.add_forced_builtin(&entry.identifier, &entry.bundle_path)
        } else {
            let bundle_name = entry.bundle_path.rsplit('/').next().unwrap_or(&entry.bundle_path);
            ctx.add_synthetic(&entry.identifier, bundle_name, &entry.plist, entry.executable.as_deref())
        };
        if let Err(e) = result {
            warn!("cacheless: '{}' failed to inject, skipping: {e}", entry.identifier);
        }
    }

    for entry in &plan.entries {
        if entry.force {
            continue;
        }
        let bundle_name = entry.bundle_path.rsplit('/').next().unwrap_or(&entry.bundle_path);
        if let Err(e) = ctx.add_synthetic(&entry.identifier, bundle_name, &entry.plist, entry.executable.as_deref()) {
            warn!("cacheless: '{}' failed to inject, skipping: {e}", entry.identifier);
        }
    }

    for entry in &plan.entries {
        apply_extension_patches(ctx, &entry.identifier, &config.patch, version, arch, &config.quirks);
    }

    Ok(ctx.overlay_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{PatchableCache, ResolvedPatch};
    use crate::config::AddEntry;
    use crate::storage::MemoryVolume;

    #[derive(Default)]
    struct FakeCacheless {
        synthetic: Vec<String>,
        forced_builtin: Vec<String>,
    }

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
            bundle_name: &str,
            _plist: &[u8],
            _executable: Option<&[u8]>,
        ) -> Result<(), CoreError> {
            self.synthetic.push(bundle_name.to_string());
            Ok(())
        }
        fn add_forced_builtin(&mut self, identifier: &str, _real_path: &str) -> Result<(), CoreError> {
            self.forced_builtin.push(identifier.to_string());
            Ok(())
        }
        fn overlay_dir(&self) -> Vec<OverlayEntry> {
            self.synthetic
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

    #[test]
    fn scenario_5_add_entry_becomes_synthetic_bundle() {
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

        let mut ctx = FakeCacheless::default();
        let listing = run(
            &mut ctx,
            &config,
            DarwinVersion(18),
            Architecture::Bit64,
            &MemoryVolume::new(),
            &overlay,
        )
        .unwrap();

        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "A.kext");
        assert!(listing[0].is_synthetic);
    }
}
