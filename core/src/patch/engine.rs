//! Patch engine (§4.D, component D): validates configured patches, resolves
//! them to the collaborator-facing [`ResolvedPatch`] shape, and drives named
//! quirks and the CPUID-1 override in kernel mode.

use log::warn;

use crate::collaborators::{CpuIdEditor, CpuInfo, KernelPatcher, PatchableCache, ResolvedPatch};
use crate::common::{Architecture, DarwinVersion};
use crate::config::{EmulateConfig, PatchEntry, PatchTarget, Quirks};
use crate::patch::quirks::{active_quirks, QuirkMode};

/// Validates §4.D's size-consistency rules for one patch entry (§8 property 5).
///
/// # Errors
/// Returns a human-readable reason the patch is borked.
pub fn validate_patch(entry: &PatchEntry) -> Result<(), String> {
    if entry.replace.is_empty() {
        return Err("replace size must be > 0".to_string());
    }
    if entry.base.is_none() && entry.find.len() != entry.replace.len() {
        return Err(format!(
            "find size ({}) != replace size ({}) with no symbolic base",
            entry.find.len(),
            entry.replace.len()
        ));
    }
    if let Some(mask) = &entry.find_mask {
        if mask.len() != entry.find.len() {
            return Err(format!("find_mask size ({}) != find size ({})", mask.len(), entry.find.len()));
        }
    }
    if let Some(mask) = &entry.replace_mask {
        if mask.len() != entry.find.len() {
            return Err(format!(
                "replace_mask size ({}) != find size ({})",
                mask.len(),
                entry.find.len()
            ));
        }
    }
    Ok(())
}

/// Validates and resolves `entry` into a [`ResolvedPatch`], or returns `None`
/// (after logging a warning) if it is borked or needs symbol resolution this
/// crate does not provide (§4.D: "invalid patches are skipped with a
/// warning, never retried").
fn resolve(entry: &PatchEntry) -> Option<ResolvedPatch<'_>> {
    if entry.base.is_some() && entry.find.is_empty() {
        warn!("patch '{}': symbolic base resolution is not available, skipping", entry.comment);
        return None;
    }
    if let Err(reason) = validate_patch(entry) {
        warn!("patch '{}': borked, skipping: {reason}", entry.comment);
        return None;
    }
    Some(ResolvedPatch {
        find: &entry.find,
        replace: &entry.replace,
        find_mask: entry.find_mask.as_deref(),
        replace_mask: entry.replace_mask.as_deref(),
        count: entry.count,
        skip: entry.skip,
        limit: entry.limit,
    })
}

fn entry_eligible(entry: &PatchEntry, version: DarwinVersion, arch: Architecture) -> bool {
    entry.enabled
        && version.within(entry.min_kernel, entry.max_kernel)
        && entry.arch.map_or(true, |f| f.matches(arch))
}

/// Applies every eligible kernel-mode patch, then every active kernel-mode
/// quirk, then the CPUID-1 override (§4.D). Returns the total number of
/// byte-pattern substitutions performed across all patches.
pub fn apply_kernel_patches(
    patcher: &mut dyn KernelPatcher,
    buffer: &mut [u8],
    patches: &[PatchEntry],
    version: DarwinVersion,
    arch: Architecture,
    quirks: &Quirks,
    emulate: &EmulateConfig,
    cpuid_editor: &mut dyn CpuIdEditor,
    cpu: CpuInfo,
) -> u32 {
    let mut applied = 0u32;

    for entry in patches {
        if entry.target != PatchTarget::Kernel || !entry_eligible(entry, version, arch) {
            continue;
        }
        let Some(resolved) = resolve(entry) else { continue };
        match patcher.apply_patch(buffer, &resolved) {
            Ok(n) => applied += n,
            Err(e) => warn!("patch '{}': apply failed, skipping: {e}", entry.comment),
        }
    }

    for quirk in active_quirks(quirks) {
        if quirk.mode() != QuirkMode::Kernel {
            continue;
        }
        if let Err(e) = patcher.apply_quirk(buffer, quirk.name()) {
            warn!("quirk '{}': apply failed: {e}", quirk.name());
        }
    }

    if emulate.cpuid1_data.iter().any(|&b| b != 0) {
        cpuid_editor.apply(cpu, &emulate.cpuid1_data, &emulate.cpuid1_mask);
    }

    applied
}

/// Applies every eligible extension-mode patch and quirk scoped to
/// `identifier` (§4.D, used by the Prelinked/Mkext/Cacheless pipelines).
///
/// Generic over `C: PatchableCache + ?Sized` so any of the three pipeline's
/// `&mut dyn ...CacheContext` trait objects can be passed directly — each
/// implements `PatchableCache` as a supertrait, and Rust lets a trait
/// object's supertrait methods be called without an explicit upcast.
pub fn apply_extension_patches<C: PatchableCache + ?Sized>(
    cache: &mut C,
    identifier: &str,
    patches: &[PatchEntry],
    version: DarwinVersion,
    arch: Architecture,
    quirks: &Quirks,
) -> u32 {
    let mut applied = 0u32;

    for entry in patches {
        let PatchTarget::Extension(target) = &entry.target else {
            continue;
        };
        if target != identifier || !entry_eligible(entry, version, arch) {
            continue;
        }
        let Some(resolved) = resolve(entry) else { continue };
        match cache.apply_patch(identifier, &resolved) {
            Ok(n) => applied += n,
            Err(e) => warn!("patch '{}' on '{identifier}': apply failed, skipping: {e}", entry.comment),
        }
    }

    for quirk in active_quirks(quirks) {
        if quirk.mode() != QuirkMode::Extension {
            continue;
        }
        if let Err(e) = cache.apply_quirk(identifier, quirk.name()) {
            warn!("quirk '{}' on '{identifier}': apply failed: {e}", quirk.name());
        }
    }

    applied
}
