//! Extension loader / size planner (§4.B, component B).
//!
//! Loads each configured extension's plist and optional executable, and
//! accumulates the reservation totals the chosen cache strategy needs before
//! any mutation happens. Grounded on the teacher's `sim::loader::load_binary`
//! pattern: turn a failed read into a skip rather than a panic, and keep
//! accounting arithmetic in checked operations so a policy cap is an error,
//! not a silent wraparound.

use log::warn;

use crate::common::constants::{PRELINKED_KEXTS_MAX_SIZE, PRELINK_INFO_RESERVE_SIZE};
use crate::common::{Architecture, DarwinVersion};
use crate::config::{AddEntry, ArchFilter, ForceEntry, KernelCacheType};
use crate::error::CoreError;
use crate::storage::{join, BootVolume};

/// A successfully loaded extension entry, ready for injection (§3, per-extension entry).
#[derive(Debug, Clone)]
pub struct LoadedExtension {
    pub identifier: String,
    pub bundle_path: String,
    pub plist: Vec<u8>,
    pub executable: Option<Vec<u8>>,
    /// True for a `Force` entry (reloaded every pass); false for `Add` (persists).
    pub force: bool,
}

/// Output of one planning pass (§4.B): the loaded, eligible entries plus the
/// aggregate reservation `Session` must request from the kernel reader.
#[derive(Debug, Clone, Default)]
pub struct PlannedExtensions {
    pub entries: Vec<LoadedExtension>,
    pub reserved_exe: u32,
    pub reserved_info: u32,
}

/// Runs one planning pass over `force` (read from `root`) and `add` (read
/// from `overlay`), gated by `version`/`arch`, accumulating reservations for
/// `cache` (§4.B, §8 properties 3/4).
///
/// Per-entry failures (path too long, missing plist, missing configured
/// executable, single-entry overflow) disable just that entry and log a
/// warning (§7); only a strategy-wide cap violation for `Prelinked` fails the
/// whole pass.
///
/// # Errors
/// Returns [`CoreError::Overflow`] if `Prelinked`'s `reserved_exe` exceeds
/// [`PRELINKED_KEXTS_MAX_SIZE`] or `reserved_info + reserved_exe` would wrap.
pub fn plan_reservations(
    cache: KernelCacheType,
    version: DarwinVersion,
    arch: Architecture,
    force: &[ForceEntry],
    add: &[AddEntry],
    root: &dyn BootVolume,
    overlay: &dyn BootVolume,
) -> Result<PlannedExtensions, CoreError> {
    let mut plan = PlannedExtensions::default();

    for entry in force {
        if !eligible(entry.enabled, entry.min_kernel, entry.max_kernel, entry.arch, version, arch) {
            continue;
        }
        if let Some(loaded) = load_entry(
            &entry.identifier,
            &entry.bundle_path,
            &entry.plist_path,
            &entry.executable_path,
            root,
            true,
        ) {
            if !accumulate(&mut plan, cache, &loaded) {
                continue;
            }
            plan.entries.push(loaded);
        }
    }

    for entry in add {
        if !eligible(entry.enabled, entry.min_kernel, entry.max_kernel, entry.arch, version, arch) {
            continue;
        }
        if let Some(loaded) = load_entry(
            &entry.identifier,
            &entry.bundle_path,
            &entry.plist_path,
            &entry.executable_path,
            overlay,
            false,
        ) {
            if !accumulate(&mut plan, cache, &loaded) {
                continue;
            }
            plan.entries.push(loaded);
        }
    }

    if cache == KernelCacheType::Prelinked {
        if plan.reserved_exe > PRELINKED_KEXTS_MAX_SIZE {
            return Err(CoreError::Overflow(format!(
                "reserved_exe {} exceeds PRELINKED_KEXTS_MAX_SIZE {}",
                plan.reserved_exe, PRELINKED_KEXTS_MAX_SIZE
            )));
        }
        if plan.reserved_info.checked_add(plan.reserved_exe).is_none() {
            return Err(CoreError::Overflow(
                "reserved_info + reserved_exe overflowed u32".to_string(),
            ));
        }
    }

    Ok(plan)
}

fn eligible(
    enabled: bool,
    min_kernel: DarwinVersion,
    max_kernel: DarwinVersion,
    arch_filter: Option<ArchFilter>,
    version: DarwinVersion,
    arch: Architecture,
) -> bool {
    enabled
        && version.within(min_kernel, max_kernel)
        && arch_filter.map_or(true, |f| f.matches(arch))
}

fn load_entry(
    identifier: &str,
    bundle_path: &str,
    plist_path: &str,
    executable_path: &str,
    volume: &dyn BootVolume,
    force: bool,
) -> Option<LoadedExtension> {
    let plist = match volume.read(&join(bundle_path, plist_path)) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("'{identifier}': missing plist, disabling this pass: {e}");
            return None;
        }
    };

    let executable = if executable_path.is_empty() {
        None
    } else {
        match volume.read(&join(bundle_path, executable_path)) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("'{identifier}': missing configured executable, disabling this pass: {e}");
                return None;
            }
        }
    };

    Some(LoadedExtension {
        identifier: identifier.to_string(),
        bundle_path: bundle_path.to_string(),
        plist,
        executable,
        force,
    })
}

/// Adds one entry's reservation delta to `plan`, per the cache-specific
/// reservation rule (§4.B). Returns `false` (and leaves `plan` untouched) if
/// this single entry's delta would overflow `u32`, disabling just that entry.
fn accumulate(plan: &mut PlannedExtensions, cache: KernelCacheType, entry: &LoadedExtension) -> bool {
    let exe_len = entry.executable.as_ref().map_or(0, |e| e.len()) as u32;
    let plist_len = entry.plist.len() as u32;

    let info_delta = match cache {
        KernelCacheType::Prelinked => plist_len.checked_add(PRELINK_INFO_RESERVE_SIZE),
        KernelCacheType::Mkext | KernelCacheType::Cacheless => Some(plist_len),
    };

    let Some(info_delta) = info_delta else {
        warn!("'{}': info reservation overflowed, disabling this pass", entry.identifier);
        return false;
    };

    let (Some(reserved_info), Some(reserved_exe)) = (
        plan.reserved_info.checked_add(info_delta),
        plan.reserved_exe.checked_add(exe_len),
    ) else {
        warn!("'{}': reservation totals overflowed, disabling this pass", entry.identifier);
        return false;
    };

    plan.reserved_info = reserved_info;
    plan.reserved_exe = reserved_exe;
    true
}
