//! Kernel reader (§4.C, component C).
//!
//! Reads the kernel image through the out-of-scope [`RawKernelReader`]
//! collaborator, enforces the monotonic-version invariant (§3, §8 property
//! 1), and drives the single-retry architecture-switch state machine
//! (§9 design note).

use log::{debug, warn};

use crate::collaborators::{ArchPreferenceOracle, OsVersionParser, RawKernelRead, RawKernelReader};
use crate::common::{Architecture, ArchPreference, DarwinVersion};
use crate::error::CoreError;

/// Reads the kernel at `raw_bytes`, updating `arch_pref` and `session_version`
/// in place (§5: failure paths must leave session state consistent).
///
/// # Errors
/// - [`CoreError::InvalidCache`] if the detected version regressed (§3, §4.C step 1).
/// - [`CoreError::ArchUnavailable`] if, after the one permitted retry, the
///   returned architecture still disagrees with the resolved preference (§4.C step 2).
/// - Whatever [`RawKernelReader::read`] or [`OsVersionParser::parse`] returns otherwise.
pub fn read_kernel(
    reader: &dyn RawKernelReader,
    version_parser: &dyn OsVersionParser,
    arch_oracle: &dyn ArchPreferenceOracle,
    raw_bytes: &[u8],
    arch_pref: &mut ArchPreference,
    session_version: &mut DarwinVersion,
    reserve: usize,
    want_digest: bool,
) -> Result<RawKernelRead, CoreError> {
    let first = reader.read(raw_bytes, arch_pref.current(), reserve, want_digest)?;
    let version = version_parser.parse(&first.bytes)?;
    reject_if_stale(version, *session_version)?;

    let version_changed = version != *session_version;
    if first.architecture == arch_pref.current() && !version_changed {
        *session_version = version;
        return Ok(first);
    }

    let preferred = resolve_preference(arch_oracle, version);
    let pre_switch = *arch_pref;
    if !arch_pref.try_switch(preferred) || preferred == pre_switch.current() {
        // No switch happened (already retried, or already matches): accept
        // whatever architecture was returned if it matches preference,
        // otherwise this is unresolvable without a second read.
        if first.architecture != arch_pref.current() {
            warn!("kernel reader: architecture unavailable after oracle consult, no retry permitted");
            return Err(CoreError::ArchUnavailable);
        }
        *session_version = version;
        return Ok(first);
    }

    debug!(
        "kernel reader: re-reading once with switched architecture {:?}",
        arch_pref.current()
    );
    let second = match reader.read(raw_bytes, arch_pref.current(), reserve, want_digest) {
        Ok(read) => read,
        Err(e) => {
            *arch_pref = pre_switch;
            return Err(e);
        }
    };

    let second_version = match version_parser.parse(&second.bytes) {
        Ok(v) => v,
        Err(e) => {
            *arch_pref = pre_switch;
            return Err(e);
        }
    };

    if let Err(e) = reject_if_stale(second_version, *session_version) {
        *arch_pref = pre_switch;
        return Err(e);
    }

    if second.architecture != arch_pref.current() {
        *arch_pref = pre_switch;
        return Err(CoreError::ArchUnavailable);
    }

    *session_version = second_version;
    Ok(second)
}

fn reject_if_stale(detected: DarwinVersion, session: DarwinVersion) -> Result<(), CoreError> {
    if detected < session {
        return Err(CoreError::InvalidCache {
            detected: detected.0,
            session: session.0,
        });
    }
    Ok(())
}

fn resolve_preference(oracle: &dyn ArchPreferenceOracle, version: DarwinVersion) -> Architecture {
    oracle
        .cmdline_preference()
        .unwrap_or_else(|| Architecture::from_is_32_bit(!oracle.supports_64_bit(version)))
}
