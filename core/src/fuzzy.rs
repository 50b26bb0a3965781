//! Fuzzy cache locator (§4.H, component H).
//!
//! Triggered when a `kernelcache`-shaped read comes back not-found and
//! `Kernel.Scheme.FuzzyMatch` is enabled: searches the parent directory for
//! newest-first candidates sharing the failed path's basename and tries each.

use crate::error::CoreError;
use crate::storage::{join, parent_of, BootVolume};

/// Lists fuzzy-match candidates for `failed_path`, newest modification time
/// first; ties keep the order `read_dir` returned them in (§4.H tie-break).
///
/// # Errors
/// Returns whatever `read_dir` on the parent directory returns.
pub fn candidates(volume: &dyn BootVolume, failed_path: &str) -> std::io::Result<Vec<String>> {
    let parent = parent_of(failed_path);
    let basename = failed_path.rsplit('/').next().unwrap_or(failed_path);

    let mut entries: Vec<_> = volume
        .read_dir(parent)?
        .into_iter()
        .filter(|e| e.name.starts_with(basename))
        .collect();

    entries.sort_by(|a, b| b.modified.cmp(&a.modified));

    Ok(entries.into_iter().map(|e| join(parent, &e.name)).collect())
}

/// Tries `attempt` against each of `candidates` in order, stopping at the
/// first success (§4.H step 3). `NotFound`/`InvalidCache` are treated as "try
/// the next candidate" (§9 open question 2 decision); any other error, or
/// exhausting every candidate, returns the last error seen.
///
/// # Errors
/// Returns [`CoreError::NotFound`] for `failed_path` if `candidates` is
/// empty, or the last candidate's error if every candidate was retryable but
/// none succeeded.
pub fn try_each<T>(
    failed_path: &str,
    candidates: &[String],
    mut attempt: impl FnMut(&str) -> Result<T, CoreError>,
) -> Result<T, CoreError> {
    let mut last_err = None;
    for candidate in candidates {
        match attempt(candidate) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable_by_fuzzy_locator() => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| CoreError::NotFound(failed_path.to_string())))
}
