//! Darwin kernel version handling.

use std::fmt;

use serde::Deserialize;

/// A packed Darwin/XNU kernel version (the major `uname -r` component).
///
/// Zero means "not yet detected" — the session's initial value before any
/// kernel has been read (§3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct DarwinVersion(pub u32);

impl DarwinVersion {
    /// Sentinel meaning "no kernel read yet this session".
    pub const UNSET: Self = Self(0);

    /// Last Darwin major version shipped as Mac OS X 10.6 (Snow Leopard).
    ///
    /// Used by the Mkext downgrade gate: caches at or below this version
    /// never get a prelinked-kernel read.
    pub const SNOW_LEOPARD_MAX: Self = Self(10);

    /// Last Darwin major version shipped as OS X 10.9 (Mavericks).
    ///
    /// Used by the Cacheless downgrade gate.
    pub const MAVERICKS_MAX: Self = Self(13);

    #[must_use]
    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }

    /// Returns true if `self` is within `[min, max]`, treating a zero bound
    /// as unbounded on that side (§8, property 6).
    #[must_use]
    pub fn within(self, min: Self, max: Self) -> bool {
        (min.is_unset() || self >= min) && (max.is_unset() || self <= max)
    }
}

impl fmt::Display for DarwinVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DarwinVersion {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bounds_are_unbounded() {
        let v = DarwinVersion(18);
        assert!(v.within(DarwinVersion::UNSET, DarwinVersion::UNSET));
        assert!(v.within(DarwinVersion(10), DarwinVersion::UNSET));
        assert!(v.within(DarwinVersion::UNSET, DarwinVersion(20)));
        assert!(!v.within(DarwinVersion(19), DarwinVersion::UNSET));
        assert!(!v.within(DarwinVersion::UNSET, DarwinVersion(17)));
    }

    #[test]
    fn downgrade_boundaries() {
        assert!(DarwinVersion(10) <= DarwinVersion::SNOW_LEOPARD_MAX);
        assert!(DarwinVersion(11) > DarwinVersion::SNOW_LEOPARD_MAX);
        assert!(DarwinVersion(13) <= DarwinVersion::MAVERICKS_MAX);
        assert!(DarwinVersion(14) > DarwinVersion::MAVERICKS_MAX);
    }
}
