//! Named quirk enumeration (§4.D, §6 `Kernel.Quirks.*`).
//!
//! Each quirk is a fixed, pre-canned operation gated by a single boolean in
//! [`crate::config::Quirks`]. The actual patch bytes a quirk applies are
//! owned by the `KernelPatcher`/`PatchableCache` implementation (out of
//! scope here, same as the byte-pattern matcher for user patches) — this
//! module only enumerates which quirks are active and which mode each runs in.

use crate::config::Quirks;

/// Whether a quirk operates on the kernel buffer directly or inside a cache
/// context scoped to one extension (§4.D). `AppleCpuPmLock`, the three
/// `AppleXhciPortLimit*`, `DisableIoMapper`, `DisableRtcChecksum`,
/// `IncreasePciBarSize`, the two `CustomSmbiosGuid*`, and
/// `DummyPowerManagement` patch into the extension-scoped cache context
/// (`Extension`); the XCPM trio and the panic-behavior quirks
/// (`PanicNoKextDump`, `LapicKernelPanic`, `PowerTimeoutKernelPanic`) patch
/// the raw kernel buffer directly (`Kernel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuirkMode {
    Kernel,
    Extension,
}

/// One named, pre-canned quirk (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuirkKind {
    AppleCpuPmLock,
    AppleXhciPortLimit1,
    AppleXhciPortLimit2,
    AppleXhciPortLimit3,
    DisableIoMapper,
    DisableRtcChecksum,
    IncreasePciBarSize,
    CustomSmbiosGuid1,
    CustomSmbiosGuid2,
    DummyPowerManagement,
    XcpmCpuId1,
    XcpmCpuId2,
    XcpmExtraMsrs,
    PanicNoKextDump,
    LapicKernelPanic,
    PowerTimeoutKernelPanic,
}

impl QuirkKind {
    /// The configured flag's name, used as the `quirk` argument passed to
    /// `KernelPatcher::apply_quirk`/`PatchableCache::apply_quirk`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AppleCpuPmLock => "AppleCpuPmLock",
            Self::AppleXhciPortLimit1 => "AppleXhciPortLimit1",
            Self::AppleXhciPortLimit2 => "AppleXhciPortLimit2",
            Self::AppleXhciPortLimit3 => "AppleXhciPortLimit3",
            Self::DisableIoMapper => "DisableIoMapper",
            Self::DisableRtcChecksum => "DisableRtcChecksum",
            Self::IncreasePciBarSize => "IncreasePciBarSize",
            Self::CustomSmbiosGuid1 => "CustomSmbiosGuid1",
            Self::CustomSmbiosGuid2 => "CustomSmbiosGuid2",
            Self::DummyPowerManagement => "DummyPowerManagement",
            Self::XcpmCpuId1 => "XcpmCpuId1",
            Self::XcpmCpuId2 => "XcpmCpuId2",
            Self::XcpmExtraMsrs => "XcpmExtraMsrs",
            Self::PanicNoKextDump => "PanicNoKextDump",
            Self::LapicKernelPanic => "LapicKernelPanic",
            Self::PowerTimeoutKernelPanic => "PowerTimeoutKernelPanic",
        }
    }

    #[must_use]
    pub fn mode(self) -> QuirkMode {
        match self {
            Self::AppleCpuPmLock
            | Self::AppleXhciPortLimit1
            | Self::AppleXhciPortLimit2
            | Self::AppleXhciPortLimit3
            | Self::DisableIoMapper
            | Self::DisableRtcChecksum
            | Self::IncreasePciBarSize
            | Self::CustomSmbiosGuid1
            | Self::CustomSmbiosGuid2
            | Self::DummyPowerManagement => QuirkMode::Extension,
            Self::XcpmCpuId1
            | Self::XcpmCpuId2
            | Self::XcpmExtraMsrs
            | Self::PanicNoKextDump
            | Self::LapicKernelPanic
            | Self::PowerTimeoutKernelPanic => QuirkMode::Kernel,
        }
    }

    const ALL: [Self; 16] = [
        Self::AppleCpuPmLock,
        Self::AppleXhciPortLimit1,
        Self::AppleXhciPortLimit2,
        Self::AppleXhciPortLimit3,
        Self::DisableIoMapper,
        Self::DisableRtcChecksum,
        Self::IncreasePciBarSize,
        Self::CustomSmbiosGuid1,
        Self::CustomSmbiosGuid2,
        Self::DummyPowerManagement,
        Self::XcpmCpuId1,
        Self::XcpmCpuId2,
        Self::XcpmExtraMsrs,
        Self::PanicNoKextDump,
        Self::LapicKernelPanic,
        Self::PowerTimeoutKernelPanic,
    ];

    fn is_set(self, quirks: &Quirks) -> bool {
        match self {
            Self::AppleCpuPmLock => quirks.apple_cpu_pm_lock,
            Self::AppleXhciPortLimit1 => quirks.apple_xhci_port_limit1,
            Self::AppleXhciPortLimit2 => quirks.apple_xhci_port_limit2,
            Self::AppleXhciPortLimit3 => quirks.apple_xhci_port_limit3,
            Self::DisableIoMapper => quirks.disable_io_mapper,
            Self::DisableRtcChecksum => quirks.disable_rtc_checksum,
            Self::IncreasePciBarSize => quirks.increase_pci_bar_size,
            Self::CustomSmbiosGuid1 => quirks.custom_smbios_guid1,
            Self::CustomSmbiosGuid2 => quirks.custom_smbios_guid2,
            Self::DummyPowerManagement => quirks.dummy_power_management,
            Self::XcpmCpuId1 => quirks.xcpm_cpu_id_1,
            Self::XcpmCpuId2 => quirks.xcpm_cpu_id_2,
            Self::XcpmExtraMsrs => quirks.xcpm_extra_msrs,
            Self::PanicNoKextDump => quirks.panic_no_kext_dump,
            Self::LapicKernelPanic => quirks.lapic_kernel_panic,
            Self::PowerTimeoutKernelPanic => quirks.power_timeout_kernel_panic,
        }
    }
}

/// Returns the quirks whose configuration flag is set, in declaration order.
#[must_use]
pub fn active_quirks(quirks: &Quirks) -> Vec<QuirkKind> {
    QuirkKind::ALL.iter().copied().filter(|q| q.is_set(quirks)).collect()
}
