//! `Kernel.*` configuration section (§6).

use serde::Deserialize;

use crate::common::{Architecture, DarwinVersion};

/// The `Kernel.*` configuration section consulted by this core.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelConfig {
    /// `Kernel.Scheme.*`.
    #[serde(default)]
    pub scheme: SchemeConfig,
    /// `Kernel.Force[*]` — extensions injected by copying from the real root volume.
    #[serde(default)]
    pub force: Vec<ForceEntry>,
    /// `Kernel.Add[*]` — extensions injected by copying from the firmware overlay.
    #[serde(default)]
    pub add: Vec<AddEntry>,
    /// `Kernel.Block[*]` — prelinked-only neutralization list.
    #[serde(default)]
    pub block: Vec<BlockEntry>,
    /// `Kernel.Patch[*]` — byte-pattern patches.
    #[serde(default)]
    pub patch: Vec<PatchEntry>,
    /// `Kernel.Quirks.*` — named boolean toggles.
    #[serde(default)]
    pub quirks: Quirks,
    /// `Kernel.Emulate.*`.
    #[serde(default)]
    pub emulate: EmulateConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            scheme: SchemeConfig::default(),
            force: Vec::new(),
            add: Vec::new(),
            block: Vec::new(),
            patch: Vec::new(),
            quirks: Quirks::default(),
            emulate: EmulateConfig::default(),
        }
    }
}

/// `Kernel.Scheme.*`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemeConfig {
    /// Caps the strongest cache strategy the session may select.
    #[serde(default)]
    pub kernel_cache: KernelCacheType,
    /// Enables the fuzzy cache locator (§4.H).
    #[serde(default)]
    pub fuzzy_match: bool,
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            kernel_cache: KernelCacheType::default(),
            fuzzy_match: false,
        }
    }
}

/// The three mutually exclusive cache strategies (§2 component B/E/F/G), in
/// increasing order of capability — `Prelinked` is the strongest and is the
/// configuration default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum KernelCacheType {
    /// Live directory overlay; weakest, works on every supported release.
    Cacheless,
    /// Multi-extension archive.
    Mkext,
    /// Pre-linked kernel container; strongest, default.
    Prelinked,
}

impl Default for KernelCacheType {
    fn default() -> Self {
        Self::Prelinked
    }
}

/// An extension injected by copying from the real (booting) root volume (§3, glossary).
#[derive(Debug, Clone, Deserialize)]
pub struct ForceEntry {
    /// Reverse-DNS bundle identifier.
    pub identifier: String,
    /// Bundle directory, relative to the root volume.
    pub bundle_path: String,
    /// Info.plist path, relative to `bundle_path`. Defaults to `Contents/Info.plist`.
    #[serde(default = "default_plist_path")]
    pub plist_path: String,
    /// Executable path, relative to `bundle_path`; absent for plist-only bundles.
    #[serde(default)]
    pub executable_path: String,
    /// Free-text comment; not consulted by the core.
    #[serde(default)]
    pub comment: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub min_kernel: DarwinVersion,
    #[serde(default)]
    pub max_kernel: DarwinVersion,
    /// Architecture this entry targets; `None` matches either.
    #[serde(default)]
    pub arch: Option<ArchFilter>,
}

/// An extension injected by copying from the firmware extension's own overlay (§3, glossary).
#[derive(Debug, Clone, Deserialize)]
pub struct AddEntry {
    pub identifier: String,
    pub bundle_path: String,
    #[serde(default = "default_plist_path")]
    pub plist_path: String,
    #[serde(default)]
    pub executable_path: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub min_kernel: DarwinVersion,
    #[serde(default)]
    pub max_kernel: DarwinVersion,
    #[serde(default)]
    pub arch: Option<ArchFilter>,
}

/// A prelinked-only neutralization entry (§4.E step 4, glossary).
#[derive(Debug, Clone, Deserialize)]
pub struct BlockEntry {
    pub identifier: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub min_kernel: DarwinVersion,
    #[serde(default)]
    pub max_kernel: DarwinVersion,
    #[serde(default)]
    pub comment: String,
}

/// What a [`PatchEntry`] targets (§4.D).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchTarget {
    /// The kernel image itself.
    Kernel,
    /// A specific extension, identified by bundle identifier.
    Extension(String),
}

impl PatchTarget {
    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("kernel") {
            Self::Kernel
        } else {
            Self::Extension(raw.to_string())
        }
    }
}

/// A byte-pattern patch (§4.D).
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawPatchEntry")]
pub struct PatchEntry {
    pub target: PatchTarget,
    pub enabled: bool,
    pub min_kernel: DarwinVersion,
    pub max_kernel: DarwinVersion,
    pub arch: Option<ArchFilter>,
    /// Symbolic base an out-of-scope symbolizer resolves before `find` is
    /// searched for; when present, `find` may be empty (§4.D).
    pub base: Option<String>,
    pub find: Vec<u8>,
    pub replace: Vec<u8>,
    pub find_mask: Option<Vec<u8>>,
    pub replace_mask: Option<Vec<u8>>,
    /// Maximum number of substitutions; `0` means unbounded.
    pub count: u32,
    /// Number of leading matches to bypass before substituting.
    pub skip: u32,
    /// Maximum byte offset a match may start at; `0` means unbounded.
    pub limit: u32,
    pub comment: String,
}

/// Wire representation of a patch entry, matching the original field names.
#[derive(Debug, Clone, Deserialize)]
struct RawPatchEntry {
    target: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    min_kernel: DarwinVersion,
    #[serde(default)]
    max_kernel: DarwinVersion,
    #[serde(default)]
    arch: Option<ArchFilter>,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    find: Vec<u8>,
    #[serde(default)]
    replace: Vec<u8>,
    #[serde(default)]
    find_mask: Option<Vec<u8>>,
    #[serde(default)]
    replace_mask: Option<Vec<u8>>,
    #[serde(default)]
    count: u32,
    #[serde(default)]
    skip: u32,
    #[serde(default)]
    limit: u32,
    #[serde(default)]
    comment: String,
}

impl TryFrom<RawPatchEntry> for PatchEntry {
    type Error = std::convert::Infallible;

    fn try_from(raw: RawPatchEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            target: PatchTarget::parse(&raw.target),
            enabled: raw.enabled,
            min_kernel: raw.min_kernel,
            max_kernel: raw.max_kernel,
            arch: raw.arch,
            base: raw.base,
            find: raw.find,
            replace: raw.replace,
            find_mask: raw.find_mask,
            replace_mask: raw.replace_mask,
            count: raw.count,
            skip: raw.skip,
            limit: raw.limit,
            comment: raw.comment,
        })
    }
}

/// Architecture filter attached to a configured entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchFilter {
    I386,
    X86_64,
}

impl ArchFilter {
    #[must_use]
    pub fn matches(self, arch: Architecture) -> bool {
        matches!(
            (self, arch),
            (Self::I386, Architecture::Bit32) | (Self::X86_64, Architecture::Bit64)
        )
    }
}

/// `Kernel.Quirks.*` — the fixed enumeration of named, pre-canned patches (§4.D, §6).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Quirks {
    pub apple_cpu_pm_lock: bool,
    pub apple_xhci_port_limit1: bool,
    pub apple_xhci_port_limit2: bool,
    pub apple_xhci_port_limit3: bool,
    pub disable_io_mapper: bool,
    pub disable_rtc_checksum: bool,
    pub increase_pci_bar_size: bool,
    pub custom_smbios_guid1: bool,
    pub custom_smbios_guid2: bool,
    pub dummy_power_management: bool,
    pub xcpm_cpu_id_1: bool,
    pub xcpm_cpu_id_2: bool,
    pub xcpm_extra_msrs: bool,
    pub panic_no_kext_dump: bool,
    pub lapic_kernel_panic: bool,
    pub power_timeout_kernel_panic: bool,
}

/// `Kernel.Emulate.*` — the CPUID(1) override data consulted in kernel mode (§4.D).
#[derive(Debug, Clone, Deserialize)]
pub struct EmulateConfig {
    #[serde(default)]
    pub cpuid1_data: [u8; 16],
    #[serde(default = "default_cpuid_mask")]
    pub cpuid1_mask: [u8; 16],
}

impl Default for EmulateConfig {
    fn default() -> Self {
        Self {
            cpuid1_data: [0; 16],
            cpuid1_mask: [0; 16],
        }
    }
}

fn default_cpuid_mask() -> [u8; 16] {
    [0; 16]
}

fn default_plist_path() -> String {
    "Contents/Info.plist".to_string()
}

fn default_true() -> bool {
    true
}
