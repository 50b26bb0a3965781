//! Demonstration harness for `bootcache-core`.
//!
//! Runs a list of read-open paths through the interception pipeline against
//! a real boot volume directory and a JSON configuration document, printing
//! the resulting buffer size (or error) for each. The container-format
//! collaborators this drives (see `demo`) are stand-ins, not a real
//! Mach-O/prelinked-kernel/mkext implementation — this binary exists to
//! exercise the core's orchestration logic by hand, not to boot anything.

mod demo;

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use bootcache_core::common::DarwinVersion;
use bootcache_core::{Configuration, CpuInfo, FsVolume, Session};

/// Traces `bootcache-core`'s path classification and pipeline output.
#[derive(Parser, Debug)]
#[command(
    name = "intercept-cli",
    author,
    version,
    about = "Traces bootcache-core's path classification and pipeline output",
    long_about = "Runs a list of read-open paths through the interception core against a real \
boot volume directory and a JSON configuration document, printing the classification outcome \
and resulting buffer size for each.\n\nExample:\n  intercept-cli --root /Volumes/EFI --config \
oc.json System/Library/Kernels/kernel System/Library/Extensions"
)]
struct Cli {
    /// Root boot volume directory; Force entries and the kernel/cache files are read from here.
    #[arg(long)]
    root: PathBuf,

    /// Firmware overlay directory Add entries are read from; defaults to --root.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Path to a JSON configuration document.
    #[arg(long)]
    config: PathBuf,

    /// Darwin major kernel version to assume, since no real Mach-O version parser is wired up here.
    #[arg(long, default_value_t = 18)]
    assume_version: u32,

    /// Paths, relative to --root, to run through the pipeline.
    paths: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config_text = match fs::read_to_string(&cli.config) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error reading config {}: {e}", cli.config.display());
            process::exit(1);
        }
    };
    let config = match Configuration::from_json(&config_text) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error parsing config: {e}");
            process::exit(1);
        }
    };

    if cli.paths.is_empty() {
        eprintln!("no paths given; nothing to trace");
        process::exit(1);
    }

    let overlay_path = cli.overlay.clone().unwrap_or_else(|| cli.root.clone());
    let mut session = Session::new(
        config,
        Box::new(FsVolume::new(cli.root.clone())),
        Box::new(FsVolume::new(overlay_path)),
        CpuInfo::default(),
        Box::new(demo::FixedVersionKernelReader),
        Box::new(demo::FixedVersionParser(DarwinVersion(cli.assume_version))),
        Box::new(demo::AlwaysSixtyFourBitOracle),
        Box::new(demo::TracingCacheFactory),
        Box::new(demo::NoopDigestSink),
        Box::new(demo::NoopCpuIdEditor),
        Box::new(demo::TracingKernelPatcher),
    );

    for path in &cli.paths {
        match session.intercept(path) {
            Ok(file) => println!("{path}: ok, {} bytes (modified {:?})", file.len(), file.modified()),
            Err(e) => println!("{path}: error: {e}"),
        }
    }
}
