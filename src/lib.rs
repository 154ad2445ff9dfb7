//! # Module Packager
//!
//! Builds distributable archives for single-module packages from a static
//! TOML descriptor. Module sources are verified, optionally compiled with an
//! external source-to-native compiler, and packaged together with core
//! metadata and the long description read from a text file.
//!
//! ## Features
//!
//! - Strict descriptor validation (name, version, module identifiers)
//! - Distinct errors for missing module sources and missing descriptions
//! - Optional compilation step driven by an external command
//! - Reproducible `.tar.gz` archives (sorted entries, deterministic headers) with SHA-256 checksums
//! - CI-friendly version file generation
//!
//! ## Example
//!
//! ```no_run
//! use module_packager::{config::Config, core::{DescriptorLoader, PackageBuilder}};
//!
//! let config = Config::default();
//! let descriptor = DescriptorLoader::new()?.load("package.toml")?;
//! let artifact = PackageBuilder::new(config).build(&descriptor)?;
//! println!("{} {} -> {}", artifact.name, artifact.version, artifact.archive_path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod utils;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging with appropriate verbosity
pub fn setup_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
