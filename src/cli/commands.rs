//! Command implementations for the CLI

use crate::{
    cli::Command,
    config::Config,
    core::{
        builder::PackageBuilder,
        descriptor::{DescriptorLoader, PackageDescriptor},
    },
    utils::env::VersionGenerator,
};
use anyhow::Context;
use tracing::{info, instrument};

/// Execute the appropriate command based on CLI arguments
#[instrument(skip(config))]
pub fn execute_command(config: &Config, command: &Command) -> anyhow::Result<()> {
    let descriptor = load_descriptor(config)?;

    match command {
        Command::Check => execute_check_command(config, &descriptor),
        Command::Build { .. } => execute_build_command(config, &descriptor),
        Command::Version { .. } => execute_version_command(config, &descriptor),
        Command::Clean { .. } => execute_clean_command(config, &descriptor),
    }
}

fn load_descriptor(config: &Config) -> anyhow::Result<PackageDescriptor> {
    let loader = DescriptorLoader::new()?;
    loader
        .load(&config.descriptor_path)
        .with_context(|| format!("Failed to load {}", config.descriptor_path.display()))
}

/// Execute the check command
#[instrument(skip(config, descriptor))]
fn execute_check_command(config: &Config, descriptor: &PackageDescriptor) -> anyhow::Result<()> {
    info!("Checking {} {}...", descriptor.name, descriptor.version);

    let builder = PackageBuilder::new(config.clone());
    let plan = builder
        .plan(descriptor)
        .context("Package inputs are incomplete")?;

    info!(
        "All inputs present: {} module(s), description {}",
        plan.sources.len(),
        plan.description.file_name.display()
    );
    Ok(())
}

/// Execute the build command
#[instrument(skip(config, descriptor))]
fn execute_build_command(config: &Config, descriptor: &PackageDescriptor) -> anyhow::Result<()> {
    info!("Building package...");

    let builder = PackageBuilder::new(config.clone());

    if config.build.clean {
        builder
            .clean(descriptor)
            .context("Failed to clean previous builds")?;
    }

    let artifact = builder
        .build(descriptor)
        .context("Failed to build package")?;

    info!(
        "Build completed successfully: {}",
        artifact.archive_path.display()
    );
    Ok(())
}

/// Execute the version command
#[instrument(skip(config, descriptor))]
fn execute_version_command(config: &Config, descriptor: &PackageDescriptor) -> anyhow::Result<()> {
    let generator = VersionGenerator::new();
    generator
        .generate(descriptor, &config.artifacts.version_file)
        .context("Failed to generate version file")?;

    info!("Version information generated successfully");
    Ok(())
}

/// Execute the clean command
#[instrument(skip(config, descriptor))]
fn execute_clean_command(config: &Config, descriptor: &PackageDescriptor) -> anyhow::Result<()> {
    let builder = PackageBuilder::new(config.clone());
    let removed = builder
        .clean(descriptor)
        .context("Failed to clean build output")?;

    info!("Clean completed, {} path(s) removed", removed);
    Ok(())
}
