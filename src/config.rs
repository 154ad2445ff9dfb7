//! Configuration management for the package builder
//!
//! Centralizes configuration options and provides validation.

use crate::{
    cli::{Args, Command},
    error::BuilderError,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Enable debug logging
    pub debug: bool,
    /// Directory module sources and the description file are resolved against
    pub work_dir: PathBuf,
    /// Descriptor file path
    pub descriptor_path: PathBuf,
    /// Build configuration
    pub build: BuildConfig,
    /// Artifact configuration
    pub artifacts: ArtifactConfig,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Clean previous builds first
    pub clean: bool,
    /// Parent directory of the staging tree
    pub build_dir: PathBuf,
    /// Keep the staging tree after the archive is written
    pub keep_build_dir: bool,
}

/// Artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Output directory for archives
    pub output_dir: PathBuf,
    /// Version file path
    pub version_file: PathBuf,
    /// Write a `.sha256` file next to each archive
    pub write_checksum: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            work_dir: PathBuf::from("."),
            descriptor_path: PathBuf::from("package.toml"),
            build: BuildConfig::default(),
            artifacts: ArtifactConfig::default(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            clean: false,
            build_dir: PathBuf::from("build"),
            keep_build_dir: false,
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("dist"),
            version_file: PathBuf::from("version.env"),
            write_checksum: true,
        }
    }
}

impl Config {
    /// Create configuration from command line arguments
    pub fn from_args(args: &Args) -> Result<Self, BuilderError> {
        let work_dir = std::path::absolute(&args.work_dir).map_err(|e| {
            BuilderError::config(format!(
                "Cannot resolve working directory {}: {e}",
                args.work_dir.display()
            ))
        })?;
        let mut config = Self::for_work_dir(&work_dir);
        config.debug = args.debug;
        config.descriptor_path = resolve(&config.work_dir, &args.descriptor);

        // Override with command-specific options
        match &args.command {
            Command::Build {
                clean,
                output_dir,
                build_dir,
                keep_build_dir,
                no_checksum,
            } => {
                config.build.clean = *clean;
                config.build.keep_build_dir = *keep_build_dir;
                config.artifacts.write_checksum = !*no_checksum;
                config.build.build_dir = resolve(&config.work_dir, build_dir);
                config.artifacts.output_dir = resolve(&config.work_dir, output_dir);
            }
            Command::Clean {
                output_dir,
                build_dir,
            } => {
                config.build.build_dir = resolve(&config.work_dir, build_dir);
                config.artifacts.output_dir = resolve(&config.work_dir, output_dir);
            }
            Command::Version { output_file } => {
                config.artifacts.version_file = resolve(&config.work_dir, output_file);
            }
            Command::Check => {}
        }

        config.validate()?;
        Ok(config)
    }

    /// Default configuration with every path anchored at `work_dir`
    pub fn for_work_dir(work_dir: &Path) -> Self {
        let mut config = Self {
            work_dir: work_dir.to_path_buf(),
            ..Self::default()
        };
        config.descriptor_path = resolve(work_dir, &config.descriptor_path);
        config.build.build_dir = resolve(work_dir, &config.build.build_dir);
        config.artifacts.output_dir = resolve(work_dir, &config.artifacts.output_dir);
        config.artifacts.version_file = resolve(work_dir, &config.artifacts.version_file);
        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), BuilderError> {
        if !self.work_dir.is_dir() {
            return Err(BuilderError::validation(format!(
                "Working directory not found: {}",
                self.work_dir.display()
            )));
        }

        if !self.descriptor_path.is_file() {
            return Err(BuilderError::validation(format!(
                "Descriptor file not found: {}",
                self.descriptor_path.display()
            )));
        }

        if self.build.build_dir == self.artifacts.output_dir {
            return Err(BuilderError::config(
                "Build directory and output directory must differ",
            ));
        }

        Ok(())
    }

    /// Resolve a path taken from the descriptor against the work directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve(&self.work_dir, path)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_paths_resolve_against_work_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("package.toml"), "").unwrap();
        let work_dir = temp_dir.path().to_str().unwrap();

        let args =
            Args::try_parse_from(["packager", "-C", work_dir, "build", "-o", "out"]).unwrap();
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.descriptor_path, temp_dir.path().join("package.toml"));
        assert_eq!(config.artifacts.output_dir, temp_dir.path().join("out"));
        assert_eq!(config.build.build_dir, temp_dir.path().join("build"));
        assert_eq!(
            config.artifacts.version_file,
            temp_dir.path().join("version.env")
        );
    }

    #[test]
    fn test_missing_descriptor_fails_validation() {
        let temp_dir = TempDir::new().unwrap();
        let work_dir = temp_dir.path().to_str().unwrap();

        let args = Args::try_parse_from(["packager", "-C", work_dir, "check"]).unwrap();
        let result = Config::from_args(&args);

        assert!(matches!(result, Err(BuilderError::Validation { .. })));
    }

    #[test]
    fn test_build_and_output_dirs_must_differ() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("package.toml"), "").unwrap();
        let work_dir = temp_dir.path().to_str().unwrap();

        let args = Args::try_parse_from([
            "packager",
            "-C",
            work_dir,
            "build",
            "-o",
            "dist",
            "--build-dir",
            "dist",
        ])
        .unwrap();

        assert!(matches!(
            Config::from_args(&args),
            Err(BuilderError::Config { .. })
        ));
    }
}
