//! Command-line argument parsing and validation

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Module Packager - builds distributable archives from a package descriptor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "packager")]
pub struct Args {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Directory module sources and the description file are resolved against
    #[arg(short = 'C', long = "work-dir", global = true, default_value = ".")]
    pub work_dir: PathBuf,

    /// Package descriptor, relative to the work directory
    #[arg(short = 'f', long, global = true, default_value = "package.toml")]
    pub descriptor: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the descriptor and check that every input file exists
    Check,

    /// Build the distributable archive
    Build {
        /// Remove previous build output before building
        #[arg(long)]
        clean: bool,

        /// Output directory for the archive
        #[arg(short = 'o', long = "output-dir", default_value = "dist")]
        output_dir: PathBuf,

        /// Directory holding the staging tree
        #[arg(long = "build-dir", default_value = "build")]
        build_dir: PathBuf,

        /// Keep the staging tree after the archive is written
        #[arg(long)]
        keep_build_dir: bool,

        /// Do not write a .sha256 file next to the archive
        #[arg(long)]
        no_checksum: bool,
    },

    /// Generate version information file
    Version {
        /// Output file for version information
        #[arg(short = 'o', long = "output-file", default_value = "version.env")]
        output_file: PathBuf,
    },

    /// Remove staging trees and archives of the package
    Clean {
        /// Output directory holding archives
        #[arg(short = 'o', long = "output-dir", default_value = "dist")]
        output_dir: PathBuf,

        /// Directory holding the staging tree
        #[arg(long = "build-dir", default_value = "build")]
        build_dir: PathBuf,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_args() {
        let args = Args::try_parse_from(["packager", "check"]).unwrap();
        assert!(!args.debug);
        assert_eq!(args.work_dir, PathBuf::from("."));
        assert_eq!(args.descriptor, PathBuf::from("package.toml"));
        assert!(matches!(args.command, Command::Check));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["packager", "version", "--debug", "-f", "c2f.toml"]).unwrap();
        assert!(args.debug);
        assert_eq!(args.descriptor, PathBuf::from("c2f.toml"));
    }

    #[test]
    fn test_parse_build_with_options() {
        let args = Args::try_parse_from([
            "packager",
            "build",
            "--clean",
            "--keep-build-dir",
            "-o",
            "out",
        ])
        .unwrap();
        match args.command {
            Command::Build {
                clean,
                output_dir,
                build_dir,
                keep_build_dir,
                no_checksum,
            } => {
                assert!(clean);
                assert!(keep_build_dir);
                assert!(!no_checksum);
                assert_eq!(output_dir, PathBuf::from("out"));
                assert_eq!(build_dir, PathBuf::from("build"));
            }
            _ => panic!("Expected Build command"),
        }
    }
}
