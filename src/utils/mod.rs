//! Utility modules for common functionality
//!
//! Provides reusable utilities for file operations, process execution,
//! and version file generation.

pub mod env;
pub mod fs;
pub mod process;

pub use env::VersionGenerator;
pub use fs::FileSystemUtils;
pub use process::ProcessRunner;
