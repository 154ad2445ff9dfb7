//! Error types for the package builder
//!
//! Provides structured error handling with context and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the package builder
#[derive(Error, Debug)]
pub enum BuilderError {
    /// A module named in the descriptor has no source file on disk
    #[error("Missing source for module '{module}': {path} does not exist")]
    MissingSource { module: String, path: PathBuf },

    /// The long description file could not be read
    #[error("Cannot read description file {path}")]
    MissingDescriptionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Errors related to descriptor parsing
    #[error("Descriptor parsing error in {path}: {message}")]
    DescriptorParse {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Errors related to staging and compiling modules
    #[error("Build error: {message}")]
    Build {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Errors related to writing the distributable archive
    #[error("Artifact error: {message}")]
    Artifact {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// File system operation errors
    #[error("File system error: {operation} failed on {path}")]
    FileSystem {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Process execution errors
    #[error("Process error: {command} failed")]
    Process {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl BuilderError {
    /// Create a new missing source error
    pub fn missing_source<P: Into<PathBuf>>(module: impl Into<String>, path: P) -> Self {
        Self::MissingSource {
            module: module.into(),
            path: path.into(),
        }
    }

    /// Create a new missing description file error
    pub fn missing_description_file<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::MissingDescriptionFile {
            path: path.into(),
            source,
        }
    }

    /// Create a new descriptor parsing error
    pub fn descriptor_parse<P: Into<PathBuf>>(message: impl Into<String>, path: P) -> Self {
        Self::DescriptorParse {
            message: message.into(),
            path: path.into(),
            source: None,
        }
    }

    /// Create a new build error
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new build error wrapping an underlying cause
    pub fn build_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Build {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new artifact error
    pub fn artifact<P: Into<PathBuf>>(message: impl Into<String>, path: P) -> Self {
        Self::Artifact {
            message: message.into(),
            path: path.into(),
            source: None,
        }
    }

    /// Create a new file system error
    pub fn file_system<P: Into<PathBuf>>(
        operation: impl Into<String>,
        path: P,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a new process error
    pub fn process(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Process {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BuilderError>;
