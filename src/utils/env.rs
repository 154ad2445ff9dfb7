//! Environment and version handling utilities
//!
//! Generates the `version.env` file CI pipelines source after a build.

use crate::{
    core::descriptor::PackageDescriptor,
    error::{BuilderError, Result},
    utils::fs::FileSystemUtils,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{env, path::Path};
use tracing::{debug, info, instrument};

/// Version information generator for CI integration
#[derive(Debug)]
pub struct VersionGenerator {
    fs_utils: FileSystemUtils,
    commit_tag: Option<String>,
    job_id: Option<String>,
}

/// Complete version information structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionInfo {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Space separated module list
    pub modules: String,
    /// File name of the archive a build produces
    pub artifact: String,
    /// Git tag version (from CI_COMMIT_TAG or fallback to version)
    pub tag_version: String,
    /// Build job ID (from CI_JOB_ID or "local")
    pub build_job_id: String,
    /// Build timestamp in RFC3339 format
    pub build_date: String,
}

impl VersionGenerator {
    /// Create a version generator reading CI values from the environment
    pub fn new() -> Self {
        Self::with_ci_values(env::var("CI_COMMIT_TAG").ok(), env::var("CI_JOB_ID").ok())
    }

    /// Create a version generator with explicit CI values
    pub fn with_ci_values(commit_tag: Option<String>, job_id: Option<String>) -> Self {
        Self {
            fs_utils: FileSystemUtils::new(),
            commit_tag,
            job_id,
        }
    }

    /// Generate the version information file for a descriptor
    #[instrument(skip(self, descriptor, output_file))]
    pub fn generate<P: AsRef<Path>>(
        &self,
        descriptor: &PackageDescriptor,
        output_file: P,
    ) -> Result<VersionInfo> {
        let output_file = output_file.as_ref();
        info!(
            "Generating version information to: {}",
            output_file.display()
        );

        let version_info = self.create_version_info(descriptor);
        let env_content = Self::format_as_env_file(&version_info);

        self.fs_utils
            .write_file(output_file, env_content.as_bytes())
            .map_err(|e| BuilderError::file_system("write", output_file.to_path_buf(), e))?;

        debug!("Generated version info: {:?}", version_info);
        Ok(version_info)
    }

    fn create_version_info(&self, descriptor: &PackageDescriptor) -> VersionInfo {
        VersionInfo {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            modules: descriptor.modules.join(" "),
            artifact: descriptor.archive_name(),
            tag_version: self
                .commit_tag
                .clone()
                .unwrap_or_else(|| descriptor.version.clone()),
            build_job_id: self.job_id.clone().unwrap_or_else(|| "local".to_string()),
            build_date: Utc::now().to_rfc3339(),
        }
    }

    /// Format version information as environment file (.env format)
    fn format_as_env_file(info: &VersionInfo) -> String {
        format!(
            r#"NAME={}
VERSION={}
MODULES="{}"
ARTIFACT={}
TAG_VERSION={}
BUILD_JOB_ID={}
BUILD_DATE={}
"#,
            info.name,
            info.version,
            info.modules,
            info.artifact,
            info.tag_version,
            info.build_job_id,
            info.build_date,
        )
    }
}

impl Default for VersionGenerator {
    fn default() -> Self {
        Self::new()
    }
}
