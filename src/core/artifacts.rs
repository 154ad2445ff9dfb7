//! Artifact writing functionality
//!
//! Renders the package's core metadata and turns a staging tree into a
//! gzip-compressed tarball with a SHA-256 checksum next to it.

use crate::{
    config::ArtifactConfig,
    core::builder::BuildPlan,
    error::{BuilderError, Result},
    utils::fs::FileSystemUtils,
};
use flate2::{Compression, write::GzEncoder};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Core metadata version written to `PKG-INFO`
pub const METADATA_VERSION: &str = "2.1";

/// File name of the core metadata inside the archive
pub const PKG_INFO: &str = "PKG-INFO";

/// Writes distributable archives from staging trees
pub struct ArtifactWriter {
    config: ArtifactConfig,
    fs_utils: FileSystemUtils,
}

/// A distributable archive produced by a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Path of the `.tar.gz` archive
    pub archive_path: PathBuf,
    /// Path of the checksum file, when written
    pub checksum_path: Option<PathBuf>,
    /// Modules shipped as sources
    pub modules: Vec<String>,
    /// Compiled extensions, relative to the archive root
    pub extensions: Vec<PathBuf>,
    /// Lowercase hex SHA-256 of the archive
    pub sha256: String,
    /// Archive size in bytes
    pub size: u64,
}

impl Artifact {
    /// Summary of what the archive holds
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            file_name: self
                .archive_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            name: self.name.clone(),
            version: self.version.clone(),
            modules: self.modules.len(),
            extensions: self.extensions.len(),
            size: self.size,
            sha256: self.sha256.clone(),
        }
    }
}

impl ArtifactWriter {
    /// Create a new artifact writer
    pub fn new(config: ArtifactConfig) -> Self {
        Self {
            config,
            fs_utils: FileSystemUtils::new(),
        }
    }

    /// Render core metadata for a package and its long description
    pub fn pkg_info(plan: &BuildPlan) -> String {
        let descriptor = &plan.descriptor;
        let mut content = format!(
            "Metadata-Version: {METADATA_VERSION}\nName: {}\nVersion: {}\n",
            descriptor.name, descriptor.version
        );

        if let Some(content_type) = &descriptor.description_content_type {
            content.push_str(&format!("Description-Content-Type: {content_type}\n"));
        }

        content.push('\n');
        content.push_str(&plan.description.content);
        content
    }

    /// Write `PKG-INFO` into the staging tree
    #[instrument(skip(self, plan))]
    pub fn write_pkg_info(&self, staging: &Path, plan: &BuildPlan) -> Result<PathBuf> {
        let path = staging.join(PKG_INFO);
        self.fs_utils
            .write_file(&path, Self::pkg_info(plan))
            .map_err(|e| BuilderError::file_system("write", &path, e))?;
        Ok(path)
    }

    /// Archive the staging tree into the output directory
    #[instrument(skip(self, plan, extensions))]
    pub fn write(
        &self,
        plan: &BuildPlan,
        staging: &Path,
        extensions: Vec<PathBuf>,
    ) -> Result<Artifact> {
        let descriptor = &plan.descriptor;
        let output_dir = &self.config.output_dir;

        self.fs_utils.create_dir_all(output_dir).map_err(|e| {
            BuilderError::artifact(
                format!("Failed to create output directory: {e}"),
                output_dir,
            )
        })?;

        let archive_path = output_dir.join(descriptor.archive_name());
        let partial_path = output_dir.join(format!("{}.partial", descriptor.archive_name()));

        let written = create_archive(&partial_path, &descriptor.stem(), staging)
            .map_err(|e| {
                BuilderError::artifact(format!("Failed to write archive: {e}"), &partial_path)
            })
            .and_then(|()| {
                fs::rename(&partial_path, &archive_path)
                    .map_err(|e| BuilderError::file_system("rename", &partial_path, e))
            });
        if let Err(e) = written {
            if let Err(remove_err) = self.fs_utils.remove_file_if_exists(&partial_path) {
                warn!(
                    "Could not remove partial archive {}: {}",
                    partial_path.display(),
                    remove_err
                );
            }
            return Err(e);
        }

        let sha256 = compute_sha256(&archive_path)
            .map_err(|e| BuilderError::file_system("hash", &archive_path, e))?;
        let size = self
            .fs_utils
            .file_size(&archive_path)
            .map_err(|e| BuilderError::file_system("stat", &archive_path, e))?;

        let checksum_path = if self.config.write_checksum {
            Some(self.write_checksum(&archive_path, &descriptor.archive_name(), &sha256)?)
        } else {
            None
        };

        info!("Wrote {} ({} bytes)", archive_path.display(), size);

        Ok(Artifact {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            archive_path,
            checksum_path,
            modules: descriptor.modules.clone(),
            extensions,
            sha256,
            size,
        })
    }

    /// Write a `sha256sum`-compatible checksum file next to the archive
    fn write_checksum(&self, archive_path: &Path, file_name: &str, sha256: &str) -> Result<PathBuf> {
        let mut checksum_path = archive_path.as_os_str().to_owned();
        checksum_path.push(".sha256");
        let checksum_path = PathBuf::from(checksum_path);

        self.fs_utils
            .write_file(&checksum_path, format!("{sha256}  {file_name}\n"))
            .map_err(|e| BuilderError::file_system("write", &checksum_path, e))?;

        debug!("Wrote checksum {}", checksum_path.display());
        Ok(checksum_path)
    }
}

/// Create a `.tar.gz` archive holding `staging` under the directory `stem`
fn create_archive(output_path: &Path, stem: &str, staging: &Path) -> io::Result<()> {
    let output_file = File::create(output_path)?;
    let encoder = GzEncoder::new(output_file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    archive.mode(tar::HeaderMode::Deterministic);

    append_sorted(&mut archive, Path::new(stem), staging)?;

    let encoder = archive.into_inner()?;
    encoder.finish()?;
    Ok(())
}

/// Append `dir` under `name`, walking entries in file name order
fn append_sorted<W: Write>(archive: &mut tar::Builder<W>, name: &Path, dir: &Path) -> io::Result<()> {
    archive.append_dir(name, dir)?;

    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let entry_name = name.join(entry.file_name());
        if path.is_dir() {
            append_sorted(archive, &entry_name, &path)?;
        } else {
            archive.append_path_with_name(&path, &entry_name)?;
        }
    }
    Ok(())
}

/// Compute the lowercase hex SHA-256 digest of a file
fn compute_sha256(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Summary of a written artifact
#[derive(Debug, Default)]
pub struct ArtifactSummary {
    /// Archive file name
    pub file_name: String,
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Number of source modules
    pub modules: usize,
    /// Number of compiled extensions
    pub extensions: usize,
    /// Archive size in bytes
    pub size: u64,
    /// Archive digest
    pub sha256: String,
}

impl std::fmt::Display for ArtifactSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Built {} {}: {} ({} bytes, {} module(s), {} extension(s), sha256 {})",
            self.name,
            self.version,
            self.file_name,
            self.size,
            self.modules,
            self.extensions,
            self.sha256
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        builder::{Description, ModuleSource},
        descriptor::PackageDescriptor,
    };
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn create_test_plan(content_type: Option<&str>) -> BuildPlan {
        let mut descriptor =
            PackageDescriptor::new("c2f", "1.0.1", vec!["c2f".to_string()], "README.rst");
        descriptor.description_content_type = content_type.map(str::to_string);

        BuildPlan {
            descriptor,
            sources: vec![ModuleSource {
                module: "c2f".to_string(),
                relative: PathBuf::from("c2f.py"),
                path: PathBuf::from("/src/c2f.py"),
            }],
            description: Description {
                path: PathBuf::from("/src/README.rst"),
                file_name: PathBuf::from("README.rst"),
                content: "c2f\n===\n".to_string(),
            },
        }
    }

    fn create_test_config(temp_dir: &TempDir) -> ArtifactConfig {
        ArtifactConfig {
            output_dir: temp_dir.path().join("dist"),
            ..ArtifactConfig::default()
        }
    }

    #[test]
    fn test_pkg_info_with_content_type() {
        let content = ArtifactWriter::pkg_info(&create_test_plan(Some("text/plain")));
        assert_eq!(
            content,
            "Metadata-Version: 2.1\nName: c2f\nVersion: 1.0.1\n\
             Description-Content-Type: text/plain\n\nc2f\n===\n"
        );
    }

    #[test]
    fn test_pkg_info_without_content_type() {
        let content = ArtifactWriter::pkg_info(&create_test_plan(None));
        assert!(!content.contains("Description-Content-Type"));
        assert!(content.starts_with("Metadata-Version: 2.1\nName: c2f\nVersion: 1.0.1\n\n"));
    }

    #[test]
    fn test_write_archive_and_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("stage");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("c2f.py"), "x = 1\n").unwrap();

        let plan = create_test_plan(None);
        let writer = ArtifactWriter::new(create_test_config(&temp_dir));
        writer.write_pkg_info(&staging, &plan).unwrap();
        let artifact = writer.write(&plan, &staging, Vec::new()).unwrap();

        assert_eq!(artifact.archive_path, temp_dir.path().join("dist/c2f-1.0.1.tar.gz"));
        assert_eq!(artifact.sha256.len(), 64);
        assert_eq!(artifact.size, fs::metadata(&artifact.archive_path).unwrap().len());
        assert!(!temp_dir.path().join("dist/c2f-1.0.1.tar.gz.partial").exists());

        let checksum_path = artifact.checksum_path.clone().unwrap();
        assert_eq!(
            fs::read_to_string(checksum_path).unwrap(),
            format!("{}  c2f-1.0.1.tar.gz\n", artifact.sha256)
        );
        assert_eq!(compute_sha256(&artifact.archive_path).unwrap(), artifact.sha256);

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&artifact.archive_path).unwrap()));
        let mut pkg_info = String::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap() == Path::new("c2f-1.0.1/PKG-INFO") {
                entry.read_to_string(&mut pkg_info).unwrap();
            }
        }
        assert!(pkg_info.contains("Version: 1.0.1\n"));
    }

    #[test]
    fn test_checksum_can_be_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("stage");
        fs::create_dir_all(&staging).unwrap();

        let config = ArtifactConfig {
            write_checksum: false,
            ..create_test_config(&temp_dir)
        };
        let artifact = ArtifactWriter::new(config)
            .write(&create_test_plan(None), &staging, Vec::new())
            .unwrap();

        assert!(artifact.checksum_path.is_none());
        assert!(!temp_dir.path().join("dist/c2f-1.0.1.tar.gz.sha256").exists());
    }

    #[test]
    fn test_failed_archive_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(create_test_config(&temp_dir));

        let result = writer.write(
            &create_test_plan(None),
            &temp_dir.path().join("missing-stage"),
            Vec::new(),
        );

        assert!(matches!(result, Err(BuilderError::Artifact { .. })));
        assert!(!temp_dir.path().join("dist/c2f-1.0.1.tar.gz.partial").exists());
        assert!(!temp_dir.path().join("dist/c2f-1.0.1.tar.gz").exists());
    }

    #[test]
    fn test_summary_display() {
        let artifact = Artifact {
            name: "c2f".to_string(),
            version: "1.0.3".to_string(),
            archive_path: PathBuf::from("dist/c2f-1.0.3.tar.gz"),
            checksum_path: None,
            modules: vec!["c2f".to_string()],
            extensions: vec![PathBuf::from("c2f.cpython-312-x86_64-linux-gnu.so")],
            sha256: "ab".repeat(32),
            size: 2048,
        };

        assert_eq!(
            artifact.summary().to_string(),
            format!(
                "Built c2f 1.0.3: c2f-1.0.3.tar.gz (2048 bytes, 1 module(s), 1 extension(s), sha256 {})",
                "ab".repeat(32)
            )
        );
    }
}
