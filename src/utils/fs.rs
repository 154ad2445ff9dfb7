//! File system utility functions
//!
//! Provides file operations used while staging and packaging, with
//! parent directories created on demand.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, instrument};

/// Utility struct for file system operations
#[derive(Debug)]
pub struct FileSystemUtils;

impl FileSystemUtils {
    /// Create a new file system utilities instance
    pub fn new() -> Self {
        Self
    }

    /// Copy a file from source to destination, preserving permissions
    #[instrument(skip(self))]
    pub fn copy_file<P: AsRef<Path> + std::fmt::Debug, Q: AsRef<Path> + std::fmt::Debug>(
        &self,
        src: P,
        dst: Q,
    ) -> io::Result<u64> {
        let src = src.as_ref();
        let dst = dst.as_ref();

        debug!("Copying file: {} -> {}", src.display(), dst.display());

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes_copied = fs::copy(src, dst)?;

        let metadata = fs::metadata(src)?;
        fs::set_permissions(dst, metadata.permissions())?;

        debug!("Successfully copied {} bytes", bytes_copied);
        Ok(bytes_copied)
    }

    /// Create directories recursively
    #[instrument(skip(self))]
    pub fn create_dir_all<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        debug!("Creating directory: {}", path.display());
        fs::create_dir_all(path)
    }

    /// Remove a file if it exists
    #[instrument(skip(self))]
    pub fn remove_file_if_exists<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        path: P,
    ) -> io::Result<bool> {
        let path = path.as_ref();

        match fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed file: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("File does not exist: {}", path.display());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove a directory and all its contents if it exists
    #[instrument(skip(self))]
    pub fn remove_dir_all_if_exists<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        path: P,
    ) -> io::Result<bool> {
        let path = path.as_ref();

        match fs::remove_dir_all(path) {
            Ok(()) => {
                debug!("Removed directory: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Directory does not exist: {}", path.display());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Check if a path exists and is a file
    pub fn is_file<P: AsRef<Path>>(&self, path: P) -> bool {
        path.as_ref().is_file()
    }

    /// Get file size in bytes
    #[instrument(skip(self))]
    pub fn file_size<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> io::Result<u64> {
        let metadata = fs::metadata(path.as_ref())?;
        Ok(metadata.len())
    }

    /// Last modification time of a file
    pub fn modified<P: AsRef<Path>>(&self, path: P) -> io::Result<SystemTime> {
        fs::metadata(path.as_ref())?.modified()
    }

    /// Write content to a file, creating parent directories if needed
    #[instrument(skip(self, contents))]
    pub fn write_file<P: AsRef<Path> + std::fmt::Debug, C: AsRef<[u8]>>(
        &self,
        path: P,
        contents: C,
    ) -> io::Result<()> {
        let path = path.as_ref();

        debug!("Writing file: {}", path.display());

        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Read file contents as string
    #[instrument(skip(self))]
    pub fn read_file_to_string<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        path: P,
    ) -> io::Result<String> {
        let path = path.as_ref();
        debug!("Reading file: {}", path.display());
        fs::read_to_string(path)
    }
}

impl Default for FileSystemUtils {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_copy_file_into_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let fs_utils = FileSystemUtils::new();

        let src = temp_dir.path().join("c2f.py");
        let dst = temp_dir.path().join("stage").join("pkg").join("c2f.py");

        fs::write(&src, "print('hi')\n").unwrap();

        let bytes_copied = fs_utils.copy_file(&src, &dst).unwrap();
        assert_eq!(bytes_copied, 12);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "print('hi')\n");
        assert!(src.exists());
    }

    #[test]
    fn test_remove_file_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let fs_utils = FileSystemUtils::new();

        let file_path = temp_dir.path().join("c2f-1.0.1.tar.gz");

        assert!(!fs_utils.remove_file_if_exists(&file_path).unwrap());

        fs::write(&file_path, "content").unwrap();
        assert!(fs_utils.remove_file_if_exists(&file_path).unwrap());
        assert!(!file_path.exists());
    }

    #[test]
    fn test_remove_dir_all_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let fs_utils = FileSystemUtils::new();

        let staging = temp_dir.path().join("build").join("c2f-1.0.1");
        assert!(!fs_utils.remove_dir_all_if_exists(&staging).unwrap());

        fs_utils.create_dir_all(staging.join("pkg")).unwrap();
        assert!(fs_utils.remove_dir_all_if_exists(&staging).unwrap());
        assert!(!staging.exists());
    }

    #[test]
    fn test_write_and_read_file() {
        let temp_dir = TempDir::new().unwrap();
        let fs_utils = FileSystemUtils::new();

        let file_path = temp_dir.path().join("subdir").join("PKG-INFO");
        let content = "Metadata-Version: 2.1\n";

        fs_utils.write_file(&file_path, content).unwrap();
        assert!(fs_utils.is_file(&file_path));
        assert_eq!(fs_utils.read_file_to_string(&file_path).unwrap(), content);
        assert_eq!(fs_utils.file_size(&file_path).unwrap(), content.len() as u64);
    }
}
