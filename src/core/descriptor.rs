//! Package descriptor loading and validation
//!
//! A descriptor is a small TOML document naming the package, its version,
//! the modules it ships and the file holding its long description.

use crate::error::{BuilderError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Default file suffix of module sources
pub const DEFAULT_SOURCE_SUFFIX: &str = "py";

/// External compiler invocation used to turn module sources into extensions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompileConfig {
    /// Compiler executable
    pub command: String,
    /// Arguments; `{source}`, `{module}`, `{module_path}` and `{build_dir}` are substituted
    #[serde(default)]
    pub args: Vec<String>,
    /// Glob patterns (relative to the work directory) locating compiled outputs
    #[serde(default = "default_outputs")]
    pub outputs: Vec<String>,
    /// Extra environment for the compiler
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_outputs() -> Vec<String> {
    vec![
        "{module_path}.*.so".to_string(),
        "{module_path}.*.pyd".to_string(),
    ]
}

/// Validated package metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Distribution name
    pub name: String,
    /// Version string
    pub version: String,
    /// Modules shipped by the package, unique and in declaration order
    pub modules: Vec<String>,
    /// File whose content becomes the long description
    pub description_file: PathBuf,
    /// MIME type of the long description, if declared
    pub description_content_type: Option<String>,
    /// Suffix of module source files, without the dot
    pub source_suffix: String,
    /// Optional compilation step
    pub compile: Option<CompileConfig>,
}

impl PackageDescriptor {
    /// Create a descriptor for pure-source modules with no declared content type
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        modules: Vec<String>,
        description_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            modules,
            description_file: description_file.into(),
            description_content_type: None,
            source_suffix: DEFAULT_SOURCE_SUFFIX.to_string(),
            compile: None,
        }
    }

    /// Relative path of a module without its suffix (`a.b` becomes `a/b`)
    pub fn module_stem_path(module: &str) -> PathBuf {
        module.split('.').collect()
    }

    /// Relative path of a module's source file
    pub fn module_source_path(&self, module: &str) -> PathBuf {
        Self::module_stem_path(module).with_extension(&self.source_suffix)
    }

    /// Name with `-` and `.` folded to `_`, as used in file names
    pub fn normalized_name(&self) -> String {
        self.name.replace(['-', '.'], "_")
    }

    /// Top-level directory name inside the archive
    pub fn stem(&self) -> String {
        format!("{}-{}", self.normalized_name(), self.version)
    }

    /// File name of the distributable archive
    pub fn archive_name(&self) -> String {
        format!("{}.tar.gz", self.stem())
    }
}

/// On-disk shape of a descriptor before validation
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescriptor {
    name: String,
    version: String,
    #[serde(alias = "py_modules")]
    modules: Vec<String>,
    #[serde(alias = "long_description_file")]
    description_file: PathBuf,
    #[serde(
        default,
        alias = "description_format",
        alias = "long_description_content_type"
    )]
    description_content_type: Option<String>,
    #[serde(default)]
    source_suffix: Option<String>,
    #[serde(default)]
    compile: Option<CompileConfig>,
}

/// Loader that parses and validates descriptor files
pub struct DescriptorLoader {
    /// Regex for distribution names
    re_name: Regex,
    /// Regex for version strings
    re_version: Regex,
    /// Regex for dotted module identifiers
    re_module: Regex,
    /// Regex for accepted description content types
    re_content_type: Regex,
}

impl DescriptorLoader {
    /// Create a new descriptor loader
    pub fn new() -> Result<Self> {
        Ok(Self {
            re_name: compile_regex(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$")?,
            re_version: compile_regex(
                r"^[0-9]+(?:\.[0-9]+)*(?:(?:a|b|rc)[0-9]+)?(?:\.post[0-9]+)?(?:\.dev[0-9]+)?$",
            )?,
            re_module: compile_regex(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")?,
            re_content_type: compile_regex(
                r"(?i)^text/(?:plain|x-rst|markdown)[ \t]*(?:;[ \t]*[a-z0-9_-]+[ \t]*=[ \t]*[a-z0-9_.-]+[ \t]*)*$",
            )?,
        })
    }

    /// Load a descriptor file and validate its content
    #[instrument(skip(self))]
    pub fn load<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> Result<PackageDescriptor> {
        let path = path.as_ref();
        debug!("Loading descriptor: {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| BuilderError::file_system("read", path.to_path_buf(), e))?;

        self.parse_str(&content, path)
    }

    /// Parse descriptor text; `path` is only used for error reporting
    pub fn parse_str(&self, content: &str, path: &Path) -> Result<PackageDescriptor> {
        let raw: RawDescriptor = toml::from_str(content).map_err(|e| BuilderError::DescriptorParse {
            message: e.to_string().trim().to_string(),
            path: path.to_path_buf(),
            source: Some(Box::new(e)),
        })?;

        let descriptor = self.validate(raw, path)?;
        debug!(
            "Parsed descriptor: name='{}', version='{}', modules={:?}",
            descriptor.name, descriptor.version, descriptor.modules
        );
        Ok(descriptor)
    }

    fn validate(&self, raw: RawDescriptor, path: &Path) -> Result<PackageDescriptor> {
        let name = raw.name.trim().to_string();
        if !self.re_name.is_match(&name) {
            return Err(BuilderError::validation(format!(
                "Invalid package name '{name}' in {}",
                path.display()
            )));
        }

        let version = raw.version.trim().to_string();
        if !self.re_version.is_match(&version) {
            return Err(BuilderError::validation(format!(
                "Invalid version '{version}' in {}: expected a dotted numeric version such as 1.0.1",
                path.display()
            )));
        }

        let modules = self.validate_modules(raw.modules, path)?;

        if raw.description_file.as_os_str().is_empty() {
            return Err(BuilderError::validation(format!(
                "description_file must not be empty in {}",
                path.display()
            )));
        }

        let description_content_type = match raw.description_content_type {
            Some(content_type) => Some(self.validate_content_type(&content_type, path)?),
            None => None,
        };

        let source_suffix = match raw.source_suffix {
            Some(suffix) => validate_suffix(&suffix, path)?,
            None => DEFAULT_SOURCE_SUFFIX.to_string(),
        };

        if let Some(compile) = &raw.compile {
            if compile.command.trim().is_empty() {
                return Err(BuilderError::validation(format!(
                    "compile.command must not be empty in {}",
                    path.display()
                )));
            }
            if compile.outputs.is_empty() {
                return Err(BuilderError::validation(format!(
                    "compile.outputs must list at least one pattern in {}",
                    path.display()
                )));
            }
        }

        Ok(PackageDescriptor {
            name,
            version,
            modules,
            description_file: raw.description_file,
            description_content_type,
            source_suffix,
            compile: raw.compile,
        })
    }

    fn validate_modules(&self, declared: Vec<String>, path: &Path) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(declared.len());

        for module in declared {
            let module = module.trim().to_string();
            if !self.re_module.is_match(&module) {
                return Err(BuilderError::validation(format!(
                    "Invalid module identifier '{module}' in {}",
                    path.display()
                )));
            }
            if !seen.insert(module.clone()) {
                warn!("Module '{}' is listed more than once, ignoring duplicate", module);
                continue;
            }
            modules.push(module);
        }

        if modules.is_empty() {
            return Err(BuilderError::validation(format!(
                "No modules declared in {}",
                path.display()
            )));
        }

        Ok(modules)
    }

    fn validate_content_type(&self, content_type: &str, path: &Path) -> Result<String> {
        let content_type = content_type.trim();
        if !self.re_content_type.is_match(content_type) {
            return Err(BuilderError::validation(format!(
                "Unsupported description content type '{content_type}' in {}: \
                 expected text/plain, text/x-rst or text/markdown",
                path.display()
            )));
        }
        Ok(content_type.to_string())
    }
}

fn validate_suffix(suffix: &str, path: &Path) -> Result<String> {
    let suffix = suffix.trim().trim_start_matches('.');
    if suffix.is_empty() || suffix.contains(['/', '\\']) {
        return Err(BuilderError::validation(format!(
            "Invalid source_suffix '{suffix}' in {}",
            path.display()
        )));
    }
    Ok(suffix.to_string())
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| BuilderError::config(format!("Failed to compile regex: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    fn parse(content: &str) -> Result<PackageDescriptor> {
        DescriptorLoader::new()
            .unwrap()
            .parse_str(content, Path::new("package.toml"))
    }

    #[test]
    fn test_load_descriptor_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"
name = "c2f"
version = "1.0.1"
modules = ["c2f"]
description_file = "README.rst"
description_content_type = "text/plain"
"#,
        )
        .unwrap();

        let descriptor = DescriptorLoader::new().unwrap().load(file.path()).unwrap();

        assert_eq!(descriptor.name, "c2f");
        assert_eq!(descriptor.version, "1.0.1");
        assert_eq!(descriptor.modules, vec!["c2f"]);
        assert_eq!(descriptor.description_file, PathBuf::from("README.rst"));
        assert_eq!(descriptor.description_content_type.as_deref(), Some("text/plain"));
        assert_eq!(descriptor.source_suffix, "py");
        assert!(descriptor.compile.is_none());
    }

    #[test]
    fn test_content_type_is_optional() {
        let descriptor = parse(
            r#"
name = "c2f"
version = "1.0.3"
py_modules = ["c2f"]
long_description_file = "README.rst"
"#,
        )
        .unwrap();

        assert_eq!(descriptor.version, "1.0.3");
        assert_eq!(descriptor.modules, vec!["c2f"]);
        assert!(descriptor.description_content_type.is_none());
    }

    #[test]
    fn test_compile_table_defaults() {
        let descriptor = parse(
            r#"
name = "c2f"
version = "1.0.1"
modules = ["c2f"]
description_file = "README.rst"

[compile]
command = "cythonize"
args = ["-i", "{source}"]
"#,
        )
        .unwrap();

        let compile = descriptor.compile.unwrap();
        assert_eq!(compile.command, "cythonize");
        assert_eq!(compile.args, vec!["-i", "{source}"]);
        assert_eq!(compile.outputs, default_outputs());
        assert!(compile.env.is_empty());
    }

    #[test]
    fn test_duplicate_modules_are_dropped() {
        let descriptor = parse(
            r#"
name = "c2f"
version = "1.0.1"
modules = ["c2f", "util.io", "c2f"]
description_file = "README.rst"
"#,
        )
        .unwrap();

        assert_eq!(descriptor.modules, vec!["c2f", "util.io"]);
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let result = parse(
            r#"
name = "c2f"
version = "one"
modules = ["c2f"]
description_file = "README.rst"
"#,
        );
        assert!(matches!(result, Err(BuilderError::Validation { .. })));
    }

    #[test]
    fn test_invalid_module_is_rejected() {
        let result = parse(
            r#"
name = "c2f"
version = "1.0.1"
modules = ["c2f/../etc"]
description_file = "README.rst"
"#,
        );
        assert!(matches!(result, Err(BuilderError::Validation { .. })));
    }

    #[test]
    fn test_empty_module_list_is_rejected() {
        let result = parse(
            r#"
name = "c2f"
version = "1.0.1"
modules = []
description_file = "README.rst"
"#,
        );
        assert!(matches!(result, Err(BuilderError::Validation { .. })));
    }

    #[test]
    fn test_unsupported_content_type_is_rejected() {
        let result = parse(
            r#"
name = "c2f"
version = "1.0.1"
modules = ["c2f"]
description_file = "README.rst"
description_content_type = "application/json"
"#,
        );
        assert!(matches!(result, Err(BuilderError::Validation { .. })));

        // a line break would start a new PKG-INFO header
        let result = parse(
            r#"
name = "c2f"
version = "1.0.1"
modules = ["c2f"]
description_file = "README.rst"
description_content_type = "text/plain\n; Name=evil"
"#,
        );
        assert!(matches!(result, Err(BuilderError::Validation { .. })));

        let accepted = parse(
            r#"
name = "c2f"
version = "1.0.1"
modules = ["c2f"]
description_file = "README.md"
description_format = "text/markdown; charset=UTF-8"
"#,
        )
        .unwrap();
        assert_eq!(
            accepted.description_content_type.as_deref(),
            Some("text/markdown; charset=UTF-8")
        );
    }

    #[test]
    fn test_missing_field_is_a_parse_error() {
        let result = parse(
            r#"
name = "c2f"
modules = ["c2f"]
description_file = "README.rst"
"#,
        );
        assert!(matches!(result, Err(BuilderError::DescriptorParse { .. })));
    }

    #[test]
    fn test_module_paths() {
        let mut descriptor =
            PackageDescriptor::new("c2f", "1.0.1", vec!["c2f".to_string()], "README.rst");
        assert_eq!(descriptor.module_source_path("c2f"), PathBuf::from("c2f.py"));
        assert_eq!(
            descriptor.module_source_path("pkg.sub"),
            Path::new("pkg").join("sub.py")
        );

        descriptor.source_suffix = "pyx".to_string();
        assert_eq!(descriptor.module_source_path("c2f"), PathBuf::from("c2f.pyx"));
    }

    #[test]
    fn test_archive_name_is_normalized() {
        let descriptor =
            PackageDescriptor::new("my-pkg.tools", "2.0", vec!["m".to_string()], "README.rst");
        assert_eq!(descriptor.stem(), "my_pkg_tools-2.0");
        assert_eq!(descriptor.archive_name(), "my_pkg_tools-2.0.tar.gz");
    }
}
