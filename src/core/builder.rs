//! Package building functionality
//!
//! Resolves module sources and the long description, stages them, runs the
//! optional compiler and hands the staging tree to the artifact writer.

use crate::{
    config::Config,
    core::{
        artifacts::{Artifact, ArtifactWriter},
        descriptor::{CompileConfig, PackageDescriptor},
    },
    error::{BuilderError, Result},
    utils::{fs::FileSystemUtils, process::ProcessRunner},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};

/// A module source located on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// Dotted module identifier
    pub module: String,
    /// Source path relative to the work directory
    pub relative: PathBuf,
    /// Resolved source path
    pub path: PathBuf,
}

/// Long description read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    /// Resolved path of the description file
    pub path: PathBuf,
    /// File name the description is shipped under
    pub file_name: PathBuf,
    /// Full text
    pub content: String,
}

/// Every input of a build, resolved and read
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Descriptor being built
    pub descriptor: PackageDescriptor,
    /// Module sources in declaration order
    pub sources: Vec<ModuleSource>,
    /// Long description
    pub description: Description,
}

/// Package builder that stages, compiles and packages modules
pub struct PackageBuilder {
    config: Config,
    process_runner: ProcessRunner,
    fs_utils: FileSystemUtils,
    writer: ArtifactWriter,
}

impl PackageBuilder {
    /// Create a new package builder with the given configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            process_runner: ProcessRunner::new(config.debug),
            fs_utils: FileSystemUtils::new(),
            writer: ArtifactWriter::new(config.artifacts.clone()),
            config,
        }
    }

    /// Resolve every input of a build without writing anything
    #[instrument(skip(self, descriptor), fields(package = %descriptor.name))]
    pub fn plan(&self, descriptor: &PackageDescriptor) -> Result<BuildPlan> {
        let mut sources = Vec::with_capacity(descriptor.modules.len());

        for module in &descriptor.modules {
            let relative = descriptor.module_source_path(module);
            let path = self.config.resolve(&relative);

            if !self.fs_utils.is_file(&path) {
                return Err(BuilderError::missing_source(module.clone(), path));
            }

            debug!("Module {} -> {}", module, path.display());
            sources.push(ModuleSource {
                module: module.clone(),
                relative,
                path,
            });
        }

        let description = self.read_description(descriptor)?;

        if let Some(compile) = &descriptor.compile {
            let command = self.compiler_command(compile);
            if !self.process_runner.command_exists(&command) {
                return Err(BuilderError::build(format!(
                    "Compiler '{}' was not found",
                    compile.command
                )));
            }
        }

        Ok(BuildPlan {
            descriptor: descriptor.clone(),
            sources,
            description,
        })
    }

    fn read_description(&self, descriptor: &PackageDescriptor) -> Result<Description> {
        let path = self.config.resolve(&descriptor.description_file);

        let content = self
            .fs_utils
            .read_file_to_string(&path)
            .map_err(|e| BuilderError::missing_description_file(&path, e))?;

        let file_name = path.file_name().map(PathBuf::from).ok_or_else(|| {
            BuilderError::validation(format!(
                "Description path has no file name: {}",
                path.display()
            ))
        })?;

        debug!(
            "Read description {} ({} bytes)",
            path.display(),
            content.len()
        );

        Ok(Description {
            path,
            file_name,
            content,
        })
    }

    /// Build the distributable archive for a descriptor
    #[instrument(skip(self, descriptor), fields(package = %descriptor.name, version = %descriptor.version))]
    pub fn build(&self, descriptor: &PackageDescriptor) -> Result<Artifact> {
        info!("Building package: {} {}", descriptor.name, descriptor.version);

        let plan = self.plan(descriptor)?;
        let staging = self.staging_dir(descriptor);

        self.fs_utils
            .remove_dir_all_if_exists(&staging)
            .map_err(|e| BuilderError::file_system("remove", &staging, e))?;
        self.fs_utils
            .create_dir_all(&staging)
            .map_err(|e| BuilderError::file_system("create", &staging, e))?;

        let result = self.assemble(&plan, &staging);

        // the staging tree goes away on failure too, unless asked to keep it
        if !self.config.build.keep_build_dir {
            if let Err(e) = self.fs_utils.remove_dir_all_if_exists(&staging) {
                warn!("Could not remove staging directory {}: {}", staging.display(), e);
            }
        }

        let artifact = result?;
        info!("{}", artifact.summary());
        Ok(artifact)
    }

    fn assemble(&self, plan: &BuildPlan, staging: &Path) -> Result<Artifact> {
        self.stage_sources(plan, staging)?;

        let extensions = match &plan.descriptor.compile {
            Some(compile) => self.compile_all(compile, plan, staging)?,
            None => {
                debug!("No compiler configured, shipping pure sources");
                Vec::new()
            }
        };

        self.writer.write_pkg_info(staging, plan)?;
        self.writer.write(plan, staging, extensions)
    }

    /// Staging directory of a descriptor
    pub fn staging_dir(&self, descriptor: &PackageDescriptor) -> PathBuf {
        self.config.build.build_dir.join(descriptor.stem())
    }

    fn stage_sources(&self, plan: &BuildPlan, staging: &Path) -> Result<()> {
        for source in &plan.sources {
            let destination = staging.join(&source.relative);
            self.fs_utils
                .copy_file(&source.path, &destination)
                .map_err(|e| BuilderError::file_system("copy", &source.path, e))?;
        }

        let destination = staging.join(&plan.description.file_name);
        self.fs_utils
            .write_file(&destination, plan.description.content.as_bytes())
            .map_err(|e| BuilderError::file_system("write", &destination, e))?;

        Ok(())
    }

    fn compile_all(
        &self,
        compile: &CompileConfig,
        plan: &BuildPlan,
        staging: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut extensions = Vec::new();

        for source in &plan.sources {
            for output in self.compile_module(compile, &plan.descriptor, source)? {
                let relative = match output.strip_prefix(&self.config.work_dir) {
                    Ok(relative) => relative.to_path_buf(),
                    Err(_) => output.file_name().map(PathBuf::from).ok_or_else(|| {
                        BuilderError::build(format!(
                            "Compiled output has no file name: {}",
                            output.display()
                        ))
                    })?,
                };

                let destination = staging.join(&relative);
                self.fs_utils
                    .copy_file(&output, &destination)
                    .map_err(|e| BuilderError::file_system("copy", &output, e))?;
                extensions.push(relative);
            }
        }

        extensions.sort();
        extensions.dedup();
        Ok(extensions)
    }

    /// Run the compiler for one module and return the files it produced
    #[instrument(skip(self, compile, descriptor, source), fields(module = %source.module))]
    fn compile_module(
        &self,
        compile: &CompileConfig,
        descriptor: &PackageDescriptor,
        source: &ModuleSource,
    ) -> Result<Vec<PathBuf>> {
        info!("Compiling module {}", source.module);

        let vars = self.placeholders(source);
        let args: Vec<String> = compile.args.iter().map(|a| substitute(a, &vars)).collect();
        let args_str: Vec<&str> = args.iter().map(String::as_str).collect();

        let mut env_vars = vec![
            ("PACKAGE_NAME".to_string(), descriptor.name.clone()),
            ("PACKAGE_VERSION".to_string(), descriptor.version.clone()),
        ];
        env_vars.extend(compile.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        // outputs already on disk only count if the compiler rewrites them
        let existing = self.output_snapshot(compile, &vars)?;

        let command = self.compiler_command(compile);
        let result = self
            .process_runner
            .run_command_with_output_in(&command, &args_str, &env_vars, Some(&self.config.work_dir))
            .map_err(|e| {
                BuilderError::build_with_source(
                    format!("Compiling module '{}' failed", source.module),
                    e,
                )
            })?;

        for line in result.stdout.lines().chain(result.stderr.lines()) {
            debug!("[{}] {}", source.module, line);
        }

        let outputs: Vec<PathBuf> = self
            .find_compiled_outputs(compile, &vars)?
            .into_iter()
            .filter(|path| match existing.get(path) {
                None => true,
                Some(before) => {
                    let fresh = self.fs_utils.modified(path).ok().as_ref() > before.as_ref();
                    if !fresh {
                        warn!("Ignoring stale compiler output {}", path.display());
                    }
                    fresh
                }
            })
            .collect();
        if outputs.is_empty() {
            return Err(BuilderError::build(format!(
                "Compiler produced no output for module '{}' (looked for {:?})",
                source.module, compile.outputs
            )));
        }

        debug!("Compiled outputs for {}: {:?}", source.module, outputs);
        Ok(outputs)
    }

    fn placeholders(&self, source: &ModuleSource) -> Vec<(&'static str, String)> {
        vec![
            ("source", source.relative.to_string_lossy().into_owned()),
            ("module", source.module.clone()),
            (
                "module_path",
                PackageDescriptor::module_stem_path(&source.module)
                    .to_string_lossy()
                    .into_owned(),
            ),
            (
                "build_dir",
                self.config.build.build_dir.to_string_lossy().into_owned(),
            ),
        ]
    }

    /// Commands given as a path are resolved against the work directory
    fn compiler_command(&self, compile: &CompileConfig) -> String {
        if compile.command.contains('/') || compile.command.contains(std::path::MAIN_SEPARATOR) {
            self.config
                .resolve(Path::new(&compile.command))
                .to_string_lossy()
                .into_owned()
        } else {
            compile.command.clone()
        }
    }

    fn output_snapshot(
        &self,
        compile: &CompileConfig,
        vars: &[(&'static str, String)],
    ) -> Result<BTreeMap<PathBuf, Option<SystemTime>>> {
        Ok(self
            .find_compiled_outputs(compile, vars)?
            .into_iter()
            .map(|path| {
                let modified = self.fs_utils.modified(&path).ok();
                (path, modified)
            })
            .collect())
    }

    fn find_compiled_outputs(
        &self,
        compile: &CompileConfig,
        vars: &[(&'static str, String)],
    ) -> Result<Vec<PathBuf>> {
        let mut outputs = Vec::new();

        for template in &compile.outputs {
            let pattern = self.glob_in(&self.config.work_dir, &substitute(template, vars));
            let paths = glob::glob(&pattern).map_err(|e| {
                BuilderError::build_with_source(format!("Invalid output pattern '{template}'"), e)
            })?;

            for path_result in paths {
                match path_result {
                    Ok(path) if path.is_file() => outputs.push(path),
                    Ok(path) => debug!("Skipping non-file output {}", path.display()),
                    Err(e) => warn!("Error reading output path for {}: {}", template, e),
                }
            }
        }

        outputs.sort();
        outputs.dedup();
        Ok(outputs)
    }

    fn glob_in(&self, base: &Path, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            format!(
                "{}/{}",
                glob::Pattern::escape(&base.to_string_lossy()),
                pattern
            )
        }
    }

    /// Remove staging trees, archives and checksums of the package, any version
    #[instrument(skip(self, descriptor), fields(package = %descriptor.name))]
    pub fn clean(&self, descriptor: &PackageDescriptor) -> Result<usize> {
        info!("Cleaning previous build output for {}", descriptor.name);

        let prefix = format!("{}-*", descriptor.normalized_name());
        let mut removed = 0;

        let staging_pattern = self.glob_in(&self.config.build.build_dir, &prefix);
        for path in self.matching_paths(&staging_pattern)? {
            if path.is_dir() {
                match self.fs_utils.remove_dir_all_if_exists(&path) {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => return Err(BuilderError::file_system("remove", &path, e)),
                }
            }
        }

        for suffix in [".tar.gz", ".tar.gz.sha256", ".tar.gz.partial"] {
            let pattern = self.glob_in(
                &self.config.artifacts.output_dir,
                &format!("{prefix}{suffix}"),
            );
            for path in self.matching_paths(&pattern)? {
                match self.fs_utils.remove_file_if_exists(&path) {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => return Err(BuilderError::file_system("remove", &path, e)),
                }
            }
        }

        info!("Removed {} path(s)", removed);
        Ok(removed)
    }

    fn matching_paths(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let paths = glob::glob(pattern).map_err(|e| {
            BuilderError::build_with_source(format!("Invalid pattern '{pattern}'"), e)
        })?;

        Ok(paths
            .filter_map(|p| match p {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Error reading path for pattern {}: {}", pattern, e);
                    None
                }
            })
            .collect())
    }
}

/// Replace `{key}` placeholders in a template
fn substitute(template: &str, vars: &[(&'static str, String)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}
