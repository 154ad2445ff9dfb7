//! Core functionality for package building
//!
//! Contains descriptor loading, the build pipeline and archive writing.

pub mod artifacts;
pub mod builder;
pub mod descriptor;

pub use artifacts::{Artifact, ArtifactWriter};
pub use builder::{BuildPlan, PackageBuilder};
pub use descriptor::{DescriptorLoader, PackageDescriptor};
