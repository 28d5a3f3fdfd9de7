//! Live cluster access
//!
//! Everything that talks to the API server goes through the two traits here,
//! so post-config can be driven against a fake in tests.

mod default_class;
mod kubectl;
mod status;

pub use default_class::{DefaultClassTransition, ensure_class_name_available, make_default};
pub use kubectl::Kubectl;
pub use status::show_status;

use super::Readiness;
use super::manifests::ManifestDocument;
use anyhow::Result;
use std::time::Duration;

pub const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";
pub const BETA_DEFAULT_CLASS_ANNOTATION: &str = "storageclass.beta.kubernetes.io/is-default-class";

/// What post-config needs to know about an existing StorageClass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClassInfo {
    pub name: String,
    pub provisioner: String,
    pub is_default: bool,
}

impl StorageClassInfo {
    pub fn new(name: &str, provisioner: &str, is_default: bool) -> Self {
        Self {
            name: name.to_string(),
            provisioner: provisioner.to_string(),
            is_default,
        }
    }
}

/// Applies rendered manifests and observes rollouts
pub trait ClusterApplier {
    /// Fails with `ExternalError::ClusterUnreachable` when no API server answers
    fn probe(&self) -> Result<()>;

    /// Declarative, idempotent apply of all documents in order
    fn apply(&self, docs: &[ManifestDocument]) -> Result<()>;

    /// Bounded wait for a deployment rollout
    fn wait_rollout(&self, namespace: &str, deployment: &str, timeout: Duration)
    -> Result<Readiness>;
}

/// Read and flip the default-class annotation on StorageClasses
pub trait StorageClassStore {
    fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>>;

    fn set_default(&self, name: &str, is_default: bool) -> Result<()>;
}
