//! Manifest generation
//!
//! Documents are structured `serde_json::Value` trees. Map keys are kept
//! sorted, so rendering the same input always yields the same bytes and
//! re-applying after a wizard re-run is a no-op on the cluster.

mod ingress;
mod storage;

pub use ingress::{
    ExposureMode, IngressPlacementConfig, NODE_PORT_RANGE, TRAEFIK_DEPLOYMENT, TRAEFIK_NAMESPACE,
    render_ingress_placement,
};
pub use storage::{
    DEFAULT_PROVISIONER_IMAGE, PROVISIONER_DEPLOYMENT, PROVISIONER_NAME, PROVISIONER_NAMESPACE,
    StorageConfig, render_storage_stack,
};

use serde_json::Value;

/// One Kubernetes object
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument(Value);

impl ManifestDocument {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn kind(&self) -> &str {
        self.0["kind"].as_str().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0["metadata"]["name"].as_str().unwrap_or_default()
    }

    /// `Kind/name`, as kubectl prints it
    pub fn describe(&self) -> String {
        format!("{}/{}", self.kind(), self.name())
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.0)
    }
}

/// Join documents into one multi-document YAML stream
pub fn to_yaml_stream(docs: &[ManifestDocument]) -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    for doc in docs {
        out.push_str("---\n");
        out.push_str(&doc.to_yaml()?);
    }
    Ok(out)
}
