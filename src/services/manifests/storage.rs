//! NFS subdir external provisioner stack

use super::ManifestDocument;
use crate::error::CompileError;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

pub const PROVISIONER_NAMESPACE: &str = "nfs-provisioner";
pub const PROVISIONER_DEPLOYMENT: &str = "nfs-client-provisioner";
pub const PROVISIONER_NAME: &str = "k8s-sigs.io/nfs-subdir-external-provisioner";
pub const DEFAULT_PROVISIONER_IMAGE: &str =
    "registry.k8s.io/sig-storage/nfs-subdir-external-provisioner:v4.0.2";

const SERVICE_ACCOUNT: &str = "nfs-client-provisioner";
const CLUSTER_ROLE: &str = "nfs-client-provisioner-runner";
const CLUSTER_ROLE_BINDING: &str = "run-nfs-client-provisioner";
const LEADER_ROLE: &str = "leader-locking-nfs-client-provisioner";

// DNS-1123 subdomain
static RESOURCE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("resource name pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub server_address: String,
    pub export_path: String,
    pub class_name: String,
    /// Applied afterwards as a separate transition, never baked into the class
    pub set_as_default: bool,
    pub provisioner_image: String,
}

impl StorageConfig {
    pub fn new(
        server_address: impl Into<String>,
        export_path: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            server_address: server_address.into(),
            export_path: export_path.into(),
            class_name: class_name.into(),
            set_as_default: false,
            provisioner_image: DEFAULT_PROVISIONER_IMAGE.to_string(),
        }
    }

    fn validate(&self) -> Result<(), CompileError> {
        let server = self.server_address.trim();
        if server.is_empty() || server.chars().any(char::is_whitespace) {
            return Err(CompileError::out_of_range(
                "server_address",
                &self.server_address,
                "must be a host name or IP address",
            ));
        }
        if !self.export_path.trim().starts_with('/') {
            return Err(CompileError::out_of_range(
                "export_path",
                &self.export_path,
                "must be an absolute path",
            ));
        }
        if self.class_name.len() > 253 || !RESOURCE_NAME.is_match(&self.class_name) {
            return Err(CompileError::out_of_range(
                "class_name",
                &self.class_name,
                "must be a lowercase DNS-1123 name",
            ));
        }
        if self.provisioner_image.trim().is_empty() {
            return Err(CompileError::out_of_range(
                "provisioner_image",
                &self.provisioner_image,
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Render the provisioner stack in apply order
pub fn render_storage_stack(config: &StorageConfig) -> Result<Vec<ManifestDocument>, CompileError> {
    config.validate()?;
    let server = config.server_address.trim();
    let path = config.export_path.trim();

    let docs = vec![
        json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": PROVISIONER_NAMESPACE },
        }),
        json!({
            "apiVersion": "v1",
            "kind": "ServiceAccount",
            "metadata": { "name": SERVICE_ACCOUNT, "namespace": PROVISIONER_NAMESPACE },
        }),
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRole",
            "metadata": { "name": CLUSTER_ROLE },
            "rules": [
                rule("", &["persistentvolumes"], &["get", "list", "watch", "create", "delete"]),
                rule("", &["persistentvolumeclaims"], &["get", "list", "watch", "update"]),
                rule("storage.k8s.io", &["storageclasses"], &["get", "list", "watch"]),
                rule("", &["events"], &["create", "update", "patch"]),
                rule("", &["services", "endpoints"], &["get", "list", "watch"]),
            ],
        }),
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRoleBinding",
            "metadata": { "name": CLUSTER_ROLE_BINDING },
            "subjects": [service_account_subject()],
            "roleRef": role_ref("ClusterRole", CLUSTER_ROLE),
        }),
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "Role",
            "metadata": { "name": LEADER_ROLE, "namespace": PROVISIONER_NAMESPACE },
            "rules": [
                rule("", &["endpoints"], &["get", "list", "watch", "create", "update", "patch"]),
            ],
        }),
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "RoleBinding",
            "metadata": { "name": LEADER_ROLE, "namespace": PROVISIONER_NAMESPACE },
            "subjects": [service_account_subject()],
            "roleRef": role_ref("Role", LEADER_ROLE),
        }),
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": PROVISIONER_DEPLOYMENT,
                "namespace": PROVISIONER_NAMESPACE,
                "labels": { "app": PROVISIONER_DEPLOYMENT },
            },
            "spec": {
                "replicas": 1,
                "strategy": { "type": "Recreate" },
                "selector": { "matchLabels": { "app": PROVISIONER_DEPLOYMENT } },
                "template": {
                    "metadata": { "labels": { "app": PROVISIONER_DEPLOYMENT } },
                    "spec": {
                        "serviceAccountName": SERVICE_ACCOUNT,
                        "containers": [{
                            "name": PROVISIONER_DEPLOYMENT,
                            "image": config.provisioner_image.trim(),
                            "volumeMounts": [{
                                "name": "nfs-client-root",
                                "mountPath": "/persistentvolumes",
                            }],
                            "env": [
                                { "name": "PROVISIONER_NAME", "value": PROVISIONER_NAME },
                                { "name": "NFS_SERVER", "value": server },
                                { "name": "NFS_PATH", "value": path },
                            ],
                        }],
                        "volumes": [{
                            "name": "nfs-client-root",
                            "nfs": { "server": server, "path": path },
                        }],
                    },
                },
            },
        }),
        json!({
            "apiVersion": "storage.k8s.io/v1",
            "kind": "StorageClass",
            "metadata": { "name": config.class_name },
            "provisioner": PROVISIONER_NAME,
            "parameters": { "archiveOnDelete": "false" },
            "reclaimPolicy": "Delete",
            "volumeBindingMode": "Immediate",
            "allowVolumeExpansion": true,
        }),
    ];

    Ok(docs.into_iter().map(ManifestDocument::new).collect())
}

fn rule(api_group: &str, resources: &[&str], verbs: &[&str]) -> Value {
    json!({
        "apiGroups": [api_group],
        "resources": resources,
        "verbs": verbs,
    })
}

fn service_account_subject() -> Value {
    json!({
        "kind": "ServiceAccount",
        "name": SERVICE_ACCOUNT,
        "namespace": PROVISIONER_NAMESPACE,
    })
}

fn role_ref(kind: &str, name: &str) -> Value {
    json!({
        "kind": kind,
        "name": name,
        "apiGroup": "rbac.authorization.k8s.io",
    })
}
