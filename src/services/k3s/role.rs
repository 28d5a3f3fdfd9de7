//! Node roles and the request the compiler consumes

use std::fmt;

/// Port the K3s supervisor and API server listen on
pub const CONTROL_PLANE_PORT: u16 = 6443;

/// Label put on worker nodes designated for ingress
pub const INGRESS_LABEL_KEY: &str = "ingress";
pub const INGRESS_LABEL_VALUE: &str = "true";

/// Taint that repels everything but the ingress controller from ingress workers
pub const DEDICATED_TAINT_KEY: &str = "dedicated";
pub const DEDICATED_TAINT_VALUE: &str = "ingress";
pub const DEDICATED_TAINT_EFFECT: &str = "NoSchedule";

/// `ingress=true`
pub fn ingress_label() -> String {
    format!("{}={}", INGRESS_LABEL_KEY, INGRESS_LABEL_VALUE)
}

/// `dedicated=ingress:NoSchedule`
pub fn dedicated_taint() -> String {
    format!(
        "{}={}:{}",
        DEDICATED_TAINT_KEY, DEDICATED_TAINT_VALUE, DEDICATED_TAINT_EFFECT
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    FirstControlPlane,
    JoiningControlPlane,
    Worker,
}

impl Role {
    /// Installer mode: `server` for control-plane roles, `agent` for workers
    pub fn mode(self) -> &'static str {
        match self {
            Role::FirstControlPlane | Role::JoiningControlPlane => "server",
            Role::Worker => "agent",
        }
    }

    pub fn is_control_plane(self) -> bool {
        self != Role::Worker
    }

    /// systemd unit the installer creates for this role
    pub fn service_name(self) -> &'static str {
        match self {
            Role::FirstControlPlane | Role::JoiningControlPlane => "k3s",
            Role::Worker => "k3s-agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::FirstControlPlane => "first control plane",
            Role::JoiningControlPlane => "joining control plane",
            Role::Worker => "worker",
        })
    }
}

/// Marks a worker as an ingress node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngressDesignation {
    /// Also taint the node so only workloads tolerating it are scheduled there
    pub dedicated: bool,
}

/// Everything the compiler needs to know about one node.
///
/// Labels, taints and extra args are raw operator text and are passed through
/// untouched; only label keys are inspected, for uniqueness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequest {
    pub role: Role,
    pub node_ip: String,
    pub overlay_interface: Option<String>,
    /// Unset means the installer uses the host's own name
    pub node_name: Option<String>,
    pub token: Option<String>,
    pub peer_address: Option<String>,
    pub labels: Vec<String>,
    pub taints: Vec<String>,
    pub disable_builtin_load_balancer: bool,
    pub enable_distributed_datastore: bool,
    pub ingress_designation: Option<IngressDesignation>,
    pub extra_args: Vec<String>,
}

impl RoleRequest {
    pub fn new(role: Role, node_ip: impl Into<String>) -> Self {
        Self {
            role,
            node_ip: node_ip.into(),
            overlay_interface: None,
            node_name: None,
            token: None,
            peer_address: None,
            labels: Vec::new(),
            taints: Vec::new(),
            disable_builtin_load_balancer: false,
            enable_distributed_datastore: false,
            ingress_designation: None,
            extra_args: Vec::new(),
        }
    }

    pub fn with_peer(mut self, peer_address: impl Into<String>) -> Self {
        self.peer_address = Some(peer_address.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_overlay_interface(mut self, iface: impl Into<String>) -> Self {
        self.overlay_interface = Some(iface.into());
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_taints<I, S>(mut self, taints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.taints.extend(taints.into_iter().map(Into::into));
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_ingress(mut self, dedicated: bool) -> Self {
        self.ingress_designation = Some(IngressDesignation { dedicated });
        self
    }
}

/// Key part of a raw `key=value` label; the whole text when there is no `=`
pub fn label_key(raw: &str) -> &str {
    raw.split_once('=').map_or(raw, |(key, _)| key).trim()
}
