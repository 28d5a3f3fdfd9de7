//! Role request -> install plan
//!
//! Pure: no I/O, no environment reads. Every structural problem is reported
//! here so a bad request never reaches the installer.

use super::plan::{ENV_MIRROR, ENV_TOKEN, ENV_URL, ENV_VERSION, InstallPlan};
use super::role::{Role, RoleRequest, dedicated_taint, ingress_label, label_key};
use super::role::{CONTROL_PLANE_PORT, INGRESS_LABEL_KEY};
use super::token::{Token, TokenProvisioner, TokenSource};
use crate::error::CompileError;
use crate::utils::string::format_address;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

/// Compiles role requests into install plans
#[derive(Debug, Clone, Default)]
pub struct RoleCompiler<T = TokenProvisioner> {
    tokens: T,
    mirror: Option<String>,
    version: Option<String>,
}

impl RoleCompiler<TokenProvisioner> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: TokenSource> RoleCompiler<T> {
    pub fn with_token_source(tokens: T) -> Self {
        Self {
            tokens,
            mirror: None,
            version: None,
        }
    }

    /// Download mirror selector passed to the install script (e.g. `cn`)
    pub fn mirror(mut self, mirror: Option<String>) -> Self {
        self.mirror = mirror.filter(|m| !m.trim().is_empty());
        self
    }

    /// Pin the K3s release the install script fetches
    pub fn version(mut self, version: Option<String>) -> Self {
        self.version = version.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn compile(&self, request: &RoleRequest) -> Result<InstallPlan, CompileError> {
        let node_ip = validate(request)?;

        let mut args = vec![request.role.mode().to_string()];
        let mut env = BTreeMap::new();

        let token = match request.role {
            Role::FirstControlPlane => {
                push_server_identity(&mut args, node_ip);
                if request.enable_distributed_datastore {
                    args.push("--cluster-init".to_string());
                }
                match request.token.as_deref() {
                    Some(t) => supplied_token(t)?,
                    None => self.tokens.generate(),
                }
            }
            Role::JoiningControlPlane | Role::Worker => {
                if request.role == Role::JoiningControlPlane {
                    push_server_identity(&mut args, node_ip);
                }
                if request.enable_distributed_datastore {
                    tracing::warn!(role = %request.role, "HA mode only applies to the first control plane, ignoring");
                }
                // validate() guarantees both are present
                let peer = request.peer_address.as_deref().unwrap_or_default().trim();
                env.insert(
                    ENV_URL.to_string(),
                    format!("https://{}", format_address(peer, CONTROL_PLANE_PORT)),
                );
                supplied_token(request.token.as_deref().unwrap_or_default())?
            }
        };
        env.insert(ENV_TOKEN.to_string(), token.as_str().to_string());

        args.push(format!("--node-ip={}", node_ip));
        if let Some(name) = request.node_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            args.push(format!("--node-name={}", name));
        }

        // An absent interface must stay absent so flannel auto-selects
        if let Some(iface) = request
            .overlay_interface
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
        {
            args.push(format!("--flannel-iface={}", iface));
        }

        for label in effective_labels(request) {
            args.push(format!("--node-label={}", label));
        }
        for taint in effective_taints(request) {
            args.push(format!("--node-taint={}", taint));
        }

        if request.disable_builtin_load_balancer {
            if request.role.is_control_plane() {
                args.push("--disable=servicelb".to_string());
            } else {
                tracing::warn!("the agent has no load balancer switch, ignoring disable request on a worker");
            }
        }

        // Last, so they can override anything above
        args.extend(request.extra_args.iter().cloned());

        if let Some(mirror) = &self.mirror {
            env.insert(ENV_MIRROR.to_string(), mirror.clone());
        }
        if let Some(version) = &self.version {
            env.insert(ENV_VERSION.to_string(), version.clone());
        }

        Ok(InstallPlan {
            role: request.role,
            args,
            env,
            token_origin: token.origin(),
        })
    }
}

/// Compile with the OS token source and no mirror or version pin
pub fn compile(request: &RoleRequest) -> Result<InstallPlan, CompileError> {
    RoleCompiler::new().compile(request)
}

fn push_server_identity(args: &mut Vec<String>, node_ip: IpAddr) {
    args.push(format!("--advertise-address={}", node_ip));
    args.push(format!("--tls-san={}", node_ip));
}

fn supplied_token(value: &str) -> Result<Token, CompileError> {
    Token::supplied(value)
        .ok_or_else(|| CompileError::invalid_role("token", "must be non-empty and contain no whitespace"))
}

fn validate(request: &RoleRequest) -> Result<IpAddr, CompileError> {
    let ip = request.node_ip.trim();
    if ip.is_empty() {
        return Err(CompileError::invalid_role("node_ip", "required"));
    }
    let node_ip: IpAddr = ip
        .parse()
        .map_err(|_| CompileError::invalid_role("node_ip", format!("'{}' is not an IP address", ip)))?;

    let has_peer = request
        .peer_address
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());
    let has_token = request.token.as_deref().is_some_and(|t| !t.trim().is_empty());

    match request.role {
        Role::FirstControlPlane => {
            if request.peer_address.is_some() {
                return Err(CompileError::invalid_role(
                    "peer_address",
                    "the first control plane starts a new cluster and must not have a peer",
                ));
            }
        }
        Role::JoiningControlPlane | Role::Worker => {
            if !has_peer {
                return Err(CompileError::invalid_role(
                    "peer_address",
                    format!("required for a {} node", request.role),
                ));
            }
            if !has_token {
                return Err(CompileError::invalid_role(
                    "token",
                    format!("required for a {} node", request.role),
                ));
            }
        }
    }

    if request.ingress_designation.is_some() && request.role != Role::Worker {
        return Err(CompileError::invalid_role(
            "ingress_designation",
            "only worker nodes can be designated for ingress",
        ));
    }

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for label in &request.labels {
        let key = label_key(label);
        if let Some(previous) = seen.insert(key, label) {
            return Err(CompileError::invalid_role(
                "labels",
                format!("duplicate key '{}' ('{}' and '{}')", key, previous, label),
            ));
        }
    }
    if request.ingress_designation.is_some() {
        if let Some(existing) = seen.get(INGRESS_LABEL_KEY) {
            if existing.trim() != ingress_label() {
                return Err(CompileError::invalid_role(
                    "labels",
                    format!("'{}' conflicts with the ingress designation label", existing),
                ));
            }
        }
    }

    Ok(node_ip)
}

fn effective_labels(request: &RoleRequest) -> Vec<String> {
    let mut labels = request.labels.clone();
    if request.ingress_designation.is_some()
        && !labels.iter().any(|l| label_key(l) == INGRESS_LABEL_KEY)
    {
        labels.push(ingress_label());
    }
    labels
}

fn effective_taints(request: &RoleRequest) -> Vec<String> {
    let mut taints = request.taints.clone();
    if request.ingress_designation.is_some_and(|d| d.dedicated) {
        let taint = dedicated_taint();
        if !taints.iter().any(|t| t.trim() == taint) {
            taints.push(taint);
        }
    }
    taints
}
