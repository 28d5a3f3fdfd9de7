// CLI types for k3s-wizard

use crate::services::manifests::ExposureMode;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive menu (the default when no subcommand is given)
    Menu,
    /// Run the configured node initialization hook
    InitNode,
    /// Run the configured storage server hook
    StorageServer,
    /// Install the first control-plane node of a new cluster
    Server(ServerArgs),
    /// Join this node to an existing cluster as another control-plane node
    Join(JoinArgs),
    /// Install this node as a worker
    Worker(WorkerArgs),
    /// Configure ingress placement and NFS storage on a running cluster
    PostConfig(PostConfigArgs),
    /// Show nodes, pods and storage classes
    Check,
    /// Print the install plan for a role without running it
    Plan {
        #[command(subcommand)]
        role: PlanRole,
    },
    /// Print post-config manifests as YAML without applying them
    Render(PostConfigArgs),
}

#[derive(Subcommand, Debug)]
pub enum PlanRole {
    /// First control-plane node
    Server(ServerArgs),
    /// Additional control-plane node
    Join(JoinArgs),
    /// Worker node
    Worker(WorkerArgs),
}

/// Settings shared by every role
#[derive(Args, Debug, Clone, Default)]
pub struct NodeArgs {
    /// IP address the node registers with (detected when omitted)
    #[arg(long)]
    pub node_ip: Option<String>,
    /// Node name (defaults to the hostname)
    #[arg(long)]
    pub node_name: Option<String>,
    /// Network interface for the flannel overlay (auto-selected when omitted)
    #[arg(long)]
    pub iface: Option<String>,
    /// Node label, repeatable
    #[arg(long = "label", value_name = "KEY=VALUE")]
    pub labels: Vec<String>,
    /// Node taint, repeatable
    #[arg(long = "taint", value_name = "KEY=VALUE:EFFECT")]
    pub taints: Vec<String>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
    /// Extra arguments passed to k3s verbatim (after `--`)
    #[arg(last = true)]
    pub extra_args: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    #[command(flatten)]
    pub node: NodeArgs,
    /// Cluster token to use instead of generating one
    #[arg(long)]
    pub token: Option<String>,
    /// Initialize embedded etcd so more control-plane nodes can join
    #[arg(long)]
    pub ha: bool,
    /// Disable the built-in service load balancer
    #[arg(long)]
    pub disable_servicelb: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct JoinArgs {
    #[command(flatten)]
    pub node: NodeArgs,
    /// Address of an existing control-plane node
    #[arg(long)]
    pub server: String,
    /// Cluster token
    #[arg(long, env = "K3S_TOKEN", hide_env_values = true)]
    pub token: String,
    /// Disable the built-in service load balancer
    #[arg(long)]
    pub disable_servicelb: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub node: NodeArgs,
    /// Address of a control-plane node
    #[arg(long)]
    pub server: String,
    /// Cluster token
    #[arg(long, env = "K3S_TOKEN", hide_env_values = true)]
    pub token: String,
    /// Label the node to run the ingress controller
    #[arg(long)]
    pub ingress: bool,
    /// Also taint the ingress node so other workloads stay off it
    #[arg(long, requires = "ingress")]
    pub dedicated: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PostConfigArgs {
    /// Do not touch ingress placement
    #[arg(long)]
    pub skip_ingress: bool,
    /// Node selector for the ingress controller
    #[arg(long, default_value = "ingress=true", value_name = "KEY=VALUE")]
    pub ingress_selector: String,
    /// How the ingress controller is exposed: nodeport or loadbalancer
    #[arg(long, default_value = "nodeport")]
    pub exposure: ExposureMode,
    /// NodePort for HTTP
    #[arg(long, default_value_t = 30080)]
    pub http_port: u16,
    /// NodePort for HTTPS
    #[arg(long, default_value_t = 30443)]
    pub https_port: u16,
    /// Let the ingress controller run on nodes with the dedicated ingress taint
    #[arg(long)]
    pub tolerate_dedicated: bool,
    /// NFS server for dynamic provisioning (storage is skipped when omitted)
    #[arg(long, requires = "nfs_path")]
    pub nfs_server: Option<String>,
    /// Exported path on the NFS server
    #[arg(long)]
    pub nfs_path: Option<String>,
    /// StorageClass name
    #[arg(long, default_value = "nfs-client")]
    pub storage_class: String,
    /// Make the NFS class the cluster default
    #[arg(long)]
    pub default_class: bool,
}
