//! Node installation: gather a role request, compile it, run the installer

use crate::cli_types::{JoinArgs, NodeArgs, ServerArgs, WorkerArgs};
use crate::config::WizardConfig;
use crate::services::Readiness;
use crate::services::k3s::{
    InstallPlan, Installer, Role, RoleCompiler, RoleRequest, TokenOrigin, wait_for_service,
};
use crate::utils::exec::CommandExecutor;
use crate::utils::networking::suggest_node_ip;
use crate::utils::prompt::Prompter;
use crate::utils::string::{split_args, split_list};
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::time::Duration;

const SERVICE_WAIT_ATTEMPTS: u32 = 30;
const SERVICE_WAIT_INTERVAL: Duration = Duration::from_secs(2);

/// Walk the operator through the questions for `role`
pub fn prompt_request<E, R, W>(
    prompter: &mut Prompter<R, W>,
    exec: &E,
    role: Role,
) -> Result<RoleRequest>
where
    E: CommandExecutor + ?Sized,
    R: BufRead,
    W: Write,
{
    let detected = suggest_node_ip(exec);
    let node_ip = prompter.ask_required("Node IP address", detected.as_deref())?;
    let mut request = RoleRequest::new(role, node_ip);

    request.node_name = prompter.ask_optional("Node name (empty for the hostname)")?;
    request.overlay_interface =
        prompter.ask_optional("Overlay network interface (empty to auto-select)")?;

    match role {
        Role::FirstControlPlane => {
            request.enable_distributed_datastore = prompter.confirm(
                "Enable HA with embedded etcd so more control-plane nodes can join?",
                true,
            )?;
            request.token = prompter.ask_optional("Cluster token (empty to generate one)")?;
        }
        Role::JoiningControlPlane | Role::Worker => {
            request.peer_address =
                Some(prompter.ask_required("Existing control-plane address", None)?);
            request.token = Some(prompter.ask_required("Cluster token", None)?);
        }
    }

    if role.is_control_plane() {
        request.disable_builtin_load_balancer =
            prompter.confirm("Disable the built-in service load balancer?", false)?;
    }

    if role == Role::Worker && prompter.confirm("Use this worker as an ingress node?", false)? {
        let dedicated = prompter.confirm(
            "Dedicate it to ingress (taint it so other workloads stay off)?",
            false,
        )?;
        request = request.with_ingress(dedicated);
    }

    request.labels = split_list(&prompter.ask("Node labels (key=value, comma separated)", None)?);
    request.taints = split_list(&prompter.ask(
        "Node taints (key=value:Effect, comma separated)",
        None,
    )?);
    request.extra_args = split_args(&prompter.ask("Extra k3s arguments (space separated)", None)?);

    Ok(request)
}

fn request_from_node_args<E: CommandExecutor + ?Sized>(
    role: Role,
    node: &NodeArgs,
    exec: &E,
) -> Result<RoleRequest> {
    let node_ip = node
        .node_ip
        .clone()
        .or_else(|| suggest_node_ip(exec))
        .context("Could not detect a node IP address, pass --node-ip")?;

    let mut request = RoleRequest::new(role, node_ip)
        .with_labels(node.labels.iter().cloned())
        .with_taints(node.taints.iter().cloned())
        .with_extra_args(node.extra_args.iter().cloned());
    request.node_name = node.node_name.clone();
    request.overlay_interface = node.iface.clone();
    Ok(request)
}

pub fn server_request<E: CommandExecutor + ?Sized>(
    args: &ServerArgs,
    exec: &E,
) -> Result<RoleRequest> {
    let mut request = request_from_node_args(Role::FirstControlPlane, &args.node, exec)?;
    request.token = args.token.clone();
    request.enable_distributed_datastore = args.ha;
    request.disable_builtin_load_balancer = args.disable_servicelb;
    Ok(request)
}

pub fn join_request<E: CommandExecutor + ?Sized>(args: &JoinArgs, exec: &E) -> Result<RoleRequest> {
    let mut request = request_from_node_args(Role::JoiningControlPlane, &args.node, exec)?
        .with_peer(args.server.clone())
        .with_token(args.token.clone());
    request.disable_builtin_load_balancer = args.disable_servicelb;
    Ok(request)
}

pub fn worker_request<E: CommandExecutor + ?Sized>(
    args: &WorkerArgs,
    exec: &E,
) -> Result<RoleRequest> {
    let mut request = request_from_node_args(Role::Worker, &args.node, exec)?
        .with_peer(args.server.clone())
        .with_token(args.token.clone());
    if args.ingress {
        request = request.with_ingress(args.dedicated);
    }
    Ok(request)
}

/// Compiler configured with the mirror and version pin from the config
pub fn compiler_for(config: &WizardConfig) -> RoleCompiler {
    RoleCompiler::new()
        .mirror(config.mirror.clone())
        .version(config.k3s_version.clone())
}

/// Compile, confirm, install, and wait for the K3s unit.
///
/// Returns `None` when the operator declines at the confirmation prompt.
pub fn install_node<E, I, R, W>(
    config: &WizardConfig,
    exec: &E,
    installer: &I,
    request: &RoleRequest,
    prompter: &mut Prompter<R, W>,
    assume_yes: bool,
) -> Result<Option<InstallPlan>>
where
    E: CommandExecutor + ?Sized,
    I: Installer + ?Sized,
    R: BufRead,
    W: Write,
{
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Install K3s: {}", request.role);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let plan = compiler_for(config).compile(request)?;
    print_plan(&plan);

    if exec.check_command_exists("k3s") {
        println!("⚠ K3s is already installed on this node, the installer will reconfigure it");
    }
    let user = whoami::username();
    if user != "root" {
        println!("Running as {}, the install script will use sudo", user);
    }
    println!();

    if !assume_yes && !prompter.confirm("Proceed with installation?", true)? {
        println!("Aborted.");
        return Ok(None);
    }

    installer.install(&plan)?;
    println!("✓ Install script finished");

    let service = plan.role().service_name();
    println!("Waiting for {} service...", service);
    match wait_for_service(exec, service, SERVICE_WAIT_ATTEMPTS, SERVICE_WAIT_INTERVAL) {
        Readiness::Ready => println!("✓ {} is active", service),
        not_ready => {
            tracing::warn!(service, %not_ready, "service not observed active");
            println!("⚠ {} {}; check `systemctl status {}`", service, not_ready, service);
        }
    }
    println!();

    if plan.role() == Role::FirstControlPlane {
        print_join_info(&plan, request);
    }

    Ok(Some(plan))
}

pub fn print_plan(plan: &InstallPlan) {
    println!("Role: {}", plan.role());
    if let Some(url) = plan.cluster_url() {
        println!("Cluster: {}", url);
    }
    let origin = match plan.token_origin() {
        TokenOrigin::Supplied => "supplied",
        TokenOrigin::Generated => "generated",
        TokenOrigin::InsecureFallback => "INSECURE placeholder",
    };
    println!("Token: {}", origin);
    println!("Command:");
    println!("  {}", plan.display_command());
}

fn print_join_info(plan: &InstallPlan, request: &RoleRequest) {
    let Some(token) = plan.token() else {
        return;
    };
    let server = request.node_ip.trim();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ First control plane installed");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("Cluster token (keep it secret):");
    println!("  {}", token);
    println!();
    if plan.token_origin() == TokenOrigin::InsecureFallback {
        println!("⚠ No random source was available, this token is a fixed placeholder.");
        println!("  Rotate it with `k3s token rotate` before joining other nodes.");
        println!();
    }
    println!("Join other nodes with:");
    if request.enable_distributed_datastore {
        println!("  k3s-wizard join --server {} --token <token>", server);
    }
    println!("  k3s-wizard worker --server {} --token <token>", server);
    println!();
    println!("Kubeconfig: /etc/rancher/k3s/k3s.yaml");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use crate::utils::exec::testing::FakeExecutor;
    use std::cell::RefCell;
    use std::io::Cursor;

    #[derive(Default)]
    struct RecordingInstaller {
        plans: RefCell<Vec<InstallPlan>>,
    }

    impl Installer for RecordingInstaller {
        fn install(&self, plan: &InstallPlan) -> Result<()> {
            self.plans.borrow_mut().push(plan.clone());
            Ok(())
        }
    }

    fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    fn node_exec() -> FakeExecutor {
        FakeExecutor::new()
            .respond("hostname -I", 0, "192.168.1.40 10.42.0.0 fd00::40\n")
            .respond("systemctl is-active", 0, "active\n")
            .without_command("k3s")
    }

    #[test]
    fn test_prompt_worker_with_dedicated_ingress() {
        let exec = node_exec();
        // ip, name, iface, peer, token, ingress?, dedicated?, labels, taints, extra args
        let mut p = prompter("\n\neth1\n10.0.0.1\nabc123\ny\ny\nzone=a\n\n\n");
        let request = prompt_request(&mut p, &exec, Role::Worker).unwrap();

        assert_eq!(request.node_ip, "192.168.1.40");
        assert!(request.node_name.is_none());
        assert_eq!(request.overlay_interface.as_deref(), Some("eth1"));
        assert_eq!(request.peer_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(request.token.as_deref(), Some("abc123"));
        assert_eq!(request.ingress_designation.map(|d| d.dedicated), Some(true));
        assert_eq!(request.labels, vec!["zone=a"]);
        assert!(request.taints.is_empty());
    }

    #[test]
    fn test_prompt_first_control_plane() {
        let exec = node_exec();
        // ip, name, iface, ha?, token, disable lb?, labels, taints, extra args
        let mut p = prompter("10.0.0.1\ncp1\n\ny\n\nn\n\n\n--write-kubeconfig-mode=644\n");
        let request = prompt_request(&mut p, &exec, Role::FirstControlPlane).unwrap();

        assert_eq!(request.node_ip, "10.0.0.1");
        assert_eq!(request.node_name.as_deref(), Some("cp1"));
        assert!(request.enable_distributed_datastore);
        assert!(request.token.is_none());
        assert!(!request.disable_builtin_load_balancer);
        assert_eq!(request.extra_args, vec!["--write-kubeconfig-mode=644"]);
    }

    #[test]
    fn test_prompt_extra_args_keep_comma_values() {
        let exec = node_exec();
        // ip, name, iface, peer, token, ingress?, labels, taints, extra args
        let mut p = prompter(
            "\n\n\n10.0.0.1\nabc123\nn\n\n\n--kube-apiserver-arg=enable-admission-plugins=NodeRestriction,PodSecurity\n",
        );
        let request = prompt_request(&mut p, &exec, Role::Worker).unwrap();

        assert_eq!(
            request.extra_args,
            vec!["--kube-apiserver-arg=enable-admission-plugins=NodeRestriction,PodSecurity"]
        );
        let plan = RoleCompiler::new().compile(&request).unwrap();
        assert_eq!(
            plan.args().last().map(String::as_str),
            Some("--kube-apiserver-arg=enable-admission-plugins=NodeRestriction,PodSecurity")
        );
    }

    #[test]
    fn test_worker_args_to_request() {
        let exec = node_exec();
        let args = WorkerArgs {
            server: "10.0.0.1".to_string(),
            token: "abc123".to_string(),
            ingress: true,
            ..Default::default()
        };
        let request = worker_request(&args, &exec).unwrap();
        assert_eq!(request.node_ip, "192.168.1.40");
        assert_eq!(request.ingress_designation.map(|d| d.dedicated), Some(false));
    }

    #[test]
    fn test_missing_node_ip_without_detection() {
        let exec = FakeExecutor::new().respond("hostname -I", 1, "");
        assert!(server_request(&ServerArgs::default(), &exec).is_err());
    }

    #[test]
    fn test_install_first_control_plane() {
        let exec = node_exec();
        let installer = RecordingInstaller::default();
        let request = RoleRequest::new(Role::FirstControlPlane, "10.0.0.1");
        let config = WizardConfig {
            mirror: Some("cn".to_string()),
            ..Default::default()
        };

        let plan = install_node(&config, &exec, &installer, &request, &mut prompter(""), true)
            .unwrap()
            .unwrap();

        assert_eq!(installer.plans.borrow().len(), 1);
        assert_eq!(plan.token_origin(), TokenOrigin::Generated);
        assert_eq!(plan.env().get("INSTALL_K3S_MIRROR").map(String::as_str), Some("cn"));
        assert!(exec.commands().contains(&"systemctl is-active k3s".to_string()));
    }

    #[test]
    fn test_install_declined() {
        let exec = node_exec();
        let installer = RecordingInstaller::default();
        let request = RoleRequest::new(Role::FirstControlPlane, "10.0.0.1");

        let result = install_node(
            &WizardConfig::default(),
            &exec,
            &installer,
            &request,
            &mut prompter("n\n"),
            false,
        )
        .unwrap();

        assert!(result.is_none());
        assert!(installer.plans.borrow().is_empty());
    }

    #[test]
    fn test_invalid_request_never_reaches_installer() {
        let exec = node_exec();
        let installer = RecordingInstaller::default();
        let request = RoleRequest::new(Role::Worker, "10.0.0.5").with_token("abc123");

        let err = install_node(
            &WizardConfig::default(),
            &exec,
            &installer,
            &request,
            &mut prompter(""),
            true,
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CompileError>(),
            Some(CompileError::InvalidRoleState { .. })
        ));
        assert!(installer.plans.borrow().is_empty());
    }
}
