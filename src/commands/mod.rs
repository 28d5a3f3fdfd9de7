// Command module routing
//
// To add a new command:
// 1. Create a new file in this directory (e.g., `mycommand.rs`)
// 2. Add `pub mod mycommand;` below
// 3. Add the match arm in `handle_command` function

pub mod hooks;
pub mod install;
pub mod menu;
pub mod plan;
pub mod post_config;

use crate::Commands;
use crate::Commands::*;
use crate::cli_types::PlanRole;
use crate::config::WizardConfig;
use crate::services::cluster::{Kubectl, show_status};
use crate::services::k3s::{RoleRequest, ScriptInstaller};
use crate::utils::exec::LocalExecutor;
use crate::utils::prompt::Prompter;
use anyhow::Result;
use hooks::Hook;
use post_config::PostConfigPlan;

/// Dispatch command to appropriate handler
pub fn handle_command(config: &WizardConfig, command: Commands) -> Result<()> {
    let exec = LocalExecutor;

    match command {
        Menu => {
            menu::run_menu(config, &exec, &mut Prompter::stdio())?;
        }
        InitNode => {
            hooks::run_hook(&exec, Hook::NodeInit, config.hooks.node_init.as_deref())?;
        }
        StorageServer => {
            hooks::run_hook(
                &exec,
                Hook::StorageServer,
                config.hooks.storage_server.as_deref(),
            )?;
        }
        Server(args) => {
            let request = install::server_request(&args, &exec)?;
            run_install(config, &request, args.node.yes)?;
        }
        Join(args) => {
            let request = install::join_request(&args, &exec)?;
            run_install(config, &request, args.node.yes)?;
        }
        Worker(args) => {
            let request = install::worker_request(&args, &exec)?;
            run_install(config, &request, args.node.yes)?;
        }
        PostConfig(args) => {
            let plan = PostConfigPlan::from_args(&args, config)?;
            let kubectl = Kubectl::new(&exec, &config.kubectl_command)?;
            post_config::run_post_config(&kubectl, &plan, config.rollout_timeout())?;
        }
        Check => {
            let kubectl = Kubectl::new(&exec, &config.kubectl_command)?;
            show_status(&kubectl)?;
        }
        Plan { role } => {
            let request = match role {
                PlanRole::Server(args) => install::server_request(&args, &exec)?,
                PlanRole::Join(args) => install::join_request(&args, &exec)?,
                PlanRole::Worker(args) => install::worker_request(&args, &exec)?,
            };
            plan::handle_plan(config, &request)?;
        }
        Render(args) => {
            let plan = PostConfigPlan::from_args(&args, config)?;
            plan::handle_render(&plan)?;
        }
    }

    Ok(())
}

fn run_install(config: &WizardConfig, request: &RoleRequest, yes: bool) -> Result<()> {
    let exec = LocalExecutor;
    let installer = ScriptInstaller::new(&exec, config.script_url());
    install::install_node(
        config,
        &exec,
        &installer,
        request,
        &mut Prompter::stdio(),
        yes,
    )?;
    Ok(())
}
