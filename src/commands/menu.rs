//! Interactive top-level menu

use super::hooks::{Hook, run_hook};
use super::install::{install_node, prompt_request};
use super::post_config::{prompt_plan, run_post_config};
use crate::config::WizardConfig;
use crate::services::cluster::{Kubectl, show_status};
use crate::services::k3s::{Role, ScriptInstaller};
use crate::utils::exec::CommandExecutor;
use crate::utils::prompt::Prompter;
use anyhow::Result;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    InitNode,
    StorageServer,
    FirstControlPlane,
    JoinControlPlane,
    Worker,
    PostConfig,
    Check,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 8] = [
        MenuAction::InitNode,
        MenuAction::StorageServer,
        MenuAction::FirstControlPlane,
        MenuAction::JoinControlPlane,
        MenuAction::Worker,
        MenuAction::PostConfig,
        MenuAction::Check,
        MenuAction::Exit,
    ];

    /// Accepts the menu number, or `q`/`exit`/`quit`
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if matches!(input.to_lowercase().as_str(), "q" | "quit" | "exit") {
            return Some(MenuAction::Exit);
        }
        let n: usize = input.parse().ok()?;
        Self::ALL.get(n.checked_sub(1)?).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuAction::InitNode => "Initialize node (run node_init hook)",
            MenuAction::StorageServer => "Configure storage server (run storage_server hook)",
            MenuAction::FirstControlPlane => "Install first control-plane node",
            MenuAction::JoinControlPlane => "Join as additional control-plane node",
            MenuAction::Worker => "Install worker node",
            MenuAction::PostConfig => "Post-config wizard (ingress, storage)",
            MenuAction::Check => "Quick cluster check",
            MenuAction::Exit => "Exit",
        }
    }
}

fn print_menu<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>) -> Result<()> {
    prompter.say("")?;
    prompter.say("K3s Wizard")?;
    prompter.say("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    for (i, action) in MenuAction::ALL.iter().enumerate() {
        prompter.say(&format!("  {}) {}", i + 1, action.label()))?;
    }
    prompter.say("")
}

/// Run the menu until the operator exits. A failed action is reported and the menu shown again.
pub fn run_menu<E, R, W>(
    config: &WizardConfig,
    exec: &E,
    prompter: &mut Prompter<R, W>,
) -> Result<()>
where
    E: CommandExecutor + ?Sized,
    R: BufRead,
    W: Write,
{
    loop {
        print_menu(prompter)?;
        let answer = prompter.ask("Select an option", None)?;
        let Some(action) = MenuAction::parse(&answer) else {
            prompter.say(&format!("  '{}' is not a menu option.", answer))?;
            continue;
        };
        if action == MenuAction::Exit {
            return Ok(());
        }

        if let Err(e) = run_action(action, config, exec, prompter) {
            tracing::debug!(error = ?e, ?action, "menu action failed");
            println!("✗ {:#}", e);
        }
    }
}

fn run_action<E, R, W>(
    action: MenuAction,
    config: &WizardConfig,
    exec: &E,
    prompter: &mut Prompter<R, W>,
) -> Result<()>
where
    E: CommandExecutor + ?Sized,
    R: BufRead,
    W: Write,
{
    let role = match action {
        MenuAction::InitNode => {
            run_hook(exec, Hook::NodeInit, config.hooks.node_init.as_deref())?;
            return Ok(());
        }
        MenuAction::StorageServer => {
            run_hook(exec, Hook::StorageServer, config.hooks.storage_server.as_deref())?;
            return Ok(());
        }
        MenuAction::PostConfig => {
            let plan = prompt_plan(prompter, config)?;
            let kubectl = Kubectl::new(exec, &config.kubectl_command)?;
            run_post_config(&kubectl, &plan, config.rollout_timeout())?;
            return Ok(());
        }
        MenuAction::Check => {
            let kubectl = Kubectl::new(exec, &config.kubectl_command)?;
            return show_status(&kubectl);
        }
        MenuAction::Exit => return Ok(()),
        MenuAction::FirstControlPlane => Role::FirstControlPlane,
        MenuAction::JoinControlPlane => Role::JoiningControlPlane,
        MenuAction::Worker => Role::Worker,
    };

    let request = prompt_request(prompter, exec, role)?;
    let installer = ScriptInstaller::new(exec, config.script_url());
    install_node(config, exec, &installer, &request, prompter, false)?;
    Ok(())
}
