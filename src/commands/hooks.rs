//! Operator-supplied provisioning hooks
//!
//! Preparing the OS of a node or a storage server is site specific, so the
//! wizard only runs whatever command the config names.

use crate::utils::exec::CommandExecutor;
use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    NodeInit,
    StorageServer,
}

impl Hook {
    pub fn title(self) -> &'static str {
        match self {
            Hook::NodeInit => "Initialize node",
            Hook::StorageServer => "Configure storage server",
        }
    }

    pub fn config_key(self) -> &'static str {
        match self {
            Hook::NodeInit => "hooks.node_init",
            Hook::StorageServer => "hooks.storage_server",
        }
    }
}

/// Run the hook command attached to the terminal. Returns whether anything ran.
pub fn run_hook<E: CommandExecutor + ?Sized>(
    exec: &E,
    hook: Hook,
    command: Option<&str>,
) -> Result<bool> {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", hook.title());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let Some(command) = command.map(str::trim).filter(|c| !c.is_empty()) else {
        println!("Nothing configured for this step.");
        println!("Set {} in the config file to run a command here.", hook.config_key());
        return Ok(false);
    };

    println!("Running: {}", command);
    let status = exec.execute_shell_interactive(command)?;
    if !status.success() {
        bail!(
            "{} hook failed ({})",
            hook.title(),
            status
                .code()
                .map(|c| format!("exit status {}", c))
                .unwrap_or_else(|| "killed by signal".to_string())
        );
    }
    println!("✓ {} finished", hook.title());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::exec::testing::FakeExecutor;

    #[test]
    fn test_unset_hook_runs_nothing() {
        let exec = FakeExecutor::new();
        assert!(!run_hook(&exec, Hook::NodeInit, None).unwrap());
        assert!(!run_hook(&exec, Hook::NodeInit, Some("  ")).unwrap());
        assert!(exec.commands().is_empty());
    }

    #[test]
    fn test_hook_runs_through_shell() {
        let exec = FakeExecutor::new();
        assert!(run_hook(&exec, Hook::StorageServer, Some("/opt/nfs-setup.sh --export /srv")).unwrap());
        assert_eq!(exec.commands(), vec!["sh -c /opt/nfs-setup.sh --export /srv"]);
    }

    #[test]
    fn test_failing_hook() {
        let exec = FakeExecutor::new().respond("sh -c false", 2, "");
        let err = run_hook(&exec, Hook::NodeInit, Some("false")).unwrap_err();
        assert!(err.to_string().contains("exit status 2"));
    }
}
