//! Runs the K3s install script for a compiled plan

use super::plan::InstallPlan;
use crate::error::ExternalError;
use crate::services::Readiness;
use crate::utils::exec::CommandExecutor;
use crate::utils::string::bytes_to_string;
use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_SCRIPT_URL: &str = "https://get.k3s.io";
pub const CN_MIRROR_SCRIPT_URL: &str = "https://rancher-mirror.rancher.cn/k3s/k3s-install.sh";

/// External install procedure. Success is the script's exit status, nothing else.
pub trait Installer {
    fn install(&self, plan: &InstallPlan) -> Result<()>;
}

/// Fetches the install script over HTTPS and pipes it to `sh -s -`
pub struct ScriptInstaller<'a, E: CommandExecutor + ?Sized> {
    exec: &'a E,
    script_url: String,
}

impl<'a, E: CommandExecutor + ?Sized> ScriptInstaller<'a, E> {
    pub fn new(exec: &'a E, script_url: impl Into<String>) -> Self {
        Self {
            exec,
            script_url: script_url.into(),
        }
    }

    fn download_script(&self) -> Result<String> {
        println!("Downloading K3s install script from {}...", self.script_url);
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        client
            .get(&self.script_url)
            .send()
            .context("Failed to download K3s install script")?
            .error_for_status()
            .context("HTTP error downloading K3s install script")?
            .text()
            .context("Failed to read K3s install script content")
    }

    /// Run an already downloaded script with the plan's arguments and environment
    pub fn run_script(&self, script: &str, plan: &InstallPlan) -> Result<()> {
        let mut args: Vec<&str> = vec!["-s", "-"];
        args.extend(plan.args().iter().map(String::as_str));

        println!("Running: {}", plan.display_command());
        let status = self
            .exec
            .execute_streaming("sh", &args, plan.env(), script.as_bytes())
            .context("Failed to start the K3s install script")?;

        if !status.success() {
            return Err(ExternalError::InstallFailed {
                code: status.code(),
            }
            .into());
        }
        Ok(())
    }
}

impl<E: CommandExecutor + ?Sized> Installer for ScriptInstaller<'_, E> {
    fn install(&self, plan: &InstallPlan) -> Result<()> {
        let script = self.download_script()?;
        self.run_script(&script, plan)
    }
}

/// Poll `systemctl is-active` for the role's unit a bounded number of times
pub fn wait_for_service<E: CommandExecutor + ?Sized>(
    exec: &E,
    service: &str,
    attempts: u32,
    interval: Duration,
) -> Readiness {
    for attempt in 1..=attempts {
        let active = exec
            .execute_simple("systemctl", &["is-active", service])
            .map(|out| out.status.success() && bytes_to_string(&out.stdout) == "active")
            .unwrap_or(false);

        if active {
            return Readiness::Ready;
        }
        if attempt < attempts {
            println!(
                "  Service {} not active yet, waiting... (attempt {}/{})",
                service, attempt, attempts
            );
            std::thread::sleep(interval);
        }
    }

    Readiness::NotObserved {
        waited: interval * attempts.saturating_sub(1),
    }
}
