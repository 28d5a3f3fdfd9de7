//! Wizard configuration
//!
//! Read from `~/.config/k3s-wizard/config.toml`. A `.env` file next to it is
//! loaded into the process environment, then `K3S_WIZARD_*` variables override
//! individual fields.

use crate::services::k3s::{CN_MIRROR_SCRIPT_URL, DEFAULT_SCRIPT_URL};
use crate::services::manifests::DEFAULT_PROVISIONER_IMAGE;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR_NAME: &str = "k3s-wizard";
const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_FILE_NAME: &str = ".env";
/// Upper bound for `rollout_timeout_secs`. Zero is rejected.
const MAX_ROLLOUT_TIMEOUT_SECS: u64 = 3600;

pub const ENV_INSTALL_SCRIPT_URL: &str = "K3S_WIZARD_INSTALL_SCRIPT_URL";
pub const ENV_MIRROR: &str = "K3S_WIZARD_MIRROR";
pub const ENV_K3S_VERSION: &str = "K3S_WIZARD_K3S_VERSION";
pub const ENV_KUBECTL: &str = "K3S_WIZARD_KUBECTL";
pub const ENV_ROLLOUT_TIMEOUT: &str = "K3S_WIZARD_ROLLOUT_TIMEOUT";
pub const ENV_PROVISIONER_IMAGE: &str = "K3S_WIZARD_PROVISIONER_IMAGE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// Overrides the install script location entirely
    pub install_script_url: Option<String>,
    /// Passed to the installer as `INSTALL_K3S_MIRROR`. `cn` also switches the script URL.
    pub mirror: Option<String>,
    pub k3s_version: Option<String>,
    /// May include a prefix such as `sudo k3s kubectl`
    pub kubectl_command: String,
    pub rollout_timeout_secs: u64,
    pub provisioner_image: String,
    pub hooks: HookConfig,
}

/// Shell commands run by the node and storage-server provisioning actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub node_init: Option<String>,
    pub storage_server: Option<String>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            install_script_url: None,
            mirror: None,
            k3s_version: None,
            kubectl_command: "kubectl".to_string(),
            rollout_timeout_secs: 120,
            provisioner_image: DEFAULT_PROVISIONER_IMAGE.to_string(),
            hooks: HookConfig::default(),
        }
    }
}

impl WizardConfig {
    pub fn script_url(&self) -> &str {
        if let Some(url) = non_empty(&self.install_script_url) {
            return url;
        }
        match non_empty(&self.mirror) {
            Some(m) if m.eq_ignore_ascii_case("cn") => CN_MIRROR_SCRIPT_URL,
            _ => DEFAULT_SCRIPT_URL,
        }
    }

    pub fn rollout_timeout(&self) -> Duration {
        Duration::from_secs(self.rollout_timeout_secs)
    }

    /// Apply `K3S_WIZARD_*` overrides using `lookup` to read variables
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_INSTALL_SCRIPT_URL) {
            self.install_script_url = Some(v);
        }
        if let Some(v) = get(ENV_MIRROR) {
            self.mirror = Some(v);
        }
        if let Some(v) = get(ENV_K3S_VERSION) {
            self.k3s_version = Some(v);
        }
        if let Some(v) = get(ENV_KUBECTL) {
            self.kubectl_command = v;
        }
        if let Some(v) = get(ENV_PROVISIONER_IMAGE) {
            self.provisioner_image = v;
        }
        if let Some(v) = get(ENV_ROLLOUT_TIMEOUT) {
            self.rollout_timeout_secs = v.trim().parse().with_context(|| {
                format!("{} must be a number of seconds, got '{}'", ENV_ROLLOUT_TIMEOUT, v)
            })?;
        }
        self.validate()
    }

    /// Reject values that would make a wait unbounded
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ROLLOUT_TIMEOUT_SECS).contains(&self.rollout_timeout_secs) {
            bail!(
                "rollout_timeout_secs must be between 1 and {}, got {}",
                MAX_ROLLOUT_TIMEOUT_SECS,
                self.rollout_timeout_secs
            );
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn get_home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .with_context(|| "Could not determine home directory")
}

pub fn get_config_dir() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(".config").join(CONFIG_DIR_NAME))
}

pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Parse a config file. A missing file yields the defaults.
pub fn load_from_file(path: &Path) -> Result<WizardConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(WizardConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: WizardConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

/// Load the full configuration: file, `.env`, then environment overrides
pub fn load_config(path: Option<&Path>) -> Result<WizardConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => get_config_file_path()?,
    };
    let mut config = load_from_file(&path)?;

    if let Some(dir) = path.parent() {
        let env_path = dir.join(ENV_FILE_NAME);
        if env_path.exists() {
            dotenv::from_path(&env_path)
                .with_context(|| format!("Failed to load {}", env_path.display()))?;
            tracing::debug!(path = %env_path.display(), "loaded env file");
        }
    }

    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from_file(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, WizardConfig::default());
        assert_eq!(config.script_url(), DEFAULT_SCRIPT_URL);
        assert_eq!(config.rollout_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
kubectl_command = "sudo k3s kubectl"
rollout_timeout_secs = 45

[hooks]
node_init = "/usr/local/bin/prepare-node"
"#
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.kubectl_command, "sudo k3s kubectl");
        assert_eq!(config.rollout_timeout_secs, 45);
        assert_eq!(
            config.hooks.node_init.as_deref(),
            Some("/usr/local/bin/prepare-node")
        );
        assert!(config.hooks.storage_server.is_none());
        assert_eq!(config.provisioner_image, DEFAULT_PROVISIONER_IMAGE);
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rollout_timeout_secs = \"soon\"").unwrap();
        assert!(load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_MIRROR, "cn"),
            (ENV_KUBECTL, "k3s kubectl"),
            (ENV_ROLLOUT_TIMEOUT, "300"),
            (ENV_K3S_VERSION, " "),
        ]
        .into_iter()
        .collect();

        let mut config = WizardConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.mirror.as_deref(), Some("cn"));
        assert_eq!(config.kubectl_command, "k3s kubectl");
        assert_eq!(config.rollout_timeout_secs, 300);
        // Blank values are ignored
        assert!(config.k3s_version.is_none());
        assert_eq!(config.script_url(), CN_MIRROR_SCRIPT_URL);
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut config = WizardConfig::default();
        let result = config.apply_overrides(|k| (k == ENV_ROLLOUT_TIMEOUT).then(|| "2m".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_timeout_override_rejected() {
        let mut config = WizardConfig::default();
        let result = config.apply_overrides(|k| (k == ENV_ROLLOUT_TIMEOUT).then(|| "0".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_timeout_in_file_rejected() {
        for value in ["0", "86400"] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "rollout_timeout_secs = {}", value).unwrap();
            let err = load_from_file(file.path()).unwrap_err();
            assert!(format!("{:#}", err).contains("rollout_timeout_secs"));
        }
    }

    #[test]
    fn test_explicit_script_url_wins_over_mirror() {
        let config = WizardConfig {
            install_script_url: Some("https://mirror.internal/k3s.sh".to_string()),
            mirror: Some("cn".to_string()),
            ..Default::default()
        };
        assert_eq!(config.script_url(), "https://mirror.internal/k3s.sh");
    }
}
