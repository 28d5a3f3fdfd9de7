//! Compiled installer invocation

use super::role::Role;
use super::token::TokenOrigin;
use std::collections::BTreeMap;

pub const ENV_URL: &str = "K3S_URL";
pub const ENV_TOKEN: &str = "K3S_TOKEN";
pub const ENV_MIRROR: &str = "INSTALL_K3S_MIRROR";
pub const ENV_VERSION: &str = "INSTALL_K3S_VERSION";

/// Arguments and environment for one run of the K3s install script.
///
/// Built once per invocation and handed to the installer. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub(super) role: Role,
    pub(super) args: Vec<String>,
    pub(super) env: BTreeMap<String, String>,
    pub(super) token_origin: TokenOrigin,
}

impl InstallPlan {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Arguments for the install script, `server`/`agent` first, extra args last
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn token(&self) -> Option<&str> {
        self.env.get(ENV_TOKEN).map(String::as_str)
    }

    pub fn cluster_url(&self) -> Option<&str> {
        self.env.get(ENV_URL).map(String::as_str)
    }

    pub fn token_origin(&self) -> TokenOrigin {
        self.token_origin
    }

    /// Shell-like rendering with the token masked, for showing to the operator
    pub fn display_command(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| {
                if k == ENV_TOKEN {
                    format!("{}=<redacted>", k)
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect();
        parts.push("sh -s -".to_string());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}
