//! Error types
//!
//! `CompileError` covers everything caught locally before any external call.
//! `ExternalError` covers failures reported by the installer process or the
//! cluster. Command code wraps both in `anyhow` and they stay downcastable.

use thiserror::Error;

/// Errors raised while compiling a role request or rendering manifests
#[derive(Error, Debug)]
pub enum CompileError {
    /// Structural contradiction in a role request (missing or conflicting field)
    #[error("invalid role request: {field}: {reason}")]
    InvalidRoleState { field: &'static str, reason: String },

    /// A configuration value outside its legal range
    #[error("invalid value for {field} ({value}): {reason}")]
    OutOfRangeConfig {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// The requested storage class name is already owned by another provisioner
    #[error(
        "storage class '{name}' already exists with provisioner '{existing}', refusing to replace it"
    )]
    StorageClassConflict { name: String, existing: String },

    #[error("failed to render manifest values: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl CompileError {
    pub fn invalid_role(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRoleState {
            field,
            reason: reason.into(),
        }
    }

    pub fn out_of_range(
        field: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::OutOfRangeConfig {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by an external collaborator (installer or cluster)
#[derive(Error, Debug)]
pub enum ExternalError {
    /// The install script exited non-zero. No retry is attempted.
    #[error("K3s installer failed (exit status: {})", exit_status(.code))]
    InstallFailed { code: Option<i32> },

    /// No live cluster could be reached with the configured kubectl
    #[error("cluster unreachable: {reason}")]
    ClusterUnreachable { reason: String },

    /// kubectl rejected an apply or patch
    #[error("failed to {what}: {detail}")]
    ApplyFailed { what: String, detail: String },
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "killed by signal".to_string(),
    }
}
