//! K3s node installation
//!
//! Compiles a node's role request into an install plan and hands it to the
//! install script.

mod compile;
mod install;
mod plan;
mod role;
mod token;

pub use compile::{RoleCompiler, compile};
pub use install::{
    CN_MIRROR_SCRIPT_URL, DEFAULT_SCRIPT_URL, Installer, ScriptInstaller, wait_for_service,
};
pub use plan::InstallPlan;
pub use role::{
    CONTROL_PLANE_PORT, DEDICATED_TAINT_EFFECT, DEDICATED_TAINT_KEY, DEDICATED_TAINT_VALUE,
    INGRESS_LABEL_KEY, INGRESS_LABEL_VALUE, IngressDesignation, Role, RoleRequest,
    dedicated_taint, ingress_label,
};
pub use token::{Token, TokenOrigin, TokenProvisioner, TokenSource, validate_format};
