// K3s Wizard Library
// Role compiler, manifest generator and cluster client, plus the CLI commands that drive them

pub mod cli_types;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod services;
pub mod utils;

pub use cli_types::Commands;
pub use commands::handle_command;
