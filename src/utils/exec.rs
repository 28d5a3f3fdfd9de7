use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, ExitStatus, Output, Stdio};

/// Local command execution helpers
pub mod local {
    use super::*;

    pub fn execute(program: &str, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdout(Stdio::piped()); // Capture stdout for parsing
        cmd.stderr(Stdio::piped()); // Capture stderr for error messages
        cmd.stdin(Stdio::null());
        cmd.output()
            .with_context(|| format!("Failed to execute command: {}", program))
    }

    /// Run a command with `input` written to its stdin and output captured
    pub fn execute_with_stdin(program: &str, args: &[&str], input: &[u8]) -> Result<Output> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute command: {}", program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .with_context(|| format!("Failed to write stdin of {}", program))?;
        }

        child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for command: {}", program))
    }

    /// Run a command with extra environment and stdin, output goes straight to the terminal
    pub fn execute_streaming(
        program: &str,
        args: &[&str],
        env: &BTreeMap<String, String>,
        input: &[u8],
    ) -> Result<ExitStatus> {
        let mut child = Command::new(program)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to execute command: {}", program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .with_context(|| format!("Failed to write stdin of {}", program))?;
        }

        child
            .wait()
            .with_context(|| format!("Failed to wait for command: {}", program))
    }

    /// Check if a command exists using native Rust (which crate)
    pub fn check_command_exists(command: &str) -> bool {
        which::which(command).is_ok()
    }

    /// Execute a shell command attached to the terminal
    pub fn execute_shell_interactive(command: &str) -> Result<ExitStatus> {
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Failed to execute shell command: {}", command))
    }
}

/// Trait for executing commands on the node being configured
pub trait CommandExecutor {
    /// Execute a program with arguments, capturing output
    fn execute_simple(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Execute a program, feeding `input` on stdin, capturing output
    fn execute_with_stdin(&self, program: &str, args: &[&str], input: &[u8]) -> Result<Output>;

    /// Execute a program with extra environment and stdin, streaming its output
    fn execute_streaming(
        &self,
        program: &str,
        args: &[&str],
        env: &BTreeMap<String, String>,
        input: &[u8],
    ) -> Result<ExitStatus>;

    /// Execute a shell command attached to the terminal
    fn execute_shell_interactive(&self, command: &str) -> Result<ExitStatus>;

    /// Check if a command exists
    fn check_command_exists(&self, command: &str) -> bool;
}

/// Executes commands on this machine
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl CommandExecutor for LocalExecutor {
    fn execute_simple(&self, program: &str, args: &[&str]) -> Result<Output> {
        tracing::debug!(program, ?args, "exec");
        local::execute(program, args)
    }

    fn execute_with_stdin(&self, program: &str, args: &[&str], input: &[u8]) -> Result<Output> {
        tracing::debug!(program, ?args, stdin_bytes = input.len(), "exec with stdin");
        local::execute_with_stdin(program, args, input)
    }

    fn execute_streaming(
        &self,
        program: &str,
        args: &[&str],
        env: &BTreeMap<String, String>,
        input: &[u8],
    ) -> Result<ExitStatus> {
        // Only log variable names, values carry the join token
        let env_keys: Vec<&String> = env.keys().collect();
        tracing::debug!(program, ?args, ?env_keys, "exec streaming");
        local::execute_streaming(program, args, env, input)
    }

    fn execute_shell_interactive(&self, command: &str) -> Result<ExitStatus> {
        tracing::debug!(command, "exec shell");
        local::execute_shell_interactive(command)
    }

    fn check_command_exists(&self, command: &str) -> bool {
        local::check_command_exists(command)
    }
}
