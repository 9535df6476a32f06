//! External process invocation
//!
//! Every binary this crate shells out to (`rustc`, `cargo`, the cache
//! helper) goes through [`ProcessRunner`] so tests can substitute canned
//! output. No timeout is imposed here.

use crate::error::{RustcargoError, RustcargoResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; -1 when the process was killed by a signal
    pub code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs a program to completion and captures its output
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`; a non-zero exit is reported in the output, not as an error
    async fn run(&self, program: &str, args: &[String]) -> RustcargoResult<ProcessOutput> {
        self.run_with_env(program, args, &[]).await
    }

    /// Like [`ProcessRunner::run`], with extra environment variables set for the child
    async fn run_with_env(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> RustcargoResult<ProcessOutput>;
}

/// Runner backed by `tokio::process`
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run_with_env(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> RustcargoResult<ProcessOutput> {
        debug!("Executing: {} {:?}", program, args);

        let output = Command::new(program)
            .args(args)
            .envs(env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RustcargoError::command_failed(display_command(program, args), e))?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Run a program and turn a non-zero exit into [`RustcargoError::ExternalTool`]
pub async fn run_checked(
    runner: &dyn ProcessRunner,
    program: &str,
    args: &[String],
) -> RustcargoResult<ProcessOutput> {
    let output = runner.run(program, args).await?;

    if !output.success() {
        return Err(RustcargoError::external_tool(
            display_command(program, args),
            output.code,
            output.stderr.trim(),
        ));
    }

    Ok(output)
}

/// Render a command line for logs and error messages
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
