//! External command execution utilities.
//!
//! Runs external tools (package managers, mostly) with captured output and
//! explicit exit-code reporting. Binaries are resolved through `PATH` up
//! front so a missing tool fails with a clear message instead of a raw
//! spawn error.

use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    process::Command,
};

/// Outcome of a finished external command.
#[derive(Debug)]
pub struct ExecResult {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    /// True when the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Resolve a binary name through `PATH`.
pub fn resolve_bin(name: &str) -> Result<PathBuf> {
    which::which(name).with_context(|| format!("`{name}` not found in PATH"))
}

/// Run `cmd args...` in `root` (or the current directory) and capture output.
///
/// A non-zero exit code is not an error here; callers inspect
/// [`ExecResult::success`] and decide how loud to be about it.
pub fn exec(root: Option<&Path>, cmd: &str, args: &[&str]) -> Result<ExecResult> {
    let bin = resolve_bin(cmd)?;

    let mut command = Command::new(bin);
    command.args(args);
    if let Some(root) = root {
        command.current_dir(root);
    }

    let output = command
        .output()
        .with_context(|| format!("failed to run `{cmd} {}`", args.join(" ")))?;

    Ok(ExecResult {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
