//! Package-manager collaborator.
//!
//! Downstream of the materializer: given a generated project directory,
//! detect (or accept) a package manager and run its install step. Install
//! failure is a warning-level outcome, never a generation failure — a
//! generated-but-not-installed project is a valid, recoverable end state.

use crate::utils::exec::{ExecResult, exec};
use anyhow::Result;
use clap::ValueEnum;
use std::{fmt, path::Path};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    pub const fn command(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// Whether the manager's binary resolves through `PATH`.
    pub fn is_available(self) -> bool {
        which::which(self.command()).is_ok()
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Detect the package manager for `dir`.
///
/// Order: the `npm_config_user_agent` environment variable set by a running
/// manager, then lockfiles in `dir`, then npm as the default.
pub fn detect(dir: &Path) -> PackageManager {
    if let Ok(agent) = std::env::var("npm_config_user_agent") {
        if agent.starts_with("pnpm") {
            return PackageManager::Pnpm;
        }
        if agent.starts_with("yarn") {
            return PackageManager::Yarn;
        }
        if agent.starts_with("bun") {
            return PackageManager::Bun;
        }
        if agent.starts_with("npm") {
            return PackageManager::Npm;
        }
    }
    detect_from_lockfiles(dir)
}

/// Lockfile-based detection only (environment ignored).
fn detect_from_lockfiles(dir: &Path) -> PackageManager {
    const LOCKFILES: &[(&str, PackageManager)] = &[
        ("bun.lockb", PackageManager::Bun),
        ("pnpm-lock.yaml", PackageManager::Pnpm),
        ("yarn.lock", PackageManager::Yarn),
        ("package-lock.json", PackageManager::Npm),
    ];
    for (name, pm) in LOCKFILES {
        if dir.join(name).exists() {
            return *pm;
        }
    }
    PackageManager::Npm
}

/// Run `<pm> install` in `dir`, capturing output and exit code.
pub fn install(dir: &Path, pm: PackageManager) -> Result<ExecResult> {
    exec(Some(dir), pm.command(), &["install"])
}
