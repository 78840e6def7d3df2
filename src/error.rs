//! Scaffolding error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the scaffold engine.
///
/// Cache-store failures are deliberately absent: the content store is
/// best-effort and the engine falls back to a direct write instead of
/// reporting them.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    /// Invalid generation request, detected before any file I/O begins.
    #[error("configuration error: {0}")]
    Config(String),

    /// Template root traversal failed.
    #[error("failed to walk template root `{}`", .0.display())]
    Walk(PathBuf, #[source] walkdir::Error),

    /// Template compilation failed while preloading the registry.
    #[error("failed to compile template `{}`", .0.display())]
    Template(PathBuf, #[source] Box<handlebars::TemplateError>),

    /// Template evaluation failed (syntax error or, in strict mode, a
    /// reference to a context field that does not exist).
    #[error("failed to render template `{}`", .0.display())]
    Render(PathBuf, #[source] Box<handlebars::RenderError>),

    /// IO error attributed to a specific path.
    #[error("IO error on `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    /// A materializer worker stopped without producing an outcome.
    #[error("worker task failed: {0}")]
    Task(String),
}
