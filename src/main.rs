//! Stencil - a backend project scaffolder.
//!
//! Materializes a stack-specific project tree from a library of
//! parameterized templates, then installs dependencies.

mod cli;
mod engine;
mod error;
mod pm;
mod stack;
mod utils;

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use cli::{Cli, Commands, StackArgs};
use engine::normalize::sanitize_project_name;
use engine::{Context, Engine, GenerateRequest, load_template_index};
use pm::PackageManager;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let templates_root = resolve_templates_root(cli.template_root.clone())?;

    match cli.command {
        Commands::New {
            name,
            stack,
            target,
            package_manager,
            no_install,
            skip_cache,
            concurrency,
            force,
            json,
        } => {
            new_project(NewProject {
                templates_root,
                name,
                stack,
                target,
                package_manager,
                no_install,
                skip_cache,
                concurrency,
                force,
                json,
            })
            .await
        }
        Commands::Templates { json } => list_templates(&templates_root, json),
        Commands::Render { template, context } => {
            render_template(&templates_root, &template, context.as_deref()).await
        }
    }
}

/// Locate the template library: explicit flag, then the environment, then
/// a `templates/` directory next to the working directory.
fn resolve_templates_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        if path.is_dir() {
            return Ok(path);
        }
        bail!("template root not found: {}", path.display());
    }
    if let Ok(env_root) = std::env::var("STENCIL_TEMPLATES") {
        let path = PathBuf::from(env_root);
        if path.is_dir() {
            return Ok(path);
        }
    }
    let local = PathBuf::from("templates");
    if local.is_dir() {
        return Ok(local);
    }
    bail!("no template library found; pass --template-root or set STENCIL_TEMPLATES")
}

struct NewProject {
    templates_root: PathBuf,
    name: String,
    stack: StackArgs,
    target: Option<PathBuf>,
    package_manager: Option<PackageManager>,
    no_install: bool,
    skip_cache: bool,
    concurrency: Option<usize>,
    force: bool,
    json: bool,
}

/// Scaffold a project: materialize the stack's template tree, then run the
/// package manager's install step unless told otherwise.
async fn new_project(opts: NewProject) -> Result<()> {
    let name = sanitize_project_name(&opts.name);
    let stack = opts.stack.to_stack();
    let stack_dir = stack.templates_dir(&opts.templates_root);
    let target = resolve_target(opts.target, &name)?;

    let pm = match opts.package_manager {
        Some(pm) => pm,
        None => pm::detect(Path::new(".")),
    };
    let pm = if pm.is_available() {
        pm
    } else {
        log!("warn"; "{pm} not found, falling back to npm");
        PackageManager::Npm
    };

    let context: Context = stack.context(&name, pm.command());

    let engine = Engine::new();
    let preloaded = engine.preload(&stack_dir)?;
    if !opts.json {
        log!("scaffold"; "creating `{name}` ({stack}) in {}", target.display());
        if preloaded > 0 {
            log!("scaffold"; "{preloaded} templates precompiled");
        }
    }

    let request = GenerateRequest {
        templates_root: stack_dir,
        target_root: target.clone(),
        context,
        concurrency: opts.concurrency,
        skip_cache: opts.skip_cache,
        force: opts.force,
    };
    let result = engine.generate(&request).await?;
    if !opts.json {
        log!(
            "scaffold";
            "{} files written, {} reused from cache",
            result.created.len(),
            result.skipped.len()
        );
    }

    // Install failure leaves a valid, recoverable project behind; report it
    // as a warning and finish normally.
    if !opts.no_install {
        if !opts.json {
            log!("install"; "running `{pm} install`");
        }
        match pm::install(&target, pm) {
            Ok(out) if out.success() => {
                if !opts.json {
                    log!("install"; "dependencies installed");
                }
            }
            Ok(out) => {
                log!("warn"; "`{pm} install` exited with code {:?}", out.code);
                let stderr = out.stderr.trim();
                if !stderr.is_empty() {
                    log!("warn"; "{stderr}");
                }
            }
            Err(err) => log!("warn"; "dependency install failed: {err:#}"),
        }
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        log!("scaffold"; "done. next: cd {name}");
    }
    Ok(())
}

/// Absolute target directory: explicit flag or `./<name>`.
fn resolve_target(flag: Option<PathBuf>, name: &str) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    Ok(match flag {
        Some(path) if path.is_absolute() => path,
        Some(path) => cwd.join(path),
        None => cwd.join(name),
    })
}

/// Print every file in the template library.
fn list_templates(root: &Path, json: bool) -> Result<()> {
    let mut index = load_template_index(root)?;
    index.sort_by(|a, b| a.rel.cmp(&b.rel));
    if json {
        println!("{}", serde_json::to_string_pretty(&index)?);
        return Ok(());
    }
    for entry in &index {
        log!("templates"; "{} ({} B)", entry.rel, entry.size);
    }
    log!("templates"; "{} files under {}", index.len(), root.display());
    Ok(())
}

/// Render one template against an inline JSON context and print the result.
async fn render_template(root: &Path, template: &Path, raw_context: Option<&str>) -> Result<()> {
    let context: Context = match raw_context {
        Some(raw) => serde_json::from_str(raw).context("invalid --context JSON")?,
        None => Context::new(),
    };
    let abs = if template.is_absolute() {
        template.to_path_buf()
    } else {
        root.join(template)
    };

    let engine = Engine::new();
    let rendered = engine.render_file(&abs, &context).await?;
    print!("{rendered}");
    Ok(())
}
