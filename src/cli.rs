//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use crate::pm::PackageManager;
use crate::stack::{Framework, Language, Orm, Runtime, Stack};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stencil backend project scaffolder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Template library root (default: $STENCIL_TEMPLATES, then ./templates)
    #[arg(short = 'T', long)]
    pub template_root: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Stack selection flags for `new`
#[derive(clap::Args, Debug, Clone)]
pub struct StackArgs {
    /// Target runtime
    #[arg(short, long, value_enum, default_value_t = Runtime::Node)]
    pub runtime: Runtime,

    /// Source language
    #[arg(short, long, value_enum, default_value_t = Language::Ts)]
    pub language: Language,

    /// ORM layer
    #[arg(short, long, value_enum, default_value_t = Orm::Mongoose)]
    pub orm: Orm,

    /// Web framework
    #[arg(short, long, value_enum, default_value_t = Framework::Express)]
    pub framework: Framework,
}

impl StackArgs {
    pub const fn to_stack(&self) -> Stack {
        Stack {
            runtime: self.runtime,
            language: self.language,
            orm: self.orm,
            framework: self.framework,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scaffold a new backend project from a stack's template tree
    New {
        /// Project name (also the default target directory)
        name: String,

        #[command(flatten)]
        stack: StackArgs,

        /// Target directory (default: ./<name>)
        #[arg(long)]
        target: Option<PathBuf>,

        /// Package manager for the install step (default: auto-detect)
        #[arg(short, long, value_enum)]
        package_manager: Option<PackageManager>,

        /// Skip the dependency install step
        #[arg(long)]
        no_install: bool,

        /// Bypass the content-addressed cache entirely
        #[arg(long)]
        skip_cache: bool,

        /// Maximum concurrent file operations (default: 2x CPU count)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Materialize into a non-empty target directory
        #[arg(long)]
        force: bool,

        /// Print the generation result as JSON instead of log lines
        #[arg(long)]
        json: bool,
    },

    /// List every template file in the library
    Templates {
        /// Print the index as JSON instead of log lines
        #[arg(long)]
        json: bool,
    },

    /// Render a single template to stdout (debugging aid)
    Render {
        /// Template path, absolute or relative to the template root
        template: PathBuf,

        /// Render context as a JSON object
        #[arg(short, long)]
        context: Option<String>,
    },
}

#[allow(unused)]
impl Cli {
    pub const fn is_new(&self) -> bool {
        matches!(self.command, Commands::New { .. })
    }
    pub const fn is_templates(&self) -> bool {
        matches!(self.command, Commands::Templates { .. })
    }
    pub const fn is_render(&self) -> bool {
        matches!(self.command, Commands::Render { .. })
    }
}
