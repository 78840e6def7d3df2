//! The scaffold engine: template indexing, rendering, caching, and tree
//! materialization.
//!
//! # Pipeline
//!
//! ```text
//! GenerateRequest
//!   └─> index      walk the template root into TemplateFileMeta entries
//!   └─> writer     one task per entry, bounded by limit::Limiter
//!         ├─ normalize   source name -> destination name
//!         ├─ render      handlebars + LRU render cache (templates only)
//!         ├─ store       content-addressed dedupe via hard links
//!         └─ atomic write (temp sibling + rename)
//!   └─> GenerateResult   created vs. skipped destination paths
//! ```
//!
//! The engine owns no policy about stacks, package managers, or prompting;
//! callers hand it a template root, a target root, and a context.

pub mod index;
pub mod limit;
pub mod normalize;
pub mod render;
pub mod store;
pub mod writer;

pub use index::{TemplateFileMeta, load_template_index};
pub use render::{Context, Renderer};
pub use store::ContentStore;
pub use writer::{GenerateRequest, GenerateResult, materialize};

use crate::error::ScaffoldError;
use std::path::Path;
use std::sync::Arc;

/// Long-lived engine instance: a renderer (with its render cache) plus a
/// content-addressed store, shared across generation runs.
pub struct Engine {
    renderer: Arc<Renderer>,
    store: Arc<ContentStore>,
}

impl Engine {
    /// Engine backed by the per-user default store root.
    pub fn new() -> Self {
        Self::with_store_root(ContentStore::default_root())
    }

    /// Engine with an explicit store root (tests use a temp directory).
    pub fn with_store_root(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            renderer: Arc::new(Renderer::new()),
            store: Arc::new(ContentStore::new(root)),
        }
    }

    /// Precompile every template beneath `root` into the renderer registry.
    /// Returns how many templates were registered.
    pub fn preload(&self, root: &Path) -> Result<usize, ScaffoldError> {
        self.renderer.preload(root)
    }

    /// Materialize a template tree. See [`writer::materialize`].
    pub async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResult, ScaffoldError> {
        materialize(req, self.renderer.clone(), self.store.clone()).await
    }

    /// Render a single template file to a string, without touching disk
    /// beyond reading the source. Useful for previewing.
    pub async fn render_file(&self, abs: &Path, context: &Context) -> Result<String, ScaffoldError> {
        self.renderer.render(abs, context).await
    }

    /// Drop all cached render output and compiled templates.
    #[allow(unused)]
    pub fn clear_cache(&self) {
        self.renderer.clear();
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
