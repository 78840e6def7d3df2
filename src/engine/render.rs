//! Template rendering with a bounded render cache.
//!
//! Templates are handlebars files evaluated in strict mode, so a reference
//! to a context field that does not exist is a hard error rather than empty
//! output.
//!
//! # Two render paths
//!
//! Preloaded templates (see [`Renderer::preload`]) are compiled once into the
//! registry, keyed by their absolute source path, and rendered from the
//! compiled form. Anything not in the registry falls back to reading the
//! source text and rendering it as a one-off string template. Both paths
//! produce identical output for identical input; preloading is purely a
//! speed optimization.
//!
//! # Caching
//!
//! Rendered output is cached in a strict LRU keyed by
//! `(absolute template path, hash of the context)`, so rendering the same
//! template with the same context across files or projects reuses the
//! previous string, while equally-named templates under different roots stay
//! distinct. The context hash serializes keys in sorted order, keeping cache
//! keys independent of map insertion order.

use crate::engine::normalize::TEMPLATE_EXT;
use crate::error::ScaffoldError;
use handlebars::Handlebars;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, num::NonZeroUsize, path::Path};
use walkdir::WalkDir;

/// Named values substituted into templates. Opaque to the engine and never
/// mutated by it.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Template renderer with compiled-template registry and render cache.
pub struct Renderer {
    registry: RwLock<Handlebars<'static>>,
    cache: Mutex<LruCache<String, String>>,
}

impl Renderer {
    /// Create a renderer with the default cache capacity
    /// (`max(1000, cpus × 200)` entries).
    pub fn new() -> Self {
        Self::with_capacity(default_cache_capacity())
    }

    /// Create a renderer with an explicit render-cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);

        Self {
            registry: RwLock::new(registry),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Compile every template beneath `root` into the registry.
    ///
    /// Optional: templates that are not preloaded still render through the
    /// fallback path. A compile failure here names the offending file and is
    /// fatal, the same as it would be at render time.
    pub fn preload(&self, root: &Path) -> Result<usize, ScaffoldError> {
        let mut count = 0;
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| ScaffoldError::Walk(root.to_path_buf(), e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = template_key(entry.path());
            if !name.ends_with(TEMPLATE_EXT) {
                continue;
            }
            self.registry
                .write()
                .register_template_file(&name, entry.path())
                .map_err(|e| {
                    ScaffoldError::Template(entry.path().to_path_buf(), Box::new(e))
                })?;
            count += 1;
        }
        Ok(count)
    }

    /// Render the template at `abs` against `context`.
    ///
    /// Checks the render cache first; on a miss, renders via the registry
    /// when the template was preloaded, otherwise reads the source text and
    /// interprets it directly.
    pub async fn render(&self, abs: &Path, context: &Context) -> Result<String, ScaffoldError> {
        let name = template_key(abs);
        let key = format!("{name}|{}", hash_context(context));

        if let Some(hit) = self.cache.lock().get(&key).cloned() {
            return Ok(hit);
        }

        // Fast path: compiled template registered under its absolute path.
        let compiled = {
            let registry = self.registry.read();
            if registry.has_template(&name) {
                Some(
                    registry
                        .render(&name, context)
                        .map_err(|e| ScaffoldError::Render(abs.to_path_buf(), Box::new(e)))?,
                )
            } else {
                None
            }
        };

        let rendered = match compiled {
            Some(out) => out,
            None => {
                let source = tokio::fs::read_to_string(abs)
                    .await
                    .map_err(|e| ScaffoldError::Io(abs.to_path_buf(), e))?;
                self.registry
                    .read()
                    .render_template(&source, context)
                    .map_err(|e| ScaffoldError::Render(abs.to_path_buf(), Box::new(e)))?
            }
        };

        self.cache.lock().put(key, rendered.clone());
        Ok(rendered)
    }

    /// Drop all cached render output and compiled templates.
    pub fn clear(&self) {
        self.cache.lock().clear();
        self.registry.write().clear_templates();
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry and cache key for a template: its absolute source path. A
/// root-relative key would conflate equally-named templates under different
/// template roots.
fn template_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Default render-cache capacity, scaled to the machine.
fn default_cache_capacity() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    (cpus * 200).max(1000)
}

/// SHA-256 over the context serialized with sorted keys.
///
/// `serde_json` map ordering depends on crate features, so the keys are
/// sorted explicitly to keep cache keys deterministic regardless of how the
/// context was built.
pub fn hash_context(context: &Context) -> String {
    let sorted: BTreeMap<&String, &serde_json::Value> = context.iter().collect();
    let bytes =
        serde_json::to_vec(&sorted).unwrap_or_else(|_| format!("{sorted:?}").into_bytes());
    hex::encode(Sha256::digest(&bytes))
}
