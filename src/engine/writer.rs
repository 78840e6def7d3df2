//! Tree materialization.
//!
//! Turns an indexed template tree plus a context into a concrete file tree
//! on disk. For every indexed file, under the concurrency limiter:
//!
//! 1. map the source name to its destination name,
//! 2. ensure the destination's parent directory exists,
//! 3. classify: template (by extension), binary (NUL byte in the first
//!    512 bytes), or plain text,
//! 4. render or copy, consulting the content-addressed store,
//! 5. write atomically (temp sibling + rename), preserving permission bits.
//!
//! A file served by hard-linking an existing store entry counts as
//! *skipped*; everything else counts as *created*. Any single file's failure
//! fails the whole run; already-written files are left in place.

use crate::engine::index::{TemplateFileMeta, load_template_index};
use crate::engine::limit::Limiter;
use crate::engine::normalize::{TEMPLATE_EXT, map_rel_path};
use crate::engine::render::{Context, Renderer};
use crate::engine::store::ContentStore;
use crate::error::ScaffoldError;
use std::{
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::task::JoinSet;

/// Bytes inspected when sniffing a file for binary content.
const SNIFF_WINDOW: usize = 512;

/// One generation run: which tree to materialize, where, and how.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub templates_root: PathBuf,
    pub target_root: PathBuf,
    pub context: Context,
    /// Maximum in-flight file operations; defaults to twice the CPU count.
    pub concurrency: Option<usize>,
    /// Disable the content-addressed store entirely (reads and writes).
    pub skip_cache: bool,
    /// Allow materializing into a non-empty target directory.
    pub force: bool,
}

/// Outcome of a generation run.
///
/// `created` and `skipped` are absolute destination paths in completion
/// order, which is not source order; sort before comparing.
#[derive(Debug, serde::Serialize)]
pub struct GenerateResult {
    pub target_root: PathBuf,
    /// Files freshly written this run.
    pub created: Vec<PathBuf>,
    /// Files satisfied by hard-linking a content-store entry.
    pub skipped: Vec<PathBuf>,
}

/// Per-file outcome.
enum Written {
    Created(PathBuf),
    Skipped(PathBuf),
}

/// Shared state cloned into every file task.
#[derive(Clone)]
struct TaskState {
    context: Arc<Context>,
    renderer: Arc<Renderer>,
    store: Arc<ContentStore>,
    skip_cache: bool,
}

/// Materialize the template tree described by `req`.
///
/// All-or-nothing at the run level: the first file-level error is reported
/// after every in-flight task has finished, and nothing already written is
/// rolled back.
pub async fn materialize(
    req: &GenerateRequest,
    renderer: Arc<Renderer>,
    store: Arc<ContentStore>,
) -> Result<GenerateResult, ScaffoldError> {
    if !req.force && !is_dir_empty(&req.target_root)? {
        return Err(ScaffoldError::Config(format!(
            "target directory `{}` is not empty",
            req.target_root.display()
        )));
    }

    if !req.skip_cache {
        store.init().await;
    }

    let index = load_template_index(&req.templates_root)?;
    let limiter = Limiter::new(req.concurrency.unwrap_or_else(Limiter::default_bound));
    let state = TaskState {
        context: Arc::new(req.context.clone()),
        renderer,
        store,
        skip_cache: req.skip_cache,
    };

    let mut tasks = JoinSet::new();
    for entry in index {
        let dest = req.target_root.join(map_rel_path(&entry.rel));
        let state = state.clone();
        tasks.spawn(limiter.run(process_entry(entry, dest, state)));
    }

    let mut created = Vec::new();
    let mut skipped = Vec::new();
    let mut first_err: Option<ScaffoldError> = None;

    // Let every in-flight task finish or fail on its own; report the first
    // error afterwards, never swallowing it behind later successes.
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(Written::Created(path))) => created.push(path),
            Ok(Ok(Written::Skipped(path))) => skipped.push(path),
            Ok(Err(err)) => {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
            Err(join_err) => {
                if first_err.is_none() {
                    first_err = Some(ScaffoldError::Task(join_err.to_string()));
                }
            }
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(GenerateResult {
            target_root: req.target_root.clone(),
            created,
            skipped,
        }),
    }
}

/// Handle a single indexed file end to end.
async fn process_entry(
    entry: TemplateFileMeta,
    dest: PathBuf,
    state: TaskState,
) -> Result<Written, ScaffoldError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ScaffoldError::Io(parent.to_path_buf(), e))?;
    }

    if entry.rel.ends_with(TEMPLATE_EXT) {
        handle_template(&entry, &dest, &state).await
    } else if is_binary(&entry.abs) {
        handle_binary(&entry, &dest, &state).await
    } else {
        handle_text(&entry, &dest).await
    }
}

/// Render a template file and write (or link) the result.
async fn handle_template(
    entry: &TemplateFileMeta,
    dest: &Path,
    state: &TaskState,
) -> Result<Written, ScaffoldError> {
    let rendered = state.renderer.render(&entry.abs, &state.context).await?;
    let bytes = rendered.into_bytes();

    if !state.skip_cache {
        let hash = ContentStore::hash(&bytes);
        if state.store.try_link(&hash, dest, entry.mode).await {
            return Ok(Written::Skipped(dest.to_path_buf()));
        }
        atomic_write_bytes(dest, &bytes, entry.mode).await?;
        state.store.ensure(&hash, &bytes, entry.mode).await;
        return Ok(Written::Created(dest.to_path_buf()));
    }

    atomic_write_bytes(dest, &bytes, entry.mode).await?;
    Ok(Written::Created(dest.to_path_buf()))
}

/// Copy a binary file byte-for-byte, deduplicating through the store.
async fn handle_binary(
    entry: &TemplateFileMeta,
    dest: &Path,
    state: &TaskState,
) -> Result<Written, ScaffoldError> {
    let bytes = tokio::fs::read(&entry.abs)
        .await
        .map_err(|e| ScaffoldError::Io(entry.abs.clone(), e))?;

    if !state.skip_cache {
        let hash = ContentStore::hash(&bytes);
        if state.store.try_link(&hash, dest, entry.mode).await {
            return Ok(Written::Skipped(dest.to_path_buf()));
        }
        // Populate the store first so the destination can share its inode;
        // a fresh link still counts as created.
        state.store.ensure(&hash, &bytes, entry.mode).await;
        if state.store.try_link(&hash, dest, entry.mode).await {
            return Ok(Written::Created(dest.to_path_buf()));
        }
    }

    atomic_write_bytes(dest, &bytes, entry.mode).await?;
    Ok(Written::Created(dest.to_path_buf()))
}

/// Plain text file: always written fresh, never content-cached.
async fn handle_text(entry: &TemplateFileMeta, dest: &Path) -> Result<Written, ScaffoldError> {
    let bytes = tokio::fs::read(&entry.abs)
        .await
        .map_err(|e| ScaffoldError::Io(entry.abs.clone(), e))?;
    atomic_write_bytes(dest, &bytes, entry.mode).await?;
    Ok(Written::Created(dest.to_path_buf()))
}

/// Sniff the first [`SNIFF_WINDOW`] bytes for a NUL byte.
///
/// Deliberately synchronous: a bounded read of at most 512 bytes, not worth
/// a round-trip through the async executor. Zero-byte and unreadable files
/// classify as text (no NUL found).
fn is_binary(path: &Path) -> bool {
    let mut buf = [0u8; SNIFF_WINDOW];
    match std::fs::File::open(path) {
        Ok(mut file) => match file.read(&mut buf) {
            Ok(n) => buf[..n].contains(&0),
            Err(_) => false,
        },
        Err(_) => false,
    }
}

/// Write `bytes` to `dest` atomically: temp sibling, chmod, rename.
///
/// A concurrent reader never observes a partially written destination; a
/// crash mid-write leaves only an orphaned temp file.
pub(crate) async fn atomic_write_bytes(
    dest: &Path,
    bytes: &[u8],
    mode: u32,
) -> Result<(), ScaffoldError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ScaffoldError::Io(parent.to_path_buf(), e))?;
    }

    let tmp = tmp_sibling(dest);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| ScaffoldError::Io(tmp.clone(), e))?;
    set_mode(&tmp, mode).await;

    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(ScaffoldError::Io(dest.to_path_buf(), e));
    }
    Ok(())
}

/// Apply POSIX permission bits (masked to 0o777). No-op off unix.
pub(crate) async fn set_mode(path: &Path, mode: u32) {
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, Permissions::from_mode(mode & 0o777))
            .await
            .ok();
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
}

/// Temp sibling name: destination plus process id, unique per writer.
fn tmp_sibling(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(format!(".{}.tmp", std::process::id()));
    PathBuf::from(name)
}

/// True when `path` does not exist or contains no entries.
fn is_dir_empty(path: &Path) -> Result<bool, ScaffoldError> {
    if !path.exists() {
        return Ok(true);
    }
    let mut entries = std::fs::read_dir(path).map_err(|e| ScaffoldError::Io(path.to_path_buf(), e))?;
    Ok(entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn ctx(pairs: &[(&str, serde_json::Value)]) -> Context {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    struct Fixture {
        _root: tempfile::TempDir,
        templates: PathBuf,
        store: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let templates = root.path().join("templates");
            fs::create_dir_all(&templates).unwrap();
            let store = root.path().join("store");
            Self {
                _root: root,
                templates,
                store,
            }
        }

        fn write(&self, rel: &str, content: &[u8]) {
            let path = self.templates.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }

        fn target(&self, name: &str) -> PathBuf {
            self._root.path().join(name)
        }

        async fn run(
            &self,
            target: &Path,
            context: Context,
            skip_cache: bool,
        ) -> Result<GenerateResult, ScaffoldError> {
            self.run_req(GenerateRequest {
                templates_root: self.templates.clone(),
                target_root: target.to_path_buf(),
                context,
                concurrency: None,
                skip_cache,
                force: false,
            })
            .await
        }

        async fn run_req(&self, req: GenerateRequest) -> Result<GenerateResult, ScaffoldError> {
            materialize(
                &req,
                Arc::new(Renderer::new()),
                Arc::new(ContentStore::new(self.store.clone())),
            )
            .await
        }
    }

    #[tokio::test]
    async fn test_dotfile_template_end_to_end() {
        let fx = Fixture::new();
        fx.write("_gitignore.hbs", b"node_modules\n{{name}}.log\n");

        let target = fx.target("out");
        let result = fx
            .run(&target, ctx(&[("name", json!("app"))]), false)
            .await
            .unwrap();

        let dest = target.join(".gitignore");
        assert_eq!(result.created, vec![dest.clone()]);
        assert!(result.skipped.is_empty());
        assert_eq!(fs::read_to_string(dest).unwrap(), "node_modules\napp.log\n");
    }

    #[tokio::test]
    async fn test_text_file_passes_through_untouched() {
        let fx = Fixture::new();
        // No template extension: renderer never sees this, handlebars
        // braces survive verbatim
        fx.write("src/index.js", b"console.log(\"hi {{name}}\")");

        let target = fx.target("out");
        fx.run(&target, ctx(&[]), false).await.unwrap();

        assert_eq!(
            fs::read(target.join("src/index.js")).unwrap(),
            b"console.log(\"hi {{name}}\")"
        );
    }

    #[tokio::test]
    async fn test_binary_file_copied_byte_for_byte() {
        let fx = Fixture::new();
        let payload: Vec<u8> = vec![0x89, b'P', b'N', b'G', 0x00, 0x1a, 0xff, 0x00];
        fx.write("logo.png", &payload);

        let target = fx.target("out");
        let result = fx.run(&target, ctx(&[]), false).await.unwrap();

        assert_eq!(result.created.len(), 1);
        assert_eq!(fs::read(target.join("logo.png")).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_nul_in_sniff_window_means_binary_copy() {
        let fx = Fixture::new();
        // Text-like apart from one NUL byte: must be copied, not decoded
        let mut payload = b"mostly text ".to_vec();
        payload.push(0);
        payload.extend_from_slice(b" more text");
        fx.write("data.txt", &payload);

        let target = fx.target("out");
        fx.run(&target, ctx(&[]), false).await.unwrap();
        assert_eq!(fs::read(target.join("data.txt")).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_zero_byte_file_is_text() {
        let fx = Fixture::new();
        fx.write("empty.keep", b"");

        let target = fx.target("out");
        let result = fx.run(&target, ctx(&[]), false).await.unwrap();

        // Created, not skipped: text files never go through the store
        assert_eq!(result.created.len(), 1);
        assert_eq!(fs::read(target.join("empty.keep")).unwrap(), b"");
    }

    #[tokio::test]
    async fn test_second_run_served_from_cache() {
        let fx = Fixture::new();
        fx.write("server.js.hbs", b"const app = \"{{name}}\";\n");
        let context = ctx(&[("name", json!("app"))]);

        let first = fx.run(&fx.target("a"), context.clone(), false).await.unwrap();
        assert_eq!(first.created.len(), 1);
        assert!(first.skipped.is_empty());

        let second = fx.run(&fx.target("b"), context, false).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.skipped.len(), 1);

        // Cache hit is a cost signal, not a semantic no-op: content matches
        assert_eq!(
            fs::read(fx.target("a").join("server.js")).unwrap(),
            fs::read(fx.target("b").join("server.js")).unwrap()
        );
    }

    #[tokio::test]
    async fn test_skip_cache_never_links_or_populates() {
        let fx = Fixture::new();
        fx.write("server.js.hbs", b"x = {{name}}");
        let context = ctx(&[("name", json!("1"))]);

        let first = fx.run(&fx.target("a"), context.clone(), true).await.unwrap();
        let second = fx.run(&fx.target("b"), context, true).await.unwrap();

        assert_eq!(first.created.len(), 1);
        assert_eq!(second.created.len(), 1);
        assert!(first.skipped.is_empty() && second.skipped.is_empty());
        // The store directory was never even created
        assert!(!fx.store.exists());
    }

    #[tokio::test]
    async fn test_deterministic_across_runs() {
        let fx = Fixture::new();
        fx.write("package.json.hbs", b"{\"name\": \"{{name}}\"}");
        fx.write("src/index.js", b"main()");
        fx.write("_env", b"PORT=3000");
        let context = ctx(&[("name", json!("det"))]);

        fx.run(&fx.target("a"), context.clone(), true).await.unwrap();
        fx.run(&fx.target("b"), context, true).await.unwrap();

        for rel in ["package.json", "src/index.js", ".env"] {
            assert_eq!(
                fs::read(fx.target("a").join(rel)).unwrap(),
                fs::read(fx.target("b").join(rel)).unwrap(),
                "mismatch for {rel}"
            );
        }
    }

    #[tokio::test]
    async fn test_every_file_lands_in_exactly_one_list() {
        let fx = Fixture::new();
        for i in 0..12 {
            fx.write(&format!("src/mod{i}.js.hbs"), b"// {{name}}");
        }
        fx.write("README.md", b"readme");
        let context = ctx(&[("name", json!("x"))]);

        let result = fx.run(&fx.target("out"), context, false).await.unwrap();
        let mut all: Vec<_> = result.created.iter().chain(&result.skipped).collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(total, 13);
        assert_eq!(all.len(), 13, "a path appeared in both lists");
    }

    #[tokio::test]
    async fn test_render_error_aborts_run() {
        let fx = Fixture::new();
        fx.write("ok.txt", b"fine");
        fx.write("broken.js.hbs", b"{{undefined_field.prop}}");

        let target = fx.target("out");
        let err = fx.run(&target, ctx(&[]), false).await.unwrap_err();

        match err {
            ScaffoldError::Render(path, _) => {
                assert!(path.ends_with("broken.js.hbs"), "got {}", path.display())
            }
            other => panic!("expected render error, got {other}"),
        }
        // The failing file never materialized
        assert!(!target.join("broken.js").exists());
    }

    #[tokio::test]
    async fn test_non_empty_target_refused_without_force() {
        let fx = Fixture::new();
        fx.write("a.txt", b"a");

        let target = fx.target("out");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("existing"), "x").unwrap();

        let err = fx.run(&target, ctx(&[]), false).await.unwrap_err();
        assert!(matches!(err, ScaffoldError::Config(_)));

        let mut req = GenerateRequest {
            templates_root: fx.templates.clone(),
            target_root: target.clone(),
            context: ctx(&[]),
            concurrency: None,
            skip_cache: false,
            force: true,
        };
        fx.run_req(req.clone()).await.unwrap();
        assert!(target.join("a.txt").exists());

        // Re-running over the same tree with force also succeeds
        req.force = true;
        fx.run_req(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let fx = Fixture::new();
        for i in 0..8 {
            fx.write(&format!("f{i}.txt"), b"data");
        }
        let target = fx.target("out");
        fx.run(&target, ctx(&[]), false).await.unwrap();

        for entry in walkdir::WalkDir::new(&target) {
            let entry = entry.unwrap();
            let name = entry.file_name().to_string_lossy();
            assert!(!name.ends_with(".tmp"), "leftover temp file {name}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mode_bits_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new();
        fx.write("run.sh", b"#!/bin/sh\necho hi\n");
        fs::set_permissions(
            fx.templates.join("run.sh"),
            fs::Permissions::from_mode(0o755),
        )
        .unwrap();

        let target = fx.target("out");
        fx.run(&target, ctx(&[]), false).await.unwrap();

        let mode = fs::metadata(target.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn test_concurrency_bound_of_one_still_completes() {
        let fx = Fixture::new();
        for i in 0..10 {
            fx.write(&format!("f{i}.txt"), b"x");
        }
        let req = GenerateRequest {
            templates_root: fx.templates.clone(),
            target_root: fx.target("out"),
            context: ctx(&[]),
            concurrency: Some(1),
            skip_cache: true,
            force: false,
        };
        let result = fx.run_req(req).await.unwrap();
        assert_eq!(result.created.len(), 10);
    }

    #[tokio::test]
    async fn test_result_serializes_to_json() {
        let fx = Fixture::new();
        fx.write("a.txt", b"x");
        let result = fx.run(&fx.target("out"), ctx(&[]), true).await.unwrap();

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["created"].as_array().unwrap().len(), 1);
        assert!(value["skipped"].as_array().unwrap().is_empty());
        assert!(value["target_root"].is_string());
    }

    #[tokio::test]
    async fn test_atomic_write_creates_parents_and_cleans_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("deep/nested/file.txt");
        atomic_write_bytes(&dest, b"content", 0o644).await.unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"content");
        assert!(!tmp_sibling(&dest).exists());
    }
}
