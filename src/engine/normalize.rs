//! Destination-name mapping for template files.
//!
//! Template trees use two naming conventions, applied independently at each
//! path segment:
//!
//! - a leading `_` becomes a leading `.` (dotfiles such as `.gitignore`
//!   cannot be shipped with a literal dot inside npm packages),
//! - a trailing template extension (`.hbs`) is stripped.
//!
//! Both rules combine: `_gitignore.hbs` maps to `.gitignore`. The mapping is
//! idempotent on already-normalized names.

use std::path::PathBuf;

/// Extension marking a file as a renderable template.
pub const TEMPLATE_EXT: &str = ".hbs";

/// Map a single source path segment to its destination name.
///
/// The hidden-file prefix is handled first, then the template extension;
/// the two never interact (one affects the start of the name, the other
/// the end).
pub fn map_segment(name: &str) -> String {
    let name = match name.strip_prefix('_') {
        Some(rest) => format!(".{rest}"),
        None => name.to_string(),
    };
    match name.strip_suffix(TEMPLATE_EXT) {
        // A file literally named `.hbs` keeps its name
        Some(base) if !base.is_empty() => base.to_string(),
        _ => name,
    }
}

/// Map a posix-style relative path to its destination path, applying
/// [`map_segment`] to every component.
pub fn map_rel_path(rel: &str) -> PathBuf {
    rel.split('/').map(|seg| map_segment(seg)).collect()
}

/// Sanitize a user-supplied project name into a valid package name.
///
/// Lowercases, collapses whitespace into `-`, strips everything outside
/// `[a-z0-9._-]`, trims leading/trailing dashes. Falls back to `app` when
/// nothing survives.
pub fn sanitize_project_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = false;
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push('-');
                last_was_space = true;
            }
            continue;
        }
        last_was_space = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "app".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_map_segment_dotfile() {
        assert_eq!(map_segment("_gitignore"), ".gitignore");
        assert_eq!(map_segment("_env"), ".env");
    }

    #[test]
    fn test_map_segment_template_ext() {
        assert_eq!(map_segment("server.js.hbs"), "server.js");
        assert_eq!(map_segment("package.json.hbs"), "package.json");
    }

    #[test]
    fn test_map_segment_combined() {
        // Both rules apply to the same segment
        assert_eq!(map_segment("_gitignore.hbs"), ".gitignore");
    }

    #[test]
    fn test_map_segment_plain_name_untouched() {
        assert_eq!(map_segment("index.js"), "index.js");
        assert_eq!(map_segment("README.md"), "README.md");
    }

    #[test]
    fn test_map_segment_idempotent() {
        for name in ["_gitignore.hbs", "server.js.hbs", "_env", "index.js"] {
            let once = map_segment(name);
            assert_eq!(map_segment(&once), once, "not idempotent for {name}");
        }
    }

    #[test]
    fn test_map_segment_bare_extension_kept() {
        // A file named exactly `.hbs` has nothing to strip down to
        assert_eq!(map_segment(".hbs"), ".hbs");
    }

    #[test]
    fn test_map_rel_path_all_segments() {
        assert_eq!(
            map_rel_path("_config/server.js.hbs"),
            Path::new(".config/server.js")
        );
        assert_eq!(map_rel_path("src/index.js"), Path::new("src/index.js"));
    }

    #[test]
    fn test_sanitize_project_name() {
        assert_eq!(sanitize_project_name("My App"), "my-app");
        assert_eq!(sanitize_project_name("  spaced   out  "), "spaced-out");
        assert_eq!(sanitize_project_name("weird!@#chars"), "weirdchars");
        assert_eq!(sanitize_project_name("-dashed-"), "dashed");
        assert_eq!(sanitize_project_name("!!!"), "app");
        assert_eq!(sanitize_project_name(""), "app");
        assert_eq!(sanitize_project_name("ok.name_v2"), "ok.name_v2");
    }
}
