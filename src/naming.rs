//! Post naming: slugs and search queries derived from filenames and titles.
//!
//! Photo search works on keywords, so titles are turned into comma-separated
//! tokens before they are sent out:
//!
//! - `dynamic programming.md` → `dynamic, programming`
//! - `rust-ownership_notes` → `rust, ownership, notes`
//! - `"   "` → the default landscape query
//!
//! Categories with a configured keyword list take priority over derived
//! queries, see [`resolve_query`].

use crate::config::QueryConfig;
use std::collections::BTreeMap;
use std::path::{Component, Path};

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Strip a trailing Markdown extension (case-insensitive), if any.
fn strip_markdown_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && MARKDOWN_EXTENSIONS
                    .iter()
                    .any(|m| ext.eq_ignore_ascii_case(m)) =>
        {
            stem
        }
        _ => name,
    }
}

/// Slug of a post: the file name without directories or Markdown extension.
///
/// - `"source/_posts/dynamic programming.md"` → `"dynamic programming"`
/// - `"hello-world.markdown"` → `"hello-world"`
pub fn post_slug(path: &str) -> String {
    let file_name = Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    strip_markdown_extension(&file_name).to_string()
}

/// `slug` trimmed, if it can name a file directly inside the banner directory.
///
/// Rejects blanks, `.` and `..`, path separators and control characters.
pub fn checked_slug(slug: &str) -> Option<&str> {
    let slug = slug.trim();
    if slug.is_empty() || slug.contains(['/', '\\']) || slug.chars().any(char::is_control) {
        return None;
    }
    let mut components = Path::new(slug).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(slug),
        _ => None,
    }
}

/// Turn a title or filename into a keyword query.
///
/// Strips a Markdown extension, maps `-` and `_` to spaces, collapses
/// whitespace, and joins the tokens with `", "`. Falls back to `default` when
/// nothing is left.
pub fn derive_query(text: &str, default: &str) -> String {
    let normalized = strip_markdown_extension(text.trim()).replace(['-', '_'], " ");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.is_empty() {
        default.to_string()
    } else {
        tokens.join(", ")
    }
}

/// Which rule produced a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOrigin {
    /// Explicit argument naming a configured category.
    ExplicitCategory(String),
    /// Explicit free-text argument.
    FreeText,
    /// Category read from the post's front-matter.
    PostCategory(String),
    /// Derived from the title or filename.
    Title,
    /// Nothing usable; stock default.
    Default,
}

/// A search query together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub query: String,
    pub origin: QueryOrigin,
}

fn category_keywords<'a>(
    categories: &'a BTreeMap<String, String>,
    name: &str,
) -> Option<&'a String> {
    categories
        .get(name)
        .or_else(|| {
            categories
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
}

/// Pick the search query for a post.
///
/// First match wins:
/// 1. `explicit` naming a configured category → its keywords
/// 2. `explicit` free text → [`derive_query`] of it
/// 3. `category` (from the post) with configured keywords → its keywords
/// 4. `title` → [`derive_query`] of it, or the default query if it is blank
pub fn resolve_query(
    config: &QueryConfig,
    explicit: Option<&str>,
    category: Option<&str>,
    title: &str,
) -> ResolvedQuery {
    if let Some(arg) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(keywords) = category_keywords(&config.categories, arg) {
            return ResolvedQuery {
                query: keywords.clone(),
                origin: QueryOrigin::ExplicitCategory(arg.to_string()),
            };
        }
        return ResolvedQuery {
            query: derive_query(arg, &config.default),
            origin: QueryOrigin::FreeText,
        };
    }

    if let Some(cat) = category.map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(keywords) = category_keywords(&config.categories, cat) {
            return ResolvedQuery {
                query: keywords.clone(),
                origin: QueryOrigin::PostCategory(cat.to_string()),
            };
        }
    }

    let query = derive_query(title, &config.default);
    let origin = if query == config.default {
        QueryOrigin::Default
    } else {
        QueryOrigin::Title
    };
    ResolvedQuery { query, origin }
}
