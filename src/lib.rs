//! # blog-banner
//!
//! Banner images for static blog posts. Given a post, the tool picks a search
//! query, downloads a random matching photo from Unsplash, and writes its path
//! into the post's front-matter as `top_img` and `cover`.
//!
//! # Pipeline
//!
//! ```text
//! 1. Resolve   post / title / category  →  search query
//! 2. Fetch     query                    →  source/img/banners/<slug>.jpg
//! 3. Patch     front-matter             →  top_img + cover = /img/banners/<slug>.jpg
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`frontmatter`] | Locate the `---` block and upsert `key: value` lines without touching anything else |
//! | [`naming`] | Slugs from file names, keyword queries from titles and categories |
//! | [`photos`] | `PhotoSource` trait and the blocking Unsplash client |
//! | [`fetch`] | One-shot fallback to the default query, atomic image write |
//! | [`pipeline`] | CLI workflow, new-post hook, cover backfill |
//! | [`config`] | `banner.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Hook payload (`NewPost`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Text Surgery, Not Re-serialization
//!
//! Front-matter is written by editing lines, never by parsing and dumping YAML.
//! Authors' key order, comments, quoting and line endings all survive. YAML
//! parsing is used read-only, to find a post's category or existing image.
//!
//! ## One Retry, Then Give Up
//!
//! A lookup that finds nothing (or times out) is retried once with a generic
//! landscape query. Credential errors are never retried. There is no backoff
//! loop: the tool runs interactively or inside a generator hook, and a missing
//! banner is easy to add later.
//!
//! ## Atomic Writes
//!
//! Both the image and the patched post are written to a temp file in the target
//! directory and renamed into place, so a crash mid-write leaves the old file.

pub mod config;
pub mod fetch;
pub mod frontmatter;
pub mod naming;
pub mod output;
pub mod photos;
pub mod pipeline;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
