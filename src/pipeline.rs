//! End-to-end banner workflows.
//!
//! Every workflow is one synchronous pass per post:
//!
//! ```text
//! resolve query ──▶ fetch image ──▶ upsert top_img + cover
//! ```
//!
//! | Entry point | Caller | Failure handling |
//! |-------------|--------|------------------|
//! | [`add_banner`] | `blog-banner <post> [query]` | returns `BannerError`, CLI exits non-zero |
//! | [`on_new_post`] | generator "new post" hook | never fails; logs and returns a [`HookOutcome`] |
//! | [`backfill_covers`] | `blog-banner backfill` | per-post failures are logged and collected |
//!
//! Both image fields get the same public URL, `/<banner_dir>/<slug>.jpg`.

use crate::config::BannerConfig;
use crate::fetch::{self, Attribution};
use crate::frontmatter::{self, FrontMatterError};
use crate::naming::{self, ResolvedQuery};
use crate::photos::{FetchError, PhotoSource};
use crate::types::NewPost;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Banner field shown at the top of the post.
pub const TOP_IMG_FIELD: &str = "top_img";
/// Thumbnail field used by listing pages.
pub const COVER_FIELD: &str = "cover";

#[derive(Error, Debug)]
pub enum BannerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("post not found: {0}")]
    PostNotFound(PathBuf),
    #[error("posts directory not found: {0}")]
    PostsDirNotFound(PathBuf),
    #[error("banner download failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(
        "could not update front-matter of {}: {source}. Add `top_img: {url}` and `cover: {url}` by hand",
        .path.display()
    )]
    Patch {
        path: PathBuf,
        url: String,
        #[source]
        source: FrontMatterError,
    },
}

/// Where a post's banner goes on disk and how front-matter refers to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerTarget {
    pub slug: String,
    /// File the image is written to.
    pub image_path: PathBuf,
    /// Value stored in `top_img` and `cover`.
    pub url: String,
}

/// Compute the banner location for `slug`.
pub fn banner_target(config: &BannerConfig, root: &Path, slug: &str) -> BannerTarget {
    BannerTarget {
        slug: slug.to_string(),
        image_path: config.banner_path(root).join(format!("{slug}.jpg")),
        url: config.banner_url(slug),
    }
}

/// Result of a successful fetch-and-patch run.
#[derive(Debug, Clone)]
pub struct BannerReport {
    pub post: PathBuf,
    pub target: BannerTarget,
    pub query: ResolvedQuery,
    pub attribution: Attribution,
    /// Fields written to the front-matter, in order.
    pub fields: Vec<(String, String)>,
    /// False when the post already had exactly these values.
    pub post_changed: bool,
}

/// Category from the post's front-matter, if the file has a readable block.
fn category_from_post(doc: &str, post: &Path) -> Option<String> {
    match frontmatter::read_metadata(doc) {
        Ok(meta) => frontmatter::first_category(&meta),
        Err(e) => {
            debug!(post = %post.display(), error = %e, "no usable front-matter for category lookup");
            None
        }
    }
}

/// Fetch a banner for `post` and write both image fields into it.
fn fetch_and_patch(
    config: &BannerConfig,
    root: &Path,
    source: &dyn PhotoSource,
    post: &Path,
    slug: &str,
    query: ResolvedQuery,
) -> Result<BannerReport, BannerError> {
    let target = banner_target(config, root, slug);
    info!(
        post = %post.display(),
        query = %query.query,
        origin = ?query.origin,
        "fetching banner"
    );

    let attribution =
        fetch::fetch_banner(source, &query.query, &config.query.default, &target.image_path)?;
    info!(
        image = %target.image_path.display(),
        author = %attribution.author,
        "banner saved"
    );

    let fields = [
        (TOP_IMG_FIELD, target.url.as_str()),
        (COVER_FIELD, target.url.as_str()),
    ];
    let post_changed =
        frontmatter::patch_file(post, &fields).map_err(|source| BannerError::Patch {
            path: post.to_path_buf(),
            url: target.url.clone(),
            source,
        })?;

    Ok(BannerReport {
        post: post.to_path_buf(),
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        target,
        query,
        attribution,
        post_changed,
    })
}

/// Resolve a post argument: a name inside the posts directory, or a path
/// relative to the blog root.
pub fn resolve_post_path(config: &BannerConfig, root: &Path, name: &str) -> Option<PathBuf> {
    let in_posts = config.posts_path(root).join(name);
    if in_posts.is_file() {
        return Some(in_posts);
    }
    let from_root = root.join(name);
    from_root.is_file().then_some(from_root)
}

/// CLI workflow: add a banner to an existing post.
///
/// `query_arg` may name a configured category or be free text. Without it the
/// post's own category is tried, then the file name.
pub fn add_banner(
    config: &BannerConfig,
    root: &Path,
    source: &dyn PhotoSource,
    post_name: &str,
    query_arg: Option<&str>,
) -> Result<BannerReport, BannerError> {
    let post = resolve_post_path(config, root, post_name)
        .ok_or_else(|| BannerError::PostNotFound(config.posts_path(root).join(post_name)))?;
    let doc = fs::read_to_string(&post)?;

    let category = category_from_post(&doc, &post);
    let file_name = post
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| post_name.to_string());
    let query = naming::resolve_query(&config.query, query_arg, category.as_deref(), &file_name);
    let slug = naming::post_slug(&file_name);

    fetch_and_patch(config, root, source, &post, &slug, query)
}

/// What the new-post hook did.
#[derive(Debug)]
pub enum HookOutcome {
    Patched(BannerReport),
    /// Nothing attempted; the reason is user-facing.
    Skipped(String),
    Failed(BannerError),
}

/// Build-hook workflow for a freshly created post.
///
/// Never returns an error: a generator hook must not break `new`. Pass `None`
/// for `source` when no credential is configured; the hook then only warns.
pub fn on_new_post(
    config: &BannerConfig,
    root: &Path,
    source: Option<&dyn PhotoSource>,
    post: &NewPost,
) -> HookOutcome {
    let Some(source) = source else {
        let reason = format!(
            "no {} configured, skipping banner download",
            config.api.credential_env
        );
        warn!("{reason}");
        return HookOutcome::Skipped(reason);
    };

    match try_new_post(config, root, source, post) {
        Ok(report) => HookOutcome::Patched(report),
        Err(err) => {
            error!(post = %post.path.display(), error = %err, "banner hook failed");
            HookOutcome::Failed(err)
        }
    }
}

fn try_new_post(
    config: &BannerConfig,
    root: &Path,
    source: &dyn PhotoSource,
    post: &NewPost,
) -> Result<BannerReport, BannerError> {
    let path = root.join(&post.path);
    if !path.is_file() {
        return Err(BannerError::PostNotFound(path));
    }
    let stem = || naming::post_slug(&post.path.to_string_lossy());
    let slug = match post.slug.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(given) => match naming::checked_slug(given) {
            Some(slug) => slug.to_string(),
            None => {
                warn!(slug = ?given, "slug cannot be used as a file name, using the post file name");
                stem()
            }
        },
        None => stem(),
    };
    let query = naming::resolve_query(&config.query, None, post.primary_category(), &post.title);

    fetch_and_patch(config, root, source, &path, &slug, query)
}

/// Summary of a backfill run.
#[derive(Debug, Default)]
pub struct BackfillReport {
    /// Posts that received a `cover`, by file name.
    pub updated: Vec<String>,
    /// Posts left alone (no front-matter, no `top_img`, or `cover` already set).
    pub skipped: usize,
    /// Posts that could not be processed, with the reason.
    pub failed: Vec<(String, String)>,
}

enum BackfillAction {
    Updated,
    Skipped,
}

/// Give every post that has a `top_img` but no `cover` a `cover` with the
/// same value.
///
/// Posts are visited one at a time in file-name order. A failing post is
/// logged and recorded; the loop carries on with the next one.
pub fn backfill_covers(config: &BannerConfig, root: &Path) -> Result<BackfillReport, BannerError> {
    let posts_dir = config.posts_path(root);
    if !posts_dir.is_dir() {
        return Err(BannerError::PostsDirNotFound(posts_dir));
    }

    let mut posts: Vec<PathBuf> = fs::read_dir(&posts_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|e| e.eq_ignore_ascii_case("md"))
                    .unwrap_or(false)
        })
        .collect();
    posts.sort();

    let mut report = BackfillReport::default();
    for post in &posts {
        let name = post
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match backfill_post(post) {
            Ok(BackfillAction::Updated) => {
                info!(post = %name, "cover added");
                report.updated.push(name);
            }
            Ok(BackfillAction::Skipped) => report.skipped += 1,
            Err(err) => {
                warn!(post = %name, error = %err, "could not backfill cover");
                report.failed.push((name, err.to_string()));
            }
        }
    }
    Ok(report)
}

fn backfill_post(post: &Path) -> Result<BackfillAction, FrontMatterError> {
    let doc = fs::read_to_string(post)?;
    let meta = match frontmatter::read_metadata(&doc) {
        Ok(meta) => meta,
        Err(FrontMatterError::Missing) => return Ok(BackfillAction::Skipped),
        Err(e) => return Err(e),
    };
    if frontmatter::has_value(&meta, COVER_FIELD) {
        return Ok(BackfillAction::Skipped);
    }
    let Some(top_img) = frontmatter::string_field(&meta, TOP_IMG_FIELD) else {
        return Ok(BackfillAction::Skipped);
    };

    let patched = frontmatter::upsert_fields(&doc, &[(COVER_FIELD, &top_img)])?;
    frontmatter::write_atomic(post, patched.as_bytes())?;
    Ok(BackfillAction::Updated)
}
