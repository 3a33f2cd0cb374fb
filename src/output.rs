//! CLI output formatting.
//!
//! Each command has a `format_*` function returning lines (pure, tested) and a
//! `print_*` wrapper that writes them to stdout. Diagnostics go through
//! `tracing` to stderr; only results land on stdout.
//!
//! # Output Format
//!
//! ## Banner
//!
//! ```text
//! Banner for dynamic programming.md
//!     Query: dynamic, programming (from title)
//!     Photo: Jane Doe (https://unsplash.com/@jdoe)
//!     Saved: source/img/banners/dynamic programming.jpg (183 KB)
//!     top_img: /img/banners/dynamic programming.jpg
//!     cover: /img/banners/dynamic programming.jpg
//! ```
//!
//! ## Backfill
//!
//! ```text
//! Covers added
//!     a.md
//!     c.md
//! Failed
//!     b.md: front-matter block is never closed (no second `---` line)
//! Added 2 covers, 5 unchanged, 1 failed
//! ```

use crate::config::BannerConfig;
use crate::naming::QueryOrigin;
use crate::pipeline::{BackfillReport, BannerReport, HookOutcome};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte size, rounded to whole units.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{} KB", bytes / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Show `path` relative to `root` when it lives inside it.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn origin_label(origin: &QueryOrigin) -> String {
    match origin {
        QueryOrigin::ExplicitCategory(name) => format!("category {name}"),
        QueryOrigin::FreeText => "from argument".to_string(),
        QueryOrigin::PostCategory(name) => format!("post category {name}"),
        QueryOrigin::Title => "from title".to_string(),
        QueryOrigin::Default => "default".to_string(),
    }
}

/// Format the result of a successful banner run.
pub fn format_banner_report(report: &BannerReport, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let post_name = report
        .post
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| display_path(&report.post, root));
    lines.push(format!("Banner for {post_name}"));

    let attribution = &report.attribution;
    if attribution.used_fallback {
        lines.push(format!(
            "{}Query: {} (fallback, {} found nothing)",
            indent(1),
            attribution.query,
            report.query.query
        ));
    } else {
        lines.push(format!(
            "{}Query: {} ({})",
            indent(1),
            attribution.query,
            origin_label(&report.query.origin)
        ));
    }

    match &attribution.author_url {
        Some(url) => lines.push(format!("{}Photo: {} ({url})", indent(1), attribution.author)),
        None => lines.push(format!("{}Photo: {}", indent(1), attribution.author)),
    }
    lines.push(format!(
        "{}Saved: {} ({})",
        indent(1),
        display_path(&report.target.image_path, root),
        format_size(attribution.bytes)
    ));

    for (key, value) in &report.fields {
        lines.push(format!("{}{key}: {value}", indent(1)));
    }
    if !report.post_changed {
        lines.push(format!("{}(front-matter already up to date)", indent(1)));
    }
    lines
}

pub fn print_banner_report(report: &BannerReport, root: &Path) {
    for line in format_banner_report(report, root) {
        println!("{}", line);
    }
}

/// Format the result of a hook run.
pub fn format_hook_outcome(outcome: &HookOutcome, root: &Path) -> Vec<String> {
    match outcome {
        HookOutcome::Patched(report) => format_banner_report(report, root),
        HookOutcome::Skipped(reason) => vec![format!("Skipped: {reason}")],
        HookOutcome::Failed(err) => vec![
            format!("Banner not added: {err}"),
            format!("{}You can add one later with `blog-banner <post>`", indent(1)),
        ],
    }
}

pub fn print_hook_outcome(outcome: &HookOutcome, root: &Path) {
    for line in format_hook_outcome(outcome, root) {
        println!("{}", line);
    }
}

/// Format a backfill summary.
pub fn format_backfill_report(report: &BackfillReport) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.updated.is_empty() {
        lines.push("Covers added".to_string());
        for name in &report.updated {
            lines.push(format!("{}{name}", indent(1)));
        }
    }
    if !report.failed.is_empty() {
        lines.push("Failed".to_string());
        for (name, reason) in &report.failed {
            lines.push(format!("{}{name}: {reason}", indent(1)));
        }
    }

    if report.updated.is_empty() && report.failed.is_empty() {
        lines.push("No posts need a cover".to_string());
    } else {
        let n = report.updated.len();
        lines.push(format!(
            "Added {n} cover{}, {} unchanged, {} failed",
            if n == 1 { "" } else { "s" },
            report.skipped,
            report.failed.len()
        ));
    }
    lines
}

pub fn print_backfill_report(report: &BackfillReport) {
    for line in format_backfill_report(report) {
        println!("{}", line);
    }
}

/// Format the category → keywords table.
pub fn format_categories(config: &BannerConfig) -> Vec<String> {
    let mut lines = vec!["Categories".to_string()];
    for (name, keywords) in &config.query.categories {
        lines.push(format!("{}{name}: {keywords}", indent(1)));
    }
    lines.push(format!("{}(default): {}", indent(1), config.query.default));
    lines
}

pub fn print_categories(config: &BannerConfig) {
    for line in format_categories(config) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Attribution;
    use crate::naming::ResolvedQuery;
    use crate::pipeline::{BannerError, BannerTarget};
    use std::path::PathBuf;

    fn sample_report(used_fallback: bool) -> BannerReport {
        BannerReport {
            post: PathBuf::from("/blog/source/_posts/foo.md"),
            target: BannerTarget {
                slug: "foo".to_string(),
                image_path: PathBuf::from("/blog/source/img/banners/foo.jpg"),
                url: "/img/banners/foo.jpg".to_string(),
            },
            query: ResolvedQuery {
                query: "foo".to_string(),
                origin: QueryOrigin::Title,
            },
            attribution: Attribution {
                photo_id: "abc".to_string(),
                author: "Jane Doe".to_string(),
                author_url: Some("https://unsplash.com/@jdoe".to_string()),
                query: if used_fallback {
                    "landscape".to_string()
                } else {
                    "foo".to_string()
                },
                used_fallback,
                bytes: 2048,
            },
            fields: vec![
                ("top_img".to_string(), "/img/banners/foo.jpg".to_string()),
                ("cover".to_string(), "/img/banners/foo.jpg".to_string()),
            ],
            post_changed: true,
        }
    }

    #[test]
    fn banner_report_lines() {
        let lines = format_banner_report(&sample_report(false), Path::new("/blog"));
        assert_eq!(
            lines,
            vec![
                "Banner for foo.md",
                "    Query: foo (from title)",
                "    Photo: Jane Doe (https://unsplash.com/@jdoe)",
                "    Saved: source/img/banners/foo.jpg (2 KB)",
                "    top_img: /img/banners/foo.jpg",
                "    cover: /img/banners/foo.jpg",
            ]
        );
    }

    #[test]
    fn origin_labels() {
        assert_eq!(origin_label(&QueryOrigin::Title), "from title");
        assert_eq!(origin_label(&QueryOrigin::FreeText), "from argument");
        assert_eq!(
            origin_label(&QueryOrigin::PostCategory("Rust".to_string())),
            "post category Rust"
        );
    }

    #[test]
    fn banner_report_mentions_fallback() {
        let lines = format_banner_report(&sample_report(true), Path::new("/blog"));
        assert_eq!(lines[1], "    Query: landscape (fallback, foo found nothing)");
    }

    #[test]
    fn banner_report_unchanged_post() {
        let mut report = sample_report(false);
        report.post_changed = false;
        let lines = format_banner_report(&report, Path::new("/blog"));
        assert_eq!(lines.last().unwrap(), "    (front-matter already up to date)");
    }

    #[test]
    fn hook_outcome_lines() {
        let skipped = HookOutcome::Skipped("no key".to_string());
        assert_eq!(
            format_hook_outcome(&skipped, Path::new("/")),
            vec!["Skipped: no key"]
        );

        let failed = HookOutcome::Failed(BannerError::PostNotFound(PathBuf::from("x.md")));
        let lines = format_hook_outcome(&failed, Path::new("/"));
        assert!(lines[0].starts_with("Banner not added: post not found"));
    }

    #[test]
    fn backfill_summary() {
        let report = BackfillReport {
            updated: vec!["a.md".to_string()],
            skipped: 4,
            failed: vec![("b.md".to_string(), "broken".to_string())],
        };
        assert_eq!(
            format_backfill_report(&report),
            vec![
                "Covers added",
                "    a.md",
                "Failed",
                "    b.md: broken",
                "Added 1 cover, 4 unchanged, 1 failed",
            ]
        );
    }

    #[test]
    fn backfill_nothing_to_do() {
        let report = BackfillReport {
            skipped: 3,
            ..BackfillReport::default()
        };
        assert_eq!(format_backfill_report(&report), vec!["No posts need a cover"]);
    }

    #[test]
    fn categories_listing_ends_with_default() {
        let lines = format_categories(&BannerConfig::default());
        assert_eq!(lines[0], "Categories");
        assert!(lines.contains(&"    Rust: system,performance,modern code,technology".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            "    (default): landscape,nature,scenery,mountains"
        );
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(183 * 1024), "183 KB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.5 MB");
    }
}
