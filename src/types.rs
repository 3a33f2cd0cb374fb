//! Shared types passed between the CLI, the build hook and the pipeline.

use serde::Deserialize;
use std::path::PathBuf;

/// A category field as static-site generators hand it over: one name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CategoryField {
    One(String),
    Many(Vec<String>),
}

impl CategoryField {
    /// First non-blank category name.
    pub fn first(&self) -> Option<&str> {
        let name = match self {
            CategoryField::One(name) => Some(name.as_str()),
            CategoryField::Many(names) => names
                .iter()
                .map(String::as_str)
                .find(|n| !n.trim().is_empty()),
        };
        name.map(str::trim).filter(|n| !n.is_empty())
    }
}

/// The "new post" event payload.
///
/// Deserializes from the JSON object a generator passes to its `new` hook:
///
/// ```json
/// { "title": "Dynamic Programming", "slug": "dp", "path": "source/_posts/dp.md",
///   "categories": ["算法"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub title: String,
    /// Explicit slug; when absent the file stem of `path` is used.
    #[serde(default)]
    pub slug: Option<String>,
    /// Post file, absolute or relative to the blog root.
    pub path: PathBuf,
    #[serde(default)]
    pub category: Option<CategoryField>,
    #[serde(default)]
    pub categories: Option<CategoryField>,
}

impl NewPost {
    /// `category` wins over `categories`; lists contribute their first entry.
    pub fn primary_category(&self) -> Option<&str> {
        self.category
            .as_ref()
            .and_then(CategoryField::first)
            .or_else(|| self.categories.as_ref().and_then(CategoryField::first))
    }
}
