//! Tool configuration.
//!
//! Handles loading, validating, and merging `banner.toml`. Every key has a stock
//! default; a `banner.toml` in the blog root overrides just the values it names.
//!
//! ## Config File Location
//!
//! ```text
//! my-blog/
//! ├── banner.toml              # Optional overrides
//! ├── .env                     # UNSPLASH_ACCESS_KEY=...
//! └── source/
//!     ├── _posts/
//!     │   └── dynamic-programming.md
//!     └── img/banners/         # Downloaded banners land here
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! source_dir = "source"          # Site source root (relative to blog root)
//! posts_dir = "source/_posts"    # Where posts live (relative to blog root)
//! banner_dir = "img/banners"     # Banner folder (relative to source_dir)
//!
//! [api]
//! base_url = "https://api.unsplash.com"
//! orientation = "landscape"
//! lookup_timeout_secs = 10
//! download_timeout_secs = 15
//! credential_env = "UNSPLASH_ACCESS_KEY"
//!
//! [query]
//! default = "landscape,nature,scenery,mountains"
//!
//! [query.categories]
//! "Rust" = "system,performance,modern code,technology"
//! ```
//!
//! Tables merge key-by-key, so a `[query.categories]` section adds to (or
//! overrides entries of) the stock category map instead of replacing it.
//! Unknown keys are rejected to catch typos early.
//!
//! The API credential itself never lives in this file: it is read from the
//! environment variable named by `api.credential_env`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the blog root.
pub const CONFIG_FILE: &str = "banner.toml";

/// Value shipped in sample `.env` files; treated the same as an unset key.
pub const PLACEHOLDER_KEY: &str = "YOUR_ACCESS_KEY_HERE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `banner.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BannerConfig {
    /// Site source root, relative to the blog root.
    pub source_dir: String,
    /// Posts directory, relative to the blog root.
    pub posts_dir: String,
    /// Banner directory, relative to `source_dir`. Also the public URL path.
    pub banner_dir: String,
    /// Photo API settings.
    pub api: ApiConfig,
    /// Search query settings.
    pub query: QueryConfig,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            source_dir: "source".to_string(),
            posts_dir: "source/_posts".to_string(),
            banner_dir: "img/banners".to_string(),
            api: ApiConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl BannerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("source_dir", &self.source_dir),
            ("posts_dir", &self.posts_dir),
            ("banner_dir", &self.banner_dir),
        ] {
            if !is_plain_relative(value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a non-empty relative path without `..`"
                )));
            }
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(
                "api.base_url must be an http(s) URL".into(),
            ));
        }
        if !matches!(
            self.api.orientation.as_str(),
            "landscape" | "portrait" | "squarish"
        ) {
            return Err(ConfigError::Validation(
                "api.orientation must be landscape, portrait or squarish".into(),
            ));
        }
        if self.api.lookup_timeout_secs == 0 || self.api.download_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api timeouts must be non-zero".into(),
            ));
        }
        if self.api.credential_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api.credential_env must not be empty".into(),
            ));
        }
        if self.query.default.trim().is_empty() {
            return Err(ConfigError::Validation(
                "query.default must not be empty".into(),
            ));
        }
        if let Some((name, _)) = self
            .query
            .categories
            .iter()
            .find(|(_, keywords)| keywords.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "query.categories.{name} must not be empty"
            )));
        }
        Ok(())
    }

    /// Absolute-ish posts directory under `root`.
    pub fn posts_path(&self, root: &Path) -> PathBuf {
        root.join(&self.posts_dir)
    }

    /// Directory banners are written to under `root`.
    pub fn banner_path(&self, root: &Path) -> PathBuf {
        root.join(&self.source_dir).join(&self.banner_dir)
    }

    /// Public URL of the banner for `slug`, as written into front-matter.
    pub fn banner_url(&self, slug: &str) -> String {
        format!("/{}/{slug}.jpg", self.banner_dir.trim_matches('/'))
    }
}

fn is_plain_relative(value: &str) -> bool {
    let path = Path::new(value);
    !value.trim().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Photo API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// API root, without trailing `/photos/random`.
    pub base_url: String,
    /// Orientation filter passed to the API.
    pub orientation: String,
    /// Timeout for the random-photo lookup.
    pub lookup_timeout_secs: u64,
    /// Timeout for the image download.
    pub download_timeout_secs: u64,
    /// Name of the environment variable holding the access key.
    pub credential_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.unsplash.com".to_string(),
            orientation: "landscape".to_string(),
            lookup_timeout_secs: 10,
            download_timeout_secs: 15,
            credential_env: "UNSPLASH_ACCESS_KEY".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Search query settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Query used when nothing better can be derived, and as the fallback
    /// after a failed lookup.
    pub default: String,
    /// Category name → keyword query.
    pub categories: BTreeMap<String, String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let categories = [
            ("算法", "algorithm,data structure,mathematics,abstract"),
            ("工具", "coding,development,programming,technology"),
            ("codewars", "puzzle,code,challenge,creative"),
            ("cpp", "modern,technology,abstract,minimal"),
            ("C++", "modern,technology,abstract,minimal"),
            ("Missing Semester", "terminal,command line,developer,minimal"),
            ("Rust", "system,performance,modern code,technology"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            default: DEFAULT_QUERY.to_string(),
            categories,
        }
    }
}

/// Stock fallback query: a random landscape.
pub const DEFAULT_QUERY: &str = "landscape,nature,scenery,mountains";

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(BannerConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `banner.toml` from `root` as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BannerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BannerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for the blog at `root`: stock defaults plus `banner.toml`.
pub fn load_config(root: &Path) -> Result<BannerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Read the access key from the environment variable named in `api`.
///
/// Unset, blank and placeholder values all come back as `None`.
pub fn access_key(api: &ApiConfig) -> Option<String> {
    std::env::var(&api.credential_env)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_KEY)
}

/// Returns a fully-commented stock `banner.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# blog-banner configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.
#
# The access key is NOT stored here: put it in the environment (or a .env
# file next to this one) under the variable named by api.credential_env.

# Site source root, relative to the blog root.
source_dir = "source"

# Posts directory, relative to the blog root.
posts_dir = "source/_posts"

# Banner folder, relative to source_dir. Front-matter gets "/<banner_dir>/<slug>.jpg".
banner_dir = "img/banners"

# ---------------------------------------------------------------------------
# Photo API (Unsplash)
# ---------------------------------------------------------------------------
[api]
base_url = "https://api.unsplash.com"

# landscape, portrait or squarish
orientation = "landscape"

# Seconds to wait for the random-photo lookup and for the image download.
lookup_timeout_secs = 10
download_timeout_secs = 15

# Environment variable holding the access key.
credential_env = "UNSPLASH_ACCESS_KEY"

# ---------------------------------------------------------------------------
# Search queries
# ---------------------------------------------------------------------------
[query]
# Used for posts with nothing to derive a query from, and as the one-shot
# fallback when a lookup fails.
default = "landscape,nature,scenery,mountains"

# Category -> keywords. Entries here are merged with the built-in list.
[query.categories]
"C++" = "modern,technology,abstract,minimal"
"Missing Semester" = "terminal,command line,developer,minimal"
"Rust" = "system,performance,modern code,technology"
"codewars" = "puzzle,code,challenge,creative"
"cpp" = "modern,technology,abstract,minimal"
"工具" = "coding,development,programming,technology"
"算法" = "algorithm,data structure,mathematics,abstract"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_layout() {
        let config = BannerConfig::default();
        assert_eq!(config.source_dir, "source");
        assert_eq!(config.posts_dir, "source/_posts");
        assert_eq!(config.banner_dir, "img/banners");
    }

    #[test]
    fn default_config_api_settings() {
        let config = BannerConfig::default();
        assert_eq!(config.api.base_url, "https://api.unsplash.com");
        assert_eq!(config.api.lookup_timeout(), Duration::from_secs(10));
        assert_eq!(config.api.download_timeout(), Duration::from_secs(15));
        assert_eq!(config.api.credential_env, "UNSPLASH_ACCESS_KEY");
    }

    #[test]
    fn default_config_has_category_keywords() {
        let config = BannerConfig::default();
        assert_eq!(config.query.default, DEFAULT_QUERY);
        assert_eq!(
            config.query.categories.get("算法").map(String::as_str),
            Some("algorithm,data structure,mathematics,abstract")
        );
        assert_eq!(config.query.categories.len(), 7);
    }

    #[test]
    fn banner_paths_and_urls() {
        let config = BannerConfig::default();
        let root = Path::new("/blog");
        assert_eq!(
            config.banner_path(root),
            PathBuf::from("/blog/source/img/banners")
        );
        assert_eq!(
            config.posts_path(root),
            PathBuf::from("/blog/source/_posts")
        );
        assert_eq!(config.banner_url("foo"), "/img/banners/foo.jpg");
    }

    #[test]
    fn banner_url_ignores_stray_slashes() {
        let config = BannerConfig {
            banner_dir: "img/banners/".to_string(),
            ..BannerConfig::default()
        };
        assert_eq!(config.banner_url("foo"), "/img/banners/foo.jpg");
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[api]
lookup_timeout_secs = 3
"#;
        let config: BannerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.api.lookup_timeout_secs, 3);
        // Defaults preserved
        assert_eq!(config.api.download_timeout_secs, 15);
        assert_eq!(config.posts_dir, "source/_posts");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<BannerConfig, _> = toml::from_str("banner_folder = \"x\"");
        assert!(result.is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, BannerConfig::default());
    }

    #[test]
    fn load_config_merges_categories_with_stock_map() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[query.categories]
"随笔" = "notebook,coffee,desk"
"Rust" = "crab,ocean"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        let cats = &config.query.categories;
        assert_eq!(cats.get("随笔").map(String::as_str), Some("notebook,coffee,desk"));
        assert_eq!(cats.get("Rust").map(String::as_str), Some("crab,ocean"));
        // Stock entries survive
        assert!(cats.contains_key("算法"));
        assert_eq!(config.query.default, DEFAULT_QUERY);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "this is not valid toml [[[").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[api]
download_timeout_secs = 0
"#,
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // validate tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(BannerConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_escaping_paths() {
        let mut config = BannerConfig::default();
        config.banner_dir = "../outside".to_string();
        assert!(config.validate().is_err());

        let mut config = BannerConfig::default();
        config.posts_dir = "/abs/posts".to_string();
        assert!(config.validate().is_err());

        let mut config = BannerConfig::default();
        config.source_dir = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_api_settings() {
        let mut config = BannerConfig::default();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = BannerConfig::default();
        config.api.orientation = "diagonal".to_string();
        assert!(config.validate().is_err());

        let mut config = BannerConfig::default();
        config.api.credential_env = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_queries() {
        let mut config = BannerConfig::default();
        config.query.default = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = BannerConfig::default();
        config
            .query
            .categories
            .insert("Empty".to_string(), String::new());
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // access_key tests
    // =========================================================================

    #[test]
    fn access_key_missing_variable_is_none() {
        let api = ApiConfig {
            credential_env: "BLOG_BANNER_TEST_SURELY_UNSET_VAR".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(access_key(&api), None);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: BannerConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, BannerConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("[api]"));
        assert!(content.contains("[query]"));
        assert!(content.contains("[query.categories]"));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        assert!(val.get("api").is_some());
        assert!(val.get("query").is_some());
        assert!(val.get("banner_dir").is_some());
    }
}
