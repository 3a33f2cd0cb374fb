//! Banner download with a one-shot default-query fallback.
//!
//! ```text
//! fetch(query) ──ok──────────────────────────────▶ Attribution
//!      │
//!      └─retryable error──▶ fetch(default) ──ok──▶ Attribution (used_fallback)
//!                                  │
//!                                  └─error──────▶ FetchError
//! ```
//!
//! There is exactly one retry and no backoff. Non-retryable errors (see
//! [`FetchError::is_retryable`]) skip the fallback.
//!
//! The image is streamed into a temp file next to the destination and renamed
//! into place once complete, so a failed or interrupted download never leaves a
//! truncated `.jpg` behind.

use crate::frontmatter;
use crate::photos::{FetchError, Photo, PhotoSource};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Who took the photo and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub photo_id: String,
    pub author: String,
    pub author_url: Option<String>,
    /// Query that actually produced the photo.
    pub query: String,
    /// True if the primary query failed and the default query was used.
    pub used_fallback: bool,
    /// Size of the written image.
    pub bytes: u64,
}

/// Fetch a random photo for `query` and write it to `dest`.
///
/// Parent directories of `dest` are created as needed.
pub fn fetch_banner(
    source: &dyn PhotoSource,
    query: &str,
    default_query: &str,
    dest: &Path,
) -> Result<Attribution, FetchError> {
    match fetch_once(source, query, dest) {
        Ok(attribution) => Ok(attribution),
        Err(err) if err.is_retryable() && query != default_query => {
            warn!(
                query,
                error = %err,
                fallback = default_query,
                "banner lookup failed, retrying once with the default query"
            );
            let mut attribution = fetch_once(source, default_query, dest)?;
            attribution.used_fallback = true;
            Ok(attribution)
        }
        Err(err) => Err(err),
    }
}

fn fetch_once(
    source: &dyn PhotoSource,
    query: &str,
    dest: &Path,
) -> Result<Attribution, FetchError> {
    let photo = source.random_photo(query)?;
    debug!(id = %photo.id, author = %photo.author, "photo selected");
    let bytes = save_photo(source, &photo, dest)?;
    Ok(Attribution {
        photo_id: photo.id,
        author: photo.author,
        author_url: photo.author_url,
        query: query.to_string(),
        used_fallback: false,
        bytes,
    })
}

fn save_photo(source: &dyn PhotoSource, photo: &Photo, dest: &Path) -> Result<u64, FetchError> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    let bytes = {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let n = source.download(photo, &mut writer)?;
        writer.flush()?;
        n
    };
    if bytes == 0 {
        return Err(FetchError::InvalidResponse(format!(
            "image {} has an empty body",
            photo.id
        )));
    }
    frontmatter::match_permissions(tmp.as_file(), dest)?;
    tmp.persist(dest).map_err(|e| FetchError::Io(e.error))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_QUERY;
    use crate::photos::source::tests::{MockFailure, MockSource};
    use tempfile::TempDir;

    #[test]
    fn primary_query_success_writes_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("img/banners/foo.jpg");
        let mock = MockSource::new();

        let attribution = fetch_banner(&mock, "ocean", DEFAULT_QUERY, &dest).unwrap();

        assert_eq!(attribution.query, "ocean");
        assert!(!attribution.used_fallback);
        assert_eq!(attribution.author, "Test Author");
        assert_eq!(fs::read(&dest).unwrap(), mock.body);
        assert_eq!(attribution.bytes, mock.body.len() as u64);
        assert_eq!(mock.get_lookups(), vec!["ocean"]);
    }

    #[test]
    fn primary_failure_falls_back_to_default_query() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("banners/foo.jpg");
        let mock = MockSource::new().failing("zzzz", MockFailure::NoMatch);

        let attribution = fetch_banner(&mock, "zzzz", DEFAULT_QUERY, &dest).unwrap();

        assert!(attribution.used_fallback);
        assert_eq!(attribution.query, DEFAULT_QUERY);
        assert!(dest.exists());
        assert_eq!(mock.get_lookups(), vec!["zzzz", DEFAULT_QUERY]);
    }

    #[test]
    fn timeout_also_falls_back() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("foo.jpg");
        let mock = MockSource::new().failing("slow", MockFailure::Timeout);

        let attribution = fetch_banner(&mock, "slow", DEFAULT_QUERY, &dest).unwrap();
        assert!(attribution.used_fallback);
    }

    #[test]
    fn fallback_failure_is_reported_after_one_retry() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("foo.jpg");
        let mock = MockSource::new()
            .failing("zzzz", MockFailure::NoMatch)
            .failing(DEFAULT_QUERY, MockFailure::Status(503));

        let result = fetch_banner(&mock, "zzzz", DEFAULT_QUERY, &dest);

        assert!(matches!(
            result,
            Err(FetchError::Status { status: 503, .. })
        ));
        assert_eq!(mock.get_lookups().len(), 2);
        assert!(!dest.exists());
    }

    #[test]
    fn unauthorized_does_not_fall_back() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("foo.jpg");
        let mock = MockSource::new().failing("ocean", MockFailure::Unauthorized);

        let result = fetch_banner(&mock, "ocean", DEFAULT_QUERY, &dest);

        assert!(matches!(result, Err(FetchError::Unauthorized)));
        assert_eq!(mock.get_lookups(), vec!["ocean"]);
    }

    #[test]
    fn rate_limit_does_not_fall_back() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("foo.jpg");
        let mock = MockSource::new().failing("ocean", MockFailure::Forbidden);

        assert!(matches!(
            fetch_banner(&mock, "ocean", DEFAULT_QUERY, &dest),
            Err(FetchError::Forbidden(_))
        ));
        assert_eq!(mock.get_lookups().len(), 1);
    }

    #[test]
    fn default_query_is_not_retried_with_itself() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("foo.jpg");
        let mock = MockSource::new().failing(DEFAULT_QUERY, MockFailure::NoMatch);

        assert!(fetch_banner(&mock, DEFAULT_QUERY, DEFAULT_QUERY, &dest).is_err());
        assert_eq!(mock.get_lookups(), vec![DEFAULT_QUERY]);
    }

    #[test]
    fn download_failure_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("foo.jpg");
        let mock = MockSource::new().failing_downloads(MockFailure::Timeout);

        assert!(matches!(
            fetch_banner(&mock, "ocean", DEFAULT_QUERY, &dest),
            Err(FetchError::Timeout(_))
        ));
        // Both attempts downloaded, neither left anything behind
        assert_eq!(mock.get_downloads().len(), 2);
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn existing_banner_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("foo.jpg");
        fs::write(&dest, b"old").unwrap();
        let mock = MockSource::new();

        fetch_banner(&mock, "ocean", DEFAULT_QUERY, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), mock.body);
    }

    #[cfg(unix)]
    #[test]
    fn banner_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let mock = MockSource::new();

        let fresh = tmp.path().join("fresh.jpg");
        fetch_banner(&mock, "ocean", DEFAULT_QUERY, &fresh).unwrap();
        let mode = fs::metadata(&fresh).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);

        let replaced = tmp.path().join("replaced.jpg");
        fs::write(&replaced, b"old").unwrap();
        fs::set_permissions(&replaced, fs::Permissions::from_mode(0o664)).unwrap();
        fetch_banner(&mock, "ocean", DEFAULT_QUERY, &replaced).unwrap();
        let mode = fs::metadata(&replaced).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }

    #[test]
    fn empty_body_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("foo.jpg");
        let mut mock = MockSource::new();
        mock.body.clear();

        let result = fetch_banner(&mock, "ocean", DEFAULT_QUERY, &dest);
        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
        assert!(!dest.exists());
    }
}
