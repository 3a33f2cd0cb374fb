//! Unsplash implementation of [`PhotoSource`].
//!
//! Two blocking requests per photo:
//!
//! ```text
//! GET {base_url}/photos/random?query=..&orientation=landscape   (lookup, 10s)
//! GET {urls.regular}                                            (download, 15s)
//! ```
//!
//! The access key goes in an `Authorization: Client-ID <key>` header rather
//! than the query string, so it never shows up in logged URLs.

use super::source::{FetchError, Photo, PhotoSource};
use crate::config::{self, ApiConfig};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

const LOOKUP: &str = "photo lookup";
const DOWNLOAD: &str = "image download";

/// Subset of the `/photos/random` response we rely on.
#[derive(Debug, Deserialize)]
struct RandomPhoto {
    id: String,
    urls: PhotoUrls,
    user: PhotoUser,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    /// 1080px wide rendition.
    regular: String,
}

#[derive(Debug, Deserialize)]
struct PhotoUser {
    name: String,
    #[serde(default)]
    links: Option<UserLinks>,
}

#[derive(Debug, Deserialize)]
struct UserLinks {
    html: Option<String>,
}

impl From<RandomPhoto> for Photo {
    fn from(raw: RandomPhoto) -> Self {
        Photo {
            id: raw.id,
            image_url: raw.urls.regular,
            author: raw.user.name,
            author_url: raw.user.links.and_then(|l| l.html),
        }
    }
}

/// Map an HTTP status to a fetch error. `Ok` for 2xx.
fn check_status(status: StatusCode, stage: &'static str, query: &str) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::UNAUTHORIZED => FetchError::Unauthorized,
        StatusCode::FORBIDDEN => FetchError::Forbidden(
            status
                .canonical_reason()
                .unwrap_or("forbidden")
                .to_string(),
        ),
        // The random endpoint answers 404 when nothing matches the query.
        StatusCode::NOT_FOUND if stage == LOOKUP => FetchError::NoMatch(query.to_string()),
        _ => FetchError::Status {
            status: status.as_u16(),
            stage,
        },
    })
}

fn transport_error(err: reqwest::Error, stage: &'static str) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(stage)
    } else {
        FetchError::Network {
            stage,
            message: err.to_string(),
        }
    }
}

/// Writer that remembers the last error of the destination it wraps.
///
/// `reqwest` folds write failures into its own error type, which reads like a
/// transport problem. Keeping the original `io::Error` lets a full disk come
/// back as [`FetchError::Io`].
struct TrackedWriter<'a> {
    inner: &'a mut dyn Write,
    error: Option<io::Error>,
}

impl<'a> TrackedWriter<'a> {
    fn new(inner: &'a mut dyn Write) -> Self {
        Self { inner, error: None }
    }

    fn track<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        result.map_err(|e| {
            self.error = Some(io::Error::new(e.kind(), e.to_string()));
            e
        })
    }
}

impl Write for TrackedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        self.track(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.track(result)
    }
}

/// Blocking Unsplash client.
pub struct UnsplashSource {
    client: Client,
    base_url: String,
    orientation: String,
    access_key: String,
    lookup_timeout: Duration,
    download_timeout: Duration,
}

impl fmt::Debug for UnsplashSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsplashSource")
            .field("base_url", &self.base_url)
            .field("orientation", &self.orientation)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

impl UnsplashSource {
    pub fn new(api: &ApiConfig, access_key: String) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("blog-banner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport_error(e, "client setup"))?;
        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            orientation: api.orientation.clone(),
            access_key,
            lookup_timeout: api.lookup_timeout(),
            download_timeout: api.download_timeout(),
        })
    }

    /// Build a source with the key from the environment.
    ///
    /// Fails with [`FetchError::MissingCredential`] when the variable is unset,
    /// blank, or still holds the sample placeholder.
    pub fn from_env(api: &ApiConfig) -> Result<Self, FetchError> {
        let key = config::access_key(api)
            .ok_or_else(|| FetchError::MissingCredential(api.credential_env.clone()))?;
        Self::new(api, key)
    }

    fn random_url(&self) -> String {
        format!("{}/photos/random", self.base_url)
    }
}

impl PhotoSource for UnsplashSource {
    fn random_photo(&self, query: &str) -> Result<Photo, FetchError> {
        let url = self.random_url();
        debug!(%url, query, "looking up random photo");
        let resp = self
            .client
            .get(&url)
            .query(&[("query", query), ("orientation", self.orientation.as_str())])
            .header(AUTHORIZATION, format!("Client-ID {}", self.access_key))
            .header("Accept-Version", "v1")
            .timeout(self.lookup_timeout)
            .send()
            .map_err(|e| transport_error(e, LOOKUP))?;
        check_status(resp.status(), LOOKUP, query)?;
        let raw: RandomPhoto = resp
            .json()
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        Ok(raw.into())
    }

    fn download(&self, photo: &Photo, out: &mut dyn Write) -> Result<u64, FetchError> {
        debug!(url = %photo.image_url, "downloading image");
        let mut resp = self
            .client
            .get(&photo.image_url)
            .timeout(self.download_timeout)
            .send()
            .map_err(|e| transport_error(e, DOWNLOAD))?;
        check_status(resp.status(), DOWNLOAD, &photo.id)?;
        let mut writer = TrackedWriter::new(out);
        resp.copy_to(&mut writer)
            .map_err(|e| match writer.error.take() {
                Some(io_err) => FetchError::Io(io_err),
                None => transport_error(e, DOWNLOAD),
            })
    }
}
