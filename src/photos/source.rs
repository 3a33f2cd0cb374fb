//! Photo source trait and shared types.
//!
//! The [`PhotoSource`] trait covers the two calls the fetcher needs: pick one
//! random photo for a query, and stream its bytes somewhere. The production
//! implementation is [`UnsplashSource`](super::unsplash::UnsplashSource); tests
//! use the recording `MockSource` below.

use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no access key configured (set {0})")]
    MissingCredential(String),
    #[error("access key rejected by the photo API (HTTP 401)")]
    Unauthorized,
    #[error("photo API refused the request (HTTP 403): {0}")]
    Forbidden(String),
    #[error("no photo matches query `{0}`")]
    NoMatch(String),
    #[error("timed out during {0}")]
    Timeout(&'static str),
    #[error("photo API returned HTTP {status} during {stage}")]
    Status { status: u16, stage: &'static str },
    #[error("network error during {stage}: {message}")]
    Network {
        stage: &'static str,
        message: String,
    },
    #[error("unexpected response from photo API: {0}")]
    InvalidResponse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether a failed attempt may be retried with the default query.
    ///
    /// Credential problems and local file-system errors would fail the same way
    /// again, so they are reported straight away.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FetchError::MissingCredential(_)
                | FetchError::Unauthorized
                | FetchError::Forbidden(_)
                | FetchError::Io(_)
        )
    }
}

/// One photo picked by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: String,
    /// Direct URL of the image rendition to download.
    pub image_url: String,
    /// Photographer's display name, for attribution.
    pub author: String,
    /// Photographer's profile page, if the API provides one.
    pub author_url: Option<String>,
}

/// A remote photo library.
pub trait PhotoSource {
    /// Pick a single random photo matching `query`.
    fn random_photo(&self, query: &str) -> Result<Photo, FetchError>;

    /// Stream the image bytes of `photo` into `out`. Returns the byte count.
    fn download(&self, photo: &Photo, out: &mut dyn Write) -> Result<u64, FetchError>;
}
