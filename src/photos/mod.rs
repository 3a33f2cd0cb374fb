//! Remote photo sources.
//!
//! ## Architecture
//!
//! ```text
//! source.rs    : PhotoSource trait, Photo, FetchError
//! unsplash.rs  : UnsplashSource: blocking HTTP client for api.unsplash.com
//! ```
//!
//! The rest of the crate only talks to `dyn PhotoSource`, so the fetch and
//! pipeline logic is tested without a network.

pub mod source;
pub mod unsplash;

pub use source::{FetchError, Photo, PhotoSource};
pub use unsplash::UnsplashSource;
