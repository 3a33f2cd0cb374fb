//! Shared test utilities.
//!
//! Builds a throwaway blog tree matching the stock config:
//!
//! ```text
//! <tmp>/
//! └── source/
//!     └── _posts/
//! ```
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let blog = setup_blog();
//! let post = write_post(&blog, "foo.md", "---\ntitle: Foo\n---\nbody");
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

/// Create an empty blog with the default `source/_posts` directory.
pub fn setup_blog() -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("source/_posts")).unwrap();
    tmp
}

/// Write a post into the blog's posts directory and return its path.
pub fn write_post(blog: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = blog.path().join("source/_posts").join(name);
    std::fs::write(&path, content).unwrap();
    path
}
