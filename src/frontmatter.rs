//! Front-matter location and in-place field patching.
//!
//! A post starts with a metadata block delimited by `---` lines:
//!
//! ```text
//! ---
//! title: Foo
//! categories: [算法]
//! ---
//! body...
//! ```
//!
//! Two kinds of access are provided:
//!
//! - **Surgical writes** ([`upsert_fields`], [`patch_file`]): the block is treated
//!   as lines of text. Matching `key:` lines are rewritten in place, missing keys
//!   are inserted directly under the opening marker. Nothing outside the block is
//!   touched, and lines inside the block that are not being updated are kept
//!   byte-for-byte, including their line endings.
//! - **Read-only queries** ([`read_metadata`], [`first_category`], [`string_field`]):
//!   the block is parsed as YAML. This is only used to look things up, never to
//!   re-serialize the block, so formatting and comments survive a patch.
//!
//! ## Locating the block
//!
//! [`locate`] is a single forward scan over the lines of the document. The
//! opening marker must be the very first line; the closing marker is the first
//! marker line after it. A `---` line further down in the body (a horizontal
//! rule, a fenced YAML sample) is never considered because the scan stops at the
//! first closing marker.

use serde_yaml::{Mapping, Value};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// The marker line that opens and closes the block.
pub const DELIMITER: &str = "---";

const BOM: &str = "\u{feff}";

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no front-matter block at the start of the document")]
    Missing,
    #[error("front-matter block is never closed (no second `---` line)")]
    Unterminated,
    #[error("invalid field `{key}`: {reason}")]
    InvalidField { key: String, reason: &'static str },
    #[error("front-matter is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Line-ending convention of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Byte offsets of a located block.
///
/// `content_start..content_end` is the text between the two marker lines. It is
/// empty for a block with no fields, and otherwise always ends with a line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// First byte after the opening marker line (including its line break).
    pub content_start: usize,
    /// First byte of the closing marker line.
    pub content_end: usize,
    /// Line ending used by the opening marker.
    pub line_ending: LineEnding,
}

impl BlockSpan {
    /// The block content inside `doc`.
    pub fn content<'a>(&self, doc: &'a str) -> &'a str {
        &doc[self.content_start..self.content_end]
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

#[derive(Clone, Copy)]
enum ScanState {
    BeforeBlock,
    InBlock {
        content_start: usize,
        line_ending: LineEnding,
    },
}

/// Find the leading front-matter block of `doc`.
pub fn locate(doc: &str) -> Result<BlockSpan, FrontMatterError> {
    let start = if doc.starts_with(BOM) { BOM.len() } else { 0 };
    let mut state = ScanState::BeforeBlock;
    let mut offset = start;

    for line in doc[start..].split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        match state {
            ScanState::BeforeBlock => {
                // Opening marker needs its own line break, otherwise nothing follows it.
                if !is_delimiter(line) || !line.ends_with('\n') {
                    return Err(FrontMatterError::Missing);
                }
                let line_ending = if line.ends_with("\r\n") {
                    LineEnding::CrLf
                } else {
                    LineEnding::Lf
                };
                state = ScanState::InBlock {
                    content_start: offset,
                    line_ending,
                };
            }
            ScanState::InBlock {
                content_start,
                line_ending,
            } => {
                if is_delimiter(line) {
                    return Ok(BlockSpan {
                        content_start,
                        content_end: line_start,
                        line_ending,
                    });
                }
            }
        }
    }

    match state {
        ScanState::BeforeBlock => Err(FrontMatterError::Missing),
        ScanState::InBlock { .. } => Err(FrontMatterError::Unterminated),
    }
}

/// True if `line` assigns `key` at the top level: `key:`, `key :`, `"key":` or
/// `'key':`.
fn line_has_key(line: &str, key: &str) -> bool {
    let rest = line
        .strip_prefix(key)
        .or_else(|| quoted_key_rest(line, key, '"'))
        .or_else(|| quoted_key_rest(line, key, '\''));
    rest.map(|rest| rest.trim_start_matches([' ', '\t']).starts_with(':'))
        .unwrap_or(false)
}

fn quoted_key_rest<'a>(line: &'a str, key: &str, quote: char) -> Option<&'a str> {
    line.strip_prefix(quote)?
        .strip_prefix(key)?
        .strip_prefix(quote)
}

/// True for a line that belongs to the value of the key line above it: an
/// indented line, or a `- item` written at column zero.
fn is_continuation(line: &str) -> bool {
    line.starts_with([' ', '\t'])
        || line == "-\n"
        || line == "-\r\n"
        || line.starts_with("- ")
}

/// Index one past the last value line that follows the key line at `idx`.
///
/// Blank lines inside a block value are part of it; trailing blank lines
/// before the next key are not.
fn value_end(lines: &[String], idx: usize) -> usize {
    let mut end = idx + 1;
    for (i, line) in lines.iter().enumerate().skip(idx + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if !is_continuation(line) {
            break;
        }
        end = i + 1;
    }
    end
}

fn validate_field(key: &str, value: &str) -> Result<(), FrontMatterError> {
    let invalid = |reason| FrontMatterError::InvalidField {
        key: key.to_string(),
        reason,
    };
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.contains(':') || key.chars().any(char::is_whitespace) {
        return Err(invalid("key must not contain whitespace or `:`"));
    }
    if value.contains(['\n', '\r']) {
        return Err(invalid("value must fit on one line"));
    }
    Ok(())
}

/// Upsert `fields` into the front-matter of `doc` and return the new document.
///
/// - An existing `key:` line (first match wins) has its value replaced and keeps
///   its own line ending. A block value under it (indented lines, `- ` items)
///   is removed along with the old inline value.
/// - A missing key gets a new line directly under the opening marker. Missing keys
///   are prepended one at a time in reverse order, so a batch of new keys ends up
///   in the order given here.
/// - When the same key is given twice, the later value is used.
///
/// Fails with [`FrontMatterError::Missing`] or [`FrontMatterError::Unterminated`]
/// rather than guessing where a block should go.
pub fn upsert_fields(doc: &str, fields: &[(&str, &str)]) -> Result<String, FrontMatterError> {
    for (key, value) in fields {
        validate_field(key, value)?;
    }
    let span = locate(doc)?;
    let eol = span.line_ending.as_str();

    // Deduplicate keys, keeping first position and last value.
    let mut unique: Vec<(&str, &str)> = Vec::with_capacity(fields.len());
    for &(key, value) in fields {
        match unique.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => unique.push((key, value)),
        }
    }

    let mut lines: Vec<String> = span
        .content(doc)
        .split_inclusive('\n')
        .map(String::from)
        .collect();

    for &(key, value) in unique.iter().rev() {
        match lines.iter().position(|l| line_has_key(l, key)) {
            Some(idx) => {
                let line_eol = if lines[idx].ends_with("\r\n") {
                    "\r\n"
                } else {
                    "\n"
                };
                // Drop the old block value (indented list, `|` / `>` scalar).
                let end = value_end(&lines, idx);
                lines.drain(idx + 1..end);
                lines[idx] = format!("{key}: {value}{line_eol}");
            }
            None => lines.insert(0, format!("{key}: {value}{eol}")),
        }
    }

    let mut out = String::with_capacity(doc.len() + 64);
    out.push_str(&doc[..span.content_start]);
    for line in &lines {
        out.push_str(line);
    }
    out.push_str(&doc[span.content_end..]);
    Ok(out)
}

/// Upsert `fields` into the post at `path`.
///
/// The whole file is read, patched in memory and written back through a
/// temporary file in the same directory that is renamed over the original, so
/// the post is never left half-written. Returns `Ok(false)` when the patch is a
/// no-op and the file was left alone.
pub fn patch_file(path: &Path, fields: &[(&str, &str)]) -> Result<bool, FrontMatterError> {
    let original = fs::read_to_string(path)?;
    let patched = upsert_fields(&original, fields)?;
    if patched == original {
        return Ok(false);
    }
    write_atomic(path, patched.as_bytes())?;
    Ok(true)
}

/// Write `bytes` to `path` via a sibling temp file and an atomic rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    match_permissions(tmp.as_file(), path)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Give a temp file the permissions it should have once renamed to `target`.
///
/// Temp files are created owner-only. An existing target keeps its mode; a new
/// file gets the usual `0644` on unix.
pub(crate) fn match_permissions(tmp: &fs::File, target: &Path) -> std::io::Result<()> {
    match fs::metadata(target) {
        Ok(meta) => tmp.set_permissions(meta.permissions()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => default_permissions(tmp),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn default_permissions(tmp: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tmp.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions(_tmp: &fs::File) -> std::io::Result<()> {
    Ok(())
}

/// Parse the front-matter block of `doc` as a YAML mapping.
///
/// An empty block yields an empty mapping. A block that parses to something
/// other than a mapping (a bare scalar or list) also yields an empty mapping.
pub fn read_metadata(doc: &str) -> Result<Mapping, FrontMatterError> {
    let span = locate(doc)?;
    let content = span.content(doc);
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(content)?;
    Ok(match value {
        Value::Mapping(m) => m,
        _ => Mapping::new(),
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(s).filter(|s| !s.is_empty())
}

/// Non-empty scalar value of a top-level field.
pub fn string_field(metadata: &Mapping, key: &str) -> Option<String> {
    metadata.get(key).and_then(scalar_to_string)
}

/// True if `key` is set to anything other than null or a blank string.
pub fn has_value(metadata: &Mapping, key: &str) -> bool {
    match metadata.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// The post's primary category.
///
/// Looks at `categories` then `category`. Either may be a scalar or a list; for a
/// list the first scalar entry wins. Nested lists (Hexo's hierarchical
/// `[[parent, child]]` form) resolve to their first element.
pub fn first_category(metadata: &Mapping) -> Option<String> {
    fn first_scalar(value: &Value) -> Option<String> {
        match value {
            Value::Sequence(items) => items.iter().find_map(first_scalar),
            other => scalar_to_string(other),
        }
    }

    ["categories", "category"]
        .iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(first_scalar)
}
