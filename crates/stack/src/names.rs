//! The newline-delimited table-name list and the table filename grammar.
//!
//! The list file is the only persistent pointer to what belongs to a stack:
//! one table basename per line, trailing newline, oldest table first. An
//! absent or empty file denotes an empty stack.

use std::fs;
use std::io;
use std::path::Path;

use crate::Error;

/// Extension carried by every published table file.
pub const TABLE_SUFFIX: &str = ".ref";

/// Parses list-file contents into table names, in order. Empty entries
/// (the trailing newline, blank lines) are discarded; names are otherwise
/// opaque and not policed here.
pub fn parse_names(buf: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(buf)
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// Emits the inverse of [`parse_names`]: each name followed by `\n`.
pub fn format_names<S: AsRef<str>>(names: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for name in names {
        out.extend_from_slice(name.as_ref().as_bytes());
        out.push(b'\n');
    }
    out
}

/// Reads and parses a list file. A missing file is an empty stack, not an
/// error.
pub fn read_names(path: &Path) -> Result<Vec<String>, Error> {
    match fs::read(path) {
        Ok(buf) => Ok(parse_names(&buf)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Formats the `[min, max]` update-index window as the stem of a table
/// filename: twelve lowercase hex digits each, zero padded, dash separated.
/// Callers append [`TABLE_SUFFIX`] for published tables; temp files carry
/// the bare stem plus a random suffix.
pub fn format_name(min: u64, max: u64) -> String {
    format!("{:012x}-{:012x}", min, max)
}

/// Parses a published table name back into its `(min, max)` window.
/// Returns `None` unless the name matches
/// `/^[0-9a-f]{12}-[0-9a-f]{12}\.ref$/` exactly.
pub fn parse_table_name(name: &str) -> Option<(u64, u64)> {
    let stem = name.strip_suffix(TABLE_SUFFIX)?;
    let (min_part, max_part) = stem.split_once('-')?;
    if min_part.len() != 12 || max_part.len() != 12 {
        return None;
    }
    let lower_hex = |s: &str| s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !lower_hex(min_part) || !lower_hex(max_part) {
        return None;
    }
    let min = u64::from_str_radix(min_part, 16).ok()?;
    let max = u64::from_str_radix(max_part, 16).ok()?;
    Some((min, max))
}
