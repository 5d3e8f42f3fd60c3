mod merge_tests;

use crate::{Reader, RefRecord, TableWriter};
use anyhow::Result;
use std::fs::File;
use std::path::Path;

/// Helper: write a table with the given limits and records, then open a
/// reader on it.
pub fn write_and_open(
    dir: &Path,
    name: &str,
    limits: (u64, u64),
    records: &[(&str, u64, Option<&[u8]>)],
) -> Result<Reader> {
    let path = dir.join(name);
    let file = File::create(&path)?;
    let mut wr = TableWriter::new(file);
    wr.set_limits(limits.0, limits.1);
    for &(name, update_index, value) in records {
        let rec = match value {
            Some(v) => RefRecord::set(name, update_index, v.to_vec()),
            None => RefRecord::delete(name, update_index),
        };
        wr.add_ref(&rec)?;
    }
    let (_, file) = wr.finish()?;
    drop(file);
    Ok(Reader::open(&path)?)
}
