use crate::{Error, Stack, WriteOptions};
use anyhow::Result;
use reftable::RefRecord;
use std::fs;
use std::path::Path;

/// Opens a stack over `dir` with its list file at `dir/tables.list`.
/// Syncing is off; these tests exercise the protocol, not durability.
pub fn open_stack(dir: &Path) -> Result<Stack> {
    Ok(Stack::open(
        dir,
        dir.join("tables.list"),
        WriteOptions { sync: false },
    )?)
}

/// Appends a one-record table setting `name = value` at the next update
/// index, including the auto-compaction that `add` runs.
pub fn put(st: &mut Stack, name: &str, value: &[u8]) -> Result<(), Error> {
    let next = st.next_update_index();
    let name = name.to_string();
    let value = value.to_vec();
    st.add(move |wr| {
        wr.set_limits(next, next);
        wr.add_ref(&RefRecord::set(name, next, value))
    })
}

/// Appends one table holding `records` (already in ascending name order,
/// `None` = tombstone) at the next update index, *without* auto-compaction.
pub fn push(st: &mut Stack, records: &[(&str, Option<&[u8]>)]) -> Result<(), Error> {
    let next = st.next_update_index();
    let records: Vec<RefRecord> = records
        .iter()
        .map(|&(name, value)| match value {
            Some(v) => RefRecord::set(name, next, v.to_vec()),
            None => RefRecord::delete(name, next),
        })
        .collect();
    st.try_add(move |wr| {
        wr.set_limits(next, next);
        for rec in &records {
            wr.add_ref(rec)?;
        }
        Ok(())
    })
}

/// Resolved merged lookup, tombstones collapsed to `None`.
pub fn get_value(st: &Stack, name: &str) -> Option<Vec<u8>> {
    st.merged()
        .get(name)
        .expect("merged lookup failed")
        .and_then(|rec| rec.value)
}

/// Sorted basenames of the published `.ref` files in `dir`.
pub fn ref_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.ends_with(".ref"))
        .collect();
    names.sort();
    names
}

/// Number of directory entries of any kind in `dir`.
pub fn entry_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().filter_map(|e| e.ok()).count()
}
