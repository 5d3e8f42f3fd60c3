use super::write_and_open;
use crate::{MergedIter, MergedTable};
use anyhow::Result;
use tempfile::tempdir;

#[test]
fn merge_single_table() -> Result<()> {
    let dir = tempdir()?;
    let r = write_and_open(
        dir.path(),
        "a.ref",
        (1, 3),
        &[
            ("refs/heads/a", 1, Some(b"1".as_slice())),
            ("refs/heads/b", 2, Some(b"2".as_slice())),
            ("refs/heads/c", 3, Some(b"3".as_slice())),
        ],
    )?;

    let merged = MergedTable::new(vec![r]);
    let records = merged.seek("").collect_all()?;

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].name, "refs/heads/a");
    assert_eq!(records[1].name, "refs/heads/b");
    assert_eq!(records[2].name, "refs/heads/c");
    Ok(())
}

#[test]
fn newest_update_index_wins() -> Result<()> {
    let dir = tempdir()?;
    let old = write_and_open(
        dir.path(),
        "old.ref",
        (1, 1),
        &[("refs/heads/m", 1, Some(b"old".as_slice()))],
    )?;
    let new = write_and_open(
        dir.path(),
        "new.ref",
        (2, 2),
        &[("refs/heads/m", 2, Some(b"new".as_slice()))],
    )?;

    let merged = MergedTable::new(vec![old, new]);
    let records = merged.seek("").collect_all()?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value.as_deref(), Some(b"new".as_slice()));
    assert_eq!(records[0].update_index, 2);
    Ok(())
}

#[test]
fn update_index_tie_goes_to_later_table() -> Result<()> {
    let dir = tempdir()?;
    let first = write_and_open(
        dir.path(),
        "first.ref",
        (1, 1),
        &[("refs/heads/m", 1, Some(b"first".as_slice()))],
    )?;
    let second = write_and_open(
        dir.path(),
        "second.ref",
        (1, 1),
        &[("refs/heads/m", 1, Some(b"second".as_slice()))],
    )?;

    let merged = MergedTable::new(vec![first, second]);
    let records = merged.seek("").collect_all()?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value.as_deref(), Some(b"second".as_slice()));
    Ok(())
}

#[test]
fn interleaved_names_come_out_sorted() -> Result<()> {
    let dir = tempdir()?;
    let a = write_and_open(
        dir.path(),
        "a.ref",
        (1, 2),
        &[
            ("refs/heads/a", 1, Some(b"1".as_slice())),
            ("refs/heads/c", 2, Some(b"3".as_slice())),
        ],
    )?;
    let b = write_and_open(
        dir.path(),
        "b.ref",
        (3, 4),
        &[
            ("refs/heads/b", 3, Some(b"2".as_slice())),
            ("refs/heads/d", 4, Some(b"4".as_slice())),
        ],
    )?;

    let merged = MergedTable::new(vec![a, b]);
    let names: Vec<String> = merged
        .seek("")
        .collect_all()?
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(
        names,
        vec!["refs/heads/a", "refs/heads/b", "refs/heads/c", "refs/heads/d"]
    );
    Ok(())
}

#[test]
fn seek_positions_mid_range() -> Result<()> {
    let dir = tempdir()?;
    let r = write_and_open(
        dir.path(),
        "t.ref",
        (1, 3),
        &[
            ("refs/heads/a", 1, Some(b"1".as_slice())),
            ("refs/heads/b", 2, Some(b"2".as_slice())),
            ("refs/tags/v1", 3, Some(b"3".as_slice())),
        ],
    )?;

    let merged = MergedTable::new(vec![r]);
    let mut it = merged.seek("refs/heads/b");
    assert_eq!(it.next_record()?.map(|r| r.name), Some("refs/heads/b".into()));
    assert_eq!(it.next_record()?.map(|r| r.name), Some("refs/tags/v1".into()));
    assert!(it.next_record()?.is_none());
    Ok(())
}

#[test]
fn iteration_yields_tombstones_but_get_resolves_them() -> Result<()> {
    let dir = tempdir()?;
    let old = write_and_open(
        dir.path(),
        "old.ref",
        (1, 1),
        &[("refs/heads/m", 1, Some(b"live".as_slice()))],
    )?;
    let del = write_and_open(dir.path(), "del.ref", (2, 2), &[("refs/heads/m", 2, None)])?;

    let merged = MergedTable::new(vec![old, del]);

    let records = merged.seek("").collect_all()?;
    assert_eq!(records.len(), 1);
    assert!(records[0].is_deletion(), "the tombstone must win and surface");

    assert!(merged.get("refs/heads/m")?.is_none());
    Ok(())
}

#[test]
fn merge_over_subrange_of_readers() -> Result<()> {
    let dir = tempdir()?;
    let t1 = write_and_open(
        dir.path(),
        "t1.ref",
        (1, 1),
        &[("refs/heads/a", 1, Some(b"1".as_slice()))],
    )?;
    let t2 = write_and_open(
        dir.path(),
        "t2.ref",
        (2, 2),
        &[("refs/heads/b", 2, Some(b"2".as_slice()))],
    )?;
    let t3 = write_and_open(
        dir.path(),
        "t3.ref",
        (3, 3),
        &[("refs/heads/c", 3, Some(b"3".as_slice()))],
    )?;

    let merged = MergedTable::new(vec![t1, t2, t3]);

    // A compactor merges a contiguous subrange only.
    let mut it = MergedIter::new(&merged.readers()[1..=2], "");
    let names: Vec<String> = it.collect_all()?.into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["refs/heads/b", "refs/heads/c"]);
    Ok(())
}

#[test]
fn empty_view_yields_nothing() -> Result<()> {
    let merged = MergedTable::new(Vec::new());
    assert!(merged.is_empty());
    assert!(merged.seek("").next_record()?.is_none());
    assert!(merged.get("refs/heads/x")?.is_none());
    Ok(())
}
