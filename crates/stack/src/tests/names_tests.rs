use crate::names::{format_name, format_names, parse_names, parse_table_name, read_names};
use anyhow::Result;
use tempfile::tempdir;

#[test]
fn parse_splits_on_newlines_and_drops_empties() {
    assert_eq!(
        parse_names(b"a.ref\nb.ref\n"),
        vec!["a.ref".to_string(), "b.ref".to_string()]
    );
    // Tolerated even though the emitter always writes a trailing newline.
    assert_eq!(parse_names(b"a.ref\nb.ref"), vec!["a.ref", "b.ref"]);
    assert_eq!(parse_names(b"a.ref\n\nb.ref\n"), vec!["a.ref", "b.ref"]);
    assert!(parse_names(b"").is_empty());
    assert!(parse_names(b"\n").is_empty());
}

#[test]
fn format_terminates_every_name() {
    assert_eq!(format_names(&["a.ref", "b.ref"]), b"a.ref\nb.ref\n");
    assert_eq!(format_names::<&str>(&[]), b"");
}

#[test]
fn parse_format_round_trip() {
    let names = vec!["x.ref".to_string(), "y.ref".to_string()];
    assert_eq!(parse_names(&format_names(&names)), names);
}

#[test]
fn missing_list_file_reads_as_empty() -> Result<()> {
    let dir = tempdir()?;
    assert!(read_names(&dir.path().join("absent"))?.is_empty());
    Ok(())
}

#[test]
fn table_name_format_is_twelve_hex_digits() {
    assert_eq!(format_name(1, 1), "000000000001-000000000001");
    assert_eq!(format_name(0xabc, 0xdef0), "000000000abc-00000000def0");
    assert_eq!(
        format_name(u64::MAX, u64::MAX),
        "ffffffffffff-ffffffffffff"
    );
}

#[test]
fn table_name_parse_round_trip() {
    let name = format!("{}.ref", format_name(7, 42));
    assert_eq!(parse_table_name(&name), Some((7, 42)));
}

#[test]
fn table_name_parse_rejects_bad_grammar() {
    assert!(parse_table_name("000000000001-000000000002").is_none()); // no suffix
    assert!(parse_table_name("0001-0002.ref").is_none()); // too short
    assert!(parse_table_name("00000000000G-000000000002.ref").is_none()); // not hex
    assert!(parse_table_name("00000000000A-000000000002.ref").is_none()); // uppercase
    assert!(parse_table_name("000000000001_000000000002.ref").is_none()); // no dash
    assert!(parse_table_name("garbage.ref").is_none());
}
