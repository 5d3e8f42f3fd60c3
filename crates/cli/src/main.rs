//! # CLI - Reftide Interactive Shell
//!
//! A REPL-style command-line interface for the Reftide reference database.
//! Reads commands from stdin, executes them against a reftable stack, and
//! prints results to stdout. Designed for both interactive use and scripted
//! testing (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! SET name value     Append a one-record table setting name = value
//! DEL name           Append a one-record tombstone table
//! GET name           Merged lookup (prints value or "(nil)")
//! SCAN [prefix]      Merged iteration, optionally under a prefix
//! COMPACT            Compact the whole stack into one table
//! RELOAD             Re-read the table list from disk
//! STATS              Print stack debug info and compaction counters
//! EXIT / QUIT        Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! REFTIDE_DIR    stack directory            (default: "data/refs")
//! REFTIDE_LIST   table list file            (default: "<dir>/tables.list")
//! REFTIDE_SYNC   fsync tables before rename (default: "true")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! Reftide started (dir=data/refs, tables=0, next_update_index=1)
//! > SET refs/heads/main abc123
//! OK
//! > GET refs/heads/main
//! abc123
//! > SCAN refs/heads/
//! refs/heads/main -> abc123
//! (1 entries)
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use reftable::RefRecord;
use stack::{Stack, WriteOptions};
use std::io::{self, BufRead, Write};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Appends a one-record table (`value == None` writes a tombstone),
/// retrying a couple of times when another mutator races us; `add`
/// reloads on a lock conflict, so the retry lands on the fresh view.
fn set_ref(st: &mut Stack, name: &str, value: Option<&str>) {
    for _ in 0..3 {
        let next = st.next_update_index();
        let record = match value {
            Some(v) => RefRecord::set(name, next, v.as_bytes().to_vec()),
            None => RefRecord::delete(name, next),
        };
        match st.add(move |wr| {
            wr.set_limits(next, next);
            wr.add_ref(&record)
        }) {
            Ok(()) => {
                println!("OK");
                return;
            }
            Err(stack::Error::Lock) => continue,
            Err(e) => {
                println!("ERR {}", e);
                return;
            }
        }
    }
    println!("BUSY (stack contended; try again)");
}

fn get_ref(st: &Stack, name: &str) {
    match st.merged().get(name) {
        Ok(Some(rec)) => match rec.value {
            Some(v) => println!("{}", String::from_utf8_lossy(&v)),
            None => println!("(nil)"),
        },
        Ok(None) => println!("(nil)"),
        Err(e) => println!("ERR {}", e),
    }
}

fn scan(st: &Stack, prefix: &str) {
    let mut it = st.merged().seek(prefix);
    let mut count = 0usize;
    loop {
        match it.next_record() {
            Ok(Some(rec)) => {
                if !rec.name.starts_with(prefix) {
                    break;
                }
                if let Some(v) = &rec.value {
                    println!("{} -> {}", rec.name, String::from_utf8_lossy(v));
                    count += 1;
                }
            }
            Ok(None) => break,
            Err(e) => {
                println!("ERR {}", e);
                return;
            }
        }
    }
    println!("({} entries)", count);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Configuration via environment variables with sensible defaults.
    let dir = env_or("REFTIDE_DIR", "data/refs");
    let list = env_or("REFTIDE_LIST", &format!("{}/tables.list", dir));
    let sync = env_or("REFTIDE_SYNC", "true") != "false";

    let mut st = Stack::open(&dir, &list, WriteOptions { sync })?;
    println!(
        "Reftide started (dir={}, tables={}, next_update_index={})",
        dir,
        st.merged().len(),
        st.next_update_index()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let cmd = parts.next().map(|c| c.to_uppercase());

        match cmd.as_deref() {
            None => {}
            Some("SET") => match (parts.next(), parts.next()) {
                (Some(name), Some(value)) => set_ref(&mut st, name, Some(value)),
                _ => println!("ERR usage: SET name value"),
            },
            Some("DEL") => match parts.next() {
                Some(name) => set_ref(&mut st, name, None),
                None => println!("ERR usage: DEL name"),
            },
            Some("GET") => match parts.next() {
                Some(name) => get_ref(&st, name),
                None => println!("ERR usage: GET name"),
            },
            Some("SCAN") => scan(&st, parts.next().unwrap_or("")),
            Some("COMPACT") => match st.compact_all() {
                Ok(()) => {
                    let s = st.compaction_stats();
                    println!(
                        "OK (tables={}, compacted_bytes={})",
                        st.merged().len(),
                        s.bytes
                    );
                }
                Err(e) if e.is_transient() => println!("BUSY ({})", e),
                Err(e) => println!("ERR {}", e),
            },
            Some("RELOAD") => match st.reload() {
                Ok(()) => println!("OK (tables={})", st.merged().len()),
                Err(e) => println!("ERR {}", e),
            },
            Some("STATS") => {
                println!("{:?}", st);
            }
            Some("EXIT") | Some("QUIT") => break,
            Some(other) => println!("ERR unknown command: {}", other),
        }

        print!("> ");
        stdout.flush()?;
    }

    println!("bye");
    Ok(())
}
