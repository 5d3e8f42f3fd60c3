//! # Stack - Reftide Stack Manager
//!
//! The mutable half of the Reftide reference database: an append-only
//! sequence of immutable [`reftable`] files whose union is the live
//! reference store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────────┐
//! │                     STACK                         │
//! │                                                   │
//! │ add.rs    → lock list → write temp table          │
//! │             → rename into place → promote list    │
//! │                 |                                 │
//! │                 v                                 │
//! │           auto_compact() → balanced stack         │
//! │                                                   │
//! │ compaction.rs → lock range → merge → swap range   │
//! │ reload.rs     → diff list vs readers → new view   │
//! │                                                   │
//! │ reads → MergedTable (oldest .. newest table)      │
//! │          (highest update_index wins)              │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module          | Purpose                                              |
//! |-----------------|------------------------------------------------------|
//! | [`lib.rs`]      | `Stack` struct, open, accessors, `Debug`             |
//! | [`names`]       | List-file codec, table filename grammar              |
//! | [`lock`]        | `O_EXCL` lock files, promote-by-rename               |
//! | [`reload`]      | Diff list vs loaded readers, retry over races        |
//! | [`add`]         | `add` / `try_add`: append one table atomically       |
//! | [`compaction`]  | `compact_range` / `compact_all` / `auto_compact`     |
//! | [`policy`]      | Log₂ size bucketing, compaction range selection      |
//!
//! ## Directory layout
//!
//! ```text
//! <dir>/<NNN>-<MMM>.ref        published tables (12-hex update-index bounds)
//! <dir>/<NNN>-<MMM>XXXXXX      unpublished temp tables (mkstemp-style)
//! <dir>/<NNN>-<MMM>.ref.lock   per-table locks held during compaction
//! <list_file>                  newline-separated table names
//! <list_file>.lock             the per-stack mutex
//! ```
//!
//! ## Concurrency
//!
//! A `Stack` handle is single-threaded; coordination between *processes*
//! (or between handles over the same directory) runs entirely through the
//! lock-file protocol. The list-file rename is the linearisation point of
//! every mutation: readers either see the old list or the new one, never a
//! torn state. A mutation made by someone else surfaces here as
//! [`Error::Lock`]; the idiomatic recovery is [`Stack::reload`] and retry.

mod add;
mod compaction;
mod error;
mod lock;
mod names;
mod policy;
mod reload;

pub use error::Error;
pub use names::{format_name, parse_table_name, TABLE_SUFFIX};

use reftable::MergedTable;
use std::fs;
use std::path::{Path, PathBuf};

/// Options governing how new tables are written.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// If `true`, every finished table is fsynced before the rename that
    /// publishes it. The list file itself is never fsynced; the stack
    /// promises no more than the filesystem's own `rename`/`write`/`close`
    /// semantics.
    pub sync: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { sync: true }
    }
}

/// Counters accumulated across a stack's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Raw on-disk bytes of the tables fed *into* compactions (not bytes
    /// written out).
    pub bytes: u64,
    /// Number of non-trivial `compact_range` invocations.
    pub attempts: u64,
    /// Attempts that failed transiently (lost a lock race or went stale).
    pub failures: u64,
}

/// A stack of reftables over one directory.
///
/// After every successful mutation or reload the in-memory merged view
/// reflects exactly the sequence of filenames persisted in the list file,
/// and the stack owns one open reader per listed table.
pub struct Stack {
    pub(crate) dir: PathBuf,
    pub(crate) list_file: PathBuf,
    pub(crate) opts: WriteOptions,
    pub(crate) merged: MergedTable,
    pub(crate) stats: CompactionStats,
}

impl Stack {
    /// Opens the stack stored in `dir`, with its table list at `list_file`
    /// (the two are typically siblings, but need not be). Creates `dir` if
    /// missing; a missing list file is an empty stack.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        dir: P,
        list_file: Q,
        opts: WriteOptions,
    ) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut stack = Self {
            dir,
            list_file: list_file.as_ref().to_path_buf(),
            opts,
            merged: MergedTable::new(Vec::new()),
            stats: CompactionStats::default(),
        };
        stack.reload()?;
        Ok(stack)
    }

    /// The current merged view. Valid until the next mutating or reload
    /// operation on this handle.
    #[must_use]
    pub fn merged(&self) -> &MergedTable {
        &self.merged
    }

    /// The update index a next table must cover: one past the top table's
    /// maximum, or `1` on an empty stack.
    #[must_use]
    pub fn next_update_index(&self) -> u64 {
        match self.merged.readers().last() {
            Some(top) => top.max_update_index() + 1,
            None => 1,
        }
    }

    /// Compaction counters accumulated since this handle was opened.
    #[must_use]
    pub fn compaction_stats(&self) -> CompactionStats {
        self.stats
    }

    pub(crate) fn list_lock_path(&self) -> PathBuf {
        lock::lock_path(&self.list_file)
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("dir", &self.dir)
            .field("list_file", &self.list_file)
            .field("tables", &self.merged.len())
            .field("next_update_index", &self.next_update_index())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests;
