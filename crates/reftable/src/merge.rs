//! Merged view over an ordered sequence of [`Reader`]s.
//!
//! The stack stores its tables oldest first; the merged view presents their
//! union with last-writer-wins semantics: for each ref name only the record
//! with the **highest update index** is emitted (on a tie, the table later
//! in the stack wins). Tombstone records are emitted too; the compactor
//! and the stack's lookup path decide what to do with them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{Error, Reader, RefRecord};

/// A pending name from one source table, used for heap-based merge ordering.
///
/// Only the `name` and `source` are stored — the actual record is read
/// lazily from disk when the name reaches the top of the heap.
struct HeapEntry {
    name: Vec<u8>,
    /// Index into the reader slice; higher = later in the stack = newer.
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want the *smallest* name first, and
        // for equal names the oldest source first, so reverse both.
        other
            .name
            .cmp(&self.name)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// The union of an ordered reader sequence, oldest table first.
///
/// Owns its readers: retired tables are closed by dropping the view (or the
/// readers removed from it), and reusable readers are moved, never
/// refcounted, into the replacement view during a stack reload.
pub struct MergedTable {
    readers: Vec<Reader>,
}

impl MergedTable {
    /// Creates a merged view over `readers`, taking ownership of the
    /// sequence. Order matters: position 0 is the oldest table.
    pub fn new(readers: Vec<Reader>) -> Self {
        Self { readers }
    }

    /// Number of tables in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Returns `true` if the view holds no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// The underlying readers, oldest first.
    #[must_use]
    pub fn readers(&self) -> &[Reader] {
        &self.readers
    }

    /// Consumes the view, handing the readers back in stack order.
    #[must_use]
    pub fn into_readers(self) -> Vec<Reader> {
        self.readers
    }

    /// Table basenames in stack order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.readers.iter().map(|r| r.name()).collect()
    }

    /// Returns an iterator positioned at the first name `>= start`.
    pub fn seek(&self, start: &str) -> MergedIter<'_> {
        MergedIter::new(&self.readers, start)
    }

    /// Resolved point lookup: the winning record for `name`, with tombstones
    /// collapsed to `None`.
    pub fn get(&self, name: &str) -> Result<Option<RefRecord>, Error> {
        let mut it = self.seek(name);
        match it.next_record()? {
            Some(rec) if rec.name == name && !rec.is_deletion() => Ok(Some(rec)),
            _ => Ok(None),
        }
    }
}

/// Merges a reader slice into a single sorted stream of winning records.
///
/// Lazy: one name per source is staged on a min-heap; records are read from
/// disk only when their name reaches the front. Duplicate names are resolved
/// by keeping the record with the highest update index (ties go to the later
/// source).
pub struct MergedIter<'a> {
    readers: &'a [Reader],
    /// Per-reader: sorted names remaining to be yielded.
    name_iters: Vec<std::vec::IntoIter<Vec<u8>>>,
    heap: BinaryHeap<HeapEntry>,
}

impl<'a> MergedIter<'a> {
    /// Creates a merge iterator over `readers` (any contiguous subrange of
    /// a stack works; the compactor merges `[first..=last]` this way),
    /// positioned at the first name `>= start`.
    pub fn new(readers: &'a [Reader], start: &str) -> Self {
        let mut name_iters: Vec<std::vec::IntoIter<Vec<u8>>> = Vec::with_capacity(readers.len());
        let mut heap = BinaryHeap::new();

        for (i, reader) in readers.iter().enumerate() {
            let names: Vec<Vec<u8>> = reader
                .names_from(start.as_bytes())
                .map(|n| n.to_vec())
                .collect();
            let mut iter = names.into_iter();
            if let Some(first) = iter.next() {
                heap.push(HeapEntry {
                    name: first,
                    source: i,
                });
            }
            name_iters.push(iter);
        }

        Self {
            readers,
            name_iters,
            heap,
        }
    }

    /// Returns the next winning record in ascending name order, or `None`
    /// when all sources are exhausted. Tombstones are included.
    pub fn next_record(&mut self) -> Result<Option<RefRecord>, Error> {
        let top = match self.heap.pop() {
            Some(e) => e,
            None => return Ok(None),
        };

        let mut best = match self.readers[top.source].get_key(&top.name)? {
            Some(rec) => rec,
            None => {
                return Err(Error::Format(format!(
                    "table {} lost indexed record mid-merge",
                    self.readers[top.source].name()
                )))
            }
        };
        self.advance(top.source);

        // Drain every other source carrying the same name. Entries pop in
        // ascending source order, so `>=` lets the later (newer) table win
        // an update-index tie.
        while let Some(peek) = self.heap.peek() {
            if peek.name != top.name {
                break;
            }
            let dup = match self.heap.pop() {
                Some(d) => d,
                None => break,
            };
            if let Some(rec) = self.readers[dup.source].get_key(&dup.name)? {
                if rec.update_index >= best.update_index {
                    best = rec;
                }
            }
            self.advance(dup.source);
        }

        Ok(Some(best))
    }

    /// Collects all remaining winning records into a `Vec`.
    pub fn collect_all(&mut self) -> Result<Vec<RefRecord>, Error> {
        let mut out = Vec::new();
        while let Some(rec) = self.next_record()? {
            out.push(rec);
        }
        Ok(out)
    }

    /// Stages the next name from `source` onto the heap, if any remains.
    fn advance(&mut self, source: usize) {
        if let Some(next) = self.name_iters[source].next() {
            self.heap.push(HeapEntry { name: next, source });
        }
    }
}
