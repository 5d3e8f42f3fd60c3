//! Compaction: replace a contiguous range of tables with one equivalent
//! table, without blocking concurrent appends for the duration of the merge.

use reftable::{MergedIter, TableWriter, FOOTER_BYTES};
use std::fs::{self, File};
use std::path::PathBuf;
use tempfile::Builder;
use tracing::{debug, info};

use crate::lock::{lock_path, LockFile};
use crate::policy;
use crate::{names, Error, Stack};

/// Fixed per-table overhead deducted before size bucketing, so that
/// near-empty tables land in the same bucket. One less than the footer
/// size keeps every well-formed table's adjusted size positive.
const TABLE_OVERHEAD: u64 = FOOTER_BYTES - 1;

impl Stack {
    /// Compacts the whole stack into a single table. A stack of fewer than
    /// two tables is left alone.
    pub fn compact_all(&mut self) -> Result<(), Error> {
        let n = self.merged.len();
        if n == 0 {
            return Ok(());
        }
        self.compact_range(0, n - 1)
    }

    /// Heuristically compacts an unbalanced stack, using the segment the
    /// sizing policy suggests. A no-op on a balanced stack.
    pub fn auto_compact(&mut self) -> Result<(), Error> {
        let sizes: Vec<u64> = self
            .merged
            .readers()
            .iter()
            .map(|r| r.size().saturating_sub(TABLE_OVERHEAD).max(1))
            .collect();

        match policy::suggest_compaction_segment(&sizes) {
            Some(seg) => {
                debug!(start = seg.start, end = seg.end, "auto-compacting segment");
                self.compact_range(seg.start, seg.end - 1)
            }
            None => Ok(()),
        }
    }

    /// Replaces tables `[first..=last]` with one equivalent table.
    ///
    /// `first >= last` is a no-op. [`Error::Lock`] is transient (another
    /// mutator holds a needed lock, or this handle's view is stale) and is
    /// counted in [`CompactionStats::failures`](crate::CompactionStats);
    /// any other error is fatal for this attempt but leaves the stack
    /// intact.
    ///
    /// # Protocol
    ///
    /// 1. Take the list-file lock and verify the view is current.
    /// 2. Reserve every table in the range via `<table>.lock` files.
    /// 3. Release the list-file lock: the reservations protect the range,
    ///    and appends on top of the stack may proceed while we merge.
    /// 4. Merge the range into a temp file, dropping tombstones when the
    ///    range starts at the bottom of the stack.
    /// 5. Re-take the list-file lock, rename the temp table into place,
    ///    splice the re-read list (preserving concurrently appended
    ///    tables), and promote it.
    /// 6. Unlink the replaced tables and reload.
    pub fn compact_range(&mut self, first: usize, last: usize) -> Result<(), Error> {
        if first >= last {
            return Ok(());
        }
        if last >= self.merged.len() {
            return Err(Error::Api(format!(
                "compaction range [{}, {}] exceeds stack of {} tables",
                first,
                last,
                self.merged.len()
            )));
        }

        self.stats.attempts += 1;
        let result = self.compact_range_inner(first, last);
        if matches!(result, Err(Error::Lock)) {
            self.stats.failures += 1;
        }
        result
    }

    fn compact_range_inner(&mut self, first: usize, last: usize) -> Result<(), Error> {
        // Reserve the range under the list lock, then let the list lock go
        // while we do the slow part. The reservations are dropped (and
        // unlinked) on every exit path.
        let mut table_locks: Vec<LockFile> = Vec::with_capacity(last - first + 1);
        let mut delete_on_success: Vec<PathBuf> = Vec::with_capacity(last - first + 1);
        let mut compacted_names: Vec<String> = Vec::with_capacity(last - first + 1);
        {
            let list_lock = LockFile::acquire(self.list_lock_path())?;
            self.uptodate()?;

            for reader in &self.merged.readers()[first..=last] {
                let table_path = self.dir.join(reader.name());
                table_locks.push(LockFile::reserve(lock_path(&table_path))?);
                compacted_names.push(reader.name().to_string());
                delete_on_success.push(table_path);
            }

            drop(list_lock);
        }

        let min = self.merged.readers()[first].min_update_index();
        let max = self.merged.readers()[last].max_update_index();

        let temp = Builder::new()
            .prefix(&names::format_name(min, max))
            .rand_bytes(6)
            .tempfile_in(&self.dir)?;
        let (file, temp_path) = temp.into_parts();

        let mut writer = TableWriter::new(file);
        self.write_compact(&mut writer, first, last)?;
        let (_, file) = writer.finish()?;
        if self.opts.sync {
            file.sync_all()?;
        }
        drop(file);

        let list_lock = LockFile::acquire(self.list_lock_path())?;

        let new_name = format!("{}{}", names::format_name(min, max), names::TABLE_SUFFIX);
        let new_path = self.dir.join(&new_name);
        temp_path
            .persist(&new_path)
            .map_err(|e| Error::Io(e.error))?;

        // Splice the *re-read* list: tables appended while the list lock
        // was released live after our range and must survive the rewrite.
        let on_disk = names::read_names(&self.list_file)?;
        let new_list = match splice_names(&on_disk, &compacted_names, &new_name) {
            Some(list) => list,
            None => {
                // The range is no longer listed as we knew it; treat the
                // attempt as raced and let the caller retry after reload.
                let _ = fs::remove_file(&new_path);
                return Err(Error::Lock);
            }
        };

        if let Err(e) = list_lock.commit(&names::format_names(&new_list), &self.list_file) {
            let _ = fs::remove_file(&new_path);
            return Err(e);
        }

        // The replaced tables no longer appear in any published list.
        for path in &delete_on_success {
            let _ = fs::remove_file(path);
        }

        info!(first, last, table = %new_name, "compacted table range");
        self.reload()
    }

    /// Streams the merged contents of `[first..=last]` into `writer`,
    /// accumulating the input byte count into the stats.
    ///
    /// Tombstones are dropped when `first == 0`: a deletion only exists to
    /// mask entries in older tables, and a bottom-of-stack compaction has
    /// none left beneath it.
    fn write_compact(
        &mut self,
        writer: &mut TableWriter<File>,
        first: usize,
        last: usize,
    ) -> Result<(), Error> {
        let readers = &self.merged.readers()[first..=last];
        writer.set_limits(
            readers[0].min_update_index(),
            readers[readers.len() - 1].max_update_index(),
        );

        let mut input_bytes = 0u64;
        for reader in readers {
            input_bytes += reader.size();
        }
        self.stats.bytes += input_bytes;

        let mut it = MergedIter::new(readers, "");
        while let Some(rec) = it.next_record()? {
            if first == 0 && rec.is_deletion() {
                continue;
            }
            writer.add_ref(&rec)?;
        }
        Ok(())
    }
}

/// Replaces the contiguous run `compacted` inside `on_disk` with
/// `new_name`, leaving everything before and after untouched. Returns
/// `None` if the run is not present exactly as expected.
pub(crate) fn splice_names(
    on_disk: &[String],
    compacted: &[String],
    new_name: &str,
) -> Option<Vec<String>> {
    let start = on_disk.iter().position(|n| n == &compacted[0])?;
    if on_disk.len() < start + compacted.len()
        || on_disk[start..start + compacted.len()] != compacted[..]
    {
        return None;
    }

    let mut out = Vec::with_capacity(on_disk.len() - compacted.len() + 1);
    out.extend(on_disk[..start].iter().cloned());
    out.push(new_name.to_string());
    out.extend(on_disk[start + compacted.len()..].iter().cloned());
    Some(out)
}
