//! Appending: produce one new table from a caller-supplied write callback
//! and push it onto the top of the stack atomically.

use reftable::TableWriter;
use std::fs::{self, File};
use tempfile::Builder;
use tracing::debug;

use crate::lock::LockFile;
use crate::{names, Error, Stack};

impl Stack {
    /// Appends one table produced by `write`, then rebalances via
    /// [`auto_compact`](Stack::auto_compact).
    ///
    /// `write` receives a fresh [`TableWriter`] and must call `set_limits`
    /// (with a minimum of at least [`next_update_index`]) and `add_ref` for
    /// every record of the batch.
    ///
    /// On [`Error::Lock`] (another mutator holds the stack, or this
    /// handle's view went stale) the stack is reloaded before the error is
    /// returned, so the caller can immediately retry its higher-level
    /// transaction against the fresh view.
    ///
    /// [`next_update_index`]: Stack::next_update_index
    pub fn add<F>(&mut self, write: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TableWriter<File>) -> Result<(), reftable::Error>,
    {
        match self.try_add(write) {
            Ok(()) => self.auto_compact(),
            Err(Error::Lock) => {
                self.reload()?;
                Err(Error::Lock)
            }
            Err(e) => Err(e),
        }
    }

    /// One append attempt, without the reload-on-conflict and rebalance of
    /// [`add`](Stack::add).
    ///
    /// # Protocol
    ///
    /// 1. Take `<list_file>.lock` (`EEXIST` → [`Error::Lock`]).
    /// 2. Verify the loaded view still matches the list file.
    /// 3. Write the new table into a `mkstemp`-style temp file in the stack
    ///    directory, named `<next>-<next>XXXXXX`.
    /// 4. Require the writer's declared minimum to be at least the next
    ///    update index, else [`Error::Api`].
    /// 5. Rename the temp file to `<min>-<max>.ref`.
    /// 6. Write the extended name list into the lock file and promote it
    ///    onto the list file: the atomic commit.
    /// 7. Reload.
    ///
    /// Every failure before step 6 unlinks the temp file and the lock file;
    /// a failure in step 7 leaves the commit standing and is surfaced so
    /// the caller can reload again.
    pub fn try_add<F>(&mut self, write: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TableWriter<File>) -> Result<(), reftable::Error>,
    {
        let lock = LockFile::acquire(self.list_lock_path())?;
        self.uptodate()?;

        let next = self.next_update_index();

        let temp = Builder::new()
            .prefix(&names::format_name(next, next))
            .rand_bytes(6)
            .tempfile_in(&self.dir)?;
        let (file, temp_path) = temp.into_parts();

        let mut writer = TableWriter::new(file);
        write(&mut writer)?;
        let (limits, file) = writer.finish()?;
        if self.opts.sync {
            file.sync_all()?;
        }
        drop(file);

        if limits.min_update_index < next {
            return Err(Error::Api(format!(
                "table min_update_index {} below required {}",
                limits.min_update_index, next
            )));
        }

        let final_name = format!(
            "{}{}",
            names::format_name(limits.min_update_index, limits.max_update_index),
            names::TABLE_SUFFIX
        );
        let final_path = self.dir.join(&final_name);
        temp_path
            .persist(&final_path)
            .map_err(|e| Error::Io(e.error))?;

        let mut list: Vec<String> = self.merged.names().iter().map(|n| n.to_string()).collect();
        list.push(final_name.clone());

        if let Err(e) = lock.commit(&names::format_names(&list), &self.list_file) {
            // The table was renamed into place but no published list refers
            // to it; sweep it before surfacing the error.
            let _ = fs::remove_file(&final_path);
            return Err(e);
        }

        debug!(table = %final_name, "appended table");
        self.reload()
    }
}
