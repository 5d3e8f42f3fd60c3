//! Reloading: bring the in-memory merged view into agreement with the list
//! file, tolerating the race where a concurrent compactor deletes a table
//! between our list read and our file open.

use reftable::{MergedTable, Reader};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{names, Error, Stack};

/// How long to keep retrying after the unconditional attempts are used up.
const RELOAD_DEADLINE: Duration = Duration::from_secs(3);
/// Attempts made before the deadline is consulted at all (eases debugging
/// under a stopped process, where wall clock time runs away).
const UNCONDITIONAL_TRIES: u32 = 3;
/// Additive floor of the backoff, in microseconds.
const BACKOFF_FLOOR_US: u64 = 100;
/// Hard cap on a single backoff sleep. The doubling would otherwise grow
/// without bound.
const BACKOFF_CAP_US: u64 = 100_000;

/// A retained-or-fresh slot computed while the old view is still intact,
/// so that assembling the replacement view cannot fail halfway.
enum Slot {
    /// Reuse the reader at this position of the current view.
    Claim(usize),
    /// A newly opened reader for a table we did not have loaded.
    Fresh(Reader),
}

impl Stack {
    /// Re-reads the list file and swaps in a merged view that matches it,
    /// reusing already-open readers and closing retired ones.
    ///
    /// A `NotExist` on a referenced table means a concurrent compactor
    /// deleted it after we read the list; if the list has changed in the
    /// meantime we back off (capped jittered doubling) and retry: the
    /// first few attempts unconditionally, after that until a ~3s deadline.
    /// If the list did *not* change, the named table is genuinely missing
    /// and the error is surfaced.
    pub fn reload(&mut self) -> Result<(), Error> {
        let deadline = Instant::now() + RELOAD_DEADLINE;
        let mut delay_us: u64 = 0;
        let mut tries: u32 = 0;

        loop {
            tries += 1;
            if tries > UNCONDITIONAL_TRIES && Instant::now() >= deadline {
                warn!(tries, "reload deadline exceeded; a listed table stayed missing");
                return Err(Error::NotExist);
            }

            let names = names::read_names(&self.list_file)?;
            match self.reload_once(&names) {
                Ok(()) => {
                    debug!(tables = names.len(), "stack view reloaded");
                    return Ok(());
                }
                Err(Error::NotExist) => {}
                Err(e) => return Err(e),
            }

            let names_after = names::read_names(&self.list_file)?;
            if names_after == names {
                warn!(
                    "list file unchanged but a listed table is missing; \
                     refusing to retry"
                );
                return Err(Error::NotExist);
            }

            delay_us = (delay_us
                + (delay_us as f64 * rand::random::<f64>()) as u64
                + BACKOFF_FLOOR_US)
                .min(BACKOFF_CAP_US);
            debug!(tries, delay_us, "list file changed under reload; backing off");
            thread::sleep(Duration::from_micros(delay_us));
        }
    }

    /// One reload attempt against a fixed name list.
    ///
    /// Runs in two phases so the current view survives any failure:
    /// first every table not already loaded is opened (an open failure
    /// drops only the freshly opened readers), then the replacement view is
    /// assembled, infallibly, by moving retained readers out of the old
    /// view. Whatever remains of the old view afterwards is retired
    /// and closed by drop.
    fn reload_once(&mut self, names: &[String]) -> Result<(), Error> {
        let mut slots: Vec<Slot> = Vec::with_capacity(names.len());
        let mut claimed = vec![false; self.merged.len()];

        for name in names {
            let reuse = self
                .merged
                .readers()
                .iter()
                .enumerate()
                .position(|(j, r)| !claimed[j] && r.name() == name.as_str());
            match reuse {
                Some(j) => {
                    claimed[j] = true;
                    slots.push(Slot::Claim(j));
                }
                None => {
                    let reader = Reader::open(self.dir.join(name))?;
                    slots.push(Slot::Fresh(reader));
                }
            }
        }

        let old = std::mem::replace(&mut self.merged, MergedTable::new(Vec::new()));
        let mut cur: Vec<Option<Reader>> = old.into_readers().into_iter().map(Some).collect();

        let mut tables = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Fresh(reader) => tables.push(reader),
                Slot::Claim(j) => {
                    // Each index is claimed at most once above.
                    if let Some(reader) = cur[j].take() {
                        tables.push(reader);
                    }
                }
            }
        }

        let retired = cur.iter().filter(|c| c.is_some()).count();
        if retired > 0 {
            debug!(retired, "closing readers for retired tables");
        }

        self.merged = MergedTable::new(tables);
        Ok(())
    }

    /// Checks that the loaded reader names agree, element by element, with
    /// the list file. Any disagreement, including extra or missing trailing
    /// entries, is a lock conflict: someone else mutated the stack and the
    /// caller must reload before writing.
    pub(crate) fn uptodate(&self) -> Result<(), Error> {
        let on_disk = names::read_names(&self.list_file)?;
        let loaded = self.merged.names();

        if on_disk.len() != loaded.len()
            || !on_disk.iter().zip(loaded.iter()).all(|(a, b)| a == b)
        {
            return Err(Error::Lock);
        }
        Ok(())
    }
}
