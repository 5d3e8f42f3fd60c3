use byteorder::{LittleEndian, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::io::{Seek, Write};

use crate::format::{write_footer, Footer};
use crate::{Error, RefRecord};

/// The update-index window a finished table was declared to cover.
///
/// Returned from [`TableWriter::finish`]; the stack layer derives the
/// published filename (`<min>-<max>.ref`) from it and verifies the window
/// against `next_update_index` before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLimits {
    pub min_update_index: u64,
    pub max_update_index: u64,
}

/// Writes a single reftable to a `Write + Seek` sink.
///
/// Records must be added in strictly ascending name order, each with an
/// `update_index` inside the window declared via [`set_limits`]. The index
/// is kept in memory while writing (vector of `(name, offset)`); `finish`
/// appends it together with the footer.
///
/// The writer never syncs; the caller owns the underlying file and decides
/// whether to fsync before publishing it.
///
/// [`set_limits`]: TableWriter::set_limits
pub struct TableWriter<W: Write + Seek> {
    out: W,
    /// In-memory index: (name, data-section byte offset), insertion order.
    index: Vec<(Vec<u8>, u64)>,
    /// Name of the most recently added record, for order enforcement.
    last_name: Option<String>,
    min_update_index: u64,
    max_update_index: u64,
    /// Reusable scratch buffer to avoid allocation on every record.
    buf: Vec<u8>,
}

impl<W: Write + Seek> TableWriter<W> {
    /// Creates a writer over `out`. Limits default to `(0, 0)`, so a caller
    /// that never declares them fails the stack's minimum-window check.
    pub fn new(out: W) -> Self {
        Self {
            out,
            index: Vec::new(),
            last_name: None,
            min_update_index: 0,
            max_update_index: 0,
            buf: Vec::with_capacity(256),
        }
    }

    /// Declares the inclusive `[min, max]` update-index window for the
    /// records that will be added.
    pub fn set_limits(&mut self, min: u64, max: u64) {
        self.min_update_index = min;
        self.max_update_index = max;
    }

    /// Appends one record to the data section.
    ///
    /// # Errors
    ///
    /// `Error::Api` if `rec.name` is not strictly greater than the previous
    /// record's name, or if `rec.update_index` falls outside the declared
    /// limits. `Error::Io` on write failure.
    pub fn add_ref(&mut self, rec: &RefRecord) -> Result<(), Error> {
        if let Some(last) = &self.last_name {
            if rec.name.as_str() <= last.as_str() {
                return Err(Error::Api(format!(
                    "records must be added in ascending name order: {:?} after {:?}",
                    rec.name, last
                )));
            }
        }
        if rec.update_index < self.min_update_index || rec.update_index > self.max_update_index {
            return Err(Error::Api(format!(
                "update_index {} outside declared limits [{}, {}]",
                rec.update_index, self.min_update_index, self.max_update_index
            )));
        }

        let offset = self.out.stream_position()?;

        // Serialize the record body into the scratch buffer, then prefix it
        // with a CRC32 over the body.
        self.buf.clear();
        self.buf
            .write_u32::<LittleEndian>(rec.name.len() as u32)?;
        self.buf.write_all(rec.name.as_bytes())?;
        self.buf.write_u64::<LittleEndian>(rec.update_index)?;
        match &rec.value {
            Some(v) => {
                self.buf.write_u8(1)?;
                self.buf.write_u32::<LittleEndian>(v.len() as u32)?;
                self.buf.write_all(v)?;
            }
            None => {
                self.buf.write_u8(0)?;
            }
        }

        let mut hasher = Crc32::new();
        hasher.update(&self.buf);
        self.out.write_u32::<LittleEndian>(hasher.finalize())?;
        self.out.write_all(&self.buf)?;

        self.index.push((rec.name.clone().into_bytes(), offset));
        self.last_name = Some(rec.name.clone());
        Ok(())
    }

    /// Writes the index section and footer, flushes, and returns the sink
    /// together with the declared limits.
    ///
    /// An empty table (no records) is valid; the stack publishes it under
    /// the declared window.
    pub fn finish(mut self) -> Result<(TableLimits, W), Error> {
        let index_offset = self.out.stream_position()?;

        for (name, data_offset) in &self.index {
            self.out.write_u32::<LittleEndian>(name.len() as u32)?;
            self.out.write_all(name)?;
            self.out.write_u64::<LittleEndian>(*data_offset)?;
        }

        write_footer(
            &mut self.out,
            &Footer {
                min_update_index: self.min_update_index,
                max_update_index: self.max_update_index,
                index_offset,
            },
        )?;
        self.out.flush()?;

        Ok((
            TableLimits {
                min_update_index: self.min_update_index,
                max_update_index: self.max_update_index,
            },
            self.out,
        ))
    }
}
