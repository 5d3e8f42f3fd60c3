use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::Error;

/// Magic identifying a reftable, v1.
pub const TABLE_MAGIC: u32 = 0x5246_5431; // "RFT1"

/// Size of the fixed footer at the tail of every table file.
pub const FOOTER_BYTES: u64 = 8 /*min*/ + 8 /*max*/ + 8 /*index_offset*/ + 4 /*magic*/;

/// The fixed trailer of a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    /// Smallest update index the table was declared to cover.
    pub min_update_index: u64,
    /// Largest update index the table was declared to cover.
    pub max_update_index: u64,
    /// Byte offset where the index section starts.
    pub index_offset: u64,
}

/// Writes the footer (update-index window, index offset, magic).
pub fn write_footer<W: Write>(w: &mut W, footer: &Footer) -> Result<(), Error> {
    w.write_u64::<LittleEndian>(footer.min_update_index)?;
    w.write_u64::<LittleEndian>(footer.max_update_index)?;
    w.write_u64::<LittleEndian>(footer.index_offset)?;
    w.write_u32::<LittleEndian>(TABLE_MAGIC)?;
    Ok(())
}

/// Reads and validates the footer; returns it together with the file size.
pub fn read_footer<R: Read + Seek>(r: &mut R) -> Result<(Footer, u64), Error> {
    let filesize = r.seek(SeekFrom::End(0))?;
    if filesize < FOOTER_BYTES {
        return Err(Error::Format(format!(
            "file too small for a table footer: {} bytes",
            filesize
        )));
    }

    r.seek(SeekFrom::Start(filesize - FOOTER_BYTES))?;
    let min_update_index = r.read_u64::<LittleEndian>()?;
    let max_update_index = r.read_u64::<LittleEndian>()?;
    let index_offset = r.read_u64::<LittleEndian>()?;
    let magic = r.read_u32::<LittleEndian>()?;

    if magic != TABLE_MAGIC {
        return Err(Error::Format(format!("bad table magic {:#010x}", magic)));
    }
    if index_offset > filesize - FOOTER_BYTES {
        return Err(Error::Format(format!(
            "index offset {} points past the index section end {}",
            index_offset,
            filesize - FOOTER_BYTES
        )));
    }

    Ok((
        Footer {
            min_update_index,
            max_update_index,
            index_offset,
        },
        filesize,
    ))
}
