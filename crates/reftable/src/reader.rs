use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher as Crc32;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::Path;
use std::sync::Mutex;

use crate::format::{read_footer, Footer, FOOTER_BYTES};
use crate::{Error, RefRecord};

/// Maximum ref-name size we'll allocate during reads. Prevents OOM on
/// corrupt files.
const MAX_NAME_BYTES: usize = 4 * 1024;
/// Maximum value size we'll allocate during reads.
const MAX_VALUE_BYTES: usize = 64 * 1024;

/// Reads one published reftable.
///
/// On [`open`](Reader::open) the footer is validated and the entire index is
/// loaded into memory as a `BTreeMap<Vec<u8>, u64>` (name → data-section
/// byte offset). A persistent file handle is kept open for the lifetime of
/// the reader, wrapped in a `Mutex` so that reads work through a shared
/// `&self` reference. Dropping the reader closes the handle.
///
/// The stack layer holds exactly one `Reader` per listed table and moves
/// readers between merged views during reloads.
#[derive(Debug)]
pub struct Reader {
    /// Basename of the table file, e.g. `000000000001-000000000002.ref`.
    /// This is the identity the stack's list file refers to.
    name: String,
    /// File size in bytes; the compaction policy buckets on it.
    size: u64,
    footer: Footer,
    /// In-memory index mapping each ref name to its data-section offset.
    index: BTreeMap<Vec<u8>, u64>,
    /// Persistent file handle, wrapped in Mutex for interior mutability.
    file: Mutex<BufReader<File>>,
}

impl Reader {
    /// Opens a table file and loads its index into memory.
    ///
    /// # Errors
    ///
    /// `Error::NotExist` if the file is missing (the stack reloader retries
    /// on this), `Error::Format` if the footer or index is malformed,
    /// `Error::Io` otherwise.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Format(format!("not a table path: {}", path.display())))?
            .to_string();

        let mut f = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotExist),
            Err(e) => return Err(e.into()),
        };

        let (footer, size) = read_footer(&mut f)?;

        // Read index entries from index_offset up to the footer start.
        let index_end = size - FOOTER_BYTES;
        f.seek(SeekFrom::Start(footer.index_offset))?;
        let mut index = BTreeMap::new();
        while f.stream_position()? < index_end {
            let name_len = f.read_u32::<LittleEndian>()? as usize;
            if name_len > MAX_NAME_BYTES {
                return Err(Error::Format(format!(
                    "corrupt index: name_len {} exceeds maximum {}",
                    name_len, MAX_NAME_BYTES
                )));
            }
            let mut name = vec![0u8; name_len];
            f.read_exact(&mut name)?;
            let data_offset = f.read_u64::<LittleEndian>()?;
            index.insert(name, data_offset);
        }

        f.seek(SeekFrom::Start(0))?;

        Ok(Self {
            name,
            size,
            footer,
            index,
            file: Mutex::new(BufReader::new(f)),
        })
    }

    /// Basename of the table file.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// On-disk size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Smallest update index this table was declared to cover.
    #[must_use]
    pub fn min_update_index(&self) -> u64 {
        self.footer.min_update_index
    }

    /// Largest update index this table was declared to cover.
    #[must_use]
    pub fn max_update_index(&self) -> u64 {
        self.footer.max_update_index
    }

    /// Number of records in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the table contains zero records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Point lookup for a single ref name. The returned record may be a
    /// tombstone (`value == None`); resolving tombstones against older
    /// tables is the merged view's job.
    pub fn get(&self, name: &str) -> Result<Option<RefRecord>, Error> {
        self.get_key(name.as_bytes())
    }

    pub(crate) fn get_key(&self, name: &[u8]) -> Result<Option<RefRecord>, Error> {
        let offset = match self.index.get(name) {
            Some(&o) => o,
            None => return Ok(None),
        };
        let rec = self.read_record_at(offset)?;
        if rec.name.as_bytes() != name {
            return Err(Error::Format(format!(
                "index pointed to mismatching record at offset {}",
                offset
            )));
        }
        Ok(Some(rec))
    }

    /// Iterates over all ref names whose byte order is `>= start`, ascending.
    pub fn names_from<'a>(&'a self, start: &[u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.index
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .map(|(k, _)| k.as_slice())
    }

    /// Iterates over all ref names in the table, ascending.
    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.index.keys().map(|k| k.as_slice())
    }

    /// Reads and CRC-verifies one record from the data section.
    fn read_record_at(&self, offset: u64) -> Result<RefRecord, Error> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| Error::Format(format!("reader lock poisoned: {}", e)))?;
        f.seek(SeekFrom::Start(offset))?;

        let stored_crc = f.read_u32::<LittleEndian>()?;

        let name_len = f.read_u32::<LittleEndian>()? as usize;
        if name_len > MAX_NAME_BYTES {
            return Err(Error::Format(format!(
                "corrupt record: name_len {} exceeds maximum {}",
                name_len, MAX_NAME_BYTES
            )));
        }
        let mut name_buf = vec![0u8; name_len];
        f.read_exact(&mut name_buf)?;

        let update_index = f.read_u64::<LittleEndian>()?;
        let present = f.read_u8()?;
        let value = if present == 1 {
            let val_len = f.read_u32::<LittleEndian>()? as usize;
            if val_len > MAX_VALUE_BYTES {
                return Err(Error::Format(format!(
                    "corrupt record: val_len {} exceeds maximum {}",
                    val_len, MAX_VALUE_BYTES
                )));
            }
            let mut val = vec![0u8; val_len];
            f.read_exact(&mut val)?;
            Some(val)
        } else if present == 0 {
            None
        } else {
            return Err(Error::Format(format!(
                "corrupt record: bad presence byte {} at offset {}",
                present, offset
            )));
        };

        // Reconstruct the checksummed body: name_len + name + update_index
        // + present + [val_len + val].
        let mut hasher = Crc32::new();
        hasher.update(&(name_len as u32).to_le_bytes());
        hasher.update(&name_buf);
        hasher.update(&update_index.to_le_bytes());
        hasher.update(&[present]);
        if let Some(ref v) = value {
            hasher.update(&(v.len() as u32).to_le_bytes());
            hasher.update(v);
        }
        let actual_crc = hasher.finalize();
        if actual_crc != stored_crc {
            return Err(Error::Format(format!(
                "CRC32 mismatch at offset {}: expected {:#010x}, got {:#010x}",
                offset, stored_crc, actual_crc
            )));
        }

        let name = String::from_utf8(name_buf)
            .map_err(|_| Error::Format(format!("ref name at offset {} is not UTF-8", offset)))?;

        Ok(RefRecord {
            name,
            update_index,
            value,
        })
    }
}
