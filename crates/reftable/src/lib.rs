//! # Reftable - Immutable Reference Tables
//!
//! On-disk storage files for the Reftide reference database.
//!
//! A reftable maps reference names (`refs/heads/main`, ...) to target hashes,
//! each record stamped with the `update_index` of the write batch that
//! produced it. Tables are *write-once, read-many* — once published (by
//! rename) they are never modified, only replaced during compaction by the
//! stack layer.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA SECTION (records sorted by ref name, strictly ascending)  │
//! │                                                               │
//! │ crc32 (u32) | name_len (u32) | name | update_index (u64)      │
//! │ present (u8) | [val_len (u32) | val]                           │
//! │                                                               │
//! │ ... repeated for each record ...                               │
//! │                                                               │
//! │ The CRC32 covers everything after itself in the record        │
//! │ (name_len through end of value). This detects silent disk     │
//! │ corruption on reads.                                          │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX SECTION (name -> data_offset mapping)                    │
//! │                                                               │
//! │ name_len (u32) | name | data_offset (u64)                      │
//! │                                                               │
//! │ ... repeated for each record ...                               │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 28 bytes)                                  │
//! │                                                               │
//! │ min_update_index (u64 LE) | max_update_index (u64 LE)          │
//! │ index_offset (u64 LE) | magic (u32 LE) "RFT1"                  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. The update-index window in the footer is
//! the one declared via [`TableWriter::set_limits`]; the stack layer uses it
//! to name the file and to order tables.
//!
//! ## Module Responsibilities
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | [`record`]  | `RefRecord`: name, update_index, optional value      |
//! | [`format`]  | Footer encoding, magic, size constants               |
//! | [`writer`]  | `TableWriter`: sorted append + index + footer        |
//! | [`reader`]  | `Reader`: footer/index load, CRC-verified point reads|
//! | [`merge`]   | `MergedTable` / `MergedIter`: k-way last-writer-wins |

mod error;
mod format;
mod merge;
mod reader;
mod record;
mod writer;

pub use error::Error;
pub use format::{Footer, FOOTER_BYTES, TABLE_MAGIC};
pub use merge::{MergedIter, MergedTable};
pub use reader::Reader;
pub use record::RefRecord;
pub use writer::{TableLimits, TableWriter};

#[cfg(test)]
mod tests;
