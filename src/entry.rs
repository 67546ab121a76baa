//! Per-entry metadata kept for the central directory
//!
//! Every entry written to the archive leaves a [`ZipEntry`] behind. The
//! entries are held in a [`Ledger`] until the central directory is written
//! at the end of the stream.

use crate::deflate::CompressionLevel;
use crate::error::{Result, SZipError};
use crc32fast::Hasher as Crc32;

/// Longest name the 16-bit name length field can describe
pub const MAX_NAME_LEN: usize = 0xffff;

#[cfg(not(windows))]
const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;

/// Seconds between 1601-01-01 (Windows epoch) and 1970-01-01
const WINDOWS_EPOCH_OFFSET: i64 = 11_644_473_600;
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Unix permission bits and timestamps for an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnixAttrs {
    mode: u32,
    atime: u32,
    mtime: u32,
}

impl UnixAttrs {
    /// Attributes for a regular file with the given permission bits
    ///
    /// Only the low 12 bits of `permissions` (rwx plus setuid/setgid/sticky)
    /// are kept; the file type is always "regular file".
    pub const fn new(permissions: u32, atime: u32, mtime: u32) -> Self {
        Self {
            mode: S_IFREG | (permissions & 0o7777),
            atime,
            mtime,
        }
    }

    /// Attributes straight from a `stat` result, file type bits included
    #[cfg(not(windows))]
    pub(crate) fn from_stat(mode: u32, atime: u32, mtime: u32) -> Self {
        let mode = if mode & S_IFMT == 0 { mode | S_IFREG } else { mode };
        Self { mode, atime, mtime }
    }

    /// Full `st_mode` value, file type included
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Last access time in Unix seconds
    pub fn atime(&self) -> u32 {
        self.atime
    }

    /// Last modification time in Unix seconds
    pub fn mtime(&self) -> u32 {
        self.mtime
    }
}

/// Windows attribute bits and timestamps (100 ns ticks since 1601-01-01)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsAttrs {
    attributes: u32,
    ctime: u64,
    atime: u64,
    mtime: u64,
}

impl WindowsAttrs {
    /// Attributes for a file entry. The directory bit is cleared since every
    /// entry written carries file data.
    pub fn new(attributes: u32, ctime: u64, atime: u64, mtime: u64) -> Self {
        Self {
            attributes: attributes & !FILE_ATTRIBUTE_DIRECTORY,
            ctime,
            atime,
            mtime,
        }
    }

    pub fn attributes(&self) -> u32 {
        self.attributes
    }

    pub fn ctime(&self) -> u64 {
        self.ctime
    }

    pub fn atime(&self) -> u64 {
        self.atime
    }

    pub fn mtime(&self) -> u64 {
        self.mtime
    }
}

/// Operating-system specific metadata of an entry
///
/// The variant decides which "version made by" host, external attributes and
/// timestamp extra field are written for the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAttrs {
    Unix(UnixAttrs),
    Windows(WindowsAttrs),
}

impl EntryAttrs {
    /// Shorthand for `EntryAttrs::Unix(UnixAttrs::new(..))`
    pub const fn unix(permissions: u32, atime: u32, mtime: u32) -> Self {
        EntryAttrs::Unix(UnixAttrs::new(permissions, atime, mtime))
    }

    /// Shorthand for `EntryAttrs::Windows(WindowsAttrs::new(..))`
    pub fn windows(attributes: u32, ctime: u64, atime: u64, mtime: u64) -> Self {
        EntryAttrs::Windows(WindowsAttrs::new(attributes, ctime, atime, mtime))
    }

    /// Modification time in Unix seconds, used for the DOS date and time
    pub(crate) fn mtime_unix(&self) -> i64 {
        match self {
            EntryAttrs::Unix(unix) => unix.mtime as i64,
            EntryAttrs::Windows(win) => {
                (win.mtime / TICKS_PER_SECOND) as i64 - WINDOWS_EPOCH_OFFSET
            }
        }
    }
}

/// Metadata of one entry in the archive
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Entry name as raw bytes (UTF-8 is flagged in the headers)
    pub name: Box<[u8]>,
    pub attrs: EntryAttrs,
    /// Compression level the entry was written with
    pub level: CompressionLevel,
    /// Archive offset of the local file header
    pub offset: u64,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl ZipEntry {
    pub(crate) fn new(
        name: Box<[u8]>,
        attrs: EntryAttrs,
        level: CompressionLevel,
        offset: u64,
    ) -> Self {
        Self {
            name,
            attrs,
            level,
            offset,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
        }
    }

    /// Name as text, replacing invalid UTF-8
    pub fn name_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// Check a name against the format limit and take ownership of it
pub(crate) fn entry_name(name: &[u8]) -> Result<Box<[u8]>> {
    if name.len() > MAX_NAME_LEN {
        return Err(SZipError::NameTooLong(name.len()));
    }
    Ok(name.into())
}

/// Metadata tracker for CRC and byte counts
pub(crate) struct CrcCounter {
    crc: Crc32,
    uncompressed_count: u64,
    compressed_count: u64,
}

impl CrcCounter {
    pub(crate) fn new() -> Self {
        Self {
            crc: Crc32::new(),
            uncompressed_count: 0,
            compressed_count: 0,
        }
    }

    pub(crate) fn update_uncompressed(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.uncompressed_count += data.len() as u64;
    }

    pub(crate) fn add_compressed(&mut self, count: u64) {
        self.compressed_count += count;
    }

    fn finalize(&self) -> u32 {
        self.crc.clone().finalize()
    }
}

/// The entry currently being written, with its running counters
pub(crate) struct CurrentEntry {
    pub(crate) entry: ZipEntry,
    pub(crate) counter: CrcCounter,
}

impl CurrentEntry {
    pub(crate) fn new(entry: ZipEntry) -> Self {
        Self {
            entry,
            counter: CrcCounter::new(),
        }
    }

    /// Copy the final CRC and sizes into the entry
    pub(crate) fn seal(self) -> ZipEntry {
        let mut entry = self.entry;
        entry.crc32 = self.counter.finalize();
        entry.uncompressed_size = self.counter.uncompressed_count;
        entry.compressed_size = self.counter.compressed_count;
        entry
    }
}

/// Ordered, append-only list of completed entries
#[derive(Debug)]
pub(crate) struct Ledger {
    entries: Vec<ZipEntry>,
}

impl Ledger {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::with_capacity(512),
        }
    }

    pub(crate) fn push(&mut self, entry: ZipEntry) {
        debug_assert!(
            self.entries
                .last()
                .map_or(true, |last| last.offset < entry.offset),
            "local header offsets must increase"
        );
        self.entries.push(entry);
    }

    pub(crate) fn as_slice(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
