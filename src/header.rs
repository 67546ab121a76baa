//! Encoding of the fixed-layout ZIP records
//!
//! Everything here is pure: each function turns entry metadata into the
//! exact bytes of one record. Whether a size or offset goes into a Zip64
//! extra field is decided per field, and the data descriptor uses the same
//! test as the central header so both always agree on field widths.

use crate::deflate::CompressionLevel;
use crate::entry::{EntryAttrs, ZipEntry};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

/// Largest value of a two byte field
pub(crate) const MAX16: u64 = 0xffff;
/// Largest value of a four byte field, also the Zip64 sentinel
pub(crate) const MAX32: u64 = 0xffff_ffff;

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06064b50;
const ZIP64_END_LOCATOR_SIGNATURE: u32 = 0x07064b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;

const VERSION_DEFAULT: u16 = 20;
const VERSION_ZIP64: u16 = 45;
const HOST_UNIX: u16 = 3;
const HOST_NTFS: u16 = 10;
const METHOD_DEFLATE: u16 = 8;

const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const FLAG_UTF8: u16 = 0x0800;

const EXTRA_ZIP64: u16 = 0x0001;
const EXTRA_NTFS: u16 = 0x000a;
const EXTRA_UNIX: u16 = 0x000d;

pub(crate) const LOCAL_HEADER_LEN: usize = 30;
pub(crate) const CENTRAL_HEADER_LEN: usize = 46;
pub(crate) const END_RECORD_LEN: usize = 22;
pub(crate) const ZIP64_END_RECORD_LEN: usize = 56;
pub(crate) const ZIP64_LOCATOR_LEN: usize = 20;

/// True when a size or offset does not fit its four byte field
pub(crate) fn needs_zip64(value: u64) -> bool {
    value >= MAX32
}

fn saturate32(value: u64) -> u32 {
    if needs_zip64(value) {
        MAX32 as u32
    } else {
        value as u32
    }
}

fn saturate16(value: u64) -> u16 {
    if value >= MAX16 {
        MAX16 as u16
    } else {
        value as u16
    }
}

impl ZipEntry {
    /// Whether any of the central header fields overflows 32 bits. Drives
    /// both the Zip64 extra field and the data descriptor width.
    pub(crate) fn needs_zip64(&self) -> bool {
        needs_zip64(self.uncompressed_size)
            || needs_zip64(self.compressed_size)
            || needs_zip64(self.offset)
    }
}

/// General purpose flags: UTF-8 names, data descriptor, and the deflate
/// level hint in bits 1-2.
pub(crate) fn general_purpose_flags(level: CompressionLevel) -> u16 {
    let hint: u16 = match level.get() {
        8 | 9 => 0b01, // maximum
        1 => 0b10,     // fast
        0 => 0b11,     // super fast
        _ => 0b00,     // normal
    };
    FLAG_UTF8 | FLAG_DATA_DESCRIPTOR | (hint << 1)
}

/// DOS (time, date) for a Unix time in the local time zone
///
/// DOS times only have even seconds, so the time is rounded up. Times before
/// 1980 become midnight on January 1, 1980 and times past 2107 the last
/// representable second. A time that cannot be converted is replaced by the
/// current time.
pub(crate) fn dos_datetime(unix_time: i64) -> (u16, u16) {
    let local = unix_time
        .checked_add(unix_time & 1)
        .and_then(|t| Local.timestamp_opt(t, 0).earliest())
        .unwrap_or_else(now_rounded);

    let year = local.year();
    if year < 1980 {
        return (0, (1 << 5) | 1);
    }
    if year > 2107 {
        return ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);
    }

    let time = (local.hour() << 11) | (local.minute() << 5) | (local.second() >> 1);
    let date = (((year - 1980) as u32) << 9) | (local.month() << 5) | local.day();
    (time as u16, date as u16)
}

fn now_rounded() -> DateTime<Local> {
    let now = Local::now().timestamp();
    Local
        .timestamp_opt(now + (now & 1), 0)
        .earliest()
        .unwrap_or_else(Local::now)
}

/// Timestamp (and for Unix nothing else) extra field for the entry's OS
pub(crate) fn os_extra_field(attrs: &EntryAttrs) -> Vec<u8> {
    let mut extra = Vec::with_capacity(36);
    match attrs {
        EntryAttrs::Unix(unix) => {
            extra.extend_from_slice(&EXTRA_UNIX.to_le_bytes());
            extra.extend_from_slice(&8u16.to_le_bytes());
            extra.extend_from_slice(&unix.atime().to_le_bytes());
            extra.extend_from_slice(&unix.mtime().to_le_bytes());
        }
        EntryAttrs::Windows(win) => {
            extra.extend_from_slice(&EXTRA_NTFS.to_le_bytes());
            extra.extend_from_slice(&32u16.to_le_bytes());
            extra.extend_from_slice(&0u32.to_le_bytes()); // reserved
            extra.extend_from_slice(&1u16.to_le_bytes()); // attribute tag: times
            extra.extend_from_slice(&24u16.to_le_bytes());
            extra.extend_from_slice(&win.mtime().to_le_bytes());
            extra.extend_from_slice(&win.atime().to_le_bytes());
            extra.extend_from_slice(&win.ctime().to_le_bytes());
        }
    }
    extra
}

/// Zip64 extended information field holding only the overflowing fields,
/// in the fixed order uncompressed, compressed, offset. Empty when nothing
/// overflows.
pub(crate) fn zip64_extra_field(entry: &ZipEntry) -> Vec<u8> {
    let mut data: Vec<u8> = Vec::with_capacity(24);
    if needs_zip64(entry.uncompressed_size) {
        data.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
    }
    if needs_zip64(entry.compressed_size) {
        data.extend_from_slice(&entry.compressed_size.to_le_bytes());
    }
    if needs_zip64(entry.offset) {
        data.extend_from_slice(&entry.offset.to_le_bytes());
    }
    if data.is_empty() {
        return data;
    }

    let mut extra_field = Vec::with_capacity(4 + data.len());
    extra_field.extend_from_slice(&EXTRA_ZIP64.to_le_bytes());
    extra_field.extend_from_slice(&(data.len() as u16).to_le_bytes());
    extra_field.extend_from_slice(&data);
    extra_field
}

/// Local file header. CRC and sizes are zero; the data descriptor after the
/// entry data carries them.
pub(crate) fn local_header(entry: &ZipEntry) -> Vec<u8> {
    let extra = os_extra_field(&entry.attrs);
    let (time, date) = dos_datetime(entry.attrs.mtime_unix());
    let version = if needs_zip64(entry.offset) {
        VERSION_ZIP64
    } else {
        VERSION_DEFAULT
    };

    let mut out = Vec::with_capacity(LOCAL_HEADER_LEN + entry.name.len() + extra.len());
    out.extend_from_slice(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&general_purpose_flags(entry.level).to_le_bytes());
    out.extend_from_slice(&METHOD_DEFLATE.to_le_bytes());
    out.extend_from_slice(&time.to_le_bytes());
    out.extend_from_slice(&date.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // crc32 (in descriptor)
    out.extend_from_slice(&0u32.to_le_bytes()); // compressed size (in descriptor)
    out.extend_from_slice(&0u32.to_le_bytes()); // uncompressed size (in descriptor)
    out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
    out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
    out.extend_from_slice(&entry.name);
    out.extend_from_slice(&extra);
    out
}

/// Data descriptor following the entry data: 16 bytes, or 24 with 64-bit
/// sizes when the central header for this entry needs Zip64.
pub(crate) fn data_descriptor(entry: &ZipEntry) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
    out.extend_from_slice(&entry.crc32.to_le_bytes());
    if entry.needs_zip64() {
        out.extend_from_slice(&entry.compressed_size.to_le_bytes());
        out.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
    } else {
        out.extend_from_slice(&(entry.compressed_size as u32).to_le_bytes());
        out.extend_from_slice(&(entry.uncompressed_size as u32).to_le_bytes());
    }
    out
}

/// Central directory header with final CRC and sizes
pub(crate) fn central_header(entry: &ZipEntry) -> Vec<u8> {
    let zip64 = zip64_extra_field(entry);
    let extra = os_extra_field(&entry.attrs);
    let (time, date) = dos_datetime(entry.attrs.mtime_unix());
    let version_needed = if zip64.is_empty() {
        VERSION_DEFAULT
    } else {
        VERSION_ZIP64
    };
    let (host, external_attrs) = match &entry.attrs {
        EntryAttrs::Unix(unix) => (HOST_UNIX, unix.mode() << 16),
        EntryAttrs::Windows(win) => (HOST_NTFS, win.attributes()),
    };
    let version_made_by = (host << 8) | VERSION_ZIP64;

    let mut out = Vec::with_capacity(
        CENTRAL_HEADER_LEN + entry.name.len() + zip64.len() + extra.len(),
    );
    out.extend_from_slice(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
    out.extend_from_slice(&version_made_by.to_le_bytes());
    out.extend_from_slice(&version_needed.to_le_bytes());
    out.extend_from_slice(&general_purpose_flags(entry.level).to_le_bytes());
    out.extend_from_slice(&METHOD_DEFLATE.to_le_bytes());
    out.extend_from_slice(&time.to_le_bytes());
    out.extend_from_slice(&date.to_le_bytes());
    out.extend_from_slice(&entry.crc32.to_le_bytes());
    out.extend_from_slice(&saturate32(entry.compressed_size).to_le_bytes());
    out.extend_from_slice(&saturate32(entry.uncompressed_size).to_le_bytes());
    out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
    out.extend_from_slice(&((zip64.len() + extra.len()) as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // file comment len
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
    out.extend_from_slice(&external_attrs.to_le_bytes());
    out.extend_from_slice(&saturate32(entry.offset).to_le_bytes());
    out.extend_from_slice(&entry.name);
    out.extend_from_slice(&zip64);
    out.extend_from_slice(&extra);
    out
}

/// Whether the end of the archive needs the Zip64 end record and locator
pub(crate) fn needs_zip64_end(count: u64, cd_offset: u64, cd_len: u64) -> bool {
    count > MAX16 || needs_zip64(cd_len) || needs_zip64(cd_offset)
}

/// End records for a central directory of `count` entries that starts at
/// `cd_offset` and is `cd_len` bytes long. The Zip64 record, when present,
/// is assumed to start right after the central directory.
pub(crate) fn end_records(count: u64, cd_offset: u64, cd_len: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(ZIP64_END_RECORD_LEN + ZIP64_LOCATOR_LEN + END_RECORD_LEN);

    if needs_zip64_end(count, cd_offset, cd_len) {
        let zip64_end_offset = cd_offset + cd_len;

        out.extend_from_slice(&ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&44u64.to_le_bytes()); // size of the rest of the record
        out.extend_from_slice(&VERSION_ZIP64.to_le_bytes()); // version made by
        out.extend_from_slice(&VERSION_ZIP64.to_le_bytes()); // version needed
        out.extend_from_slice(&0u32.to_le_bytes()); // this disk
        out.extend_from_slice(&0u32.to_le_bytes()); // disk with central directory
        out.extend_from_slice(&count.to_le_bytes()); // entries on this disk
        out.extend_from_slice(&count.to_le_bytes()); // total entries
        out.extend_from_slice(&cd_len.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());

        out.extend_from_slice(&ZIP64_END_LOCATOR_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // disk with zip64 end record
        out.extend_from_slice(&zip64_end_offset.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // total disks
    }

    out.extend_from_slice(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // this disk
    out.extend_from_slice(&0u16.to_le_bytes()); // disk with central directory
    out.extend_from_slice(&saturate16(count).to_le_bytes());
    out.extend_from_slice(&saturate16(count).to_le_bytes());
    out.extend_from_slice(&saturate32(cd_len).to_le_bytes());
    out.extend_from_slice(&saturate32(cd_offset).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment len
    out
}
