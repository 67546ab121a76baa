//! Minimal ZIP reader for checking what the writer produced
//!
//! Finds the end record (and the Zip64 end record through its locator),
//! walks the central directory, and inflates entry data from the local
//! headers. Anything malformed panics, which fails the calling test.

#![allow(dead_code)]

use flate2::read::DeflateDecoder;
use std::io::Read;

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06064b50;
pub const ZIP64_END_LOCATOR_SIGNATURE: u32 = 0x07064b50;

pub fn u16_at(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([buf[pos], buf[pos + 1]])
}

pub fn u32_at(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
}

pub fn u64_at(buf: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap())
}

/// Entry as described by its central directory header
#[derive(Debug, Clone)]
pub struct CentralEntry {
    pub name: Vec<u8>,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub external_attrs: u32,
    pub offset: u64,
    pub extra: Vec<u8>,
}

impl CentralEntry {
    pub fn name_str(&self) -> &str {
        std::str::from_utf8(&self.name).unwrap()
    }

    /// Data of the extra field with the given id, if present
    pub fn extra_field(&self, id: u16) -> Option<&[u8]> {
        find_extra(&self.extra, id)
    }
}

fn find_extra(extra: &[u8], id: u16) -> Option<&[u8]> {
    let mut i = 0usize;
    while i + 4 <= extra.len() {
        let field_id = u16_at(extra, i);
        let len = u16_at(extra, i + 2) as usize;
        assert!(i + 4 + len <= extra.len(), "extra field overruns");
        if field_id == id {
            return Some(&extra[i + 4..i + 4 + len]);
        }
        i += 4 + len;
    }
    None
}

/// End of archive information
#[derive(Debug, Clone, Copy)]
pub struct EndInfo {
    pub count: u64,
    pub cd_offset: u64,
    pub cd_size: u64,
    pub zip64: bool,
}

pub struct Archive<'a> {
    pub bytes: &'a [u8],
    pub end: EndInfo,
    pub entries: Vec<CentralEntry>,
}

impl<'a> Archive<'a> {
    pub fn parse(bytes: &'a [u8]) -> Self {
        let end = read_end(bytes);
        let entries = read_central_directory(bytes, &end);
        Archive {
            bytes,
            end,
            entries,
        }
    }

    pub fn find(&self, name: &str) -> Option<&CentralEntry> {
        self.entries.iter().find(|e| e.name == name.as_bytes())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| String::from_utf8_lossy(&e.name).into_owned())
            .collect()
    }

    /// Inflate an entry and check its CRC and data descriptor
    pub fn read(&self, entry: &CentralEntry) -> Vec<u8> {
        let bytes = self.bytes;
        let start = entry.offset as usize;
        assert_eq!(u32_at(bytes, start), LOCAL_FILE_HEADER_SIGNATURE);
        assert_eq!(u16_at(bytes, start + 6), entry.flags, "local/central flags differ");
        assert_eq!(u16_at(bytes, start + 8), 8, "method must be deflate");
        let name_len = u16_at(bytes, start + 26) as usize;
        let extra_len = u16_at(bytes, start + 28) as usize;
        assert_eq!(&bytes[start + 30..start + 30 + name_len], &entry.name[..]);

        let data_start = start + 30 + name_len + extra_len;
        let data_end = data_start + entry.compressed_size as usize;
        let mut decoded = Vec::new();
        DeflateDecoder::new(&bytes[data_start..data_end])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded.len() as u64, entry.uncompressed_size);
        assert_eq!(crc32fast::hash(&decoded), entry.crc32);

        let desc = data_end;
        assert_eq!(u32_at(bytes, desc), DATA_DESCRIPTOR_SIGNATURE);
        assert_eq!(u32_at(bytes, desc + 4), entry.crc32);
        if entry.extra_field(0x0001).is_some() {
            assert_eq!(u64_at(bytes, desc + 8), entry.compressed_size);
            assert_eq!(u64_at(bytes, desc + 16), entry.uncompressed_size);
        } else {
            assert_eq!(u32_at(bytes, desc + 8) as u64, entry.compressed_size);
            assert_eq!(u32_at(bytes, desc + 12) as u64, entry.uncompressed_size);
        }
        decoded
    }

    pub fn read_by_name(&self, name: &str) -> Vec<u8> {
        let entry = self
            .find(name)
            .unwrap_or_else(|| panic!("entry {} not found", name));
        self.read(entry)
    }
}

fn read_end(bytes: &[u8]) -> EndInfo {
    assert!(bytes.len() >= 22, "archive too short");
    let eocd = bytes.len() - 22;
    assert_eq!(u32_at(bytes, eocd), END_OF_CENTRAL_DIRECTORY_SIGNATURE);
    assert_eq!(u16_at(bytes, eocd + 20), 0, "no archive comment expected");

    let count16 = u16_at(bytes, eocd + 10);
    let size32 = u32_at(bytes, eocd + 12);
    let offset32 = u32_at(bytes, eocd + 16);

    let has_locator = eocd >= 20 && u32_at(bytes, eocd - 20) == ZIP64_END_LOCATOR_SIGNATURE;
    if !has_locator {
        return EndInfo {
            count: count16 as u64,
            cd_offset: offset32 as u64,
            cd_size: size32 as u64,
            zip64: false,
        };
    }

    let locator = eocd - 20;
    let record = u64_at(bytes, locator + 8) as usize;
    assert_eq!(record, locator - 56, "zip64 end record must precede its locator");
    assert_eq!(u32_at(bytes, record), ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE);
    assert_eq!(u64_at(bytes, record + 4), 44);
    let count = u64_at(bytes, record + 32);
    assert_eq!(u64_at(bytes, record + 24), count);
    EndInfo {
        count,
        cd_size: u64_at(bytes, record + 40),
        cd_offset: u64_at(bytes, record + 48),
        zip64: true,
    }
}

fn read_central_directory(bytes: &[u8], end: &EndInfo) -> Vec<CentralEntry> {
    let mut pos = end.cd_offset as usize;
    let mut entries = Vec::with_capacity(end.count as usize);
    for _ in 0..end.count {
        assert_eq!(u32_at(bytes, pos), CENTRAL_DIRECTORY_SIGNATURE);
        let compressed32 = u32_at(bytes, pos + 20);
        let uncompressed32 = u32_at(bytes, pos + 24);
        let name_len = u16_at(bytes, pos + 28) as usize;
        let extra_len = u16_at(bytes, pos + 30) as usize;
        let comment_len = u16_at(bytes, pos + 32) as usize;
        let offset32 = u32_at(bytes, pos + 42);

        let name = bytes[pos + 46..pos + 46 + name_len].to_vec();
        let extra_start = pos + 46 + name_len;
        let extra = bytes[extra_start..extra_start + extra_len].to_vec();

        let mut uncompressed_size = uncompressed32 as u64;
        let mut compressed_size = compressed32 as u64;
        let mut offset = offset32 as u64;
        if let Some(zip64) = find_extra(&extra, 0x0001) {
            let mut cursor = 0usize;
            if uncompressed32 == u32::MAX {
                uncompressed_size = u64_at(zip64, cursor);
                cursor += 8;
            }
            if compressed32 == u32::MAX {
                compressed_size = u64_at(zip64, cursor);
                cursor += 8;
            }
            if offset32 == u32::MAX {
                offset = u64_at(zip64, cursor);
                cursor += 8;
            }
            assert_eq!(cursor, zip64.len(), "zip64 extra must hold only overflowed fields");
        }

        entries.push(CentralEntry {
            name,
            version_made_by: u16_at(bytes, pos + 4),
            version_needed: u16_at(bytes, pos + 6),
            flags: u16_at(bytes, pos + 8),
            method: u16_at(bytes, pos + 10),
            crc32: u32_at(bytes, pos + 16),
            compressed_size,
            uncompressed_size,
            external_attrs: u32_at(bytes, pos + 38),
            offset,
            extra,
        });
        pos = extra_start + extra_len + comment_len;
    }
    assert_eq!(
        pos as u64,
        end.cd_offset + end.cd_size,
        "central directory size mismatch"
    );
    entries
}
