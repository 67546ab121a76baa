//! Push mode: the caller supplies an entry's metadata, then its data in
//! chunks of any size
//!
//! ```
//! use flowzip::{EntryAttrs, StreamingZipWriter};
//!
//! let mut writer = StreamingZipWriter::from_writer(Vec::new())?;
//! writer.start_entry("log.txt", EntryAttrs::unix(0o644, 1_700_000_000, 1_700_000_000))?;
//! writer.write_data(b"line 1\n", false)?;
//! writer.write_data(b"line 2\n", true)?;
//! let zip = writer.finish()?;
//! assert!(!zip.is_empty());
//! # Ok::<(), flowzip::SZipError>(())
//! ```

use crate::entry::{entry_name, CurrentEntry, EntryAttrs};
use crate::error::{Result, SZipError};
use crate::header;
use crate::writer::StreamingZipWriter;
use std::io::Write;

/// Where the writer is in the push-mode sequence
pub(crate) enum FeedState {
    /// No entry open
    Idle,
    /// Metadata given, nothing written yet
    MetadataSet(CurrentEntry),
    /// Local header written, data flowing
    Streaming(CurrentEntry),
}

impl<W: Write> StreamingZipWriter<W> {
    /// Start a new entry whose data will follow through [`write_data`]
    ///
    /// Only legal when no entry is open. Nothing is written until the first
    /// chunk arrives. Names longer than 65535 bytes are rejected and leave
    /// the writer unchanged.
    ///
    /// [`write_data`]: StreamingZipWriter::write_data
    pub fn start_entry<N: AsRef<[u8]>>(&mut self, name: N, attrs: EntryAttrs) -> Result<()> {
        self.ensure_idle("start_entry called while an entry is open")?;
        let name = entry_name(name.as_ref())?;
        let current = self.open_entry(name, attrs);
        self.feed = FeedState::MetadataSet(current);
        Ok(())
    }

    /// Compress and write `data` to the open entry; `last` completes it
    ///
    /// The first call writes the local header. A non-last call with no data
    /// does nothing. The last call terminates the compressed stream, writes
    /// the data descriptor and records the entry for the central directory.
    pub fn write_data(&mut self, data: &[u8], last: bool) -> Result<()> {
        let (mut current, header_written) = match std::mem::replace(&mut self.feed, FeedState::Idle)
        {
            FeedState::Idle => {
                return Err(SZipError::InvalidState(
                    "write_data called without start_entry",
                ))
            }
            FeedState::MetadataSet(current) => (current, false),
            FeedState::Streaming(current) => (current, true),
        };

        if self.output.is_failed() || (data.is_empty() && !last) {
            self.feed = if header_written {
                FeedState::Streaming(current)
            } else {
                FeedState::MetadataSet(current)
            };
            return self.status();
        }

        if let Err(err) = self.push_chunk(&mut current, !header_written, data, last) {
            self.session.reset();
            self.feed = FeedState::Streaming(current);
            return Err(self.report(err));
        }
        if !last {
            self.feed = FeedState::Streaming(current);
            return Ok(());
        }

        self.session.reset();
        let entry = current.seal();
        let written = self.output.put(&header::data_descriptor(&entry));
        self.entries.push(entry);
        written.map_err(|err| self.report(err))
    }

    /// Complete the open entry, same as `write_data(&[], true)`
    pub fn finish_entry(&mut self) -> Result<()> {
        self.write_data(&[], true)
    }

    fn push_chunk(
        &mut self,
        current: &mut CurrentEntry,
        write_header: bool,
        data: &[u8],
        last: bool,
    ) -> Result<()> {
        if write_header {
            self.output.put(&header::local_header(&current.entry))?;
        }
        current.counter.update_uncompressed(data);
        let compressed = self.session.compress(data, last, &mut self.output)?;
        current.counter.add_compressed(compressed);
        Ok(())
    }
}
