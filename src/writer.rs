//! Forward-only streaming ZIP writer
//!
//! Entries are compressed on the fly and written strictly in order. Sizes
//! and CRCs go into a data descriptor after each entry, and the central
//! directory is written once at the end, so the output never needs to seek.
//! This works with any `Write`: files, pipes, sockets, in-memory buffers.
//!
//! Memory use is two fixed compression chunks plus a small record per
//! entry for the central directory.

use crate::deflate::{CompressionLevel, CompressionSession};
use crate::entry::{entry_name, CurrentEntry, EntryAttrs, Ledger, ZipEntry};
use crate::error::{Result, SZipError};
use crate::feed::FeedState;
use crate::header;
use crate::logger::Logger;
use crate::sink::Output;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Streaming ZIP writer that compresses data on-the-fly
pub struct StreamingZipWriter<W: Write> {
    pub(crate) output: Output<W>,
    pub(crate) entries: Ledger,
    pub(crate) feed: FeedState,
    pub(crate) session: CompressionSession,
    pub(crate) log: Logger,
}

impl StreamingZipWriter<BufWriter<File>> {
    /// Create a new ZIP file with the default compression level
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_compression(path, CompressionLevel::DEFAULT)
    }

    /// Create a new ZIP file with a custom compression level
    pub fn with_compression<P: AsRef<Path>>(path: P, level: CompressionLevel) -> Result<Self> {
        let output = BufWriter::new(File::create(path)?);
        Self::from_writer_with_compression(output, level)
    }
}

impl<W: Write> StreamingZipWriter<W> {
    /// Create a ZIP writer on an arbitrary sink with the default compression level
    pub fn from_writer(writer: W) -> Result<Self> {
        Self::from_writer_with_compression(writer, CompressionLevel::DEFAULT)
    }

    /// Create a ZIP writer on an arbitrary sink with a custom compression level
    ///
    /// The sink only needs `Write`; it is never asked to seek. The archive
    /// offset starts at zero with the first byte handed to the sink.
    pub fn from_writer_with_compression(writer: W, level: CompressionLevel) -> Result<Self> {
        Ok(Self {
            output: Output::new(writer),
            entries: Ledger::new(),
            feed: FeedState::Idle,
            session: CompressionSession::new(level),
            log: Logger::default(),
        })
    }

    /// Route warnings to `handler` instead of the `log` facade
    ///
    /// # Example
    /// ```
    /// use flowzip::StreamingZipWriter;
    /// use std::sync::mpsc;
    ///
    /// let (tx, rx) = mpsc::channel();
    /// let mut writer = StreamingZipWriter::from_writer(Vec::new())?;
    /// writer.set_log_handler(move |msg| {
    ///     let _ = tx.send(msg.to_string());
    /// });
    /// writer.add_path("/no/such/file")?;
    /// assert!(rx.try_recv().unwrap().contains("/no/such/file"));
    /// # Ok::<(), flowzip::SZipError>(())
    /// ```
    pub fn set_log_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.log.set(Box::new(handler));
        self
    }

    /// Go back to reporting warnings through the `log` facade
    pub fn clear_log_handler(&mut self) -> &mut Self {
        self.log.clear();
        self
    }

    /// Change the compression level for the entries that follow
    pub fn set_level(&mut self, level: CompressionLevel) -> Result<()> {
        self.ensure_idle("set_level called while an entry is open")?;
        self.session.set_level(level);
        Ok(())
    }

    /// Current compression level
    pub fn level(&self) -> CompressionLevel {
        self.session.level()
    }

    /// Entries completed so far, in archive order
    pub fn entries(&self) -> &[ZipEntry] {
        self.entries.as_slice()
    }

    /// Bytes handed to the sink so far (the current archive offset)
    pub fn bytes_written(&self) -> u64 {
        self.output.offset()
    }

    /// Whether the sink has failed. Once true, nothing more is written.
    pub fn is_failed(&self) -> bool {
        self.output.is_failed()
    }

    /// Write one entry whose data comes from `reader`
    ///
    /// The reader is consumed in fixed-size chunks. If it fails part way,
    /// the data read so far is still compressed and terminated in the
    /// stream, but the entry is left out of the central directory and a
    /// warning is logged: the archive stays valid and the partial bytes are
    /// simply never referenced.
    pub fn add_reader<N, R>(&mut self, name: N, attrs: EntryAttrs, mut reader: R) -> Result<()>
    where
        N: AsRef<[u8]>,
        R: Read,
    {
        self.ensure_idle("add_reader called while an entry is open")?;
        let name = entry_name(name.as_ref())?;
        if self.output.is_failed() {
            return Err(SZipError::SinkFailed);
        }
        self.stream_entry(name, attrs, &mut reader)
    }

    pub(crate) fn ensure_idle(&self, msg: &'static str) -> Result<()> {
        match self.feed {
            FeedState::Idle => Ok(()),
            _ => Err(SZipError::InvalidState(msg)),
        }
    }

    /// Start bookkeeping for a new entry at the current offset
    pub(crate) fn open_entry(&self, name: Box<[u8]>, attrs: EntryAttrs) -> CurrentEntry {
        CurrentEntry::new(ZipEntry::new(
            name,
            attrs,
            self.session.level(),
            self.output.offset(),
        ))
    }

    /// Local header, compressed body and data descriptor for one reader
    pub(crate) fn stream_entry<R: Read>(
        &mut self,
        name: Box<[u8]>,
        attrs: EntryAttrs,
        reader: &mut R,
    ) -> Result<()> {
        let mut current = self.open_entry(name, attrs);

        let outcome = match self.output.put(&header::local_header(&current.entry)) {
            Ok(()) => self
                .session
                .compress_reader(reader, &mut current.counter, &mut self.output),
            Err(err) => Err(err),
        };
        self.session.reset();
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.report(err)),
        };
        current.counter.add_compressed(outcome.compressed);

        let entry = current.seal();
        if let Err(err) = self.output.put(&header::data_descriptor(&entry)) {
            return Err(self.report(err));
        }

        match outcome.read_error {
            None => self.entries.push(entry),
            Some(e) => self.log.warn(&format!(
                "read error on {}: {} -- entry omitted",
                entry.name_lossy(),
                e
            )),
        }
        Ok(())
    }

    /// Log the sink error behind a failure the first time it surfaces
    pub(crate) fn report(&mut self, err: SZipError) -> SZipError {
        if let Some(e) = self.output.take_error() {
            self.log.warn(&format!("write error: {} -- aborting", e));
        }
        err
    }

    /// Ok while the sink is healthy, `SinkFailed` once it has failed
    pub(crate) fn status(&self) -> Result<()> {
        if self.output.is_failed() {
            Err(SZipError::SinkFailed)
        } else {
            Ok(())
        }
    }

    /// Finish the ZIP archive and return the sink
    ///
    /// An entry still open in push mode is completed first. Then one central
    /// directory header per surviving entry is written, followed by the end
    /// records (with their Zip64 forms when the count or directory position
    /// needs them), and the sink is flushed. If the sink failed at any point
    /// nothing more is written and `SinkFailed` is returned.
    pub fn finish(mut self) -> Result<W> {
        if !matches!(self.feed, FeedState::Idle) && !self.output.is_failed() {
            self.finish_entry()?;
        }
        if self.output.is_failed() {
            return Err(self.report(SZipError::SinkFailed));
        }

        match self.write_directory() {
            Ok(()) => Ok(self.output.into_inner()),
            Err(err) => Err(self.report(err)),
        }
    }

    fn write_directory(&mut self) -> Result<()> {
        let central_dir_offset = self.output.offset();
        for entry in self.entries.as_slice() {
            self.output.put(&header::central_header(entry))?;
        }
        let central_dir_size = self.output.offset() - central_dir_offset;

        self.output.put(&header::end_records(
            self.entries.len() as u64,
            central_dir_offset,
            central_dir_size,
        ))?;
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    struct FailAfter {
        data: Vec<u8>,
        fail_at: usize,
    }

    impl Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let pos = self.data.len();
            if pos >= self.fail_at {
                return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
            }
            let n = buf.len().min(self.fail_at - pos);
            buf[..n].iter_mut().for_each(|b| *b = 0x5a);
            self.data.resize(pos + n, 0x5a);
            Ok(n)
        }
    }

    fn captured(writer: &mut StreamingZipWriter<Vec<u8>>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        writer.set_log_handler(move |msg| sink.lock().unwrap().push(msg.to_string()));
        seen
    }

    fn attrs() -> EntryAttrs {
        EntryAttrs::unix(0o644, 1_600_000_000, 1_600_000_000)
    }

    #[test]
    fn reader_entry_is_recorded() {
        let mut writer = StreamingZipWriter::from_writer(Vec::new()).unwrap();
        writer.add_reader("one.txt", attrs(), &b"first"[..]).unwrap();
        writer.add_reader("two.txt", attrs(), &b"second"[..]).unwrap();

        let entries = writer.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(&*entries[0].name, b"one.txt");
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[0].uncompressed_size, 5);
        assert_eq!(entries[0].crc32, crc32fast::hash(b"first"));
        assert!(entries[1].offset > entries[0].offset);
    }

    #[test]
    fn read_failure_omits_entry_but_keeps_bytes() {
        let mut writer = StreamingZipWriter::from_writer(Vec::new()).unwrap();
        let seen = captured(&mut writer);

        writer.add_reader("ok.txt", attrs(), &b"fine"[..]).unwrap();
        let before = writer.bytes_written();
        let reader = FailAfter {
            data: Vec::new(),
            fail_at: 1000,
        };
        writer.add_reader("broken.bin", attrs(), reader).unwrap();
        assert!(writer.bytes_written() > before);
        assert_eq!(writer.entries().len(), 1);

        let messages = seen.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("broken.bin"));
        assert!(messages[0].contains("entry omitted"));
    }

    #[test]
    fn oversized_name_is_rejected() {
        let mut writer = StreamingZipWriter::from_writer(Vec::new()).unwrap();
        let name = vec![b'n'; 70_000];
        assert!(matches!(
            writer.add_reader(&name, attrs(), &b""[..]),
            Err(SZipError::NameTooLong(70_000))
        ));
        assert_eq!(writer.bytes_written(), 0);
    }

    #[test]
    fn level_change_applies_to_next_entry() {
        let mut writer = StreamingZipWriter::from_writer(Vec::new()).unwrap();
        writer.add_reader("a", attrs(), &b"aaaa"[..]).unwrap();
        writer.set_level(CompressionLevel::BEST).unwrap();
        writer.add_reader("b", attrs(), &b"bbbb"[..]).unwrap();
        assert_eq!(writer.entries()[0].level, CompressionLevel::DEFAULT);
        assert_eq!(writer.entries()[1].level, CompressionLevel::BEST);
        assert_eq!(writer.level(), CompressionLevel::BEST);
    }

    #[test]
    fn pending_entry_error_fails_finish() {
        let mut writer = StreamingZipWriter::from_writer(Vec::new()).unwrap();
        writer.start_entry("pending.bin", attrs()).unwrap();
        writer.write_data(b"partial", false).unwrap();
        // terminate the stream behind the feed's back so completing it fails
        writer
            .session
            .compress(&[], true, &mut writer.output)
            .unwrap();

        assert!(!writer.is_failed());
        assert!(matches!(
            writer.finish(),
            Err(SZipError::InvalidState(_))
        ));
    }

    #[test]
    fn empty_archive_is_just_end_record() {
        let writer = StreamingZipWriter::from_writer(Vec::new()).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), 22);
        assert_eq!(&bytes[..4], &[0x50, 0x4b, 0x05, 0x06]);
    }
}
