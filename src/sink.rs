//! Output side of the archive
//!
//! Any [`std::io::Write`] can receive the archive; [`FnSink`] adapts a
//! closure for callback-style consumers. Internally every byte goes through
//! [`Output`], which counts the archive offset and turns the first write
//! error into a permanent failure.

use crate::error::{Result, SZipError};
use std::io::{self, Write};

/// Sink that hands every block of archive bytes to a closure
///
/// ```
/// use flowzip::{EntryAttrs, FnSink, StreamingZipWriter};
///
/// let mut sent = 0usize;
/// let sink = FnSink::new(|block: &[u8]| {
///     sent += block.len();
///     Ok(())
/// });
/// let mut writer = StreamingZipWriter::from_writer(sink)?;
/// writer.start_entry("hello.txt", EntryAttrs::unix(0o644, 0, 0))?;
/// writer.write_data(b"hello", true)?;
/// writer.finish()?;
/// # Ok::<(), flowzip::SZipError>(())
/// ```
pub struct FnSink<F> {
    put: F,
}

impl<F> FnSink<F>
where
    F: FnMut(&[u8]) -> io::Result<()>,
{
    pub fn new(put: F) -> Self {
        Self { put }
    }
}

impl<F> Write for FnSink<F>
where
    F: FnMut(&[u8]) -> io::Result<()>,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.put)(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Counting, fail-once wrapper around the sink
pub(crate) struct Output<W: Write> {
    inner: W,
    offset: u64,
    failed: bool,
    error: Option<io::Error>,
}

impl<W: Write> Output<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            offset: 0,
            failed: false,
            error: None,
        }
    }

    /// Write all of `data`. After the first failure nothing reaches the sink
    /// again and every call returns [`SZipError::SinkFailed`].
    pub(crate) fn put(&mut self, data: &[u8]) -> Result<()> {
        if self.failed {
            return Err(SZipError::SinkFailed);
        }
        if data.is_empty() {
            return Ok(());
        }
        match self.inner.write_all(data) {
            Ok(()) => {
                self.offset += data.len() as u64;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Pass the flush hint on to the sink
    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.failed {
            return Err(SZipError::SinkFailed);
        }
        self.inner.flush().map_err(|e| self.fail(e))
    }

    fn fail(&mut self, e: io::Error) -> SZipError {
        self.failed = true;
        self.error = Some(e);
        SZipError::SinkFailed
    }

    /// Bytes successfully written so far, i.e. the current archive offset
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.failed
    }

    /// The error that failed the sink, handed out once for reporting
    pub(crate) fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}
