//! Reusable raw DEFLATE session shared by every entry of an archive
//!
//! The engine is created once and reset between entries. Data moves
//! through two fixed-size chunk buffers, and compressed output is handed to
//! the sink as soon as each chunk is produced, so memory use stays constant
//! no matter how large the entries are.

use crate::entry::CrcCounter;
use crate::error::{Result, SZipError};
use crate::sink::Output;
use flate2::{Compress, Compression, FlushCompress, Status};
use std::io::{self, Read, Write};

/// Size of the input and output chunk buffers
pub(crate) const CHUNK: usize = 256 * 1024;

/// DEFLATE compression level, -1 (library default) or 0 through 9
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressionLevel(i32);

impl CompressionLevel {
    /// Library default, the same as level 6
    pub const DEFAULT: Self = Self(-1);
    /// Stored DEFLATE blocks, no compression
    pub const NONE: Self = Self(0);
    pub const FAST: Self = Self(1);
    pub const BEST: Self = Self(9);

    /// Validate a level. Anything outside -1..=9 is rejected.
    pub fn new(level: i32) -> Result<Self> {
        if (-1..=9).contains(&level) {
            Ok(Self(level))
        } else {
            Err(SZipError::InvalidLevel(level))
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }

    fn to_compression(self) -> Compression {
        match self.0 {
            -1 => Compression::default(),
            level => Compression::new(level as u32),
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i32> for CompressionLevel {
    type Error = SZipError;

    fn try_from(level: i32) -> Result<Self> {
        Self::new(level)
    }
}

/// Result of streaming one reader through the session
pub(crate) struct ReadOutcome {
    /// Compressed bytes written to the sink
    pub(crate) compressed: u64,
    /// Error that cut the input short, if any. The data read before it was
    /// still compressed and the stream was properly finished.
    pub(crate) read_error: Option<io::Error>,
}

pub(crate) struct CompressionSession {
    engine: Compress,
    level: CompressionLevel,
    input: Box<[u8]>,
    output: Box<[u8]>,
    finished: bool,
}

impl CompressionSession {
    pub(crate) fn new(level: CompressionLevel) -> Self {
        Self {
            engine: Compress::new(level.to_compression(), false),
            level,
            input: vec![0u8; CHUNK].into_boxed_slice(),
            output: vec![0u8; CHUNK].into_boxed_slice(),
            finished: false,
        }
    }

    pub(crate) fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Switch to a new level for the next entry
    pub(crate) fn set_level(&mut self, level: CompressionLevel) {
        if level != self.level {
            self.engine = Compress::new(level.to_compression(), false);
            self.level = level;
        } else {
            self.engine.reset();
        }
        self.finished = false;
    }

    /// Prepare the engine for the next entry without reallocating
    pub(crate) fn reset(&mut self) {
        self.engine.reset();
        self.finished = false;
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Compress `data`, writing produced output to `out`. With `finish` the
    /// DEFLATE stream is terminated. Returns the number of compressed bytes
    /// written.
    pub(crate) fn compress<W: Write>(
        &mut self,
        data: &[u8],
        finish: bool,
        out: &mut Output<W>,
    ) -> Result<u64> {
        if self.finished {
            return Err(SZipError::InvalidState(
                "compression session already finished, reset it first",
            ));
        }
        if data.is_empty() && !finish {
            return Ok(0);
        }
        let (produced, ended) = pump(&mut self.engine, &mut self.output, data, finish, out)?;
        self.finished = ended;
        Ok(produced)
    }

    /// Pull `reader` through the engine chunk by chunk until end of input or
    /// a read error, then finish the stream. CRC and uncompressed size are
    /// taken before compression.
    pub(crate) fn compress_reader<R: Read, W: Write>(
        &mut self,
        reader: &mut R,
        counter: &mut CrcCounter,
        out: &mut Output<W>,
    ) -> Result<ReadOutcome> {
        if self.finished {
            return Err(SZipError::InvalidState(
                "compression session already finished, reset it first",
            ));
        }
        let mut compressed = 0u64;
        loop {
            let (filled, eof, read_error) = fill(reader, &mut self.input);
            let chunk = &self.input[..filled];
            counter.update_uncompressed(chunk);

            let (produced, ended) = pump(&mut self.engine, &mut self.output, chunk, eof, out)?;
            compressed += produced;

            if eof {
                self.finished = ended;
                return Ok(ReadOutcome {
                    compressed,
                    read_error,
                });
            }
        }
    }
}

/// Read until `buf` is full, input ends, or a read fails
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> (usize, bool, Option<io::Error>) {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return (filled, true, None),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (filled, true, Some(e)),
        }
    }
    (filled, false, None)
}

/// Run the engine over `input` until it is consumed (and, with `finish`,
/// until the stream end marker is out), handing each produced chunk to the
/// sink. Returns bytes produced and whether the stream ended.
fn pump<W: Write>(
    engine: &mut Compress,
    chunk: &mut [u8],
    mut input: &[u8],
    finish: bool,
    out: &mut Output<W>,
) -> Result<(u64, bool)> {
    let flush = if finish {
        FlushCompress::Finish
    } else {
        FlushCompress::None
    };
    let mut produced = 0u64;

    loop {
        let before_in = engine.total_in();
        let before_out = engine.total_out();
        let status = engine.compress(input, chunk, flush)?;
        let consumed = (engine.total_in() - before_in) as usize;
        let written = (engine.total_out() - before_out) as usize;

        input = &input[consumed..];
        if written > 0 {
            out.put(&chunk[..written])?;
            produced += written as u64;
        }

        match status {
            Status::StreamEnd => return Ok((produced, true)),
            Status::BufError if consumed == 0 && written == 0 => {
                if !finish && input.is_empty() {
                    return Ok((produced, false));
                }
                return Err(SZipError::Compression(
                    "deflate made no progress".to_string(),
                ));
            }
            _ => {}
        }

        // Without finish, stop once the input is gone and the engine had
        // nothing more to hand out.
        if !finish && input.is_empty() && written < chunk.len() {
            return Ok((produced, false));
        }
    }
}
