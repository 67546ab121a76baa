//! # flowzip: Forward-Only Streaming ZIP Writer
//!
//! `flowzip` writes ZIP archives to sinks that cannot seek: pipes, sockets,
//! HTTP bodies, stdout. Every byte is written exactly once, in order. Entry
//! sizes and CRCs follow each entry in a data descriptor, and the central
//! directory is written at the end. Zip64 fields are used per field, only
//! where a size, offset or count actually needs them.
//!
//! ## Features
//!
//! - **Forward-only output**: any `std::io::Write`, never seeks
//! - **Zip64 on demand**: large entries, large archives and more than
//!   65535 entries, without paying for Zip64 when it is not needed
//! - **Constant memory**: one reusable DEFLATE engine with two fixed chunk
//!   buffers, plus a small record per entry
//! - **Two ways in**: zip files and directory trees by path, or push data
//!   for an entry chunk by chunk
//!
//! ## Quick Start
//!
//! ### Zipping files and directories
//!
//! ```no_run
//! use flowzip::StreamingZipWriter;
//!
//! let mut writer = StreamingZipWriter::new("backup.zip")?;
//! writer.add_path("notes.txt")?;
//! writer.add_path("photos")?;
//! writer.finish()?;
//! # Ok::<(), flowzip::SZipError>(())
//! ```
//!
//! ### Pushing entry data
//!
//! ```
//! use flowzip::{CompressionLevel, EntryAttrs, StreamingZipWriter};
//!
//! let mut writer =
//!     StreamingZipWriter::from_writer_with_compression(Vec::new(), CompressionLevel::BEST)?;
//!
//! let now = 1_700_000_000;
//! writer.start_entry("report.csv", EntryAttrs::unix(0o644, now, now))?;
//! writer.write_data(b"id,value\n", false)?;
//! writer.write_data(b"1,42\n", true)?;
//!
//! let zip_bytes = writer.finish()?;
//! println!("Created ZIP with {} bytes", zip_bytes.len());
//! # Ok::<(), flowzip::SZipError>(())
//! ```
//!
//! ### Streaming to stdout
//!
//! ```no_run
//! use flowzip::StreamingZipWriter;
//! use std::io;
//!
//! let mut writer = StreamingZipWriter::from_writer(io::stdout().lock())?;
//! writer.add_path("src")?;
//! let _stdout = writer.finish()?;
//! # Ok::<(), flowzip::SZipError>(())
//! ```
//!
//! ## Errors
//!
//! Problems with individual input files (unreadable, vanished, not a
//! regular file) are logged and the file is skipped. A read error part way
//! through a file leaves its partial data in the stream but out of the
//! central directory, so readers never see it. A failing sink is fatal: the
//! writer stops writing and every later call returns
//! [`SZipError::SinkFailed`].

pub mod deflate;
pub mod entry;
pub mod error;
mod feed;
mod header;
pub mod logger;
pub mod sink;
mod walk;
pub mod writer;

pub use deflate::CompressionLevel;
pub use entry::{EntryAttrs, UnixAttrs, WindowsAttrs, ZipEntry};
pub use error::{Result, SZipError};
pub use logger::LogHandler;
pub use sink::FnSink;
pub use writer::StreamingZipWriter;
