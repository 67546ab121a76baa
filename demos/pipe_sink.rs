//! Example demonstrating a callback sink
//!
//! The archive is handed to a closure block by block, the way it would be
//! passed to a socket, an HTTP response body or an upload API. Nothing is
//! ever rewritten, so each block can be sent as soon as it arrives.
//!
//! Run with:
//! ```
//! cargo run --example pipe_sink
//! ```

use flowzip::{CompressionLevel, EntryAttrs, FnSink, Result, StreamingZipWriter};

fn main() -> Result<()> {
    env_logger::init();

    let mut blocks = 0usize;
    let mut total = 0u64;
    let mut hasher = crc32fast::Hasher::new();

    {
        let sink = FnSink::new(|block: &[u8]| {
            blocks += 1;
            total += block.len() as u64;
            hasher.update(block);
            Ok(())
        });

        let mut zip = StreamingZipWriter::from_writer_with_compression(sink, CompressionLevel::FAST)?;
        zip.set_log_handler(|msg| eprintln!("warning: {}", msg));

        let now = 1_700_000_000;
        zip.start_entry("readme.txt", EntryAttrs::unix(0o644, now, now))?;
        zip.write_data(b"Streamed without ever seeking.\n", true)?;

        zip.start_entry("numbers.csv", EntryAttrs::unix(0o644, now, now))?;
        zip.write_data(b"n,square\n", false)?;
        for n in 0..10_000u64 {
            zip.write_data(format!("{},{}\n", n, n * n).as_bytes(), false)?;
        }
        zip.finish_entry()?;

        for entry in zip.entries() {
            println!(
                "{:<12} {:>8} -> {:>7} bytes at offset {}",
                entry.name_lossy(),
                entry.uncompressed_size,
                entry.compressed_size,
                entry.offset
            );
        }
        zip.finish()?;
    }

    println!(
        "✓ Sent {} bytes in {} blocks (crc32 of stream {:08x})",
        total,
        blocks,
        hasher.finalize()
    );
    Ok(())
}
