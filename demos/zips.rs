//! Streaming zipper
//!
//! Writes a zip archive to stdout holding the files named on the command
//! line and every file below the directories named there. Symbolic links are
//! followed; devices, pipes and sockets are skipped with a warning.
//!
//! Run with:
//! ```
//! cargo run --example zips -- src Cargo.toml > out.zip
//! ```

use flowzip::{CompressionLevel, StreamingZipWriter};
use std::io::{self, BufWriter};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let stdout = BufWriter::new(io::stdout().lock());
    let mut zip = match StreamingZipWriter::from_writer(stdout) {
        Ok(zip) => zip,
        Err(e) => {
            eprintln!("zips: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for path in std::env::args_os().skip(1) {
        if zip.set_level(CompressionLevel::DEFAULT).is_err() {
            break;
        }
        if zip.add_path(&path).is_err() {
            break;
        }
    }

    match zip.finish() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zips: {}", e);
            ExitCode::FAILURE
        }
    }
}
