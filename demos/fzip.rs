//! Zip filter
//!
//! Reads stdin and writes a zip archive with a single entry to stdout. The
//! entry name comes from the command line.
//!
//! Run with:
//! ```
//! some_program | cargo run --example fzip -- output.log > logs.zip
//! ```

use flowzip::{EntryAttrs, StreamingZipWriter};
use std::io::{self, Read};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

const USAGE: &str = "usage:
    fzip name < infile > outfile
    inprog | fzip name | outprog
'name' is the zip file entry name";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 1 {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    }

    match run(&args[0]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fzip: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);

    let mut zip = StreamingZipWriter::from_writer(io::stdout().lock())?;
    zip.start_entry(name, EntryAttrs::unix(0o644, now, now))?;

    let mut stdin = io::stdin().lock();
    let mut buf = vec![0u8; 32 * 1024];
    loop {
        let got = stdin.read(&mut buf)?;
        if got == 0 {
            break;
        }
        zip.write_data(&buf[..got], false)?;
    }
    zip.finish_entry()?;
    let _stdout = zip.finish()?;
    Ok(())
}
