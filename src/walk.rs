//! Path mode: zip a file, or every regular file below a directory
//!
//! Directories are walked with `walkdir`, following symbolic links. Objects
//! that cannot be read, or are neither files nor directories, are logged
//! and skipped; only a sink failure stops the walk.

use crate::entry::{EntryAttrs, MAX_NAME_LEN};
#[cfg(not(windows))]
use crate::entry::UnixAttrs;
#[cfg(windows)]
use crate::entry::WindowsAttrs;
use crate::error::Result;
use crate::writer::StreamingZipWriter;
use std::fs::{File, Metadata};
use std::io::Write;
use std::path::Path;
use walkdir::WalkDir;

impl<W: Write> StreamingZipWriter<W> {
    /// Add the file at `path`, or all files below it if it is a directory
    ///
    /// Entry names are the paths as found, with `/` separators, so
    /// `add_path("docs")` yields entries like `docs/guide/intro.md`. Files
    /// inside a directory are visited in file name order.
    pub fn add_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.ensure_idle("add_path called while an entry is open")?;
        self.status()?;

        let walker = WalkDir::new(path.as_ref())
            .follow_links(true)
            .sort_by_file_name();
        for item in walker {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    let shown = err
                        .path()
                        .unwrap_or_else(|| path.as_ref())
                        .display()
                        .to_string();
                    let reason = err
                        .io_error()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| err.to_string());
                    self.log
                        .warn(&format!("could not read {}: {} -- skipping", shown, reason));
                    continue;
                }
            };
            if item.file_type().is_dir() {
                continue;
            }

            let metadata = match item.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    self.log.warn(&format!(
                        "could not stat {}: {} -- skipping",
                        item.path().display(),
                        err
                    ));
                    continue;
                }
            };
            if !metadata.is_file() {
                self.log.warn(&format!(
                    "{} is not a file or directory -- skipping",
                    item.path().display()
                ));
                continue;
            }

            self.add_file(item.path(), &metadata)?;
        }
        self.status()
    }

    fn add_file(&mut self, path: &Path, metadata: &Metadata) -> Result<()> {
        let name = zip_name(path);
        if name.len() > MAX_NAME_LEN {
            self.log.warn(&format!(
                "file name is too long for the zip format -- skipping {}",
                path.display()
            ));
            return Ok(());
        }

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                self.log.warn(&format!(
                    "could not open {} for reading: {} -- skipping",
                    path.display(),
                    err
                ));
                return Ok(());
            }
        };

        self.stream_entry(name.into_boxed_slice(), capture_attrs(metadata), &mut file)
    }
}

/// Entry name for a path: its bytes as given, with `/` separators
#[cfg(unix)]
fn zip_name(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn zip_name(path: &Path) -> Vec<u8> {
    path.to_string_lossy().replace('\\', "/").into_bytes()
}

#[cfg(not(windows))]
fn clamp_secs(secs: i64) -> u32 {
    secs.clamp(0, u32::MAX as i64) as u32
}

#[cfg(unix)]
fn capture_attrs(metadata: &Metadata) -> EntryAttrs {
    use std::os::unix::fs::MetadataExt;
    EntryAttrs::Unix(UnixAttrs::from_stat(
        metadata.mode(),
        clamp_secs(metadata.atime()),
        clamp_secs(metadata.mtime()),
    ))
}

#[cfg(windows)]
fn capture_attrs(metadata: &Metadata) -> EntryAttrs {
    use std::os::windows::fs::MetadataExt;
    EntryAttrs::Windows(WindowsAttrs::new(
        metadata.file_attributes(),
        metadata.creation_time(),
        metadata.last_access_time(),
        metadata.last_write_time(),
    ))
}

#[cfg(not(any(unix, windows)))]
fn capture_attrs(metadata: &Metadata) -> EntryAttrs {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = |time: std::io::Result<SystemTime>| {
        time.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| clamp_secs(d.as_secs() as i64))
    };
    EntryAttrs::Unix(UnixAttrs::from_stat(
        0o100644,
        secs(metadata.accessed()),
        secs(metadata.modified()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn seconds_are_clamped_to_u32() {
        assert_eq!(clamp_secs(-5), 0);
        assert_eq!(clamp_secs(42), 42);
        assert_eq!(clamp_secs(1 << 40), u32::MAX);
    }

    #[cfg(unix)]
    #[test]
    fn names_keep_path_bytes() {
        assert_eq!(zip_name(Path::new("dir/sub/file.txt")), b"dir/sub/file.txt");
    }
}
