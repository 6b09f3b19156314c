//! Durable file operations
//!
//! Two write paths back the file store:
//!
//! 1. `append_line_synced`: append one line and fsync before returning,
//!    so a put or delete is durable once the call succeeds.
//! 2. `atomic_write_with`: write a temp file, fsync it, then rename it over
//!    the destination. The destination is always either the old or the new
//!    version, never a partial one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

/// Result type for atomic operations
pub type AtomicResult<T> = Result<T, AtomicError>;

/// Errors that can occur during atomic operations
#[derive(Error, Debug)]
pub enum AtomicError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Line contains a newline and would corrupt the log")]
    EmbeddedNewline,
}

/// Append a single line to `path` and sync it to disk
///
/// The parent directory is created if needed. `line` must not contain
/// a newline; the terminator is added here. If the write or the sync
/// fails, the file is truncated back to its previous length.
pub fn append_line_synced<P: AsRef<Path>>(path: P, line: &str) -> AtomicResult<()> {
    if line.contains('\n') {
        return Err(AtomicError::EmbeddedNewline);
    }

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let prev_len = file.metadata()?.len();

    // One write call per record keeps a torn write confined to the last line
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');

    if let Err(e) = file.write_all(buf.as_bytes()).and_then(|_| file.sync_all()) {
        // Best effort; the caller also rewrites the log before its next append
        let _ = file.set_len(prev_len).and_then(|_| file.sync_all());
        return Err(e.into());
    }

    Ok(())
}

/// Atomically write content using a writer function
///
/// # Example
///
/// ```ignore
/// atomic_write_with("data/outbox.jsonl", |file| {
///     writeln!(file, "line1")?;
///     Ok(())
/// })?;
/// ```
pub fn atomic_write_with<P, F>(path: P, write_fn: F) -> AtomicResult<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(&temp_path)?;
    write_fn(&mut file)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Remove the temp file `atomic_write_with` leaves behind for `path`
/// when a rewrite is interrupted
///
/// Other files in the directory are never touched. Returns whether a
/// file was removed.
pub fn cleanup_temp_file<P: AsRef<Path>>(path: P) -> AtomicResult<bool> {
    let temp_path = path.as_ref().with_extension("tmp");

    match fs::remove_file(&temp_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
