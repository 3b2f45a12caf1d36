//! Accumulating NDJSON sink
//!
//! Each accepted record is serialized on a single line and appended with one
//! `write_all` under a lock, then flushed. A reader scanning the file line by
//! line can parse every complete line independently, and a crash can at worst
//! leave one torn trailing line behind.

use crate::output::traits::{OutputError, OutputResult, RecordSink};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Append-only sink writing one JSON record per line
#[derive(Debug)]
pub struct NdjsonSink {
    path: PathBuf,
    file: Mutex<Option<OpenFile>>,
    written: AtomicU64,
}

#[derive(Debug)]
struct OpenFile {
    file: File,
    /// A failed write may have left a partial line at the end of the file
    torn: bool,
}

impl NdjsonSink {
    /// Opens or creates `path` in append mode
    ///
    /// If the existing file ends without a newline (the previous process died
    /// mid-write), a newline is appended first so the torn line cannot absorb
    /// the next record.
    pub fn open(path: &Path) -> OutputResult<Self> {
        let needs_newline = has_torn_tail(path)?;

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        if needs_newline {
            tracing::warn!(
                "{} ends with an incomplete line, terminating it before appending",
                path.display()
            );
            file.write_all(b"\n")?;
            file.flush()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(OpenFile { file, torn: false })),
            written: AtomicU64::new(0),
        })
    }
}

impl RecordSink for NdjsonSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &Value) -> OutputResult<()> {
        // Compact serialization escapes embedded newlines, so this is one line
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut guard = self
            .file
            .lock()
            .map_err(|_| OutputError::Write("sink lock poisoned".to_string()))?;
        let open = guard
            .as_mut()
            .ok_or_else(|| OutputError::Closed(self.path.clone()))?;

        append_line(&mut open.file, &mut open.torn, &line)?;
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    fn close(&self) -> OutputResult<u64> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| OutputError::Write("sink lock poisoned".to_string()))?;

        if let Some(open) = guard.take() {
            open.file.sync_all()?;
            tracing::debug!("Closed {}", self.path.display());
        }

        Ok(self.written())
    }
}

/// Appends one complete line to `out`
///
/// A failure partway through leaves `torn` set, and the next call terminates
/// the partial line before writing, so the new record starts on a line of
/// its own.
fn append_line<W: Write>(out: &mut W, torn: &mut bool, line: &[u8]) -> std::io::Result<()> {
    if *torn {
        out.write_all(b"\n")?;
        *torn = false;
    }

    if let Err(e) = out.write_all(line).and_then(|()| out.flush()) {
        *torn = true;
        return Err(e);
    }
    Ok(())
}

/// Returns true if `path` exists, is non-empty, and does not end with `\n`
fn has_torn_tail(path: &Path) -> OutputResult<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if file.metadata()?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Visits every non-blank line of an NDJSON file
///
/// The visitor receives the 1-based line number and either the parsed record
/// or the parse error for that line. A missing file visits nothing.
pub fn scan_records(
    path: &Path,
    mut visit: impl FnMut(usize, Result<Value, serde_json::Error>),
) -> OutputResult<()> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        // Tolerate CRLF and blank lines; bytes that are not UTF-8 fail in serde_json
        let line = trim_ascii(&buf);
        if line.is_empty() {
            continue;
        }

        visit(line_no, serde_json::from_slice(line));
    }

    Ok(())
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
