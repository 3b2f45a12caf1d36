//! Batch JSON array sink
//!
//! The destination holds a single JSON array. Existing records are read at
//! open, new records are collected in memory, and `close` rewrites the whole
//! document through a temporary file and an atomic rename. Nothing from the
//! current run is durable until `close` returns.

use crate::output::traits::{OutputError, OutputResult, RecordSink};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Sink that merges records into a JSON array document
#[derive(Debug)]
pub struct JsonArraySink {
    path: PathBuf,
    tmp_path: PathBuf,
    state: Mutex<Option<ArrayState>>,
}

#[derive(Debug)]
struct ArrayState {
    records: Vec<Value>,
    existing: usize,
}

impl JsonArraySink {
    /// Opens `path`, loading any existing array
    ///
    /// Fails if the destination exists but is not a JSON array, rather than
    /// risk replacing it with a document that drops its contents.
    pub fn open(path: &Path) -> OutputResult<Self> {
        let records = read_array(path)?;
        let tmp_path = tmp_path_for(path);

        // Stale temporary from an interrupted close
        if tmp_path.exists() {
            tracing::warn!("Removing stale tmp file: {}", tmp_path.display());
            fs::remove_file(&tmp_path)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            state: Mutex::new(Some(ArrayState {
                existing: records.len(),
                records,
            })),
        })
    }

    fn lock(&self) -> OutputResult<std::sync::MutexGuard<'_, Option<ArrayState>>> {
        self.state
            .lock()
            .map_err(|_| OutputError::Write("sink lock poisoned".to_string()))
    }
}

impl RecordSink for JsonArraySink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &Value) -> OutputResult<()> {
        let mut guard = self.lock()?;
        let state = guard
            .as_mut()
            .ok_or_else(|| OutputError::Closed(self.path.clone()))?;
        state.records.push(record.clone());
        Ok(())
    }

    fn written(&self) -> u64 {
        match self.lock() {
            Ok(guard) => guard
                .as_ref()
                .map_or(0, |state| (state.records.len() - state.existing) as u64),
            Err(_) => 0,
        }
    }

    fn close(&self) -> OutputResult<u64> {
        let mut guard = self.lock()?;
        let Some(state) = guard.take() else {
            return Ok(0);
        };

        let added = (state.records.len() - state.existing) as u64;

        let file = File::create(&self.tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &state.records)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| OutputError::Io(e.into_error()))?
            .sync_all()?;
        fs::rename(&self.tmp_path, &self.path)?;

        tracing::debug!(
            "Wrote {} records ({} new) to {}",
            state.records.len(),
            added,
            self.path.display()
        );
        Ok(added)
    }
}

/// Reads a JSON array document; a missing or empty file is an empty array
pub fn read_array(path: &Path) -> OutputResult<Vec<Value>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }

    match serde_json::from_reader(BufReader::new(file))? {
        Value::Array(records) => Ok(records),
        other => Err(OutputError::Format(format!(
            "{} holds a JSON {}, expected an array",
            path.display(),
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
