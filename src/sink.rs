//! Durable append-only JSONL sink
//!
//! Each output stream (items, users) is one append-only file of one JSON
//! object per line. `append` flushes and fsyncs before returning, so a crash
//! immediately after it returns leaves the record durably visible on the
//! next start. No update or delete operation exists.

use crate::error::Result;
use crate::types::ItemId;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Append-only line-oriented writer for one output stream
///
/// The file handle is exclusively owned by the sink; all writers go through
/// [`append`](JsonlSink::append), which is internally serialized and safe to
/// call from logically concurrent completions.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open (or create) the stream at `path` for appending
    ///
    /// Parent directories are created as needed. An existing file is never
    /// truncated; new records land after whatever previous runs left behind.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one record as one JSON line, durably
    ///
    /// The line is written, flushed, and synced to stable storage before this
    /// returns. Record writes are never interleaved: the file handle is held
    /// under a lock for the whole write.
    pub async fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    /// Path of the underlying stream file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The subset of an item line needed for the resume scan
#[derive(serde::Deserialize)]
struct LineId {
    id: ItemId,
}

/// Find the lowest item ID already persisted in an items stream
///
/// This is the checkpoint contract: traversal resumes strictly below the
/// returned ID. Returns `Ok(None)` if the file does not exist or holds no
/// parsable record. Unparsable lines (e.g. a torn write from a crash that
/// predates the durability guarantee) are skipped with a warning rather
/// than failing the resume.
pub fn scan_last_id(path: &Path) -> Result<Option<ItemId>> {
    if !path.exists() {
        return Ok(None);
    }

    let reader = BufReader::new(File::open(path)?);
    let mut lowest: Option<ItemId> = None;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LineId>(&line) {
            Ok(parsed) => {
                lowest = Some(match lowest {
                    Some(prev) => prev.min(parsed.id),
                    None => parsed.id,
                });
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping unparsable line in existing stream"
                );
            }
        }
    }
    Ok(lowest)
}
