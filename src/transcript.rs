// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Append-only JSONL transcript log.
//!
//! One [`TranscriptRecord`] per finished session, one JSON object per line.
//! Appends from concurrent sessions are serialised through a mutex and each
//! record goes out in a single `write_all`, so lines never interleave. The log
//! rotates to `<path>.1` once it passes the configured size, the same way the
//! alert JSONL log does.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persisted summary of one session: who connected and everything they typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    /// Session start, seconds since the Unix epoch
    pub timestamp: f64,
    pub source_ip: String,
    pub username: String,
    pub password: String,
    pub commands: Vec<String>,
}

/// Durable sink for transcript records. Shared across sessions via `Arc`.
pub struct TranscriptLogger {
    path: PathBuf,
    max_bytes: u64,
    write_lock: Mutex<()>,
}

impl TranscriptLogger {
    /// `max_bytes == 0` disables rotation.
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line. Creates the parent directory if needed.
    pub fn append(&self, record: &TranscriptRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)
            .context("Failed to serialize transcript record")?;
        line.push('\n');

        let _guard = self.write_lock.lock()
            .map_err(|_| anyhow::anyhow!("transcript log lock poisoned"))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
        }

        self.rotate_if_needed()?;

        let mut file = std::fs::OpenOptions::new()
            .create(true).append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open transcript log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to write transcript log {}", self.path.display()))?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Ok(());
        }
        if let Ok(meta) = std::fs::metadata(&self.path) {
            if meta.len() > self.max_bytes {
                let rotated = rotated_path(&self.path);
                std::fs::rename(&self.path, &rotated)
                    .with_context(|| format!("Failed to rotate {} to {}", self.path.display(), rotated.display()))?;
                tracing::info!("Rotated transcript log to {}", rotated.display());
            }
        }
        Ok(())
    }
}

fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

/// Read every well-formed record from a transcript log, in file order.
/// Lines that fail to parse are skipped with a warning.
pub fn read_records(path: &Path) -> Result<Vec<TranscriptRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open transcript log {}", path.display()))?;
    let mut records = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping malformed record at {}:{}: {}", path.display(), lineno + 1, e),
        }
    }
    Ok(records)
}
