// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted set of file keys that were already uploaded.
//!
//! Stored as a pretty-printed JSON array of strings. Every mutation is
//! written to a temporary file in the same directory and renamed over the
//! ledger, so readers never see a torn file. Before writing, the on-disk
//! content is merged in, so keys recorded by a concurrent run survive.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Ledger file name inside a processed directory.
pub const LEDGER_FILE_NAME: &str = ".uploaded_files.json";

/// How a file's ledger key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// File name without directory.
    #[default]
    FileName,
    /// SHA-256 of the file contents.
    ContentHash,
}

impl FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "filename" => Ok(KeyStrategy::FileName),
            "hash" | "sha256" => Ok(KeyStrategy::ContentHash),
            other => Err(format!("unknown ledger key strategy '{}'", other)),
        }
    }
}

impl KeyStrategy {
    pub fn key_for(self, path: &Path) -> Result<String> {
        match self {
            KeyStrategy::FileName => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    AppError::MalformedInput(format!("{} has no file name", path.display()))
                }),
            KeyStrategy::ContentHash => {
                let bytes = fs::read(path)?;
                Ok(format!("sha256:{}", hex::encode(Sha256::digest(&bytes))))
            }
        }
    }
}

/// The upload ledger for one directory.
#[derive(Debug)]
pub struct UploadLedger {
    path: PathBuf,
    keys: Vec<String>,
    index: HashSet<String>,
}

impl UploadLedger {
    /// Open the ledger at `path`, creating an empty one if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut ledger = Self {
            path,
            keys: Vec::new(),
            index: HashSet::new(),
        };
        if ledger.path.exists() {
            ledger.reload()?;
        } else {
            tracing::info!(path = %ledger.path.display(), "Creating empty upload ledger");
            ledger.flush()?;
        }
        Ok(ledger)
    }

    /// Open the ledger stored in `dir`.
    pub fn for_directory(dir: &Path) -> Result<Self> {
        Self::open(dir.join(LEDGER_FILE_NAME))
    }

    /// Read the ledger at `path` without creating it. A missing file reads
    /// as empty and stays missing until the first key is recorded.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let mut ledger = Self {
            path: path.into(),
            keys: Vec::new(),
            index: HashSet::new(),
        };
        ledger.reload()?;
        Ok(ledger)
    }

    /// Read the ledger stored in `dir` without creating it.
    pub fn load_directory(dir: &Path) -> Result<Self> {
        Self::load(dir.join(LEDGER_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace in-memory state with what is on disk. A missing file is empty.
    pub fn reload(&mut self) -> Result<()> {
        let keys = read_keys(&self.path)?;
        self.keys.clear();
        self.index.clear();
        self.extend(keys);
        tracing::debug!(
            path = %self.path.display(),
            count = self.keys.len(),
            "Loaded upload ledger"
        );
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Record one key. Returns `false` if it was already present.
    pub fn add(&mut self, key: &str) -> Result<bool> {
        if self.contains(key) {
            return Ok(false);
        }
        self.merge_from_disk()?;
        if self.contains(key) {
            return Ok(false);
        }
        self.extend([key.to_string()]);
        self.flush()?;
        tracing::debug!(key, "Recorded upload in ledger");
        Ok(true)
    }

    /// Record many keys at once without uploading anything. Returns the
    /// number of keys that were new.
    pub fn seed_all<I, S>(&mut self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merge_from_disk()?;
        let added = self.extend(keys.into_iter().map(Into::into));
        if added > 0 {
            self.flush()?;
        }
        tracing::info!(added, total = self.keys.len(), "Seeded upload ledger");
        Ok(added)
    }

    /// Discard every entry and store exactly `keys`.
    pub fn reset<I, S>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.clear();
        self.index.clear();
        self.extend(keys.into_iter().map(Into::into));
        self.flush()?;
        tracing::info!(total = self.keys.len(), "Reset upload ledger");
        Ok(())
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn extend(&mut self, keys: impl IntoIterator<Item = String>) -> usize {
        let mut added = 0;
        for key in keys {
            if self.index.insert(key.clone()) {
                self.keys.push(key);
                added += 1;
            }
        }
        added
    }

    fn merge_from_disk(&mut self) -> Result<()> {
        let on_disk = read_keys(&self.path)?;
        self.extend(on_disk);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let ledger_err = |e: std::io::Error| {
            AppError::Ledger(format!("failed to write {}: {}", self.path.display(), e))
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(ledger_err)?;
        serde_json::to_writer_pretty(&mut tmp, &self.keys)
            .map_err(|e| AppError::Ledger(e.to_string()))?;
        tmp.write_all(b"\n").map_err(ledger_err)?;
        tmp.as_file().sync_all().map_err(ledger_err)?;
        tmp.persist(&self.path).map_err(|e| ledger_err(e.error))?;
        Ok(())
    }
}

fn read_keys(path: &Path) -> Result<Vec<String>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AppError::Ledger(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&data)
        .map_err(|e| AppError::Ledger(format!("failed to parse {}: {}", path.display(), e)))
}
