// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File editor: classify and rewrite every message of an activity file.
//!
//! Handles:
//! - Rewriting `file_id` and `device_info` identity fields
//! - Extracting the activity timestamp from `file_id.time_created`
//! - Optionally dropping `event` messages
//!
//! Nothing is written to disk here except through [`write_output`].

use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::fit::{self, mesg_num, FitFile};
use crate::models::identity::{manufacturer_name, DeviceIdentity};
use crate::services::classifier::classify;
use crate::services::rewriter::{rewrite, RewriteOutcome, RewritePolicy};
use crate::time_utils::{fit_to_utc, format_utc_rfc3339};

/// `file_id.time_created`
const TIME_CREATED_FIELD: u8 = 4;

/// Suffix for edited copies written next to the source.
pub const MODIFIED_SUFFIX: &str = "_modified";

#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    pub policy: RewritePolicy,
    /// Drop `event` messages (Zwift writes some that Garmin Connect rejects).
    pub strip_events: bool,
}

/// An edited file and what the editor learned about it.
#[derive(Debug, Clone)]
pub struct EditedFile {
    pub file: FitFile,
    pub activity_timestamp: DateTime<Utc>,
    /// Number of messages whose identity was rewritten.
    pub rewritten: usize,
    /// Number of messages dropped by `strip_events`.
    pub dropped: usize,
}

impl EditedFile {
    pub fn to_bytes(&self) -> Vec<u8> {
        fit::encode(&self.file)
    }
}

/// Applies the target identity to whole files.
#[derive(Debug, Clone)]
pub struct FileEditor {
    target: DeviceIdentity,
    options: EditOptions,
}

impl FileEditor {
    pub fn new(target: DeviceIdentity, options: EditOptions) -> Self {
        Self { target, options }
    }

    /// Edit a parsed file. Message order is preserved.
    pub fn edit(&self, file: FitFile) -> Result<EditedFile> {
        let FitFile { header, messages } = file;
        let mut output = Vec::with_capacity(messages.len());
        let mut activity_timestamp = None;
        let mut rewritten = 0;
        let mut dropped = 0;

        for (index, mut message) in messages.into_iter().enumerate() {
            if self.options.strip_events && message.global == mesg_num::EVENT {
                dropped += 1;
                continue;
            }

            if message.global == mesg_num::FILE_ID && activity_timestamp.is_none() {
                let timestamp = read_time_created(&message)?;
                tracing::info!(
                    timestamp = %format_utc_rfc3339(timestamp),
                    "Activity timestamp found"
                );
                activity_timestamp = Some(timestamp);
            }

            let classification = classify(&message)?;
            if classification.is_identity_bearing() {
                let outcome = rewrite(
                    &mut message,
                    &classification,
                    &self.target,
                    &self.options.policy,
                )?;
                let shape = classification.shape.map_or("", |s| s.name());
                match outcome {
                    RewriteOutcome::Rewritten {
                        previous_manufacturer,
                        previous_product,
                        serial_replaced,
                    } => {
                        rewritten += 1;
                        tracing::debug!(
                            record = index,
                            kind = shape,
                            manufacturer = ?previous_manufacturer,
                            manufacturer_name = previous_manufacturer.map_or("blank", manufacturer_name),
                            product = ?previous_product,
                            serial_replaced,
                            "Rewrote device identity"
                        );
                    }
                    RewriteOutcome::Filtered => {
                        tracing::debug!(
                            record = index,
                            kind = shape,
                            manufacturer = ?classification.manufacturer,
                            "Source manufacturer not selected for rewriting"
                        );
                    }
                    RewriteOutcome::Unchanged => {}
                }
            }

            output.push(message);
        }

        let activity_timestamp = activity_timestamp.ok_or_else(|| {
            AppError::MalformedInput("file has no file_id message".to_string())
        })?;

        Ok(EditedFile {
            file: FitFile {
                header,
                messages: output,
            },
            activity_timestamp,
            rewritten,
            dropped,
        })
    }

    /// Decode and edit raw FIT bytes.
    pub fn edit_bytes(&self, bytes: &[u8]) -> Result<EditedFile> {
        self.edit(fit::decode(bytes)?)
    }

    /// Read, decode and edit a file on disk.
    pub fn edit_path(&self, path: &Path) -> Result<EditedFile> {
        let bytes = fs::read(path)?;
        self.edit_bytes(&bytes)
    }
}

/// Read the activity timestamp of a parsed file without editing it.
pub fn activity_timestamp(file: &FitFile) -> Result<DateTime<Utc>> {
    let message = file
        .messages_of(mesg_num::FILE_ID)
        .next()
        .ok_or_else(|| AppError::MalformedInput("file has no file_id message".to_string()))?;
    read_time_created(message)
}

fn read_time_created(message: &fit::Message) -> Result<DateTime<Utc>> {
    let raw = message.read_uint(TIME_CREATED_FIELD)?.ok_or_else(|| {
        AppError::MalformedInput("file_id has no time_created field".to_string())
    })?;
    let seconds = u32::try_from(raw)
        .ok()
        .filter(|&s| s != u32::MAX)
        .ok_or_else(|| AppError::MalformedInput("file_id time_created is invalid".to_string()))?;
    fit_to_utc(seconds)
        .ok_or_else(|| AppError::MalformedInput("file_id time_created out of range".to_string()))
}

/// `ride.fit` -> `ride_modified.fit`, in the same directory.
pub fn modified_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fit".to_string());
    source.with_file_name(format!("{}{}.{}", stem, MODIFIED_SUFFIX, extension))
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// so a reader never sees a partial file.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}
