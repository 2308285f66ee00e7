// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Batch processing: edit and upload every new activity file in a directory.
//!
//! Per file:
//! 1. Compute the ledger key and skip keys already recorded
//! 2. Edit the file in memory
//! 3. Upload it (unless dry run)
//! 4. Record the key in the ledger on success or conflict
//!
//! Per-file failures are reported and the batch continues. Authentication
//! and ledger failures end the run.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{BatchReport, FileOutcome, FileReport};
use crate::services::connect::{Credentials, Session, UploadClient};
use crate::services::editor::{modified_path, write_output, FileEditor, MODIFIED_SUFFIX};
use crate::services::ledger::{KeyStrategy, UploadLedger};

/// File extension of activity files (compared case-insensitively).
pub const ACTIVITY_EXTENSION: &str = "fit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessMode {
    #[default]
    Upload,
    /// Edit only: no upload, no ledger change, no output written.
    DryRun,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub key_strategy: KeyStrategy,
    /// Also write `<stem>_modified.fit` next to each uploaded source.
    pub keep_edited: bool,
}

/// Result of editing a single file from the command line.
#[derive(Debug, Clone)]
pub struct SingleEditReport {
    pub output: Option<PathBuf>,
    pub activity_timestamp: DateTime<Utc>,
    pub rewritten: usize,
    pub upload: Option<FileOutcome>,
}

/// Whether `path` looks like an unedited activity file.
pub fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_ascii_lowercase()) else {
        return false;
    };
    let is_fit = path
        .extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ACTIVITY_EXTENSION));
    let modified = format!("{}.{}", MODIFIED_SUFFIX, ACTIVITY_EXTENSION);
    is_fit && !name.ends_with(&modified)
}

/// Candidate files directly inside `dir`, sorted by file name.
pub fn list_candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_candidate(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Drives editing and uploading for directories and single files.
pub struct BatchProcessor<C> {
    client: C,
    credentials: Credentials,
    editor: FileEditor,
    options: BatchOptions,
    session: Option<Session>,
}

impl<C: UploadClient> BatchProcessor<C> {
    pub fn new(client: C, credentials: Credentials, editor: FileEditor, options: BatchOptions) -> Self {
        Self {
            client,
            credentials,
            editor,
            options,
            session: None,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Process every candidate in `dir` in file-name order.
    pub async fn process_directory(
        &mut self,
        dir: &Path,
        ledger: &mut UploadLedger,
        mode: ProcessMode,
    ) -> Result<BatchReport> {
        ledger.reload()?;
        let files = list_candidates(dir)?;
        tracing::info!(
            dir = %dir.display(),
            candidates = files.len(),
            already_uploaded = ledger.len(),
            "Scanning directory"
        );

        let mut report = BatchReport::default();
        for path in files {
            let file_report = self.process_file(&path, ledger, mode).await?;
            report.push(file_report);
        }

        tracing::info!(
            uploaded = report.uploaded(),
            conflicts = report.conflicts(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Batch finished"
        );
        Ok(report)
    }

    /// Process one file. Per-file problems become the report's outcome;
    /// only fatal errors are returned as `Err`.
    pub async fn process_file(
        &mut self,
        path: &Path,
        ledger: &mut UploadLedger,
        mode: ProcessMode,
    ) -> Result<FileReport> {
        let key = match self.options.key_strategy.key_for(path) {
            Ok(key) => key,
            Err(e) => {
                let key = path.display().to_string();
                return Ok(self.finish(path, key, unreadable(e)));
            }
        };

        if ledger.contains(&key) {
            return Ok(self.finish(path, key, FileOutcome::SkippedDuplicate));
        }

        tracing::info!(file = %path.display(), "Processing");
        let edited = match self.editor.edit_path(path) {
            Ok(edited) => edited,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(self.finish(path, key, unreadable(e))),
        };

        if mode == ProcessMode::DryRun {
            let outcome = FileOutcome::DryRun {
                activity_timestamp: edited.activity_timestamp,
            };
            return Ok(self.finish(path, key, outcome));
        }

        let bytes = edited.to_bytes();
        if self.options.keep_edited {
            let output = modified_path(path);
            if let Err(e) = write_output(&output, &bytes) {
                tracing::warn!(file = %output.display(), error = %e, "Failed to keep edited copy");
            }
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.clone());
        let outcome = self.upload(&file_name, bytes).await?;
        if outcome.is_recorded() {
            ledger.add(&key)?;
        }
        Ok(self.finish(path, key, outcome))
    }

    /// Edit one file and write the result to `output` (default
    /// `<stem>_modified.fit`). Optionally upload it and record it in `ledger`.
    pub async fn edit_single(
        &mut self,
        path: &Path,
        output: Option<&Path>,
        ledger: Option<&mut UploadLedger>,
        mode: ProcessMode,
        upload: bool,
    ) -> Result<SingleEditReport> {
        let edited = self.editor.edit_path(path)?;
        let output = output.map(Path::to_path_buf).unwrap_or_else(|| modified_path(path));
        if same_file(&output, path) {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("refusing to overwrite source file {}", path.display()),
            )));
        }

        let mut report = SingleEditReport {
            output: None,
            activity_timestamp: edited.activity_timestamp,
            rewritten: edited.rewritten,
            upload: None,
        };

        if mode == ProcessMode::DryRun {
            tracing::info!(
                file = %path.display(),
                rewritten = edited.rewritten,
                "Dry run: not writing or uploading"
            );
            return Ok(report);
        }

        let bytes = edited.to_bytes();
        tracing::info!(output = %output.display(), "Saving modified data");
        write_output(&output, &bytes)?;
        report.output = Some(output);

        if upload {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let outcome = self.upload(&file_name, bytes).await?;
            if let (true, Some(ledger)) = (outcome.is_recorded(), ledger) {
                let key = self.options.key_strategy.key_for(path)?;
                ledger.add(&key)?;
            }
            report.upload = Some(outcome);
        }

        Ok(report)
    }

    /// Upload edited bytes, mapping recoverable errors to outcomes.
    async fn upload(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<FileOutcome> {
        let session = self.session().await?;
        match self.client.upload(&session, file_name, bytes).await {
            Ok(receipt) => Ok(FileOutcome::Uploaded {
                activity_id: receipt.activity_id,
            }),
            Err(AppError::Conflict) => Ok(FileOutcome::Conflict),
            Err(e @ AppError::Authentication(_)) => {
                self.session = None;
                Err(e)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(FileOutcome::TransportFailed {
                detail: e.to_string(),
            }),
        }
    }

    /// Authenticate on first use and reuse the session afterwards.
    async fn session(&mut self) -> Result<Session> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        tracing::info!("Authenticating to Garmin Connect");
        let session = self.client.authenticate(&self.credentials).await?;
        self.session = Some(session.clone());
        Ok(session)
    }

    fn finish(&self, path: &Path, key: String, outcome: FileOutcome) -> FileReport {
        match &outcome {
            FileOutcome::Uploaded { .. } => {
                tracing::info!(file = %path.display(), result = %outcome, "Successfully uploaded")
            }
            FileOutcome::Conflict => tracing::warn!(
                file = %path.display(),
                "Received HTTP conflict (activity already exists)"
            ),
            FileOutcome::SkippedDuplicate => {
                tracing::debug!(file = %path.display(), "Already uploaded, skipping")
            }
            FileOutcome::DryRun { .. } => {
                tracing::info!(file = %path.display(), result = %outcome, "Edited (dry run)")
            }
            _ => tracing::error!(file = %path.display(), result = %outcome, "File failed"),
        }
        FileReport {
            path: path.to_path_buf(),
            key,
            outcome,
        }
    }
}

fn unreadable(err: AppError) -> FileOutcome {
    match err {
        AppError::MalformedInput(detail) => FileOutcome::Malformed { detail },
        other => FileOutcome::Unreadable {
            detail: other.to_string(),
        },
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_candidate() {
        assert!(is_candidate(Path::new("ride.fit")));
        assert!(is_candidate(Path::new("/x/Ride.FIT")));
        assert!(!is_candidate(Path::new("ride_modified.fit")));
        assert!(!is_candidate(Path::new("ride_MODIFIED.FIT")));
        assert!(!is_candidate(Path::new("ride.tcx")));
        assert!(!is_candidate(Path::new(".uploaded_files.json")));
    }

    #[test]
    fn test_list_candidates_sorted_and_flat() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.fit", "a.FIT", "c_modified.fit", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.fit")).unwrap();

        let files = list_candidates(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.FIT", "b.fit"]);
    }
}
