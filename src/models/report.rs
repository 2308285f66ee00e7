// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Per-file outcomes and batch reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::time_utils::format_utc_rfc3339;

/// What happened to one candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Uploaded; the remote id is present when Garmin Connect returned one.
    Uploaded { activity_id: Option<u64> },
    /// Remote already had an activity with this start time.
    Conflict,
    /// Key was already in the ledger.
    SkippedDuplicate,
    /// Edited only (dry run).
    DryRun { activity_timestamp: DateTime<Utc> },
    Malformed { detail: String },
    Unreadable { detail: String },
    TransportFailed { detail: String },
}

impl FileOutcome {
    /// Whether this outcome puts the file's key in the ledger.
    pub fn is_recorded(&self) -> bool {
        matches!(self, FileOutcome::Uploaded { .. } | FileOutcome::Conflict)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileOutcome::Malformed { .. }
                | FileOutcome::Unreadable { .. }
                | FileOutcome::TransportFailed { .. }
        )
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Uploaded {
                activity_id: Some(id),
            } => write!(f, "uploaded (activity {})", id),
            FileOutcome::Uploaded { activity_id: None } => write!(f, "uploaded"),
            FileOutcome::Conflict => write!(f, "already on Garmin Connect"),
            FileOutcome::SkippedDuplicate => write!(f, "skipped (already uploaded)"),
            FileOutcome::DryRun { activity_timestamp } => {
                write!(f, "dry run (activity {})", format_utc_rfc3339(*activity_timestamp))
            }
            FileOutcome::Malformed { detail } => write!(f, "malformed: {}", detail),
            FileOutcome::Unreadable { detail } => write!(f, "unreadable: {}", detail),
            FileOutcome::TransportFailed { detail } => write!(f, "upload failed: {}", detail),
        }
    }
}

/// Outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub key: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Outcomes of a batch, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn push(&mut self, report: FileReport) {
        self.files.push(report);
    }

    /// Files actually sent to the upload API (including conflicts).
    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Uploaded { .. }))
    }

    pub fn conflicts(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Conflict))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::SkippedDuplicate))
    }

    pub fn failed(&self) -> usize {
        self.count(FileOutcome::is_failure)
    }

    pub fn outcome_for(&self, key: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|r| r.key == key).map(|r| &r.outcome)
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|r| pred(&r.outcome)).count()
    }
}
