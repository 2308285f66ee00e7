// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.
//!
//! Per-file errors (`MalformedInput`, `Conflict`, `Transport`, `Io`) are
//! recovered by the batch processor; the rest end the current run.

use crate::fit::FitError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Malformed activity file: {0}")]
    MalformedInput(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Activity already exists on Garmin Connect")]
    Conflict,

    #[error("Upload failed: {0}")]
    Transport(String),

    #[error("Upload ledger error: {0}")]
    Ledger(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::MalformedInput(err.to_string())
    }
}

impl AppError {
    /// Whether this error must stop the whole run rather than just one file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Authentication(_) | AppError::Ledger(_) | AppError::Internal(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict)
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
