// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod batch;
pub mod classifier;
pub mod connect;
pub mod editor;
pub mod ledger;
pub mod monitor;
pub mod rewriter;

pub use batch::{BatchOptions, BatchProcessor, ProcessMode, SingleEditReport};
pub use classifier::{classify, Classification, IdentityShape};
pub use connect::{Credentials, GarminConnectClient, Session, UploadClient, UploadReceipt};
pub use editor::{EditOptions, EditedFile, FileEditor};
pub use ledger::{KeyStrategy, UploadLedger};
pub use monitor::{DirectoryMonitor, MonitorConfig, MonitorEvent, MonitorState};
pub use rewriter::{rewrite, RewriteOutcome, RewritePolicy, SerialPolicy, SourceFilter};
