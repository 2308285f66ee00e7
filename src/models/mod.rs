// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod identity;
pub mod report;

pub use identity::DeviceIdentity;
pub use report::{BatchReport, FileOutcome, FileReport};
