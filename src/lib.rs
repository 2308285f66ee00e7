// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! fit-relabel: make indoor ride files look like they came from a Garmin Edge 830
//!
//! This crate rewrites the device identity of FIT activity files and uploads
//! them to Garmin Connect, keeping a per-directory ledger of what was sent.

pub mod config;
pub mod error;
pub mod fit;
pub mod models;
pub mod services;
pub mod time_utils;
