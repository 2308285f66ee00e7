// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Minimal FIT container codec.
//!
//! Decodes the record section into data messages with raw field bytes and
//! writes them back. Profile knowledge (field names, scaling) is left to the
//! callers; only the base types needed to read and write integers are known
//! here.

pub mod crc;
pub mod decode;
pub mod encode;
pub mod types;

pub use decode::decode;
pub use encode::encode;
pub use types::{
    mesg_num, Architecture, BaseType, DeveloperField, Field, FileHeader, FitFile, HeaderKind,
    Message,
};

/// Errors from decoding or field access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FitError {
    #[error("Unexpected end of data at byte {offset} ({needed} more bytes needed)")]
    Truncated { offset: usize, needed: usize },

    #[error("Invalid header size {0}")]
    BadHeaderSize(u8),

    #[error("Missing .FIT signature")]
    BadSignature,

    #[error("Data message at byte {offset} uses undefined local type {local_type}")]
    UndefinedLocalType { local_type: u8, offset: usize },

    #[error("Field {field} of message {global} is {size} bytes, expected {expected}")]
    FieldSize {
        global: u16,
        field: u8,
        size: usize,
        expected: usize,
    },

    #[error("Value {value} does not fit field {field} of message {global}")]
    ValueOutOfRange { global: u16, field: u8, value: u64 },
}
