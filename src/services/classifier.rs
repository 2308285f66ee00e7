// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identify messages that carry device identity and read their current values.

use crate::fit::{mesg_num, FitError, Message};

/// Field numbers of the identity triple within one message shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityFields {
    pub manufacturer: u8,
    pub product: u8,
    pub serial: u8,
}

/// Message shapes that carry a device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityShape {
    /// `file_id`: the device that created the file.
    FileId,
    /// `device_info`: the creator and every sensor. Its product field is also
    /// the `garmin_product` subfield.
    DeviceInfo,
}

impl IdentityShape {
    pub fn from_global(global: u16) -> Option<Self> {
        match global {
            mesg_num::FILE_ID => Some(IdentityShape::FileId),
            mesg_num::DEVICE_INFO => Some(IdentityShape::DeviceInfo),
            _ => None,
        }
    }

    pub const fn fields(self) -> IdentityFields {
        match self {
            IdentityShape::FileId => IdentityFields {
                manufacturer: 1,
                product: 2,
                serial: 3,
            },
            IdentityShape::DeviceInfo => IdentityFields {
                manufacturer: 2,
                product: 4,
                serial: 3,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IdentityShape::FileId => "file_id",
            IdentityShape::DeviceInfo => "device_info",
        }
    }
}

/// Identity values found in one message. Invalid values read as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub shape: Option<IdentityShape>,
    pub manufacturer: Option<u16>,
    pub product: Option<u16>,
    pub serial: Option<u32>,
    pub has_serial_field: bool,
}

impl Classification {
    pub fn is_identity_bearing(&self) -> bool {
        self.shape.is_some()
    }
}

/// Classify a message. Pure; fails only when an identity field is stored
/// with a size that does not match its type.
pub fn classify(message: &Message) -> Result<Classification, FitError> {
    let Some(shape) = IdentityShape::from_global(message.global) else {
        return Ok(Classification::default());
    };
    let fields = shape.fields();

    Ok(Classification {
        shape: Some(shape),
        manufacturer: read_u16(message, fields.manufacturer)?,
        product: read_u16(message, fields.product)?,
        serial: read_valid(message, fields.serial)?.and_then(|v| u32::try_from(v).ok()),
        has_serial_field: message.has_field(fields.serial),
    })
}

fn read_u16(message: &Message, number: u8) -> Result<Option<u16>, FitError> {
    match read_valid(message, number)? {
        Some(value) => u16::try_from(value).map(Some).map_err(|_| FitError::FieldSize {
            global: message.global,
            field: number,
            size: message.field(number).map_or(0, |f| f.data.len()),
            expected: 2,
        }),
        None => Ok(None),
    }
}

fn read_valid(message: &Message, number: u8) -> Result<Option<u64>, FitError> {
    let Some(value) = message.read_uint(number)? else {
        return Ok(None);
    };
    let invalid = message
        .field(number)
        .is_some_and(|f| f.base_type.is_invalid(value));
    Ok(if invalid { None } else { Some(value) })
}
