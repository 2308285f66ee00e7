// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Device identity model and FIT manufacturer/product constants.

use serde::{Deserialize, Serialize};

/// FIT `manufacturer` values referenced by the rewriter.
pub mod manufacturer {
    pub const GARMIN: u16 = 1;
    pub const WAHOO_FITNESS: u16 = 32;
    pub const TACX: u16 = 89;
    pub const DEVELOPMENT: u16 = 255;
    pub const ZWIFT: u16 = 260;
    /// Base type invalid value for uint16.
    pub const INVALID: u16 = 0xFFFF;
}

/// FIT `garmin_product` values.
pub mod garmin_product {
    pub const EDGE_830: u16 = 3122;
}

/// Manufacturer ids that mean "not a real device": development builds,
/// zero and the uint16 invalid value.
pub fn is_sentinel_manufacturer(id: u16) -> bool {
    matches!(
        id,
        0 | manufacturer::DEVELOPMENT | manufacturer::INVALID
    )
}

/// Human-readable manufacturer name for log output.
pub fn manufacturer_name(id: u16) -> &'static str {
    match id {
        manufacturer::GARMIN => "garmin",
        manufacturer::WAHOO_FITNESS => "wahoo_fitness",
        manufacturer::TACX => "tacx",
        manufacturer::DEVELOPMENT => "development",
        manufacturer::ZWIFT => "zwift",
        manufacturer::INVALID => "invalid",
        _ => "other",
    }
}

/// The identity written into rewritten messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub manufacturer: u16,
    pub product: u16,
    pub serial_number: Option<u32>,
}

impl DeviceIdentity {
    /// Garmin Edge 830 head unit.
    pub const EDGE_830: DeviceIdentity = DeviceIdentity {
        manufacturer: manufacturer::GARMIN,
        product: garmin_product::EDGE_830,
        serial_number: None,
    };

    /// Same device with a specific serial number.
    pub fn with_serial(self, serial_number: Option<u32>) -> Self {
        Self {
            serial_number,
            ..self
        }
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::EDGE_830
    }
}
