// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Overwrite device identity fields with the target device.

use std::str::FromStr;

use crate::fit::{BaseType, FitError, Message};
use crate::models::identity::{is_sentinel_manufacturer, manufacturer, DeviceIdentity};
use crate::services::classifier::Classification;

/// When the target serial number replaces the one in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerialPolicy {
    Never,
    /// Only when the source manufacturer is a sentinel (development, 0, invalid).
    #[default]
    UnknownSourceOnly,
    Always,
}

impl FromStr for SerialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(SerialPolicy::Never),
            "unknown" | "unknown-source" => Ok(SerialPolicy::UnknownSourceOnly),
            "always" => Ok(SerialPolicy::Always),
            other => Err(format!("unknown serial policy '{}'", other)),
        }
    }
}

/// Which source manufacturers get rewritten. Parsed from `any`,
/// `simulators`, or a comma-separated list of manufacturer ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceFilter {
    #[default]
    Any,
    Only(Vec<u16>),
}

impl SourceFilter {
    /// The sources the first release of this tool rewrote: development
    /// builds, zero, and Wahoo.
    pub fn simulators() -> Self {
        SourceFilter::Only(vec![
            manufacturer::DEVELOPMENT,
            0,
            manufacturer::WAHOO_FITNESS,
        ])
    }

    pub fn allows(&self, source: u16) -> bool {
        match self {
            SourceFilter::Any => true,
            SourceFilter::Only(list) => list.contains(&source),
        }
    }
}

impl FromStr for SourceFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "all" => Ok(SourceFilter::Any),
            "simulators" => Ok(SourceFilter::simulators()),
            list => list
                .split(',')
                .map(|id| {
                    id.trim()
                        .parse::<u16>()
                        .map_err(|_| format!("unknown rewrite source '{}'", id.trim()))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(SourceFilter::Only),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewritePolicy {
    pub serial: SerialPolicy,
    pub sources: SourceFilter,
}

/// Result of applying the rewriter to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Not identity-bearing, or already the target device.
    Unchanged,
    /// Identity-bearing but the source filter excluded it.
    Filtered,
    Rewritten {
        previous_manufacturer: Option<u16>,
        previous_product: Option<u16>,
        serial_replaced: bool,
    },
}

impl RewriteOutcome {
    pub fn is_rewritten(&self) -> bool {
        matches!(self, RewriteOutcome::Rewritten { .. })
    }
}

/// Rewrite `message` in place according to `classification`.
pub fn rewrite(
    message: &mut Message,
    classification: &Classification,
    target: &DeviceIdentity,
    policy: &RewritePolicy,
) -> Result<RewriteOutcome, FitError> {
    let Some(shape) = classification.shape else {
        return Ok(RewriteOutcome::Unchanged);
    };

    if classification.manufacturer == Some(target.manufacturer)
        && classification.product == Some(target.product)
    {
        return Ok(RewriteOutcome::Unchanged);
    }

    let source = classification.manufacturer.unwrap_or(manufacturer::INVALID);
    if !policy.sources.allows(source) {
        return Ok(RewriteOutcome::Filtered);
    }

    let fields = shape.fields();
    message.set_uint(
        fields.manufacturer,
        BaseType::UINT16,
        u64::from(target.manufacturer),
    )?;
    message.set_uint(fields.product, BaseType::UINT16, u64::from(target.product))?;

    let replace_serial = match (target.serial_number, classification.has_serial_field) {
        (Some(_), true) => match policy.serial {
            SerialPolicy::Never => false,
            SerialPolicy::UnknownSourceOnly => is_sentinel_manufacturer(source),
            SerialPolicy::Always => true,
        },
        _ => false,
    };
    if let (true, Some(serial)) = (replace_serial, target.serial_number) {
        message.set_uint(fields.serial, BaseType::UINT32Z, u64::from(serial))?;
    }

    Ok(RewriteOutcome::Rewritten {
        previous_manufacturer: classification.manufacturer,
        previous_product: classification.product,
        serial_replaced: replace_serial,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::mesg_num;
    use crate::services::classifier::classify;

    fn apply(msg: &mut Message, target: &DeviceIdentity, policy: &RewritePolicy) -> RewriteOutcome {
        let c = classify(msg).unwrap();
        rewrite(msg, &c, target, policy).unwrap()
    }

    fn file_id(manufacturer: u64, product: u64) -> Message {
        Message::new(mesg_num::FILE_ID, 0)
            .with_uint(3, BaseType::UINT32Z, 555)
            .with_uint(1, BaseType::UINT16, manufacturer)
            .with_uint(2, BaseType::UINT16, product)
    }

    #[test]
    fn test_development_file_id_rewritten() {
        let mut msg = file_id(255, 0);
        let outcome = apply(&mut msg, &DeviceIdentity::EDGE_830, &RewritePolicy::default());

        assert!(outcome.is_rewritten());
        assert_eq!(msg.read_uint(1).unwrap(), Some(1));
        assert_eq!(msg.read_uint(2).unwrap(), Some(3122));
        // no target serial configured
        assert_eq!(msg.read_uint(3).unwrap(), Some(555));
    }

    #[test]
    fn test_already_target_is_unchanged() {
        let mut msg = file_id(1, 3122);
        let before = msg.clone();
        let outcome = apply(&mut msg, &DeviceIdentity::EDGE_830, &RewritePolicy::default());
        assert_eq!(outcome, RewriteOutcome::Unchanged);
        assert_eq!(msg, before);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut msg = file_id(260, 1);
        let target = DeviceIdentity::EDGE_830.with_serial(Some(99));
        let policy = RewritePolicy {
            serial: SerialPolicy::Always,
            ..Default::default()
        };
        apply(&mut msg, &target, &policy);
        let once = msg.clone();
        assert_eq!(apply(&mut msg, &target, &policy), RewriteOutcome::Unchanged);
        assert_eq!(msg, once);
    }

    #[test]
    fn test_device_info_product_field_rewritten() {
        let mut msg = Message::new(mesg_num::DEVICE_INFO, 1)
            .with_uint(0, BaseType::UINT8, 0)
            .with_uint(2, BaseType::UINT16, 32)
            .with_uint(4, BaseType::UINT16, 5);
        apply(&mut msg, &DeviceIdentity::EDGE_830, &RewritePolicy::default());

        assert_eq!(msg.read_uint(2).unwrap(), Some(1));
        assert_eq!(msg.read_uint(4).unwrap(), Some(3122));
        assert_eq!(msg.read_uint(0).unwrap(), Some(0));
    }

    #[test]
    fn test_missing_product_field_is_added() {
        let mut msg = Message::new(mesg_num::DEVICE_INFO, 1).with_uint(2, BaseType::UINT16, 255);
        apply(&mut msg, &DeviceIdentity::EDGE_830, &RewritePolicy::default());
        assert_eq!(msg.read_uint(4).unwrap(), Some(3122));
        assert_eq!(msg.field(4).unwrap().base_type, BaseType::UINT16);
    }

    #[test]
    fn test_narrow_product_field_is_widened() {
        let mut msg = Message::new(mesg_num::FILE_ID, 0)
            .with_uint(1, BaseType::UINT16, 255)
            .with_uint(2, BaseType::UINT8, 0);
        let first = apply(&mut msg, &DeviceIdentity::EDGE_830, &RewritePolicy::default());

        assert!(first.is_rewritten());
        assert_eq!(msg.read_uint(2).unwrap(), Some(3122));
        assert_eq!(msg.field(2).unwrap().base_type, BaseType::UINT16);

        let once = msg.clone();
        let second = apply(&mut msg, &DeviceIdentity::EDGE_830, &RewritePolicy::default());
        assert_eq!(second, RewriteOutcome::Unchanged);
        assert_eq!(msg, once);
    }

    #[test]
    fn test_serial_replaced_only_for_unknown_source() {
        let target = DeviceIdentity::EDGE_830.with_serial(Some(3_400_000_001));
        let policy = RewritePolicy::default();

        let mut unknown = file_id(255, 0);
        let outcome = apply(&mut unknown, &target, &policy);
        assert_eq!(unknown.read_uint(3).unwrap(), Some(3_400_000_001));
        assert!(matches!(
            outcome,
            RewriteOutcome::Rewritten {
                serial_replaced: true,
                ..
            }
        ));

        let mut wahoo = file_id(32, 10);
        apply(&mut wahoo, &target, &policy);
        assert_eq!(wahoo.read_uint(3).unwrap(), Some(555));
        assert_eq!(wahoo.read_uint(1).unwrap(), Some(1));
    }

    #[test]
    fn test_serial_not_added_when_schema_lacks_it() {
        let target = DeviceIdentity::EDGE_830.with_serial(Some(7));
        let policy = RewritePolicy {
            serial: SerialPolicy::Always,
            ..Default::default()
        };
        let mut msg = Message::new(mesg_num::FILE_ID, 0).with_uint(1, BaseType::UINT16, 255);
        apply(&mut msg, &target, &policy);
        assert!(!msg.has_field(3));
    }

    #[test]
    fn test_source_filter() {
        let policy = RewritePolicy {
            sources: SourceFilter::simulators(),
            ..Default::default()
        };
        let mut tacx = file_id(89, 20);
        assert_eq!(
            apply(&mut tacx, &DeviceIdentity::EDGE_830, &policy),
            RewriteOutcome::Filtered
        );
        assert_eq!(tacx.read_uint(1).unwrap(), Some(89));

        let mut dev = file_id(255, 0);
        assert!(apply(&mut dev, &DeviceIdentity::EDGE_830, &policy).is_rewritten());
    }

    #[test]
    fn test_source_filter_from_str() {
        assert_eq!("any".parse::<SourceFilter>().unwrap(), SourceFilter::Any);
        assert_eq!(
            "Simulators".parse::<SourceFilter>().unwrap(),
            SourceFilter::simulators()
        );
        assert_eq!(
            "255, 89".parse::<SourceFilter>().unwrap(),
            SourceFilter::Only(vec![255, 89])
        );
        assert!("wahoo".parse::<SourceFilter>().is_err());
        assert!("".parse::<SourceFilter>().is_err());
    }

    #[test]
    fn test_serial_policy_from_str() {
        assert_eq!("never".parse::<SerialPolicy>(), Ok(SerialPolicy::Never));
        assert_eq!("Always".parse::<SerialPolicy>(), Ok(SerialPolicy::Always));
        assert_eq!(
            "unknown".parse::<SerialPolicy>(),
            Ok(SerialPolicy::UnknownSourceOnly)
        );
        assert!("sometimes".parse::<SerialPolicy>().is_err());
    }
}
