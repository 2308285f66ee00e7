// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Serialize messages back into a FIT file.
//!
//! Definitions are derived from the messages themselves: a definition is
//! written whenever a message's layout differs from the one last written for
//! its local type. Header data size and both CRCs are recomputed.

use super::crc::crc16;
use super::types::{encode_uint, Definition, FitFile, HeaderKind, Message};

const SIGNATURE: &[u8; 4] = b".FIT";

pub fn encode(file: &FitFile) -> Vec<u8> {
    let mut records = Vec::new();
    let mut current: [Option<Definition>; 16] = Default::default();

    for message in &file.messages {
        let local = (message.local_type & 0x0F) as usize;
        let definition = message.definition();
        if current[local].as_ref() != Some(&definition) {
            write_definition(&mut records, local as u8, &definition);
            current[local] = Some(definition);
        }
        write_data(&mut records, message);
    }

    let header_size: u8 = if file.header.header_size == 12 { 12 } else { 14 };
    let mut out = Vec::with_capacity(header_size as usize + records.len() + 2);
    out.push(header_size);
    out.push(file.header.protocol_version);
    out.extend_from_slice(&file.header.profile_version.to_le_bytes());
    out.extend_from_slice(&(records.len() as u32).to_le_bytes());
    out.extend_from_slice(SIGNATURE);
    if header_size == 14 {
        let header_crc = crc16(&out);
        out.extend_from_slice(&header_crc.to_le_bytes());
    }
    out.extend_from_slice(&records);

    let crc = crc16(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

fn write_definition(out: &mut Vec<u8>, local: u8, definition: &Definition) {
    let mut header = 0x40 | local;
    if !definition.developer_fields.is_empty() {
        header |= 0x20;
    }
    out.push(header);
    out.push(0); // reserved
    out.push(definition.architecture.as_byte());
    out.extend_from_slice(&encode_uint(
        definition.architecture,
        2,
        u64::from(definition.global),
    ));
    out.push(definition.fields.len() as u8);
    for field in &definition.fields {
        out.extend_from_slice(&[field.number, field.size, field.base_type.0]);
    }
    if !definition.developer_fields.is_empty() {
        out.push(definition.developer_fields.len() as u8);
        for field in &definition.developer_fields {
            out.extend_from_slice(&[field.number, field.size, field.developer_index]);
        }
    }
}

fn write_data(out: &mut Vec<u8>, message: &Message) {
    let local = message.local_type & 0x0F;
    match message.header {
        // compressed headers only have room for local types 0-3
        HeaderKind::CompressedTimestamp { offset } if local < 4 => {
            out.push(0x80 | (local << 5) | (offset & 0x1F));
        }
        _ => out.push(local),
    }
    for field in &message.fields {
        out.extend_from_slice(&field.data);
    }
    for field in &message.developer_fields {
        out.extend_from_slice(&field.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::decode;
    use crate::fit::types::{mesg_num, Architecture, BaseType, DeveloperField};

    fn sample() -> FitFile {
        let mut device = Message::new(mesg_num::DEVICE_INFO, 1);
        device.architecture = Architecture::BigEndian;
        let device = device
            .with_uint(0, BaseType::UINT8, 0)
            .with_uint(2, BaseType::UINT16, 255);

        let mut record = Message::new(mesg_num::RECORD, 2).with_uint(7, BaseType::UINT16, 250);
        record.header = HeaderKind::CompressedTimestamp { offset: 7 };
        record.developer_fields.push(DeveloperField {
            number: 0,
            developer_index: 0,
            data: vec![9],
        });

        FitFile {
            header: Default::default(),
            messages: vec![
                Message::new(mesg_num::FILE_ID, 0)
                    .with_uint(1, BaseType::UINT16, 255)
                    .with_uint(4, BaseType::UINT32, 1_000_000_000),
                device,
                record.clone(),
                record,
            ],
        }
    }

    #[test]
    fn test_encode_then_decode_preserves_messages() {
        let file = sample();
        let decoded = decode(&encode(&file)).unwrap();
        assert_eq!(decoded, file);
    }

    #[test]
    fn test_file_crc_checks_to_zero() {
        let bytes = encode(&sample());
        assert_eq!(crc16(&bytes), 0);
        assert_eq!(crc16(&bytes[..14]), 0);
    }

    #[test]
    fn test_definition_written_once_per_layout() {
        let file = FitFile {
            header: Default::default(),
            messages: vec![
                Message::new(mesg_num::RECORD, 0).with_uint(7, BaseType::UINT16, 1),
                Message::new(mesg_num::RECORD, 0).with_uint(7, BaseType::UINT16, 2),
            ],
        };
        let bytes = encode(&file);
        // header(14) + definition(9) + 2 * data(3) + crc(2)
        assert_eq!(bytes.len(), 14 + 9 + 6 + 2);
    }

    #[test]
    fn test_layout_change_emits_new_definition() {
        let mut changed = Message::new(mesg_num::RECORD, 0).with_uint(7, BaseType::UINT16, 1);
        changed.set_uint(3, BaseType::UINT8, 120).unwrap();
        let file = FitFile {
            header: Default::default(),
            messages: vec![
                Message::new(mesg_num::RECORD, 0).with_uint(7, BaseType::UINT16, 1),
                changed,
            ],
        };
        let decoded = decode(&encode(&file)).unwrap();
        assert_eq!(decoded.messages[1].read_uint(3).unwrap(), Some(120));
        assert!(!decoded.messages[0].has_field(3));
    }

    #[test]
    fn test_twelve_byte_header_is_kept() {
        let mut file = sample();
        file.header.header_size = 12;
        let bytes = encode(&file);
        assert_eq!(bytes[0], 12);
        assert_eq!(decode(&bytes).unwrap().messages, file.messages);
    }
}
