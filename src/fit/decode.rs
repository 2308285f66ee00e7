// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Decode FIT bytes into an ordered list of data messages.

use super::types::{
    decode_uint, Architecture, BaseType, Definition, DeveloperField, DeveloperFieldDef, Field,
    FieldDef, FileHeader, FitFile, HeaderKind, Message,
};
use super::FitError;

const SIGNATURE: &[u8; 4] = b".FIT";
const MIN_HEADER_SIZE: usize = 12;
const LOCAL_TYPES: usize = 16;

/// Byte cursor over the record section.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], FitError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(FitError::Truncated {
                offset: self.pos,
                needed: end - self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, FitError> {
        Ok(self.take(1)?[0])
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Parse a FIT file. Only the first file of a chained FIT stream is read and
/// neither CRC is verified.
pub fn decode(bytes: &[u8]) -> Result<FitFile, FitError> {
    if bytes.len() < MIN_HEADER_SIZE {
        return Err(FitError::Truncated {
            offset: 0,
            needed: MIN_HEADER_SIZE - bytes.len(),
        });
    }

    let header_size = bytes[0];
    if (header_size as usize) < MIN_HEADER_SIZE {
        return Err(FitError::BadHeaderSize(header_size));
    }
    if &bytes[8..12] != SIGNATURE {
        return Err(FitError::BadSignature);
    }

    let header = FileHeader {
        header_size,
        protocol_version: bytes[1],
        profile_version: u16::from_le_bytes([bytes[2], bytes[3]]),
    };
    let data_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

    let start = header_size as usize;
    let end = start + data_size;
    if end > bytes.len() {
        return Err(FitError::Truncated {
            offset: bytes.len(),
            needed: end - bytes.len(),
        });
    }
    if bytes.len() > end + 2 {
        tracing::debug!(
            trailing = bytes.len() - end - 2,
            "Ignoring bytes after the first FIT file"
        );
    }

    let mut reader = Reader {
        data: &bytes[start..end],
        pos: 0,
    };
    let mut definitions: [Option<Definition>; LOCAL_TYPES] = Default::default();
    let mut messages = Vec::new();

    while reader.remaining() > 0 {
        let offset = start + reader.pos;
        let record_header = reader.u8()?;

        if record_header & 0x80 != 0 {
            let local_type = (record_header >> 5) & 0x03;
            let header = HeaderKind::CompressedTimestamp {
                offset: record_header & 0x1F,
            };
            messages.push(read_data(&mut reader, &definitions, local_type, header, offset)?);
        } else if record_header & 0x40 != 0 {
            let local_type = record_header & 0x0F;
            let has_developer_data = record_header & 0x20 != 0;
            definitions[local_type as usize] =
                Some(read_definition(&mut reader, has_developer_data)?);
        } else {
            let local_type = record_header & 0x0F;
            messages.push(read_data(
                &mut reader,
                &definitions,
                local_type,
                HeaderKind::Normal,
                offset,
            )?);
        }
    }

    Ok(FitFile { header, messages })
}

fn read_definition(reader: &mut Reader<'_>, has_developer_data: bool) -> Result<Definition, FitError> {
    let _reserved = reader.u8()?;
    let architecture = Architecture::from_byte(reader.u8()?);
    let global = decode_uint(architecture, reader.take(2)?) as u16;

    let field_count = reader.u8()? as usize;
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let raw = reader.take(3)?;
        fields.push(FieldDef {
            number: raw[0],
            size: raw[1],
            base_type: BaseType(raw[2]),
        });
    }

    let mut developer_fields = Vec::new();
    if has_developer_data {
        let count = reader.u8()? as usize;
        for _ in 0..count {
            let raw = reader.take(3)?;
            developer_fields.push(DeveloperFieldDef {
                number: raw[0],
                size: raw[1],
                developer_index: raw[2],
            });
        }
    }

    Ok(Definition {
        architecture,
        global,
        fields,
        developer_fields,
    })
}

fn read_data(
    reader: &mut Reader<'_>,
    definitions: &[Option<Definition>; LOCAL_TYPES],
    local_type: u8,
    header: HeaderKind,
    offset: usize,
) -> Result<Message, FitError> {
    let definition = definitions[local_type as usize]
        .as_ref()
        .ok_or(FitError::UndefinedLocalType { local_type, offset })?;

    let mut fields = Vec::with_capacity(definition.fields.len());
    for def in &definition.fields {
        fields.push(Field {
            number: def.number,
            base_type: def.base_type,
            data: reader.take(def.size as usize)?.to_vec(),
        });
    }

    let mut developer_fields = Vec::with_capacity(definition.developer_fields.len());
    for def in &definition.developer_fields {
        developer_fields.push(DeveloperField {
            number: def.number,
            developer_index: def.developer_index,
            data: reader.take(def.size as usize)?.to_vec(),
        });
    }

    Ok(Message {
        global: definition.global,
        local_type,
        architecture: definition.architecture,
        header,
        fields,
        developer_fields,
    })
}
