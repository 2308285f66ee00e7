// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FIT message model: base types, fields, messages and definitions.

use super::FitError;

/// Global message numbers this crate cares about.
pub mod mesg_num {
    pub const FILE_ID: u16 = 0;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const DEVICE_INFO: u16 = 23;
}

/// Byte order of a message's multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Architecture {
    #[default]
    LittleEndian,
    BigEndian,
}

impl Architecture {
    pub fn from_byte(byte: u8) -> Self {
        if byte == 1 {
            Architecture::BigEndian
        } else {
            Architecture::LittleEndian
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Architecture::LittleEndian => 0,
            Architecture::BigEndian => 1,
        }
    }
}

/// FIT base type byte, kept raw so unknown types survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BaseType(pub u8);

impl BaseType {
    pub const ENUM: Self = Self(0x00);
    pub const SINT8: Self = Self(0x01);
    pub const UINT8: Self = Self(0x02);
    pub const STRING: Self = Self(0x07);
    pub const UINT8Z: Self = Self(0x0A);
    pub const BYTE: Self = Self(0x0D);
    pub const SINT16: Self = Self(0x83);
    pub const UINT16: Self = Self(0x84);
    pub const SINT32: Self = Self(0x85);
    pub const UINT32: Self = Self(0x86);
    pub const FLOAT32: Self = Self(0x88);
    pub const FLOAT64: Self = Self(0x89);
    pub const UINT16Z: Self = Self(0x8B);
    pub const UINT32Z: Self = Self(0x8C);
    pub const SINT64: Self = Self(0x8E);
    pub const UINT64: Self = Self(0x8F);
    pub const UINT64Z: Self = Self(0x90);

    /// Size in bytes of a single value of this type.
    pub fn size(self) -> usize {
        match self.0 & 0x1F {
            0x00 | 0x01 | 0x02 | 0x07 | 0x0A | 0x0D => 1,
            0x03 | 0x04 | 0x0B => 2,
            0x05 | 0x06 | 0x08 | 0x0C => 4,
            0x09 | 0x0E | 0x0F | 0x10 => 8,
            _ => 1,
        }
    }

    /// Whether `value` is representable and not the invalid sentinel.
    pub fn holds(self, value: u64) -> bool {
        let size = self.size();
        let fits = size >= 8 || value >> (8 * size) == 0;
        fits && !self.is_invalid(value)
    }

    /// Sentinel meaning "no value" for unsigned integer types.
    pub fn invalid_value(self) -> Option<u64> {
        match self {
            Self::ENUM | Self::UINT8 => Some(0xFF),
            Self::UINT16 => Some(0xFFFF),
            Self::UINT32 => Some(0xFFFF_FFFF),
            Self::UINT64 => Some(u64::MAX),
            Self::UINT8Z | Self::UINT16Z | Self::UINT32Z | Self::UINT64Z => Some(0),
            _ => None,
        }
    }

    pub fn is_invalid(self, value: u64) -> bool {
        self.invalid_value() == Some(value)
    }
}

/// Whether a data message used a normal or a compressed-timestamp header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderKind {
    #[default]
    Normal,
    CompressedTimestamp { offset: u8 },
}

/// One field of a data message with its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub number: u8,
    pub base_type: BaseType,
    pub data: Vec<u8>,
}

/// One developer field, carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeveloperField {
    pub number: u8,
    pub developer_index: u8,
    pub data: Vec<u8>,
}

/// Layout of a field inside a definition message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub number: u8,
    pub size: u8,
    pub base_type: BaseType,
}

/// Layout of a developer field inside a definition message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeveloperFieldDef {
    pub number: u8,
    pub size: u8,
    pub developer_index: u8,
}

/// A definition message: how data messages of one local type are laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub architecture: Architecture,
    pub global: u16,
    pub fields: Vec<FieldDef>,
    pub developer_fields: Vec<DeveloperFieldDef>,
}

/// A decoded data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub global: u16,
    pub local_type: u8,
    pub architecture: Architecture,
    pub header: HeaderKind,
    pub fields: Vec<Field>,
    pub developer_fields: Vec<DeveloperField>,
}

impl Message {
    /// Create an empty little-endian message.
    pub fn new(global: u16, local_type: u8) -> Self {
        Self {
            global,
            local_type,
            architecture: Architecture::LittleEndian,
            header: HeaderKind::Normal,
            fields: Vec::new(),
            developer_fields: Vec::new(),
        }
    }

    /// Builder-style helper to append an unsigned field.
    pub fn with_uint(mut self, number: u8, base_type: BaseType, value: u64) -> Self {
        self.fields.push(Field {
            number,
            base_type,
            data: encode_uint(self.architecture, base_type.size(), value),
        });
        self
    }

    pub fn field(&self, number: u8) -> Option<&Field> {
        self.fields.iter().find(|f| f.number == number)
    }

    pub fn has_field(&self, number: u8) -> bool {
        self.field(number).is_some()
    }

    /// Read a scalar unsigned field. Returns the raw value, including the
    /// base type's invalid sentinel if that is what is stored.
    pub fn read_uint(&self, number: u8) -> Result<Option<u64>, FitError> {
        let Some(field) = self.field(number) else {
            return Ok(None);
        };
        let expected = field.base_type.size();
        if field.data.len() != expected || expected > 8 {
            return Err(FitError::FieldSize {
                global: self.global,
                field: number,
                size: field.data.len(),
                expected,
            });
        }
        Ok(Some(decode_uint(self.architecture, &field.data)))
    }

    /// Overwrite a scalar unsigned field, appending it with `base_type` if the
    /// message does not carry it yet. A stored field too narrow for `value`
    /// is retyped to `base_type`.
    pub fn set_uint(&mut self, number: u8, base_type: BaseType, value: u64) -> Result<(), FitError> {
        let architecture = self.architecture;
        let global = self.global;
        let out_of_range = FitError::ValueOutOfRange {
            global,
            field: number,
            value,
        };
        match self.fields.iter_mut().find(|f| f.number == number) {
            Some(field) => {
                let expected = field.base_type.size();
                if field.data.len() != expected {
                    return Err(FitError::FieldSize {
                        global,
                        field: number,
                        size: field.data.len(),
                        expected,
                    });
                }
                if !field.base_type.holds(value) {
                    if !base_type.holds(value) {
                        return Err(out_of_range);
                    }
                    field.base_type = base_type;
                }
                field.data = encode_uint(architecture, field.base_type.size(), value);
            }
            None if !base_type.holds(value) => return Err(out_of_range),
            None => self.fields.push(Field {
                number,
                base_type,
                data: encode_uint(architecture, base_type.size(), value),
            }),
        }
        Ok(())
    }

    /// The definition a writer must have emitted for this message.
    pub fn definition(&self) -> Definition {
        Definition {
            architecture: self.architecture,
            global: self.global,
            fields: self
                .fields
                .iter()
                .map(|f| FieldDef {
                    number: f.number,
                    size: f.data.len() as u8,
                    base_type: f.base_type,
                })
                .collect(),
            developer_fields: self
                .developer_fields
                .iter()
                .map(|f| DeveloperFieldDef {
                    number: f.number,
                    size: f.data.len() as u8,
                    developer_index: f.developer_index,
                })
                .collect(),
        }
    }
}

/// File header fields that survive re-encoding. Sizes and CRCs are recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub header_size: u8,
    pub protocol_version: u8,
    pub profile_version: u16,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            header_size: 14,
            protocol_version: 0x20,
            profile_version: 2132,
        }
    }
}

/// A parsed FIT file: header plus data messages in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FitFile {
    pub header: FileHeader,
    pub messages: Vec<Message>,
}

impl FitFile {
    /// Messages with the given global number, in file order.
    pub fn messages_of(&self, global: u16) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |m| m.global == global)
    }
}

pub(crate) fn decode_uint(architecture: Architecture, bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    match architecture {
        Architecture::LittleEndian => {
            for &b in bytes.iter().rev() {
                value = (value << 8) | u64::from(b);
            }
        }
        Architecture::BigEndian => {
            for &b in bytes {
                value = (value << 8) | u64::from(b);
            }
        }
    }
    value
}

pub(crate) fn encode_uint(architecture: Architecture, size: usize, value: u64) -> Vec<u8> {
    let le = value.to_le_bytes();
    let mut bytes = le[..size.min(8)].to_vec();
    if architecture == Architecture::BigEndian {
        bytes.reverse();
    }
    bytes
}
