use serde::{Deserialize, Serialize};

use super::PAYLOAD_SIZE;
use super::codec::{
    bytes_to_hex_digits, hex_digits_to_float32, hex_digits_to_uint, swap_byte_order,
};
use super::error::DecodeError;
use super::frame::ValidatedPayload;
use crate::{FieldValue, Reading};

/// Fields carried in the response payload, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    WindDir,
    OutTemp,
    Pressure,
    LongTermRain,
    WindSpeed,
    OutHumidity,
    LongTermGeiger,
    Illumination,
    InTemp,
    MaxWind,
    Downfall,
}

impl Field {
    pub const COUNT: usize = 11;

    pub const ALL: [Field; Field::COUNT] = [
        Field::WindDir,
        Field::OutTemp,
        Field::Pressure,
        Field::LongTermRain,
        Field::WindSpeed,
        Field::OutHumidity,
        Field::LongTermGeiger,
        Field::Illumination,
        Field::InTemp,
        Field::MaxWind,
        Field::Downfall,
    ];

    /// Key used for this field in output packets.
    pub fn name(self) -> &'static str {
        match self {
            Field::WindDir => "windDir",
            Field::OutTemp => "outTemp",
            Field::Pressure => "pressure",
            Field::LongTermRain => "long_term_rain",
            Field::WindSpeed => "windSpeed",
            Field::OutHumidity => "outHumidity",
            Field::LongTermGeiger => "long_term_geiger",
            Field::Illumination => "illumination",
            Field::InTemp => "inTemp",
            Field::MaxWind => "maxWind",
            Field::Downfall => "downfall",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::WindDir | Field::LongTermGeiger => FieldKind::Unsigned,
            Field::Downfall => FieldKind::Flag,
            _ => FieldKind::Float,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// How the bytes of a field are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unsigned,
    /// IEEE-754 single, rounded to one decimal.
    Float,
    /// Unsigned integer where any nonzero value means `true`.
    Flag,
}

/// Byte order of multi-byte fields on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Least significant byte first; the hex form has its byte groups
    /// reversed before parsing.
    #[default]
    Little,
    Big,
}

/// Position of one field inside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub offset: usize,
    pub width: usize,
    pub order: ByteOrder,
}

impl FieldSpec {
    const fn le(offset: usize, width: usize) -> Self {
        Self {
            offset,
            width,
            order: ByteOrder::Little,
        }
    }

    fn end(&self) -> usize {
        self.offset + self.width
    }
}

/// Byte ranges of every payload field.
///
/// Station board revisions differ in layout, so decoding goes through this
/// table rather than fixed offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    specs: [FieldSpec; Field::COUNT],
}

impl FieldLayout {
    /// Layout of the current station firmware.
    pub const STANDARD: FieldLayout = FieldLayout {
        specs: [
            FieldSpec::le(0, 2),  // windDir
            FieldSpec::le(2, 4),  // outTemp
            FieldSpec::le(6, 4),  // pressure
            FieldSpec::le(10, 4), // long_term_rain
            FieldSpec::le(14, 4), // windSpeed
            FieldSpec::le(18, 4), // outHumidity
            FieldSpec::le(22, 4), // long_term_geiger
            FieldSpec::le(26, 4), // illumination
            FieldSpec::le(30, 4), // inTemp
            FieldSpec::le(34, 4), // maxWind
            FieldSpec::le(38, 4), // downfall
        ],
    };

    pub fn new(specs: [FieldSpec; Field::COUNT]) -> Self {
        Self { specs }
    }

    /// Same offsets, every field using `order`.
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        for spec in self.specs.iter_mut() {
            spec.order = order;
        }
        self
    }

    pub fn spec(&self, field: Field) -> FieldSpec {
        self.specs[field.index()]
    }

    /// Hex digits of `field`, most significant byte first.
    pub fn field_hex(&self, payload_hex: &str, field: Field) -> Result<String, DecodeError> {
        let spec = self.spec(field);
        let len = payload_hex.len() / 2;
        let digits = payload_hex
            .get(spec.offset * 2..spec.end() * 2)
            .ok_or(DecodeError::OutOfRange {
                field: field.name(),
                offset: spec.offset,
                end: spec.end(),
                len,
            })?;

        match spec.order {
            ByteOrder::Little => swap_byte_order(digits),
            ByteOrder::Big => Ok(digits.to_owned()),
        }
    }

    fn uint(&self, payload_hex: &str, field: Field) -> Result<u64, DecodeError> {
        hex_digits_to_uint(&self.field_hex(payload_hex, field)?)
    }

    fn float(&self, payload_hex: &str, field: Field) -> Result<f64, DecodeError> {
        hex_digits_to_float32(&self.field_hex(payload_hex, field)?)
    }

    /// Map a validated payload to named values.
    pub fn decode(&self, payload: &ValidatedPayload) -> Result<Reading, DecodeError> {
        self.decode_hex(&bytes_to_hex_digits(payload.as_bytes()))
    }

    /// Decode from the hex-digit form of a payload.
    pub fn decode_hex(&self, hex: &str) -> Result<Reading, DecodeError> {
        let wind_dir = self.uint(hex, Field::WindDir)?;
        let wind_dir = u16::try_from(wind_dir).map_err(|_| DecodeError::Overflow {
            field: Field::WindDir.name(),
            value: wind_dir,
        })?;

        let geiger = self.uint(hex, Field::LongTermGeiger)?;
        let long_term_geiger = u32::try_from(geiger).map_err(|_| DecodeError::Overflow {
            field: Field::LongTermGeiger.name(),
            value: geiger,
        })?;

        Ok(Reading {
            wind_dir,
            out_temp: self.float(hex, Field::OutTemp)?,
            pressure: self.float(hex, Field::Pressure)?,
            long_term_rain: self.float(hex, Field::LongTermRain)?,
            wind_speed: self.float(hex, Field::WindSpeed)?,
            out_humidity: self.float(hex, Field::OutHumidity)?.clamp(0.0, 100.0),
            long_term_geiger,
            illumination: self.float(hex, Field::Illumination)?,
            in_temp: self.float(hex, Field::InTemp)?,
            max_wind: self.float(hex, Field::MaxWind)?,
            downfall: self.uint(hex, Field::Downfall)? != 0,
        })
    }

    /// Inverse of [`FieldLayout::decode`], used to synthesize station
    /// responses.
    pub fn encode(&self, reading: &Reading) -> Result<[u8; PAYLOAD_SIZE], DecodeError> {
        let mut payload = [0u8; PAYLOAD_SIZE];

        for field in Field::ALL {
            let spec = self.spec(field);
            let out_of_range = DecodeError::OutOfRange {
                field: field.name(),
                offset: spec.offset,
                end: spec.end(),
                len: PAYLOAD_SIZE,
            };
            if spec.end() > PAYLOAD_SIZE || spec.width == 0 || spec.width > 8 {
                return Err(out_of_range);
            }

            let wide = match reading.value(field) {
                FieldValue::Unsigned(v) => v.to_be_bytes(),
                FieldValue::Flag(v) => u64::from(v).to_be_bytes(),
                FieldValue::Float(v) => {
                    if spec.width != 4 {
                        return Err(DecodeError::WrongWidth {
                            expected: 8,
                            actual: spec.width * 2,
                        });
                    }
                    u64::from((v as f32).to_bits()).to_be_bytes()
                }
            };

            let target = &mut payload[spec.offset..spec.end()];
            target.copy_from_slice(&wide[8 - spec.width..]);
            if spec.order == ByteOrder::Little {
                target.reverse();
            }
        }

        Ok(payload)
    }
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self::STANDARD
    }
}
