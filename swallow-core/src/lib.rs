pub mod protocol;
pub mod state;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use protocol::{
    ByteOrder, DecodeError, Field, FieldKind, FieldLayout, FieldSpec, RawFrame, ValidatedPayload,
    ValidationError,
};
pub use state::{DEFAULT_OUTLIER_THRESHOLD, StationState};

/// One decoded set of station values, as carried by a single response frame.
///
/// Cumulative counters (`long_term_rain`, `long_term_geiger`) are the running
/// totals kept by the station itself. `out_temp` is the raw, unfiltered value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Wind direction in degrees.
    #[serde(rename = "windDir")]
    pub wind_dir: u16,
    /// Outside temperature in degrees Celsius.
    #[serde(rename = "outTemp")]
    pub out_temp: f64,
    /// Barometric pressure.
    pub pressure: f64,
    /// Cumulative rain since the station last reset its counter.
    pub long_term_rain: f64,
    /// Wind speed.
    #[serde(rename = "windSpeed")]
    pub wind_speed: f64,
    /// Relative humidity, clamped to 0..=100. A NaN from the sensor is kept
    /// as is and serializes as `null`.
    #[serde(rename = "outHumidity")]
    pub out_humidity: f64,
    /// Cumulative radiation counter.
    pub long_term_geiger: u32,
    pub illumination: f64,
    /// Temperature inside the station housing.
    #[serde(rename = "inTemp")]
    pub in_temp: f64,
    /// Gust speed.
    #[serde(rename = "maxWind")]
    pub max_wind: f64,
    /// Precipitation sensor is wet.
    pub downfall: bool,
}

impl Reading {
    /// Value of a single field, for diagnostics and encoding.
    pub fn value(&self, field: Field) -> FieldValue {
        match field {
            Field::WindDir => FieldValue::Unsigned(u64::from(self.wind_dir)),
            Field::OutTemp => FieldValue::Float(self.out_temp),
            Field::Pressure => FieldValue::Float(self.pressure),
            Field::LongTermRain => FieldValue::Float(self.long_term_rain),
            Field::WindSpeed => FieldValue::Float(self.wind_speed),
            Field::OutHumidity => FieldValue::Float(self.out_humidity),
            Field::LongTermGeiger => FieldValue::Unsigned(u64::from(self.long_term_geiger)),
            Field::Illumination => FieldValue::Float(self.illumination),
            Field::InTemp => FieldValue::Float(self.in_temp),
            Field::MaxWind => FieldValue::Float(self.max_wind),
            Field::Downfall => FieldValue::Flag(self.downfall),
        }
    }
}

/// A single decoded field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Unsigned(u64),
    Float(f64),
    Flag(bool),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Unsigned(_) => FieldKind::Unsigned,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Flag(_) => FieldKind::Flag,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v:.1}"),
            FieldValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

/// Unit system tag attached to every output packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Metric,
}

/// A post-processed reading as handed to the host collector.
///
/// Serializes to the host's flat key space: `dateTime`, `usUnits`, the
/// reading keys (with `outTemp` already filtered) plus `deltarain` and
/// `geiger`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputPacket {
    /// Acquisition time, rounded to the nearest second.
    #[serde(
        rename = "dateTime",
        with = "jiff::fmt::serde::timestamp::second::required"
    )]
    pub date_time: jiff::Timestamp,
    #[serde(rename = "usUnits")]
    pub us_units: UnitSystem,
    #[serde(flatten)]
    pub reading: Reading,
    /// Rain fallen since the previous packet.
    pub deltarain: f64,
    /// Radiation counts since the previous packet.
    pub geiger: u32,
}
