use jiff::{Timestamp, Unit};

use crate::protocol::codec::round_tenth;
use crate::{OutputPacket, Reading, UnitSystem};

/// Largest change in outside temperature, in °C, accepted between two
/// consecutive readings.
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 5.0;

/// Values remembered from earlier cycles.
///
/// Lives as long as the driver that owns it and is never persisted, so a
/// restarted collector reports zero deltas on its first packet.
#[derive(Debug, Clone, PartialEq)]
pub struct StationState {
    last_cumulative_rain: Option<f64>,
    last_cumulative_radiation: Option<u32>,
    last_accepted_outside_temp: Option<f64>,
    outlier_threshold: f64,
}

impl StationState {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_OUTLIER_THRESHOLD)
    }

    pub fn with_threshold(outlier_threshold: f64) -> Self {
        Self {
            last_cumulative_rain: None,
            last_cumulative_radiation: None,
            last_accepted_outside_temp: None,
            outlier_threshold,
        }
    }

    pub fn last_cumulative_rain(&self) -> Option<f64> {
        self.last_cumulative_rain
    }

    pub fn last_cumulative_radiation(&self) -> Option<u32> {
        self.last_cumulative_radiation
    }

    pub fn last_accepted_outside_temp(&self) -> Option<f64> {
        self.last_accepted_outside_temp
    }

    pub fn outlier_threshold(&self) -> f64 {
        self.outlier_threshold
    }

    /// Rain fallen since the previous reading.
    ///
    /// Zero on the first reading and whenever the counter did not grow (no
    /// new tip, or the station reset its total).
    pub fn rain_delta(&mut self, cumulative: f64) -> f64 {
        let delta = match self.last_cumulative_rain {
            Some(last) if cumulative > last => round_tenth(cumulative - last),
            _ => 0.0,
        };
        self.last_cumulative_rain = Some(cumulative);
        delta
    }

    /// Radiation counts since the previous reading, with the same reset rule
    /// as [`StationState::rain_delta`].
    pub fn radiation_delta(&mut self, cumulative: u32) -> u32 {
        let delta = match self.last_cumulative_radiation {
            Some(last) if cumulative > last => cumulative - last,
            _ => 0,
        };
        self.last_cumulative_radiation = Some(cumulative);
        delta
    }

    /// Pass `raw` through if it is within the outlier threshold of the last
    /// accepted value, otherwise repeat the last accepted value.
    pub fn filter_outside_temp(&mut self, raw: f64) -> f64 {
        match self.last_accepted_outside_temp {
            Some(last) if (last - raw).abs() >= self.outlier_threshold || raw.is_nan() => last,
            _ => {
                self.last_accepted_outside_temp = Some(raw);
                raw
            }
        }
    }

    /// Apply every derived metric to `reading` and stamp the result.
    pub fn process(&mut self, mut reading: Reading, now: Timestamp) -> OutputPacket {
        let deltarain = self.rain_delta(reading.long_term_rain);
        let geiger = self.radiation_delta(reading.long_term_geiger);
        reading.out_temp = self.filter_outside_temp(reading.out_temp);

        OutputPacket {
            date_time: now.round(Unit::Second).unwrap_or(now),
            us_units: UnitSystem::Metric,
            reading,
            deltarain,
            geiger,
        }
    }
}

impl Default for StationState {
    fn default() -> Self {
        Self::new()
    }
}
