use std::io;

use rand::Rng;
use swallow_core::protocol::{FRAME_SIZE, PAYLOAD_SIZE, PREAMBLE_SIZE, REQUEST_FRAME, build_frame};
use swallow_core::{FieldLayout, Reading};
use tracing::debug;

use super::SerialLink;

/// A station that answers requests with frames built from a drifting
/// synthetic weather model.
///
/// Short and corrupted responses can be injected to exercise the retry path
/// without hardware.
pub struct SimulatedStation {
    layout: FieldLayout,
    weather: Reading,
    /// Response bytes waiting to be read.
    pending: Vec<u8>,
    short_read_ratio: f64,
    corrupt_ratio: f64,
}

impl SimulatedStation {
    pub fn new(layout: FieldLayout, short_read_ratio: f64, corrupt_ratio: f64) -> Self {
        Self {
            layout,
            weather: Reading {
                wind_dir: 180,
                out_temp: 18.0,
                pressure: 1013.2,
                long_term_rain: 0.0,
                wind_speed: 2.0,
                out_humidity: 55.0,
                long_term_geiger: 0,
                illumination: 12000.0,
                in_temp: 22.0,
                max_wind: 3.5,
                downfall: false,
            },
            pending: Vec::new(),
            short_read_ratio: short_read_ratio.clamp(0.0, 1.0),
            corrupt_ratio: corrupt_ratio.clamp(0.0, 1.0),
        }
    }

    /// The values the next response will be built from.
    pub fn weather(&self) -> &Reading {
        &self.weather
    }

    fn step_weather(&mut self) {
        let mut rng = rand::rng();
        let w = &mut self.weather;

        w.wind_dir = (w.wind_dir + rng.random_range(0..30)) % 360;
        w.out_temp += rng.random_range(-0.5..0.5);
        w.pressure += rng.random_range(-0.3..0.3);
        w.wind_speed = (w.wind_speed + rng.random_range(-0.5..0.5)).max(0.0);
        w.max_wind = w.wind_speed + rng.random_range(0.0..2.0);
        w.out_humidity = (w.out_humidity + rng.random_range(-2.0..2.0)).clamp(0.0, 100.0);
        w.illumination = (w.illumination + rng.random_range(-500.0..500.0)).max(0.0);
        w.in_temp += rng.random_range(-0.2..0.2);
        w.long_term_geiger += rng.random_range(0..20);

        w.downfall = rng.random_ratio(1, 5);
        if w.downfall {
            w.long_term_rain += rng.random_range(0.1..1.5);
        }
    }

    fn respond(&mut self) -> io::Result<Vec<u8>> {
        self.step_weather();

        let payload = self.layout.encode(&self.weather).map_err(io::Error::other)?;
        let mut bytes = build_frame(&payload).into_bytes();

        let mut rng = rand::rng();
        if rng.random_bool(self.short_read_ratio) {
            let keep = rng.random_range(0..FRAME_SIZE);
            bytes.truncate(keep);
            debug!(bytes = keep, "Simulated station sending a short frame");
        } else if rng.random_bool(self.corrupt_ratio) {
            let index = rng.random_range(PREAMBLE_SIZE..PREAMBLE_SIZE + PAYLOAD_SIZE);
            bytes[index] ^= 1u8 << rng.random_range(0..8u32);
            debug!(index, "Simulated station corrupting a frame");
        }

        Ok(bytes)
    }
}

impl SerialLink for SimulatedStation {
    fn clear_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        // anything other than the request is ignored, like the real station does
        if bytes == REQUEST_FRAME {
            let response = self.respond()?;
            self.pending.extend_from_slice(&response);
        }
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.pending.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if self.pending.len() < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "simulated station has no more bytes",
            ));
        }
        buf.copy_from_slice(&self.pending[..buf.len()]);
        self.pending.drain(..buf.len());
        Ok(())
    }
}
