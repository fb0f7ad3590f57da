pub mod serial;
pub mod simulated;

use std::io;

use swallow_core::FieldLayout;

use crate::config::{Config, LinkConfig};
use crate::driver::OpenError;

pub use serial::SerialPortLink;
pub use simulated::SimulatedStation;

/// Byte-level access to the station.
///
/// Calls are synchronous: every read is bounded by the link's own timeout and
/// frames are small, so a cycle never blocks for long outside the settle
/// delay.
pub trait SerialLink: Send + 'static {
    /// Drop anything already buffered on the receive side.
    fn clear_input(&mut self) -> io::Result<()>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Number of received bytes waiting to be read.
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        (**self).bytes_to_read()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact(buf)
    }
}

/// Open the link selected by `config`.
pub fn connect(config: &Config, layout: &FieldLayout) -> Result<Box<dyn SerialLink>, OpenError> {
    match config.link {
        LinkConfig::Serial {
            baud_rate,
            timeout_ms,
        } => {
            let link = SerialPortLink::open(&config.station.port, baud_rate, timeout_ms)?;
            Ok(Box::new(link))
        }
        LinkConfig::Simulated {
            short_read_ratio,
            corrupt_ratio,
        } => Ok(Box::new(SimulatedStation::new(
            layout.clone(),
            short_read_ratio,
            corrupt_ratio,
        ))),
    }
}
