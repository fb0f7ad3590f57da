use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use tracing::info;

use super::SerialLink;
use crate::driver::OpenError;

/// The station on a real serial device, 8N1.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialPortLink {
    pub fn open(path: &str, baud_rate: u32, timeout_ms: u64) -> Result<Self, OpenError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .timeout(Duration::from_millis(timeout_ms))
            .open()
            .map_err(|source| OpenError::Port {
                port: path.to_string(),
                source,
            })?;

        info!(port = path, baud_rate, "Opened serial port");
        Ok(Self { port })
    }
}

impl SerialLink for SerialPortLink {
    fn clear_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::other)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let available = self.port.bytes_to_read().map_err(io::Error::other)?;
        Ok(available as usize)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.port.read_exact(buf)
    }
}
