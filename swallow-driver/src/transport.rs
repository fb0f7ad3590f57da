use std::io;
use std::time::Duration;

use swallow_core::RawFrame;
use swallow_core::protocol::{FRAME_SIZE, REQUEST_FRAME};

use crate::diag;
use crate::link::SerialLink;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("serial I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("short frame: {available} of {expected} bytes available after {attempts} attempts")]
    ShortFrame {
        attempts: u32,
        available: usize,
        expected: usize,
    },
}

/// Request/response exchange with the station over a [`SerialLink`].
pub struct Transport<L> {
    link: L,
    settle_delay: Duration,
    read_attempts: u32,
    verbose: bool,
}

impl<L: SerialLink> Transport<L> {
    pub fn new(link: L, settle_delay: Duration, read_attempts: u32) -> Self {
        Self {
            link,
            settle_delay,
            read_attempts: read_attempts.max(1),
            verbose: false,
        }
    }

    /// Log every attempt at info level instead of debug.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Send the request and read back one full-size response.
    ///
    /// Each attempt flushes stale input, writes the request and waits the
    /// settle delay before checking how much the station has sent. When no
    /// attempt sees a complete frame the cycle fails with
    /// [`TransportError::ShortFrame`]; nothing partial is ever returned.
    pub async fn acquire_frame(&mut self) -> Result<RawFrame, TransportError> {
        let mut available = 0;

        for attempt in 1..=self.read_attempts {
            self.link.clear_input()?;
            self.link.write_all(&REQUEST_FRAME)?;
            tokio::time::sleep(self.settle_delay).await;

            available = self.link.bytes_to_read()?;
            diag!(
                self.verbose,
                attempt,
                max_attempts = self.read_attempts,
                available,
                "Polled station"
            );

            if available >= FRAME_SIZE {
                let mut buf = vec![0u8; FRAME_SIZE];
                self.link.read_exact(&mut buf)?;
                let frame = RawFrame::from(buf);
                diag!(self.verbose, frame = %frame.to_hex(), "Read response");
                return Ok(frame);
            }
        }

        Err(TransportError::ShortFrame {
            attempts: self.read_attempts,
            available,
            expected: FRAME_SIZE,
        })
    }
}
