use std::time::Duration;

use jiff::Timestamp;
use swallow_core::protocol::validate;
use swallow_core::{
    DecodeError, Field, FieldLayout, OutputPacket, Reading, StationState, ValidationError,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::diag;
use crate::link::{self, SerialLink};
use crate::transport::{Transport, TransportError};

pub const DRIVER_NAME: &str = "Swallow";
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shortest wait before retrying a cycle that failed on serial I/O. Such
/// failures return before the settle delay, so without a pause a dead link
/// would be polled in a tight loop.
pub const IO_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The station cannot be reached at all. Surfaced to the host, never
/// retried by the driver.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("failed to open serial port {port}")]
    Port {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Why a single acquisition cycle produced no reading.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("acquisition cancelled")]
    Cancelled,
    #[error("serial link is closed")]
    Closed,
    #[error("no valid frame after {0} cycles")]
    CyclesExhausted(u64),
}

/// Pull-based driver for one Swallow station.
///
/// Owns the serial link and the [`StationState`]; each call to
/// [`SwallowDriver::next_packet`] runs request/validate/decode cycles until
/// one succeeds and then applies the derived metrics.
pub struct SwallowDriver<L = Box<dyn SerialLink>> {
    config: Config,
    layout: FieldLayout,
    transport: Option<Transport<L>>,
    state: StationState,
}

impl SwallowDriver {
    /// Open the link selected by `config`.
    pub fn open(config: Config) -> Result<Self, OpenError> {
        config.validate()?;
        let layout = FieldLayout::STANDARD.with_byte_order(config.station.byte_order);
        let link = link::connect(&config, &layout)?;
        Self::open_with(link, config)
    }

    /// Release the current link, if any, and open a fresh one. Station state
    /// is kept.
    pub fn reopen(&mut self) -> Result<(), OpenError> {
        self.close();
        let link = link::connect(&self.config, &self.layout)?;
        self.transport = Some(self.transport_for(link));
        info!(port = %self.config.station.port, "Reopened station link");
        Ok(())
    }
}

impl<L: SerialLink> SwallowDriver<L> {
    /// Drive an already opened link.
    pub fn open_with(link: L, config: Config) -> Result<Self, OpenError> {
        config.validate()?;

        info!(
            version = DRIVER_VERSION,
            port = %config.station.port,
            loop_interval_secs = config.station.loop_interval,
            "Driver opened"
        );

        let mut driver = Self {
            layout: FieldLayout::STANDARD.with_byte_order(config.station.byte_order),
            state: StationState::with_threshold(config.acquisition.outlier_threshold),
            transport: None,
            config,
        };
        driver.transport = Some(driver.transport_for(link));
        Ok(driver)
    }

    fn transport_for(&self, link: L) -> Transport<L> {
        Transport::new(
            link,
            self.config.settle_delay(),
            self.config.acquisition.read_attempts,
        )
        .verbose(self.config.debug_read())
    }

    fn io_retry_delay(&self) -> Duration {
        self.config.settle_delay().max(IO_RETRY_DELAY)
    }

    pub fn hardware_name(&self) -> &'static str {
        DRIVER_NAME
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &StationState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Release the serial link. Later pulls fail with
    /// [`DriverError::Closed`] until the driver is reopened.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            info!(port = %self.config.station.port, "Closed station link");
        }
    }

    /// Run full cycles until one yields a valid reading, then post-process it.
    ///
    /// Failed cycles are discarded whole and a new request is sent; there is
    /// no limit unless `max_cycles` is configured. Cancellation is observed
    /// at any await point, including the settle delay, and leaves the
    /// station state untouched.
    pub async fn next_packet(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<OutputPacket, DriverError> {
        let verbose = self.config.debug_read();
        let mut cycles: u64 = 0;

        loop {
            let Some(transport) = self.transport.as_mut() else {
                return Err(DriverError::Closed);
            };
            cycles += 1;

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(DriverError::Cancelled),
                outcome = run_cycle(transport, &self.layout) => outcome,
            };

            match outcome {
                Ok(reading) => {
                    log_reading(&reading, verbose);
                    let packet = self.state.process(reading, Timestamp::now());
                    diag!(
                        verbose,
                        cycles,
                        out_temp = packet.reading.out_temp,
                        deltarain = packet.deltarain,
                        geiger = packet.geiger,
                        "Derived metrics"
                    );
                    return Ok(packet);
                }
                Err(e) => {
                    diag!(
                        verbose,
                        cycle = cycles,
                        error = %e,
                        "Acquisition cycle failed, requesting a new frame"
                    );
                    if let Some(max) = self.config.acquisition.max_cycles
                        && cycles >= max
                    {
                        return Err(DriverError::CyclesExhausted(cycles));
                    }
                    if matches!(e, CycleError::Transport(TransportError::Io(_)))
                        && !pause(cancel, self.io_retry_delay()).await
                    {
                        return Err(DriverError::Cancelled);
                    }
                }
            }
        }
    }

    /// Pull packets into `tx` every `loop_interval` until cancelled or the
    /// receiver goes away. The link is released on every exit path.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        tx: mpsc::Sender<OutputPacket>,
    ) -> Result<(), DriverError> {
        let interval = self.config.loop_interval();
        info!(
            interval_secs = interval.as_secs_f64(),
            "Acquisition loop started"
        );

        let result = loop {
            let packet = match self.next_packet(&cancel).await {
                Ok(packet) => packet,
                Err(DriverError::Cancelled) => break Ok(()),
                Err(e) => break Err(e),
            };

            if tx.send(packet).await.is_err() {
                info!("Packet receiver closed, acquisition loop shutting down");
                break Ok(());
            }

            if !pause(&cancel, interval).await {
                break Ok(());
            }
        };

        info!("Acquisition loop shutting down");
        self.close();
        result
    }
}

/// One request/validate/decode pass.
async fn run_cycle<L: SerialLink>(
    transport: &mut Transport<L>,
    layout: &FieldLayout,
) -> Result<Reading, CycleError> {
    let frame = transport.acquire_frame().await?;
    let payload = validate(&frame)?;
    Ok(layout.decode(&payload)?)
}

/// Sleep for `duration`; false if cancelled first.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn log_reading(reading: &Reading, verbose: bool) {
    for field in Field::ALL {
        diag!(
            verbose,
            field = field.name(),
            value = %reading.value(field),
            "Decoded field"
        );
    }
}
