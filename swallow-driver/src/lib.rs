pub mod config;
pub mod driver;
pub mod link;
pub mod transport;

pub use config::{AcquisitionConfig, Config, ConfigError, LinkConfig, StationConfig};
pub use driver::{
    CycleError, DRIVER_NAME, DRIVER_VERSION, DriverError, IO_RETRY_DELAY, OpenError, SwallowDriver,
};
pub use link::{SerialLink, SerialPortLink, SimulatedStation};
pub use transport::{Transport, TransportError};

/// Emit a diagnostic at info level when `debug_read` is on, debug otherwise.
#[macro_export]
macro_rules! diag {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            ::tracing::info!($($arg)+)
        } else {
            ::tracing::debug!($($arg)+)
        }
    };
}
