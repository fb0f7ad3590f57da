use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use swallow_core::OutputPacket;
use swallow_driver::{Config, DRIVER_NAME, DRIVER_VERSION, SwallowDriver};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "swallow")]
#[command(about = "Swallow weather station driver")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "swallow.toml")]
    config: PathBuf,

    /// Serial device, overrides `station.port`
    #[arg(short, long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "swallow=info,swallow_driver=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };
    if let Some(port) = cli.port {
        config.station.port = port;
    }

    info!(
        driver = DRIVER_NAME,
        version = DRIVER_VERSION,
        port = %config.station.port,
        link = ?config.link,
        "Starting swallow"
    );

    let driver = SwallowDriver::open(config)?;
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(16);

    let mut driver_handle = tokio::spawn(driver.run(cancel.clone(), tx));
    let printer_handle = tokio::spawn(print_packets(rx));

    let result = tokio::select! {
        result = &mut driver_handle => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
            driver_handle.await
        }
    };

    // the printer drains whatever is left once the driver drops its sender
    let _ = printer_handle.await;

    match result? {
        Ok(()) => {
            info!("swallow shut down complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Acquisition stopped");
            Err(e.into())
        }
    }
}

/// Write each packet to stdout as one JSON object per line.
async fn print_packets(mut rx: mpsc::Receiver<OutputPacket>) {
    let stdout = std::io::stdout();

    while let Some(packet) = rx.recv().await {
        info!(
            date_time = %packet.date_time,
            out_temp = packet.reading.out_temp,
            deltarain = packet.deltarain,
            geiger = packet.geiger,
            "Packet emitted"
        );

        let line = match serde_json::to_string(&packet) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to serialize packet");
                continue;
            }
        };

        let mut out = stdout.lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            error!(error = %e, "Failed to write packet to stdout");
            break;
        }
    }
}
