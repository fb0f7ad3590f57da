use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use swallow_core::protocol::{FRAME_SIZE, REQUEST_FRAME, build_frame};
use swallow_core::{FieldLayout, Reading};
use swallow_driver::{
    Config, DRIVER_NAME, DriverError, IO_RETRY_DELAY, LinkConfig, OpenError, SerialLink,
    SwallowDriver, Transport, TransportError,
};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const FIXTURE_FRAME: &str = "ccdd00022a0e010000ac41cd4c7d44cdcc44419a99594000008042d20400000000a045cdccb8419a99f94001000000eeef";

/// A station that answers each request with the next scripted response.
struct ScriptedLink {
    script: VecDeque<Vec<u8>>,
    /// Sent once the script runs out.
    fallback: Option<Vec<u8>>,
    pending: Vec<u8>,
    requests: Arc<AtomicUsize>,
    /// `clear_input` fails this many more times before the link recovers.
    io_failures: usize,
}

impl ScriptedLink {
    fn new(script: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: None,
            pending: Vec::new(),
            requests: Arc::new(AtomicUsize::new(0)),
            io_failures: 0,
        }
    }

    fn failing(mut self, times: usize) -> Self {
        self.io_failures = times;
        self
    }

    fn repeating(mut self, response: Vec<u8>) -> Self {
        self.fallback = Some(response);
        self
    }

    fn request_counter(&self) -> Arc<AtomicUsize> {
        self.requests.clone()
    }
}

impl SerialLink for ScriptedLink {
    fn clear_input(&mut self) -> io::Result<()> {
        if self.io_failures > 0 {
            self.io_failures -= 1;
            return Err(io::Error::other("device unplugged"));
        }
        self.pending.clear();
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        assert_eq!(bytes, REQUEST_FRAME);
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(response) = self.script.pop_front().or_else(|| self.fallback.clone()) {
            self.pending.extend_from_slice(&response);
        }
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.pending.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if self.pending.len() < buf.len() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        buf.copy_from_slice(&self.pending[..buf.len()]);
        self.pending.drain(..buf.len());
        Ok(())
    }
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

fn reading(out_temp: f64, long_term_rain: f64, long_term_geiger: u32) -> Reading {
    Reading {
        wind_dir: 90,
        out_temp,
        pressure: 1009.8,
        long_term_rain,
        wind_speed: 1.2,
        out_humidity: 70.0,
        long_term_geiger,
        illumination: 800.0,
        in_temp: 21.0,
        max_wind: 2.6,
        downfall: false,
    }
}

fn frame_for(reading: &Reading) -> Vec<u8> {
    let payload = FieldLayout::STANDARD.encode(reading).unwrap();
    build_frame(&payload).into_bytes()
}

fn corrupted(mut frame: Vec<u8>) -> Vec<u8> {
    frame[10] ^= 0x01;
    frame
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.acquisition.settle_delay_secs = 0.0;
    config.station.loop_interval = 0.01;
    config
}

#[tokio::test]
async fn decodes_the_reference_frame() {
    let link = ScriptedLink::new([hex_bytes(FIXTURE_FRAME)]);
    let mut driver = SwallowDriver::open_with(link, fast_config()).unwrap();

    let packet = driver.next_packet(&CancellationToken::new()).await.unwrap();

    assert_eq!(packet.reading.wind_dir, 270);
    assert_eq!(packet.reading.out_temp, 21.5);
    assert_eq!(packet.reading.pressure, 1013.2);
    assert_eq!(packet.reading.long_term_rain, 12.3);
    assert_eq!(packet.reading.wind_speed, 3.4);
    assert_eq!(packet.reading.out_humidity, 64.0);
    assert_eq!(packet.reading.long_term_geiger, 1234);
    assert_eq!(packet.reading.illumination, 5120.0);
    assert_eq!(packet.reading.in_temp, 23.1);
    assert_eq!(packet.reading.max_wind, 7.8);
    assert!(packet.reading.downfall);

    // first packet only establishes the baselines
    assert_eq!(packet.deltarain, 0.0);
    assert_eq!(packet.geiger, 0);
    assert_eq!(packet.date_time.subsec_nanosecond(), 0);
}

#[tokio::test]
async fn recovers_from_short_and_corrupt_frames() {
    let good = reading(18.5, 3.0, 40);
    let link = ScriptedLink::new([
        frame_for(&good)[..20].to_vec(),
        corrupted(frame_for(&good)),
        frame_for(&good),
    ]);
    let requests = link.request_counter();
    let mut driver = SwallowDriver::open_with(link, fast_config()).unwrap();

    let packet = driver.next_packet(&CancellationToken::new()).await.unwrap();

    assert_eq!(packet.reading.out_temp, 18.5);
    assert_eq!(packet.reading.long_term_geiger, 40);
    // short frame retried within the first cycle, corrupt frame discarded it
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn short_frame_after_every_attempt() {
    let link = ScriptedLink::new([vec![0xCC; 10], vec![0xCC; 10], vec![0xCC; 10]]);
    let requests = link.request_counter();
    let mut transport = Transport::new(link, Duration::ZERO, 3);

    let err = transport.acquire_frame().await.unwrap_err();

    match err {
        TransportError::ShortFrame {
            attempts,
            available,
            expected,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(available, 10);
            assert_eq!(expected, FRAME_SIZE);
        }
        other => panic!("expected a short frame, got {other:?}"),
    }
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_max_cycles() {
    let bad = corrupted(frame_for(&reading(20.0, 1.0, 1)));
    let link = ScriptedLink::new([]).repeating(bad);
    let requests = link.request_counter();

    let mut config = fast_config();
    config.acquisition.max_cycles = Some(4);
    let mut driver = SwallowDriver::open_with(link, config).unwrap();

    let err = driver
        .next_packet(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::CyclesExhausted(4)));
    assert_eq!(requests.load(Ordering::SeqCst), 4);
    assert_eq!(driver.state().last_cumulative_rain(), None);
}

#[tokio::test]
async fn cancellation_interrupts_the_settle_delay() {
    let link = ScriptedLink::new([frame_for(&reading(20.0, 1.0, 1))]);
    let mut config = fast_config();
    config.acquisition.settle_delay_secs = 3600.0;
    let mut driver = SwallowDriver::open_with(link, config).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), driver.next_packet(&cancel))
        .await
        .expect("cancellation should end the cycle promptly");

    assert!(matches!(result, Err(DriverError::Cancelled)));
    assert_eq!(driver.state().last_cumulative_rain(), None);
    assert_eq!(driver.state().last_accepted_outside_temp(), None);
}

#[tokio::test]
async fn io_error_starts_a_fresh_cycle_after_a_pause() {
    let link = ScriptedLink::new([frame_for(&reading(17.0, 5.0, 20))]).failing(1);
    let requests = link.request_counter();
    let mut driver = SwallowDriver::open_with(link, fast_config()).unwrap();

    let started = Instant::now();
    let packet = driver.next_packet(&CancellationToken::new()).await.unwrap();

    assert_eq!(packet.reading.out_temp, 17.0);
    assert!(started.elapsed() >= IO_RETRY_DELAY);
    // the failed cycle never got as far as writing the request
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dead_link_does_not_spin() {
    let link = ScriptedLink::new([]).failing(usize::MAX);
    let mut driver = SwallowDriver::open_with(link, fast_config()).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), driver.next_packet(&cancel))
        .await
        .expect("cancellation should end the retry pause");
    assert!(matches!(result, Err(DriverError::Cancelled)));
}

#[tokio::test]
async fn dead_link_retries_at_the_pause_cadence() {
    let link = ScriptedLink::new([]).failing(usize::MAX);
    let mut config = fast_config();
    config.acquisition.max_cycles = Some(3);
    let mut driver = SwallowDriver::open_with(link, config).unwrap();

    let started = Instant::now();
    let err = driver
        .next_packet(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::CyclesExhausted(3)));
    // a pause follows each of the first two failures, none after the last
    assert!(started.elapsed() >= IO_RETRY_DELAY * 2);
    assert!(driver.is_open());
}

#[test]
fn missing_serial_port_fails_to_open() {
    let mut config = Config::default();
    config.station.port = "/dev/swallow-missing-port".to_string();

    match SwallowDriver::open(config) {
        Err(OpenError::Port { port, .. }) => assert_eq!(port, "/dev/swallow-missing-port"),
        Err(other) => panic!("expected a port error, got {other}"),
        Ok(_) => panic!("a missing serial port should not open"),
    }
}

#[tokio::test]
async fn derives_metrics_across_packets() {
    let link = ScriptedLink::new([
        frame_for(&reading(20.0, 10.0, 100)),
        frame_for(&reading(26.0, 12.3, 150)),
        frame_for(&reading(24.9, 4.0, 90)),
    ]);
    let mut driver = SwallowDriver::open_with(link, fast_config()).unwrap();
    let cancel = CancellationToken::new();

    let first = driver.next_packet(&cancel).await.unwrap();
    assert_eq!(first.deltarain, 0.0);
    assert_eq!(first.geiger, 0);
    assert_eq!(first.reading.out_temp, 20.0);

    // 26.0 jumps 6 degrees and is replaced by the last accepted value
    let second = driver.next_packet(&cancel).await.unwrap();
    assert!((second.deltarain - 2.3).abs() < 1e-9);
    assert_eq!(second.geiger, 50);
    assert_eq!(second.reading.out_temp, 20.0);

    // counters reset, temperature within threshold of 20.0
    let third = driver.next_packet(&cancel).await.unwrap();
    assert_eq!(third.deltarain, 0.0);
    assert_eq!(third.geiger, 0);
    assert_eq!(third.reading.out_temp, 24.9);

    assert_eq!(driver.state().last_cumulative_rain(), Some(4.0));
    assert_eq!(driver.state().last_cumulative_radiation(), Some(90));
}

#[tokio::test]
async fn closed_driver_refuses_to_pull() {
    let link = ScriptedLink::new([frame_for(&reading(20.0, 1.0, 1))]);
    let requests = link.request_counter();
    let mut driver = SwallowDriver::open_with(link, fast_config()).unwrap();

    driver.close();
    assert!(!driver.is_open());

    let err = driver
        .next_packet(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Closed));
    assert_eq!(requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn run_delivers_packets_until_cancelled() {
    let link = ScriptedLink::new([]).repeating(frame_for(&reading(19.0, 2.0, 10)));
    let driver = SwallowDriver::open_with(link, fast_config()).unwrap();

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);
    let handle = tokio::spawn(driver.run(cancel.clone(), tx));

    for _ in 0..3 {
        let packet = rx.recv().await.unwrap();
        assert_eq!(packet.reading.out_temp, 19.0);
        assert_eq!(packet.deltarain, 0.0);
    }

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn run_stops_when_the_receiver_is_dropped() {
    let link = ScriptedLink::new([]).repeating(frame_for(&reading(19.0, 2.0, 10)));
    let driver = SwallowDriver::open_with(link, fast_config()).unwrap();

    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let result = driver.run(CancellationToken::new(), tx).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn simulated_station_end_to_end() {
    let mut config = fast_config();
    config.link = LinkConfig::Simulated {
        short_read_ratio: 0.3,
        corrupt_ratio: 0.3,
    };
    let mut driver = SwallowDriver::open(config).unwrap();
    assert_eq!(driver.hardware_name(), DRIVER_NAME);

    let cancel = CancellationToken::new();
    for _ in 0..5 {
        let packet = driver.next_packet(&cancel).await.unwrap();
        assert!((0.0..=100.0).contains(&packet.reading.out_humidity));
        assert!(packet.reading.wind_dir < 360);
    }

    // reopening swaps the link but keeps the baselines
    let baseline = driver.state().last_cumulative_radiation();
    driver.reopen().unwrap();
    assert!(driver.is_open());
    assert_eq!(driver.state().last_cumulative_radiation(), baseline);
    driver.next_packet(&cancel).await.unwrap();
}

#[tokio::test]
async fn opens_from_a_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [station]
        port = "sim0"
        loop_interval = 0.5

        [acquisition]
        settle_delay_secs = 0.0
        outlier_threshold = 2.5

        [link]
        type = "simulated"
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    let mut driver = SwallowDriver::open(config).unwrap();

    assert_eq!(driver.config().station.port, "sim0");
    assert_eq!(driver.state().outlier_threshold(), 2.5);

    let packet = driver.next_packet(&CancellationToken::new()).await.unwrap();
    assert_eq!(packet.deltarain, 0.0);
}

#[test]
fn invalid_config_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[acquisition]\nread_attempts = 0\n").unwrap();

    assert!(Config::load(file.path()).is_err());
}
