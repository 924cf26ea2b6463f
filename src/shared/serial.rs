use crate::shared::acquire::{FixPlatform, Wake};
use crate::shared::buffer::{SentenceBuffer, SentenceConsumer, SentenceProducer, sentence_pair};
use crate::shared::reserve::ReserveSource;
use crate::shared::ubx::ConfigLink;
use crate::shared::watchdog::SoftWatchdog;
use anyhow::{Context, Result};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Longest single suspension; the module emits one sentence per second.
const IDLE_TICK: Duration = Duration::from_secs(1);
const READ_CHUNK_BYTES: usize = 256;

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub command_gap: Duration,
}

struct ReceiveWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<SentenceProducer>,
}

// GPS module behind a host serial port. A reader thread stands in for the
// DMA transfer and owns the producer side of the sentence pair while receiving.
pub struct SerialPlatform {
    settings: SerialSettings,
    port: Box<dyn SerialPort>,
    producer: Option<SentenceProducer>,
    consumer: SentenceConsumer,
    worker: Option<ReceiveWorker>,
    deadline: Option<Instant>,
    reserve: ReserveSource,
    watchdog: Option<SoftWatchdog>,
}

impl SerialPlatform {
    pub fn open(settings: SerialSettings, reserve: ReserveSource) -> Result<Self> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
            .with_context(|| {
                format!(
                    "opening serial port failed: {} @ {}",
                    settings.port, settings.baud_rate
                )
            })?;
        log::info!(
            "GPS port {} open at {} baud",
            settings.port,
            settings.baud_rate
        );
        Ok(Self::with_port(settings, port, reserve))
    }

    // Wrap an already opened port; its read timeout is left as configured.
    pub fn with_port(
        settings: SerialSettings,
        port: Box<dyn SerialPort>,
        reserve: ReserveSource,
    ) -> Self {
        let (producer, consumer) = sentence_pair();
        Self {
            settings,
            port,
            producer: Some(producer),
            consumer,
            worker: None,
            deadline: None,
            reserve,
            watchdog: None,
        }
    }

    pub fn with_watchdog(mut self, watchdog: SoftWatchdog) -> Self {
        self.watchdog = Some(watchdog);
        self
    }
}

impl ConfigLink for SerialPlatform {
    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.port
            .write_all(frame)
            .context("writing UBX config command failed")?;
        self.port
            .flush()
            .context("flushing UBX config command failed")?;
        Ok(())
    }

    // A full selection is 18 command gaps; the watchdog is fed after each one.
    fn settle(&mut self) {
        thread::sleep(self.settings.command_gap);
        self.reload_watchdog();
    }
}

impl FixPlatform for SerialPlatform {
    fn arm_deadline(&mut self, seconds: u32) {
        self.deadline = Some(Instant::now() + Duration::from_secs(u64::from(seconds)));
    }

    fn clear_deadline(&mut self) {
        self.deadline = None;
    }

    fn deadline_fired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn start_receive(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        // The module keeps talking between sessions; only sentences sent after
        // this point may produce a fix.
        self.port
            .clear(ClearBuffer::Input)
            .context("discarding stale serial input failed")?;
        let reader = self
            .port
            .try_clone()
            .context("cloning serial port for the reader failed")?;

        // A producer lost to a failed spawn is replaced together with its consumer.
        let mut producer = match self.producer.take() {
            Some(producer) => producer,
            None => {
                let (producer, consumer) = sentence_pair();
                self.consumer = consumer;
                producer
            }
        };
        self.consumer.drain();
        producer.arm();

        let running = Arc::new(AtomicBool::new(true));
        let worker_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("gps-receive".to_string())
            .spawn(move || receive_loop(reader, producer, worker_running))
            .context("starting GPS receive thread failed")?;
        self.worker = Some(ReceiveWorker { running, handle });
        Ok(())
    }

    fn stop_receive(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.running.store(false, Ordering::SeqCst);
        match worker.handle.join() {
            Ok(producer) => self.producer = Some(producer),
            Err(_) => log::error!("GPS receive thread panicked"),
        }
    }

    fn idle(&mut self) -> Wake {
        let wait = match self.deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(IDLE_TICK),
            None => IDLE_TICK,
        };
        match self.consumer.wait(wait) {
            Some(handoff) => Wake::Boundary(handoff),
            None => Wake::Tick,
        }
    }

    fn recycle(&mut self, buffer: SentenceBuffer) {
        self.consumer.recycle(buffer);
    }

    fn reserve_mv(&mut self) -> u32 {
        let mv = self.reserve.sample_mv();
        log::debug!("reserve voltage {mv} mV");
        mv
    }

    fn reload_watchdog(&mut self) {
        if let Some(watchdog) = &self.watchdog {
            watchdog.reload();
        }
    }
}

impl Drop for SerialPlatform {
    fn drop(&mut self) {
        self.stop_receive();
    }
}

// Reader thread body. Read errors end the transfer; the controller then just
// sees no more sentences until its deadline.
fn receive_loop(
    mut port: Box<dyn SerialPort>,
    mut producer: SentenceProducer,
    running: Arc<AtomicBool>,
) -> SentenceProducer {
    let mut chunk = [0_u8; READ_CHUNK_BYTES];
    while running.load(Ordering::SeqCst) {
        match port.read(&mut chunk) {
            Ok(0) => {}
            Ok(size) => {
                let lines = producer.push_bytes(&chunk[..size]);
                if lines > 0 {
                    log::trace!("{lines} line boundary event(s) from {size} bytes");
                }
            }
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {}
            Err(err) => {
                log::warn!("reading GPS stream from serial port failed: {err}");
                break;
            }
        }
    }
    producer
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::shared::acquire::{FixOutcome, FixRequest, acquire_position};
    use crate::shared::buffer::Handoff;
    use serialport::TTYPort;

    const LINE: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    fn pty_platform(command_gap: Duration) -> (TTYPort, SerialPlatform) {
        let (master, mut slave) = TTYPort::pair().unwrap();
        slave.set_timeout(Duration::from_millis(50)).unwrap();
        let settings = SerialSettings {
            port: "pty".to_string(),
            baud_rate: 9_600,
            read_timeout: Duration::from_millis(50),
            command_gap,
        };
        let platform =
            SerialPlatform::with_port(settings, Box::new(slave), ReserveSource::Fixed(3_000));
        (master, platform)
    }

    // Run one session while `feed` writes to the module side of the pty.
    fn session_with<F>(
        master: &mut TTYPort,
        platform: &mut SerialPlatform,
        secs: u32,
        feed: F,
    ) -> FixOutcome
    where
        F: FnOnce(&mut TTYPort) + Send,
    {
        thread::scope(|scope| {
            scope.spawn(move || feed(master));
            acquire_position(platform, FixRequest::new(secs, 0)).outcome
        })
    }

    fn write_line_after(delay: Duration) -> impl FnOnce(&mut TTYPort) + Send {
        move |master: &mut TTYPort| {
            thread::sleep(delay);
            master.write_all(LINE).unwrap();
        }
    }

    #[test]
    fn received_line_wakes_the_controller() {
        let (mut master, mut platform) = pty_platform(Duration::ZERO);
        platform.start_receive().unwrap();
        master.write_all(LINE).unwrap();

        let mut line = None;
        for _ in 0..5 {
            if let Wake::Boundary(Handoff::Line(buffer)) = platform.idle() {
                line = Some(buffer);
                break;
            }
        }
        platform.stop_receive();

        let buffer = line.expect("no sentence boundary");
        assert!(buffer.as_bytes().starts_with(b"$GPGGA,123519,4807.038,N"));
    }

    #[test]
    fn back_to_back_sessions_both_fix() {
        let (mut master, mut platform) = pty_platform(Duration::ZERO);
        for _ in 0..2 {
            let outcome = session_with(
                &mut master,
                &mut platform,
                5,
                write_line_after(Duration::from_millis(200)),
            );
            let position = outcome.position().expect("expected a fix");
            assert_eq!(position.altitude_m, 545);
        }
    }

    #[test]
    fn input_from_before_the_session_is_discarded() {
        let (mut master, mut platform) = pty_platform(Duration::ZERO);
        let first = session_with(&mut master, &mut platform, 1, |_| {});
        assert_eq!(first, FixOutcome::TimedOut { elapsed_secs: 1 });

        master.write_all(LINE).unwrap();
        thread::sleep(Duration::from_millis(100));

        let second = session_with(&mut master, &mut platform, 2, |_| {});
        assert_eq!(second, FixOutcome::TimedOut { elapsed_secs: 2 });
    }

    #[test]
    fn lost_port_ends_in_timeout() {
        let (master, mut platform) = pty_platform(Duration::ZERO);
        let outcome = thread::scope(|scope| {
            scope.spawn(move || {
                thread::sleep(Duration::from_millis(200));
                drop(master);
            });
            acquire_position(&mut platform, FixRequest::new(2, 0)).outcome
        });
        assert_eq!(outcome, FixOutcome::TimedOut { elapsed_secs: 2 });
    }

    #[test]
    fn slow_configuration_keeps_the_watchdog_fed() {
        let expired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&expired);
        let watchdog = SoftWatchdog::start_with_action(Duration::from_millis(500), move || {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        // 18 frames at 40 ms take longer than one watchdog period.
        let (_master, platform) = pty_platform(Duration::from_millis(40));
        let mut platform = platform.with_watchdog(watchdog);
        let report = acquire_position(&mut platform, FixRequest::new(1, 0));
        drop(platform);

        assert_eq!(report.outcome, FixOutcome::TimedOut { elapsed_secs: 1 });
        assert!(!expired.load(Ordering::SeqCst));
    }
}
