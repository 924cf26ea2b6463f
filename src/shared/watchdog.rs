use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Process exit status after a watchdog expiry.
pub const WATCHDOG_EXIT_CODE: i32 = 70;

struct WatchdogState {
    started: Instant,
    last_reload_ms: AtomicU64,
    stop: AtomicBool,
}

impl WatchdogState {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

// Host stand-in for the independent watchdog: a monitor thread that fires
// when reload() has not been called for a whole period.
pub struct SoftWatchdog {
    state: Arc<WatchdogState>,
    monitor: Option<JoinHandle<()>>,
}

impl SoftWatchdog {
    // Expiry terminates the process, like a hardware reset would.
    pub fn start(period: Duration) -> Result<Self> {
        Self::start_with_action(period, move || {
            log::error!(
                "watchdog expired after {:?} without reload, terminating",
                period
            );
            std::process::exit(WATCHDOG_EXIT_CODE);
        })
    }

    pub fn start_with_action<F>(period: Duration, on_expire: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let state = Arc::new(WatchdogState {
            started: Instant::now(),
            last_reload_ms: AtomicU64::new(0),
            stop: AtomicBool::new(false),
        });
        let period_ms = period.as_millis().max(1) as u64;
        let poll = (period / 4).max(Duration::from_millis(5));
        let monitor_state = Arc::clone(&state);

        let monitor = thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || {
                while !monitor_state.stop.load(Ordering::SeqCst) {
                    thread::sleep(poll);
                    let idle_ms = monitor_state
                        .now_ms()
                        .saturating_sub(monitor_state.last_reload_ms.load(Ordering::SeqCst));
                    if idle_ms > period_ms && !monitor_state.stop.load(Ordering::SeqCst) {
                        on_expire();
                        return;
                    }
                }
            })
            .context("starting watchdog thread failed")?;

        Ok(Self {
            state,
            monitor: Some(monitor),
        })
    }

    pub fn reload(&self) {
        self.state
            .last_reload_ms
            .store(self.state.now_ms(), Ordering::SeqCst);
    }
}

impl Drop for SoftWatchdog {
    fn drop(&mut self) {
        self.state.stop.store(true, Ordering::SeqCst);
        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.join();
        }
    }
}
