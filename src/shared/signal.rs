use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const PAUSE_STEP: Duration = Duration::from_millis(250);

// Install Ctrl-C handler and return a shared run flag.
// The tracking loop only checks it between sessions; a running fix is never cut short.
pub fn install_ctrlc_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let running_for_signal = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_signal.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler failed")?;
    Ok(running)
}

// Sleep for `total` in short steps, calling `on_step` after each one.
// Returns false as soon as the run flag is cleared.
pub fn pause_while_running(
    running: &AtomicBool,
    total: Duration,
    mut on_step: impl FnMut(),
) -> bool {
    let started = Instant::now();
    while running.load(Ordering::SeqCst) {
        let left = total.saturating_sub(started.elapsed());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(PAUSE_STEP));
        on_step();
    }
    false
}
