use crate::args::TrackArgs;
use crate::commands::fix::{fix_request, open_platform};
use crate::shared::acquire::{FixOutcome, FixPlatform, FixReport, acquire_position};
use crate::shared::signal::{install_ctrlc_handler, pause_while_running};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

// Public track command entrypoint.
// One process, one open port, one session per interval until Ctrl-C.
pub fn run_track(args: TrackArgs) -> Result<()> {
    let running = install_ctrlc_handler()?;
    let fix_args = args.to_fix_args();
    let (_lock, mut platform) = open_platform(&fix_args)?;
    let interval = Duration::from_secs(args.interval_secs.max(1));

    let mut totals = TrackTotals::default();
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        let report = acquire_position(&mut platform, fix_request(&fix_args));
        totals.record(&report.outcome);
        println!("{}", report_line(Utc::now(), &report));

        // A session longer than the interval starts the next one right away.
        let rest = interval.saturating_sub(started.elapsed());
        if !pause_while_running(&running, rest, || platform.reload_watchdog()) {
            break;
        }
    }

    log::info!(
        "tracking stopped: {} fix(es) in {} session(s), receiver on for {}s",
        totals.fixes,
        totals.sessions,
        totals.receiver_secs
    );
    Ok(())
}

// Running counters for the stop summary.
#[derive(Debug, Default, PartialEq, Eq)]
struct TrackTotals {
    sessions: u64,
    fixes: u64,
    receiver_secs: u64,
}

impl TrackTotals {
    fn record(&mut self, outcome: &FixOutcome) {
        self.sessions += 1;
        if outcome.position().is_some() {
            self.fixes += 1;
        }
        self.receiver_secs += u64::from(outcome.elapsed_secs());
    }
}

fn report_line(at: DateTime<Utc>, report: &FixReport) -> String {
    let timestamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
    match report.outcome {
        FixOutcome::Success { position, .. } => format!(
            "{timestamp} {} ({:.6}, {:.6})",
            report.outcome,
            position.latitude_deg(),
            position.longitude_deg()
        ),
        outcome => format!("{timestamp} {outcome}"),
    }
}
