use crate::args::FixArgs;
use crate::shared::acquire::{FixOutcome, FixRequest, acquire_position};
use crate::shared::lock::PortLock;
use crate::shared::reserve::ReserveSource;
use crate::shared::serial::{SerialPlatform, SerialSettings};
use crate::shared::watchdog::SoftWatchdog;
use anyhow::{Result, bail};
use std::time::Duration;

// Public fix command entrypoint: one session, report on stdout, non-zero exit otherwise.
pub fn run_fix(args: FixArgs) -> Result<()> {
    let (_lock, mut platform) = open_platform(&args)?;
    let report = acquire_position(&mut platform, fix_request(&args));
    log::debug!("session stats: {:?}", report.stats);

    match report.outcome {
        FixOutcome::Success { .. } => {
            println!("{}", report.outcome);
            Ok(())
        }
        outcome => bail!("{outcome}"),
    }
}

pub(crate) fn fix_request(args: &FixArgs) -> FixRequest {
    FixRequest::new(args.timeout_secs, args.min_reserve_mv)
}

// Lock the port first so a second tracker never touches the module.
pub(crate) fn open_platform(args: &FixArgs) -> Result<(PortLock, SerialPlatform)> {
    let lock = PortLock::for_port(&args.serial_port, args.lock_file.as_deref())?;
    log::debug!("holding port lock {}", lock.path().display());

    let settings = SerialSettings {
        port: args.serial_port.clone(),
        baud_rate: args.baud_rate,
        read_timeout: Duration::from_millis(args.read_timeout_ms.max(1)),
        command_gap: Duration::from_millis(args.command_gap_ms),
    };
    let reserve = ReserveSource::from_args(args.reserve_mv, args.reserve_file.as_deref());
    let mut platform = SerialPlatform::open(settings, reserve)?;

    if args.watchdog_secs > 0 {
        let watchdog = SoftWatchdog::start(Duration::from_secs(args.watchdog_secs))?;
        platform = platform.with_watchdog(watchdog);
    }
    Ok((lock, platform))
}
