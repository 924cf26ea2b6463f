use crate::args::ReplayArgs;
use crate::shared::acquire::{FixOutcome, FixReport, FixRequest, acquire_position};
use crate::shared::replay::{ReserveProfile, ScriptedPlatform};
use anyhow::{Result, bail};
use std::path::Path;

// Public replay command entrypoint: same engine, recorded sentences, simulated clock.
pub fn run_replay(args: ReplayArgs) -> Result<()> {
    let report = replay_file(
        &args.file,
        FixRequest::new(args.timeout_secs, args.min_reserve_mv),
        reserve_profile(&args.reserve_mv),
    )?;
    if args.stats {
        eprintln!("[STAT] {:?}", report.stats);
    }
    match report.outcome {
        FixOutcome::Success { .. } => {
            println!("{}", report.outcome);
            Ok(())
        }
        outcome => bail!("{outcome}"),
    }
}

// No samples means an unlimited reserve.
fn reserve_profile(samples: &[u32]) -> ReserveProfile {
    match samples {
        [] => ReserveProfile::Fixed(u32::MAX),
        [mv] => ReserveProfile::Fixed(*mv),
        _ => ReserveProfile::Sequence(samples.to_vec()),
    }
}

fn replay_file(path: &Path, request: FixRequest, reserve: ReserveProfile) -> Result<FixReport> {
    let mut platform = ScriptedPlatform::from_log_file(path, reserve)?;
    let report = acquire_position(&mut platform, request);
    log::debug!(
        "replay of {} left {} unread line(s), {} config frame(s), {} watchdog reload(s)",
        path.display(),
        platform.remaining_lines(),
        platform.sent_frames().len(),
        platform.watchdog_reloads()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LOG: &str = "\
$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A

$GPGGA,,,,,,0,00,99.99,,,,,,*48
$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47
";

    #[test]
    fn replays_recorded_log_to_a_fix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.nmea");
        fs::write(&path, LOG).unwrap();

        let profile = ReserveProfile::Fixed(3_000);
        let report = replay_file(&path, FixRequest::new(60, 0), profile).unwrap();
        let position = report.outcome.position().unwrap();
        assert_eq!(position.altitude_m, 545);
        assert_eq!(report.stats.sentences, 3);
    }

    #[test]
    fn low_reserve_aborts_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.nmea");
        fs::write(&path, LOG).unwrap();

        let report = replay_file(
            &path,
            FixRequest::new(60, 2_500),
            reserve_profile(&[3_000, 1_900]),
        )
        .unwrap();
        assert!(matches!(
            report.outcome,
            FixOutcome::Aborted {
                elapsed_secs: 2,
                reserve_mv: 1_900,
            }
        ));
    }

    #[test]
    fn missing_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.nmea");
        let result = replay_file(&missing, FixRequest::new(5, 0), reserve_profile(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn reserve_samples_pick_a_profile() {
        assert_eq!(reserve_profile(&[]), ReserveProfile::Fixed(u32::MAX));
        assert_eq!(reserve_profile(&[2_800]), ReserveProfile::Fixed(2_800));
        assert_eq!(
            reserve_profile(&[3_000, 1_900]),
            ReserveProfile::Sequence(vec![3_000, 1_900])
        );
    }
}
