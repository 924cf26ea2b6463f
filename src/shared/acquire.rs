use crate::shared::buffer::{Handoff, SentenceBuffer};
use crate::shared::gga::parse_gga;
use crate::shared::position::Position;
use crate::shared::ubx::{ConfigLink, NmeaSentence, SentenceMask, select_sentences};
use anyhow::Result;
use std::fmt;

// Range of the wake-up timer backing the deadline.
pub const MIN_TIMEOUT_SECS: u32 = 1;
pub const MAX_TIMEOUT_SECS: u32 = 65_536;

// Why the sole suspension point returned.
#[derive(Debug)]
pub enum Wake {
    Tick,
    Boundary(Handoff),
}

/// Everything the acquisition controller needs from the board: deadline timer,
/// low-power idle, receive transfer, reserve-voltage sampler and watchdog.
pub trait FixPlatform: ConfigLink {
    fn arm_deadline(&mut self, seconds: u32);
    fn clear_deadline(&mut self);
    fn deadline_fired(&self) -> bool;

    // Arm the double-buffer producer on buffer A and enable the receive path.
    fn start_receive(&mut self) -> Result<()>;
    fn stop_receive(&mut self);

    // Suspend until the deadline source ticks or a sentence boundary is signalled.
    fn idle(&mut self) -> Wake;
    fn recycle(&mut self, buffer: SentenceBuffer);

    fn reserve_mv(&mut self) -> u32;
    fn reload_watchdog(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixRequest {
    pub timeout_secs: u32,
    pub min_reserve_mv: u32,
}

impl FixRequest {
    pub fn new(timeout_secs: u32, min_reserve_mv: u32) -> Self {
        Self {
            timeout_secs: timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS),
            min_reserve_mv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixState {
    Idle,
    Configuring,
    Awaiting,
    Parsing,
    Succeeded,
    TimedOut,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    Success {
        position: Position,
        elapsed_secs: u32,
    },
    TimedOut {
        elapsed_secs: u32,
    },
    Aborted {
        elapsed_secs: u32,
        reserve_mv: u32,
    },
}

impl FixOutcome {
    pub fn elapsed_secs(&self) -> u32 {
        match *self {
            FixOutcome::Success { elapsed_secs, .. }
            | FixOutcome::TimedOut { elapsed_secs }
            | FixOutcome::Aborted { elapsed_secs, .. } => elapsed_secs,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match *self {
            FixOutcome::Success { position, .. } => Some(position),
            _ => None,
        }
    }
}

impl fmt::Display for FixOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixOutcome::Success {
                position,
                elapsed_secs,
            } => write!(f, "{position} Fix={elapsed_secs}s"),
            FixOutcome::TimedOut { elapsed_secs } => {
                write!(f, "GPS timeout after {elapsed_secs}s")
            }
            FixOutcome::Aborted {
                elapsed_secs,
                reserve_mv,
            } => write!(
                f,
                "GPS aborted after {elapsed_secs}s: reserve at {reserve_mv} mV"
            ),
        }
    }
}

// Counters for one session; discarded sentences only show up here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub resumes: u32,
    pub sentences: u32,
    pub dropped_lines: u32,
    pub checksum_errors: u32,
    pub field_errors: u32,
    pub range_rejections: u32,
    pub last_reserve_mv: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixReport {
    pub outcome: FixOutcome,
    pub stats: SessionStats,
}

// Transient state of one acquisition attempt.
struct FixSession {
    request: FixRequest,
    state: FixState,
    elapsed_secs: u32,
    stats: SessionStats,
}

impl FixSession {
    fn new(request: FixRequest) -> Self {
        Self {
            request,
            state: FixState::Idle,
            elapsed_secs: 0,
            stats: SessionStats::default(),
        }
    }

    fn enter(&mut self, state: FixState) {
        if self.state != state {
            log::trace!("fix state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn clamped_elapsed(&self) -> u32 {
        self.elapsed_secs.min(self.request.timeout_secs)
    }

    // Decode and range-check one handed-over line.
    fn parse(&mut self, buffer: &SentenceBuffer) -> Option<Position> {
        self.enter(FixState::Parsing);
        self.stats.sentences += 1;
        log::trace!("parsing buffer {:?}", buffer.half());
        match parse_gga(buffer.as_bytes()) {
            Ok(position) if position.is_valid() => Some(position),
            Ok(position) => {
                self.stats.range_rejections += 1;
                log::debug!("discarded out-of-range position {position}");
                None
            }
            Err(err) => {
                if err.is_checksum() {
                    self.stats.checksum_errors += 1;
                } else {
                    self.stats.field_errors += 1;
                }
                log::debug!("discarded sentence: {err}");
                None
            }
        }
    }
}

// Acquire one GGA position within `request.timeout_secs`.
// Always returns exactly one of Success, TimedOut or Aborted; no retry happens inside.
pub fn acquire_position<P: FixPlatform + ?Sized>(
    platform: &mut P,
    request: FixRequest,
) -> FixReport {
    let request = FixRequest::new(request.timeout_secs, request.min_reserve_mv);
    let mut session = FixSession::new(request);
    log::info!(
        "GPS fix started: timeout {}s, reserve floor {} mV",
        request.timeout_secs,
        request.min_reserve_mv
    );

    session.enter(FixState::Configuring);
    platform.clear_deadline();
    platform.arm_deadline(request.timeout_secs);
    select_sentences(platform, SentenceMask::only(NmeaSentence::Gga));
    if let Err(err) = platform.start_receive() {
        // No data will arrive; the deadline still bounds the session.
        log::warn!("GPS receive path not started: {err:#}");
    }

    let mut result = None;
    session.enter(FixState::Awaiting);
    while !platform.deadline_fired() {
        let wake = platform.idle();
        session.elapsed_secs += 1;
        session.stats.resumes += 1;
        platform.reload_watchdog();

        if let Wake::Boundary(handoff) = wake {
            match handoff {
                Handoff::Line(buffer) => {
                    let parsed = session.parse(&buffer);
                    platform.recycle(buffer);
                    if let Some(position) = parsed {
                        session.enter(FixState::Succeeded);
                        result = Some(FixOutcome::Success {
                            position,
                            elapsed_secs: session.clamped_elapsed(),
                        });
                        break;
                    }
                }
                Handoff::Dropped => session.stats.dropped_lines += 1,
            }
        }

        let reserve_mv = platform.reserve_mv();
        session.stats.last_reserve_mv = Some(reserve_mv);
        if reserve_mv < request.min_reserve_mv {
            session.enter(FixState::Aborted);
            result = Some(FixOutcome::Aborted {
                elapsed_secs: session.clamped_elapsed(),
                reserve_mv,
            });
            break;
        }
        session.enter(FixState::Awaiting);
    }

    platform.stop_receive();
    platform.clear_deadline();

    let outcome = result.unwrap_or_else(|| {
        session.enter(FixState::TimedOut);
        FixOutcome::TimedOut {
            elapsed_secs: request.timeout_secs,
        }
    });
    log::info!("GPS fix finished: {outcome}");
    log::debug!("GPS session stats: {:?}", session.stats);

    FixReport {
        outcome,
        stats: session.stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::replay::{ReserveProfile, ScriptedPlatform};
    use crate::shared::ubx::cfg_msg_frame;

    const VALID: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const BAD_CHECKSUM: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48";
    const NO_FIX: &str = "$GPGGA,,,,,,0,00,99.99,,,,,,*48";
    const LAT_95: &str = "$GPGGA,123519,9507.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

    fn platform(lines: &[&str], reserve: ReserveProfile) -> ScriptedPlatform {
        ScriptedPlatform::new(
            lines.iter().map(|line| Some(line.to_string())).collect(),
            reserve,
        )
    }

    #[test]
    fn first_valid_sentence_wins() {
        let mut board = platform(
            &[NO_FIX, BAD_CHECKSUM, VALID],
            ReserveProfile::Fixed(3_000),
        );
        let report = acquire_position(&mut board, FixRequest::new(60, 1_500));

        let position = report.outcome.position().expect("expected a fix");
        assert_eq!(position.altitude_m, 545);
        assert_eq!(report.outcome.elapsed_secs(), 3);
        assert_eq!(report.stats.sentences, 3);
        assert_eq!(report.stats.checksum_errors, 1);
        assert_eq!(report.stats.field_errors, 1);
    }

    #[test]
    fn low_reserve_aborts_on_first_resume() {
        let mut board = platform(&[NO_FIX, VALID], ReserveProfile::Fixed(900));
        let report = acquire_position(&mut board, FixRequest::new(3_600, 1_000));

        assert_eq!(
            report.outcome,
            FixOutcome::Aborted {
                elapsed_secs: 1,
                reserve_mv: 900,
            }
        );
    }

    #[test]
    fn abort_applies_to_silent_resumes_too() {
        let mut board = ScriptedPlatform::new(vec![None, None, None], ReserveProfile::Fixed(0));
        let report = acquire_position(&mut board, FixRequest::new(30, 1));
        assert!(matches!(
            report.outcome,
            FixOutcome::Aborted { elapsed_secs: 1, .. }
        ));
    }

    #[test]
    fn reserve_dropping_mid_session_aborts() {
        let mut board = platform(
            &[NO_FIX, NO_FIX, NO_FIX, VALID],
            ReserveProfile::Sequence(vec![3_000, 2_500, 1_200]),
        );
        let report = acquire_position(&mut board, FixRequest::new(60, 1_500));
        assert_eq!(
            report.outcome,
            FixOutcome::Aborted {
                elapsed_secs: 3,
                reserve_mv: 1_200,
            }
        );
    }

    #[test]
    fn no_valid_sentence_times_out_at_exact_budget() {
        let mut board = platform(&[NO_FIX; 20], ReserveProfile::Fixed(3_000));
        let report = acquire_position(&mut board, FixRequest::new(5, 1_000));
        assert_eq!(report.outcome, FixOutcome::TimedOut { elapsed_secs: 5 });
        assert_eq!(report.stats.resumes, 5);
    }

    #[test]
    fn silent_module_times_out() {
        let mut board = ScriptedPlatform::new(Vec::new(), ReserveProfile::Fixed(3_000));
        let report = acquire_position(&mut board, FixRequest::new(5, 0));
        assert_eq!(report.outcome, FixOutcome::TimedOut { elapsed_secs: 5 });
        assert_eq!(report.stats.sentences, 0);
    }

    #[test]
    fn out_of_range_latitude_never_succeeds() {
        let mut board = platform(&[LAT_95; 10], ReserveProfile::Fixed(3_000));
        let report = acquire_position(&mut board, FixRequest::new(10, 0));
        assert_eq!(report.outcome, FixOutcome::TimedOut { elapsed_secs: 10 });
        assert_eq!(report.stats.range_rejections, 10);
    }

    #[test]
    fn fix_on_the_last_second_is_clamped_to_budget() {
        let mut board = platform(&[NO_FIX, NO_FIX, VALID], ReserveProfile::Fixed(3_000));
        let report = acquire_position(&mut board, FixRequest::new(3, 0));
        assert!(matches!(
            report.outcome,
            FixOutcome::Success { elapsed_secs: 3, .. }
        ));
    }

    #[test]
    fn module_is_configured_for_gga_only_before_receiving() {
        let mut board = platform(&[VALID], ReserveProfile::Fixed(3_000));
        acquire_position(&mut board, FixRequest::new(5, 0));

        let frames = board.sent_frames();
        assert_eq!(frames.len(), 18);
        assert!(frames.contains(&cfg_msg_frame(NmeaSentence::Gga, true)));
        assert!(frames.contains(&cfg_msg_frame(NmeaSentence::Rmc, false)));
        assert!(!board.receiving());
        assert!(!board.deadline_armed());
    }

    #[test]
    fn watchdog_is_reloaded_on_every_resume() {
        let mut board = platform(&[NO_FIX; 4], ReserveProfile::Fixed(3_000));
        let report = acquire_position(&mut board, FixRequest::new(4, 0));
        assert_eq!(board.watchdog_reloads(), report.stats.resumes);
    }

    #[test]
    fn zero_timeout_is_clamped_to_one_second() {
        let request = FixRequest::new(0, 0);
        assert_eq!(request.timeout_secs, 1);
        assert_eq!(FixRequest::new(1_000_000, 0).timeout_secs, MAX_TIMEOUT_SECS);
    }

    #[test]
    fn sessions_do_not_share_state() {
        let mut board = platform(&[NO_FIX, VALID, NO_FIX], ReserveProfile::Fixed(3_000));
        let first = acquire_position(&mut board, FixRequest::new(10, 0));
        assert!(first.outcome.position().is_some());

        let second = acquire_position(&mut board, FixRequest::new(2, 0));
        assert_eq!(second.outcome, FixOutcome::TimedOut { elapsed_secs: 2 });
        assert_eq!(second.stats.sentences, 1);
    }
}
