use crate::shared::acquire::{FixPlatform, Wake};
use crate::shared::buffer::{SentenceBuffer, SentenceConsumer, SentenceProducer, sentence_pair};
use crate::shared::ubx::ConfigLink;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveProfile {
    Fixed(u32),
    // One sample per resume; the last value repeats.
    Sequence(Vec<u32>),
}

// Deterministic single-threaded board: every idle() is one simulated second,
// during which the next scripted line (if any) arrives through the producer.
pub struct ScriptedPlatform {
    script: VecDeque<Option<String>>,
    producer: SentenceProducer,
    consumer: SentenceConsumer,
    clock_secs: u32,
    deadline_at: Option<u32>,
    receiving: bool,
    reserve: ReserveProfile,
    reserve_samples: usize,
    frames: Vec<Vec<u8>>,
    watchdog_reloads: u32,
}

impl ScriptedPlatform {
    pub fn new(script: Vec<Option<String>>, reserve: ReserveProfile) -> Self {
        let (producer, consumer) = sentence_pair();
        Self {
            script: script.into(),
            producer,
            consumer,
            clock_secs: 0,
            deadline_at: None,
            receiving: false,
            reserve,
            reserve_samples: 0,
            frames: Vec::new(),
            watchdog_reloads: 0,
        }
    }

    // One line per second; blank lines are seconds where nothing arrives.
    pub fn from_log_file(path: &Path, reserve: ReserveProfile) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading NMEA log failed: {}", path.display()))?;
        let script = contents
            .lines()
            .map(|line| {
                let line = line.trim();
                (!line.is_empty()).then(|| line.to_string())
            })
            .collect();
        Ok(Self::new(script, reserve))
    }

    pub fn remaining_lines(&self) -> usize {
        self.script.len()
    }

    pub fn sent_frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn watchdog_reloads(&self) -> u32 {
        self.watchdog_reloads
    }

    #[cfg(test)]
    pub fn receiving(&self) -> bool {
        self.receiving
    }

    #[cfg(test)]
    pub fn deadline_armed(&self) -> bool {
        self.deadline_at.is_some()
    }
}

impl ConfigLink for ScriptedPlatform {
    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.frames.push(frame.to_vec());
        Ok(())
    }

    fn settle(&mut self) {}
}

impl FixPlatform for ScriptedPlatform {
    fn arm_deadline(&mut self, seconds: u32) {
        self.deadline_at = Some(self.clock_secs.saturating_add(seconds));
    }

    fn clear_deadline(&mut self) {
        self.deadline_at = None;
    }

    fn deadline_fired(&self) -> bool {
        self.deadline_at
            .is_some_and(|deadline| self.clock_secs >= deadline)
    }

    fn start_receive(&mut self) -> Result<()> {
        self.consumer.drain();
        self.producer.arm();
        self.receiving = true;
        Ok(())
    }

    fn stop_receive(&mut self) {
        self.receiving = false;
    }

    fn idle(&mut self) -> Wake {
        self.clock_secs += 1;
        if self.receiving
            && let Some(Some(line)) = self.script.pop_front()
        {
            self.producer.push_bytes(line.as_bytes());
            self.producer.push_bytes(b"\r\n");
        }
        match self.consumer.try_take() {
            Some(handoff) => Wake::Boundary(handoff),
            None => Wake::Tick,
        }
    }

    fn recycle(&mut self, buffer: SentenceBuffer) {
        self.consumer.recycle(buffer);
    }

    fn reserve_mv(&mut self) -> u32 {
        let value = match &self.reserve {
            ReserveProfile::Fixed(mv) => *mv,
            ReserveProfile::Sequence(samples) => samples
                .get(self.reserve_samples)
                .or(samples.last())
                .copied()
                .unwrap_or(0),
        };
        self.reserve_samples += 1;
        value
    }

    fn reload_watchdog(&mut self) {
        self.watchdog_reloads += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn log_file_lines_become_seconds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "$GPGGA,,,,,,0,00,99.99,,,,,,*48").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  $GPTXT,01*00  ").unwrap();

        let platform =
            ScriptedPlatform::from_log_file(file.path(), ReserveProfile::Fixed(0)).unwrap();
        assert_eq!(platform.remaining_lines(), 3);
        assert_eq!(platform.script[1], None);
        assert_eq!(platform.script[2].as_deref(), Some("$GPTXT,01*00"));
    }

    #[test]
    fn missing_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.nmea");
        let result = ScriptedPlatform::from_log_file(&missing, ReserveProfile::Fixed(0));
        assert!(result.is_err());
    }

    #[test]
    fn lines_only_arrive_while_receiving() {
        let mut platform = ScriptedPlatform::new(
            vec![Some("$GPTXT,01*00".to_string())],
            ReserveProfile::Fixed(0),
        );
        assert!(matches!(platform.idle(), Wake::Tick));
        assert_eq!(platform.remaining_lines(), 1);

        platform.start_receive().unwrap();
        assert!(matches!(platform.idle(), Wake::Boundary(_)));
        assert_eq!(platform.remaining_lines(), 0);
    }

    #[test]
    fn deadline_fires_after_armed_seconds() {
        let mut platform = ScriptedPlatform::new(Vec::new(), ReserveProfile::Fixed(0));
        platform.arm_deadline(2);
        assert!(!platform.deadline_fired());
        platform.idle();
        assert!(!platform.deadline_fired());
        platform.idle();
        assert!(platform.deadline_fired());
        platform.clear_deadline();
        assert!(!platform.deadline_fired());
    }

    #[test]
    fn reserve_sequence_repeats_last_sample() {
        let mut platform =
            ScriptedPlatform::new(Vec::new(), ReserveProfile::Sequence(vec![3_000, 2_000]));
        assert_eq!(platform.reserve_mv(), 3_000);
        assert_eq!(platform.reserve_mv(), 2_000);
        assert_eq!(platform.reserve_mv(), 2_000);
    }
}
