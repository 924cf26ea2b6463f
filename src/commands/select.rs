use crate::args::SelectArgs;
use crate::shared::lock::PortLock;
use crate::shared::reserve::ReserveSource;
use crate::shared::serial::{SerialPlatform, SerialSettings};
use crate::shared::ubx::{SentenceMask, select_sentences};
use anyhow::{Result, bail};
use std::time::Duration;

// Public select command entrypoint: push one CFG-MSG per sentence and report the mask.
pub fn run_select(args: SelectArgs) -> Result<()> {
    let mask = requested_mask(&args)?;
    let _lock = PortLock::for_port(&args.serial_port, args.lock_file.as_deref())?;

    let settings = SerialSettings {
        port: args.serial_port.clone(),
        baud_rate: args.baud_rate,
        read_timeout: Duration::from_millis(250),
        command_gap: Duration::from_millis(args.command_gap_ms),
    };
    let mut platform = SerialPlatform::open(settings, ReserveSource::from_args(None, None))?;

    let sent = select_sentences(&mut platform, mask);
    if sent == 0 {
        bail!("no CFG-MSG command reached {}", args.serial_port);
    }
    eprintln!(
        "Sent {sent} CFG-MSG commands, enabled mask {:#07x} on {}",
        mask.bits(),
        args.serial_port
    );
    Ok(())
}

fn requested_mask(args: &SelectArgs) -> Result<SentenceMask> {
    match args.mask {
        Some(bits) => SentenceMask::from_bits(bits),
        None => SentenceMask::from_names(&args.sentences),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ubx::NmeaSentence;

    fn select_args(sentences: &str, mask: Option<u32>) -> SelectArgs {
        SelectArgs {
            serial_port: "/dev/null".to_string(),
            baud_rate: 9_600,
            command_gap_ms: 0,
            sentences: sentences.to_string(),
            mask,
            lock_file: None,
        }
    }

    #[test]
    fn names_and_raw_mask_agree() {
        let by_name = requested_mask(&select_args("gga", None)).unwrap();
        let by_bits = requested_mask(&select_args("", Some(0x08))).unwrap();
        assert_eq!(by_name, by_bits);
        assert!(by_name.contains(NmeaSentence::Gga));
    }

    #[test]
    fn bad_requests_are_rejected() {
        assert!(requested_mask(&select_args("GGA,XYZ", None)).is_err());
        assert!(requested_mask(&select_args("GGA", Some(1 << 18))).is_err());
    }
}
