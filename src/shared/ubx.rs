use crate::shared::checksum::ubx_checksum;
use anyhow::{Result, anyhow, bail};
use std::fmt;
use std::str::FromStr;

const UBX_SYNC: [u8; 2] = [0xB5, 0x62];
const CFG_CLASS: u8 = 0x06;
const CFG_MSG_ID: u8 = 0x01;
const NMEA_STD_CLASS: u8 = 0xF0;
// One rate byte per target port: I2C, UART1, UART2, USB, SPI, reserved.
const RATE_PORTS: usize = 6;
pub const CFG_MSG_PAYLOAD_LEN: usize = 2 + RATE_PORTS;
#[cfg(test)]
pub const CFG_MSG_FRAME_LEN: usize = 6 + CFG_MSG_PAYLOAD_LEN + 2;

/// The 18 standard NMEA sentences the module can emit, in mask bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmeaSentence {
    Dtm,
    Gbq,
    Gbs,
    Gga,
    Gll,
    Glq,
    Gnq,
    Gns,
    Gpq,
    Grs,
    Gsa,
    Gst,
    Gsv,
    Rmc,
    Txt,
    Vlw,
    Vtg,
    Zda,
}

// Bit i of a sentence mask drives entry i of this table.
pub const SENTENCE_TABLE: [(NmeaSentence, &str, u8); 18] = [
    (NmeaSentence::Dtm, "DTM", 0x0A),
    (NmeaSentence::Gbq, "GBQ", 0x44),
    (NmeaSentence::Gbs, "GBS", 0x09),
    (NmeaSentence::Gga, "GGA", 0x00),
    (NmeaSentence::Gll, "GLL", 0x01),
    (NmeaSentence::Glq, "GLQ", 0x43),
    (NmeaSentence::Gnq, "GNQ", 0x42),
    (NmeaSentence::Gns, "GNS", 0x0D),
    (NmeaSentence::Gpq, "GPQ", 0x40),
    (NmeaSentence::Grs, "GRS", 0x06),
    (NmeaSentence::Gsa, "GSA", 0x02),
    (NmeaSentence::Gst, "GST", 0x07),
    (NmeaSentence::Gsv, "GSV", 0x03),
    (NmeaSentence::Rmc, "RMC", 0x04),
    (NmeaSentence::Txt, "TXT", 0x41),
    (NmeaSentence::Vlw, "VLW", 0x0F),
    (NmeaSentence::Vtg, "VTG", 0x05),
    (NmeaSentence::Zda, "ZDA", 0x08),
];

impl NmeaSentence {
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn name(self) -> &'static str {
        SENTENCE_TABLE[self as usize].1
    }

    pub fn message_id(self) -> u8 {
        SENTENCE_TABLE[self as usize].2
    }
}

impl fmt::Display for NmeaSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NmeaSentence {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let wanted = raw.trim();
        SENTENCE_TABLE
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(sentence, _, _)| *sentence)
            .ok_or_else(|| anyhow!("unknown NMEA sentence: {raw}"))
    }
}

/// Enable/disable mask over [`SENTENCE_TABLE`]; only the low 18 bits are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SentenceMask(u32);

impl SentenceMask {
    pub const ALL_BITS: u32 = (1 << SENTENCE_TABLE.len()) - 1;

    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::ALL_BITS != 0 {
            bail!("sentence mask {bits:#x} has bits above the 18 known sentences");
        }
        Ok(Self(bits))
    }

    pub fn only(sentence: NmeaSentence) -> Self {
        Self(sentence.bit())
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn with(self, sentence: NmeaSentence) -> Self {
        Self(self.0 | sentence.bit())
    }

    pub fn contains(self, sentence: NmeaSentence) -> bool {
        self.0 & sentence.bit() != 0
    }

    // Comma separated names, e.g. "GGA,RMC".
    pub fn from_names(list: &str) -> Result<Self> {
        list.split(',')
            .filter(|name| !name.trim().is_empty())
            .try_fold(Self::default(), |mask, name| -> Result<Self> {
                Ok(mask.with(name.parse::<NmeaSentence>()?))
            })
    }
}

// Destination for configuration frames. The module does not queue commands,
// so every frame is followed by a settling gap.
pub trait ConfigLink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<()>;
    fn settle(&mut self);
}

// Build full UBX packet with header, payload length, and checksum.
pub fn build_ubx_packet(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(payload.len() + 8);
    packet.extend_from_slice(&UBX_SYNC);
    packet.extend_from_slice(&[class, id]);
    packet.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    packet.extend_from_slice(payload);
    let (ck_a, ck_b) = ubx_checksum(&packet[2..]);
    packet.push(ck_a);
    packet.push(ck_b);
    packet
}

// CFG-MSG setting one standard NMEA sentence to the same rate on every port.
pub fn cfg_msg_frame(sentence: NmeaSentence, enabled: bool) -> Vec<u8> {
    let mut payload = [u8::from(enabled); CFG_MSG_PAYLOAD_LEN];
    payload[0] = NMEA_STD_CLASS;
    payload[1] = sentence.message_id();
    build_ubx_packet(CFG_CLASS, CFG_MSG_ID, &payload)
}

// Send one CFG-MSG per known sentence, in table order.
// Write failures are logged and skipped: the module gives no acknowledgement we wait on.
pub fn select_sentences<L: ConfigLink + ?Sized>(link: &mut L, mask: SentenceMask) -> usize {
    let mut sent = 0_usize;
    for (sentence, _, _) in SENTENCE_TABLE {
        let enabled = mask.contains(sentence);
        let frame = cfg_msg_frame(sentence, enabled);
        match link.write_frame(&frame) {
            Ok(()) => sent += 1,
            Err(err) => log::warn!("CFG-MSG for {sentence} not written: {err:#}"),
        }
        link.settle();
    }
    log::debug!(
        "sent {sent}/{} CFG-MSG frames for mask {:#07x}",
        SENTENCE_TABLE.len(),
        mask.bits()
    );
    sent
}
