use crate::shared::checksum::{
    ChecksumError, SENTENCE_START, checksum_field, find_checksum_marker, xor_checksum,
};
use crate::shared::field::{all_digits, decode_decimal, decode_scaled_fraction, digit_value};
use crate::shared::position::{Angle, EastWest, NorthSouth, Position};
use std::fmt;
use thiserror::Error;

const FIELD_SEPARATOR: u8 = b',';
const DECIMAL_POINT: u8 = b'.';
const ADDRESS_LENGTH: usize = 5;
const MESSAGE_ID: &[u8] = b"GGA";
const LATITUDE_DEGREE_DIGITS: usize = 2;
const LONGITUDE_DEGREE_DIGITS: usize = 3;
const MINUTE_DIGITS: usize = 2;
const MAX_FRACTION_DIGITS: usize = 5;
const MAX_ALTITUDE_DIGITS: usize = 6;
const METERS: u8 = b'M';

// GGA fields in transmission order, up to the last one decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GgaField {
    Address,
    Time,
    Latitude,
    NorthSouth,
    Longitude,
    EastWest,
    FixQuality,
    Satellites,
    Hdop,
    Altitude,
    AltitudeUnit,
}

impl GgaField {
    // 0-based position after the '$' marker.
    pub fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            GgaField::Address => "address",
            GgaField::Time => "time",
            GgaField::Latitude => "latitude",
            GgaField::NorthSouth => "N/S",
            GgaField::Longitude => "longitude",
            GgaField::EastWest => "E/W",
            GgaField::FixQuality => "fix quality",
            GgaField::Satellites => "satellites",
            GgaField::Hdop => "HDOP",
            GgaField::Altitude => "altitude",
            GgaField::AltitudeUnit => "altitude unit",
        }
    }
}

impl fmt::Display for GgaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (field {})", self.name(), self.index())
    }
}

// Why a sentence was discarded. Never surfaced past the acquisition controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GgaError {
    #[error("no sentence start marker")]
    StartNotFound,
    #[error("no checksum marker within {0} bytes")]
    MarkerNotFound(usize),
    #[error("checksum marker not followed by two hex digits")]
    TruncatedChecksum,
    #[error("checksum mismatch: received {received:02X}, computed {computed:02X}")]
    ChecksumMismatch { received: u8, computed: u8 },
    #[error("malformed {0}")]
    Field(GgaField),
}

impl From<ChecksumError> for GgaError {
    fn from(err: ChecksumError) -> Self {
        match err {
            ChecksumError::MarkerNotFound(len) => GgaError::MarkerNotFound(len),
            ChecksumError::Truncated => GgaError::TruncatedChecksum,
        }
    }
}

impl GgaError {
    pub fn is_checksum(&self) -> bool {
        !matches!(self, GgaError::Field(_))
    }
}

// Verify and decode one GGA sentence. Fields after the altitude unit are ignored.
// Nothing is returned unless the checksum and every decoded field check out.
pub fn parse_gga(buffer: &[u8]) -> Result<Position, GgaError> {
    let start = buffer
        .iter()
        .position(|&byte| byte == SENTENCE_START)
        .ok_or(GgaError::StartNotFound)?;
    let sentence = &buffer[start..];

    let marker = find_checksum_marker(sentence)?;
    let received = checksum_field(sentence)?;
    let body = &sentence[1..marker];
    let computed = xor_checksum(body);
    if computed != received {
        return Err(GgaError::ChecksumMismatch { received, computed });
    }

    let mut fields = body.split(|&byte| byte == FIELD_SEPARATOR);
    let mut next = |field: GgaField| fields.next().ok_or(GgaError::Field(field));

    let address = next(GgaField::Address)?;
    if address.len() != ADDRESS_LENGTH || !address.ends_with(MESSAGE_ID) {
        return Err(GgaError::Field(GgaField::Address));
    }
    next(GgaField::Time)?;
    let latitude = decode_angle(next(GgaField::Latitude)?, LATITUDE_DEGREE_DIGITS)
        .ok_or(GgaError::Field(GgaField::Latitude))?;
    let north_south = match next(GgaField::NorthSouth)? {
        b"N" => NorthSouth::North,
        b"S" => NorthSouth::South,
        _ => return Err(GgaError::Field(GgaField::NorthSouth)),
    };
    let longitude = decode_angle(next(GgaField::Longitude)?, LONGITUDE_DEGREE_DIGITS)
        .ok_or(GgaError::Field(GgaField::Longitude))?;
    let east_west = match next(GgaField::EastWest)? {
        b"E" => EastWest::East,
        b"W" => EastWest::West,
        _ => return Err(GgaError::Field(GgaField::EastWest)),
    };
    next(GgaField::FixQuality)?;
    next(GgaField::Satellites)?;
    next(GgaField::Hdop)?;
    let altitude_m =
        decode_altitude(next(GgaField::Altitude)?).ok_or(GgaError::Field(GgaField::Altitude))?;
    if next(GgaField::AltitudeUnit)? != [METERS] {
        return Err(GgaError::Field(GgaField::AltitudeUnit));
    }

    Ok(Position {
        latitude,
        north_south,
        longitude,
        east_west,
        altitude_m,
    })
}

// <d..dmm.f..f>: fixed degree and minute widths, 1 to 5 fractional digits.
fn decode_angle(field: &[u8], degree_digits: usize) -> Option<Angle> {
    let point = degree_digits + MINUTE_DIGITS;
    if field.len() < point + 2 || field.len() > point + 1 + MAX_FRACTION_DIGITS {
        return None;
    }
    let (integer, rest) = field.split_at(point);
    let fraction = rest.strip_prefix(&[DECIMAL_POINT])?;
    if !all_digits(integer) || !all_digits(fraction) {
        return None;
    }

    let (degrees, minutes) = integer.split_at(degree_digits);
    Some(Angle {
        degrees: decode_decimal(degrees) as u16,
        minutes: decode_decimal(minutes) as u8,
        seconds: decode_scaled_fraction(fraction, MAX_FRACTION_DIGITS),
    })
}

// Integer part up to the point, rounded half-up on the first fractional digit only.
// Later fractional digits are not looked at.
fn decode_altitude(field: &[u8]) -> Option<u32> {
    let point = field
        .iter()
        .position(|&byte| byte == DECIMAL_POINT)
        .unwrap_or(field.len());
    let integer = &field[..point];
    if integer.len() > MAX_ALTITUDE_DIGITS || !all_digits(integer) {
        return None;
    }

    let mut altitude = decode_decimal(integer);
    if let Some(&first) = field.get(point + 1)
        && digit_value(first) >= 5
    {
        altitude += 1;
    }
    Some(altitude)
}
