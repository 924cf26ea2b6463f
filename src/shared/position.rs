use std::fmt;

pub const MAX_LATITUDE_DEGREES: u16 = 89;
pub const MAX_LONGITUDE_DEGREES: u16 = 179;
pub const MAX_MINUTES: u8 = 59;
pub const MAX_MINUTE_FRACTION: u32 = 99_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NorthSouth {
    North,
    South,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EastWest {
    East,
    West,
}

/// Degrees and minutes as received, with the fractional minutes kept as an
/// integer scaled by 10^5 (`4807.038` gives minutes 7, seconds 3800).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Angle {
    pub degrees: u16,
    pub minutes: u8,
    pub seconds: u32,
}

impl Angle {
    pub fn in_range(&self, max_degrees: u16) -> bool {
        self.degrees <= max_degrees
            && self.minutes <= MAX_MINUTES
            && self.seconds <= MAX_MINUTE_FRACTION
    }

    pub fn to_decimal_degrees(&self) -> f64 {
        let minutes = f64::from(self.minutes) + f64::from(self.seconds) / 100_000.0;
        f64::from(self.degrees) + minutes / 60.0
    }
}

/// A decoded GGA position. Only surfaced to callers once [`Position::is_valid`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub latitude: Angle,
    pub north_south: NorthSouth,
    pub longitude: Angle,
    pub east_west: EastWest,
    pub altitude_m: u32,
}

impl Position {
    // Physical range check. Does not touch the candidate.
    pub fn is_valid(&self) -> bool {
        self.latitude.in_range(MAX_LATITUDE_DEGREES)
            && self.longitude.in_range(MAX_LONGITUDE_DEGREES)
    }

    // Signed decimal degrees, south and west negative.
    pub fn latitude_deg(&self) -> f64 {
        let value = self.latitude.to_decimal_degrees();
        match self.north_south {
            NorthSouth::North => value,
            NorthSouth::South => -value,
        }
    }

    pub fn longitude_deg(&self) -> f64 {
        let value = self.longitude.to_decimal_degrees();
        match self.east_west {
            EastWest::East => value,
            EastWest::West => -value,
        }
    }
}

impl fmt::Display for NorthSouth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NorthSouth::North => "N",
            NorthSouth::South => "S",
        })
    }
}

impl fmt::Display for EastWest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EastWest::East => "E",
            EastWest::West => "W",
        })
    }
}

// Operator-facing form: Lat=48d7'3800''-N Long=11d31'0''-E Alt=545m
impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lat={}d{}'{}''-{} Long={}d{}'{}''-{} Alt={}m",
            self.latitude.degrees,
            self.latitude.minutes,
            self.latitude.seconds,
            self.north_south,
            self.longitude.degrees,
            self.longitude.minutes,
            self.longitude.seconds,
            self.east_west,
            self.altitude_m
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn munich() -> Position {
        Position {
            latitude: Angle {
                degrees: 48,
                minutes: 7,
                seconds: 3_800,
            },
            north_south: NorthSouth::North,
            longitude: Angle {
                degrees: 11,
                minutes: 31,
                seconds: 0,
            },
            east_west: EastWest::East,
            altitude_m: 545,
        }
    }

    #[test]
    fn in_range_position_is_valid() {
        assert!(munich().is_valid());
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut pos = munich();
        pos.latitude = Angle {
            degrees: 89,
            minutes: 59,
            seconds: 99_999,
        };
        pos.longitude = Angle {
            degrees: 179,
            minutes: 59,
            seconds: 99_999,
        };
        assert!(pos.is_valid());
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let mut pos = munich();
        pos.latitude.degrees = 90;
        assert!(!pos.is_valid());

        let mut pos = munich();
        pos.longitude.degrees = 180;
        assert!(!pos.is_valid());

        let mut pos = munich();
        pos.latitude.minutes = 60;
        assert!(!pos.is_valid());

        let mut pos = munich();
        pos.longitude.seconds = 100_000;
        assert!(!pos.is_valid());
    }

    #[test]
    fn decimal_degrees_carry_hemisphere_sign() {
        let mut pos = munich();
        assert!((pos.latitude_deg() - 48.117_3).abs() < 1e-9);
        assert!((pos.longitude_deg() - 11.516_666_666).abs() < 1e-6);

        pos.north_south = NorthSouth::South;
        pos.east_west = EastWest::West;
        assert!(pos.latitude_deg() < 0.0);
        assert!(pos.longitude_deg() < 0.0);
    }

    #[test]
    fn report_format() {
        assert_eq!(
            munich().to_string(),
            "Lat=48d7'3800''-N Long=11d31'0''-E Alt=545m"
        );
    }
}
