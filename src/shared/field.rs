// Integer field decoding without floating point.
// Callers check field widths and digit classes before decoding, so out-of-range input decodes to 0.

const POW10: [u32; 10] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

// Uppercase ASCII hex digit to nibble, 0 for anything else (lowercase included).
pub fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

// ASCII decimal digit value, 0 for anything else.
pub fn digit_value(c: u8) -> u32 {
    if c.is_ascii_digit() {
        u32::from(c - b'0')
    } else {
        0
    }
}

pub fn pow10(n: usize) -> u32 {
    POW10.get(n).copied().unwrap_or(0)
}

pub fn all_digits(field: &[u8]) -> bool {
    !field.is_empty() && field.iter().all(u8::is_ascii_digit)
}

// Assemble a decimal run, most significant digit first.
pub fn decode_decimal(digits: &[u8]) -> u32 {
    let len = digits.len();
    digits
        .iter()
        .enumerate()
        .fold(0_u32, |acc, (k, &c)| {
            acc.wrapping_add(pow10(len - 1 - k).wrapping_mul(digit_value(c)))
        })
}

// Decode a fractional run as if right-padded with zeros to `width` digits.
// "038" at width 5 gives 3800.
pub fn decode_scaled_fraction(digits: &[u8], width: usize) -> u32 {
    digits
        .iter()
        .take(width)
        .enumerate()
        .fold(0_u32, |acc, (k, &c)| acc + pow10(width - 1 - k) * digit_value(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_nibbles() {
        assert_eq!(hex_nibble(b'0'), 0);
        assert_eq!(hex_nibble(b'9'), 9);
        assert_eq!(hex_nibble(b'A'), 10);
        assert_eq!(hex_nibble(b'F'), 15);
        assert_eq!(hex_nibble(b'f'), 0);
        assert_eq!(hex_nibble(b'G'), 0);
        assert_eq!(hex_nibble(b','), 0);
    }

    #[test]
    fn pow10_lookup_is_bounded() {
        assert_eq!(pow10(0), 1);
        assert_eq!(pow10(5), 100_000);
        assert_eq!(pow10(9), 1_000_000_000);
        assert_eq!(pow10(10), 0);
    }

    #[test]
    fn decimal_runs() {
        assert_eq!(decode_decimal(b"48"), 48);
        assert_eq!(decode_decimal(b"011"), 11);
        assert_eq!(decode_decimal(b"545"), 545);
        assert_eq!(decode_decimal(b""), 0);
    }

    #[test]
    fn scaled_fractions_pad_on_the_right() {
        assert_eq!(decode_scaled_fraction(b"038", 5), 3_800);
        assert_eq!(decode_scaled_fraction(b"11399", 5), 11_399);
        assert_eq!(decode_scaled_fraction(b"5", 5), 50_000);
    }

    #[test]
    fn digit_class() {
        assert!(all_digits(b"0123"));
        assert!(!all_digits(b""));
        assert!(!all_digits(b"48A7"));
        assert!(!all_digits(b"-12"));
    }
}
