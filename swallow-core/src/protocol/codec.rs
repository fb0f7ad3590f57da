//! Conversions between raw bytes and the hex-digit form the field decoder
//! works on.

use super::error::DecodeError;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Render bytes as lowercase hex, two digits per byte, in input order.
pub fn bytes_to_hex_digits(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[usize::from(b >> 4)] as char);
        out.push(HEX_DIGITS[usize::from(b & 0x0f)] as char);
    }
    out
}

/// Reverse the order of the two-digit groups, turning the hex form of a
/// little-endian field into its big-endian reading.
pub fn swap_byte_order(hex: &str) -> Result<String, DecodeError> {
    check_digits(hex)?;

    // check_digits guarantees ASCII, so byte pairs are whole characters
    let mut out = String::with_capacity(hex.len());
    for pair in hex.as_bytes().rchunks(2) {
        out.push(pair[0] as char);
        out.push(pair[1] as char);
    }
    Ok(out)
}

/// Parse hex digits as a big-endian unsigned integer.
pub fn hex_digits_to_uint(hex: &str) -> Result<u64, DecodeError> {
    check_digits(hex)?;
    if hex.len() > 16 {
        return Err(DecodeError::TooWide { digits: hex.len() });
    }

    hex.char_indices().try_fold(0u64, |acc, (position, digit)| {
        let nibble = digit
            .to_digit(16)
            .ok_or(DecodeError::InvalidDigit { digit, position })?;
        Ok((acc << 4) | u64::from(nibble))
    })
}

/// Reinterpret eight hex digits as a big-endian IEEE-754 single and round
/// the result to one decimal place.
pub fn hex_digits_to_float32(hex: &str) -> Result<f64, DecodeError> {
    if hex.len() != 8 {
        check_digits(hex)?;
        return Err(DecodeError::WrongWidth {
            expected: 8,
            actual: hex.len(),
        });
    }

    let bits = hex_digits_to_uint(hex)? as u32;
    Ok(round_tenth(f64::from(f32::from_bits(bits))))
}

/// Round to one decimal place, half away from zero.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn check_digits(hex: &str) -> Result<(), DecodeError> {
    if hex.is_empty() {
        return Err(DecodeError::Empty);
    }
    if let Some((position, digit)) = hex.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidDigit { digit, position });
    }
    if hex.len() % 2 != 0 {
        return Err(DecodeError::OddLength(hex.len()));
    }
    Ok(())
}
