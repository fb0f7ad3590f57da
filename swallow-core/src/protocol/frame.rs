use super::codec::bytes_to_hex_digits;
use super::error::ValidationError;
use super::*;

/// Response bytes exactly as read from the serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(Vec<u8>);

impl RawFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        bytes_to_hex_digits(&self.0)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Payload of a frame that passed every check in [`validate`].
///
/// Only `validate` produces one, so holding a `ValidatedPayload` means the
/// length, preamble and checksum were all correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayload([u8; PAYLOAD_SIZE]);

impl ValidatedPayload {
    pub fn as_bytes(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.0
    }
}

/// `0xFFFF` minus the byte sum, as the station computes it.
pub fn checksum(bytes: &[u8]) -> u16 {
    let sum: u32 = bytes.iter().map(|&b| u32::from(b)).sum();
    0xFFFF_u32.wrapping_sub(sum) as u16
}

/// Build the request frame from its preamble.
pub fn request_frame() -> [u8; 7] {
    let mut bytes = [0u8; 7];
    bytes[..PREAMBLE_SIZE].copy_from_slice(&REQUEST_PREAMBLE);
    bytes[PREAMBLE_SIZE..].copy_from_slice(&checksum(&REQUEST_PREAMBLE).to_le_bytes());
    bytes
}

/// Wrap a payload into a complete response frame.
pub fn build_frame(payload: &[u8; PAYLOAD_SIZE]) -> RawFrame {
    let mut bytes = Vec::with_capacity(FRAME_SIZE);
    bytes.extend_from_slice(&RESPONSE_PREAMBLE);
    bytes.extend_from_slice(payload);

    let sum = checksum(&bytes);
    bytes.extend_from_slice(&sum.to_le_bytes());

    RawFrame(bytes)
}

/// Check length, preamble and checksum, in that order, and strip the
/// framing from a valid response.
pub fn validate(frame: &RawFrame) -> Result<ValidatedPayload, ValidationError> {
    let bytes = frame.as_bytes();
    if bytes.len() != FRAME_SIZE {
        return Err(ValidationError::BadLength {
            expected: FRAME_SIZE,
            actual: bytes.len(),
        });
    }

    let (covered, trailer) = bytes.split_at(FRAME_SIZE - CHECKSUM_SIZE);
    let (preamble, payload) = covered.split_at(PREAMBLE_SIZE);

    if preamble != RESPONSE_PREAMBLE {
        return Err(ValidationError::BadHeader {
            expected: bytes_to_hex_digits(&RESPONSE_PREAMBLE),
            actual: bytes_to_hex_digits(preamble),
        });
    }

    let carried = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = checksum(covered);
    if carried != computed {
        return Err(ValidationError::ChecksumMismatch { carried, computed });
    }

    let mut out = [0u8; PAYLOAD_SIZE];
    out.copy_from_slice(payload);
    Ok(ValidatedPayload(out))
}
