//! Wire protocol of the Swallow station: hex codec, frame checks and the
//! payload field layout.

pub mod codec;
mod error;
mod frame;
mod layout;

pub use error::{DecodeError, ValidationError};
pub use frame::{RawFrame, ValidatedPayload, build_frame, checksum, request_frame, validate};
pub use layout::{ByteOrder, Field, FieldKind, FieldLayout, FieldSpec};

pub const BAUD_RATE: u32 = 9600;
/// Request sent to the station: request preamble followed by its checksum.
pub const REQUEST_FRAME: [u8; 7] = [0xAA, 0xBB, 0x00, 0x02, 0x2A, 0x6E, 0xFE];
pub const REQUEST_PREAMBLE: [u8; PREAMBLE_SIZE] = [0xAA, 0xBB, 0x00, 0x02, 0x2A];
pub const RESPONSE_PREAMBLE: [u8; PREAMBLE_SIZE] = [0xCC, 0xDD, 0x00, 0x02, 0x2A];
pub const PREAMBLE_SIZE: usize = 5;
pub const CHECKSUM_SIZE: usize = 2;
pub const PAYLOAD_SIZE: usize = 42;
// response structure : preamble(5) + payload(42) + checksum(2, little-endian)
pub const FRAME_SIZE: usize = PREAMBLE_SIZE + PAYLOAD_SIZE + CHECKSUM_SIZE;
pub const FRAME_HEX_LEN: usize = FRAME_SIZE * 2;
