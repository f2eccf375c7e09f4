//! Node wire protocol.
//!
//! Every exchange starts with a single opcode byte sent by the host.
//!
//! | Opcode | Request | Response |
//! |---|---|---|
//! | `0x03` READ_FREQUENCY | opcode | 2-byte BE frequency + checksum |
//! | `0x05` READ_LAP_STATS | opcode | 16-byte record + checksum |
//! | `0x22` READ_REVISION_CODE | opcode | 2 bytes (`0x25`, api level) + checksum |
//! | `0x51` WRITE_FREQUENCY | opcode + 2-byte BE frequency + checksum | none |
//!
//! Read responses are checksummed over every byte before the trailing
//! checksum. Write frames are checksummed over the payload only, skipping the
//! opcode. The firmware depends on both conventions.

pub mod frame;
pub mod lap_stats;

pub use frame::{
    checksum, decode_response, decode_write, encode_read, encode_response, encode_write,
    read_u16_be, read_u32_be, verify_response, write_u16_be, write_u32_be,
};
pub use lap_stats::{LapStats, LAP_STATS_PAYLOAD_LEN};

/// Read the tuned frequency.
pub const READ_FREQUENCY: u8 = 0x03;
/// Read the live lap/RSSI statistics record.
pub const READ_LAP_STATS: u8 = 0x05;
/// Read the firmware API level.
pub const READ_REVISION_CODE: u8 = 0x22;
/// Tune to a new frequency.
pub const WRITE_FREQUENCY: u8 = 0x51;

/// Payload size of READ_FREQUENCY / WRITE_FREQUENCY.
pub const FREQUENCY_PAYLOAD_LEN: usize = 2;
/// Payload size of READ_REVISION_CODE.
pub const REVISION_PAYLOAD_LEN: usize = 2;
/// High byte of a valid READ_REVISION_CODE response.
pub const REVISION_VERIFY_BYTE: u8 = 0x25;

/// Human-readable opcode name for log lines.
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        READ_FREQUENCY => "READ_FREQUENCY",
        READ_LAP_STATS => "READ_LAP_STATS",
        READ_REVISION_CODE => "READ_REVISION_CODE",
        WRITE_FREQUENCY => "WRITE_FREQUENCY",
        _ => "UNKNOWN",
    }
}

/// Expected response payload length for a read opcode.
pub fn response_payload_len(opcode: u8) -> Option<usize> {
    match opcode {
        READ_FREQUENCY => Some(FREQUENCY_PAYLOAD_LEN),
        READ_LAP_STATS => Some(LAP_STATS_PAYLOAD_LEN),
        READ_REVISION_CODE => Some(REVISION_PAYLOAD_LEN),
        _ => None,
    }
}
