//! Frame encoding and decoding.
//!
//! Write frame: `[opcode][payload..][checksum(payload)]`
//! Read request: `[opcode]`
//! Read response: `[payload..][checksum(payload)]`

use crate::error::ProtocolError;

/// Low 8 bits of the byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode a read request: the opcode alone.
pub fn encode_read(opcode: u8) -> [u8; 1] {
    [opcode]
}

/// Encode a write command. The checksum covers `payload` only.
pub fn encode_write(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.push(opcode);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame
}

/// Split a write frame into opcode and payload after verifying its checksum.
///
/// This is the node's side of [`encode_write`].
pub fn decode_write(frame: &[u8]) -> Result<(u8, &[u8]), ProtocolError> {
    let Some((&opcode, rest)) = frame.split_first() else {
        return Err(ProtocolError::Length {
            opcode: 0,
            expected: 2,
            actual: 0,
        });
    };
    let Some((&received, payload)) = rest.split_last() else {
        return Err(ProtocolError::Length {
            opcode,
            expected: 2,
            actual: frame.len(),
        });
    };
    let computed = checksum(payload);
    if computed != received {
        return Err(ProtocolError::Checksum {
            opcode,
            expected: computed,
            actual: received,
        });
    }
    Ok((opcode, payload))
}

/// Encode a read response as the node sends it: payload plus checksum.
pub fn encode_response(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame
}

/// True when the trailing byte matches the sum of every byte before it.
pub fn verify_response(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&received, payload)) => checksum(payload) == received,
        None => false,
    }
}

/// Validate a read response and return its payload.
///
/// Expects exactly `payload_len + 1` bytes. The checksum basis is
/// `response[..payload_len]`.
pub fn decode_response(
    opcode: u8,
    payload_len: usize,
    response: &[u8],
) -> Result<&[u8], ProtocolError> {
    let expected = payload_len + 1;
    if response.len() != expected {
        return Err(ProtocolError::Length {
            opcode,
            expected,
            actual: response.len(),
        });
    }
    let (payload, trailer) = response.split_at(payload_len);
    let computed = checksum(payload);
    if computed != trailer[0] {
        return Err(ProtocolError::Checksum {
            opcode,
            expected: computed,
            actual: trailer[0],
        });
    }
    Ok(payload)
}

/// Big-endian 16-bit field at `offset`.
///
/// Callers pass slices whose length has already been checked by
/// [`decode_response`].
pub fn read_u16_be(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Store `value` big-endian at `offset`.
pub fn write_u16_be(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Big-endian 32-bit field at `offset`.
pub fn read_u32_be(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Store `value` big-endian at `offset`.
pub fn write_u32_be(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{READ_FREQUENCY, WRITE_FREQUENCY};

    #[test]
    fn checksum_wraps_at_eight_bits() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0xFF, 0x01]), 0x00);
        assert_eq!(checksum(&[0x16, 0x0D]), 0x23);
    }

    #[test]
    fn write_frame_checksum_skips_opcode() {
        // 5800 = 0x16A8
        let frame = encode_write(WRITE_FREQUENCY, &[0x16, 0xA8]);
        assert_eq!(frame, vec![0x51, 0x16, 0xA8, 0xBE]);

        let (opcode, payload) = decode_write(&frame).unwrap();
        assert_eq!(opcode, WRITE_FREQUENCY);
        assert_eq!(payload, &[0x16, 0xA8]);
    }

    #[test]
    fn read_request_is_bare_opcode() {
        assert_eq!(encode_read(READ_FREQUENCY), [0x03]);
    }

    #[test]
    fn response_round_trip_and_single_byte_corruption() {
        let payloads: [&[u8]; 4] = [&[0x16, 0xA8], &[0x00], &[0xFF; 16], &[1, 2, 3, 4, 5]];
        for payload in payloads {
            let frame = encode_response(payload);
            assert!(verify_response(&frame));
            for i in 0..frame.len() {
                let mut corrupted = frame.clone();
                corrupted[i] ^= 0x01;
                assert!(!verify_response(&corrupted), "flip at {i} went unnoticed");
            }
        }
    }

    #[test]
    fn write_frame_corruption_in_payload_or_checksum_is_detected() {
        let frame = encode_write(WRITE_FREQUENCY, &[0x16, 0xA8]);
        for i in 1..frame.len() {
            let mut corrupted = frame.clone();
            corrupted[i] = corrupted[i].wrapping_add(7);
            assert!(matches!(
                decode_write(&corrupted),
                Err(ProtocolError::Checksum { .. })
            ));
        }
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode_response(READ_FREQUENCY, 2, &[0x16, 0xA8]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Length {
                opcode: READ_FREQUENCY,
                expected: 3,
                actual: 2
            }
        );
        assert!(decode_response(READ_FREQUENCY, 2, &[]).is_err());
    }

    #[test]
    fn decode_rejects_bad_checksum() {
        let err = decode_response(READ_FREQUENCY, 2, &[0x16, 0xA8, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Checksum {
                opcode: READ_FREQUENCY,
                expected: 0xBE,
                actual: 0x00
            }
        ));
    }

    #[test]
    fn big_endian_helpers() {
        let mut buf = [0u8; 6];
        write_u16_be(&mut buf, 0, 5800);
        write_u32_be(&mut buf, 2, 0x0102_0304);
        assert_eq!(buf, [0x16, 0xA8, 1, 2, 3, 4]);
        assert_eq!(read_u16_be(&buf, 0), 5800);
        assert_eq!(read_u32_be(&buf, 2), 0x0102_0304);
    }
}
