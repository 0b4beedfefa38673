//! Snapshot frame envelope: magic, version, lengths, CRC32 trailer.

use crate::error::{CodecError, CodecResult};

/// Magic bytes identifying a snapshot frame.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"RWSN";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Header size: magic(4) + version(2) + sequence(8) + uncompressed_len(8) + payload_len(4).
const HEADER_SIZE: usize = 4 + 2 + 8 + 8 + 4;

/// CRC32 trailer size.
const TRAILER_SIZE: usize = 4;

/// A decoded snapshot frame, borrowing the payload from the input blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFrame<'a> {
    /// Sequence boundary this snapshot captures.
    pub sequence: u64,
    /// Length of the serialized state before compression.
    pub uncompressed_len: u64,
    /// Compressed state payload.
    pub payload: &'a [u8],
}

/// Encodes a snapshot frame around a compressed payload.
///
/// The CRC32 trailer covers the header and the payload, so a flipped bit
/// anywhere in the blob is detected before decompression is attempted.
///
/// # Errors
///
/// Returns an error if the payload exceeds the 4-byte length field.
pub fn encode_frame(sequence: u64, uncompressed_len: u64, payload: &[u8]) -> CodecResult<Vec<u8>> {
    if payload.len() > u32::MAX as usize {
        return Err(CodecError::corrupted(format!(
            "snapshot payload too large: {} bytes exceeds u32::MAX",
            payload.len()
        )));
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    buf.extend_from_slice(&SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    buf.extend_from_slice(&sequence.to_le_bytes());
    buf.extend_from_slice(&uncompressed_len.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);

    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Decodes and verifies a snapshot frame.
///
/// # Errors
///
/// Returns an error if the blob is truncated, the magic or version is
/// wrong, the declared payload length disagrees with the blob length, or
/// the CRC32 trailer does not match.
pub fn decode_frame(bytes: &[u8]) -> CodecResult<SnapshotFrame<'_>> {
    if bytes.len() < HEADER_SIZE + TRAILER_SIZE {
        return Err(CodecError::Truncated {
            needed: HEADER_SIZE + TRAILER_SIZE,
            available: bytes.len(),
        });
    }

    let magic: [u8; 4] = bytes[0..4]
        .try_into()
        .map_err(|_| CodecError::corrupted("invalid magic field"))?;
    if magic != SNAPSHOT_MAGIC {
        return Err(CodecError::BadMagic { found: magic });
    }

    let read_u16 = |range: std::ops::Range<usize>| -> CodecResult<u16> {
        Ok(u16::from_le_bytes(
            bytes[range]
                .try_into()
                .map_err(|_| CodecError::corrupted("invalid u16 field"))?,
        ))
    };
    let read_u32 = |range: std::ops::Range<usize>| -> CodecResult<u32> {
        Ok(u32::from_le_bytes(
            bytes[range]
                .try_into()
                .map_err(|_| CodecError::corrupted("invalid u32 field"))?,
        ))
    };
    let read_u64 = |range: std::ops::Range<usize>| -> CodecResult<u64> {
        Ok(u64::from_le_bytes(
            bytes[range]
                .try_into()
                .map_err(|_| CodecError::corrupted("invalid u64 field"))?,
        ))
    };

    let version = read_u16(4..6)?;
    if version != SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            supported: SNAPSHOT_VERSION,
        });
    }

    let sequence = read_u64(6..14)?;
    let uncompressed_len = read_u64(14..22)?;
    let payload_len = read_u32(22..26)? as usize;

    let expected_total = HEADER_SIZE + payload_len + TRAILER_SIZE;
    if bytes.len() != expected_total {
        return Err(CodecError::Truncated {
            needed: expected_total,
            available: bytes.len(),
        });
    }

    let crc_offset = HEADER_SIZE + payload_len;
    let stored_crc = read_u32(crc_offset..crc_offset + 4)?;
    let computed_crc = compute_crc32(&bytes[..crc_offset]);
    if stored_crc != computed_crc {
        return Err(CodecError::ChecksumMismatch {
            expected: stored_crc,
            actual: computed_crc,
        });
    }

    Ok(SnapshotFrame {
        sequence,
        uncompressed_len,
        payload: &bytes[HEADER_SIZE..crc_offset],
    })
}

/// Computes CRC32 checksum for data (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let payload = vec![0xCA, 0xFE, 0xBA, 0xBE];
        let encoded = encode_frame(3000, 128, &payload).unwrap();
        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.sequence, 3000);
        assert_eq!(frame.uncompressed_len, 128);
        assert_eq!(frame.payload, &payload[..]);
    }

    #[test]
    fn empty_payload_roundtrip() {
        let encoded = encode_frame(0, 0, &[]).unwrap();
        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.sequence, 0);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn truncated_blob_fails() {
        let encoded = encode_frame(1000, 10, &[1, 2, 3]).unwrap();
        let result = decode_frame(&encoded[..encoded.len() - 2]);
        assert!(matches!(result, Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn bad_magic_fails() {
        let mut encoded = encode_frame(1000, 10, &[1, 2, 3]).unwrap();
        encoded[0] = b'X';
        let result = decode_frame(&encoded);
        assert!(matches!(result, Err(CodecError::BadMagic { .. })));
    }

    #[test]
    fn unknown_version_fails() {
        let mut encoded = encode_frame(1000, 10, &[1, 2, 3]).unwrap();
        encoded[4] = 0xFF;
        // Recompute the trailer so only the version is wrong.
        let crc_offset = encoded.len() - 4;
        let crc = compute_crc32(&encoded[..crc_offset]);
        encoded[crc_offset..].copy_from_slice(&crc.to_le_bytes());
        let result = decode_frame(&encoded);
        assert!(matches!(result, Err(CodecError::UnsupportedVersion { .. })));
    }

    #[test]
    fn flipped_payload_bit_fails_checksum() {
        let mut encoded = encode_frame(1000, 10, &[1, 2, 3, 4, 5]).unwrap();
        encoded[HEADER_SIZE + 2] ^= 0x01;
        let result = decode_frame(&encoded);
        assert!(matches!(result, Err(CodecError::ChecksumMismatch { .. })));
    }

    #[test]
    fn flipped_header_bit_fails_checksum() {
        let mut encoded = encode_frame(1000, 10, &[1, 2, 3]).unwrap();
        // Corrupt the sequence field.
        encoded[7] ^= 0x10;
        let result = decode_frame(&encoded);
        assert!(matches!(result, Err(CodecError::ChecksumMismatch { .. })));
    }

    #[test]
    fn crc32_known_value() {
        // Known test vector: "123456789" should give 0xCBF43926
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    proptest::proptest! {
        #[test]
        fn frame_roundtrip_arbitrary(
            sequence in proptest::prelude::any::<u64>(),
            payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..1024),
        ) {
            let encoded = encode_frame(sequence, payload.len() as u64, &payload).unwrap();
            let frame = decode_frame(&encoded).unwrap();
            proptest::prop_assert_eq!(frame.sequence, sequence);
            proptest::prop_assert_eq!(frame.payload, &payload[..]);
        }
    }
}
