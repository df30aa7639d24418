//! The 128-byte UFF file header (§4.4).

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};

use crate::codec::checksum::crc32;
use crate::error::{kinds, UffError};

/// Total on-disk size of the header, including the padding that rounds the named fields out to
/// a fixed 128 bytes.
pub const HEADER_SIZE: usize = 128;

/// Number of leading bytes the header CRC is computed over: everything except the CRC field
/// itself and the trailing 8-byte reserved field.
const CRC_COVERED_SIZE: usize = HEADER_SIZE - 12;

#[binrw]
#[brw(little, magic = b"UFF\0")]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub flags: u32,
    pub cylinders: u8,
    pub heads: u8,
    pub start_track: u8,
    pub end_track: u8,
    pub tick_ns: u16,
    pub rpm: u16,
    pub encoding: u8,
    pub platform: u8,
    pub revolutions: u8,
    pub compression: u8,
    pub index_offset: u32,
    pub metadata_offset: u32,
    pub forensic_offset: u32,
    pub data_offset: u32,
    pub track_count: u32,
    pub file_size: u64,
    /// Reserved space separating the variable-length prefix from the trailing CRC and reserved
    /// field, so that both land at a fixed offset regardless of future field additions.
    #[brw(pad_before = 66)]
    pub header_crc: u32,
    pub reserved: u64,
}

impl Header {
    pub fn new(cylinders: u8, heads: u8, tick_ns: u16) -> Self {
        Self {
            version: 1,
            flags: 0,
            cylinders,
            heads,
            start_track: 0,
            end_track: cylinders.saturating_sub(1),
            tick_ns,
            rpm: 300,
            encoding: 0,
            platform: 0,
            revolutions: 0,
            compression: 0,
            index_offset: 0,
            metadata_offset: 0,
            forensic_offset: 0,
            data_offset: 0,
            track_count: 0,
            file_size: 0,
            header_crc: 0,
            reserved: 0,
        }
    }

    /// Serializes the header with `header_crc` zeroed, computes the CRC over the leading
    /// [`CRC_COVERED_SIZE`] bytes, then re-serializes with that value filled in.
    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE], UffError> {
        let mut draft = self.clone();
        draft.header_crc = 0;

        let mut buf = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        draft.write(&mut buf).map_err(UffError::from)?;
        let bytes = buf.into_inner();
        if bytes.len() != HEADER_SIZE {
            return Err(kinds::corrupt_header().with_context("serialized header did not match the fixed 128-byte size"));
        }

        let crc = crc32(&bytes[..CRC_COVERED_SIZE]);
        draft.header_crc = crc;

        let mut buf = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        draft.write(&mut buf).map_err(UffError::from)?;
        let bytes = buf.into_inner();
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Reads a header from its first 128 bytes. Per the open-path contract, a CRC mismatch does
    /// not fail the read; it is reported back as `false` so the caller can log a warning and
    /// continue, since forensic recovery favors partial access over a hard refusal.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, bool), UffError> {
        if bytes.len() < HEADER_SIZE {
            return Err(kinds::truncated_input().with_context("header requires 128 bytes"));
        }
        let mut cursor = Cursor::new(&bytes[..HEADER_SIZE]);
        let header = Header::read(&mut cursor).map_err(UffError::from)?;

        let expected = crc32(&bytes[..CRC_COVERED_SIZE]);
        let crc_ok = expected == header.header_crc;
        Ok((header, crc_ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields_and_validates_crc() {
        let mut header = Header::new(84, 2, 25);
        header.track_count = 168;
        header.file_size = 123_456;

        let bytes = header.to_bytes().unwrap();
        let (decoded, crc_ok) = Header::from_bytes(&bytes).unwrap();

        assert!(crc_ok);
        assert_eq!(decoded.cylinders, 84);
        assert_eq!(decoded.heads, 2);
        assert_eq!(decoded.track_count, 168);
        assert_eq!(decoded.file_size, 123_456);
    }

    #[test]
    fn corrupted_crc_is_reported_but_still_parses() {
        let header = Header::new(80, 2, 25);
        let mut bytes = header.to_bytes().unwrap();
        bytes[20] ^= 0xFF; // flip a byte inside the CRC-covered range
        let (_, crc_ok) = Header::from_bytes(&bytes).unwrap();
        assert!(!crc_ok);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let header = Header::new(80, 2, 25);
        let mut bytes = header.to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(Header::from_bytes(&bytes).is_err());
    }
}
