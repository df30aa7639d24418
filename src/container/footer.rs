//! The UFF footer: `"END\0"` + track count + whole-file CRC-64/ECMA (§4.4).
//!
//! The footer is the last thing written in the close-in-write-mode rewrite sequence (§5
//! "Ordering guarantees"): everything that precedes it on disk is covered by `file_crc64`, so a
//! torn write truncated before the footer leaves a file that fails the §8 footer invariant rather
//! than one that silently looks complete.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};

use crate::codec::checksum::crc64_ecma;
use crate::error::UffError;

pub const FOOTER_SIZE: usize = 16;

#[binrw]
#[brw(little, magic = b"END\0")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footer {
    pub track_count: u32,
    pub file_crc64: u64,
}

impl Footer {
    /// Builds a footer for `body` - every byte of the file that precedes the footer itself.
    pub fn for_body(track_count: u32, body: &[u8]) -> Self {
        Self {
            track_count,
            file_crc64: crc64_ecma(body),
        }
    }

    pub fn to_bytes(&self) -> Result<[u8; FOOTER_SIZE], UffError> {
        let mut buf = Cursor::new(Vec::with_capacity(FOOTER_SIZE));
        self.write(&mut buf).map_err(UffError::from)?;
        let bytes = buf.into_inner();
        let mut out = [0u8; FOOTER_SIZE];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UffError> {
        if bytes.len() < FOOTER_SIZE {
            return Err(crate::error::kinds::truncated_input().with_context("footer requires 16 bytes"));
        }
        let mut cursor = Cursor::new(&bytes[..FOOTER_SIZE]);
        Footer::read(&mut cursor).map_err(UffError::from)
    }

    /// Validates the §8 footer invariant against the whole file buffer: magic, footer position,
    /// and the CRC-64 over everything preceding it.
    pub fn verify(file: &[u8]) -> Result<bool, UffError> {
        if file.len() < FOOTER_SIZE {
            return Err(crate::error::kinds::truncated_input().with_context("file too short to contain a footer"));
        }
        let footer_start = file.len() - FOOTER_SIZE;
        if &file[footer_start..footer_start + 4] != b"END\0" {
            return Ok(false);
        }
        let footer = Self::from_bytes(&file[footer_start..])?;
        let computed = crc64_ecma(&file[..footer_start]);
        Ok(computed == footer.file_crc64 && footer.track_count as usize <= file.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let body = b"pretend this is a whole UFF file up to the footer";
        let footer = Footer::for_body(42, body);
        let bytes = footer.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"END\0");
        let decoded = Footer::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, footer);
    }

    #[test]
    fn verify_detects_tampering() {
        let body = b"0123456789";
        let footer = Footer::for_body(1, body);
        let mut file = body.to_vec();
        file.extend_from_slice(&footer.to_bytes().unwrap());
        assert!(Footer::verify(&file).unwrap());

        file[0] ^= 0xFF;
        assert!(!Footer::verify(&file).unwrap());
    }
}
