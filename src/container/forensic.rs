//! The optional 512-byte forensic block: `"FOR\0"` plus fixed-offset ASCIIZ fields recording
//! who captured an image and under what case, for chain-of-custody workflows (§3 "UFF File",
//! §4.4 layout table).

use crate::error::{kinds, UffError};

pub const FORENSIC_BLOCK_SIZE: usize = 512;

const MAGIC: &[u8; 4] = b"FOR\0";
const EXAMINER_OFFSET: usize = 4;
const EXAMINER_LEN: usize = 64;
const CASE_NUMBER_OFFSET: usize = EXAMINER_OFFSET + EXAMINER_LEN;
const CASE_NUMBER_LEN: usize = 64;
const DEVICE_OFFSET: usize = CASE_NUMBER_OFFSET + CASE_NUMBER_LEN;
const DEVICE_LEN: usize = 128;
const TIMESTAMP_OFFSET: usize = DEVICE_OFFSET + DEVICE_LEN;
const NOTES_OFFSET: usize = TIMESTAMP_OFFSET + 8;
const NOTES_LEN: usize = FORENSIC_BLOCK_SIZE - NOTES_OFFSET;

/// Chain-of-custody metadata for a capture. Every field is optional; an empty string round-trips
/// as `None` rather than as a zero-length `Some("")`, so a forensic block written with no fields
/// set is indistinguishable from one that was never attached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForensicBlock {
    pub examiner: Option<String>,
    pub case_number: Option<String>,
    pub device: Option<String>,
    /// Unix timestamp (seconds) the capture was made, or 0 if unknown.
    pub timestamp: u64,
    pub notes: Option<String>,
}

fn write_asciiz(buf: &mut [u8], field: &Option<String>, name: &str) -> Result<(), UffError> {
    let Some(value) = field else {
        return Ok(());
    };
    if !value.is_ascii() {
        return Err(kinds::invalid_parameter().with_context(format!("forensic field {name} must be ASCII")));
    }
    // Reserve the trailing NUL: a field that exactly fills the slot would not round-trip back to
    // `Some` after `read_asciiz` strips the terminator.
    if value.len() >= buf.len() {
        return Err(kinds::invalid_parameter()
            .with_context(format!("forensic field {name} exceeds its {}-byte budget", buf.len())));
    }
    buf[..value.len()].copy_from_slice(value.as_bytes());
    Ok(())
}

fn read_asciiz(buf: &[u8]) -> Option<String> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&buf[..end]).into_owned())
}

impl ForensicBlock {
    pub fn to_bytes(&self) -> Result<[u8; FORENSIC_BLOCK_SIZE], UffError> {
        let mut out = [0u8; FORENSIC_BLOCK_SIZE];
        out[0..4].copy_from_slice(MAGIC);
        write_asciiz(&mut out[EXAMINER_OFFSET..EXAMINER_OFFSET + EXAMINER_LEN], &self.examiner, "examiner")?;
        write_asciiz(
            &mut out[CASE_NUMBER_OFFSET..CASE_NUMBER_OFFSET + CASE_NUMBER_LEN],
            &self.case_number,
            "case_number",
        )?;
        write_asciiz(&mut out[DEVICE_OFFSET..DEVICE_OFFSET + DEVICE_LEN], &self.device, "device")?;
        out[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].copy_from_slice(&self.timestamp.to_le_bytes());
        write_asciiz(&mut out[NOTES_OFFSET..NOTES_OFFSET + NOTES_LEN], &self.notes, "notes")?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UffError> {
        if bytes.len() < FORENSIC_BLOCK_SIZE {
            return Err(kinds::truncated_input().with_context("forensic block requires 512 bytes"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(kinds::bad_magic().with_context("forensic block missing \"FOR\\0\" magic"));
        }
        let mut timestamp_bytes = [0u8; 8];
        timestamp_bytes.copy_from_slice(&bytes[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8]);

        Ok(Self {
            examiner: read_asciiz(&bytes[EXAMINER_OFFSET..EXAMINER_OFFSET + EXAMINER_LEN]),
            case_number: read_asciiz(&bytes[CASE_NUMBER_OFFSET..CASE_NUMBER_OFFSET + CASE_NUMBER_LEN]),
            device: read_asciiz(&bytes[DEVICE_OFFSET..DEVICE_OFFSET + DEVICE_LEN]),
            timestamp: u64::from_le_bytes(timestamp_bytes),
            notes: read_asciiz(&bytes[NOTES_OFFSET..NOTES_OFFSET + NOTES_LEN]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_populated_fields() {
        let block = ForensicBlock {
            examiner: Some("J. Doe".to_string()),
            case_number: Some("2026-041".to_string()),
            device: Some("Greaseweazle V4".to_string()),
            timestamp: 1_745_000_000,
            notes: Some("side A only, side B unreadable".to_string()),
        };
        let bytes = block.to_bytes().unwrap();
        assert_eq!(bytes.len(), FORENSIC_BLOCK_SIZE);
        assert_eq!(&bytes[0..4], b"FOR\0");
        let decoded = ForensicBlock::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn empty_fields_round_trip_to_none() {
        let block = ForensicBlock::default();
        let bytes = block.to_bytes().unwrap();
        let decoded = ForensicBlock::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.examiner, None);
        assert_eq!(decoded.notes, None);
    }

    #[test]
    fn oversized_field_is_rejected() {
        let block = ForensicBlock {
            examiner: Some("x".repeat(EXAMINER_LEN + 1)),
            ..Default::default()
        };
        assert!(block.to_bytes().is_err());
    }

    #[test]
    fn missing_magic_is_rejected() {
        let bytes = [0u8; FORENSIC_BLOCK_SIZE];
        assert!(ForensicBlock::from_bytes(&bytes).is_err());
    }
}
