//! The track index: one 24-byte entry per `cylinder * heads + head` (§4.4).

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use bitflags::bitflags;

use crate::error::UffError;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TrackIndexFlags: u8 {
        const PRESENT      = 0b0000_0001;
        const HAS_WEAK     = 0b0000_0010;
        const HAS_SPLICES  = 0b0000_0100;
        const VERIFIED_BAD = 0b0000_1000;
    }
}

pub const INDEX_ENTRY_SIZE: usize = 24;

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackIndexEntry {
    pub cylinder: u8,
    pub head: u8,
    pub flags: u8,
    pub encoding: u8,
    pub offset: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub revolutions: u16,
    pub weak_regions: u16,
    pub crc32: u32,
}

impl TrackIndexEntry {
    pub fn empty(cylinder: u8, head: u8) -> Self {
        Self {
            cylinder,
            head,
            flags: 0,
            encoding: 0,
            offset: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            revolutions: 0,
            weak_regions: 0,
            crc32: 0,
        }
    }

    pub fn is_present(&self) -> bool {
        TrackIndexFlags::from_bits_truncate(self.flags).contains(TrackIndexFlags::PRESENT)
    }
}

/// Serializes the full index array (`track_count` entries, in `cylinder*heads+head` order).
pub fn write_index(entries: &[TrackIndexEntry]) -> Result<Vec<u8>, UffError> {
    let mut buf = Cursor::new(Vec::with_capacity(entries.len() * INDEX_ENTRY_SIZE));
    for entry in entries {
        entry.write(&mut buf).map_err(UffError::from)?;
    }
    Ok(buf.into_inner())
}

/// Reads `track_count` entries starting at the current position.
pub fn read_index(bytes: &[u8], track_count: u32) -> Result<Vec<TrackIndexEntry>, UffError> {
    let mut cursor = Cursor::new(bytes);
    (0..track_count)
        .map(|_| TrackIndexEntry::read(&mut cursor).map_err(UffError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_round_trips() {
        let mut entry = TrackIndexEntry::empty(5, 1);
        entry.flags = TrackIndexFlags::PRESENT.bits();
        entry.offset = 4096;
        entry.crc32 = 0xDEAD_BEEF;

        let bytes = write_index(&[entry]).unwrap();
        assert_eq!(bytes.len(), INDEX_ENTRY_SIZE);
        let decoded = read_index(&bytes, 1).unwrap();
        assert_eq!(decoded[0], entry);
        assert!(decoded[0].is_present());
    }

    #[test]
    fn absent_entry_reports_not_present() {
        let entry = TrackIndexEntry::empty(0, 0);
        assert!(!entry.is_present());
    }
}
