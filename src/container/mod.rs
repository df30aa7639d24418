//! UFF container (C5): the on-disk layout, chunk streaming, per-track index, metadata, and
//! forensic block described in §4.4, plus the top-level [`UffFile`]/[`UffWriter`] types that tie
//! the header/index/chunk/footer pieces together into the open and create paths.

pub mod chunk;
pub mod footer;
pub mod forensic;
pub mod header;
pub mod index;
pub mod metadata;

use std::io::{Read, Seek, SeekFrom, Write};

pub use chunk::ParsedTrackChunk;
pub use footer::Footer;
pub use forensic::ForensicBlock;
pub use header::Header;
pub use index::{TrackIndexEntry, TrackIndexFlags};
pub use metadata::Metadata;

use crate::cancel::CancelToken;
use crate::error::{kinds, UffError};
use crate::flux::Track;
use crate::io::{ReadSeek, ReadWriteSeek};

/// A read-only summary of a container's track population, for quick reporting without walking
/// every chunk (§4.4 "Statistics").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContainerStats {
    pub valid_tracks: u32,
    pub damaged_tracks: u32,
    pub empty_tracks: u32,
    pub total_weak_regions: u64,
    pub total_flux_transitions: u64,
    pub flags: u32,
}

/// The outcome of [`UffFile::verify`]: every index entry whose recomputed CRC-32 did not match
/// its recorded value, plus the count of entries that verified cleanly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub verified: u32,
    pub mismatches: Vec<(u8, u8)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

fn track_slot(header: &Header, cylinder: u8, head: u8) -> Result<usize, UffError> {
    if cylinder >= header.cylinders || head >= header.heads {
        return Err(kinds::invalid_parameter().with_context(format!(
            "track {cylinder}/{head} is out of range for a {}-cylinder, {}-head image",
            header.cylinders, header.heads
        )));
    }
    Ok(cylinder as usize * header.heads as usize + head as usize)
}

/// An opened UFF container, read from any [`ReadSeek`] backing store. Tracks are loaded on
/// demand: opening a container only parses the header, track index, and optional metadata/
/// forensic block, per §4.4 "Open path".
pub struct UffFile<S> {
    backing: S,
    header: Header,
    index: Vec<TrackIndexEntry>,
    metadata: Option<Metadata>,
    forensic: Option<ForensicBlock>,
    /// Set when the header's own CRC did not validate; the container is still fully readable,
    /// per the open-path contract favoring partial recovery over a hard refusal.
    pub header_degraded: bool,
}

impl<S: ReadSeek> UffFile<S> {
    /// Opens a UFF container: validate the magic, load the header (tolerating a CRC mismatch in
    /// degraded mode), then load the track index and any optional trailing blocks.
    pub fn open(mut backing: S) -> Result<Self, UffError> {
        backing.seek(SeekFrom::Start(0))?;
        let mut header_bytes = [0u8; header::HEADER_SIZE];
        backing.read_exact(&mut header_bytes)?;
        let (header, crc_ok) = Header::from_bytes(&header_bytes)?;
        if !crc_ok {
            log::warn!("uff: header CRC mismatch, opening in degraded mode");
        }

        backing.seek(SeekFrom::Start(header.index_offset as u64))?;
        let mut index_bytes = vec![0u8; header.track_count as usize * index::INDEX_ENTRY_SIZE];
        backing.read_exact(&mut index_bytes)?;
        let index = index::read_index(&index_bytes, header.track_count)?;

        let metadata = if header.metadata_offset != 0 {
            backing.seek(SeekFrom::Start(header.metadata_offset as u64))?;
            let mut len_bytes = [0u8; 4];
            backing.read_exact(&mut len_bytes)?;
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut blob = vec![0u8; 4 + len];
            blob[..4].copy_from_slice(&len_bytes);
            backing.read_exact(&mut blob[4..])?;
            Some(Metadata::from_bytes(&blob)?)
        }
        else {
            None
        };

        let forensic = if header.forensic_offset != 0 {
            backing.seek(SeekFrom::Start(header.forensic_offset as u64))?;
            let mut blob = [0u8; forensic::FORENSIC_BLOCK_SIZE];
            backing.read_exact(&mut blob)?;
            Some(ForensicBlock::from_bytes(&blob)?)
        }
        else {
            None
        };

        Ok(Self {
            backing,
            header,
            index,
            metadata,
            forensic,
            header_degraded: !crc_ok,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn forensic(&self) -> Option<&ForensicBlock> {
        self.forensic.as_ref()
    }

    pub fn index_entry(&self, cylinder: u8, head: u8) -> Result<&TrackIndexEntry, UffError> {
        let slot = track_slot(&self.header, cylinder, head)?;
        Ok(&self.index[slot])
    }

    /// Loads and parses a single track's chunk on demand.
    pub fn read_track(&mut self, cylinder: u8, head: u8) -> Result<ParsedTrackChunk, UffError> {
        let slot = track_slot(&self.header, cylinder, head)?;
        let entry = self.index[slot];
        if !entry.is_present() {
            return Err(kinds::sector_not_found()
                .with_context(format!("no track chunk present for {cylinder}/{head}")));
        }
        self.backing.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut bytes = vec![0u8; entry.compressed_size as usize];
        self.backing.read_exact(&mut bytes)?;
        if &bytes[0..4] != b"TRK\0" {
            return Err(kinds::corrupt_chunk()
                .with_context(format!("track {cylinder}/{head} chunk missing \"TRK\\0\" magic")));
        }
        chunk::read_track_chunk(&bytes)
    }

    /// Iterates every present index entry, recomputing each track's CRC-32 and comparing it
    /// against the recorded value (§4.4 "Verify"). A cancelled token stops the scan at the next
    /// track boundary, leaving `verified`/`mismatches` as of the last completed track.
    pub fn verify(&mut self, cancel: &CancelToken) -> Result<VerifyReport, UffError> {
        let mut report = VerifyReport::default();
        let present: Vec<(u8, u8)> = self
            .index
            .iter()
            .filter(|e| e.is_present())
            .map(|e| (e.cylinder, e.head))
            .collect();

        for (cylinder, head) in present {
            cancel.check()?;
            let entry = *self.index_entry(cylinder, head)?;
            let parsed = self.read_track(cylinder, head)?;
            let computed = crate::codec::checksum::crc32(
                &parsed
                    .fused_flux
                    .iter()
                    .flat_map(|s| s.to_le_bytes())
                    .collect::<Vec<u8>>(),
            );
            if computed == entry.crc32 {
                report.verified += 1;
            }
            else {
                log::warn!("uff: CRC mismatch on track {cylinder}/{head}");
                report.mismatches.push((cylinder, head));
            }
        }
        Ok(report)
    }

    /// A read-only summary of the track population, without loading any track chunk.
    pub fn statistics(&self) -> ContainerStats {
        let mut stats = ContainerStats {
            flags: self.header.flags,
            ..Default::default()
        };
        for entry in &self.index {
            if !entry.is_present() {
                stats.empty_tracks += 1;
                continue;
            }
            let flags = TrackIndexFlags::from_bits_truncate(entry.flags);
            if flags.contains(TrackIndexFlags::VERIFIED_BAD) {
                stats.damaged_tracks += 1;
            }
            else {
                stats.valid_tracks += 1;
            }
            stats.total_weak_regions += entry.weak_regions as u64;
            // The index entry doesn't carry a flux-sample count directly; the chunk size is
            // dominated by the sample array (4 bytes each), so this is an upper-bound estimate
            // good enough for a summary. `read_track` gives the exact count when it matters.
            stats.total_flux_transitions += entry.uncompressed_size as u64 / 4;
        }
        stats
    }
}

/// A UFF container opened for writing. Streaming track writes append to the backing store and
/// update the in-memory index; [`UffWriter::close`] performs the final header/index/footer
/// rewrite sequence described in §4.4 "Create path"/"Track-write atomicity".
pub struct UffWriter<S> {
    backing: S,
    header: Header,
    index: Vec<TrackIndexEntry>,
    metadata: Option<Metadata>,
    forensic: Option<ForensicBlock>,
    cursor: u64,
}

impl<S: ReadWriteSeek> UffWriter<S> {
    /// Creates a new container: writes a placeholder header and a placeholder (all-empty) track
    /// index, leaving `backing`'s cursor positioned for the first streamed track write.
    pub fn create(mut backing: S, cylinders: u8, heads: u8, tick_ns: u16) -> Result<Self, UffError> {
        if cylinders == 0 || heads == 0 {
            return Err(kinds::invalid_parameter().with_context("a container needs at least one cylinder and head"));
        }
        let track_count = cylinders as u32 * heads as u32;
        let data_offset = header::HEADER_SIZE as u32 + track_count * index::INDEX_ENTRY_SIZE as u32;

        let mut header = Header::new(cylinders, heads, tick_ns);
        header.index_offset = header::HEADER_SIZE as u32;
        header.data_offset = data_offset;
        header.track_count = track_count;

        let index: Vec<TrackIndexEntry> = (0..cylinders)
            .flat_map(|c| (0..heads).map(move |h| (c, h)))
            .map(|(c, h)| TrackIndexEntry::empty(c, h))
            .collect();

        backing.seek(SeekFrom::Start(0))?;
        backing.write_all(&header.to_bytes()?)?;
        backing.write_all(&index::write_index(&index)?)?;

        Ok(Self {
            backing,
            header,
            index,
            metadata: None,
            forensic: None,
            cursor: data_offset as u64,
        })
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }

    pub fn set_forensic(&mut self, forensic: ForensicBlock) {
        self.forensic = Some(forensic);
    }

    /// Serializes and appends one fully-fused track at the writer's current position, then
    /// finalizes its index entry. Per "Track-write atomicity", the whole chunk is written before
    /// the index entry is updated, so an interrupted write never leaves a half-written chunk
    /// reachable through the index.
    pub fn write_track(&mut self, track: &Track) -> Result<(), UffError> {
        let slot = track_slot(&self.header, track.cylinder, track.head)?;
        let bytes = chunk::write_track_chunk(track)?;

        self.backing.seek(SeekFrom::Start(self.cursor))?;
        self.backing.write_all(&bytes)?;

        let mut flags = TrackIndexFlags::PRESENT;
        if !track.weak_regions.is_empty() {
            flags |= TrackIndexFlags::HAS_WEAK;
        }
        if !track.splices.is_empty() {
            flags |= TrackIndexFlags::HAS_SPLICES;
        }

        self.index[slot] = TrackIndexEntry {
            cylinder: track.cylinder,
            head: track.head,
            flags: flags.bits(),
            encoding: 0,
            offset: self.cursor as u32,
            compressed_size: bytes.len() as u32,
            uncompressed_size: bytes.len() as u32,
            revolutions: track.revolutions.len() as u16,
            weak_regions: track.weak_regions.len() as u16,
            crc32: track.crc32.ok_or_else(|| {
                kinds::invalid_parameter().with_context("track has no computed CRC-32 to index")
            })?,
        };
        self.cursor += bytes.len() as u64;
        Ok(())
    }

    /// Finalizes the container: writes the optional metadata/forensic blocks, rewrites the header
    /// and index with their final values, and writes the footer last (the reverse of the literal
    /// create-path write order) so that `Footer::verify` on the resulting bytes holds per the §8
    /// invariant - the footer's CRC-64 has to cover the final header/index bytes, which aren't
    /// known until this point. Returns the backing store, rewound to the start, for the caller to
    /// read back or persist.
    pub fn close(mut self) -> Result<S, UffError> {
        if let Some(metadata) = &self.metadata {
            self.header.metadata_offset = self.cursor as u32;
            let bytes = metadata.to_bytes()?;
            self.backing.seek(SeekFrom::Start(self.cursor))?;
            self.backing.write_all(&bytes)?;
            self.cursor += bytes.len() as u64;
        }
        if let Some(forensic) = &self.forensic {
            self.header.forensic_offset = self.cursor as u32;
            let bytes = forensic.to_bytes()?;
            self.backing.seek(SeekFrom::Start(self.cursor))?;
            self.backing.write_all(&bytes)?;
            self.cursor += bytes.len() as u64;
        }

        let footer_offset = self.cursor;
        self.header.file_size = footer_offset + footer::FOOTER_SIZE as u64;

        self.backing.seek(SeekFrom::Start(0))?;
        self.backing.write_all(&self.header.to_bytes()?)?;
        self.backing.seek(SeekFrom::Start(self.header.index_offset as u64))?;
        self.backing.write_all(&index::write_index(&self.index)?)?;

        // The footer's CRC-64 must cover the *final* header and index, so the whole body is read
        // back off the backing store rather than computed from the (now-stale) placeholder
        // bytes that were written at `create()` time.
        self.backing.seek(SeekFrom::Start(0))?;
        let mut body = vec![0u8; footer_offset as usize];
        self.backing.read_exact(&mut body)?;

        let footer = Footer::for_body(self.header.track_count, &body);
        self.backing.seek(SeekFrom::Start(footer_offset))?;
        self.backing.write_all(&footer.to_bytes()?)?;

        self.backing.seek(SeekFrom::Start(0))?;
        Ok(self.backing)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::flux::Revolution;

    fn fused_track(cylinder: u8, head: u8, confidences: [u8; 2]) -> Track {
        let mut track = Track::new(cylinder, head);
        track.add_revolution(Revolution::new(vec![100; 1000], confidences[0])).unwrap();
        track.add_revolution(Revolution::new(vec![105; 1000], confidences[1])).unwrap();
        track.fuse_and_analyze().unwrap();
        track
    }

    #[test]
    fn create_then_read_round_trips_a_track() {
        let backing = Cursor::new(Vec::new());
        let mut writer = UffWriter::create(backing, 40, 2, 25).unwrap();
        let track = fused_track(0, 0, [90, 85]);
        let expected_sha = track.sha256.unwrap();
        writer.write_track(&track).unwrap();
        let backing = writer.close().unwrap();

        let bytes = backing.into_inner();
        assert_eq!(&bytes[0..4], b"UFF\0");
        assert_eq!(&bytes[bytes.len() - footer::FOOTER_SIZE..bytes.len() - footer::FOOTER_SIZE + 4], b"END\0");
        assert!(Footer::verify(&bytes).unwrap());

        let mut file = UffFile::open(Cursor::new(bytes)).unwrap();
        assert!(!file.header_degraded);
        let parsed = file.read_track(0, 0).unwrap();
        assert_eq!(parsed.sha256, expected_sha);
        let entry = file.index_entry(0, 0).unwrap();
        let computed_crc = crate::codec::checksum::crc32(
            &parsed.fused_flux.iter().flat_map(|s| s.to_le_bytes()).collect::<Vec<u8>>(),
        );
        assert_eq!(computed_crc, entry.crc32);
        assert_eq!(entry.revolutions, 2);
    }

    #[test]
    fn verify_reports_clean_for_untampered_file() {
        let backing = Cursor::new(Vec::new());
        let mut writer = UffWriter::create(backing, 1, 1, 25).unwrap();
        writer.write_track(&fused_track(0, 0, [95, 95])).unwrap();
        let backing = writer.close().unwrap();

        let mut file = UffFile::open(backing).unwrap();
        let report = file.verify(&CancelToken::never()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.verified, 1);
    }

    #[test]
    fn out_of_range_track_is_rejected() {
        let backing = Cursor::new(Vec::new());
        let writer = UffWriter::create(backing, 1, 1, 25).unwrap();
        let backing = writer.close().unwrap();
        let mut file = UffFile::open(backing).unwrap();
        assert!(file.read_track(5, 0).is_err());
    }

    #[test]
    fn absent_track_reports_sector_not_found() {
        let backing = Cursor::new(Vec::new());
        let writer = UffWriter::create(backing, 2, 1, 25).unwrap();
        let backing = writer.close().unwrap();
        let mut file = UffFile::open(backing).unwrap();
        assert!(file.read_track(1, 0).is_err());
    }

    #[test]
    fn statistics_count_present_and_empty_tracks() {
        let backing = Cursor::new(Vec::new());
        let mut writer = UffWriter::create(backing, 2, 1, 25).unwrap();
        writer.write_track(&fused_track(0, 0, [90, 85])).unwrap();
        let backing = writer.close().unwrap();
        let file = UffFile::open(backing).unwrap();
        let stats = file.statistics();
        assert_eq!(stats.valid_tracks, 1);
        assert_eq!(stats.empty_tracks, 1);
    }
}
