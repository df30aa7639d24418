//! GCR track engine (C6): sync scan → header decode → data decode → track scoring → disk-level
//! protection heuristics, the exemplar Commodore G64 pipeline (§4.5).

use crate::codec::gcr::{cbm_checksum, decode_5_to_4, find_sync, DEFAULT_MIN_SYNC_BYTES};
use crate::copy_protection::ProtectionScheme;
use crate::diagnosis::{Diagnosis, DiagnosisCode, DiagnosisLog};

/// Commodore 1541 sectors-per-track, by full track (1..=42; 36..=42 are the "40/42-track"
/// extended zone some drives could reach, sharing the innermost zone's 17-sector count).
pub fn sectors_per_track(full_track: u8) -> u8 {
    match full_track {
        1..=17 => 21,
        18..=24 => 19,
        25..=30 => 18,
        _ => 17,
    }
}

/// Speed zone index (0..=3), per §3 "G64 Track": zone 3 is the outer, fastest zone (tracks
/// 1-17), zone 0 the inner, slowest zone (31 and beyond).
pub fn speed_zone(full_track: u8) -> u8 {
    match full_track {
        1..=17 => 3,
        18..=24 => 2,
        25..=30 => 1,
        _ => 0,
    }
}

/// Bitcell duration in nanoseconds, indexed by speed zone.
pub const BITCELL_NS: [u16; 4] = [4000, 3750, 3500, 3200];
/// Expected raw track size in bytes, indexed by speed zone.
pub const EXPECTED_TRACK_SIZE: [u32; 4] = [6250, 6666, 7142, 7692];

/// Converts a G64 half-track number (1..=84) to the full track it belongs to.
pub fn full_track_from_half(half_track: u8) -> u8 {
    (half_track + 1) / 2
}

const HEADER_MARKER: u8 = 0x08;
const DATA_MARKER: u8 = 0x07;
const HEADER_GCR_LEN: usize = 10;
const DATA_GCR_LEN: usize = 325; // 65 * 5-byte blocks = 260 decoded bytes
const DATA_SYNC_SEARCH_WINDOW: usize = 100;
const MAX_SYNCS_PER_TRACK: usize = 32;

/// One decoded GCR sector: identity, checksums, byte positions inside the track, and validity
/// flags, per §3 "Sector (GCR)".
#[derive(Clone, Debug)]
pub struct GcrSector {
    pub track_id: u8,
    pub sector_id: u8,
    pub header_checksum: u8,
    pub data: [u8; 256],
    pub data_checksum: u8,
    pub sync_offset: usize,
    pub header_offset: usize,
    pub data_offset: usize,
    pub header_valid: bool,
    pub data_valid: bool,
    pub header_csum_ok: bool,
    pub data_csum_ok: bool,
}

impl GcrSector {
    /// A sector is unambiguously clean: every decode succeeded and both checksums matched.
    pub fn is_clean(&self) -> bool {
        self.header_valid && self.data_valid && self.header_csum_ok && self.data_csum_ok
    }
}

/// The result of parsing one physical track's raw GCR byte stream (§4.5 "Parse track").
#[derive(Clone, Debug)]
pub struct ParsedGcrTrack {
    pub half_track: u8,
    pub full_track: u8,
    pub speed_zone: u8,
    pub sectors: Vec<GcrSector>,
    pub sync_count: usize,
    pub has_long_sync: bool,
    pub has_extra_sectors: bool,
    pub is_killer_track: bool,
    pub diagnoses: DiagnosisLog,
}

impl ParsedGcrTrack {
    pub fn valid_sector_count(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_clean()).count()
    }

    pub fn decode_error_count(&self) -> usize {
        self.sectors.iter().filter(|s| !s.header_valid || !s.data_valid).count()
    }

    /// `true` if this track has at least one sector whose fused flux carried a [`crate::flux::WeakRegion`]
    /// (the caller is expected to combine the GCR-level parse with the flux-level fusion result;
    /// this engine does not itself see confidence data).
    pub fn has_weak_bits(&self, weak: bool) -> bool {
        weak
    }
}

/// Parses a raw GCR byte stream for one physical track, per §4.5 steps 1-6.
pub fn parse_track(data: &[u8], half_track: u8) -> ParsedGcrTrack {
    let full_track = full_track_from_half(half_track);
    let speed_zone = speed_zone(full_track);
    let expected_sectors = sectors_per_track(full_track) as usize;

    let mut diagnoses = DiagnosisLog::new();
    let mut sectors = Vec::new();
    let mut sync_count = 0usize;
    let mut has_long_sync = false;
    let mut pos = 0usize;

    while pos < data.len() && sync_count < MAX_SYNCS_PER_TRACK {
        let Some(mark) = find_sync(data, pos, DEFAULT_MIN_SYNC_BYTES)
        else {
            break;
        };
        sync_count += 1;

        if mark.length > 10 {
            has_long_sync = true;
            diagnoses.push(Diagnosis::new(
                DiagnosisCode::LongSync,
                full_track,
                None,
                format!("sync run of {} bytes at offset {}", mark.length, mark.offset),
            ));
        }

        let header_offset = mark.offset + mark.length;
        if header_offset + HEADER_GCR_LEN > data.len() {
            break;
        }

        let block0: [u8; 5] = data[header_offset..header_offset + 5].try_into().unwrap();
        let block1: [u8; 5] = data[header_offset + 5..header_offset + 10].try_into().unwrap();
        let d0 = decode_5_to_4(&block0);
        let d1 = decode_5_to_4(&block1);
        let header_bytes = [
            d0.bytes[0], d0.bytes[1], d0.bytes[2], d0.bytes[3], d1.bytes[0], d1.bytes[1], d1.bytes[2], d1.bytes[3],
        ];
        let header_decoded_ok = d0.is_valid() && d1.is_valid();
        let header_marker_ok = header_bytes[0] == HEADER_MARKER;
        let header_valid = header_decoded_ok && header_marker_ok;

        let header_checksum = header_bytes[1];
        let sector_id = header_bytes[2];
        let track_id = header_bytes[3];
        let id2 = header_bytes[4];
        let id1 = header_bytes[5];
        let header_csum_ok = header_checksum == (sector_id ^ track_id ^ id2 ^ id1);

        if header_valid && track_id != full_track {
            diagnoses.push(Diagnosis::new(
                DiagnosisCode::WrongTrackId,
                full_track,
                Some(sector_id),
                format!("sector header claims track {track_id}, expected {full_track}"),
            ));
        }
        if header_valid && !header_csum_ok {
            diagnoses.push(Diagnosis::new(
                DiagnosisCode::HeaderChecksumError,
                full_track,
                Some(sector_id),
                "header checksum did not match sector/track/id bytes".to_string(),
            ));
        }

        let mut sector = GcrSector {
            track_id,
            sector_id,
            header_checksum,
            data: [0u8; 256],
            data_checksum: 0,
            sync_offset: mark.offset,
            header_offset,
            data_offset: 0,
            header_valid,
            data_valid: false,
            header_csum_ok,
            data_csum_ok: false,
        };

        let mut next_pos = header_offset + HEADER_GCR_LEN;
        let search_start = header_offset + HEADER_GCR_LEN;
        let search_limit = (search_start + DATA_SYNC_SEARCH_WINDOW).min(data.len());
        if let Some(data_mark) = find_sync(&data[..search_limit], search_start, DEFAULT_MIN_SYNC_BYTES) {
            let data_offset = data_mark.offset + data_mark.length;
            sector.data_offset = data_offset;
            if data_offset + DATA_GCR_LEN <= data.len() {
                let mut decoded = Vec::with_capacity(260);
                let mut all_decoded_ok = true;
                for i in 0..65 {
                    let start = data_offset + i * 5;
                    let block: [u8; 5] = data[start..start + 5].try_into().unwrap();
                    let d = decode_5_to_4(&block);
                    all_decoded_ok &= d.is_valid();
                    decoded.extend_from_slice(&d.bytes);
                }
                let marker_ok = decoded[0] == DATA_MARKER;
                let payload = &decoded[1..257];
                let csum_byte = decoded[257];
                let computed_csum = cbm_checksum(payload);
                let data_csum_ok = computed_csum == csum_byte;

                sector.data.copy_from_slice(payload);
                sector.data_checksum = csum_byte;
                sector.data_csum_ok = data_csum_ok;
                sector.data_valid = all_decoded_ok && marker_ok;

                if sector.data_valid && !data_csum_ok {
                    diagnoses.push(Diagnosis::new(
                        DiagnosisCode::DataChecksumError,
                        full_track,
                        Some(sector_id),
                        "data checksum did not match the decoded 256-byte payload".to_string(),
                    ));
                }
                next_pos = data_offset + DATA_GCR_LEN;
            }
        }

        sectors.push(sector);
        pos = next_pos;
    }

    let sector_count = sectors.len();
    let valid_sector_count = sectors.iter().filter(|s| s.is_clean()).count();
    let mut has_extra_sectors = false;
    let mut is_killer_track = false;

    if sector_count > expected_sectors {
        has_extra_sectors = true;
        diagnoses.push(Diagnosis::new(
            DiagnosisCode::ExtraSectors,
            full_track,
            None,
            format!("found {sector_count} sectors, expected {expected_sectors}"),
        ));
    }
    else if sector_count < expected_sectors {
        diagnoses.push(Diagnosis::new(
            DiagnosisCode::MissingSector,
            full_track,
            None,
            format!("found {sector_count} sectors, expected {expected_sectors}"),
        ));
    }

    if sync_count == 0 || (valid_sector_count == 0 && sector_count > 0) {
        is_killer_track = true;
        diagnoses.push(Diagnosis::new(
            DiagnosisCode::KillerTrack,
            full_track,
            None,
            "no sync marks or no valid sectors found on this track".to_string(),
        ));
    }

    ParsedGcrTrack {
        half_track,
        full_track,
        speed_zone,
        sectors,
        sync_count,
        has_long_sync,
        has_extra_sectors,
        is_killer_track,
        diagnoses,
    }
}

/// A track's composite quality score, each sub-score in `0.0..=1.0` (§4.5 "Track score").
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackScore {
    pub sync_score: f64,
    pub gcr_score: f64,
    pub checksum_score: f64,
    pub structure_score: f64,
    pub timing_score: f64,
    pub overall: f64,
}

/// Scores a parsed track against its zone's expected raw byte size, per the weighted formula in
/// §4.5.
pub fn track_score(track: &ParsedGcrTrack, track_size: usize) -> TrackScore {
    let expected_sectors = sectors_per_track(track.full_track) as f64;
    let sector_count = track.sectors.len() as f64;

    let sync_score = (track.sync_count as f64 / expected_sectors).min(1.0);
    let gcr_score = if sector_count > 0.0 {
        1.0 - (track.decode_error_count() as f64 / sector_count)
    }
    else {
        0.0
    };
    let checksum_score = (track.valid_sector_count() as f64 / expected_sectors).min(1.0);
    let structure_score = (sector_count / expected_sectors).min(1.0);

    let expected_size = EXPECTED_TRACK_SIZE[track.speed_zone as usize] as f64;
    let timing_score = if track_size as f64 > 1.1 * expected_size {
        0.9
    }
    else if (track_size as f64) < 0.9 * expected_size {
        0.8
    }
    else {
        1.0
    };

    let overall = 0.20 * sync_score + 0.25 * gcr_score + 0.25 * checksum_score + 0.15 * structure_score + 0.15 * timing_score;

    TrackScore {
        sync_score,
        gcr_score,
        checksum_score,
        structure_score,
        timing_score,
        overall,
    }
}

/// Per-track signals the disk-level protection heuristic needs. The GCR parse alone can tell
/// `has_long_sync`/`has_extra_sectors`/`is_killer_track`/`half_track_has_data`; `has_weak_bits`
/// comes from the corresponding [`crate::flux::Track`]'s fused weak-region set and is supplied
/// by the caller, since this module has no visibility into flux confidence data.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackProtectionSignals {
    pub full_track: u8,
    pub has_weak_bits: bool,
    pub is_killer_track: bool,
    pub has_long_sync: bool,
    pub has_extra_sectors: bool,
    /// Data was recorded on a half-track position (an odd half-track that is not itself a whole
    /// track boundary, e.g. half-track 2 sitting between full tracks 1 and 2).
    pub half_track_has_data: bool,
}

/// Disk-level copy-protection heuristic, per §4.5 "Protection heuristic". Checked in the fixed
/// priority order the spec lists; the first matching condition wins.
pub fn detect_protection(signals: &[TrackProtectionSignals]) -> Option<ProtectionScheme> {
    let weak_tracks = signals.iter().filter(|s| s.has_weak_bits).count();
    let half_tracks_with_data = signals.iter().filter(|s| s.half_track_has_data).count();
    let long_sync_tracks = signals.iter().filter(|s| s.has_long_sync).count();
    let extra_sector_tracks = signals.iter().filter(|s| s.has_extra_sectors).count();
    let killer_tracks = signals.iter().filter(|s| s.is_killer_track).count();
    let track_20 = signals.iter().find(|s| s.full_track == 20);

    if weak_tracks > 0 && half_tracks_with_data > 0 {
        Some(ProtectionScheme::VorpalRapidLok(0.90))
    }
    else if track_20.is_some_and(|t| t.has_weak_bits || t.is_killer_track) {
        Some(ProtectionScheme::VMax(0.85))
    }
    else if long_sync_tracks > 5 {
        Some(ProtectionScheme::EpyxFastLoad(0.75))
    }
    else if weak_tracks > 3 {
        Some(ProtectionScheme::GenericWeakBit(0.70))
    }
    else if half_tracks_with_data > 2 {
        Some(ProtectionScheme::HalfTrack(0.80))
    }
    else if extra_sector_tracks > 0 {
        Some(ProtectionScheme::ExtraSector(0.65))
    }
    else if killer_tracks > 0 {
        Some(ProtectionScheme::KillerTrack(0.70))
    }
    else {
        None
    }
}

const D64_STANDARD_TRACKS: u8 = 35;
const D64_SECTOR_SIZE: usize = 256;
const D64_ERROR_BYTES: usize = 683;

/// Cumulative sector offset of `full_track` within a D64 image (sectors on every preceding track).
pub fn d64_track_byte_offset(full_track: u8) -> usize {
    (1..full_track).map(|t| sectors_per_track(t) as usize).sum()
}

/// Builds a D64 image from decoded GCR tracks, per §4.5 "D64 export": only the 35 standard
/// tracks participate, and sectors with an out-of-range id are skipped rather than overflowing
/// the buffer. When `include_errors` is set, a trailing 683-byte error map is appended: `0x01`
/// for a clean sector, `0x05` for one whose data checksum failed.
pub fn export_d64(tracks: &[ParsedGcrTrack], include_errors: bool) -> Vec<u8> {
    let total_sectors = d64_track_byte_offset(D64_STANDARD_TRACKS + 1);
    let mut buf = vec![0u8; total_sectors * D64_SECTOR_SIZE];
    let mut errors = vec![0x01u8; D64_ERROR_BYTES];

    for track in tracks {
        if track.full_track < 1 || track.full_track > D64_STANDARD_TRACKS {
            continue;
        }
        let spt = sectors_per_track(track.full_track);
        let track_offset = d64_track_byte_offset(track.full_track);
        for sector in &track.sectors {
            if sector.sector_id >= spt {
                continue;
            }
            let abs_sector = track_offset + sector.sector_id as usize;
            let byte_offset = abs_sector * D64_SECTOR_SIZE;
            buf[byte_offset..byte_offset + D64_SECTOR_SIZE].copy_from_slice(&sector.data);
            if include_errors {
                errors[abs_sector] = if sector.data_csum_ok { 0x01 } else { 0x05 };
            }
        }
    }

    if include_errors {
        buf.extend_from_slice(&errors);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_header(sector_id: u8, track_id: u8) -> Vec<u8> {
        let id2 = 0u8;
        let id1 = 0xFFu8;
        let csum = sector_id ^ track_id ^ id2 ^ id1;
        let block0 = crate::codec::gcr::encode_4_to_5(&[0x08, csum, sector_id, track_id]);
        let block1 = crate::codec::gcr::encode_4_to_5(&[id2, id1, 0x0F, 0x0F]);
        [block0.as_slice(), block1.as_slice()].concat()
    }

    fn encode_data(payload: &[u8; 256]) -> Vec<u8> {
        let csum = cbm_checksum(payload);
        let mut full = Vec::with_capacity(260);
        full.push(DATA_MARKER);
        full.extend_from_slice(payload);
        full.push(csum);
        full.push(0);
        full.push(0);
        let mut out = Vec::with_capacity(325);
        for chunk in full.chunks(4) {
            let mut buf4 = [0u8; 4];
            buf4[..chunk.len()].copy_from_slice(chunk);
            out.extend_from_slice(&crate::codec::gcr::encode_4_to_5(&buf4));
        }
        out
    }

    fn build_one_sector_track(full_track: u8, sector_id: u8, payload: &[u8; 256]) -> Vec<u8> {
        let mut track = vec![0xFFu8; 6];
        track.extend(encode_header(sector_id, full_track));
        track.extend(vec![0x55u8; 8]); // gap, not sync
        track.extend(vec![0xFFu8; 6]);
        track.extend(encode_data(payload));
        track.extend(vec![0x55u8; 16]);
        track
    }

    #[test]
    fn parses_a_single_clean_sector() {
        let payload = [0x42u8; 256];
        let raw = build_one_sector_track(1, 0, &payload);
        let parsed = parse_track(&raw, 1);
        assert_eq!(parsed.full_track, 1);
        assert_eq!(parsed.sectors.len(), 1);
        let sector = &parsed.sectors[0];
        assert!(sector.header_valid);
        assert!(sector.header_csum_ok);
        assert!(sector.data_valid);
        assert!(sector.data_csum_ok);
        assert_eq!(sector.data, payload);
    }

    #[test]
    fn wrong_track_id_is_flagged() {
        let payload = [0u8; 256];
        let raw = build_one_sector_track(5, 0, &payload);
        // Half-track 1 maps to full track 1, but the header claims track 5.
        let parsed = parse_track(&raw, 1);
        assert!(parsed
            .diagnoses
            .entries()
            .iter()
            .any(|d| d.code == DiagnosisCode::WrongTrackId));
    }

    #[test]
    fn empty_track_is_a_killer_track() {
        let raw = vec![0x55u8; 200];
        let parsed = parse_track(&raw, 1);
        assert!(parsed.is_killer_track);
        assert_eq!(parsed.sync_count, 0);
    }

    #[test]
    fn v_max_protection_matches_seed_case() {
        let mut signals = Vec::new();
        for t in 1..=35u8 {
            signals.push(TrackProtectionSignals {
                full_track: t,
                has_weak_bits: t == 20,
                ..Default::default()
            });
        }
        let scheme = detect_protection(&signals).expect("protection should be detected");
        assert_eq!(scheme.name(), "V-Max!");
        assert!((scheme.confidence() - 0.85).abs() < 1e-9);
    }

    #[test]
    fn vorpal_outranks_v_max_when_both_signals_present() {
        let mut signals = vec![TrackProtectionSignals {
            full_track: 20,
            has_weak_bits: true,
            ..Default::default()
        }];
        signals.push(TrackProtectionSignals {
            full_track: 10,
            half_track_has_data: true,
            ..Default::default()
        });
        let scheme = detect_protection(&signals).unwrap();
        assert_eq!(scheme.name(), "Vorpal/RapidLok");
    }

    #[test]
    fn d64_export_places_sector_at_expected_offset() {
        let payload = [0x99u8; 256];
        let raw = build_one_sector_track(2, 3, &payload);
        let parsed = parse_track(&raw, 3); // half-track 3 -> full track 2
        let d64 = export_d64(&[parsed], false);
        let offset = d64_track_byte_offset(2) + 3;
        assert_eq!(&d64[offset * 256..offset * 256 + 256], &payload[..]);
    }

    #[test]
    fn full_track_from_half_matches_known_mapping() {
        assert_eq!(full_track_from_half(1), 1);
        assert_eq!(full_track_from_half(2), 1);
        assert_eq!(full_track_from_half(3), 2);
        assert_eq!(full_track_from_half(39), 20);
    }
}
