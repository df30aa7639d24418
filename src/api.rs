//! Public façade (C9): the unified `open`/`probe`/`fuse`/`export`/`verify` surface a CLI or GUI
//! front-end is expected to consume, tying the variant detector, UFF container, GCR track engine,
//! and the two filesystem engines together behind one entry point.
//!
//! Data flow (§2): bytes → [`detect`] identifies the variant → dispatch into the flux/container
//! path or the sector/filesystem path → the GCR track engine and filesystem engines materialise
//! tracks, sectors, and directories → this module exports the result.

use std::io::Cursor;

use crate::amiga::{self, AmigaImage, ValidationReport};
use crate::cancel::CancelToken;
use crate::codec::endian::{read_u16_le, read_u32_le};
use crate::container::{UffFile, VerifyReport};
use crate::copy_protection::ProtectionScheme;
use crate::detect::{self, Variant, VariantInfo};
use crate::error::{kinds, UffError};
use crate::flux::Track;
use crate::gcr_track::{self, ParsedGcrTrack, TrackProtectionSignals};
use crate::sector_image::{CbmImage, CbmType};

const UFF_MAGIC: &[u8; 4] = b"UFF\0";

/// The outcome of [`probe`]: either this crate's own container format, identified by its magic
/// ahead of the legacy-variant ladder (`detect::Variant` has no UFF member - UFF isn't one of the
/// legacy formats C3 identifies, it's this crate's own), or a legacy [`VariantInfo`].
#[derive(Clone, Debug)]
pub enum ProbeResult {
    Uff,
    Legacy(VariantInfo),
}

/// Identifies a byte buffer's format without materialising it.
pub fn probe(bytes: &[u8]) -> Result<ProbeResult, UffError> {
    if is_uff(bytes) {
        return Ok(ProbeResult::Uff);
    }
    detect::detect(bytes).map(ProbeResult::Legacy)
}

fn is_uff(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[0..4] == UFF_MAGIC
}

/// A G64 container's decoded tracks, indexed by half-track (`tracks[0]` is half-track 1). A slot
/// is `None` when the container's track-offset table named no data for that half-track.
pub struct G64Image {
    pub version: u8,
    pub tracks: Vec<Option<ParsedGcrTrack>>,
}

/// Everything [`open`] can hand back, one variant per engine this build can actually decode.
/// Formats [`detect`] can identify but this build has no decode engine for (WOZ, IPF, ATR, SCP,
/// HFE, DMK, NIB, generic IMG) surface through `detect`/`probe` for reporting purposes only;
/// `open` rejects them with [`crate::error::UffErrorKind::UnsupportedVariant`].
pub enum OpenedImage {
    Uff(UffFile<Cursor<Vec<u8>>>),
    Cbm(CbmImage<'static>),
    Amiga(AmigaImage<'static>),
    Gcr(G64Image),
}

/// Opens a byte buffer through the same dispatch the data-flow sentence in §2 describes:
/// identify, then route into the matching engine. `extension_hint` (a bare extension like `"d71"`,
/// case-insensitive, no leading dot) disambiguates the Commodore sector-image family when the
/// buffer's size alone doesn't - `detect` only defines exact/range sizes for D64 (§4.1), so a
/// same-family D71/D81 image is resolved here from size and, if that's ambiguous too, the hint.
pub fn open(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<OpenedImage, UffError> {
    if is_uff(&bytes) {
        log::debug!("api: opening a {}-byte buffer as a UFF container", bytes.len());
        return Ok(OpenedImage::Uff(UffFile::open(Cursor::new(bytes))?));
    }

    match detect::detect(&bytes) {
        Ok(info) => open_variant(bytes, info, extension_hint),
        Err(err) => {
            if let Ok(cbm_type) = resolve_cbm_type(bytes.len(), extension_hint) {
                log::debug!(
                    "api: {}-byte buffer resolved to {cbm_type:?} by size/extension after detect() found no match",
                    bytes.len()
                );
                return Ok(OpenedImage::Cbm(CbmImage::open_owned(bytes, cbm_type)?));
            }
            Err(err)
        }
    }
}

fn open_variant(bytes: Vec<u8>, info: VariantInfo, extension_hint: Option<&str>) -> Result<OpenedImage, UffError> {
    match info.format {
        Variant::D64 => {
            let cbm_type = resolve_cbm_type(bytes.len(), extension_hint).unwrap_or(CbmType::D64);
            Ok(OpenedImage::Cbm(CbmImage::open_owned(bytes, cbm_type)?))
        }
        Variant::Adf => Ok(OpenedImage::Amiga(open_adf(bytes)?)),
        Variant::G64 => Ok(OpenedImage::Gcr(read_g64(&bytes)?)),
        other => {
            log::warn!(
                "api: {} was identified (confidence {}) but this build has no decode engine for it",
                other.name(),
                info.confidence
            );
            Err(kinds::unsupported_variant()
                .with_context(format!("{} is detected but not decodable by this build", other.name())))
        }
    }
}

/// Maps a raw byte length (and, if the length alone is ambiguous, a bare file extension) to a
/// [`CbmType`]. The size table covers every standard D64/D71/D81 size with and without a trailing
/// error map; `detect`'s own D64 rung only defines the D64 half of this table (§4.1), so this is
/// the one place the full family is resolved.
fn resolve_cbm_type(len: usize, extension_hint: Option<&str>) -> Result<CbmType, UffError> {
    const D64_SIZES: &[usize] = &[174_848, 175_531, 196_608, 197_376, 205_312, 206_114];
    const D71_SIZES: &[usize] = &[349_696, 351_062];
    const D81_SIZES: &[usize] = &[819_200, 822_400];

    if D64_SIZES.contains(&len) {
        return Ok(CbmType::D64);
    }
    if D71_SIZES.contains(&len) {
        return Ok(CbmType::D71);
    }
    if D81_SIZES.contains(&len) {
        return Ok(CbmType::D81);
    }
    match extension_hint.map(|e| e.to_ascii_lowercase()) {
        Some(ref e) if e == "d64" => Ok(CbmType::D64),
        Some(ref e) if e == "d71" => Ok(CbmType::D71),
        Some(ref e) if e == "d81" => Ok(CbmType::D81),
        _ => Err(kinds::unknown_format().with_context(format!("{len} bytes does not match a known D64/D71/D81 size"))),
    }
}

const ADF_ROOT_BM_PAGES_OFFSET: usize = 312;
const ADF_MAX_BM_PAGES: usize = 25;

/// Builds an [`AmigaImage`] from raw ADF bytes. Nothing below the boot block's `"DOS"` signature
/// self-describes the root block's location, so this follows the standard `total_blocks / 2`
/// convention (the same one [`amiga::format::format`] writes), then reads the bitmap extension
/// block list straight out of that root block's `bm_pages` table.
fn open_adf(data: Vec<u8>) -> Result<AmigaImage<'static>, UffError> {
    let total_blocks = (data.len() / amiga::block::BLOCK_SIZE) as u32;
    let root_block = total_blocks / 2;
    let bitmap_block_ids = read_bitmap_ids(&data, root_block)?;
    Ok(AmigaImage::open_owned(data, root_block, bitmap_block_ids))
}

fn read_bitmap_ids(data: &[u8], root_block: u32) -> Result<Vec<u32>, UffError> {
    let block = amiga::block::block_slice(data, root_block)?;
    let mut ids = Vec::new();
    for i in 0..ADF_MAX_BM_PAGES {
        let id = amiga::block::read_u32(block, ADF_ROOT_BM_PAGES_OFFSET + i * 4);
        if id == 0 {
            break;
        }
        ids.push(id);
    }
    if ids.is_empty() {
        return Err(kinds::corrupt_header().with_context("root block names no bitmap extension blocks"));
    }
    Ok(ids)
}

const G64_HALF_TRACKS: usize = 84;
const G64_HEADER_SIZE: usize = 12;

/// Parses a G64 container (§6): 12-byte header, then a fixed 84-entry track-offset table and an
/// 84-entry speed-zone table (not consulted here - [`gcr_track::speed_zone`] derives the same
/// value from the track number), then each present track's `u16` length prefix and raw GCR bytes.
fn read_g64(bytes: &[u8]) -> Result<G64Image, UffError> {
    if bytes.len() < G64_HEADER_SIZE || &bytes[0..8] != b"GCR-1541" {
        return Err(kinds::bad_magic().with_context("buffer does not start with the G64 magic"));
    }
    let version = bytes[8];
    let offset_table_start = G64_HEADER_SIZE;

    let mut tracks = Vec::with_capacity(G64_HALF_TRACKS);
    for half_track in 1..=G64_HALF_TRACKS {
        let table_offset = offset_table_start + (half_track - 1) * 4;
        let track_offset = read_u32_le(bytes, table_offset)? as usize;
        if track_offset == 0 {
            tracks.push(None);
            continue;
        }
        let len = read_u16_le(bytes, track_offset)? as usize;
        let start = track_offset + 2;
        let data = bytes.get(start..start + len).ok_or_else(|| {
            kinds::truncated_input().with_context(format!("half-track {half_track}'s data runs past the end of the buffer"))
        })?;
        tracks.push(Some(gcr_track::parse_track(data, half_track as u8)));
    }

    Ok(G64Image { version, tracks })
}

/// Runs the fusion pipeline on a single track, checking `cancel` first so a tripped token never
/// even begins the (CPU-bound but potentially large) fuse pass.
pub fn fuse(track: &mut Track, cancel: &CancelToken) -> Result<(), UffError> {
    cancel.check()?;
    track.fuse_and_analyze()
}

/// Runs [`fuse`] over every track in sequence, checking `cancel` between tracks (§5
/// "Cancellation": checked once per track iteration).
pub fn fuse_all(tracks: &mut [Track], cancel: &CancelToken) -> Result<(), UffError> {
    for track in tracks {
        cancel.check()?;
        track.fuse_and_analyze()?;
    }
    Ok(())
}

/// The result of [`verify`], one shape per engine.
pub enum VerifyOutcome {
    Container(VerifyReport),
    Amiga(ValidationReport),
    Cbm { directory_entries: u32, total_free: u32 },
    Gcr { tracks_present: u32, decode_errors: u32 },
}

/// Verifies an opened image using whichever check its engine defines: a UFF container re-checks
/// every track's CRC-32, an AmigaDOS image walks its directory graph against its bitmap, a
/// Commodore image confirms its directory is walkable and reports free space, and a G64 reports
/// per-track GCR decode error counts.
pub fn verify(image: &mut OpenedImage, cancel: &CancelToken) -> Result<VerifyOutcome, UffError> {
    match image {
        OpenedImage::Uff(file) => Ok(VerifyOutcome::Container(file.verify(cancel)?)),
        OpenedImage::Amiga(img) => Ok(VerifyOutcome::Amiga(img.validate()?)),
        OpenedImage::Cbm(cbm) => {
            cancel.check()?;
            let directory_entries = cbm.directory()?.len() as u32;
            Ok(VerifyOutcome::Cbm {
                directory_entries,
                total_free: cbm.total_free(),
            })
        }
        OpenedImage::Gcr(g64) => {
            cancel.check()?;
            let present = g64.tracks.iter().flatten();
            let tracks_present = present.clone().count() as u32;
            let decode_errors = present.map(|t| t.decode_error_count() as u32).sum();
            Ok(VerifyOutcome::Gcr {
                tracks_present,
                decode_errors,
            })
        }
    }
}

/// Serializes an opened image back to its on-disk bytes. A [`UffFile`] is opened read-only and
/// has no byte-level re-export here - use [`crate::container::UffWriter`] directly to produce a
/// new container; everything this function decoded into sectors/blocks re-serializes trivially
/// since those engines keep their backing bytes around.
pub fn export(image: &OpenedImage) -> Result<Vec<u8>, UffError> {
    match image {
        OpenedImage::Uff(_) => {
            Err(kinds::invalid_parameter().with_context("a UffFile opened for reading has no re-export; use UffWriter to create one"))
        }
        OpenedImage::Cbm(cbm) => Ok(cbm.as_bytes().to_vec()),
        OpenedImage::Amiga(img) => Ok(img.as_bytes().to_vec()),
        OpenedImage::Gcr(g64) => {
            let tracks: Vec<ParsedGcrTrack> = g64.tracks.iter().flatten().cloned().collect();
            Ok(gcr_track::export_d64(&tracks, true))
        }
    }
}

/// Runs the disk-level protection heuristic (§4.5) over a decoded G64's full tracks, pairing each
/// full track with its two candidate half-track slots (`2*track-1` canonical, `2*track` the
/// alternate position protections sometimes use) and the caller-supplied set of full tracks whose
/// fused flux carried weak regions (this module has no visibility into flux confidence data).
pub fn detect_protection(image: &G64Image, weak_full_tracks: &[u8]) -> Option<ProtectionScheme> {
    let mut signals = Vec::new();
    for full_track in 1u8..=42 {
        let canonical = image.tracks.get(full_track as usize * 2 - 2).and_then(|t| t.as_ref());
        let alternate = image.tracks.get(full_track as usize * 2 - 1).and_then(|t| t.as_ref());
        let Some(track) = canonical.or(alternate)
        else {
            continue;
        };
        signals.push(TrackProtectionSignals {
            full_track,
            has_weak_bits: weak_full_tracks.contains(&full_track),
            is_killer_track: track.is_killer_track,
            has_long_sync: track.has_long_sync,
            has_extra_sectors: track.has_extra_sectors,
            half_track_has_data: alternate.is_some(),
        });
    }
    gcr_track::detect_protection(&signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_recognizes_uff_ahead_of_the_legacy_ladder() {
        let mut bytes = vec![0u8; 16];
        bytes[0..4].copy_from_slice(UFF_MAGIC);
        assert!(matches!(probe(&bytes).unwrap(), ProbeResult::Uff));
    }

    #[test]
    fn probe_falls_back_to_the_legacy_detector() {
        let mut bytes = vec![0u8; 342];
        bytes[0..8].copy_from_slice(b"GCR-1541");
        bytes[9] = 0x54;
        bytes[10] = 0xf8;
        bytes[11] = 0x1e;
        match probe(&bytes).unwrap() {
            ProbeResult::Legacy(info) => assert_eq!(info.format, Variant::G64),
            ProbeResult::Uff => panic!("expected a legacy match"),
        }
    }

    #[test]
    fn open_dispatches_a_fresh_d64_into_a_cbm_image() {
        let image = CbmImage::create(CbmType::D64).unwrap();
        let bytes = image.as_bytes().to_vec();
        match open(bytes, None).unwrap() {
            OpenedImage::Cbm(cbm) => assert_eq!(cbm.cbm_type(), CbmType::D64),
            _ => panic!("expected a CBM image"),
        }
    }

    #[test]
    fn open_resolves_a_d71_sized_buffer_detect_does_not_cover() {
        let image = CbmImage::create(CbmType::D71).unwrap();
        let bytes = image.as_bytes().to_vec();
        assert_eq!(bytes.len(), 349_696);
        match open(bytes, None).unwrap() {
            OpenedImage::Cbm(cbm) => assert_eq!(cbm.cbm_type(), CbmType::D71),
            _ => panic!("expected a CBM image"),
        }
    }

    #[test]
    fn open_dispatches_a_fresh_adf_into_an_amiga_image() {
        let formatted = amiga::format::format(1760, 0).unwrap();
        match open(formatted.data, None).unwrap() {
            OpenedImage::Amiga(img) => {
                assert_eq!(img.root_block(), formatted.root_block);
                let report = img.validate().unwrap();
                assert_eq!(report.errors, 0);
            }
            _ => panic!("expected an Amiga image"),
        }
    }

    #[test]
    fn open_rejects_a_detected_but_undecodable_variant() {
        let bytes = b"SCP\x00rest-of-file".to_vec();
        let err = open(bytes, None).unwrap_err();
        assert!(matches!(err.kind, crate::error::UffErrorKind::UnsupportedVariant));
    }

    #[test]
    fn fuse_respects_a_pre_tripped_cancel_token() {
        let mut track = Track::new(0, 0);
        track.add_revolution(crate::flux::Revolution::new(vec![100; 10], 90)).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(fuse(&mut track, &cancel).is_err());
        assert!(track.fused_flux.is_empty());
    }

    #[test]
    fn verify_reports_cbm_directory_and_free_space() {
        let mut image = CbmImage::create(CbmType::D64).unwrap();
        image.inject(b"FILE", b"abc").unwrap();
        let mut opened = OpenedImage::Cbm(image);
        let cancel = CancelToken::new();
        match verify(&mut opened, &cancel).unwrap() {
            VerifyOutcome::Cbm { directory_entries, .. } => assert_eq!(directory_entries, 1),
            _ => panic!("expected a CBM verify outcome"),
        }
    }

    #[test]
    fn export_round_trips_an_amiga_image() {
        let formatted = amiga::format::format(1760, 0).unwrap();
        let original = formatted.data.clone();
        let opened = OpenedImage::Amiga(amiga::AmigaImage::open_owned(formatted.data, formatted.root_block, formatted.bitmap_block_ids));
        assert_eq!(export(&opened).unwrap(), original);
    }

    #[test]
    fn detect_protection_flags_v_max_from_a_weak_track_20() {
        let mut tracks = vec![None; G64_HALF_TRACKS];
        let mut make_track = |full_track: u8, is_killer: bool| {
            let mut t = gcr_track::parse_track(&[], full_track * 2 - 1);
            t.is_killer_track = is_killer;
            t
        };
        for ft in 1..=25u8 {
            tracks[ft as usize * 2 - 2] = Some(make_track(ft, false));
        }
        tracks[20 * 2 - 2] = Some(make_track(20, true));
        let image = G64Image { version: 0, tracks };

        let scheme = detect_protection(&image, &[]).unwrap();
        assert!(matches!(scheme, ProtectionScheme::VMax(c) if (c - 0.85).abs() < f64::EPSILON));
    }
}
