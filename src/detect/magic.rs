//! Magic-prefix detection, tried in the fixed order SCP, HFE, WOZ, G64, IPF, ATR (§4.1 rung 1).

use super::{confidence, Variant, VariantInfo};
use crate::codec::endian::{read_u16_le, read_u32_be};

pub fn detect_magic(bytes: &[u8]) -> Option<VariantInfo> {
    detect_scp(bytes)
        .or_else(|| detect_hfe(bytes))
        .or_else(|| detect_woz(bytes))
        .or_else(|| detect_g64(bytes))
        .or_else(|| detect_ipf(bytes))
        .or_else(|| detect_atr(bytes))
}

fn detect_scp(bytes: &[u8]) -> Option<VariantInfo> {
    if bytes.len() >= 3 && &bytes[0..3] == b"SCP" {
        Some(VariantInfo::new(Variant::Scp, confidence::MAGIC_MATCH))
    }
    else {
        None
    }
}

fn detect_hfe(bytes: &[u8]) -> Option<VariantInfo> {
    if bytes.len() >= 8 && (&bytes[0..8] == b"HXCPICFE" || bytes.starts_with(b"HXCHFE3")) {
        Some(VariantInfo::new(Variant::Hfe, confidence::MAGIC_MATCH))
    }
    else {
        None
    }
}

fn detect_woz(bytes: &[u8]) -> Option<VariantInfo> {
    if bytes.len() < 12 {
        return None;
    }
    let is_woz1 = &bytes[0..4] == b"WOZ1";
    let is_woz2 = &bytes[0..4] == b"WOZ2";
    if !(is_woz1 || is_woz2) {
        return None;
    }
    // The WOZ magic is followed by the fixed tail 0x0A 0x0D 0x0A 0xFF (big-endian as specified).
    let tail = read_u32_be(bytes, 4).ok()?;
    if tail != 0x0A0D0AFF {
        return None;
    }
    let mut info = VariantInfo::new(Variant::Woz, confidence::MAGIC_MATCH);
    info.version = Some(if is_woz2 { 2 } else { 1 });
    Some(info)
}

fn detect_g64(bytes: &[u8]) -> Option<VariantInfo> {
    if bytes.len() < 12 || &bytes[0..8] != b"GCR-1541" {
        return None;
    }
    let version = bytes[8];
    let num_tracks = bytes[9] as u32;
    let max_track_size = read_u16_le(bytes, 10).ok()? as u32;

    let mut info = VariantInfo::new(Variant::G64, confidence::MAGIC_MATCH);
    info.version = Some(version);
    // The header stores the number of *half*-tracks; the seed case ("0x54" = 84 half-tracks)
    // expects the reported `tracks` field to be full tracks (84 / 2 = 42).
    info.tracks = Some(num_tracks / 2);
    info.max_track_size = Some(max_track_size);
    Some(info)
}

fn detect_ipf(bytes: &[u8]) -> Option<VariantInfo> {
    if bytes.len() >= 4 && &bytes[0..4] == b"CAPS" {
        Some(VariantInfo::new(Variant::Ipf, confidence::MAGIC_MATCH))
    }
    else {
        None
    }
}

fn detect_atr(bytes: &[u8]) -> Option<VariantInfo> {
    if bytes.len() >= 2 && bytes[0] == 0x96 && bytes[1] == 0x02 {
        Some(VariantInfo::new(Variant::Atr, confidence::MAGIC_MATCH))
    }
    else {
        None
    }
}
