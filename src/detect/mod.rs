//! Variant detector (C3): confidence-scored identification of supported format variants from
//! magic bytes, size signatures, structural invariants, and content heuristics.
//!
//! [`detect`] never mutates or allocates beyond its returned [`VariantInfo`], and runs in
//! `O(size)` worst case but typically `O(1)` (a magic check plus one catalogue sector). See
//! §4.1 for the full priority ladder.

mod magic;
mod size;
mod structural;
mod subvariant;

use serde::{Deserialize, Serialize};

use crate::error::{kinds, UffError};

pub use subvariant::SubVariant;

/// The set of format variants this crate can identify. Every variant may be *detected*; not
/// every variant can be fully decoded (see [`VariantInfo::limitation`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    Scp,
    Hfe,
    Woz,
    G64,
    Ipf,
    Atr,
    Adf,
    D64,
    Nib,
    Dmk,
    Img,
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Scp => "SCP",
            Variant::Hfe => "HFE",
            Variant::Woz => "WOZ",
            Variant::G64 => "G64",
            Variant::Ipf => "IPF",
            Variant::Atr => "ATR",
            Variant::Adf => "ADF",
            Variant::D64 => "D64",
            Variant::Nib => "NIB",
            Variant::Dmk => "DMK",
            Variant::Img => "IMG",
        }
    }
}

/// The result of a successful [`detect`] call: the identified format, any refined sub-variant,
/// a confidence score, geometry hints gathered along the way, and an optional note describing a
/// known, deliberately-unimplemented limitation (e.g. HFEv3 streaming, IPF CTRaw flux).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariantInfo {
    pub format: Variant,
    pub sub_variant: Option<SubVariant>,
    pub confidence: u8,
    pub tracks: Option<u32>,
    pub version: Option<u8>,
    pub max_track_size: Option<u32>,
    pub has_errors: bool,
    pub limitation: Option<&'static str>,
}

impl VariantInfo {
    fn new(format: Variant, confidence: u8) -> Self {
        Self {
            format,
            sub_variant: None,
            confidence,
            tracks: None,
            version: None,
            max_track_size: None,
            has_errors: false,
            limitation: None,
        }
    }
}

/// Confidence scores assigned by each rung of the priority ladder, per §4.1 "Confidence policy".
pub mod confidence {
    pub const MAGIC_MATCH: u8 = 100;
    pub const EXACT_SIZE: u8 = 95;
    pub const STRUCTURAL_FUZZY: u8 = 80;
    pub const BPB_INFERRED: u8 = 75;
    pub const FALLBACK_MIN: u8 = 40;
    pub const FALLBACK_MAX: u8 = 60;
}

/// Attempt to identify the format of a disk image, per the priority ladder in §4.1: magic-prefix
/// formats first (in the fixed order SCP, HFE, WOZ, G64, IPF, ATR), then exact-size, then
/// range-size D64 variants, then modular-size NIB, then structural DMK, then a size-table or
/// BPB-inferred IMG fallback.
pub fn detect(bytes: &[u8]) -> Result<VariantInfo, UffError> {
    if let Some(info) = magic::detect_magic(bytes) {
        log::debug!("detect: magic-prefix match for {:?}", info.format);
        return Ok(refine(info, bytes));
    }

    if let Some(info) = size::detect_adf_exact_size(bytes) {
        log::debug!("detect: exact-size match for ADF");
        return Ok(refine(info, bytes));
    }

    if let Some(info) = size::detect_d64_range_size(bytes) {
        log::debug!("detect: range-size match for D64");
        return Ok(refine(info, bytes));
    }

    if let Some(info) = size::detect_nib_modular_size(bytes) {
        log::debug!("detect: modular-size match for NIB");
        return Ok(info);
    }

    if let Some(info) = structural::detect_dmk(bytes) {
        log::debug!("detect: structural match for DMK");
        return Ok(info);
    }

    if let Some(info) = size::detect_img_exact_size(bytes) {
        log::debug!("detect: size-table fallback match for IMG");
        return Ok(info);
    }

    if let Some(info) = structural::detect_img_bpb(bytes) {
        log::debug!("detect: BPB-inferred fallback match for IMG");
        return Ok(info);
    }

    log::warn!("detect: no format matched a {}-byte buffer", bytes.len());
    Err(kinds::unknown_format())
}

/// Apply sub-variant refinement (§4.1 "Sub-variant refinement") to an already-identified
/// [`VariantInfo`]. Only called for variants whose refinement is defined in the spec (D64, ADF,
/// WOZ2, IPF); other variants pass through unchanged.
fn refine(mut info: VariantInfo, bytes: &[u8]) -> VariantInfo {
    match info.format {
        Variant::D64 => subvariant::refine_d64(&mut info, bytes),
        Variant::Adf => subvariant::refine_adf(&mut info, bytes),
        Variant::Woz => subvariant::refine_woz(&mut info, bytes),
        Variant::Ipf => subvariant::refine_ipf(&mut info, bytes),
        _ => {}
    }
    info
}

/// The fixed list of extensions advertised by supported formats, for use in file dialogs. Format
/// identification itself never consults extensions.
pub fn supported_extensions() -> Vec<&'static str> {
    vec![
        "scp", "hfe", "woz", "g64", "ipf", "atr", "adf", "d64", "d71", "d81", "nib", "dmk", "img",
        "ima", "dsk",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_buffer_is_rejected() {
        let bytes = vec![0u8; 17];
        assert!(detect(&bytes).is_err());
    }
}
