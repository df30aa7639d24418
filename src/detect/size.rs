//! Exact-size, range-size, and modular-size detection rungs (§4.1 rungs 2-4, and the IMG
//! fallback table from rung 6).

use super::{confidence, Variant, VariantInfo};

const ADF_DD_SIZE: usize = 901_120;
const ADF_HD_SIZE: usize = 1_802_240;

pub fn detect_adf_exact_size(bytes: &[u8]) -> Option<VariantInfo> {
    match bytes.len() {
        ADF_DD_SIZE | ADF_HD_SIZE => {
            // Both densities are 80 cylinders * 2 heads; only the sectors-per-track differ.
            let mut info = VariantInfo::new(Variant::Adf, confidence::EXACT_SIZE);
            info.tracks = Some(160);
            Some(info)
        }
        _ => None,
    }
}

const D64_35_TRACK: usize = 174_848;
const D64_35_TRACK_ERRORS: usize = D64_35_TRACK + 683;
const D64_40_TRACK: usize = 196_608;
const D64_40_TRACK_ERRORS: usize = 197_376;
const D64_42_TRACK: usize = 205_312;
const D64_42_TRACK_ERRORS: usize = 206_114;

pub fn detect_d64_range_size(bytes: &[u8]) -> Option<VariantInfo> {
    let len = bytes.len();
    let (tracks, has_errors) = match len {
        D64_35_TRACK => (35, false),
        D64_35_TRACK_ERRORS => (35, true),
        D64_40_TRACK => (40, false),
        D64_40_TRACK_ERRORS => (40, true),
        D64_42_TRACK => (42, false),
        D64_42_TRACK_ERRORS => (42, true),
        _ => return None,
    };
    let mut info = VariantInfo::new(Variant::D64, confidence::EXACT_SIZE);
    info.tracks = Some(tracks);
    info.has_errors = has_errors;
    Some(info)
}

const NIB_TRACK_SIZE: usize = 6656;
const NIB_MIN_SIZE: usize = NIB_TRACK_SIZE; // at least one track
const NIB_MAX_SIZE: usize = NIB_TRACK_SIZE * 84; // at most 84 half-tracks

pub fn detect_nib_modular_size(bytes: &[u8]) -> Option<VariantInfo> {
    let len = bytes.len();
    if len == 0 || len < NIB_MIN_SIZE || len > NIB_MAX_SIZE {
        return None;
    }
    if len % NIB_TRACK_SIZE != 0 {
        return None;
    }
    let mut info = VariantInfo::new(Variant::Nib, confidence::STRUCTURAL_FUZZY);
    info.tracks = Some((len / NIB_TRACK_SIZE) as u32);
    info.limitation = Some("NIB half-track timing is preserved but not individually addressable");
    Some(info)
}

/// The fixed IMG size table, per §4.1 rung 6 and §6.
const IMG_SIZE_TABLE: &[(usize, &str)] = &[
    (163_840, "160K"),
    (184_320, "180K"),
    (327_680, "320K"),
    (368_640, "360K"),
    (737_280, "720K"),
    (1_228_800, "1.2M"),
    (1_474_560, "1.44M"),
    (1_720_320, "DMF"),
    (2_949_120, "2.88M"),
];

pub fn detect_img_exact_size(bytes: &[u8]) -> Option<VariantInfo> {
    let len = bytes.len();
    IMG_SIZE_TABLE.iter().find(|(size, _)| *size == len).map(|_| {
        let mut info = VariantInfo::new(Variant::Img, confidence::EXACT_SIZE);
        info.has_errors = false;
        info
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d64_35_track_is_detected() {
        let bytes = vec![0u8; D64_35_TRACK];
        let info = detect_d64_range_size(&bytes).unwrap();
        assert_eq!(info.tracks, Some(35));
        assert!(!info.has_errors);
        assert_eq!(info.confidence, 95);
    }

    #[test]
    fn d64_with_error_map_is_flagged() {
        let bytes = vec![0u8; D64_35_TRACK_ERRORS];
        let info = detect_d64_range_size(&bytes).unwrap();
        assert_eq!(info.tracks, Some(35));
        assert!(info.has_errors);
    }

    #[test]
    fn nib_size_must_be_modular() {
        assert!(detect_nib_modular_size(&vec![0u8; NIB_TRACK_SIZE * 3]).is_some());
        assert!(detect_nib_modular_size(&vec![0u8; NIB_TRACK_SIZE * 3 + 1]).is_none());
    }

    #[test]
    fn img_table_hits_known_sizes() {
        assert!(detect_img_exact_size(&vec![0u8; 1_474_560]).is_some());
        assert!(detect_img_exact_size(&vec![0u8; 1_474_561]).is_none());
    }
}
