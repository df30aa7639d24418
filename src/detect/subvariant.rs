//! Sub-variant refinement (§4.1 "Sub-variant refinement"): D64 GEOS/SpeedDOS markers, ADF
//! filesystem dialect, WOZ2.1 optimal-bit-timing flag, IPF CTRaw flux marker.

use serde::{Deserialize, Serialize};

use super::VariantInfo;
use crate::codec::endian::read_u32_be;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubVariant {
    /// D64 disk carrying a GEOS VLIR directory structure.
    Geos,
    /// D64 disk formatted by a SpeedDOS-family fastloader (non-standard BAM pointer).
    SpeedDos,
    /// ADF filesystem dialect, by `DOS\x` type byte.
    AdfOfs,
    AdfFfs,
    AdfOfsIntl,
    AdfFfsIntl,
    AdfOfsDc,
    AdfFfsDc,
    /// ADF boot sector that is actually a PC-FAT (CrossDOS) volume.
    AdfPcFat,
    /// WOZ2 image whose INFO chunk version byte is >= 3 (optimal bit timing present).
    Woz21,
    /// IPF image containing a raw-flux `CTRA` record.
    IpfCtRaw,
}

const D64_CATALOG_OFFSET: usize = 0x16500;

/// D64 refinement: scan the first eight 32-byte directory entries for a GEOS marker, and check
/// the BAM pointer for a non-standard value indicating SpeedDOS.
pub fn refine_d64(info: &mut VariantInfo, bytes: &[u8]) {
    if bytes.len() < D64_CATALOG_OFFSET + 2 {
        return;
    }

    // Directory sectors begin one sector (256 bytes) after the BAM sector at 0x16500.
    let dir_start = D64_CATALOG_OFFSET + 256;
    if bytes.len() >= dir_start + 8 * 32 {
        for entry in 0..8 {
            let offset = dir_start + entry * 32;
            let file_type = bytes[offset + 2];
            if file_type & 0x80 != 0 && file_type != 0x80 {
                info.sub_variant = Some(SubVariant::Geos);
                break;
            }
        }
    }

    if info.sub_variant.is_none() {
        let bam_track = bytes[D64_CATALOG_OFFSET];
        let bam_sector = bytes[D64_CATALOG_OFFSET + 1];
        let is_standard = (bam_track, bam_sector) == (18, 1) || (bam_track, bam_sector) == (18, 0);
        if !is_standard {
            info.sub_variant = Some(SubVariant::SpeedDos);
        }
    }
}

/// ADF refinement: dispatch on byte 3 of the `"DOS\?"` type string at the start of the boot
/// block, or detect a PC-FAT (CrossDOS) boot sector.
pub fn refine_adf(info: &mut VariantInfo, bytes: &[u8]) {
    if bytes.len() < 4 {
        return;
    }
    if &bytes[0..3] == b"DOS" {
        info.sub_variant = match bytes[3] {
            0 => Some(SubVariant::AdfOfs),
            1 => Some(SubVariant::AdfFfs),
            2 => Some(SubVariant::AdfOfsIntl),
            3 => Some(SubVariant::AdfFfsIntl),
            4 => Some(SubVariant::AdfOfsDc),
            5 => Some(SubVariant::AdfFfsDc),
            _ => None,
        };
        return;
    }

    if bytes.len() >= 512
        && (bytes[0] == 0xEB || bytes[0] == 0xE9)
        && bytes[510] == 0x55
        && bytes[511] == 0xAA
    {
        info.sub_variant = Some(SubVariant::AdfPcFat);
    }
}

/// WOZ2 refinement: parse the INFO chunk (immediately following the 12-byte file header) and
/// check its version byte.
pub fn refine_woz(info: &mut VariantInfo, bytes: &[u8]) {
    if info.version != Some(2) {
        return;
    }
    const INFO_CHUNK_START: usize = 12;
    if bytes.len() < INFO_CHUNK_START + 8 + 39 {
        return;
    }
    // Chunk header: 4-byte ASCII id + u32 LE size, then the chunk payload.
    if &bytes[INFO_CHUNK_START..INFO_CHUNK_START + 4] != b"INFO" {
        return;
    }
    let payload_start = INFO_CHUNK_START + 8;
    let info_version_byte = bytes[payload_start];
    if info_version_byte >= 3 {
        info.sub_variant = Some(SubVariant::Woz21);
        info.limitation = Some("WOZ 2.1 optimal bit timing (INFO byte 39) is not decoded");
    }
}

/// IPF refinement: walk the chunk stream (`{id: 4 bytes, length: u32 BE, ...}`) looking for a
/// `"CTRA"` record, which marks the raw-flux `CTRaw` sub-variant.
pub fn refine_ipf(info: &mut VariantInfo, bytes: &[u8]) {
    let mut pos = 0usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let length = match read_u32_be(bytes, pos + 4) {
            Ok(l) => l as usize,
            Err(_) => break,
        };
        if id == b"CTRA" {
            info.sub_variant = Some(SubVariant::IpfCtRaw);
            info.limitation = Some("IPF CTRaw flux records are detected but not decoded");
            return;
        }
        if length == 0 {
            break;
        }
        pos += length;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{confidence, Variant};

    #[test]
    fn adf_ffs_intl_is_identified() {
        let mut bytes = vec![0u8; 1024];
        bytes[0..4].copy_from_slice(b"DOS\x03");
        let mut info = VariantInfo::new(Variant::Adf, confidence::EXACT_SIZE);
        refine_adf(&mut info, &bytes);
        assert_eq!(info.sub_variant, Some(SubVariant::AdfFfsIntl));
    }

    #[test]
    fn d64_speeddos_bam_pointer_is_flagged() {
        let mut bytes = vec![0u8; D64_CATALOG_OFFSET + 256 + 8 * 32];
        bytes[D64_CATALOG_OFFSET] = 18;
        bytes[D64_CATALOG_OFFSET + 1] = 2; // non-standard sector
        let mut info = VariantInfo::new(Variant::D64, confidence::EXACT_SIZE);
        refine_d64(&mut info, &bytes);
        assert_eq!(info.sub_variant, Some(SubVariant::SpeedDos));
    }
}
