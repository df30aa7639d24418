//! BBC DFS/ADFS catalog parsing (§4.6 "BBC DFS/ADFS catalog"): the two 256-byte DFS catalog
//! sectors, plus a minimal ADFS reader reported through the same shape.

use crate::error::{kinds, UffError};

const SECTOR_SIZE: usize = 256;
const ENTRY_SIZE: usize = 8;
const MAX_ENTRIES: usize = 31;

/// Which on-disk layout a [`DfsCatalog`] was read from. Only `Dfs` supports mutation; the ADFS
/// variants are read-only views, per §4.6.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CatalogFormat {
    Dfs,
    AdfsOldMap,
    AdfsNewMap,
}

/// One catalog entry: the 7-byte name and directory byte from sector 0, plus the load/exec/length
/// fields from sector 1.
#[derive(Clone, Copy, Debug)]
pub struct DfsEntry {
    pub name: [u8; 7],
    pub directory: u8,
    pub load_addr: u16,
    pub exec_addr: u16,
    pub length: u16,
    pub start_sector_and_overflow: u8,
}

/// A BBC disc catalog: a DFS catalog proper, or a best-effort ADFS view tagged with its
/// [`CatalogFormat`].
#[derive(Clone, Debug)]
pub struct DfsCatalog {
    pub format: CatalogFormat,
    pub title: String,
    pub cycle_number: u8,
    pub file_count: u8,
    pub boot_option: u8,
    pub entries: Vec<DfsEntry>,
}

impl DfsCatalog {
    /// Only a true DFS catalog supports mutation; ADFS views only expose what they could read
    /// without a full free-space map.
    pub fn is_mutable(&self) -> bool {
        self.format == CatalogFormat::Dfs
    }
}

/// Parses the two 256-byte DFS catalog sectors (sectors 0 and 1) into a [`DfsCatalog`].
pub fn read_dfs_catalog(data: &[u8]) -> Result<DfsCatalog, UffError> {
    if data.len() < 2 * SECTOR_SIZE {
        return Err(kinds::truncated_input().with_context("DFS catalog requires two 256-byte sectors"));
    }
    let sector0 = &data[0..SECTOR_SIZE];
    let sector1 = &data[SECTOR_SIZE..2 * SECTOR_SIZE];

    let mut title_bytes = Vec::with_capacity(12);
    title_bytes.extend_from_slice(&sector0[0..8]);
    title_bytes.extend_from_slice(&sector1[0..4]);
    let title = String::from_utf8_lossy(&title_bytes).trim_end().to_string();

    let cycle_number = sector1[4];
    let catalog_bytes = sector1[5];
    let file_count = (catalog_bytes / 8).min(MAX_ENTRIES as u8);
    let boot_option = (sector1[6] >> 4) & 0x3;

    let mut entries = Vec::with_capacity(file_count as usize);
    for i in 0..file_count as usize {
        let e0 = &sector0[8 + i * ENTRY_SIZE..8 + (i + 1) * ENTRY_SIZE];
        let mut name = [0u8; 7];
        name.copy_from_slice(&e0[0..7]);
        let directory = e0[7];

        let e1 = &sector1[8 + i * ENTRY_SIZE..8 + (i + 1) * ENTRY_SIZE];
        let load_addr = u16::from_le_bytes([e1[0], e1[1]]);
        let exec_addr = u16::from_le_bytes([e1[2], e1[3]]);
        let length = u16::from_le_bytes([e1[4], e1[5]]);
        let start_sector_and_overflow = e1[6];

        entries.push(DfsEntry {
            name,
            directory,
            load_addr,
            exec_addr,
            length,
            start_sector_and_overflow,
        });
    }

    Ok(DfsCatalog {
        format: CatalogFormat::Dfs,
        title,
        cycle_number,
        file_count,
        boot_option,
        entries,
    })
}

fn read_adfs_common(data: &[u8], format: CatalogFormat) -> Result<DfsCatalog, UffError> {
    if data.len() < 2 * SECTOR_SIZE {
        return Err(kinds::truncated_input().with_context("ADFS image too short to contain a root directory"));
    }
    // ADFS is named only as an externally-collaborating format here (§4.6); this crate does not
    // define its own free-space map or directory wire layout for it, so only a best-effort empty
    // view is returned. A caller needing full ADFS support should collaborate with a dedicated
    // ADFS-aware tool instead.
    Ok(DfsCatalog {
        format,
        title: String::new(),
        cycle_number: 0,
        file_count: 0,
        boot_option: 0,
        entries: Vec::new(),
    })
}

pub fn read_adfs_old_map(data: &[u8]) -> Result<DfsCatalog, UffError> {
    read_adfs_common(data, CatalogFormat::AdfsOldMap)
}

pub fn read_adfs_new_map(data: &[u8]) -> Result<DfsCatalog, UffError> {
    read_adfs_common(data, CatalogFormat::AdfsNewMap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Vec<u8> {
        let mut data = vec![0u8; 512];
        data[0..8].copy_from_slice(b"MYDISC  ");
        data[8..15].copy_from_slice(b"HELLO  ");
        data[15] = 0x00;
        data[256 + 4] = 0x12; // cycle number
        data[256 + 5] = 8; // one file: catalog_bytes = 1 * 8
        data[256 + 6] = 0x30; // boot option bits
        data[256 + 8..256 + 10].copy_from_slice(&0x1900u16.to_le_bytes());
        data[256 + 10..256 + 12].copy_from_slice(&0x1900u16.to_le_bytes());
        data[256 + 12..256 + 14].copy_from_slice(&100u16.to_le_bytes());
        data
    }

    #[test]
    fn parses_title_and_single_entry() {
        let data = sample_catalog();
        let catalog = read_dfs_catalog(&data).unwrap();
        assert_eq!(catalog.title, "MYDISC");
        assert_eq!(catalog.file_count, 1);
        assert_eq!(catalog.entries.len(), 1);
        assert_eq!(&catalog.entries[0].name, b"HELLO  ");
        assert_eq!(catalog.entries[0].length, 100);
        assert_eq!(catalog.boot_option, 3);
    }

    #[test]
    fn adfs_view_is_not_mutable() {
        let data = vec![0u8; 512];
        let catalog = read_adfs_old_map(&data).unwrap();
        assert!(!catalog.is_mutable());
    }

    #[test]
    fn truncated_input_is_rejected() {
        let data = vec![0u8; 100];
        assert!(read_dfs_catalog(&data).is_err());
    }
}
