//! Commodore sector-image engine (§4.6): addressing, BAM, directory walk/inject/extract, PETSCII
//! conversion, and the BBC DFS/ADFS catalog reader, tied together behind [`CbmImage`].

pub mod addressing;
pub mod bam;
pub mod dfs;
pub mod directory;
pub mod petscii;

pub use addressing::{sector_offset, CbmType};
pub use bam::{alloc_next, Bam};
pub use dfs::{read_adfs_new_map, read_adfs_old_map, read_dfs_catalog, CatalogFormat, DfsCatalog, DfsEntry};
pub use directory::{extract as extract_raw, inject as inject_raw, match_filename, read_chain, walk_directory, DirEntry};
pub use petscii::{petscii_to_utf8, utf8_to_petscii};

use crate::error::{kinds, UffError};

/// Whether a [`CbmImage`] owns a mutable copy of its bytes or only borrows a read-only view, per
/// the resource policy in §5: `create()` owns, `open()` borrows. Deliberately not `Cow` - a `Cow`
/// would silently clone-on-write instead of reporting [`crate::error::UffErrorKind::ReadOnly`] the
/// way a caller mutating someone else's buffer should be told.
enum ImageBacking<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl ImageBacking<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            ImageBacking::Owned(v) => v,
            ImageBacking::Borrowed(b) => b,
        }
    }
}

/// A Commodore sector image (D64/D71/D81) with its Block Availability Map cached alongside it.
pub struct CbmImage<'a> {
    backing: ImageBacking<'a>,
    cbm_type: CbmType,
    bam: Bam,
}

fn init_blank_image(cbm_type: CbmType) -> Result<Vec<u8>, UffError> {
    let mut data = vec![0u8; cbm_type.image_size()];

    for &(bam_track, bam_sector) in cbm_type.bam_sectors() {
        let offset = sector_offset(cbm_type, bam_track, bam_sector)?;
        data[offset + 2] = 0x41; // DOS version marker ('A'), matches real D64/D71/D81 images
    }

    for track in 1..=cbm_type.total_tracks() {
        if track == cbm_type.directory_track() {
            continue;
        }
        let spt = cbm_type.sectors_per_track(track);
        let (sector_idx, offset, len) = bam::entry_location(cbm_type, track);
        let (bam_track, bam_sector) = cbm_type.bam_sectors()[sector_idx];
        let sector_start = sector_offset(cbm_type, bam_track, bam_sector)?;
        data[sector_start + offset] = spt;
        for sector in 0..spt {
            let byte = sector as usize / 8;
            let bit = sector as usize % 8;
            data[sector_start + offset + 1 + byte] |= 1 << bit;
        }
        let _ = len;
    }

    let dir_track = cbm_type.directory_track();
    let dir_sector = cbm_type.directory_start_sector();
    let dir_offset = sector_offset(cbm_type, dir_track, dir_sector)?;
    data[dir_offset] = 0;
    data[dir_offset + 1] = 0xff;

    Ok(data)
}

impl<'a> CbmImage<'a> {
    /// Formats a brand-new, empty image: every track's BAM entry marked fully free (except the
    /// directory track, which is excluded per §4.6), and a single empty directory sector.
    pub fn create(cbm_type: CbmType) -> Result<CbmImage<'static>, UffError> {
        let data = init_blank_image(cbm_type)?;
        let bam = Bam::load(&data, cbm_type)?;
        Ok(CbmImage {
            backing: ImageBacking::Owned(data),
            cbm_type,
            bam,
        })
    }

    /// Opens an existing image for read-only access, borrowing its bytes.
    pub fn open(data: &'a [u8], cbm_type: CbmType) -> Result<Self, UffError> {
        let bam = Bam::load(data, cbm_type)?;
        Ok(Self {
            backing: ImageBacking::Borrowed(data),
            cbm_type,
            bam,
        })
    }

    /// Opens an existing image for mutable access, taking ownership of its bytes.
    pub fn open_owned(data: Vec<u8>, cbm_type: CbmType) -> Result<CbmImage<'static>, UffError> {
        let bam = Bam::load(&data, cbm_type)?;
        Ok(CbmImage {
            backing: ImageBacking::Owned(data),
            cbm_type,
            bam,
        })
    }

    pub fn cbm_type(&self) -> CbmType {
        self.cbm_type
    }

    pub fn total_free(&self) -> u32 {
        self.bam.total_free
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.backing.as_slice()
    }

    pub fn directory(&self) -> Result<Vec<DirEntry>, UffError> {
        walk_directory(self.backing.as_slice(), self.cbm_type)
    }

    /// Lists directory entries whose filename matches `pattern` (`*`/`?` wildcards supported).
    pub fn find(&self, pattern: &[u8]) -> Result<Vec<DirEntry>, UffError> {
        let padded: Vec<u8> = {
            let mut p = pattern.to_vec();
            p.resize(16, 0xa0);
            p
        };
        Ok(self
            .directory()?
            .into_iter()
            .filter(|e| match_filename(&padded, &e.filename))
            .collect())
    }

    pub fn extract(&self, name: &[u8]) -> Result<Vec<u8>, UffError> {
        extract_raw(self.backing.as_slice(), self.cbm_type, name)
    }

    /// Allocates a sector chain and a directory entry for `name`. Fails with
    /// [`crate::error::UffErrorKind::ReadOnly`] if this image borrows its bytes rather than owning
    /// them.
    pub fn inject(&mut self, name: &[u8], contents: &[u8]) -> Result<(), UffError> {
        let cbm_type = self.cbm_type;
        match &mut self.backing {
            ImageBacking::Owned(data) => inject_raw(data, &mut self.bam, cbm_type, name, contents),
            ImageBacking::Borrowed(_) => {
                Err(kinds::read_only().with_context("image was opened read-only; use create() or open_owned() to mutate it"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_inject_then_extract_round_trips() {
        let mut image = CbmImage::create(CbmType::D64).unwrap();
        let before_free = image.total_free();
        image.inject(b"GREETING", b"hello, world").unwrap();
        assert!(image.total_free() < before_free);

        let data = image.extract(b"GREETING").unwrap();
        assert_eq!(data, b"hello, world");

        let entries = image.directory().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn open_borrowed_image_rejects_mutation() {
        let image = CbmImage::create(CbmType::D64).unwrap();
        let bytes = image.as_bytes().to_vec();
        let mut borrowed = CbmImage::open(&bytes, CbmType::D64).unwrap();
        let err = borrowed.inject(b"X", b"y").unwrap_err();
        assert!(matches!(err.kind, crate::error::UffErrorKind::ReadOnly));
    }

    #[test]
    fn find_with_wildcard_matches_injected_file() {
        let mut image = CbmImage::create(CbmType::D64).unwrap();
        image.inject(b"PROGRAM1", b"data").unwrap();
        let found = image.find(b"PROG*").unwrap();
        assert_eq!(found.len(), 1);
    }
}
