//! Structured, append-only diagnostic events.
//!
//! A [`Diagnosis`] is a *data value*, not an error: the GCR track engine, the Commodore
//! directory/BAM engine, and the AmigaDOS filesystem engine all emit them while continuing to
//! make forward progress on locally-recoverable damage. Each one carries a one-line remediation
//! hint so a caller never has to guess what a code means (§7 "User-visible behaviour").

use std::fmt::{Display, Formatter, Result as FmtResult};

use log::debug;
use strum::EnumIter;

/// How serious a [`Diagnosis`] is. `Protection` is distinguished from `Warning`/`Error` because a
/// detected protection artefact is not a defect to report to the user as damage — it is exactly
/// what digital preservation is supposed to retain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Protection,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Protection => "protection",
        };
        write!(f, "{s}")
    }
}

/// The enumerated set of conditions the preservation pipeline can observe while decoding a track
/// or walking a filesystem. Each variant has a fixed [`DiagnosisCode::severity`] and
/// [`DiagnosisCode::remediation`] hint; the free-text `message` on a [`Diagnosis`] is for
/// human-readable detail only and is never what tests assert against.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum DiagnosisCode {
    LongSync,
    WrongTrackId,
    HeaderChecksumError,
    DataChecksumError,
    MissingSector,
    ExtraSectors,
    KillerTrack,
    WeakBits,
    HalfTrackData,
    CrossLinkedBlock,
    OrphanBlock,
    BrokenChain,
    BadBlockChecksum,
    BitmapCorrupt,
    BootBlockBad,
    RootBlockBad,
}

impl DiagnosisCode {
    pub fn severity(&self) -> Severity {
        use DiagnosisCode::*;
        match self {
            LongSync | WeakBits | HalfTrackData | ExtraSectors | KillerTrack => Severity::Protection,
            WrongTrackId | HeaderChecksumError | DataChecksumError | MissingSector | BrokenChain
            | BadBlockChecksum => Severity::Error,
            CrossLinkedBlock | OrphanBlock | BitmapCorrupt | BootBlockBad | RootBlockBad => Severity::Warning,
        }
    }

    /// A one-line remediation hint, per §7 "every diagnosis carries a one-line remediation hint".
    pub fn remediation(&self) -> &'static str {
        use DiagnosisCode::*;
        match self {
            LongSync => "PRESERVE — common copy-protection technique, do not normalize",
            WrongTrackId => "track header claims a different cylinder; verify drive alignment or preserve as-is",
            HeaderChecksumError => "sector header is damaged; data may still be recoverable from another revolution",
            DataChecksumError => "sector data is damaged; retain the bad bytes, do not substitute zeros silently",
            MissingSector => "expected sector was not found; re-read the source media if available",
            ExtraSectors => "PRESERVE — extra sectors beyond the nominal count are a known protection marker",
            KillerTrack => "PRESERVE — an intentionally unreadable track, characteristic of a protection scheme",
            WeakBits => "PRESERVE — bit instability across revolutions is usually deliberate, not damage",
            HalfTrackData => "PRESERVE — data recorded on a half-track position is a protection marker",
            CrossLinkedBlock => "two files claim the same block; run validation before trusting either file's data",
            OrphanBlock => "block is marked allocated but unreachable; rebuild_bitmap can reclaim it",
            BrokenChain => "a data or extension chain pointer is invalid; the file is truncated or corrupt",
            BadBlockChecksum => "block checksum does not match its contents; treat the block as damaged",
            BitmapCorrupt => "free-space bitmap disagrees with reachability; run rebuild_bitmap to repair it",
            BootBlockBad => "boot block checksum failed; the image may still mount but will not boot",
            RootBlockBad => "root block checksum failed; directory traversal may be unreliable",
        }
    }
}

/// A single diagnostic event, appended to a track or filesystem walk's diagnosis list.
#[derive(Clone, Debug)]
pub struct Diagnosis {
    pub severity: Severity,
    pub code: DiagnosisCode,
    pub track: u8,
    pub sector: Option<u8>,
    pub message: String,
}

impl Diagnosis {
    pub fn new(code: DiagnosisCode, track: u8, sector: Option<u8>, message: impl Into<String>) -> Self {
        let diagnosis = Self {
            severity: code.severity(),
            code,
            track,
            sector,
            message: message.into(),
        };
        debug!(
            "diagnosis: {} {:?} at track {} sector {:?}: {} ({})",
            diagnosis.severity, diagnosis.code, diagnosis.track, diagnosis.sector, diagnosis.message, diagnosis.code.remediation()
        );
        diagnosis
    }
}

impl Display for Diagnosis {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}] track {}", self.severity, self.track)?;
        if let Some(sector) = self.sector {
            write!(f, " sector {sector}")?;
        }
        write!(f, ": {} ({})", self.message, self.code.remediation())
    }
}

/// Append-only log of [`Diagnosis`] values produced during a single parse, plus the aggregate
/// quality figure defined in the data model (§3): `Π 0.97` over every non-protection, non-OK
/// entry.
#[derive(Clone, Debug, Default)]
pub struct DiagnosisLog {
    entries: Vec<Diagnosis>,
}

impl DiagnosisLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnosis: Diagnosis) {
        self.entries.push(diagnosis);
    }

    pub fn entries(&self) -> &[Diagnosis] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overall quality score: `0.97` raised to the number of non-protection diagnoses.
    pub fn quality(&self) -> f64 {
        let demerits = self
            .entries
            .iter()
            .filter(|d| d.severity != Severity::Protection && d.severity != Severity::Info)
            .count();
        0.97f64.powi(demerits as i32)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }
}
