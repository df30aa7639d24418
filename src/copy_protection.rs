//! Disk-level copy protection heuristics.
//!
//! The system never attempts to remove or sanitise a detected protection; it only reports what
//! it saw so the artefact can be preserved verbatim. See [`crate::gcr_track::detect_protection`]
//! for the heuristic that produces a [`ProtectionScheme`] from a set of decoded
//! [`crate::gcr_track::ParsedGcrTrack`] results.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// A disk-level copy protection scheme, as named in the component design for the GCR track
/// engine (§4.5). The carried `f64` is the heuristic's confidence in `0.0..=1.0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ProtectionScheme {
    /// Weak bits combined with readable half-tracks: the Vorpal/RapidLok family.
    VorpalRapidLok(f64),
    /// A deliberately weak or killer track at track 20: V-Max!.
    VMax(f64),
    /// More than five tracks with abnormally long sync marks: Epyx FastLoad.
    EpyxFastLoad(f64),
    /// Weak bits present but not matching a more specific scheme.
    GenericWeakBit(f64),
    /// Data recorded on physical half-track positions.
    HalfTrack(f64),
    /// Tracks formatted with more sectors than the nominal per-zone count.
    ExtraSector(f64),
    /// One or more deliberately unreadable ("killer") tracks.
    KillerTrack(f64),
}

impl ProtectionScheme {
    /// Returns the heuristic's confidence score in `0.0..=1.0`.
    pub fn confidence(&self) -> f64 {
        match *self {
            ProtectionScheme::VorpalRapidLok(c)
            | ProtectionScheme::VMax(c)
            | ProtectionScheme::EpyxFastLoad(c)
            | ProtectionScheme::GenericWeakBit(c)
            | ProtectionScheme::HalfTrack(c)
            | ProtectionScheme::ExtraSector(c)
            | ProtectionScheme::KillerTrack(c) => c,
        }
    }

    /// A short, stable name for the scheme, independent of its `Display` rendering.
    pub fn name(&self) -> &'static str {
        match self {
            ProtectionScheme::VorpalRapidLok(_) => "Vorpal/RapidLok",
            ProtectionScheme::VMax(_) => "V-Max!",
            ProtectionScheme::EpyxFastLoad(_) => "Epyx FastLoad",
            ProtectionScheme::GenericWeakBit(_) => "weak-bit",
            ProtectionScheme::HalfTrack(_) => "half-track",
            ProtectionScheme::ExtraSector(_) => "extra-sector",
            ProtectionScheme::KillerTrack(_) => "killer-track",
        }
    }
}

impl Display for ProtectionScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} (confidence {:.2})", self.name(), self.confidence())
    }
}
