//! # uff
//!
//! `uff` is a Rust library for preserving and processing vintage floppy-disk images. It covers
//! the hard engineering of a digital-preservation pipeline for historical floppy formats
//! (Commodore D64/G64, Amiga ADF, Apple WOZ/NIB/2IMG, Atari ATR, BBC DFS/ADFS, TRS-80/CoCo DMK,
//! PC IMG, HFE, SCP, IPF) and defines a lossless flux-level container format of its own, the
//! *Universal Flux Format* (UFF).
//!
//! UFF retains multi-revolution flux captures, weak-bit regions, splice points, and per-track
//! integrity hashes, so a capture made once from fragile media can be re-derived into any
//! higher-level view (sectors, filesystem trees) without a second pass over the hardware.
//!
//! The crate is organized around the stages a capture passes through:
//!
//! - [`detect`] identifies which of the supported format variants a byte buffer holds.
//! - [`flux`] fuses multiple flux-level revolutions of the same track into one confidence-scored
//!   stream and locates weak-bit regions and splice points within it.
//! - [`container`] reads and writes the UFF container itself.
//! - [`gcr_track`] and [`codec::gcr`] decode Commodore-style GCR bitstreams into sectors.
//! - [`sector_image`] layers Commodore BAM/directory and BBC DFS/ADFS catalog semantics over
//!   decoded sector data.
//! - [`amiga`] layers the AmigaDOS block-graph filesystem (bitmap, hash-chained directory, data
//!   chains) over a raw ADF-shaped block array.
//! - [`api`] is the unified façade (`open`/`probe`/`fuse`/`export`/`verify`) that front-ends
//!   (CLIs, GUIs) are expected to consume; this crate does not provide those front-ends itself.

pub mod amiga;
pub mod api;
pub mod cancel;
pub mod codec;
pub mod container;
pub mod copy_protection;
pub mod detect;
pub mod diagnosis;
pub mod error;
pub mod flux;
pub mod gcr_track;
mod io;
pub mod sector_image;

pub use cancel::CancelToken;
pub use diagnosis::{Diagnosis, DiagnosisCode, Severity};
pub use error::{Location, UffError};

/// Default flux tick resolution, in nanoseconds, used when a capture does not specify one.
pub const DEFAULT_TICK_NS: u16 = 25;
/// Maximum number of revolutions a [`flux::Track`] may retain, per the data model.
pub const MAX_REVOLUTIONS: usize = 5;
/// Relative-deviation threshold below which a fused sample is considered weak, per §4.3.
pub const WEAK_THRESHOLD: f64 = 0.15;
/// Confidence (0..=1) below which a fused sample falls inside a [`flux::WeakRegion`].
pub const WEAK_CONFIDENCE_CUTOFF: f64 = 1.0 - WEAK_THRESHOLD;
/// Hard cap on the number of [`flux::SplicePoint`]s recorded per track.
pub const MAX_SPLICES: usize = 64;
