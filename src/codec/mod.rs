//! Primitive codecs (C1): little/big-endian readers, CRC16-CCITT, CRC32, CRC64-ECMA, SHA-256.
//!
//! These are the leaf-level building blocks everything else in the crate is built from. None of
//! them allocate beyond their return value, and none of them can panic on malformed input - a
//! primitive codec returns a `Result` rather than aborting, per the error propagation policy.

pub mod checksum;
pub mod endian;
pub mod gcr;

pub use checksum::{crc16_ccitt, crc32, crc64_ecma, sha256};
