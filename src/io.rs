//! Small I/O trait aliases so the rest of the crate can be generic over an in-memory `Cursor` or
//! a real file without repeating trait bounds everywhere.

use std::io::{Read, Seek, Write};

/// Anything that can be read from and seeked within: a file, or an in-memory `Cursor<Vec<u8>>`.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Anything that can be read, written, and seeked within - the backing store for a UFF file (or
/// any legacy container) opened for mutation.
pub trait ReadWriteSeek: Read + Write + Seek {}
impl<T: Read + Write + Seek> ReadWriteSeek for T {}
