//! Little/big-endian byte readers over a plain `&[u8]`, used by parsers that need to pick fields
//! out of a buffer without going through `binrw`'s cursor-based API (e.g. quick format-detection
//! probes that only look at a handful of fixed offsets).

use crate::error::{kinds, UffError};

fn need(data: &[u8], offset: usize, len: usize) -> Result<(), UffError> {
    if data.len() < offset + len {
        Err(kinds::truncated_input().with_context(format!(
            "need {len} bytes at offset {offset}, buffer is {} bytes",
            data.len()
        )))
    }
    else {
        Ok(())
    }
}

pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16, UffError> {
    need(data, offset, 2)?;
    Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
}

pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32, UffError> {
    need(data, offset, 4)?;
    Ok(u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

pub fn read_u64_le(data: &[u8], offset: usize) -> Result<u64, UffError> {
    need(data, offset, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    Ok(u64::from_le_bytes(buf))
}

pub fn read_u16_be(data: &[u8], offset: usize) -> Result<u16, UffError> {
    need(data, offset, 2)?;
    Ok(u16::from_be_bytes([data[offset], data[offset + 1]]))
}

pub fn read_u32_be(data: &[u8], offset: usize) -> Result<u32, UffError> {
    need(data, offset, 4)?;
    Ok(u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_within_bounds() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u16_le(&data, 0).unwrap(), 0x0201);
        assert_eq!(read_u32_le(&data, 0).unwrap(), 0x04030201);
        assert_eq!(read_u16_be(&data, 0).unwrap(), 0x0102);
        assert_eq!(read_u32_be(&data, 0).unwrap(), 0x01020304);
        assert_eq!(read_u64_le(&data, 0).unwrap(), 0x0807060504030201);
    }

    #[test]
    fn truncated_read_errors() {
        let data = [0x01u8];
        assert!(read_u16_le(&data, 0).is_err());
        assert!(read_u32_le(&data, 0).is_err());
    }
}
