//! The optional JSON metadata block: a u32 length prefix followed by a UTF-8 JSON blob capped at
//! 64 KiB (§4.4).

use serde::{Deserialize, Serialize};

use crate::error::{kinds, UffError};

pub const MAX_METADATA_SIZE: usize = 64 * 1024;

/// Free-form descriptive metadata attached to a UFF file. All fields are optional; unknown keys
/// encountered on read are preserved in `extra` rather than discarded, since forensic workflows
/// often round-trip metadata through tools that don't know every field this crate defines.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imaging_tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Metadata {
    /// Serializes to the on-disk form: a u32 LE length prefix followed by the JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, UffError> {
        let json = serde_json::to_vec(self).map_err(|e| kinds::invalid_parameter().with_context(e.to_string()))?;
        if json.len() > MAX_METADATA_SIZE {
            return Err(kinds::invalid_parameter()
                .with_context(format!("metadata block is {} bytes, limit is {MAX_METADATA_SIZE}", json.len())));
        }
        let mut out = Vec::with_capacity(4 + json.len());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&json);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UffError> {
        if bytes.len() < 4 {
            return Err(kinds::truncated_input().with_context("metadata block missing its length prefix"));
        }
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if len > MAX_METADATA_SIZE {
            return Err(kinds::corrupt_chunk().with_context(format!("metadata length {len} exceeds {MAX_METADATA_SIZE}")));
        }
        if bytes.len() < 4 + len {
            return Err(kinds::truncated_input().with_context("metadata block shorter than its declared length"));
        }
        serde_json::from_slice(&bytes[4..4 + len]).map_err(|e| kinds::corrupt_chunk().with_context(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_fields() {
        let meta = Metadata {
            title: Some("Turrican II".to_string()),
            source_image: Some("turrican2_side_a.g64".to_string()),
            imaging_tool: None,
            notes: None,
            extra: Default::default(),
        };
        let bytes = meta.to_bytes().unwrap();
        let decoded = Metadata::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.title.as_deref(), Some("Turrican II"));
    }

    #[test]
    fn oversized_metadata_is_rejected() {
        let meta = Metadata {
            notes: Some("x".repeat(MAX_METADATA_SIZE + 1)),
            ..Default::default()
        };
        assert!(meta.to_bytes().is_err());
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let mut bytes = br#"{"title":"t","custom_field":42}"#.to_vec();
        let mut framed = (bytes.len() as u32).to_le_bytes().to_vec();
        framed.append(&mut bytes);
        let decoded = Metadata::from_bytes(&framed).unwrap();
        assert_eq!(decoded.extra.get("custom_field").and_then(|v| v.as_i64()), Some(42));
    }
}
