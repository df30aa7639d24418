//! PETSCII ↔ UTF-8 conversion (§4.6 "PETSCII conversion"), for presenting filenames and disk
//! titles to a caller without disturbing the PETSCII byte-identity semantics directory matching
//! depends on.
//!
//! Decoding goes through the `forbidden-bands` crate, the same character-table crate
//! `image-rider` uses for Commodore filenames. Encoding (UTF-8 back to PETSCII) only needs to
//! round-trip the printable subset this engine itself writes (`inject`'s uppercase filenames), so
//! it is implemented directly against the standard unshifted PETSCII code page rather than
//! through a forbidden-bands API the decode direction doesn't exercise.

use std::sync::OnceLock;

use forbidden_bands::petscii::PetsciiString;
use forbidden_bands::Config;

const SHIFTED_SPACE: u8 = 0xA0;

fn petscii_config() -> &'static Config {
    static CONFIG: OnceLock<Config> = OnceLock::new();
    CONFIG.get_or_init(|| Config::load().expect("failed to load forbidden-bands PETSCII tables"))
}

/// Converts a raw PETSCII byte string (filename, disk title, ...) to UTF-8, stripping trailing
/// shifted-space (`0xA0`) padding.
pub fn petscii_to_utf8(bytes: &[u8]) -> String {
    let config = petscii_config();
    let ps: PetsciiString<'_, 16> =
        PetsciiString::from_byte_slice_strip_shifted_space_with_config(bytes, &config.petscii);
    format!("{ps}")
}

/// Converts an ASCII/UTF-8 string to PETSCII, uppercasing and mapping ASCII lowercase onto the
/// unshifted PETSCII lowercase range (`0xC1..=0xDA`). Non-ASCII characters become `?` (PETSCII has
/// no general Unicode mapping). Padded to `len` bytes with shifted space.
pub fn utf8_to_petscii(text: &str, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for ch in text.chars() {
        if out.len() >= len {
            break;
        }
        let byte = if ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch.is_ascii_punctuation() || ch == ' ' {
            ch as u8
        }
        else if ch.is_ascii_lowercase() {
            (ch.to_ascii_uppercase() as u8).wrapping_sub(0x40) | 0xC0
        }
        else {
            b'?'
        };
        out.push(byte);
    }
    out.resize(len, SHIFTED_SPACE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_shifted_space_padding() {
        let mut bytes = [SHIFTED_SPACE; 16];
        bytes[..4].copy_from_slice(b"TEST");
        let text = petscii_to_utf8(&bytes);
        assert_eq!(text, "TEST");
    }

    #[test]
    fn utf8_to_petscii_pads_with_shifted_space() {
        let encoded = utf8_to_petscii("HI", 16);
        assert_eq!(encoded.len(), 16);
        assert_eq!(&encoded[0..2], b"HI");
        assert!(encoded[2..].iter().all(|&b| b == SHIFTED_SPACE));
    }

    #[test]
    fn non_ascii_characters_become_question_marks() {
        let encoded = utf8_to_petscii("café", 4);
        assert_eq!(encoded[3], b'?');
    }
}
