//! Text encodings used by chat log files.
//!
//! The game client writes chat logs as UTF-16LE with a byte order mark.
//! Decoding is lossy: invalid sequences are dropped rather than failing.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

const BOM_UTF16_LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16_BE: &[u8] = &[0xFE, 0xFF];
const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Encoding of a chat log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogEncoding {
    /// Little-endian UTF-16, the platform wide-text default.
    #[default]
    Utf16Le,
    /// Big-endian UTF-16.
    Utf16Be,
    /// UTF-8.
    Utf8,
}

impl LogEncoding {
    /// Identify the encoding from a leading byte order mark.
    ///
    /// Returns the encoding and the BOM length in bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<(Self, usize)> {
        if bytes.starts_with(BOM_UTF8) {
            Some((Self::Utf8, BOM_UTF8.len()))
        } else if bytes.starts_with(BOM_UTF16_LE) {
            Some((Self::Utf16Le, BOM_UTF16_LE.len()))
        } else if bytes.starts_with(BOM_UTF16_BE) {
            Some((Self::Utf16Be, BOM_UTF16_BE.len()))
        } else {
            None
        }
    }

    /// Detect the encoding of a file's leading bytes, defaulting to UTF-16LE.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> (Self, usize) {
        Self::sniff(bytes).unwrap_or((Self::default(), 0))
    }

    /// Width in bytes of one code unit.
    #[must_use]
    pub fn unit_width(self) -> usize {
        match self {
            Self::Utf16Le | Self::Utf16Be => 2,
            Self::Utf8 => 1,
        }
    }

    /// Byte sequence of the newline code unit.
    #[must_use]
    pub fn newline(self) -> &'static [u8] {
        match self {
            Self::Utf16Le => &[0x0A, 0x00],
            Self::Utf16Be => &[0x00, 0x0A],
            Self::Utf8 => b"\n",
        }
    }

    /// Decode bytes (without BOM) into text, skipping invalid sequences.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        let (text, had_errors) = self.encoding().decode_without_bom_handling(bytes);
        if had_errors {
            text.chars().filter(|c| *c != char::REPLACEMENT_CHARACTER).collect()
        } else {
            text.into_owned()
        }
    }

    /// Encode text in this encoding (no BOM).
    #[must_use]
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Utf8 => text.as_bytes().to_vec(),
        }
    }

    /// Byte order mark for this encoding.
    #[must_use]
    pub fn bom(self) -> &'static [u8] {
        match self {
            Self::Utf16Le => BOM_UTF16_LE,
            Self::Utf16Be => BOM_UTF16_BE,
            Self::Utf8 => BOM_UTF8,
        }
    }

    fn encoding(self) -> &'static Encoding {
        match self {
            Self::Utf16Le => UTF_16LE,
            Self::Utf16Be => UTF_16BE,
            Self::Utf8 => UTF_8,
        }
    }
}

/// Decode a whole file's bytes, honouring a leading BOM.
#[must_use]
pub fn decode_file(bytes: &[u8]) -> (LogEncoding, String) {
    let (encoding, bom_len) = LogEncoding::detect(bytes);
    (encoding, encoding.decode(&bytes[bom_len..]))
}
