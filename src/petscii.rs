//! Petscii strings as found on CBM disks.
//!
//! Text on the disk is kept in its native 8-bit form, one byte per
//! character.  Mapping Petscii to renderable glyphs is left to the caller;
//! this type only offers an escaped rendering where printable ASCII passes
//! through and every other byte is shown as `{$xx}`.

use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Petscii(Vec<u8>);

impl Petscii {
    pub fn from_bytes(bytes: &[u8]) -> Petscii {
        Petscii(bytes.to_vec())
    }

    /// Build a string from a fixed-width field, dropping any trailing
    /// padding bytes.
    pub fn from_padded_bytes(bytes: &[u8], pad_byte: u8) -> Petscii {
        let end = bytes
            .iter()
            .rposition(|&b| b != pad_byte)
            .map_or(0, |i| i + 1);
        Petscii(bytes[..end].to_vec())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_escaped_string(&self) -> String {
        let mut string = String::with_capacity(self.0.len());
        for &b in self.0.iter() {
            match b {
                0x20..=0x7E => string.push(b as char),
                _ => string.push_str(&format!("{{${:02x}}}", b)),
            }
        }
        string
    }
}

impl AsRef<[u8]> for Petscii {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> From<&'a [u8]> for Petscii {
    fn from(bytes: &[u8]) -> Petscii {
        Petscii::from_bytes(bytes)
    }
}

/// Only ASCII characters have a direct byte equivalent; anything else
/// becomes `?`.
impl<'a> From<&'a str> for Petscii {
    fn from(string: &str) -> Petscii {
        Petscii(
            string
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        )
    }
}

impl From<String> for Petscii {
    fn from(string: String) -> Petscii {
        string.as_str().into()
    }
}

impl PartialEq<str> for Petscii {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl<'a> PartialEq<&'a str> for Petscii {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl fmt::Display for Petscii {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(&self.to_escaped_string())
    }
}

impl fmt::Debug for Petscii {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self.to_escaped_string())
    }
}
