//! UTF-16 input.
//!
//! Trees always hold UTF-8 text and report UTF-8 offsets. Text kept as UTF-16
//! code units is transcoded before parsing, and offsets in code units are
//! converted at the boundary.

use std::fmt;
use std::ops::Range;

/// Failure to read or address UTF-16 text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Utf16Error {
    #[error("code unit {index} is past the end of a text of {len} code units")]
    OutOfBounds { index: usize, len: usize },
    #[error("unpaired surrogate at code unit {index}")]
    UnpairedSurrogate { index: usize },
    #[error("code unit {index} falls inside a surrogate pair")]
    InsideSurrogatePair { index: usize },
    #[error("text is not UTF-8 at byte {offset}")]
    NotUtf8 { offset: usize },
}

/// Growable text stored as UTF-16 code units.
///
/// Indices count code units, so a character outside the basic multilingual
/// plane takes two. Edits may split a surrogate pair; such text only fails
/// once it is transcoded.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Utf16Text {
    units: Vec<u16>,
}

impl Utf16Text {
    pub fn new(text: &str) -> Self {
        Self { units: text.encode_utf16().collect() }
    }

    pub fn from_units(units: Vec<u16>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }

    /// Length in code units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Size of the code units in bytes.
    pub fn byte_len(&self) -> usize {
        self.units.len() * 2
    }

    pub fn append(&mut self, text: &str) {
        self.units.extend(text.encode_utf16());
    }

    pub fn insert(&mut self, index: usize, text: &str) -> Result<(), Utf16Error> {
        self.replace(index..index, text)
    }

    pub fn delete(&mut self, range: Range<usize>) -> Result<(), Utf16Error> {
        self.replace(range, "")
    }

    /// Replaces the code units in `range` with `text`.
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> Result<(), Utf16Error> {
        let len = self.units.len();
        if range.end > len {
            return Err(Utf16Error::OutOfBounds { index: range.end, len });
        }
        if range.start > range.end {
            return Err(Utf16Error::OutOfBounds { index: range.start, len: range.end });
        }
        self.units.splice(range, text.encode_utf16());
        Ok(())
    }

    pub fn to_utf8(&self) -> Result<String, Utf16Error> {
        let mut out = String::with_capacity(self.units.len());
        let mut index = 0;
        for decoded in char::decode_utf16(self.units.iter().copied()) {
            let ch = decoded.map_err(|_| Utf16Error::UnpairedSurrogate { index })?;
            index += ch.len_utf16();
            out.push(ch);
        }
        Ok(out)
    }
}

impl From<&str> for Utf16Text {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for Utf16Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        char::decode_utf16(self.units.iter().copied())
            .map(|decoded| decoded.unwrap_or(char::REPLACEMENT_CHARACTER))
            .try_for_each(|ch| fmt::Write::write_char(f, ch))
    }
}

impl fmt::Debug for Utf16Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

/// Byte offset in the UTF-8 `text` of the code unit at `index`.
pub fn utf8_offset(text: &[u8], index: usize) -> Result<usize, Utf16Error> {
    let text = std::str::from_utf8(text)
        .map_err(|err| Utf16Error::NotUtf8 { offset: err.valid_up_to() })?;
    let mut units = 0;
    for (offset, ch) in text.char_indices() {
        if units == index {
            return Ok(offset);
        }
        units += ch.len_utf16();
        if units > index {
            return Err(Utf16Error::InsideSurrogatePair { index });
        }
    }
    if units == index { Ok(text.len()) } else { Err(Utf16Error::OutOfBounds { index, len: units }) }
}

/// Code unit index of the byte at `offset` in the UTF-8 `text`.
pub fn utf16_offset(text: &[u8], offset: usize) -> Result<usize, Utf16Error> {
    let prefix = text.get(..offset).ok_or(Utf16Error::NotUtf8 { offset })?;
    let prefix = std::str::from_utf8(prefix)
        .map_err(|err| Utf16Error::NotUtf8 { offset: err.valid_up_to() })?;
    Ok(prefix.encode_utf16().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_grows_and_shrinks_by_code_units() {
        let mut text = Utf16Text::new("Hello");
        assert_eq!((text.to_string().as_str(), text.len(), text.byte_len()), ("Hello", 5, 10));

        text.append(" World!");
        assert_eq!((text.len(), text.byte_len()), (12, 24));

        text.append(&"__Only AndroidIDE will be appended__"[6..17]);
        assert_eq!(text.to_string(), "Hello World! AndroidIDE");
        assert_eq!(text.len(), 23);

        text.insert(13, "Love ").unwrap();
        assert_eq!(text.to_string(), "Hello World! Love AndroidIDE");

        text.delete(0..13).unwrap();
        assert_eq!((text.to_string().as_str(), text.len()), ("Love AndroidIDE", 15));

        text.replace(0..4, "\u{1F60D}").unwrap();
        assert_eq!(text.to_string(), "\u{1F60D} AndroidIDE");
        assert_eq!((text.len(), text.byte_len()), (13, 26));

        text.replace(0..2, "Love").unwrap();
        assert_eq!(text, Utf16Text::new("Love AndroidIDE"));

        assert_eq!(text.insert(16, "!"), Err(Utf16Error::OutOfBounds { index: 16, len: 15 }));
    }

    #[test]
    fn surrogate_pairs() {
        let mut text = Utf16Text::new("\u{1F60D}");
        text.append("\n\n");
        text.append("\u{1F60D}");
        assert_eq!(text.len(), 6);
        assert_eq!(text.to_utf8().unwrap(), "\u{1F60D}\n\n\u{1F60D}");

        let utf8 = text.to_utf8().unwrap();
        assert_eq!(utf8_offset(utf8.as_bytes(), 2), Ok(4));
        assert_eq!(utf8_offset(utf8.as_bytes(), 6), Ok(10));
        let inside = utf8_offset(utf8.as_bytes(), 1);
        assert_eq!(inside, Err(Utf16Error::InsideSurrogatePair { index: 1 }));
        let past_end = utf8_offset(utf8.as_bytes(), 7);
        assert_eq!(past_end, Err(Utf16Error::OutOfBounds { index: 7, len: 6 }));
        assert_eq!(utf16_offset(utf8.as_bytes(), 6), Ok(4));
        assert_eq!(utf16_offset(utf8.as_bytes(), 1), Err(Utf16Error::NotUtf8 { offset: 0 }));

        // Splitting the pair is allowed until the text is read.
        text.delete(0..1).unwrap();
        assert_eq!(text.to_utf8(), Err(Utf16Error::UnpairedSurrogate { index: 0 }));
        assert!(text.to_string().starts_with(char::REPLACEMENT_CHARACTER));
    }
}
