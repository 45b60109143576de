use arbor_grammar::ScanInput;

pub(crate) const REPLACEMENT_CHAR: char = char::REPLACEMENT_CHARACTER;

/// Forward-only reader over UTF-8 input that records how far it looked.
///
/// Bytes that are not valid UTF-8 read as one replacement character each.
pub(crate) struct Cursor<'t> {
    text: &'t [u8],
    start: usize,
    pos: usize,
    /// Exclusive end of every byte inspected so far; `text.len() + 1` once
    /// the end of input has been observed.
    examined_end: usize,
}

impl<'t> Cursor<'t> {
    pub(crate) fn new(text: &'t [u8], start: usize) -> Self {
        Self { text, start, pos: start, examined_end: start }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn examined_end(&self) -> usize {
        self.examined_end
    }

    /// Decodes the next character without consuming it.
    pub(crate) fn peek(&mut self) -> Option<(char, usize)> {
        match decode(&self.text[self.pos..]) {
            Some((ch, len)) => {
                self.examined_end = self.examined_end.max(self.pos + len);
                Some((ch, len))
            }
            None => {
                self.examined_end = self.examined_end.max(self.text.len() + 1);
                None
            }
        }
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let (ch, len) = self.peek()?;
        self.pos += len;
        Some(ch)
    }
}

impl ScanInput for Cursor<'_> {
    fn lookahead(&mut self) -> Option<char> {
        self.peek().map(|(ch, _)| ch)
    }

    fn advance(&mut self) {
        self.bump();
    }

    fn consumed(&self) -> u32 {
        (self.pos - self.start) as u32
    }
}

pub(crate) fn decode(bytes: &[u8]) -> Option<(char, usize)> {
    let head = &bytes[..bytes.len().min(4)];
    if head.is_empty() {
        return None;
    }
    let valid = match std::str::from_utf8(head) {
        Ok(valid) => valid,
        Err(error) => std::str::from_utf8(&head[..error.valid_up_to()]).unwrap_or_default(),
    };
    match valid.chars().next() {
        Some(ch) => Some((ch, ch.len_utf8())),
        None => Some((REPLACEMENT_CHAR, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_multibyte_and_invalid_input() {
        assert_eq!(decode("é!".as_bytes()), Some(('é', 2)));
        assert_eq!(decode(&[0xFF, b'a']), Some((REPLACEMENT_CHAR, 1)));
        // A truncated sequence at the end of the input.
        assert_eq!(decode(&[0xE2, 0x82]), Some((REPLACEMENT_CHAR, 1)));
        assert_eq!(decode(b""), None);
    }

    #[test]
    fn tracks_examined_bytes() {
        let mut cursor = Cursor::new(b"ab", 0);
        assert_eq!(cursor.bump(), Some('a'));
        assert_eq!(cursor.examined_end(), 1);
        cursor.peek();
        assert_eq!(cursor.examined_end(), 2);
        cursor.bump();
        assert_eq!(cursor.pos(), 2);
        assert_eq!(cursor.peek(), None);
        assert_eq!(cursor.examined_end(), 3);
        assert_eq!(cursor.consumed(), 2);
    }
}
