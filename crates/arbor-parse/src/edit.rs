use std::ops::Range;

use arbor_tree::{Point, SyntaxTree};
use text_size::{TextRange, TextSize};

use crate::EditInconsistencyError;

/// Describes one contiguous change: the bytes `start_byte..old_end_byte` of
/// the old text were replaced by `start_byte..new_end_byte` of the new text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEdit {
    pub start_byte: TextSize,
    pub old_end_byte: TextSize,
    pub new_end_byte: TextSize,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

impl InputEdit {
    /// Replaces `range` of `text` with `replacement`, returning the matching
    /// edit together with the edited text.
    pub fn replace(
        text: &[u8],
        range: Range<usize>,
        replacement: &[u8],
    ) -> Result<(Self, Vec<u8>), EditInconsistencyError> {
        if range.start > range.end {
            return Err(EditInconsistencyError::Unordered {
                start: size(range.start),
                old_end: size(range.end),
                new_end: size(range.start + replacement.len()),
            });
        }
        if range.end > text.len() {
            let len = text.len();
            return Err(EditInconsistencyError::OutOfBounds { offset: size(range.end), len });
        }

        let mut new_text = Vec::with_capacity(text.len() - range.len() + replacement.len());
        new_text.extend_from_slice(&text[..range.start]);
        new_text.extend_from_slice(replacement);
        new_text.extend_from_slice(&text[range.end..]);

        let new_end = range.start + replacement.len();
        let edit = Self {
            start_byte: size(range.start),
            old_end_byte: size(range.end),
            new_end_byte: size(new_end),
            start_point: Point::of_prefix(text, range.start),
            old_end_point: Point::of_prefix(text, range.end),
            new_end_point: Point::of_prefix(&new_text, new_end),
        };
        Ok((edit, new_text))
    }

    pub fn is_noop(&self) -> bool {
        self.start_byte == self.old_end_byte && self.start_byte == self.new_end_byte
    }

    /// Checks that the edit turns `old_text` into `new_text`.
    pub fn validate(&self, old_text: &[u8], new_text: &[u8]) -> Result<(), EditInconsistencyError> {
        let start = usize::from(self.start_byte);
        let old_end = usize::from(self.old_end_byte);
        let new_end = usize::from(self.new_end_byte);

        if start > old_end || start > new_end {
            return Err(EditInconsistencyError::Unordered {
                start: self.start_byte,
                old_end: self.old_end_byte,
                new_end: self.new_end_byte,
            });
        }
        if old_end > old_text.len() {
            return Err(EditInconsistencyError::OutOfBounds {
                offset: self.old_end_byte,
                len: old_text.len(),
            });
        }
        // With matching lengths the new end is in bounds too.
        let expected = old_text.len() - old_end + new_end;
        if new_text.len() != expected {
            return Err(EditInconsistencyError::LengthMismatch { expected, actual: new_text.len() });
        }

        if let Some(offset) = first_difference(&old_text[..start], &new_text[..start]) {
            return Err(EditInconsistencyError::ChangedOutsideEdit { offset });
        }
        if let Some(offset) = first_difference(&old_text[old_end..], &new_text[new_end..]) {
            return Err(EditInconsistencyError::ChangedOutsideEdit { offset: old_end + offset });
        }

        check_point("start", self.start_point, Point::of_prefix(old_text, start))?;
        check_point("old end", self.old_end_point, Point::of_prefix(old_text, old_end))?;
        check_point("new end", self.new_end_point, Point::of_prefix(new_text, new_end))?;
        Ok(())
    }

    /// Records the edit on `tree` without reparsing it, so the nodes it
    /// reaches report `has_changes`. Only the old side of the edit is
    /// checked, as the new text is not known here.
    pub fn mark(&self, tree: &SyntaxTree) -> Result<SyntaxTree, EditInconsistencyError> {
        if self.start_byte > self.old_end_byte || self.start_byte > self.new_end_byte {
            return Err(EditInconsistencyError::Unordered {
                start: self.start_byte,
                old_end: self.old_end_byte,
                new_end: self.new_end_byte,
            });
        }
        let len = tree.text().len();
        if usize::from(self.old_end_byte) > len {
            return Err(EditInconsistencyError::OutOfBounds { offset: self.old_end_byte, len });
        }
        let start = usize::from(self.start_byte);
        check_point("start", self.start_point, Point::of_prefix(tree.text(), start))?;
        Ok(tree.with_change(TextRange::new(self.start_byte, self.old_end_byte)))
    }

    /// Maps a byte offset of the new text back to the old text, if the byte
    /// lies outside the replaced range.
    pub(crate) fn old_offset(&self, new_offset: TextSize) -> Option<TextSize> {
        if new_offset < self.start_byte {
            Some(new_offset)
        } else if new_offset >= self.new_end_byte {
            Some(new_offset - self.new_end_byte + self.old_end_byte)
        } else {
            None
        }
    }
}

fn size(offset: usize) -> TextSize {
    TextSize::new(offset as u32)
}

fn first_difference(old: &[u8], new: &[u8]) -> Option<usize> {
    old.iter().zip(new).position(|(old, new)| old != new)
}

fn check_point(
    which: &'static str,
    actual: Point,
    expected: Point,
) -> Result<(), EditInconsistencyError> {
    if actual == expected {
        Ok(())
    } else {
        Err(EditInconsistencyError::PointMismatch { which, expected, actual })
    }
}
