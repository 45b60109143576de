use std::fmt;
use std::ops::{Add, AddAssign};

use text_size::TextSize;

/// Zero-based row and byte column.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// The position reached after `bytes` of `text`.
    pub fn of_prefix(text: &[u8], bytes: usize) -> Self {
        Length::of(&text[..bytes]).extent
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// Size of a piece of text in bytes and in rows/columns.
///
/// Green nodes store lengths only; absolute positions are the sum of the
/// lengths of everything before a node.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Length {
    pub bytes: TextSize,
    pub extent: Point,
}

impl Length {
    pub const ZERO: Self = Self { bytes: TextSize::new(0), extent: Point::new(0, 0) };

    pub fn of(text: &[u8]) -> Self {
        let rows = text.iter().filter(|&&byte| byte == b'\n').count();
        let column = match text.iter().rposition(|&byte| byte == b'\n') {
            Some(newline) => text.len() - newline - 1,
            None => text.len(),
        };
        Self {
            bytes: TextSize::new(text.len() as u32),
            extent: Point::new(rows as u32, column as u32),
        }
    }

    pub fn is_empty(self) -> bool {
        self.bytes == TextSize::new(0)
    }
}

impl Add for Length {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let extent = if rhs.extent.row > 0 {
            Point::new(self.extent.row + rhs.extent.row, rhs.extent.column)
        } else {
            Point::new(self.extent.row, self.extent.column + rhs.extent.column)
        };
        Self { bytes: self.bytes + rhs.bytes, extent }
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Length {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_of_text() {
        assert_eq!(Length::of(b"abc").extent, Point::new(0, 3));
        assert_eq!(Length::of(b"ab\ncd\ne").extent, Point::new(2, 1));
        assert_eq!(Length::of(b"ab\n").extent, Point::new(1, 0));
    }

    #[test]
    fn concatenation_matches_measuring_the_whole() {
        let text = b"one\ntwo three\n\nfour";
        for split in 0..=text.len() {
            let (left, right) = text.split_at(split);
            assert_eq!(Length::of(left) + Length::of(right), Length::of(text), "split at {split}");
        }
    }
}
