use std::fmt;

use arbor_tree::Point;
use text_size::TextSize;

use crate::Utf16Error;

/// Failure of a parse call. Syntax errors are not failures: they end up in
/// the tree as `ERROR` and `MISSING` nodes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Edit(#[from] EditInconsistencyError),
    #[error(transparent)]
    ResourceExhausted(#[from] ResourceExhaustionError),
    #[error(transparent)]
    Utf16(#[from] Utf16Error),
}

/// An edit descriptor that does not describe how the old text became the new
/// text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EditInconsistencyError {
    #[error("edit offsets out of order: start {start:?}, old end {old_end:?}, new end {new_end:?}")]
    Unordered { start: TextSize, old_end: TextSize, new_end: TextSize },
    #[error("edit offset {offset:?} is past the end of a {len}-byte text")]
    OutOfBounds { offset: TextSize, len: usize },
    #[error("new text is {actual} bytes but the edit implies {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("text changed outside the edited range at old byte {offset}")]
    ChangedOutsideEdit { offset: usize },
    #[error("{which} point is {actual} but the text puts it at {expected}")]
    PointMismatch { which: &'static str, expected: Point, actual: Point },
    #[error("tree was parsed with `{tree}` but the parser is for `{parser}`")]
    LanguageMismatch { tree: String, parser: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Forks,
    LexedBytes,
    Operations,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forks => "forks",
            Self::LexedBytes => "lexed bytes",
            Self::Operations => "driver operations",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("parse budget exhausted: more than {limit} {resource}")]
pub struct ResourceExhaustionError {
    pub resource: Resource,
    pub limit: u64,
}
