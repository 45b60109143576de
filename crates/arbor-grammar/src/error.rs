use thiserror::Error;

/// Failure to decode or validate a grammar table.
///
/// Loading errors are fatal: a table that fails validation is never handed to
/// the lexer or the parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarLoadError {
    #[error("not a grammar table (bad magic bytes)")]
    BadMagic,
    #[error("unsupported table format version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },
    #[error("table blob truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("invalid UTF-8 in string at byte {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("invalid {what} tag {tag} at byte {offset}")]
    InvalidTag { what: &'static str, tag: u8, offset: usize },
    #[error("{what} index {index} is out of range")]
    InvalidReference { what: &'static str, index: usize },
    #[error("malformed table: {0}")]
    Malformed(String),
}
