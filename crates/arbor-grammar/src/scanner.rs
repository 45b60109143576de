use crate::{SymbolId, SymbolSet};

/// Forward-only view of the input handed to an [`ExternalScanner`].
///
/// The cursor starts at the byte where the next token would begin. Every
/// character the scanner looks at counts towards the token's lookahead, so
/// an edit anywhere in the examined region invalidates the token.
pub trait ScanInput {
    /// The next character, or `None` at the end of the input.
    fn lookahead(&mut self) -> Option<char>;

    /// Consumes the next character. Does nothing at the end of the input.
    fn advance(&mut self);

    /// Number of bytes consumed since the scan started.
    fn consumed(&self) -> u32;
}

/// A token recognised by an external scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanMatch {
    pub symbol: SymbolId,
    /// Length of the token in bytes, measured from the scan start.
    pub len: u32,
}

/// Language-specific lexing hook for tokens a finite automaton cannot
/// express (heredocs, indentation, string interpolation and the like).
///
/// `valid` holds the external symbols the parser can accept at this point.
/// Returning a match for a symbol outside of `valid`, or an empty match, is
/// treated as no match.
pub trait ExternalScanner: Send + Sync {
    fn scan(&self, input: &mut dyn ScanInput, valid: &SymbolSet) -> Option<ScanMatch>;
}
