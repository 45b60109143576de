//! Precompiled grammar tables: symbols, parse automaton, and lexer automaton.
//!
//! A [`GrammarTable`] is produced by an external table generator and loaded
//! once per language from an opaque binary blob. It is immutable after
//! loading and shared read-only by every parse of that language.

mod codec;
mod error;
mod language;
mod lex;
mod scanner;
mod symbol;
mod symbol_set;
mod table;

/// Errors raised while loading or validating a table.
pub use error::GrammarLoadError;
/// A grammar table paired with its optional external scanner.
pub use language::Language;
/// Lexer automaton types.
pub use lex::{LexAccept, LexState, LexStateId, LexTable, LexTransition};
/// Capability interface for language-specific lexing hooks.
pub use scanner::{ExternalScanner, ScanInput, ScanMatch};
/// Symbol identifiers and metadata.
pub use symbol::{SymbolId, SymbolKind, SymbolMetadata};
/// Growable bitset of symbols.
pub use symbol_set::SymbolSet;
/// Parse automaton types.
pub use table::{
    FieldId, GrammarTable, LexModeId, ParseAction, ParseState, Production, ProductionId, StateId,
    TableParts,
};

/// Version of the binary table format understood by this crate.
pub const FORMAT_VERSION: u16 = codec::VERSION;
