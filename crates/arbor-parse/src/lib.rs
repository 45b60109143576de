//! Table-driven GLR parser with error recovery and incremental reparsing.
//!
//! [`parse`] turns text into a [`SyntaxTree`] that always covers the whole
//! input: syntax errors become `ERROR` nodes and zero-width `MISSING` tokens
//! instead of failures. [`edit`] reparses after a change, reusing every
//! subtree of the old tree that the change cannot have affected.
//!
//! Text held as UTF-16 goes through [`Parser::parse_utf16`] and
//! [`Parser::edit_utf16`]; the trees still hold UTF-8.

mod diagnostics;
mod driver;
mod edit;
mod error;
mod options;
mod parser;
mod reuse;
mod stack;
mod utf16;

use arbor_grammar::Language;
use arbor_tree::SyntaxTree;

pub use diagnostics::diagnostics;
pub use edit::InputEdit;
pub use error::{EditInconsistencyError, Error, Resource, ResourceExhaustionError};
pub use options::{DEFAULT_OPERATIONS_PER_BYTE, ParseBudget, ParseOptions, ParseStats};
pub use parser::Parser;
pub use utf16::{Utf16Error, Utf16Text, utf16_offset, utf8_offset};

pub fn parse(text: &[u8], language: &Language) -> Result<SyntaxTree, Error> {
    Parser::new(language.clone()).parse(text)
}

/// Reparses `new_text` after `edit` was applied to the text of `tree`.
pub fn edit(tree: &SyntaxTree, edit: &InputEdit, new_text: &[u8]) -> Result<SyntaxTree, Error> {
    Parser::new(tree.language().clone()).edit(tree, edit, new_text)
}
