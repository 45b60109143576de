//! Structural queries over syntax trees.
//!
//! A [`Query`] is compiled once against a [`Language`](arbor_grammar::Language)
//! from s-expression patterns such as
//!
//! ```text
//! (assignment name: (identifier) @name value: [(number) (sum)] @value)
//! ((identifier) @id (#eq? @id "main"))
//! ```
//!
//! and then run over any number of trees with [`query`].

mod compile;
mod error;
mod lexer;
mod matcher;

#[cfg(test)]
mod tests;

use arbor_tree::SyntaxTree;

pub use compile::Query;
pub use error::{QueryError, QueryErrorKind};
pub use matcher::{QueryCapture, QueryMatch, QueryMatches};

/// Matches every pattern of `query` at every visible node of `tree`.
pub fn query<'t>(tree: &'t SyntaxTree, query: &'t Query) -> QueryMatches<'t> {
    QueryMatches::new(tree, query)
}
