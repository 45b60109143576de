//! Generator for grammar tables.
//!
//! Grammars are written as Rust values with the combinators in [`rules`] and
//! compiled by [`GrammarBuilder`] into a lexer automaton and LALR(1) parse
//! tables. Conflicts that precedence cannot resolve stay in the table as
//! multiple actions and are explored by the GLR driver at parse time.

mod builder;
mod error;
mod lalr;
mod nfa;
mod prepare;
pub mod rules;
pub mod samples;
#[cfg(test)]
mod tests;

pub use builder::GrammarBuilder;
pub use error::GenerateError;
pub use rules::{Pattern, Precedence, Rule};
