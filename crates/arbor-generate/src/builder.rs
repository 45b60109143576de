use arbor_grammar::{GrammarTable, Production, TableParts};
use indexmap::IndexMap;

use crate::rules::Rule;
use crate::{GenerateError, lalr, nfa, prepare};

/// Collects the rules of a grammar and turns them into a [`GrammarTable`].
///
/// The first rule added is the start rule. Rule names starting with `_` are
/// hidden: their nodes are flattened into their parents.
#[derive(Clone, Debug)]
pub struct GrammarBuilder {
    name: String,
    rules: IndexMap<String, Rule>,
    extras: Vec<String>,
    externals: Vec<String>,
    duplicate: Option<String>,
}

impl GrammarBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            rules: IndexMap::new(),
            extras: Vec::new(),
            externals: Vec::new(),
            duplicate: None,
        }
    }

    #[must_use]
    pub fn rule(mut self, name: &str, rule: Rule) -> Self {
        if self.rules.insert(name.to_owned(), rule).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name.to_owned());
        }
        self
    }

    /// Tokens that may appear between any two tokens, such as whitespace and
    /// comments.
    #[must_use]
    pub fn extras(mut self, names: &[&str]) -> Self {
        self.extras.extend(names.iter().map(|name| (*name).to_owned()));
        self
    }

    /// Tokens produced by the language's external scanner instead of the
    /// lexer automaton.
    #[must_use]
    pub fn externals(mut self, names: &[&str]) -> Self {
        self.externals.extend(names.iter().map(|name| (*name).to_owned()));
        self
    }

    pub fn build(&self) -> Result<GrammarTable, GenerateError> {
        if let Some(name) = &self.duplicate {
            return Err(GenerateError::DuplicateRule(name.clone()));
        }

        let grammar = prepare::prepare(&self.name, &self.rules, &self.extras, &self.externals)?;
        let tables = lalr::build(&grammar)?;
        let lexer = nfa::build(&grammar.tokens);

        let productions = grammar
            .productions
            .iter()
            .map(|production| Production {
                lhs: production.lhs,
                child_count: production.steps.len() as u16,
                dynamic_precedence: production.dynamic_precedence,
                fields: production.field_ids(&grammar.fields),
            })
            .collect();

        let table = GrammarTable::new(TableParts {
            name: self.name.clone(),
            symbols: grammar.symbols,
            fields: grammar.fields.into_iter().map(String::into_boxed_str).collect(),
            productions,
            states: tables.states,
            lex_modes: tables.lex_modes,
            lexer,
            externals: grammar.externals,
        })?;

        tracing::debug!(
            name = %self.name,
            symbols = table.symbol_count(),
            states = table.state_count(),
            productions = table.production_count(),
            "generated grammar table"
        );
        Ok(table)
    }
}
