//! Thompson construction of the lexer automaton.

use arbor_grammar::{LexAccept, LexState, LexStateId, LexTable, LexTransition, SymbolId};

use crate::prepare::LexicalToken;
use crate::rules::Pattern;

const MAX_CHAR: u32 = char::MAX as u32;

#[derive(Default)]
struct NfaState {
    transitions: Vec<LexTransition>,
    epsilon: Vec<LexStateId>,
    accept: Option<LexAccept>,
}

#[derive(Default)]
struct Nfa {
    states: Vec<NfaState>,
}

impl Nfa {
    fn add_state(&mut self) -> LexStateId {
        self.states.push(NfaState::default());
        LexStateId::new(self.states.len() as u32 - 1)
    }

    fn add_epsilon(&mut self, from: LexStateId, to: LexStateId) {
        if from != to {
            self.states[from.index()].epsilon.push(to);
        }
    }

    fn add_range(&mut self, from: LexStateId, start: u32, end: u32, to: LexStateId) {
        self.states[from.index()].transitions.push(LexTransition { start, end, target: to });
    }

    /// Adds states matching `pattern` starting at `from`; returns the state
    /// reached after a match.
    fn compile(&mut self, pattern: &Pattern, from: LexStateId) -> LexStateId {
        match pattern {
            Pattern::Literal(text) => text.chars().fold(from, |state, ch| {
                let next = self.add_state();
                self.add_range(state, ch as u32, ch as u32, next);
                next
            }),
            Pattern::Class { ranges, negated } => {
                let to = self.add_state();
                for (start, end) in class_ranges(ranges, *negated) {
                    self.add_range(from, start, end, to);
                }
                to
            }
            Pattern::Seq(parts) => parts.iter().fold(from, |state, part| self.compile(part, state)),
            Pattern::Choice(parts) => {
                let to = self.add_state();
                for part in parts {
                    let start = self.add_state();
                    self.add_epsilon(from, start);
                    let end = self.compile(part, start);
                    self.add_epsilon(end, to);
                }
                to
            }
            Pattern::Repeat1(inner) => {
                let start = self.add_state();
                self.add_epsilon(from, start);
                let end = self.compile(inner, start);
                let to = self.add_state();
                self.add_epsilon(end, start);
                self.add_epsilon(end, to);
                to
            }
            Pattern::Repeat(inner) => {
                let to = self.compile(&Pattern::Repeat1(inner.clone()), from);
                self.add_epsilon(from, to);
                to
            }
            Pattern::Optional(inner) => {
                let start = self.add_state();
                self.add_epsilon(from, start);
                let end = self.compile(inner, start);
                let to = self.add_state();
                self.add_epsilon(end, to);
                self.add_epsilon(start, to);
                to
            }
        }
    }
}

/// Sorted, merged ranges of scalar values; complemented over the whole
/// Unicode range when `negated`.
fn class_ranges(ranges: &[(char, char)], negated: bool) -> Vec<(u32, u32)> {
    let mut sorted: Vec<(u32, u32)> = ranges
        .iter()
        .map(|&(start, end)| (start as u32, end as u32))
        .filter(|(start, end)| start <= end)
        .collect();
    sorted.sort_unstable();

    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(sorted.len());
    for (start, end) in sorted {
        match merged.last_mut() {
            Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    if !negated {
        return merged;
    }

    let mut complement = Vec::with_capacity(merged.len() + 1);
    let mut next = 0;
    for (start, end) in merged {
        if start > next {
            complement.push((next, start - 1));
        }
        next = end + 1;
    }
    if next <= MAX_CHAR {
        complement.push((next, MAX_CHAR));
    }
    complement
}

pub(crate) fn build(tokens: &[(SymbolId, LexicalToken)]) -> LexTable {
    let mut nfa = Nfa::default();
    let mut starts = Vec::with_capacity(tokens.len());
    for (symbol, token) in tokens {
        let start = nfa.add_state();
        let end = nfa.compile(&token.pattern, start);
        nfa.states[end.index()].accept = Some(LexAccept {
            symbol: *symbol,
            precedence: token.precedence,
            literal: token.is_literal(),
        });
        starts.push((*symbol, start));
    }

    let states = nfa
        .states
        .into_iter()
        .map(|state| LexState {
            transitions: state.transitions.into(),
            epsilon: state.epsilon.into(),
            accept: state.accept,
        })
        .collect();
    LexTable { states, starts: starts.into() }
}
