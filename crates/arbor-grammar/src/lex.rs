use std::cmp::Reverse;

use crate::SymbolId;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LexStateId(u32);

impl LexStateId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Edge taken on any character in `start..=end` (Unicode scalar values).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LexTransition {
    pub start: u32,
    pub end: u32,
    pub target: LexStateId,
}

impl LexTransition {
    pub fn matches(&self, ch: char) -> bool {
        (self.start..=self.end).contains(&(ch as u32))
    }
}

/// Reaching a state with an accept entry means the characters consumed so far
/// form a complete token of `symbol`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LexAccept {
    pub symbol: SymbolId,
    pub precedence: i32,
    /// Accepts from string literals win over patterns of the same length, so
    /// keywords beat identifiers.
    pub literal: bool,
}

impl LexAccept {
    /// Ordering between two accepts for a match of the same length: higher
    /// precedence, then literal over pattern, then lower symbol id.
    pub fn outranks(&self, other: &Self) -> bool {
        (self.precedence, self.literal, Reverse(self.symbol))
            > (other.precedence, other.literal, Reverse(other.symbol))
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LexState {
    pub transitions: Box<[LexTransition]>,
    pub epsilon: Box<[LexStateId]>,
    pub accept: Option<LexAccept>,
}

/// Nondeterministic lexer automaton.
///
/// Each lexable terminal owns one start state; the lexer simulates the union
/// of the start states of all currently valid terminals.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LexTable {
    pub states: Box<[LexState]>,
    pub starts: Box<[(SymbolId, LexStateId)]>,
}

impl LexTable {
    pub fn state(&self, id: LexStateId) -> &LexState {
        &self.states[id.index()]
    }

    pub fn start(&self, symbol: SymbolId) -> Option<LexStateId> {
        self.starts.iter().find(|(start, _)| *start == symbol).map(|&(_, state)| state)
    }

    /// Targets reachable from `id` by consuming `ch`.
    pub fn step(&self, id: LexStateId, ch: char) -> impl Iterator<Item = LexStateId> + '_ {
        let edges = self.state(id).transitions.iter();
        edges.filter(move |edge| edge.matches(ch)).map(|edge| edge.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(symbol: u16, precedence: i32, literal: bool) -> LexAccept {
        LexAccept { symbol: SymbolId::new(symbol), precedence, literal }
    }

    #[test]
    fn accept_ranking() {
        assert!(accept(5, 1, false).outranks(&accept(4, 0, true)));
        assert!(accept(5, 0, true).outranks(&accept(4, 0, false)));
        assert!(accept(4, 0, false).outranks(&accept(5, 0, false)));
        assert!(!accept(4, 0, false).outranks(&accept(4, 0, false)));
    }

    #[test]
    fn transition_ranges_are_inclusive() {
        let edge = LexTransition { start: 'a' as u32, end: 'c' as u32, target: LexStateId::new(1) };
        assert!(edge.matches('a'));
        assert!(edge.matches('c'));
        assert!(!edge.matches('d'));
    }
}
