//! Error recovery.
//!
//! Tried in order on the best failed head: inserting one missing token,
//! then popping entries and skipping tokens until a token can be shifted,
//! and finally wrapping everything into an `ERROR` root at the end of input.

use std::cmp::Ordering;

use arbor_grammar::{ParseAction, StateId, SymbolId};
use arbor_lexer::Token;
use arbor_tree::{Green, GreenLeaf, GreenNode, Length, NodeData, NodeOrToken};
use text_size::TextSize;

use super::{Driver, Failure, Mode, lookahead_bytes};
use crate::Error;
use crate::stack::EntryId;

pub(super) enum Recovery {
    Resume(EntryId),
    Finished(GreenNode),
}

/// Parse states explored by one viability check.
const SIMULATION_LIMIT: usize = 256;

impl Driver<'_> {
    pub(super) fn recover(&mut self) -> Result<Recovery, Error> {
        self.stats.recoveries += 1;
        let failures = std::mem::take(&mut self.failed);
        let failure = match self.best_failure(failures) {
            Some(failure) => failure,
            None => {
                let lookahead = self.token_at(Length::ZERO, Mode::Error)?;
                Failure { top: self.base, lookahead }
            }
        };

        let position = self.stack[failure.top].position.bytes;
        let repeated = self.last_recovery == Some(position);
        self.last_recovery = Some(position);
        tracing::debug!(
            offset = u32::from(position),
            symbol = self.table.symbol_name(failure.lookahead.token.symbol),
            repeated,
            "recovering from syntax error"
        );

        // A second recovery at the same offset must consume input.
        if !repeated {
            if let Some(top) = self.insert_missing(&failure)? {
                return Ok(Recovery::Resume(top));
            }
        }
        self.skip_and_resync(failure, repeated)
    }

    /// The failed head that got furthest; the preferred one among equals.
    fn best_failure(&self, failures: Vec<Failure>) -> Option<Failure> {
        failures.into_iter().reduce(|best, failure| {
            let (a, b) = (&self.stack[failure.top], &self.stack[best.top]);
            let better = match a.position.bytes.cmp(&b.position.bytes) {
                Ordering::Greater => true,
                Ordering::Equal => self.stack.compare(failure.top, best.top) == Ordering::Less,
                Ordering::Less => false,
            };
            if better { failure } else { best }
        })
    }

    /// Inserts a zero-width token if that makes the failing lookahead viable.
    /// Candidates are tried in symbol order.
    fn insert_missing(&mut self, failure: &Failure) -> Result<Option<EntryId>, Error> {
        let states = self.stack.states(failure.top);
        let Some(&state) = states.last() else {
            return Ok(None);
        };
        let position = self.stack[failure.top].position;

        let mut candidates: Vec<SymbolId> = self
            .table
            .expected_symbols(state)
            .filter(|&symbol| self.can_be_missing(symbol))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        for symbol in candidates {
            let Some((path, after)) = self.simulate(states.clone(), symbol) else {
                continue;
            };
            let Some(&resumed) = after.last() else {
                continue;
            };
            let next = self.token_at(position, Mode::State(resumed))?;
            if next.token.is_extra || self.simulate(after, next.token.symbol).is_none() {
                continue;
            }

            // Reductions made for the missing token depend on the real lookahead.
            let extent = token_extent(&failure.lookahead.token).max(token_extent(&next.token));
            let missing = Token {
                symbol,
                start: position,
                size: Length::ZERO,
                lookahead_bytes: u32::from(extent) - u32::from(position.bytes),
                is_extra: false,
                is_error: false,
            };

            // Nodes reduced for an invented token must not be reused as a whole.
            let mut top = failure.top;
            for action in path {
                self.count_operation()?;
                top = match action {
                    ParseAction::Shift(next) => {
                        self.stack.push(top, next, NodeOrToken::Token(GreenLeaf::missing(symbol)))
                    }
                    ParseAction::Reduce(id) => match self.reduce(top, id, &missing, true) {
                        Some(entry) => entry,
                        None => return Ok(None),
                    },
                    ParseAction::Accept => top,
                };
            }
            tracing::debug!(symbol = self.table.symbol_name(symbol), "inserted missing token");
            return Ok(Some(top));
        }
        Ok(None)
    }

    fn can_be_missing(&self, symbol: SymbolId) -> bool {
        symbol != SymbolId::END
            && symbol != SymbolId::ERROR
            && !self.table.symbol_metadata(symbol).extra
    }

    /// Pops entries and skips tokens until some token is viable in a
    /// remaining state, preferring fewer skipped tokens, then fewer popped
    /// entries. What was removed becomes an `ERROR` extra.
    fn skip_and_resync(&mut self, failure: Failure, must_skip: bool) -> Result<Recovery, Error> {
        let path = self.stack.path(failure.top);
        let top_index = path.len() - 1;
        // Cut points sit just below a non-extra entry, or at the top.
        let cuts: Vec<usize> = (0..=top_index)
            .rev()
            .filter(|&index| index == top_index || !self.stack[path[index + 1]].is_extra())
            .collect();

        let mut skipped: Vec<Green> = Vec::new();
        let mut current = failure.lookahead;
        loop {
            let position = current.token.start;
            if !current.token.is_extra && !(must_skip && skipped.is_empty()) {
                for &cut in &cuts {
                    if skipped.is_empty() && cut == top_index {
                        continue;
                    }
                    let states = self.stack.states(path[cut]);
                    let Some(&state) = states.last() else {
                        continue;
                    };
                    let candidate = self.token_at(position, Mode::State(state))?;
                    if candidate.token.is_extra
                        || self.simulate(states, candidate.token.symbol).is_none()
                    {
                        continue;
                    }

                    tracing::debug!(
                        popped = top_index - cut,
                        skipped = skipped.len(),
                        offset = u32::from(position.bytes),
                        "resynchronised"
                    );
                    let top =
                        self.wrap_error(path[cut], &path[cut + 1..], skipped, &candidate.token);
                    return Ok(Recovery::Resume(top));
                }
            }

            if current.token.is_end() {
                break;
            }
            skipped.push(NodeOrToken::Token(current.leaf));
            current = self.token_at(current.token.end(), Mode::Error)?;
        }

        tracing::debug!("no viable state before the end of input");
        let mut children = self.stack.subtrees(failure.top);
        children.extend(skipped);
        Ok(Recovery::Finished(self.error_root(children)))
    }

    /// Pushes an `ERROR` extra holding the popped subtrees and skipped tokens
    /// onto `below`. Extras at the end stay outside the error.
    fn wrap_error(
        &mut self,
        below: EntryId,
        popped: &[EntryId],
        skipped: Vec<Green>,
        resync: &Token,
    ) -> EntryId {
        let mut children: Vec<Green> =
            popped.iter().filter_map(|&entry| self.stack[entry].subtree.clone()).collect();
        children.extend(skipped);
        let mut trailing = Vec::new();
        while children.len() > 1 && children.last().is_some_and(Green::is_extra) {
            trailing.extend(children.pop());
        }

        let state = self.stack[below].state;
        let start = self.stack[below].position.bytes;
        let data = NodeData {
            symbol: SymbolId::ERROR,
            production: None,
            parse_state: state,
            dynamic_precedence: 0,
            lookahead_bytes: lookahead_bytes(start, &children, resync),
            extra: true,
            fragile: false,
        };
        let error = NodeOrToken::Node(GreenNode::new(data, children));
        let mut top = self.stack.push(below, state, error);
        for extra in trailing.into_iter().rev() {
            top = self.stack.push(top, state, extra);
        }
        top
    }

    /// Runs the automaton on `states` with `symbol` as lookahead, without
    /// building anything. Returns the actions up to the shift (or accept) of
    /// `symbol` and the states after it.
    fn simulate(
        &self,
        states: Vec<StateId>,
        symbol: SymbolId,
    ) -> Option<(Vec<ParseAction>, Vec<StateId>)> {
        let mut work = vec![(states, Vec::new())];
        let mut explored = 0;
        while let Some((states, path)) = work.pop() {
            explored += 1;
            if explored > SIMULATION_LIMIT {
                break;
            }
            let &state = states.last()?;
            for &action in self.table.actions(state, symbol) {
                let mut path = path.clone();
                path.push(action);
                match action {
                    ParseAction::Shift(next) => {
                        let mut states = states.clone();
                        states.push(next);
                        return Some((path, states));
                    }
                    ParseAction::Accept => return Some((path, states.clone())),
                    ParseAction::Reduce(id) => {
                        let production = self.table.production(id);
                        let count = usize::from(production.child_count);
                        if states.len() <= count {
                            continue;
                        }
                        let mut next = states[..states.len() - count].to_vec();
                        let goto =
                            next.last().and_then(|&top| self.table.goto(top, production.lhs));
                        if let Some(goto) = goto {
                            next.push(goto);
                            work.push((next, path));
                        }
                    }
                }
            }
        }
        None
    }
}

fn token_extent(token: &Token) -> TextSize {
    token.end().bytes + TextSize::new(token.lookahead_bytes)
}
