//! GLR shift-reduce driver.
//!
//! Heads advance one token at a time, the head furthest behind first. A head
//! whose state has several actions for its lookahead forks; heads that end up
//! at the same position with the same states are merged. When every head has
//! failed, error recovery turns the best failed head into a single new head.

mod recovery;

use std::cmp::Ordering;
use std::collections::VecDeque;

use arbor_grammar::{
    GrammarTable, Language, LexModeId, ParseAction, ProductionId, StateId, SymbolId,
};
use arbor_lexer::{Lexer, Token};
use arbor_tree::{Green, GreenLeaf, GreenNode, LeafData, Length, NodeData, NodeOrToken};
use text_size::TextSize;

use crate::reuse::Reuse;
use crate::stack::{EntryId, Stack};
use crate::{Error, ParseBudget, ParseStats, ResourceExhaustionError};
use recovery::Recovery;

const MAX_HEADS: usize = 8;

#[derive(Clone, Copy, Debug)]
enum Mode {
    /// Terminals valid in a parse state.
    State(StateId),
    /// Every terminal; used while skipping input.
    Error,
}

#[derive(Clone, Debug)]
struct Lookahead {
    token: Token,
    leaf: GreenLeaf,
}

struct CachedToken {
    mode: Option<LexModeId>,
    lookahead: Lookahead,
}

struct Failure {
    top: EntryId,
    lookahead: Lookahead,
}

pub(crate) struct Driver<'a> {
    table: &'a GrammarTable,
    lexer: Lexer<'a>,
    stack: Stack,
    base: EntryId,
    /// Heads waiting for their next token.
    heads: Vec<EntryId>,
    /// Heads that reduced and must act on the same token again.
    pending: VecDeque<EntryId>,
    accepted: Vec<EntryId>,
    failed: Vec<Failure>,
    tokens: Vec<CachedToken>,
    reuse: Option<Reuse<'a>>,
    budget: ParseBudget,
    stats: ParseStats,
    last_recovery: Option<TextSize>,
}

impl<'a> Driver<'a> {
    pub(crate) fn new(
        language: &'a Language,
        text: &'a [u8],
        reuse: Option<Reuse<'a>>,
        budget: ParseBudget,
    ) -> Self {
        let table = language.table();
        let (stack, base) = Stack::new(table.start_state());
        Self {
            table,
            lexer: Lexer::new(language, text),
            stack,
            base,
            heads: vec![base],
            pending: VecDeque::new(),
            accepted: Vec::new(),
            failed: Vec::new(),
            tokens: Vec::new(),
            reuse,
            budget: budget.for_input(text.len()),
            stats: ParseStats::default(),
            last_recovery: None,
        }
    }

    /// Parses the whole text. The statistics are returned whether or not the
    /// parse succeeded.
    pub(crate) fn run(mut self) -> (Result<GreenNode, Error>, ParseStats) {
        let result = self.parse();
        (result, self.stats)
    }

    fn parse(&mut self) -> Result<GreenNode, Error> {
        loop {
            if let Some(top) = self.next_head() {
                self.advance(top)?;
                self.condense();
                if self.heads.len() == 1 {
                    self.failed.clear();
                }
                continue;
            }

            if let Some(top) = self.best(&self.accepted) {
                return Ok(self.finish(top));
            }

            match self.recover()? {
                Recovery::Resume(top) => self.heads.push(top),
                Recovery::Finished(root) => return Ok(root),
            }
        }
    }

    /// Removes and returns the head with the smallest position.
    fn next_head(&mut self) -> Option<EntryId> {
        let index = (0..self.heads.len())
            .min_by_key(|&index| self.stack[self.heads[index]].position.bytes)?;
        let top = self.heads.remove(index);
        let position = self.stack[top].position.bytes;
        self.tokens.retain(|cached| cached.lookahead.token.start.bytes >= position);
        Some(top)
    }

    fn live_heads(&self) -> usize {
        self.heads.len() + self.pending.len() + 1
    }

    fn advance(&mut self, top: EntryId) -> Result<(), Error> {
        self.pending.push_back(top);
        while let Some(top) = self.pending.pop_front() {
            self.step(top)?;
        }
        Ok(())
    }

    /// Acts on the lookahead of one head. Shifted heads are parked in
    /// `heads`, reduced ones queued in `pending`.
    fn step(&mut self, top: EntryId) -> Result<(), Error> {
        let state = self.stack[top].state;
        let position = self.stack[top].position;

        // Reuse is only sound where a fresh parse would be deterministic.
        if self.live_heads() == 1 && self.failed.is_empty() {
            if let Some((node, next)) = self.reusable_node(position, state) {
                tracing::trace!(
                    offset = u32::from(position.bytes),
                    symbol = self.table.symbol_name(node.symbol()),
                    "reused node"
                );
                self.stats.reused_nodes += 1;
                self.count_operation()?;
                let entry = self.stack.push(top, next, NodeOrToken::Node(node));
                self.heads.push(entry);
                return Ok(());
            }
        }

        let lookahead = self.token_at(position, Mode::State(state))?;
        let actions = self.table.actions(state, lookahead.token.symbol);
        if actions.is_empty() {
            if lookahead.token.is_extra {
                self.count_operation()?;
                let entry = self.stack.push(top, state, NodeOrToken::Token(lookahead.leaf));
                self.heads.push(entry);
            } else {
                self.failed.push(Failure { top, lookahead });
            }
            return Ok(());
        }

        let forked = actions.len() > 1;
        if forked {
            self.stats.forks += actions.len() as u64 - 1;
            tracing::trace!(
                state = state.raw(),
                symbol = self.table.symbol_name(lookahead.token.symbol),
                actions = actions.len(),
                "forked"
            );
        }

        for &action in actions {
            self.count_operation()?;
            match action {
                ParseAction::Shift(next) => {
                    let leaf = NodeOrToken::Token(lookahead.leaf.clone());
                    let entry = self.stack.push(top, next, leaf);
                    self.heads.push(entry);
                }
                ParseAction::Reduce(production) => {
                    let fragile = forked || self.live_heads() > 1;
                    if let Some(entry) = self.reduce(top, production, &lookahead.token, fragile) {
                        self.pending.push_back(entry);
                    } else {
                        self.failed.push(Failure { top, lookahead: lookahead.clone() });
                    }
                }
                ParseAction::Accept => self.accepted.push(top),
            }
        }
        Ok(())
    }

    fn reduce(
        &mut self,
        top: EntryId,
        id: ProductionId,
        lookahead: &Token,
        fragile: bool,
    ) -> Option<EntryId> {
        let production = self.table.production(id);
        let popped = self.stack.pop(top, usize::from(production.child_count))?;
        let below = &self.stack[popped.below];
        let (parse_state, start) = (below.state, below.position.bytes);
        let next = self.table.goto(parse_state, production.lhs)?;

        // Reducing past recovered input depends on what the recovery chose.
        let after_error = popped.trailing.iter().any(Green::has_error);
        let data = NodeData {
            symbol: production.lhs,
            production: Some(id),
            parse_state,
            dynamic_precedence: production.dynamic_precedence,
            lookahead_bytes: lookahead_bytes(start, &popped.children, lookahead),
            extra: false,
            fragile: fragile || after_error,
        };
        let node = GreenNode::new(data, popped.children);
        let mut entry = self.stack.push(popped.below, next, NodeOrToken::Node(node));
        for extra in popped.trailing {
            entry = self.stack.push(entry, next, extra);
        }
        Some(entry)
    }

    /// Merges heads with identical stacks and drops the least preferred heads
    /// beyond [`MAX_HEADS`].
    fn condense(&mut self) {
        let mut index = 1;
        while index < self.heads.len() {
            let head = self.heads[index];
            let duplicate =
                (0..index).find(|&other| self.stack.same_states(self.heads[other], head));
            if let Some(other) = duplicate {
                if self.stack.compare(head, self.heads[other]) == Ordering::Less {
                    self.heads[other] = head;
                }
                self.heads.remove(index);
            } else {
                index += 1;
            }
        }

        while self.heads.len() > MAX_HEADS {
            let worst = (0..self.heads.len()).reduce(|worst, index| {
                if self.stack.compare(self.heads[index], self.heads[worst]) == Ordering::Less {
                    worst
                } else {
                    index
                }
            });
            if let Some(worst) = worst {
                tracing::trace!(heads = self.heads.len(), "dropped head");
                self.heads.remove(worst);
            }
        }
    }

    fn best(&self, candidates: &[EntryId]) -> Option<EntryId> {
        candidates.iter().copied().reduce(|best, candidate| {
            if self.stack.compare(candidate, best) == Ordering::Less { candidate } else { best }
        })
    }

    /// Builds the root from an accepting stack. Extras before and after the
    /// start symbol become children of the root.
    fn finish(&self, top: EntryId) -> GreenNode {
        let subtrees = self.stack.subtrees(top);
        let Some(index) = subtrees.iter().position(|subtree| !subtree.is_extra()) else {
            return self.error_root(subtrees);
        };
        let NodeOrToken::Node(root) = subtrees[index].clone() else {
            return self.error_root(subtrees);
        };
        if subtrees.len() == 1 {
            return root;
        }

        let mut children = subtrees[..index].to_vec();
        children.extend(root.children().iter().cloned());
        children.extend(subtrees[index + 1..].iter().cloned());
        let data = NodeData {
            symbol: root.symbol(),
            production: root.production(),
            parse_state: root.parse_state(),
            dynamic_precedence: root
                .production()
                .map_or(0, |id| self.table.production(id).dynamic_precedence),
            lookahead_bytes: root.lookahead_bytes(),
            extra: false,
            fragile: root.is_fragile(),
        };
        GreenNode::new(data, children)
    }

    fn error_root(&self, children: Vec<Green>) -> GreenNode {
        let data = NodeData {
            symbol: SymbolId::ERROR,
            production: None,
            parse_state: self.table.start_state(),
            dynamic_precedence: 0,
            lookahead_bytes: 1,
            extra: false,
            fragile: false,
        };
        GreenNode::new(data, children)
    }

    fn reusable_node(&mut self, position: Length, state: StateId) -> Option<(GreenNode, StateId)> {
        let table = self.table;
        let candidates = self.reuse.as_mut()?.nodes_at(position.bytes);
        candidates.into_iter().find_map(|node| {
            if node.parse_state() != state {
                return None;
            }
            let next = table.goto(state, node.symbol())?;
            Some((node.clone(), next))
        })
    }

    /// Lexes at `position`, remembering the result per lex mode so forked
    /// heads share their tokens.
    fn token_at(
        &mut self,
        position: Length,
        mode: Mode,
    ) -> Result<Lookahead, ResourceExhaustionError> {
        let (key, valid) = match mode {
            Mode::State(state) => {
                (Some(self.table.state(state).lex_mode()), self.table.lex_mode(state))
            }
            Mode::Error => (None, self.table.error_mode()),
        };
        let cached = self.tokens.iter().find(|cached| {
            cached.mode == key && cached.lookahead.token.start.bytes == position.bytes
        });
        if let Some(cached) = cached {
            return Ok(cached.lookahead.clone());
        }

        let token = self.lexer.lex(position, valid);
        self.stats.lexed_bytes += u64::from(u32::from(token.size.bytes));
        self.budget.check(&self.stats)?;

        let lookahead = Lookahead { token, leaf: self.leaf(&token) };
        self.tokens.push(CachedToken { mode: key, lookahead: lookahead.clone() });
        Ok(lookahead)
    }

    /// Turns a token into a leaf, sharing the old tree's leaf when the token
    /// came out identical.
    fn leaf(&mut self, token: &Token) -> GreenLeaf {
        let data = LeafData {
            extra: token.is_extra,
            error: token.is_error,
            ..LeafData::new(token.symbol, token.size, token.lookahead_bytes)
        };
        let old = self.reuse.as_mut().and_then(|reuse| reuse.leaf_at(token.start.bytes));
        match old {
            Some(old) if *old.data() == data => {
                self.stats.reused_leaves += 1;
                old.clone()
            }
            _ => GreenLeaf::new(data),
        }
    }

    fn count_operation(&mut self) -> Result<(), ResourceExhaustionError> {
        self.stats.operations += 1;
        self.budget.check(&self.stats)
    }
}

/// Bytes past the end of `children` that influenced the node built from
/// them: the children's own lookahead and the token that triggered the
/// reduction.
fn lookahead_bytes(start: TextSize, children: &[Green], lookahead: &Token) -> u32 {
    let mut end = start;
    let mut furthest = lookahead.end().bytes + TextSize::new(lookahead.lookahead_bytes);
    for child in children {
        end += child.size().bytes;
        furthest = furthest.max(end + TextSize::new(child.lookahead_bytes()));
    }
    u32::from(furthest).saturating_sub(u32::from(end))
}
