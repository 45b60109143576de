//! Persistent parse stacks.
//!
//! Every entry points at the entry below it, so forked heads share their
//! common prefix. Entries are never removed during a parse.

use std::cmp::Ordering;
use std::ops::Index;

use arbor_grammar::{ProductionId, StateId};
use arbor_tree::{Green, GreenRef, Length};
use la_arena::{Arena, Idx};

pub(crate) type EntryId = Idx<Entry>;

pub(crate) struct Entry {
    pub(crate) state: StateId,
    /// `None` only for the bottom entry.
    pub(crate) subtree: Option<Green>,
    pub(crate) prev: Option<EntryId>,
    /// End of this entry's subtree in the text.
    pub(crate) position: Length,
    pub(crate) depth: u32,
    pub(crate) error_cost: u32,
    pub(crate) dynamic_precedence: i32,
}

impl Entry {
    pub(crate) fn is_extra(&self) -> bool {
        self.subtree.as_ref().is_some_and(Green::is_extra)
    }
}

/// Entries removed by a reduction.
pub(crate) struct Popped {
    /// Entry the reduced node is pushed onto.
    pub(crate) below: EntryId,
    pub(crate) children: Vec<Green>,
    /// Extras that followed the last child; they are pushed back above the
    /// new node.
    pub(crate) trailing: Vec<Green>,
}

pub(crate) struct Stack {
    entries: Arena<Entry>,
}

impl Stack {
    pub(crate) fn new(start: StateId) -> (Self, EntryId) {
        let mut entries = Arena::new();
        let base = entries.alloc(Entry {
            state: start,
            subtree: None,
            prev: None,
            position: Length::ZERO,
            depth: 0,
            error_cost: 0,
            dynamic_precedence: 0,
        });
        (Self { entries }, base)
    }

    pub(crate) fn push(&mut self, prev: EntryId, state: StateId, subtree: Green) -> EntryId {
        let below = &self.entries[prev];
        let entry = Entry {
            state,
            prev: Some(prev),
            position: below.position + subtree.size(),
            depth: below.depth + 1,
            error_cost: below.error_cost + subtree.error_cost(),
            dynamic_precedence: below.dynamic_precedence + subtree.dynamic_precedence(),
            subtree: Some(subtree),
        };
        self.entries.alloc(entry)
    }

    /// Pops `count` non-extra entries, keeping the extras between them.
    pub(crate) fn pop(&self, top: EntryId, count: usize) -> Option<Popped> {
        let mut entry = top;
        let mut trailing = Vec::new();
        while self.entries[entry].is_extra() {
            trailing.extend(self.entries[entry].subtree.clone());
            entry = self.entries[entry].prev?;
        }

        let mut children = Vec::with_capacity(count);
        let mut remaining = count;
        while remaining > 0 {
            let current = &self.entries[entry];
            let subtree = current.subtree.clone()?;
            if !subtree.is_extra() {
                remaining -= 1;
            }
            children.push(subtree);
            entry = current.prev?;
        }

        children.reverse();
        trailing.reverse();
        Some(Popped { below: entry, children, trailing })
    }

    /// Entries from the bottom of the stack up to `top`.
    pub(crate) fn path(&self, top: EntryId) -> Vec<EntryId> {
        let mut path = Vec::with_capacity(self.entries[top].depth as usize + 1);
        let mut entry = Some(top);
        while let Some(id) = entry {
            path.push(id);
            entry = self.entries[id].prev;
        }
        path.reverse();
        path
    }

    /// Subtrees from the bottom of the stack up to `top`.
    pub(crate) fn subtrees(&self, top: EntryId) -> Vec<Green> {
        self.path(top).into_iter().filter_map(|id| self.entries[id].subtree.clone()).collect()
    }

    /// States of the bottom entry and of every non-extra entry, bottom first.
    pub(crate) fn states(&self, top: EntryId) -> Vec<StateId> {
        self.path(top)
            .into_iter()
            .map(|id| &self.entries[id])
            .filter(|entry| !entry.is_extra())
            .map(|entry| entry.state)
            .collect()
    }

    /// Whether both heads are at the same position with the same states all
    /// the way down.
    pub(crate) fn same_states(&self, a: EntryId, b: EntryId) -> bool {
        let (mut a, mut b) = (Some(a), Some(b));
        loop {
            match (a, b) {
                (Some(x), Some(y)) if x == y => return true,
                (Some(x), Some(y)) => {
                    let (x, y) = (&self.entries[x], &self.entries[y]);
                    if x.state != y.state || x.position != y.position || x.depth != y.depth {
                        return false;
                    }
                    a = x.prev;
                    b = y.prev;
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }

    /// Orders two heads by preference; `Less` means `a` is preferred.
    ///
    /// Lower error cost wins, then higher dynamic precedence, then the parse
    /// whose productions, read in preorder, were declared first.
    pub(crate) fn compare(&self, a: EntryId, b: EntryId) -> Ordering {
        let (x, y) = (&self.entries[a], &self.entries[b]);
        x.error_cost
            .cmp(&y.error_cost)
            .then(y.dynamic_precedence.cmp(&x.dynamic_precedence))
            .then_with(|| {
                let (a, b) = self.divergence(a, b);
                productions(&a).cmp(&productions(&b))
            })
    }

    /// Subtrees of both stacks above their shared prefix, bottom first.
    fn divergence(&self, a: EntryId, b: EntryId) -> (Vec<Green>, Vec<Green>) {
        let (mut a, mut b) = (Some(a), Some(b));
        let (mut left, mut right) = (Vec::new(), Vec::new());
        loop {
            match (a, b) {
                (Some(x), Some(y)) if x == y => break,
                (Some(x), Some(y)) => {
                    let (depth_x, depth_y) = (self.entries[x].depth, self.entries[y].depth);
                    if depth_x >= depth_y {
                        left.extend(self.entries[x].subtree.clone());
                        a = self.entries[x].prev;
                    }
                    if depth_y >= depth_x {
                        right.extend(self.entries[y].subtree.clone());
                        b = self.entries[y].prev;
                    }
                }
                (Some(x), None) => {
                    left.extend(self.entries[x].subtree.clone());
                    a = self.entries[x].prev;
                }
                (None, Some(y)) => {
                    right.extend(self.entries[y].subtree.clone());
                    b = self.entries[y].prev;
                }
                (None, None) => break,
            }
        }
        left.reverse();
        right.reverse();
        (left, right)
    }
}

impl Index<EntryId> for Stack {
    type Output = Entry;

    fn index(&self, id: EntryId) -> &Entry {
        &self.entries[id]
    }
}

/// Production ids of every node in `subtrees`, in preorder.
fn productions(subtrees: &[Green]) -> Vec<ProductionId> {
    let mut out = Vec::new();
    let mut stack: Vec<&Green> = subtrees.iter().rev().collect();
    while let Some(subtree) = stack.pop() {
        if let GreenRef::Node(node) = subtree.view() {
            out.extend(node.production());
            stack.extend(node.children().iter().rev());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use arbor_grammar::SymbolId;
    use arbor_tree::{GreenLeaf, GreenNode, LeafData, NodeData, NodeOrToken};

    use super::*;

    fn leaf(text: &str, extra: bool) -> Green {
        let size = Length::of(text.as_bytes());
        let data = LeafData { extra, ..LeafData::new(SymbolId::new(2), size, 1) };
        NodeOrToken::Token(GreenLeaf::new(data))
    }

    fn node(production: u16, dynamic_precedence: i32) -> Green {
        let data = NodeData {
            symbol: SymbolId::new(5),
            production: Some(ProductionId::new(production)),
            parse_state: StateId::new(0),
            dynamic_precedence,
            lookahead_bytes: 1,
            extra: false,
            fragile: false,
        };
        NodeOrToken::Node(GreenNode::new(data, vec![leaf("x", false)]))
    }

    #[test]
    fn pop_keeps_inner_extras_and_returns_trailing_ones() {
        let (mut stack, base) = Stack::new(StateId::new(0));
        let state = StateId::new(1);
        let mut top = stack.push(base, state, leaf(" ", true));
        top = stack.push(top, state, leaf("a", false));
        top = stack.push(top, state, leaf(" ", true));
        top = stack.push(top, state, leaf("b", false));
        top = stack.push(top, state, leaf("  ", true));
        assert_eq!(stack[top].position, Length::of(b" a b  "));

        let popped = stack.pop(top, 2).unwrap();
        assert_eq!(popped.children.len(), 3);
        assert_eq!(popped.trailing.len(), 1);
        assert_eq!(stack[popped.below].position, Length::of(b" "));
        assert_eq!(stack.states(top).len(), 3);
    }

    #[test]
    fn heads_are_ordered_by_preference() {
        let (mut stack, base) = Stack::new(StateId::new(0));
        let state = StateId::new(1);
        let plain = stack.push(base, state, node(3, 0));
        let preferred = stack.push(base, state, node(4, 1));
        let earlier = stack.push(base, state, node(2, 0));

        assert!(stack.same_states(plain, preferred));
        assert_eq!(stack.compare(preferred, plain), Ordering::Less);
        assert_eq!(stack.compare(earlier, plain), Ordering::Less);
        assert_eq!(stack.compare(plain, plain), Ordering::Equal);

        let deeper = stack.push(plain, state, leaf("y", false));
        assert!(!stack.same_states(plain, deeper));
    }
}
