//! Running compiled patterns against a tree.

use std::collections::VecDeque;

use arbor_grammar::{FieldId, SymbolId};
use arbor_tree::{Preorder, SyntaxNode, SyntaxTree, WalkEvent};
use text_size::TextRange;

use crate::compile::{Item, ItemKind, NodeKind, Operand, Pattern, Predicate, Quantifier};
use crate::Query;

/// A node captured under a capture name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryCapture<'t> {
    /// Index into [`Query::capture_names`].
    pub index: u32,
    pub node: SyntaxNode<'t>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryMatch<'t> {
    pub pattern_index: usize,
    pub captures: Vec<QueryCapture<'t>>,
}

impl<'t> QueryMatch<'t> {
    pub fn nodes_for_capture_index(
        &self,
        index: u32,
    ) -> impl Iterator<Item = SyntaxNode<'t>> + '_ {
        let captures = self.captures.iter();
        captures.filter(move |capture| capture.index == index).map(|capture| capture.node)
    }
}

type Captures<'t> = Vec<QueryCapture<'t>>;

/// Lazy sequence of matches in preorder of the matched node, then in pattern
/// order.
pub struct QueryMatches<'t> {
    tree: &'t SyntaxTree,
    query: &'t Query,
    range: Option<TextRange>,
    walk: Option<Preorder<'t>>,
    pending: VecDeque<QueryMatch<'t>>,
}

impl<'t> QueryMatches<'t> {
    pub(crate) fn new(tree: &'t SyntaxTree, query: &'t Query) -> Self {
        let mut matches = Self { tree, query, range: None, walk: None, pending: VecDeque::new() };
        matches.restart();
        matches
    }

    /// Only reports nodes that intersect `range`.
    #[must_use]
    pub fn with_byte_range(mut self, range: TextRange) -> Self {
        self.range = Some(range);
        self.restart();
        self
    }

    /// Starts over from the root.
    pub fn restart(&mut self) {
        self.pending.clear();
        self.walk = if self.tree.language().ptr_eq(self.query.language()) {
            Some(self.tree.root().preorder())
        } else {
            tracing::warn!(
                tree = self.tree.language().name(),
                query = self.query.language().name(),
                "query and tree use different languages"
            );
            None
        };
    }

    fn intersects(&self, node: SyntaxNode<'_>) -> bool {
        let Some(range) = self.range else {
            return true;
        };
        let node_range = node.byte_range();
        if node_range.is_empty() {
            return range.contains_inclusive(node_range.start());
        }
        node_range.start() < range.end() && node_range.end() > range.start()
    }

    fn match_node(&mut self, node: SyntaxNode<'t>) {
        for (pattern_index, pattern) in self.query.patterns.iter().enumerate() {
            let mut seen: Vec<Captures<'t>> = Vec::new();
            for captures in match_item(&pattern.item, node, None) {
                if !predicates_hold(pattern, &captures) || seen.contains(&captures) {
                    continue;
                }
                seen.push(captures.clone());
                self.pending.push_back(QueryMatch { pattern_index, captures });
            }
        }
    }
}

impl<'t> Iterator for QueryMatches<'t> {
    type Item = QueryMatch<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(found) = self.pending.pop_front() {
                return Some(found);
            }
            let event = self.walk.as_mut()?.next();
            let node = match event {
                Some(WalkEvent::Enter(node)) => node,
                Some(WalkEvent::Leave(_)) => continue,
                None => {
                    self.walk = None;
                    return None;
                }
            };
            if !self.intersects(node) {
                if let Some(walk) = self.walk.as_mut() {
                    walk.skip_subtree();
                }
                continue;
            }
            self.match_node(node);
        }
    }
}

/// Every capture list with which `item` matches `node`.
fn match_item<'t>(item: &Item, node: SyntaxNode<'t>, field: Option<FieldId>) -> Vec<Captures<'t>> {
    if item.field.is_some() && item.field != field {
        return Vec::new();
    }

    let inner = match &item.kind {
        ItemKind::Node { kind, children } => {
            if !kind_matches(kind, node) {
                return Vec::new();
            }
            match_children(children, node)
        }
        ItemKind::Alternation(alternatives) => {
            let alternatives = alternatives.iter();
            alternatives.flat_map(|alternative| match_item(alternative, node, field)).collect()
        }
    };

    if item.captures.is_empty() {
        return inner;
    }
    inner
        .into_iter()
        .map(|rest| {
            let mut captures: Captures<'t> =
                item.captures.iter().map(|&index| QueryCapture { index, node }).collect();
            captures.extend(rest);
            captures
        })
        .collect()
}

fn kind_matches(kind: &NodeKind, node: SyntaxNode<'_>) -> bool {
    match kind {
        NodeKind::Any => true,
        NodeKind::Named => node.is_named(),
        NodeKind::Symbols(symbols) => symbols.contains(&node.symbol()),
        NodeKind::Error => node.symbol() == SymbolId::ERROR,
        NodeKind::Missing(symbols) => {
            node.is_missing()
                && symbols.as_ref().is_none_or(|symbols| symbols.contains(&node.symbol()))
        }
    }
}

/// Matches `items` against an ordered subsequence of the visible children.
///
/// A `*` or `+` item takes every child it matches between its neighbours. A
/// `?` item either takes one child, like an unquantified item, or none when
/// the next item comes before all of its candidates.
fn match_children<'t>(items: &[Item], parent: SyntaxNode<'t>) -> Vec<Captures<'t>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }

    let children: Vec<_> = parent.children_with_fields().collect();
    let table: Vec<Vec<Vec<Captures<'t>>>> = items
        .iter()
        .map(|item| children.iter().map(|&(child, field)| match_item(item, child, field)).collect())
        .collect();

    let mut sequence = Sequence { items, table: &table, len: children.len(), out: Vec::new() };
    sequence.step(0, 0, children.len(), Vec::new());
    sequence.out
}

struct Sequence<'a, 't> {
    items: &'a [Item],
    /// `table[item][child]`: capture lists with which the item matches the child.
    table: &'a [Vec<Vec<Captures<'t>>>],
    len: usize,
    out: Vec<Captures<'t>>,
}

impl<'t> Sequence<'_, 't> {
    /// Places `items[index..]` at children `from..`; no child at or past
    /// `bound` may start the next item.
    fn step(&mut self, index: usize, from: usize, bound: usize, acc: Captures<'t>) {
        if index == self.items.len() {
            if bound == self.len {
                self.out.push(acc);
            }
            return;
        }

        let table = self.table;
        let row = &table[index];
        let hits: Vec<usize> = (from..self.len).filter(|&child| !row[child].is_empty()).collect();

        let quantifier = self.items[index].quantifier;
        if matches!(quantifier, Quantifier::ZeroOrOne | Quantifier::ZeroOrMore) {
            let bound = hits.first().map_or(bound, |&first| bound.min(first));
            self.step(index + 1, from, bound, acc.clone());
        }

        match quantifier {
            Quantifier::One | Quantifier::ZeroOrOne => {
                for &child in hits.iter().take_while(|&&child| child < bound) {
                    for captures in &row[child] {
                        let mut next = acc.clone();
                        next.extend(captures.iter().copied());
                        self.step(index + 1, child + 1, self.len, next);
                    }
                }
            }
            Quantifier::ZeroOrMore | Quantifier::OneOrMore => {
                for taken in 1..=hits.len() {
                    let last = hits[taken - 1];
                    if last >= bound {
                        break;
                    }
                    let next_bound = hits.get(taken).copied().unwrap_or(self.len);
                    for captures in runs(row, &hits[..taken]) {
                        let mut next = acc.clone();
                        next.extend(captures);
                        self.step(index + 1, last + 1, next_bound, next);
                    }
                }
            }
        }
    }
}

/// Every way of matching one item against each of `children` in turn.
fn runs<'t>(row: &[Vec<Captures<'t>>], children: &[usize]) -> Vec<Captures<'t>> {
    children.iter().fold(vec![Vec::new()], |prefixes, &child| {
        prefixes
            .iter()
            .flat_map(|prefix| {
                row[child].iter().map(move |captures| {
                    let mut next = prefix.clone();
                    next.extend(captures.iter().copied());
                    next
                })
            })
            .collect()
    })
}

fn predicates_hold(pattern: &Pattern, captures: &[QueryCapture<'_>]) -> bool {
    pattern.predicates.iter().all(|predicate| match predicate {
        Predicate::Eq { capture, operand, negated } => {
            let left = texts(captures, *capture);
            let right: Vec<&[u8]> = match operand {
                Operand::Capture(other) => texts(captures, *other),
                Operand::Text(text) => vec![text.as_bytes()],
            };
            left.iter().all(|l| right.iter().all(|r| (l == r) != *negated))
        }
    })
}

fn texts<'t>(captures: &[QueryCapture<'t>], index: u32) -> Vec<&'t [u8]> {
    let captures = captures.iter().filter(|capture| capture.index == index);
    captures.map(|capture| capture.node.text()).collect()
}
