//! Public syntax tree API: absolute positions over the shared green layer.

use std::fmt;
use std::str::Utf8Error;
use std::sync::Arc;

use arbor_grammar::{FieldId, Language, ProductionId, SymbolId, SymbolMetadata};
use text_size::{TextRange, TextSize};

use crate::cursor::{Leaves, Preorder, TreeCursor};
use crate::green::{Green, GreenNode, GreenRef};
use crate::{Length, Point};

/// Result of one parse: a root node, the grammar it was built with and the
/// text it covers.
///
/// Trees are never mutated. An edit produces a new tree that shares every
/// unchanged subtree with this one.
#[derive(Clone)]
pub struct SyntaxTree {
    root: GreenNode,
    language: Language,
    text: Arc<[u8]>,
    /// Ranges of `text` reported changed since the parse.
    changes: Arc<[TextRange]>,
}

impl SyntaxTree {
    pub fn new(root: GreenNode, language: Language, text: impl Into<Arc<[u8]>>) -> Self {
        Self { root, language, text: text.into(), changes: Vec::new().into() }
    }

    /// Returns a tree that shares everything with this one but records that
    /// `range` of its text has changed. Positions stay those of the parsed
    /// text; nodes the change reaches report [`SyntaxNode::has_changes`].
    #[must_use]
    pub fn with_change(&self, range: TextRange) -> Self {
        let mut changes = self.changes.to_vec();
        changes.push(range);
        Self { changes: changes.into(), ..self.clone() }
    }

    /// Ranges recorded by [`SyntaxTree::with_change`], oldest first.
    pub fn changes(&self) -> &[TextRange] {
        &self.changes
    }

    /// Returns the root syntax node.
    #[inline]
    pub fn root(&self) -> SyntaxNode<'_> {
        SyntaxNode { tree: self, green: GreenRef::Node(&self.root), start: Length::ZERO }
    }

    #[inline]
    pub fn green_root(&self) -> &GreenNode {
        &self.root
    }

    #[inline]
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Returns the full source text for this tree.
    #[inline]
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Returns a cursor positioned on the root.
    pub fn walk(&self) -> TreeCursor<'_> {
        TreeCursor::new(self.root())
    }

    /// Iterates every leaf in source order, hidden ones included.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves::new(self.root())
    }

    /// Whether both trees share the same root allocation.
    pub fn root_ptr_eq(&self, other: &Self) -> bool {
        self.root.ptr_eq(&other.root)
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("language", &self.language.name())
            .field("text_len", &self.text.len())
            .finish_non_exhaustive()
    }
}

/// Node handle tied to the lifetime of the tree.
///
/// Handles are plain values: copying one is free and two handles compare equal
/// when they refer to the same subtree at the same position.
#[derive(Clone, Copy)]
pub struct SyntaxNode<'a> {
    tree: &'a SyntaxTree,
    green: GreenRef<'a>,
    start: Length,
}

impl<'a> SyntaxNode<'a> {
    #[inline]
    pub fn tree(self) -> &'a SyntaxTree {
        self.tree
    }

    #[inline]
    pub fn green(self) -> GreenRef<'a> {
        self.green
    }

    #[inline]
    pub fn symbol(self) -> SymbolId {
        self.green.symbol()
    }

    #[inline]
    fn metadata(self) -> &'a SymbolMetadata {
        self.tree.language.table().symbol_metadata(self.symbol())
    }

    /// Returns the name of this node's symbol.
    #[inline]
    pub fn kind(self) -> &'a str {
        &self.metadata().name
    }

    /// Returns `true` for nodes built from grammar rules rather than literals.
    #[inline]
    pub fn is_named(self) -> bool {
        self.metadata().named
    }

    /// Returns `true` unless the symbol is hidden. The root is always visible.
    #[inline]
    pub fn is_visible(self) -> bool {
        self.is_root() || self.metadata().visible
    }

    #[inline]
    pub fn is_extra(self) -> bool {
        self.green.is_extra()
    }

    /// Returns `true` for zero-width tokens inserted by error recovery.
    #[inline]
    pub fn is_missing(self) -> bool {
        matches!(self.green, GreenRef::Token(leaf) if leaf.is_missing())
    }

    /// Returns `true` for `ERROR` nodes and unrecognised characters.
    #[inline]
    pub fn is_error(self) -> bool {
        self.symbol() == SymbolId::ERROR
    }

    /// Returns `true` if this node or any descendant is an error or missing.
    #[inline]
    pub fn has_error(self) -> bool {
        self.green.has_error()
    }

    /// Whether a recorded change touches the node's text or the bytes after
    /// it that were examined while building it.
    pub fn has_changes(self) -> bool {
        let start = self.start_byte();
        let reach = self.end_byte() + TextSize::new(self.green.lookahead_bytes());
        self.tree.changes.iter().any(|change| start <= change.end() && change.start() <= reach)
    }

    #[inline]
    pub fn is_root(self) -> bool {
        self.green.ptr() == self.tree.root.ptr()
    }

    #[inline]
    pub fn start_byte(self) -> TextSize {
        self.start.bytes
    }

    #[inline]
    pub fn end_byte(self) -> TextSize {
        self.end().bytes
    }

    /// Returns the byte range covered by this node.
    #[inline]
    pub fn byte_range(self) -> TextRange {
        TextRange::new(self.start_byte(), self.end_byte())
    }

    #[inline]
    pub fn start_point(self) -> Point {
        self.start.extent
    }

    #[inline]
    pub fn end_point(self) -> Point {
        self.end().extent
    }

    #[inline]
    fn end(self) -> Length {
        self.start + self.green.size()
    }

    /// Returns the source bytes covered by this node.
    #[inline]
    pub fn text(self) -> &'a [u8] {
        let range: std::ops::Range<usize> = self.byte_range().into();
        &self.tree.text[range]
    }

    #[inline]
    pub fn utf8_text(self) -> Result<&'a str, Utf8Error> {
        std::str::from_utf8(self.text())
    }

    /// Iterates visible children: hidden nodes are replaced by their own
    /// visible children and hidden leaves are skipped.
    #[inline]
    pub fn children(self) -> Children<'a> {
        Children { inner: self.children_with_fields() }
    }

    /// Like [`SyntaxNode::children`], paired with each child's field.
    #[inline]
    pub fn children_with_fields(self) -> ChildrenWithFields<'a> {
        let stack = vec![Frame::new(self.green, self.start, None)];
        ChildrenWithFields { tree: self.tree, stack }
    }

    #[inline]
    pub fn named_children(self) -> impl Iterator<Item = SyntaxNode<'a>> + 'a {
        self.children().filter(|child| child.is_named())
    }

    pub fn child_count(self) -> usize {
        self.children().count()
    }

    pub fn named_child_count(self) -> usize {
        self.named_children().count()
    }

    pub fn child(self, index: usize) -> Option<Self> {
        self.children().nth(index)
    }

    pub fn named_child(self, index: usize) -> Option<Self> {
        self.named_children().nth(index)
    }

    pub fn first_child(self) -> Option<Self> {
        self.children().next()
    }

    /// Returns the first child stored under the field `name`.
    pub fn child_by_field_name(self, name: &str) -> Option<Self> {
        self.children_by_field_name(name).next()
    }

    pub fn children_by_field_name(
        self,
        name: &str,
    ) -> impl Iterator<Item = SyntaxNode<'a>> + use<'a> {
        let field = self.tree.language.table().field_id(name);
        self.children_with_fields()
            .filter(move |(_, child_field)| field.is_some() && *child_field == field)
            .map(|(child, _)| child)
    }

    /// Returns the field name of the visible child at `index`.
    pub fn field_name_for_child(self, index: usize) -> Option<&'a str> {
        let (_, field) = self.children_with_fields().nth(index)?;
        Some(self.tree.language.table().field_name(field?))
    }

    /// Returns the parent node if any.
    ///
    /// Nodes do not store parent links; the parent is found by descending
    /// from the root. Use a [`TreeCursor`] for repeated upward moves.
    pub fn parent(self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        find_parent(self.tree.root(), self)
    }

    /// Returns an iterator of ancestors starting from this node.
    pub fn ancestors(self) -> impl Iterator<Item = SyntaxNode<'a>> {
        std::iter::successors(Some(self), |node| node.parent())
    }

    pub fn next_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        let mut siblings = parent.children().skip_while(|sibling| *sibling != self);
        siblings.next();
        siblings.next()
    }

    pub fn prev_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        parent.children().take_while(|sibling| *sibling != self).last()
    }

    pub fn next_named_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        parent.children().skip_while(|sibling| *sibling != self).skip(1).find(|it| it.is_named())
    }

    pub fn prev_named_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        parent.children().take_while(|sibling| *sibling != self).filter(|it| it.is_named()).last()
    }

    /// Returns the smallest visible descendant covering `start..end`.
    pub fn descendant_for_byte_range(self, start: TextSize, end: TextSize) -> Option<Self> {
        if start > end || start < self.start_byte() || end > self.end_byte() {
            return None;
        }
        let mut node = self;
        'descend: loop {
            for child in node.children() {
                let range = child.byte_range();
                if range.start() > start {
                    break;
                }
                // Only step into an empty child when an empty range was asked for.
                let covers = range.start() <= start && end <= range.end();
                if covers && (!range.is_empty() || start == end) {
                    node = child;
                    continue 'descend;
                }
            }
            return Some(node);
        }
    }

    /// Returns a preorder iterator over visible nodes.
    #[inline]
    pub fn preorder(self) -> Preorder<'a> {
        Preorder::new(self)
    }

    /// Returns a cursor positioned on this node.
    pub fn walk(self) -> TreeCursor<'a> {
        TreeCursor::new(self)
    }

    pub(crate) fn start(self) -> Length {
        self.start
    }

    pub(crate) fn from_parts(tree: &'a SyntaxTree, green: GreenRef<'a>, start: Length) -> Self {
        Self { tree, green, start }
    }
}

impl PartialEq for SyntaxNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.green.ptr() == other.green.ptr() && self.start == other.start
    }
}

impl Eq for SyntaxNode<'_> {}

impl fmt::Debug for SyntaxNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.kind(), self.byte_range())
    }
}

fn find_parent<'a>(root: SyntaxNode<'a>, target: SyntaxNode<'a>) -> Option<SyntaxNode<'a>> {
    let target_range = target.byte_range();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let mut containing = Vec::new();
        for child in node.children() {
            if child == target {
                return Some(node);
            }
            if child.byte_range().contains_range(target_range) {
                containing.push(child);
            }
        }
        stack.extend(containing.into_iter().rev());
    }
    None
}

struct Frame<'a> {
    children: std::slice::Iter<'a, Green>,
    production: Option<ProductionId>,
    offset: Length,
    /// Field of the hidden node this frame flattens, which wins over the
    /// fields of its own production.
    inherited: Option<FieldId>,
    structural_index: usize,
}

impl<'a> Frame<'a> {
    fn new(green: GreenRef<'a>, offset: Length, inherited: Option<FieldId>) -> Self {
        let production = match green {
            GreenRef::Node(node) => node.production(),
            GreenRef::Token(_) => None,
        };
        let children = green.children().iter();
        Self { children, production, offset, inherited, structural_index: 0 }
    }
}

/// Iterator over visible children and their fields.
pub struct ChildrenWithFields<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<Frame<'a>>,
}

impl<'a> Iterator for ChildrenWithFields<'a> {
    type Item = (SyntaxNode<'a>, Option<FieldId>);

    fn next(&mut self) -> Option<Self::Item> {
        let table = self.tree.language.table();
        loop {
            let frame = self.stack.last_mut()?;
            let Some(child) = frame.children.next() else {
                self.stack.pop();
                continue;
            };
            let child = child.view();
            let start = frame.offset;
            frame.offset += child.size();

            let own_field = if child.is_extra() {
                None
            } else {
                let index = frame.structural_index;
                frame.structural_index += 1;
                frame.production.and_then(|production| table.production(production).field(index))
            };
            let field = frame.inherited.or(own_field);

            if table.symbol_metadata(child.symbol()).visible {
                return Some((SyntaxNode { tree: self.tree, green: child, start }, field));
            }
            if let GreenRef::Node(_) = child {
                self.stack.push(Frame::new(child, start, field));
            }
        }
    }
}

/// Iterator over visible children.
pub struct Children<'a> {
    inner: ChildrenWithFields<'a>,
}

impl<'a> Iterator for Children<'a> {
    type Item = SyntaxNode<'a>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(child, _)| child)
    }
}

/// Node-or-token wrapper used throughout the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeOrToken<N, T> {
    Node(N),
    Token(T),
}

impl<N, T> NodeOrToken<N, T> {
    /// Converts into the node variant, if any.
    pub fn into_node(self) -> Option<N> {
        match self {
            NodeOrToken::Node(node) => Some(node),
            NodeOrToken::Token(_) => None,
        }
    }

    /// Converts into the token variant, if any.
    pub fn into_token(self) -> Option<T> {
        match self {
            NodeOrToken::Node(_) => None,
            NodeOrToken::Token(token) => Some(token),
        }
    }

    /// Returns a shared reference to the node, if any.
    pub fn as_node(&self) -> Option<&N> {
        match self {
            NodeOrToken::Node(node) => Some(node),
            NodeOrToken::Token(_) => None,
        }
    }

    /// Returns a shared reference to the token, if any.
    pub fn as_token(&self) -> Option<&T> {
        match self {
            NodeOrToken::Node(_) => None,
            NodeOrToken::Token(token) => Some(token),
        }
    }
}
