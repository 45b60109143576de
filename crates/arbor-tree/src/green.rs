use std::sync::LazyLock;

use arbor_grammar::{ProductionId, StateId, SymbolId};
use triomphe::{Arc, ThinArc};

use crate::{Length, NodeOrToken};

/// Cost charged for a zero-width token invented by error recovery.
pub const MISSING_COST: u32 = 110;
/// Cost charged for each subtree or token swallowed by an `ERROR` node.
pub const ERROR_COST: u32 = 100;

pub type Green = NodeOrToken<GreenNode, GreenLeaf>;
pub type GreenRef<'a> = NodeOrToken<&'a GreenNode, &'a GreenLeaf>;

impl Green {
    pub fn view(&self) -> GreenRef<'_> {
        match self {
            NodeOrToken::Node(node) => NodeOrToken::Node(node),
            NodeOrToken::Token(leaf) => NodeOrToken::Token(leaf),
        }
    }

    pub fn symbol(&self) -> SymbolId {
        self.view().symbol()
    }

    pub fn size(&self) -> Length {
        self.view().size()
    }

    pub fn lookahead_bytes(&self) -> u32 {
        self.view().lookahead_bytes()
    }

    pub fn is_extra(&self) -> bool {
        self.view().is_extra()
    }

    pub fn has_error(&self) -> bool {
        self.view().has_error()
    }

    pub fn is_fragile(&self) -> bool {
        self.view().is_fragile()
    }

    pub fn error_cost(&self) -> u32 {
        self.view().error_cost()
    }

    pub fn dynamic_precedence(&self) -> i32 {
        self.view().dynamic_precedence()
    }

    /// Whether both values are the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.view().ptr() == other.view().ptr()
    }
}

impl<'a> GreenRef<'a> {
    pub fn symbol(self) -> SymbolId {
        match self {
            NodeOrToken::Node(node) => node.symbol(),
            NodeOrToken::Token(leaf) => leaf.symbol(),
        }
    }

    pub fn size(self) -> Length {
        match self {
            NodeOrToken::Node(node) => node.size(),
            NodeOrToken::Token(leaf) => leaf.size(),
        }
    }

    pub fn lookahead_bytes(self) -> u32 {
        match self {
            NodeOrToken::Node(node) => node.lookahead_bytes(),
            NodeOrToken::Token(leaf) => leaf.lookahead_bytes(),
        }
    }

    pub fn is_extra(self) -> bool {
        match self {
            NodeOrToken::Node(node) => node.is_extra(),
            NodeOrToken::Token(leaf) => leaf.is_extra(),
        }
    }

    pub fn has_error(self) -> bool {
        match self {
            NodeOrToken::Node(node) => node.has_error(),
            NodeOrToken::Token(leaf) => leaf.is_error() || leaf.is_missing(),
        }
    }

    /// Leaves are never fragile: a re-lexed token is compared, not trusted.
    pub fn is_fragile(self) -> bool {
        match self {
            NodeOrToken::Node(node) => node.is_fragile(),
            NodeOrToken::Token(_) => false,
        }
    }

    pub fn error_cost(self) -> u32 {
        match self {
            NodeOrToken::Node(node) => node.error_cost(),
            NodeOrToken::Token(leaf) => leaf.error_cost(),
        }
    }

    pub fn dynamic_precedence(self) -> i32 {
        match self {
            NodeOrToken::Node(node) => node.dynamic_precedence(),
            NodeOrToken::Token(_) => 0,
        }
    }

    pub fn children(self) -> &'a [Green] {
        match self {
            NodeOrToken::Node(node) => node.children(),
            NodeOrToken::Token(_) => &[],
        }
    }

    pub fn ptr(self) -> *const () {
        match self {
            NodeOrToken::Node(node) => node.ptr(),
            NodeOrToken::Token(leaf) => leaf.ptr(),
        }
    }
}

/// Token stored in the tree.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LeafData {
    pub symbol: SymbolId,
    pub size: Length,
    /// Bytes past the end of the token that the lexer examined.
    pub lookahead_bytes: u32,
    pub extra: bool,
    /// Zero-width token inserted by error recovery.
    pub missing: bool,
    /// Characters no token of the grammar matched.
    pub error: bool,
}

impl LeafData {
    pub fn new(symbol: SymbolId, size: Length, lookahead_bytes: u32) -> Self {
        Self { symbol, size, lookahead_bytes, extra: false, missing: false, error: false }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GreenLeaf(Arc<LeafData>);

impl GreenLeaf {
    pub fn new(data: LeafData) -> Self {
        Self(Arc::new(data))
    }

    pub fn missing(symbol: SymbolId) -> Self {
        Self::new(LeafData { missing: true, ..LeafData::new(symbol, Length::ZERO, 0) })
    }

    pub fn data(&self) -> &LeafData {
        &self.0
    }

    pub fn symbol(&self) -> SymbolId {
        self.0.symbol
    }

    pub fn size(&self) -> Length {
        self.0.size
    }

    pub fn lookahead_bytes(&self) -> u32 {
        self.0.lookahead_bytes
    }

    pub fn is_extra(&self) -> bool {
        self.0.extra
    }

    pub fn is_missing(&self) -> bool {
        self.0.missing
    }

    pub fn is_error(&self) -> bool {
        self.0.error
    }

    pub fn error_cost(&self) -> u32 {
        if self.0.missing {
            MISSING_COST
        } else if self.0.error {
            ERROR_COST + u32::from(self.0.size.bytes)
        } else {
            0
        }
    }

    pub fn ptr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Values supplied by the parser when it creates an interior node.
///
/// Size, error cost and the error flag are derived from the children.
#[derive(Clone, Copy, Debug)]
pub struct NodeData {
    pub symbol: SymbolId,
    /// `None` for nodes built by error recovery.
    pub production: Option<ProductionId>,
    /// State on top of the stack when the node's first child was pushed.
    pub parse_state: StateId,
    /// The node's own dynamic precedence; the children's are added to it.
    pub dynamic_precedence: i32,
    pub lookahead_bytes: u32,
    pub extra: bool,
    /// Built while the parse was ambiguous; must not be reused as a whole.
    pub fragile: bool,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct NodeHeader {
    symbol: SymbolId,
    production: Option<ProductionId>,
    size: Length,
    lookahead_bytes: u32,
    parse_state: StateId,
    dynamic_precedence: i32,
    error_cost: u32,
    extra: bool,
    has_error: bool,
    fragile: bool,
}

#[derive(Clone)]
pub struct GreenNode(ThinArc<NodeHeader, Green>);

impl GreenNode {
    pub fn new(data: NodeData, children: Vec<Green>) -> Self {
        let is_error = data.symbol == SymbolId::ERROR;
        let mut header = NodeHeader {
            symbol: data.symbol,
            production: data.production,
            size: Length::ZERO,
            lookahead_bytes: data.lookahead_bytes,
            parse_state: data.parse_state,
            dynamic_precedence: data.dynamic_precedence,
            error_cost: if is_error { ERROR_COST } else { 0 },
            extra: data.extra,
            has_error: is_error,
            fragile: data.fragile,
        };
        for child in &children {
            let child = child.view();
            header.size += child.size();
            header.dynamic_precedence += child.dynamic_precedence();
            header.error_cost += child.error_cost();
            header.has_error |= child.has_error();
            header.fragile |= child.is_fragile();
        }
        if is_error {
            header.error_cost += u32::from(header.size.bytes);
        }
        Self(ThinArc::from_header_and_iter(header, children.into_iter()))
    }

    fn header(&self) -> &NodeHeader {
        &self.0.header.header
    }

    pub fn symbol(&self) -> SymbolId {
        self.header().symbol
    }

    pub fn production(&self) -> Option<ProductionId> {
        self.header().production
    }

    pub fn size(&self) -> Length {
        self.header().size
    }

    pub fn lookahead_bytes(&self) -> u32 {
        self.header().lookahead_bytes
    }

    pub fn parse_state(&self) -> StateId {
        self.header().parse_state
    }

    pub fn dynamic_precedence(&self) -> i32 {
        self.header().dynamic_precedence
    }

    pub fn error_cost(&self) -> u32 {
        self.header().error_cost
    }

    pub fn is_extra(&self) -> bool {
        self.header().extra
    }

    pub fn has_error(&self) -> bool {
        self.header().has_error
    }

    pub fn is_fragile(&self) -> bool {
        self.header().fragile
    }

    pub fn children(&self) -> &[Green] {
        &self.0.slice
    }

    pub fn ptr(&self) -> *const () {
        let raw: *const _ = &*self.0;
        raw.cast()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.ptr() == other.ptr()
    }
}

/// Stands in for children moved out of a node that is being dropped.
static DETACHED: LazyLock<GreenLeaf> = LazyLock::new(|| GreenLeaf::missing(SymbolId::ERROR));

impl GreenNode {
    /// Moves every child node only `self` refers to into `out`.
    fn detach_unique_children(&mut self, out: &mut Vec<GreenNode>) {
        self.0.with_arc_mut(|arc| {
            let Some(inner) = Arc::get_mut(arc) else {
                return;
            };
            for child in inner.slice_mut() {
                let unique =
                    matches!(child, NodeOrToken::Node(node) if ThinArc::strong_count(&node.0) == 1);
                if !unique {
                    continue;
                }
                let detached = NodeOrToken::Token(DETACHED.clone());
                if let NodeOrToken::Node(node) = std::mem::replace(child, detached) {
                    out.push(node);
                }
            }
        });
    }
}

// Dropping a deep tree through the generated glue would recurse once per level.
impl Drop for GreenNode {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_unique_children(&mut pending);
        while let Some(mut node) = pending.pop() {
            node.detach_unique_children(&mut pending);
        }
    }
}

impl std::fmt::Debug for GreenNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreenNode")
            .field("symbol", &self.symbol())
            .field("size", &self.size())
            .field("children", &self.children().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(symbol: u16, text: &str) -> Green {
        NodeOrToken::Token(GreenLeaf::new(LeafData::new(
            SymbolId::new(symbol),
            Length::of(text.as_bytes()),
            1,
        )))
    }

    fn node(symbol: SymbolId, children: Vec<Green>) -> GreenNode {
        let data = NodeData {
            symbol,
            production: None,
            parse_state: StateId::new(0),
            dynamic_precedence: 1,
            lookahead_bytes: 0,
            extra: false,
            fragile: false,
        };
        GreenNode::new(data, children)
    }

    #[test]
    fn node_summarises_children() {
        let inner = node(SymbolId::new(5), vec![leaf(2, "ab\n"), leaf(3, "c")]);
        let outer = node(
            SymbolId::new(6),
            vec![
                NodeOrToken::Node(inner.clone()),
                NodeOrToken::Token(GreenLeaf::missing(SymbolId::new(4))),
            ],
        );

        assert_eq!(inner.size(), Length::of(b"ab\nc"));
        assert_eq!(outer.size(), inner.size());
        assert_eq!(outer.dynamic_precedence(), 2);
        assert!(outer.has_error());
        assert!(!inner.has_error());
        assert_eq!(outer.error_cost(), MISSING_COST);
        assert!(outer.children()[0].view().ptr() == inner.ptr());
    }

    #[test]
    fn error_nodes_are_costed_by_size() {
        let error = node(SymbolId::ERROR, vec![leaf(2, "xyz")]);
        assert!(error.has_error());
        assert_eq!(error.error_cost(), ERROR_COST + 3);
    }

    #[test]
    fn leaf_identity() {
        let a = GreenLeaf::new(LeafData::new(SymbolId::new(2), Length::of(b"1"), 1));
        let b = GreenLeaf::new(LeafData::new(SymbolId::new(2), Length::of(b"1"), 1));
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn dropping_a_parent_keeps_shared_children() {
        let shared = node(SymbolId::new(5), vec![leaf(2, "a"), leaf(3, "b")]);
        let mut nested = NodeOrToken::Node(shared.clone());
        for _ in 0..3 {
            nested = NodeOrToken::Node(node(SymbolId::new(6), vec![nested, leaf(2, "c")]));
        }
        drop(nested);

        assert_eq!(shared.children().len(), 2);
        assert_eq!(shared.size(), Length::of(b"ab"));
        assert_eq!(ThinArc::strong_count(&shared.0), 1);
    }
}
