//! Immutable, structurally shared syntax trees.
//!
//! The green layer stores symbols and sizes only, so a subtree that is not
//! touched by an edit is shared verbatim between the old and the new tree.
//! [`SyntaxNode`] handles add absolute positions on the way down.

mod cursor;
mod dump;
mod green;
mod length;
mod syntax;


/// Traversal helpers.
pub use cursor::{Leaves, Preorder, TreeCursor, WalkEvent};
/// Green (position independent) tree layer.
pub use green::{
    ERROR_COST, Green, GreenLeaf, GreenNode, GreenRef, LeafData, MISSING_COST, NodeData,
};
/// Sizes and positions.
pub use length::{Length, Point};
/// Primary syntax tree API types.
pub use syntax::{Children, ChildrenWithFields, NodeOrToken, SyntaxNode, SyntaxTree};
