use std::mem;

use arbor_grammar::FieldId;

use crate::green::{Green, GreenRef};
use crate::syntax::{Children, SyntaxNode};
use crate::Length;

/// Preorder walk event for nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkEvent<'a> {
    Enter(SyntaxNode<'a>),
    Leave(SyntaxNode<'a>),
}

/// Preorder traversal over visible nodes.
pub struct Preorder<'a> {
    start: SyntaxNode<'a>,
    stack: Vec<(SyntaxNode<'a>, Children<'a>)>,
    prev: Option<WalkEvent<'a>>,
    skip_subtree: bool,
    done: bool,
}

impl<'a> Preorder<'a> {
    pub(crate) fn new(start: SyntaxNode<'a>) -> Self {
        Self { start, stack: Vec::new(), prev: None, skip_subtree: false, done: false }
    }

    /// Skips the children of the node that was just entered.
    pub fn skip_subtree(&mut self) {
        self.skip_subtree = true;
    }
}

impl<'a> Iterator for Preorder<'a> {
    type Item = WalkEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let event = match self.prev.take() {
            None => WalkEvent::Enter(self.start),
            Some(WalkEvent::Enter(node)) => {
                let skip = mem::take(&mut self.skip_subtree);
                let mut children = node.children();
                match children.next() {
                    Some(child) if !skip => {
                        self.stack.push((node, children));
                        WalkEvent::Enter(child)
                    }
                    _ => WalkEvent::Leave(node),
                }
            }
            Some(WalkEvent::Leave(_)) => {
                let Some((parent, siblings)) = self.stack.last_mut() else {
                    self.done = true;
                    return None;
                };
                match siblings.next() {
                    Some(sibling) => WalkEvent::Enter(sibling),
                    None => {
                        let parent = *parent;
                        self.stack.pop();
                        WalkEvent::Leave(parent)
                    }
                }
            }
        };

        self.prev = Some(event);
        Some(event)
    }
}

struct CursorFrame<'a> {
    parent: SyntaxNode<'a>,
    siblings: Vec<(SyntaxNode<'a>, Option<FieldId>)>,
    index: usize,
}

/// Stateful walker that remembers the path from its starting node, so moving
/// back up is constant time.
pub struct TreeCursor<'a> {
    node: SyntaxNode<'a>,
    stack: Vec<CursorFrame<'a>>,
}

impl<'a> TreeCursor<'a> {
    pub(crate) fn new(node: SyntaxNode<'a>) -> Self {
        Self { node, stack: Vec::new() }
    }

    pub fn node(&self) -> SyntaxNode<'a> {
        self.node
    }

    /// Number of moves down from the starting node.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Field of the current node within its parent.
    pub fn field_name(&self) -> Option<&'a str> {
        let frame = self.stack.last()?;
        let field = frame.siblings[frame.index].1?;
        Some(self.node.tree().language().table().field_name(field))
    }

    pub fn goto_first_child(&mut self) -> bool {
        let siblings: Vec<_> = self.node.children_with_fields().collect();
        let Some(&(first, _)) = siblings.first() else {
            return false;
        };
        self.stack.push(CursorFrame { parent: self.node, siblings, index: 0 });
        self.node = first;
        true
    }

    /// Moves to the first child that ends after `byte`, returning its index.
    pub fn goto_first_child_for_byte(&mut self, byte: u32) -> Option<usize> {
        let siblings: Vec<_> = self.node.children_with_fields().collect();
        let index = siblings.iter().position(|(child, _)| u32::from(child.end_byte()) > byte)?;
        let child = siblings[index].0;
        self.stack.push(CursorFrame { parent: self.node, siblings, index });
        self.node = child;
        Some(index)
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        self.step_sibling(|index, len| (index + 1 < len).then_some(index + 1))
    }

    pub fn goto_prev_sibling(&mut self) -> bool {
        self.step_sibling(|index, _| index.checked_sub(1))
    }

    fn step_sibling(&mut self, step: impl FnOnce(usize, usize) -> Option<usize>) -> bool {
        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        match step(frame.index, frame.siblings.len()) {
            Some(index) => {
                frame.index = index;
                self.node = frame.siblings[index].0;
                true
            }
            None => false,
        }
    }

    pub fn goto_parent(&mut self) -> bool {
        match self.stack.pop() {
            Some(frame) => {
                self.node = frame.parent;
                true
            }
            None => false,
        }
    }
}

/// Iterator over every leaf below a node in source order.
pub struct Leaves<'a> {
    node: SyntaxNode<'a>,
    stack: Vec<(std::slice::Iter<'a, Green>, Length)>,
    /// Set when the walk starts on a leaf.
    single: Option<SyntaxNode<'a>>,
}

impl<'a> Leaves<'a> {
    pub(crate) fn new(node: SyntaxNode<'a>) -> Self {
        match node.green() {
            GreenRef::Node(green) => Self {
                node,
                stack: vec![(green.children().iter(), node.start())],
                single: None,
            },
            GreenRef::Token(_) => Self { node, stack: Vec::new(), single: Some(node) },
        }
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = SyntaxNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(leaf) = self.single.take() {
            return Some(leaf);
        }
        loop {
            let (children, offset) = self.stack.last_mut()?;
            let Some(child) = children.next() else {
                self.stack.pop();
                continue;
            };
            let start = *offset;
            *offset += child.size();
            match child.view() {
                GreenRef::Node(node) => self.stack.push((node.children().iter(), start)),
                leaf @ GreenRef::Token(_) => {
                    return Some(SyntaxNode::from_parts(self.node.tree(), leaf, start));
                }
            }
        }
    }
}
