//! Subtrees of the previous tree that an incremental parse may splice in.
//!
//! The old tree is read through a cursor that only moves forward with the
//! parse, so a reparse visits the old nodes along its way and no others.

use arbor_tree::{Green, GreenLeaf, GreenNode, GreenRef};
use text_size::TextSize;

use crate::InputEdit;

struct Frame<'t> {
    node: &'t GreenNode,
    /// Child the cursor is on; `children().len()` once past the last one.
    index: usize,
    /// Old start offset of that child.
    start: TextSize,
}

pub(crate) struct Reuse<'t> {
    edit: InputEdit,
    root: &'t GreenNode,
    frames: Vec<Frame<'t>>,
}

impl<'t> Reuse<'t> {
    pub(crate) fn new(root: &'t GreenNode, edit: &InputEdit) -> Self {
        let frames = vec![Frame { node: root, index: 0, start: TextSize::new(0) }];
        Self { edit: *edit, root, frames }
    }

    /// Nodes starting at `position` of the new text that the edit cannot have
    /// influenced, outermost first. The root itself is never a candidate.
    pub(crate) fn nodes_at(&mut self, position: TextSize) -> Vec<&'t GreenNode> {
        let Some(old) = self.edit.old_offset(position) else {
            return Vec::new();
        };
        let mut nodes = Vec::new();
        let mut current = self.seek(old);
        while let Some(GreenRef::Node(node)) = current {
            let size = node.size().bytes;
            if is_reusable(node) && self.unaffected(old, size, node.lookahead_bytes()) {
                nodes.push(node);
            }
            current = node.children().first().map(Green::view);
        }
        nodes
    }

    /// The old leaf starting at `position` of the new text, if the edit left
    /// its text alone.
    pub(crate) fn leaf_at(&mut self, position: TextSize) -> Option<&'t GreenLeaf> {
        let old = self.edit.old_offset(position)?;
        let mut current = self.seek(old)?;
        loop {
            match current {
                GreenRef::Node(node) => current = node.children().first()?.view(),
                GreenRef::Token(leaf) => {
                    return self.unaffected(old, leaf.size().bytes, 0).then_some(leaf);
                }
            }
        }
    }

    /// Whether the edit missed `start..start + size` and the `lookahead`
    /// bytes after it.
    fn unaffected(&self, start: TextSize, size: TextSize, lookahead: u32) -> bool {
        start >= self.edit.old_end_byte
            || start + size + TextSize::new(lookahead) <= self.edit.start_byte
    }

    /// Moves the cursor to the outermost subtree starting at or after the old
    /// offset `target`, and returns it if it starts exactly there.
    ///
    /// Asking for an offset behind the cursor starts over from the root.
    fn seek(&mut self, target: TextSize) -> Option<GreenRef<'t>> {
        if self.frames.last().is_none_or(|frame| frame.start > target) {
            self.frames.clear();
            self.frames.push(Frame { node: self.root, index: 0, start: TextSize::new(0) });
        }

        loop {
            let depth = self.frames.len();
            let frame = self.frames.last_mut()?;
            let node = frame.node;
            let Some(child) = node.children().get(frame.index) else {
                if depth == 1 {
                    return None;
                }
                let done = self.frames.pop()?;
                let parent = self.frames.last_mut()?;
                parent.index += 1;
                parent.start = done.start;
                continue;
            };

            let end = frame.start + child.size().bytes;
            if end <= target {
                frame.index += 1;
                frame.start = end;
                continue;
            }
            if frame.start >= target {
                return (frame.start == target).then(|| child.view());
            }
            match child.view() {
                GreenRef::Node(inner) => {
                    let start = frame.start;
                    self.frames.push(Frame { node: inner, index: 0, start });
                }
                // A token straddles the target, so nothing starts there.
                GreenRef::Token(_) => return None,
            }
        }
    }
}

fn is_reusable(node: &GreenNode) -> bool {
    node.production().is_some()
        && !node.has_error()
        && !node.is_fragile()
        && !node.is_extra()
        && !node.size().is_empty()
}
