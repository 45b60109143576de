//! Textual renderings of a tree.

use std::fmt::Write as _;

use arbor_grammar::FieldId;

use crate::syntax::{SyntaxNode, SyntaxTree};

impl SyntaxTree {
    /// Single-line s-expression of the visible tree, for comparing trees.
    ///
    /// `(sum 0..5 left: (number 0..1) ("+" 1..2) right: (number 2..5))`
    pub fn to_sexp(&self) -> String {
        self.root().to_sexp()
    }

    /// Indented dump of the visible tree with leaf text, for snapshots.
    pub fn debug_dump(&self) -> String {
        self.root().debug_dump()
    }
}

impl SyntaxNode<'_> {
    pub fn to_sexp(self) -> String {
        let mut out = String::new();
        write_sexp(self, &mut out);
        out
    }

    pub fn debug_dump(self) -> String {
        let mut out = String::new();
        write_dump(self, &mut out);
        out
    }
}

enum Step<'a> {
    Open(SyntaxNode<'a>, Option<FieldId>),
    Close,
}

fn write_sexp(root: SyntaxNode<'_>, out: &mut String) {
    let table = root.tree().language().table();
    let mut steps = vec![Step::Open(root, None)];
    while let Some(step) = steps.pop() {
        let Step::Open(node, field) = step else {
            out.push(')');
            continue;
        };
        if node != root {
            out.push(' ');
        }
        if let Some(field) = field {
            let _ = write!(out, "{}: ", table.field_name(field));
        }

        let range = node.byte_range();
        out.push('(');
        if node.is_missing() {
            out.push_str("MISSING ");
        }
        write_kind(node, out);
        let _ = write!(out, " {}..{}", u32::from(range.start()), u32::from(range.end()));

        steps.push(Step::Close);
        let children: Vec<_> = node.children_with_fields().collect();
        steps.extend(children.into_iter().rev().map(|(child, field)| Step::Open(child, field)));
    }
}

fn write_kind(node: SyntaxNode<'_>, out: &mut String) {
    if node.is_named() {
        out.push_str(node.kind());
    } else {
        write_quoted(node.kind(), out);
    }
}

fn write_quoted(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ch => out.push(ch),
        }
    }
    out.push('"');
}

fn write_dump(root: SyntaxNode<'_>, out: &mut String) {
    let table = root.tree().language().table();
    let mut stack = vec![(root, None, 0)];
    while let Some((node, field, depth)) = stack.pop() {
        let _ = write!(out, "{:indent$}", "", indent = depth * 2);
        if let Some(field) = field {
            let _ = write!(out, "{}: ", table.field_name(field));
        }
        if node.is_missing() {
            out.push_str("MISSING ");
        }
        write_kind(node, out);
        let range = node.byte_range();
        let _ = write!(out, "@{}..{}", u32::from(range.start()), u32::from(range.end()));
        if node.is_extra() {
            out.push_str(" extra");
        }

        let children: Vec<_> = node.children_with_fields().collect();
        if children.is_empty() && !node.is_missing() {
            out.push(' ');
            write_quoted(&String::from_utf8_lossy(node.text()), out);
        }
        out.push('\n');

        stack.extend(children.into_iter().rev().map(|(child, field)| (child, field, depth + 1)));
    }
}
