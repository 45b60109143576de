use arbor_errors::Diagnostic;
use arbor_tree::{GreenRef, SyntaxNode, SyntaxTree, WalkEvent};

/// Characters of source text quoted in a message.
const EXCERPT_LEN: usize = 24;

/// Reports every `ERROR` node and missing token in `tree`, in source order.
/// Errors nested inside an `ERROR` node are reported with it.
pub fn diagnostics(tree: &SyntaxTree) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    let mut preorder = tree.root().preorder();
    while let Some(event) = preorder.next() {
        let WalkEvent::Enter(node) = event else {
            continue;
        };
        if node.is_error() {
            out.push(unexpected(node));
            preorder.skip_subtree();
        }
    }

    for leaf in tree.leaves() {
        if leaf.is_missing() {
            let message = format!("missing {}", describe(leaf));
            out.push(Diagnostic::error(message, leaf.byte_range()).with_label("expected here"));
        }
    }

    out.sort_by_key(|diagnostic| (diagnostic.range().start(), diagnostic.range().end()));
    out
}

fn unexpected(node: SyntaxNode<'_>) -> Diagnostic {
    let text = String::from_utf8_lossy(node.text());
    let first_line = text.lines().next().unwrap_or_default();
    let excerpt: String = first_line.chars().take(EXCERPT_LEN).collect();
    let message = if node.text().is_empty() {
        "unexpected end of input".to_owned()
    } else if matches!(node.green(), GreenRef::Token(_)) {
        format!("unrecognized character `{excerpt}`")
    } else {
        format!("unexpected `{excerpt}`")
    };
    Diagnostic::error(message, node.byte_range()).with_label("not valid here")
}

fn describe(node: SyntaxNode<'_>) -> String {
    if node.is_named() { node.kind().to_owned() } else { format!("`{}`", node.kind()) }
}
