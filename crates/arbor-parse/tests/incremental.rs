//! Differential tests: reparsing after an edit must give the tree a fresh
//! parse of the edited text gives.

use std::ops::Range;

use arbor_generate::samples::Sample;
use arbor_grammar::Language;
use arbor_parse::{InputEdit, Parser};
use arbor_tree::SyntaxTree;
use proptest::prelude::*;

const CASES: u32 = 512;

/// Fragments that splice into valid and invalid text alike.
fn fragments(sample: Sample) -> &'static [&'static str] {
    match sample {
        Sample::Arithmetic => &["1", "23", " ", "+", "-", "*", "/", "(", ")", "x", "\n"],
        Sample::Statements => &[
            "x", "y1", "42", " ", "=", ";", "+", "*", "print", "int", "{", "}", "(", ")", "# c\n",
            "\n",
        ],
        Sample::Json => {
            &["{", "}", "[", "]", ",", ":", "\"k\"", "1", "-2.5", "true", "null", " ", "@"]
        }
        Sample::Ambiguous => &["a", "b", "*", ";", "%", " "],
        Sample::NestedComments => &["a", "7", " ", "/*", "*/", "\n"],
    }
}

fn text_strategy(sample: Sample) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(fragments(sample)), 0..48)
        .prop_map(|parts| parts.concat())
}

fn replacement_strategy(sample: Sample) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(fragments(sample)), 0..4)
        .prop_map(|parts| parts.concat())
}

/// An edit whose range is given as fractions of the text it applies to, so
/// it stays valid whatever the earlier edits of a chain did.
#[derive(Clone, Debug)]
struct Step {
    from: f64,
    to: f64,
    replacement: String,
}

impl Step {
    fn range(&self, len: usize) -> Range<usize> {
        let at = |fraction: f64| ((len as f64 * fraction) as usize).min(len);
        let (a, b) = (at(self.from), at(self.to));
        a.min(b)..a.max(b)
    }
}

fn step_strategy(sample: Sample) -> impl Strategy<Value = Step> {
    (0.0..=1.0f64, 0.0..=1.0f64, replacement_strategy(sample))
        .prop_map(|(from, to, replacement)| Step { from, to, replacement })
}

fn parse(parser: &mut Parser, text: &[u8]) -> SyntaxTree {
    parser.parse(text).unwrap()
}

/// Applies `range => replacement` to `tree` incrementally and checks the
/// result against a fresh parse.
fn edit_and_compare(
    parser: &mut Parser,
    tree: &SyntaxTree,
    range: Range<usize>,
    replacement: &str,
) -> SyntaxTree {
    let (edit, new_text) = InputEdit::replace(tree.text(), range, replacement.as_bytes()).unwrap();
    let incremental = parser.edit(tree, &edit, &new_text).unwrap();
    let fresh = parse(parser, &new_text);
    assert_eq!(
        incremental.to_sexp(),
        fresh.to_sexp(),
        "{:?} -> {:?}",
        String::from_utf8_lossy(tree.text()),
        String::from_utf8_lossy(&new_text)
    );
    assert_eq!(incremental.root().byte_range(), fresh.root().byte_range());
    incremental
}

fn check(language: &Language, text: &str, range: Range<usize>, replacement: &str) {
    let mut parser = Parser::new(language.clone());
    let old = parse(&mut parser, text.as_bytes());
    edit_and_compare(&mut parser, &old, range, replacement);
}

fn check_chain(language: &Language, text: &str, steps: &[Step]) {
    let mut parser = Parser::new(language.clone());
    let mut tree = parse(&mut parser, text.as_bytes());
    for step in steps {
        let range = step.range(tree.text().len());
        tree = edit_and_compare(&mut parser, &tree, range, &step.replacement);
    }
}

macro_rules! differential {
    ($($single:ident, $chained:ident => $sample:expr),* $(,)?) => {
        proptest! {
            #![proptest_config(ProptestConfig::with_cases(CASES))]
            $(
                #[test]
                fn $single(
                    text in text_strategy($sample),
                    step in step_strategy($sample),
                ) {
                    let language = $sample.language().unwrap();
                    check(&language, &text, step.range(text.len()), &step.replacement);
                }

                #[test]
                fn $chained(
                    text in text_strategy($sample),
                    steps in prop::collection::vec(step_strategy($sample), 1..=3),
                ) {
                    let language = $sample.language().unwrap();
                    check_chain(&language, &text, &steps);
                }
            )*
        }
    };
}

differential! {
    arithmetic_edits_match_fresh_parses,
    chained_arithmetic_edits_match_fresh_parses => Sample::Arithmetic,
    statement_edits_match_fresh_parses,
    chained_statement_edits_match_fresh_parses => Sample::Statements,
    json_edits_match_fresh_parses,
    chained_json_edits_match_fresh_parses => Sample::Json,
    ambiguous_edits_match_fresh_parses,
    chained_ambiguous_edits_match_fresh_parses => Sample::Ambiguous,
    nested_comment_edits_match_fresh_parses,
    chained_nested_comment_edits_match_fresh_parses => Sample::NestedComments,
}

#[test]
fn reduction_on_an_inserted_token_is_not_reused() {
    let language = Sample::Arithmetic.language().unwrap();
    check(&language, "*\n-23+(3)x\n", 0..0, "(\n23");
}

#[test]
fn reduction_over_skipped_input_is_not_reused() {
    let language = Sample::Statements.language().unwrap();
    check(&language, "int(;\n\nxrint{", 7..13, "=y1pr");
}

#[test]
fn edits_around_errors_match_fresh_parses() {
    let cases: [(Sample, &str, Range<usize>, &str); 6] = [
        (Sample::Arithmetic, "1 + (2 * 3", 10..10, ")"),
        (Sample::Arithmetic, "1 + + 2", 2..3, ""),
        (Sample::Arithmetic, "(1 + 2) x (3)", 8..9, "*"),
        (Sample::Statements, "a = 1\nprint a;\n", 5..5, ";"),
        (Sample::Json, "[1, 2,, 3]", 5..6, ""),
        (Sample::Json, r#"{"k": @ 1}"#, 6..8, ""),
    ];
    for (sample, text, range, replacement) in cases {
        check(&sample.language().unwrap(), text, range, replacement);
    }
}

#[test]
fn deeply_nested_edits() {
    const DEPTH: usize = 50_000;
    let language = Sample::Arithmetic.language().unwrap();
    let text = format!("{}1{}", "(".repeat(DEPTH), ")".repeat(DEPTH));
    check(&language, &text, DEPTH..DEPTH + 1, "2 + 3");
    check(&language, &text, text.len()..text.len(), " * 4");
}

#[test]
fn repeated_edits_keep_matching() {
    let language = Sample::Statements.language().unwrap();
    let mut parser = Parser::new(language);
    let mut tree = parser.parse(b"a = 1;\nprint a;\n").unwrap();

    let steps: [(Range<usize>, &str); 4] =
        [(4..5, "1 + 2"), (0..0, "{ "), (22..22, " }"), (13..19, "")];
    for (range, replacement) in steps {
        tree = edit_and_compare(&mut parser, &tree, range, replacement);
    }
    assert_eq!(tree.text(), b"{ a = 1 + 2;\na;\n }");
    assert!(!tree.root().has_error());
}
