use arbor_generate::samples::Sample;
use arbor_grammar::Language;
use arbor_tree::SyntaxTree;
use text_size::TextRange;

use crate::{Query, QueryError, QueryErrorKind, QueryMatches, query};

fn language(sample: Sample) -> Language {
    sample.language().unwrap()
}

fn tree(language: &Language, text: &str) -> SyntaxTree {
    arbor_parse::parse(text.as_bytes(), language).unwrap()
}

fn render(query: &Query, matches: QueryMatches<'_>) -> Vec<String> {
    matches
        .map(|found| {
            let mut line = format!("{}:", found.pattern_index);
            for capture in &found.captures {
                let name = &query.capture_names()[capture.index as usize];
                line.push_str(&format!(" @{name} `{}`", capture.node.utf8_text().unwrap()));
            }
            line
        })
        .collect()
}

fn run(sample: Sample, text: &str, source: &str) -> Vec<String> {
    let language = language(sample);
    let tree = tree(&language, text);
    let compiled = Query::new(&language, source).unwrap();
    render(&compiled, query(&tree, &compiled))
}

fn compile_error(sample: Sample, source: &str) -> QueryError {
    Query::new(&language(sample), source).unwrap_err()
}

#[test]
fn fields_and_captures() {
    let matches = run(Sample::Arithmetic, "1 + 2 * 3", "(sum left: (number) @l right: (_) @r)");
    assert_eq!(matches, ["0: @l `1` @r `2 * 3`"]);

    let matches = run(Sample::Arithmetic, "1 + 2 * 3", "(sum right: (number) @r)");
    assert!(matches.is_empty());

    let source = "(product left: (_) @a \"*\" @op right: (_) @b)";
    let matches = run(Sample::Arithmetic, "1 + 2 * 3", source);
    assert_eq!(matches, ["0: @a `2` @op `*` @b `3`"]);
}

#[test]
fn patterns_report_in_preorder() {
    let matches = run(Sample::Arithmetic, "1 + 2 * 3", "(number) @n\n(sum) @s");
    assert_eq!(matches, ["1: @s `1 + 2 * 3`", "0: @n `1`", "0: @n `2`", "0: @n `3`"]);
}

#[test]
fn wildcards() {
    let matches = run(Sample::Arithmetic, "1 + 2 * 3", "(sum _ @x)");
    assert_eq!(matches, ["0: @x `1`", "0: @x `+`", "0: @x `2 * 3`"]);

    let matches = run(Sample::Arithmetic, "1 + 2 * 3", "(sum (_) @x)");
    assert_eq!(matches, ["0: @x `1`", "0: @x `2 * 3`"]);

    // Both named children give the same empty capture list.
    let matches = run(Sample::Arithmetic, "1 + 2 * 3", "(sum (_))");
    assert_eq!(matches, ["0:"]);
}

#[test]
fn nested_children_enumerate() {
    let matches = run(
        Sample::Json,
        r#"{"a": [1, 2], "b": 3}"#,
        "(pair key: (string) @k value: (array (number) @n))",
    );
    assert_eq!(matches, ["0: @k `\"a\"` @n `1`", "0: @k `\"a\"` @n `2`"]);
}

#[test]
fn quantifiers() {
    let text = "a = 1;\nb = 2;\nprint a;\n";

    let source = "(source_file (assignment)* @a (print_statement) @p)";
    let matches = run(Sample::Statements, text, source);
    assert_eq!(matches, ["0: @a `a = 1;` @a `b = 2;` @p `print a;`"]);

    let source = "(source_file (print_statement)? @p (assignment) @a)";
    let matches = run(Sample::Statements, text, source);
    assert_eq!(matches, ["0: @a `a = 1;`", "0: @a `b = 2;`"]);

    let matches = run(Sample::Statements, text, "(source_file (block)+ @b)");
    assert!(matches.is_empty());

    let source = r#"(block "{" (expression_statement)* @e "}")"#;
    let matches = run(Sample::Statements, "{ a; b; }\n", source);
    assert_eq!(matches, ["0: @e `a;` @e `b;`"]);

    let matches = run(Sample::Json, "[1, 2]", "(array (number)+ @n)");
    assert_eq!(matches, ["0: @n `1` @n `2`"]);
}

#[test]
fn optional_matches_at_least_the_plain_pattern() {
    let plain = run(Sample::Json, "[1, 2]", "(array (number) @n)");
    assert_eq!(plain, ["0: @n `1`", "0: @n `2`"]);

    let optional = run(Sample::Json, "[1, 2]", "(array (number)? @n)");
    assert_eq!(optional, plain);

    let matches = run(Sample::Json, "[]", "(array (number)? @n)");
    assert_eq!(matches, ["0:"]);

    let matches = run(Sample::Json, r#"[1, "x"]"#, "(array (number)? @n (string) @s)");
    assert_eq!(matches, ["0: @n `1` @s `\"x\"`"]);

    let matches = run(Sample::Json, r#"["x", 1]"#, "(array (number)? @n (string) @s)");
    assert_eq!(matches, ["0: @s `\"x\"`"]);
}

#[test]
fn repeated_runs_enumerate_every_capture_list() {
    let matches = run(Sample::Json, "[1, 2]", "(array [(number) @n (number) @m]+)");
    assert_eq!(
        matches,
        ["0: @n `1` @n `2`", "0: @n `1` @m `2`", "0: @m `1` @n `2`", "0: @m `1` @m `2`"]
    );
}

#[test]
fn alternations() {
    let matches = run(Sample::Arithmetic, "1 + 2 * 3", "[(sum) (product)] @op");
    assert_eq!(matches, ["0: @op `1 + 2 * 3`", "0: @op `2 * 3`"]);

    let matches = run(Sample::Arithmetic, "1 + 2 * 3", "(sum right: [(number) @n (product) @p])");
    assert_eq!(matches, ["0: @p `2 * 3`"]);
}

#[test]
fn error_and_missing_nodes() {
    let matches = run(Sample::Arithmetic, "1 @ + 2", "(sum (ERROR) @e right: (number) @r)");
    assert_eq!(matches, ["0: @e `@` @r `2`"]);

    let matches = run(Sample::Arithmetic, "1 +", "(MISSING) @m");
    assert_eq!(matches, ["0: @m ``"]);
    let matches = run(Sample::Arithmetic, "1 +", "(MISSING number) @m");
    assert_eq!(matches, ["0: @m ``"]);
    let matches = run(Sample::Arithmetic, "1 +", r#"(MISSING "+") @m"#);
    assert!(matches.is_empty());
    let matches = run(Sample::Arithmetic, "1 2", r#"(sum (MISSING "+") @m)"#);
    assert_eq!(matches, ["0: @m ``"]);

    // A type pattern also matches a missing node of that type.
    let matches = run(Sample::Arithmetic, "1 +", "(number) @n");
    assert_eq!(matches, ["0: @n `1`", "0: @n ``"]);
}

#[test]
fn predicates() {
    let text = "a = a;\nb = c;\n";

    let matches = run(
        Sample::Statements,
        text,
        "((assignment name: (identifier) @n value: (identifier) @v) (#eq? @n @v))",
    );
    assert_eq!(matches, ["0: @n `a` @v `a`"]);

    let matches = run(
        Sample::Statements,
        text,
        "((assignment name: (identifier) @n value: (identifier) @v) (#not-eq? @n @v))",
    );
    assert_eq!(matches, ["0: @n `b` @v `c`"]);

    let source = r#"(assignment name: (identifier) @n (#eq? @n "b"))"#;
    let matches = run(Sample::Statements, text, source);
    assert_eq!(matches, ["0: @n `b`"]);

    // Nothing captured under `@p`, so the predicate has nothing to reject.
    let source = r#"((source_file (print_statement)* @p) (#eq? @p "x"))"#;
    let matches = run(Sample::Statements, text, source);
    assert_eq!(matches, ["0:"]);
}

#[test]
fn comments_and_pattern_offsets() {
    let language = language(Sample::Arithmetic);
    let source = "(number) @n\n; sums\n(sum) @s ; trailing\n";
    let compiled = Query::new(&language, source).unwrap();

    assert_eq!(compiled.pattern_count(), 2);
    assert_eq!(compiled.start_byte_for_pattern(0), 0);
    assert_eq!(compiled.start_byte_for_pattern(1), 19);
    assert_eq!(compiled.capture_names(), ["n", "s"]);
    assert_eq!(compiled.capture_index_for_name("s"), Some(1));
    assert_eq!(compiled.capture_index_for_name("x"), None);
}

#[test]
fn byte_range_restricts_matches() {
    let language = language(Sample::Arithmetic);
    let tree = tree(&language, "1 + 2 * 3");
    let compiled = Query::new(&language, "(number) @n").unwrap();

    let matches = query(&tree, &compiled).with_byte_range(TextRange::new(4.into(), 9.into()));
    assert_eq!(render(&compiled, matches), ["0: @n `2`", "0: @n `3`"]);

    let matches = query(&tree, &compiled).with_byte_range(TextRange::new(0.into(), 1.into()));
    assert_eq!(render(&compiled, matches), ["0: @n `1`"]);
}

#[test]
fn matches_restart() {
    let language = language(Sample::Statements);
    let tree = tree(&language, "x = 1;\n{ print x + 2; y = x * 3; }\n");
    let compiled = Query::new(&language, "(identifier) @id\n(sum left: (_) @l)").unwrap();

    let mut matches = query(&tree, &compiled);
    let first: Vec<_> = matches.by_ref().collect();
    assert_eq!(first.len(), 5);
    assert!(matches.next().is_none());

    matches.restart();
    let second: Vec<_> = matches.collect();
    assert_eq!(first, second);

    let third: Vec<_> = query(&tree, &compiled).collect();
    assert_eq!(first, third);
    assert_eq!(first[0].nodes_for_capture_index(0).count(), 1);
}

#[test]
fn other_languages_match_nothing() {
    let arithmetic = language(Sample::Arithmetic);
    let tree = tree(&arithmetic, "1 + 2");
    let compiled = Query::new(&language(Sample::Arithmetic), "(number) @n").unwrap();
    assert_eq!(query(&tree, &compiled).count(), 0);
}

#[test]
fn compile_errors() {
    use QueryErrorKind::*;

    let cases: [(&str, QueryErrorKind, usize); 9] = [
        ("(nonexistent)", NodeType("nonexistent".to_owned()), 1),
        ("\"nope\"", NodeType("nope".to_owned()), 0),
        ("(sum lhs: (number))", Field("lhs".to_owned()), 5),
        ("((number) @n (#eq? @m \"1\"))", Capture("m".to_owned()), 19),
        ("((number) @n (#match? @n \"1\"))", Predicate("unknown predicate `#match?`".into()), 14),
        ("(sum", Syntax("unclosed node pattern"), 4),
        ("(number)*", Structure("a top-level pattern cannot be quantified"), 0),
        ("((number) (sum))", Structure("a group must contain exactly one pattern"), 0),
        ("(MISSING (number))", Structure("a missing node has no children"), 1),
    ];
    for (source, kind, offset) in cases {
        let err = compile_error(Sample::Arithmetic, source);
        assert_eq!(err, QueryError { kind, offset }, "{source}");
    }

    let err = compile_error(Sample::Arithmetic, "[(number)* (sum)]");
    assert_eq!(err.kind, QueryErrorKind::Structure("alternatives cannot be quantified"));
    assert_eq!(
        err.to_string(),
        "invalid pattern structure: alternatives cannot be quantified at byte 0"
    );
    assert_eq!(
        compile_error(Sample::Arithmetic, "(nonexistent)").to_string(),
        "unknown node type `nonexistent` at byte 1"
    );
}
