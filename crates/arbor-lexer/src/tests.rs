use arbor_generate::rules::*;
use arbor_generate::{GrammarBuilder, samples};
use arbor_grammar::{Language, SymbolId, SymbolSet};
use arbor_tree::{Length, Point};

use crate::{Lexer, Token};

fn symbol(language: &Language, name: &str) -> SymbolId {
    let table = language.table();
    let named = table.symbols_for_name(name, true);
    named.first().or_else(|| table.symbols_for_name(name, false).first()).copied().unwrap()
}

fn text_of<'a>(token: &Token, text: &'a [u8]) -> &'a str {
    let start = usize::from(token.start.bytes);
    std::str::from_utf8(&text[start..start + usize::from(token.size.bytes)]).unwrap()
}

/// Lexes all of `text` with every terminal valid, skipping whitespace.
fn lex_all(language: &Language, text: &str) -> Vec<(String, String)> {
    let lexer = Lexer::new(language, text.as_bytes());
    let table = language.table();
    lexer
        .tokens(table.error_mode())
        .filter(|token| table.symbol_name(token.symbol) != "_whitespace")
        .map(|token| {
            let name = table.symbol_name(token.symbol).to_owned();
            (name, text_of(&token, text.as_bytes()).to_owned())
        })
        .collect()
}

fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected.iter().map(|&(kind, text)| (kind.to_owned(), text.to_owned())).collect()
}

#[test]
fn test_keywords_and_longest_match() {
    let language = samples::statements().unwrap();
    let inputs = [
        ("print", vec![("print", "print")]),
        ("printer", vec![("identifier", "printer")]),
        ("print x;", vec![("print", "print"), ("identifier", "x"), (";", ";")]),
        ("x=12", vec![("identifier", "x"), ("=", "="), ("number", "12")]),
        ("a # note\nb", vec![("identifier", "a"), ("comment", "# note"), ("identifier", "b")]),
    ];

    for (input, expected) in inputs {
        let mut expected = pairs(&expected);
        expected.push(("end".to_owned(), String::new()));
        assert_eq!(lex_all(&language, input), expected, "Input: '{input}'");
    }
}

#[test]
fn test_contextual_lexing() {
    let language = samples::statements().unwrap();
    let identifier = symbol(&language, "identifier");
    let lexer = Lexer::new(&language, b"print");

    let only_identifiers: SymbolSet = [identifier].into_iter().collect();
    let token = lexer.lex(Length::ZERO, &only_identifiers);
    assert_eq!(token.symbol, identifier);
    assert_eq!(u32::from(token.size.bytes), 5);

    let token = lexer.lex(Length::ZERO, language.table().error_mode());
    assert_eq!(token.symbol, symbol(&language, "print"));
}

#[test]
fn test_lexical_precedence() {
    let table = GrammarBuilder::new("words")
        .rule("list", repeat(choice([sym("word"), sym("hex")])))
        .rule("word", pattern(Pattern::range('a', 'z').repeat1()))
        .rule("hex", prec(1, pattern(Pattern::ranges(&[('a', 'f'), ('0', '9')]).repeat1())))
        .rule("_whitespace", pattern(Pattern::literal(" ")))
        .extras(&["_whitespace"])
        .build()
        .unwrap();
    let language = Language::new(table);

    assert_eq!(
        lex_all(&language, "abc abcg 12"),
        pairs(&[("hex", "abc"), ("word", "abcg"), ("hex", "12"), ("end", "")])
    );
}

#[test]
fn test_positions_and_lookahead() {
    let language = samples::statements().unwrap();
    let text = b"ab;\n  cd";
    let lexer = Lexer::new(&language, text);
    let tokens: Vec<Token> = lexer.tokens(language.table().error_mode()).collect();

    let ab = tokens[0];
    assert_eq!(text_of(&ab, text), "ab");
    assert_eq!(ab.lookahead_bytes, 1);
    assert!(!ab.is_extra);

    let whitespace = tokens[2];
    assert!(whitespace.is_extra);
    assert_eq!(whitespace.size.extent, Point::new(1, 2));

    let cd = tokens[3];
    assert_eq!(cd.start.extent, Point::new(1, 2));
    assert_eq!(cd.end().extent, Point::new(1, 4));
    // the end of the input counts as one examined byte
    assert_eq!(cd.lookahead_bytes, 1);

    let end = tokens[4];
    assert!(end.is_end());
    assert!(end.size.is_empty());
    assert_eq!(u32::from(end.start.bytes), 8);
    assert_eq!(tokens.len(), 5);
}

#[test]
fn test_error_tokens() {
    let language = samples::statements().unwrap();
    let inputs: [(&[u8], usize); 3] = [(b"@x", 1), ("é".as_bytes(), 2), (b"\xFFx", 1)];

    for (input, len) in inputs {
        let lexer = Lexer::new(&language, input);
        let token = lexer.lex(Length::ZERO, language.table().error_mode());
        assert!(token.is_error, "Input: {input:?}");
        assert_eq!(token.symbol, SymbolId::ERROR);
        assert_eq!(usize::from(token.size.bytes), len, "Input: {input:?}");

        let next = lexer.lex(token.end(), language.table().error_mode());
        assert!(!next.is_error || len == 2, "Input: {input:?}");
    }
}

#[test]
fn test_empty_input() {
    let language = samples::arithmetic().unwrap();
    let lexer = Lexer::new(&language, b"");
    let token = lexer.lex(Length::ZERO, language.table().error_mode());
    assert!(token.is_end());
    assert_eq!(token.lookahead_bytes, 1);
    assert_eq!(lexer.tokens(language.table().error_mode()).count(), 1);
}

#[test]
fn test_external_scanner() {
    let language = samples::nested_comments().unwrap();
    assert_eq!(
        lex_all(&language, "a /* x /* y */ z */ 1"),
        pairs(&[
            ("identifier", "a"),
            ("comment", "/* x /* y */ z */"),
            ("number", "1"),
            ("end", "")
        ])
    );

    let text = b"/* open";
    let lexer = Lexer::new(&language, text);
    let token = lexer.lex(Length::ZERO, language.table().error_mode());
    assert!(token.is_error);
    assert_eq!(text_of(&token, text), "/");
}

#[test]
fn test_external_lookahead_covers_scanned_text() {
    let language = samples::nested_comments().unwrap();
    let text = b"/**/x";
    let lexer = Lexer::new(&language, text);
    let token = lexer.lex(Length::ZERO, language.table().error_mode());
    assert!(token.is_extra);
    assert_eq!(usize::from(token.size.bytes), 4);
    assert_eq!(token.lookahead_bytes, 0);
}

#[test]
fn test_external_scan_depends_only_on_text_from_its_start() {
    let language = samples::nested_comments().unwrap();
    let valid = language.table().error_mode();

    let first = b"x\n/* a */";
    let second = b"yy /* a */";
    let a = Lexer::new(&language, first).lex(Length::of(b"x\n"), valid);
    let b = Lexer::new(&language, second).lex(Length::of(b"yy "), valid);

    assert_eq!(text_of(&a, first), "/* a */");
    assert_eq!(text_of(&b, second), "/* a */");
    assert_eq!(
        (a.symbol, a.size.bytes, a.lookahead_bytes),
        (b.symbol, b.size.bytes, b.lookahead_bytes)
    );
}
