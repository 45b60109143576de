//! Small grammars used by tests, benchmarks and the command line tool.

use arbor_grammar::{
    ExternalScanner, GrammarTable, Language, ScanInput, ScanMatch, SymbolId, SymbolSet,
};

use crate::rules::*;
use crate::{GenerateError, GrammarBuilder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sample {
    Arithmetic,
    Statements,
    Json,
    Ambiguous,
    NestedComments,
}

impl Sample {
    pub const ALL: [Self; 5] =
        [Self::Arithmetic, Self::Statements, Self::Json, Self::Ambiguous, Self::NestedComments];

    pub fn name(self) -> &'static str {
        match self {
            Self::Arithmetic => "arithmetic",
            Self::Statements => "statements",
            Self::Json => "json",
            Self::Ambiguous => "ambiguous",
            Self::NestedComments => "nested_comments",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sample| sample.name() == name)
    }

    pub fn language(self) -> Result<Language, GenerateError> {
        match self {
            Self::Arithmetic => arithmetic(),
            Self::Statements => statements(),
            Self::Json => json(),
            Self::Ambiguous => ambiguous(),
            Self::NestedComments => nested_comments(),
        }
    }
}

fn whitespace() -> Rule {
    pattern(Pattern::one_of(" \t\r\n").repeat1())
}

fn binary(precedence: i32, operator: &str) -> Rule {
    prec_left(
        precedence,
        seq([
            field("left", sym("_expression")),
            string(operator),
            field("right", sym("_expression")),
        ]),
    )
}

fn identifier() -> Rule {
    pattern(Pattern::seq([
        Pattern::ranges(&[('a', 'z'), ('A', 'Z'), ('_', '_')]),
        Pattern::ranges(&[('a', 'z'), ('A', 'Z'), ('0', '9'), ('_', '_')]).repeat(),
    ]))
}

fn number() -> Rule {
    pattern(Pattern::digit().repeat1())
}

/// Integer expressions with the four operators and parentheses.
pub fn arithmetic() -> Result<Language, GenerateError> {
    let table = GrammarBuilder::new("arithmetic")
        .rule("program", sym("_expression"))
        .rule(
            "_expression",
            choice([
                sym("sum"),
                sym("difference"),
                sym("product"),
                sym("quotient"),
                sym("number"),
                sym("parenthesized"),
            ]),
        )
        .rule("sum", binary(1, "+"))
        .rule("difference", binary(1, "-"))
        .rule("product", binary(2, "*"))
        .rule("quotient", binary(2, "/"))
        .rule("parenthesized", seq([string("("), sym("_expression"), string(")")]))
        .rule("number", number())
        .rule("_whitespace", whitespace())
        .extras(&["_whitespace"])
        .build()?;
    Ok(Language::new(table))
}

/// Statements with blocks, a `print` keyword and line comments.
pub fn statements() -> Result<Language, GenerateError> {
    let table = GrammarBuilder::new("statements")
        .rule("source_file", repeat(sym("_statement")))
        .rule(
            "_statement",
            choice([
                sym("assignment"),
                sym("print_statement"),
                sym("expression_statement"),
                sym("block"),
            ]),
        )
        .rule(
            "assignment",
            seq([
                field("name", sym("identifier")),
                string("="),
                field("value", sym("_expression")),
                string(";"),
            ]),
        )
        .rule(
            "print_statement",
            seq([string("print"), field("value", sym("_expression")), string(";")]),
        )
        .rule("expression_statement", seq([sym("_expression"), string(";")]))
        .rule("block", seq([string("{"), repeat(sym("_statement")), string("}")]))
        .rule(
            "_expression",
            choice([
                sym("identifier"),
                sym("number"),
                sym("sum"),
                sym("product"),
                sym("parenthesized"),
            ]),
        )
        .rule("sum", binary(1, "+"))
        .rule("product", binary(2, "*"))
        .rule("parenthesized", seq([string("("), sym("_expression"), string(")")]))
        .rule("identifier", identifier())
        .rule("number", number())
        .rule("comment", token(seq([string("#"), pattern(Pattern::none_of("\n").repeat())])))
        .rule("_whitespace", whitespace())
        .extras(&["comment", "_whitespace"])
        .build()?;
    Ok(Language::new(table))
}

/// A JSON-like data language.
pub fn json() -> Result<Language, GenerateError> {
    let comma_separated =
        |item: Rule| optional(seq([item.clone(), repeat(seq([string(","), item]))]));

    let escape = Pattern::seq([Pattern::literal("\\"), Pattern::any()]);
    let table = GrammarBuilder::new("json")
        .rule("document", sym("_value"))
        .rule(
            "_value",
            choice([
                sym("object"),
                sym("array"),
                sym("string"),
                sym("number"),
                sym("true"),
                sym("false"),
                sym("null"),
            ]),
        )
        .rule("object", seq([string("{"), comma_separated(sym("pair")), string("}")]))
        .rule(
            "pair",
            seq([field("key", sym("string")), string(":"), field("value", sym("_value"))]),
        )
        .rule("array", seq([string("["), comma_separated(sym("_value")), string("]")]))
        .rule(
            "string",
            pattern(Pattern::seq([
                Pattern::literal("\""),
                Pattern::choice([Pattern::none_of("\"\\\n"), escape]).repeat(),
                Pattern::literal("\""),
            ])),
        )
        .rule(
            "number",
            pattern(Pattern::seq([
                Pattern::literal("-").optional(),
                Pattern::digit().repeat1(),
                Pattern::seq([Pattern::literal("."), Pattern::digit().repeat1()]).optional(),
            ])),
        )
        .rule("true", string("true"))
        .rule("false", string("false"))
        .rule("null", string("null"))
        .rule("_whitespace", whitespace())
        .extras(&["_whitespace"])
        .build()?;
    Ok(Language::new(table))
}

/// Grammar whose conflicts survive table generation.
///
/// `a * b;` is both a pointer declaration and a multiplication; the
/// declaration wins through dynamic precedence. `% ;` is both an `alpha` and a
/// `beta`; the rule declared first wins.
pub fn ambiguous() -> Result<Language, GenerateError> {
    let table = GrammarBuilder::new("ambiguous")
        .rule("program", repeat(sym("_statement")))
        .rule(
            "_statement",
            choice([sym("declaration"), sym("expression_statement"), sym("alpha"), sym("beta")]),
        )
        .rule(
            "declaration",
            prec_dynamic(
                1,
                seq([
                    field("type", sym("identifier")),
                    string("*"),
                    field("declarator", sym("identifier")),
                    string(";"),
                ]),
            ),
        )
        .rule("expression_statement", seq([sym("_expression"), string(";")]))
        .rule("_expression", choice([sym("identifier"), sym("product")]))
        .rule("product", binary(1, "*"))
        .rule("alpha", seq([string("%"), string(";")]))
        .rule("beta", seq([string("%"), string(";")]))
        .rule("identifier", identifier())
        .rule("_whitespace", whitespace())
        .extras(&["_whitespace"])
        .build()?;
    Ok(Language::new(table))
}

/// Identifiers and numbers separated by nestable `/* */` comments, which are
/// recognised by [`NestedCommentScanner`].
pub fn nested_comments() -> Result<Language, GenerateError> {
    let table = GrammarBuilder::new("nested_comments")
        .rule("program", repeat(choice([sym("identifier"), sym("number")])))
        .rule("identifier", identifier())
        .rule("number", number())
        .rule("_whitespace", whitespace())
        .externals(&["comment"])
        .extras(&["comment", "_whitespace"])
        .build()?;
    let scanner = NestedCommentScanner::new(&table).ok_or_else(|| GenerateError::UndefinedSymbol {
        name: "comment".to_owned(),
        rule: "nested_comments".to_owned(),
    })?;
    Ok(Language::new(table).with_scanner(scanner))
}

/// External scanner for block comments that nest, which a regular lexer
/// automaton cannot match.
#[derive(Clone, Copy, Debug)]
pub struct NestedCommentScanner {
    comment: SymbolId,
}

impl NestedCommentScanner {
    pub fn new(table: &GrammarTable) -> Option<Self> {
        let comment = table
            .externals()
            .iter()
            .copied()
            .find(|&symbol| table.symbol_name(symbol) == "comment")?;
        Some(Self { comment })
    }
}

impl ExternalScanner for NestedCommentScanner {
    fn scan(&self, input: &mut dyn ScanInput, valid: &SymbolSet) -> Option<ScanMatch> {
        if !valid.contains(self.comment) || input.lookahead()? != '/' {
            return None;
        }
        input.advance();
        if input.lookahead()? != '*' {
            return None;
        }
        input.advance();

        let mut depth = 1u32;
        loop {
            match input.lookahead()? {
                '/' => {
                    input.advance();
                    if input.lookahead() == Some('*') {
                        input.advance();
                        depth += 1;
                    }
                }
                '*' => {
                    input.advance();
                    if input.lookahead() == Some('/') {
                        input.advance();
                        depth -= 1;
                        if depth == 0 {
                            return Some(ScanMatch { symbol: self.comment, len: input.consumed() });
                        }
                    }
                }
                _ => input.advance(),
            }
        }
    }
}
