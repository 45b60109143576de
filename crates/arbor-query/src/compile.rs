//! Query source to compiled patterns.

use arbor_grammar::{FieldId, Language, SymbolId};

use crate::lexer::{Token, TokenKind, tokenize, unescape};
use crate::{QueryError, QueryErrorKind};

/// A compiled set of patterns for one language.
#[derive(Debug)]
pub struct Query {
    language: Language,
    pub(crate) patterns: Vec<Pattern>,
    capture_names: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct Pattern {
    pub(crate) item: Item,
    pub(crate) predicates: Vec<Predicate>,
    start_byte: usize,
}

#[derive(Debug)]
pub(crate) struct Item {
    pub(crate) kind: ItemKind,
    pub(crate) field: Option<FieldId>,
    pub(crate) quantifier: Quantifier,
    pub(crate) captures: Vec<u32>,
}

#[derive(Debug)]
pub(crate) enum ItemKind {
    Node { kind: NodeKind, children: Vec<Item> },
    Alternation(Vec<Item>),
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    /// `_`
    Any,
    /// `(_)`
    Named,
    Symbols(Box<[SymbolId]>),
    Error,
    Missing(Option<Box<[SymbolId]>>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Quantifier {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug)]
pub(crate) enum Predicate {
    Eq { capture: u32, operand: Operand, negated: bool },
}

#[derive(Debug)]
pub(crate) enum Operand {
    Capture(u32),
    Text(String),
}

impl Query {
    /// Compiles `source`, resolving node types and fields against `language`.
    pub fn new(language: &Language, source: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(source)?;
        let mut compiler = Compiler { language, source, tokens, pos: 0, capture_names: Vec::new() };

        let mut patterns = Vec::new();
        while !compiler.at(TokenKind::Eof) {
            patterns.push(compiler.pattern()?);
        }
        tracing::debug!(
            patterns = patterns.len(),
            captures = compiler.capture_names.len(),
            "compiled query"
        );

        let capture_names = compiler.capture_names;
        Ok(Self { language: language.clone(), patterns, capture_names })
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Byte offset of a pattern in the query source.
    pub fn start_byte_for_pattern(&self, index: usize) -> usize {
        self.patterns[index].start_byte
    }

    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
        self.capture_names.iter().position(|capture| capture == name).map(|index| index as u32)
    }
}

struct Compiler<'a> {
    language: &'a Language,
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    capture_names: Vec<String>,
}

impl<'a> Compiler<'a> {
    fn peek(&self) -> Token {
        self.nth(0)
    }

    fn nth(&self, n: usize) -> Token {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + n).min(last)]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, message: &'static str) -> Result<Token, QueryError> {
        if self.at(kind) { Ok(self.bump()) } else { Err(self.syntax(message)) }
    }

    fn text(&self, token: Token) -> &'a str {
        &self.source[token.start..token.end]
    }

    fn syntax(&self, message: &'static str) -> QueryError {
        QueryError::new(QueryErrorKind::Syntax(message), self.peek().start)
    }

    /// A top-level pattern, optionally wrapped in a group that also holds
    /// predicates: `((identifier) @name (#eq? @name "x"))`.
    fn pattern(&mut self) -> Result<Pattern, QueryError> {
        let start_byte = self.peek().start;
        let mut predicates = Vec::new();

        let item = if self.is_group() {
            self.bump();
            let mut items = Vec::new();
            while !self.at(TokenKind::RightParen) {
                if self.at(TokenKind::Eof) {
                    return Err(self.syntax("unclosed group"));
                }
                if self.is_predicate() {
                    predicates.push(self.predicate()?);
                } else {
                    items.push(self.item(&mut predicates)?);
                }
            }
            self.bump();
            if items.len() != 1 {
                let kind = QueryErrorKind::Structure("a group must contain exactly one pattern");
                return Err(QueryError::new(kind, start_byte));
            }
            let mut item = items.remove(0);
            item.captures.extend(self.captures());
            item
        } else {
            self.item(&mut predicates)?
        };

        if item.field.is_some() {
            let kind = QueryErrorKind::Structure("a top-level pattern cannot have a field");
            return Err(QueryError::new(kind, start_byte));
        }
        if item.quantifier != Quantifier::One {
            let kind = QueryErrorKind::Structure("a top-level pattern cannot be quantified");
            return Err(QueryError::new(kind, start_byte));
        }
        Ok(Pattern { item, predicates, start_byte })
    }

    fn is_group(&self) -> bool {
        if !self.at(TokenKind::LeftParen) {
            return false;
        }
        match self.nth(1).kind {
            TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::String => true,
            TokenKind::Identifier => self.nth(2).kind == TokenKind::Colon,
            _ => false,
        }
    }

    fn is_predicate(&self) -> bool {
        self.at(TokenKind::LeftParen) && self.nth(1).kind == TokenKind::Predicate
    }

    /// `field: pattern quantifier? @capture*`
    fn item(&mut self, predicates: &mut Vec<Predicate>) -> Result<Item, QueryError> {
        let field = if self.at(TokenKind::Identifier) && self.nth(1).kind == TokenKind::Colon {
            let name = self.bump();
            self.bump();
            let text = self.text(name);
            match self.language.table().field_id(text) {
                Some(field) => Some(field),
                None => {
                    let kind = QueryErrorKind::Field(text.to_owned());
                    return Err(QueryError::new(kind, name.start));
                }
            }
        } else {
            None
        };

        let token = self.peek();
        let kind = match token.kind {
            TokenKind::LeftParen => self.node(predicates)?,
            TokenKind::LeftBracket => self.alternation(predicates)?,
            TokenKind::String => {
                self.bump();
                let symbols = self.symbols(&unescape(self.text(token)), false, token.start)?;
                ItemKind::Node { kind: NodeKind::Symbols(symbols), children: Vec::new() }
            }
            TokenKind::Identifier if self.text(token) == "_" => {
                self.bump();
                ItemKind::Node { kind: NodeKind::Any, children: Vec::new() }
            }
            _ => return Err(self.syntax("expected a pattern")),
        };

        let quantifier = match self.peek().kind {
            TokenKind::Question => Quantifier::ZeroOrOne,
            TokenKind::Star => Quantifier::ZeroOrMore,
            TokenKind::Plus => Quantifier::OneOrMore,
            _ => Quantifier::One,
        };
        if quantifier != Quantifier::One {
            self.bump();
        }

        let captures = self.captures();
        Ok(Item { kind, field, quantifier, captures })
    }

    /// `(type child*)`, `(_ child*)`, `(ERROR)` or `(MISSING type?)`.
    fn node(&mut self, predicates: &mut Vec<Predicate>) -> Result<ItemKind, QueryError> {
        self.bump();
        let name = self.expect(TokenKind::Identifier, "expected a node type")?;
        let kind = match self.text(name) {
            "_" => NodeKind::Named,
            "ERROR" => NodeKind::Error,
            "MISSING" => {
                let token = self.peek();
                let symbols = match token.kind {
                    TokenKind::Identifier => {
                        Some(self.symbols(self.text(token), true, token.start)?)
                    }
                    TokenKind::String => {
                        Some(self.symbols(&unescape(self.text(token)), false, token.start)?)
                    }
                    _ => None,
                };
                if symbols.is_some() {
                    self.bump();
                }
                NodeKind::Missing(symbols)
            }
            text => NodeKind::Symbols(self.symbols(text, true, name.start)?),
        };

        let mut children = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::RightParen => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => return Err(self.syntax("unclosed node pattern")),
                _ if self.is_predicate() => predicates.push(self.predicate()?),
                _ => children.push(self.item(predicates)?),
            }
        }
        if matches!(kind, NodeKind::Missing(_)) && !children.is_empty() {
            return Err(QueryError::new(
                QueryErrorKind::Structure("a missing node has no children"),
                name.start,
            ));
        }
        Ok(ItemKind::Node { kind, children })
    }

    fn alternation(&mut self, predicates: &mut Vec<Predicate>) -> Result<ItemKind, QueryError> {
        let open = self.bump();
        let mut alternatives = Vec::new();
        while !self.at(TokenKind::RightBracket) {
            if self.at(TokenKind::Eof) {
                return Err(self.syntax("unclosed alternation"));
            }
            let alternative = self.item(predicates)?;
            if alternative.quantifier != Quantifier::One {
                let kind = QueryErrorKind::Structure("alternatives cannot be quantified");
                return Err(QueryError::new(kind, open.start));
            }
            alternatives.push(alternative);
        }
        self.bump();
        if alternatives.is_empty() {
            return Err(QueryError::new(QueryErrorKind::Structure("empty alternation"), open.start));
        }
        Ok(ItemKind::Alternation(alternatives))
    }

    fn captures(&mut self) -> Vec<u32> {
        let mut captures = Vec::new();
        while self.at(TokenKind::Capture) {
            let token = self.bump();
            let name = &self.text(token)[1..];
            let index = match self.capture_names.iter().position(|capture| capture == name) {
                Some(index) => index,
                None => {
                    self.capture_names.push(name.to_owned());
                    self.capture_names.len() - 1
                }
            };
            captures.push(index as u32);
        }
        captures
    }

    /// `(#eq? @capture @other)`, `(#eq? @capture "text")` and `#not-eq?`.
    fn predicate(&mut self) -> Result<Predicate, QueryError> {
        self.bump();
        let name = self.bump();
        let negated = match self.text(name) {
            "#eq?" => false,
            "#not-eq?" => true,
            other => {
                let kind = QueryErrorKind::Predicate(format!("unknown predicate `{other}`"));
                return Err(QueryError::new(kind, name.start));
            }
        };

        let mut args = Vec::new();
        while !self.at(TokenKind::RightParen) {
            let token = self.bump();
            let operand = match token.kind {
                TokenKind::Capture => Operand::Capture(self.capture_reference(token)?),
                TokenKind::String => Operand::Text(unescape(self.text(token))),
                _ => {
                    let message = "arguments must be captures or strings".to_owned();
                    let kind = QueryErrorKind::Predicate(message);
                    return Err(QueryError::new(kind, token.start));
                }
            };
            args.push(operand);
        }
        self.bump();

        let mut args = args.into_iter();
        match (args.next(), args.next(), args.next()) {
            (Some(Operand::Capture(capture)), Some(operand), None) => {
                Ok(Predicate::Eq { capture, operand, negated })
            }
            _ => {
                let message =
                    format!("`{}` takes a capture and a capture or string", self.text(name));
                Err(QueryError::new(QueryErrorKind::Predicate(message), name.start))
            }
        }
    }

    fn capture_reference(&self, token: Token) -> Result<u32, QueryError> {
        let name = &self.text(token)[1..];
        match self.capture_names.iter().position(|capture| capture == name) {
            Some(index) => Ok(index as u32),
            None => Err(QueryError::new(QueryErrorKind::Capture(name.to_owned()), token.start)),
        }
    }

    fn symbols(
        &self,
        name: &str,
        named: bool,
        offset: usize,
    ) -> Result<Box<[SymbolId]>, QueryError> {
        let symbols = self.language.table().symbols_for_name(name, named);
        if symbols.is_empty() {
            return Err(QueryError::new(QueryErrorKind::NodeType(name.to_owned()), offset));
        }
        Ok(symbols.into())
    }
}
