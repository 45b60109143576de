//! Tokens of the query language.

use std::str::Chars;

use crate::{QueryError, QueryErrorKind};

const EOF_CHAR: char = '\0';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Colon,
    Question,
    Star,
    Plus,
    /// Node type or field name; `_` included.
    Identifier,
    /// Quoted string, escapes still in place.
    String,
    /// `@name`
    Capture,
    /// `#name?`
    Predicate,
    Eof,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

struct Cursor<'s> {
    chars: Chars<'s>,
    len: usize,
}

impl<'s> Cursor<'s> {
    fn new(source: &'s str) -> Self {
        Self { chars: source.chars(), len: source.len() }
    }

    fn offset(&self) -> usize {
        self.len - self.chars.as_str().len()
    }

    fn peek(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    fn advance(&mut self) -> char {
        self.chars.next().unwrap_or(EOF_CHAR)
    }

    fn advance_while(&mut self, f: impl Fn(char) -> bool) {
        while !self.is_eof() && f(self.peek()) {
            self.advance();
        }
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, QueryError> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();
    loop {
        cursor.advance_while(char::is_whitespace);
        let start = cursor.offset();
        if cursor.is_eof() {
            tokens.push(Token { kind: TokenKind::Eof, start, end: start });
            return Ok(tokens);
        }

        let kind = match cursor.advance() {
            ';' => {
                cursor.advance_while(|ch| ch != '\n');
                continue;
            }
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '*' => TokenKind::Star,
            '+' => TokenKind::Plus,
            '"' => {
                string(&mut cursor, start)?;
                TokenKind::String
            }
            '@' => {
                name(&mut cursor, start, "expected a capture name after `@`")?;
                TokenKind::Capture
            }
            '#' => {
                name(&mut cursor, start, "expected a predicate name after `#`")?;
                if matches!(cursor.peek(), '?' | '!') {
                    cursor.advance();
                }
                TokenKind::Predicate
            }
            ch if is_name_char(ch) => {
                cursor.advance_while(is_name_char);
                TokenKind::Identifier
            }
            _ => return Err(QueryError::new(QueryErrorKind::Syntax("unexpected character"), start)),
        };
        tokens.push(Token { kind, start, end: cursor.offset() });
    }
}

fn name(cursor: &mut Cursor<'_>, start: usize, message: &'static str) -> Result<(), QueryError> {
    if !is_name_char(cursor.peek()) {
        return Err(QueryError::new(QueryErrorKind::Syntax(message), start));
    }
    cursor.advance_while(is_name_char);
    Ok(())
}

fn string(cursor: &mut Cursor<'_>, start: usize) -> Result<(), QueryError> {
    loop {
        if cursor.is_eof() {
            return Err(QueryError::new(QueryErrorKind::Syntax("unterminated string"), start));
        }
        match cursor.advance() {
            '"' => return Ok(()),
            '\\' => {
                cursor.advance();
            }
            _ => {}
        }
    }
}

/// Contents of a string token with escapes resolved.
pub(crate) fn unescape(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn tokens() {
        use TokenKind::*;

        assert_eq!(
            kinds("(sum left: (_) @l \"+\")* ; trailing\n[_ (ERROR)]? (#eq? @l \"x\")"),
            [
                LeftParen, Identifier, Identifier, Colon, LeftParen, Identifier, RightParen,
                Capture, String, RightParen, Star, LeftBracket, Identifier, LeftParen, Identifier,
                RightParen, RightBracket, Question, LeftParen, Predicate, Capture, String,
                RightParen, Eof,
            ]
        );
        assert_eq!(unescape(r#""a\"b\\c\n""#), "a\"b\\c\n");
    }

    #[test]
    fn errors() {
        let err = tokenize("(a \"open").unwrap_err();
        assert_eq!(err, QueryError::new(QueryErrorKind::Syntax("unterminated string"), 3));
        let err = tokenize("(a) @ b").unwrap_err();
        assert_eq!(err.offset, 4);
        assert!(tokenize("(a) $").is_err());
    }
}
