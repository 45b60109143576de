//! Table-driven lexer.
//!
//! Tokens are recognised by simulating the grammar's lexer automaton, limited
//! to the terminals the parser can accept in its current state. The lexer
//! keeps no state between tokens, so lexing can resume at any offset.

mod cursor;

use arbor_grammar::{Language, LexAccept, LexStateId, LexTable, ScanMatch, SymbolId, SymbolSet};
use arbor_tree::Length;
use cursor::{Cursor, decode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub symbol: SymbolId,
    pub start: Length,
    pub size: Length,
    /// Bytes past the end of the token that were examined to produce it. The
    /// end of input counts as one byte.
    pub lookahead_bytes: u32,
    pub is_extra: bool,
    /// No terminal matched; the token covers a single character.
    pub is_error: bool,
}

impl Token {
    pub fn end(&self) -> Length {
        self.start + self.size
    }

    pub fn is_end(&self) -> bool {
        self.symbol == SymbolId::END
    }
}

pub struct Lexer<'t> {
    language: &'t Language,
    text: &'t [u8],
    extras: SymbolSet,
    externals: SymbolSet,
}

impl<'t> Lexer<'t> {
    pub fn new(language: &'t Language, text: &'t [u8]) -> Self {
        let table = language.table();
        let extras = table
            .symbols()
            .filter(|(_, metadata)| metadata.extra && metadata.is_terminal())
            .map(|(symbol, _)| symbol)
            .collect();
        let externals = table.externals().iter().copied().collect();
        Self { language, text, extras, externals }
    }

    pub fn text(&self) -> &'t [u8] {
        self.text
    }

    /// Lexes one token starting at `start`.
    ///
    /// `valid` is the set of terminals the parser can accept; extras are
    /// always accepted. Never fails: unknown characters produce an error token
    /// and the end of the input produces a zero-width `end` token.
    pub fn lex(&self, start: Length, valid: &SymbolSet) -> Token {
        let offset = usize::from(start.bytes);

        if let Some(token) = self.lex_external(start, valid) {
            return token;
        }

        let mut cursor = Cursor::new(self.text, offset);
        if let Some((accept, end)) = self.lex_table(&mut cursor, valid) {
            return self.token(accept.symbol, start, end, cursor.examined_end(), false);
        }

        if offset >= self.text.len() {
            return Token {
                symbol: SymbolId::END,
                start,
                size: Length::ZERO,
                lookahead_bytes: 1,
                is_extra: false,
                is_error: false,
            };
        }

        let len = decode(&self.text[offset..]).map_or(1, |(_, len)| len);
        let end = offset + len;
        self.token(SymbolId::ERROR, start, end, cursor.examined_end().max(end), true)
    }

    /// Iterates tokens from the start of the text up to and including `end`,
    /// using the same valid set throughout.
    pub fn tokens<'l>(&'l self, valid: &'l SymbolSet) -> Tokens<'l, 't> {
        Tokens { lexer: self, valid, position: Length::ZERO, done: false }
    }

    fn token(
        &self,
        symbol: SymbolId,
        start: Length,
        end: usize,
        examined_end: usize,
        is_error: bool,
    ) -> Token {
        let offset = usize::from(start.bytes);
        let is_extra = !is_error && self.extras.contains(symbol);
        Token {
            symbol,
            start,
            size: Length::of(&self.text[offset..end]),
            lookahead_bytes: examined_end.saturating_sub(end) as u32,
            is_extra,
            is_error,
        }
    }

    fn lex_external(&self, start: Length, valid: &SymbolSet) -> Option<Token> {
        let scanner = self.language.scanner()?;
        let valid_externals: SymbolSet = self
            .externals
            .iter()
            .filter(|&symbol| valid.contains(symbol) || self.extras.contains(symbol))
            .collect();
        if valid_externals.is_empty() {
            return None;
        }

        let offset = usize::from(start.bytes);
        let mut cursor = Cursor::new(self.text, offset);
        let ScanMatch { symbol, len } = scanner.scan(&mut cursor, &valid_externals)?;
        let end = offset + len as usize;
        if len == 0 || !valid_externals.contains(symbol) || end > self.text.len() {
            return None;
        }
        Some(self.token(symbol, start, end, cursor.examined_end(), false))
    }

    /// Longest match over the automaton; ties go to [`LexAccept::outranks`].
    fn lex_table(&self, cursor: &mut Cursor<'t>, valid: &SymbolSet) -> Option<(LexAccept, usize)> {
        let lexer = self.language.table().lexer();
        let mut closure = Closure::new(lexer.states.len());

        let mut current = Vec::new();
        for &(symbol, start) in lexer.starts.iter() {
            if valid.contains(symbol) || self.extras.contains(symbol) {
                closure.add(lexer, start, &mut current);
            }
        }

        let mut best: Option<(LexAccept, usize)> = None;
        let mut next = Vec::new();
        while !current.is_empty() {
            let Some((ch, _)) = cursor.peek() else {
                break;
            };

            closure.clear();
            next.clear();
            for &state in &current {
                for target in lexer.step(state, ch) {
                    closure.add(lexer, target, &mut next);
                }
            }
            if next.is_empty() {
                break;
            }
            cursor.bump();

            let accept = next
                .iter()
                .filter_map(|&state| lexer.state(state).accept)
                .filter(|accept| {
                    valid.contains(accept.symbol) || self.extras.contains(accept.symbol)
                })
                .reduce(|best, accept| if accept.outranks(&best) { accept } else { best });
            if let Some(accept) = accept {
                best = Some((accept, cursor.pos()));
            }

            std::mem::swap(&mut current, &mut next);
        }

        best
    }
}

/// Epsilon closure with a generation-stamped visited set.
struct Closure {
    visited: Vec<u32>,
    generation: u32,
    stack: Vec<LexStateId>,
}

impl Closure {
    fn new(len: usize) -> Self {
        Self { visited: vec![0; len], generation: 1, stack: Vec::new() }
    }

    fn clear(&mut self) {
        self.generation += 1;
    }

    fn add(&mut self, lexer: &LexTable, state: LexStateId, out: &mut Vec<LexStateId>) {
        self.stack.push(state);
        while let Some(state) = self.stack.pop() {
            let seen = &mut self.visited[state.index()];
            if *seen == self.generation {
                continue;
            }
            *seen = self.generation;
            out.push(state);
            self.stack.extend(lexer.state(state).epsilon.iter().copied());
        }
    }
}

/// Lazy sequence of tokens produced by [`Lexer::tokens`].
pub struct Tokens<'l, 't> {
    lexer: &'l Lexer<'t>,
    valid: &'l SymbolSet,
    position: Length,
    done: bool,
}

impl Iterator for Tokens<'_, '_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let token = self.lexer.lex(self.position, self.valid);
        self.position = token.end();
        self.done = token.is_end();
        Some(token)
    }
}

#[cfg(test)]
mod tests;
