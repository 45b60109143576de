//! Binary table format.
//!
//! Layout: the magic bytes `ARBR`, a little-endian `u16` format version, a
//! reserved `u16` of flags, then the sections in a fixed order. Every count is
//! a `u32`, every string is a `u32` byte length followed by UTF-8 bytes, and
//! all integers are little-endian.

use crate::{
    FieldId, GrammarLoadError, GrammarTable, LexAccept, LexModeId, LexState, LexStateId, LexTable,
    LexTransition, ParseAction, ParseState, Production, ProductionId, StateId, SymbolId,
    SymbolKind, SymbolMetadata, SymbolSet, TableParts,
};

pub(crate) const MAGIC: &[u8; 4] = b"ARBR";
pub(crate) const VERSION: u16 = 1;

const NO_FIELD: u16 = u16::MAX;

mod action_tag {
    pub(super) const SHIFT: u8 = 0;
    pub(super) const REDUCE: u8 = 1;
    pub(super) const ACCEPT: u8 = 2;
}

impl GrammarTable {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GrammarLoadError> {
        let mut reader = Reader { data: bytes, offset: 0 };
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(GrammarLoadError::BadMagic);
        }
        let version = reader.u16()?;
        if version != VERSION {
            return Err(GrammarLoadError::UnsupportedVersion { found: version, expected: VERSION });
        }
        let _flags = reader.u16()?;

        let parts = read_parts(&mut reader)?;
        if reader.offset != bytes.len() {
            return Err(GrammarLoadError::Malformed(format!(
                "{} trailing bytes",
                bytes.len() - reader.offset
            )));
        }

        let table = Self::new(parts)?;
        tracing::debug!(
            name = table.name(),
            symbols = table.symbol_count(),
            states = table.state_count(),
            lex_states = table.lexer().states.len(),
            "loaded grammar table"
        );
        Ok(table)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::default();
        writer.bytes(MAGIC);
        writer.u16(VERSION);
        writer.u16(0);

        writer.str(&self.name);

        writer.len(self.symbols.len());
        for symbol in &self.symbols {
            writer.str(&symbol.name);
            writer.u8(symbol.kind.tag());
            writer.u8(symbol.flags());
        }

        writer.len(self.fields.len());
        for field in &self.fields {
            writer.str(field);
        }

        writer.len(self.productions.len());
        for production in &self.productions {
            writer.u16(production.lhs.raw());
            writer.u16(production.child_count);
            writer.i32(production.dynamic_precedence);
            for field in &production.fields {
                writer.u16(field.map_or(NO_FIELD, FieldId::raw));
            }
        }

        writer.len(self.lexer.states.len());
        for state in &self.lexer.states {
            writer.len(state.transitions.len());
            for edge in &state.transitions {
                writer.u32(edge.start);
                writer.u32(edge.end);
                writer.u32(edge.target.raw());
            }
            writer.len(state.epsilon.len());
            for target in &state.epsilon {
                writer.u32(target.raw());
            }
            match state.accept {
                Some(accept) => {
                    writer.u8(1);
                    writer.u16(accept.symbol.raw());
                    writer.i32(accept.precedence);
                    writer.u8(u8::from(accept.literal));
                }
                None => writer.u8(0),
            }
        }

        writer.len(self.lexer.starts.len());
        for (symbol, start) in &self.lexer.starts {
            writer.u16(symbol.raw());
            writer.u32(start.raw());
        }

        writer.len(self.lex_modes.len());
        for mode in &self.lex_modes {
            writer.len(mode.len());
            for symbol in mode.iter() {
                writer.u16(symbol.raw());
            }
        }

        writer.len(self.states.len());
        for state in &self.states {
            writer.u16(state.lex_mode().raw());
            writer.len(state.actions().count());
            for (symbol, actions) in state.actions() {
                writer.u16(symbol.raw());
                writer.len(actions.len());
                for action in actions {
                    match *action {
                        ParseAction::Shift(target) => {
                            writer.u8(action_tag::SHIFT);
                            writer.u16(target.raw());
                        }
                        ParseAction::Reduce(production) => {
                            writer.u8(action_tag::REDUCE);
                            writer.u16(production.raw());
                        }
                        ParseAction::Accept => writer.u8(action_tag::ACCEPT),
                    }
                }
            }
            writer.len(state.gotos().len());
            for (symbol, target) in state.gotos() {
                writer.u16(symbol.raw());
                writer.u16(target.raw());
            }
        }

        writer.len(self.externals.len());
        for symbol in &self.externals {
            writer.u16(symbol.raw());
        }

        writer.buf
    }
}

fn read_parts(reader: &mut Reader<'_>) -> Result<TableParts, GrammarLoadError> {
    let name = reader.str()?;

    let symbols = reader.list(|reader| {
        let name = reader.str()?;
        let offset = reader.offset;
        let tag = reader.u8()?;
        let kind = SymbolKind::from_tag(tag).ok_or(GrammarLoadError::InvalidTag {
            what: "symbol kind",
            tag,
            offset,
        })?;
        let flags = reader.u8()?;
        Ok(SymbolMetadata::new(name, kind).with_flags(flags))
    })?;

    let fields = reader.list(|reader| reader.str().map(String::into_boxed_str))?;

    let productions = reader.list(|reader| {
        let lhs = SymbolId::new(reader.u16()?);
        let child_count = reader.u16()?;
        let dynamic_precedence = reader.i32()?;
        let fields = (0..child_count)
            .map(|_| {
                let raw = reader.u16()?;
                Ok((raw != NO_FIELD).then_some(FieldId::new(raw)))
            })
            .collect::<Result<_, GrammarLoadError>>()?;
        Ok(Production { lhs, child_count, dynamic_precedence, fields })
    })?;

    let lex_states = reader.list(|reader| {
        let transitions = reader.list(|reader| {
            Ok(LexTransition {
                start: reader.u32()?,
                end: reader.u32()?,
                target: LexStateId::new(reader.u32()?),
            })
        })?;
        let epsilon = reader.list(|reader| reader.u32().map(LexStateId::new))?;
        let offset = reader.offset;
        let accept = match reader.u8()? {
            0 => None,
            1 => Some(LexAccept {
                symbol: SymbolId::new(reader.u16()?),
                precedence: reader.i32()?,
                literal: reader.u8()? != 0,
            }),
            tag => return Err(GrammarLoadError::InvalidTag { what: "lex accept", tag, offset }),
        };
        Ok(LexState { transitions: transitions.into(), epsilon: epsilon.into(), accept })
    })?;

    let starts = reader
        .list(|reader| Ok((SymbolId::new(reader.u16()?), LexStateId::new(reader.u32()?))))?;

    let lex_modes = reader.list(|reader| {
        let members = reader.list(|reader| reader.u16().map(SymbolId::new))?;
        Ok(members.into_iter().collect::<SymbolSet>())
    })?;

    let states = reader.list(|reader| {
        let lex_mode = LexModeId::new(reader.u16()?);
        let actions = reader.list(|reader| {
            let symbol = SymbolId::new(reader.u16()?);
            let actions = reader.list(|reader| {
                let offset = reader.offset;
                match reader.u8()? {
                    action_tag::SHIFT => Ok(ParseAction::Shift(StateId::new(reader.u16()?))),
                    action_tag::REDUCE => {
                        Ok(ParseAction::Reduce(ProductionId::new(reader.u16()?)))
                    }
                    action_tag::ACCEPT => Ok(ParseAction::Accept),
                    tag => Err(GrammarLoadError::InvalidTag { what: "parse action", tag, offset }),
                }
            })?;
            Ok((symbol, actions.into_boxed_slice()))
        })?;
        let gotos = reader
            .list(|reader| Ok((SymbolId::new(reader.u16()?), StateId::new(reader.u16()?))))?;
        Ok(ParseState::new(actions, gotos, lex_mode))
    })?;

    let externals = reader.list(|reader| reader.u16().map(SymbolId::new))?;

    Ok(TableParts {
        name,
        symbols,
        fields,
        productions,
        states,
        lex_modes,
        lexer: LexTable { states: lex_states.into(), starts: starts.into() },
        externals,
    })
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.bytes(&value.to_le_bytes());
    }

    fn len(&mut self, len: usize) {
        self.u32(len as u32);
    }

    fn str(&mut self, value: &str) {
        self.len(value.len());
        self.bytes(value.as_bytes());
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], GrammarLoadError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(GrammarLoadError::Truncated { offset: self.offset })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], GrammarLoadError> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn u8(&mut self) -> Result<u8, GrammarLoadError> {
        self.array().map(u8::from_le_bytes)
    }

    fn u16(&mut self) -> Result<u16, GrammarLoadError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, GrammarLoadError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, GrammarLoadError> {
        self.array().map(i32::from_le_bytes)
    }

    fn str(&mut self) -> Result<String, GrammarLoadError> {
        let len = self.u32()? as usize;
        let offset = self.offset;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_utf8| GrammarLoadError::InvalidUtf8 { offset })
    }

    /// Reads a `u32` count followed by that many items.
    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, GrammarLoadError>,
    ) -> Result<Vec<T>, GrammarLoadError> {
        let count = self.u32()? as usize;
        // A count larger than the remaining input is corrupt; don't let it
        // drive the allocation.
        let mut items = Vec::with_capacity(count.min(self.data.len() - self.offset));
        for _ in 0..count {
            items.push(item(self)?);
        }
        Ok(items)
    }
}
