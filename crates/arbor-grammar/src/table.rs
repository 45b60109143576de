use rustc_hash::FxHashMap;

use crate::{
    GrammarLoadError, LexStateId, LexTable, SymbolId, SymbolKind, SymbolMetadata, SymbolSet,
};

macro_rules! index_newtype {
    ($($(#[$meta:meta])* $name:ident($repr:ty);)*) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(raw: $repr) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> $repr {
                self.0
            }

            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    )*};
}

index_newtype! {
    /// Parse automaton state. State `0` is the start state.
    StateId(u16);
    ProductionId(u16);
    FieldId(u16);
    /// Index of a set of terminals the lexer should recognise.
    LexModeId(u16);
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParseAction {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Production {
    pub lhs: SymbolId,
    pub child_count: u16,
    /// Preference applied when the GLR driver must choose between parses.
    pub dynamic_precedence: i32,
    /// Field of each child, indexed by child position (extras excluded).
    pub fields: Box<[Option<FieldId>]>,
}

impl Production {
    pub fn field(&self, child: usize) -> Option<FieldId> {
        self.fields.get(child).copied().flatten()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseState {
    actions: Box<[(SymbolId, Box<[ParseAction]>)]>,
    gotos: Box<[(SymbolId, StateId)]>,
    lex_mode: LexModeId,
}

impl ParseState {
    /// Entries are sorted by symbol; a symbol listed twice keeps its first
    /// action list.
    pub fn new(
        mut actions: Vec<(SymbolId, Box<[ParseAction]>)>,
        mut gotos: Vec<(SymbolId, StateId)>,
        lex_mode: LexModeId,
    ) -> Self {
        actions.sort_by_key(|(symbol, _)| *symbol);
        actions.dedup_by_key(|(symbol, _)| *symbol);
        gotos.sort_by_key(|(symbol, _)| *symbol);
        gotos.dedup_by_key(|(symbol, _)| *symbol);
        Self { actions: actions.into(), gotos: gotos.into(), lex_mode }
    }

    pub fn actions(&self) -> impl Iterator<Item = (SymbolId, &[ParseAction])> + '_ {
        self.actions.iter().map(|(symbol, actions)| (*symbol, &actions[..]))
    }

    pub fn gotos(&self) -> &[(SymbolId, StateId)] {
        &self.gotos
    }

    pub fn lex_mode(&self) -> LexModeId {
        self.lex_mode
    }

    fn lookup_actions(&self, symbol: SymbolId) -> &[ParseAction] {
        match self.actions.binary_search_by_key(&symbol, |(symbol, _)| *symbol) {
            Ok(index) => &self.actions[index].1,
            Err(_) => &[],
        }
    }

    fn lookup_goto(&self, symbol: SymbolId) -> Option<StateId> {
        let index = self.gotos.binary_search_by_key(&symbol, |(symbol, _)| *symbol).ok()?;
        Some(self.gotos[index].1)
    }
}

/// Raw contents of a table, checked by [`GrammarTable::new`].
#[derive(Clone, Debug, Default)]
pub struct TableParts {
    pub name: String,
    pub symbols: Vec<SymbolMetadata>,
    pub fields: Vec<Box<str>>,
    pub productions: Vec<Production>,
    pub states: Vec<ParseState>,
    pub lex_modes: Vec<SymbolSet>,
    pub lexer: LexTable,
    pub externals: Vec<SymbolId>,
}

#[derive(Debug)]
pub struct GrammarTable {
    pub(crate) name: Box<str>,
    pub(crate) symbols: Box<[SymbolMetadata]>,
    pub(crate) fields: Box<[Box<str>]>,
    pub(crate) productions: Box<[Production]>,
    pub(crate) states: Box<[ParseState]>,
    pub(crate) lex_modes: Box<[SymbolSet]>,
    pub(crate) lexer: LexTable,
    pub(crate) externals: Box<[SymbolId]>,
    error_mode: SymbolSet,
    names: FxHashMap<(Box<str>, bool), Vec<SymbolId>>,
}

impl GrammarTable {
    /// Validates `parts` and builds the lookup indexes.
    pub fn new(parts: TableParts) -> Result<Self, GrammarLoadError> {
        validate(&parts)?;

        let TableParts { name, symbols, fields, productions, states, lex_modes, lexer, externals } =
            parts;

        let error_mode = symbols
            .iter()
            .enumerate()
            .filter(|(_, metadata)| metadata.is_terminal())
            .map(|(index, _)| SymbolId::new(index as u16))
            .collect();

        let mut names: FxHashMap<_, Vec<_>> = FxHashMap::default();
        for (index, metadata) in symbols.iter().enumerate() {
            names
                .entry((metadata.name.clone(), metadata.named))
                .or_default()
                .push(SymbolId::new(index as u16));
        }

        Ok(Self {
            name: name.into(),
            symbols: symbols.into(),
            fields: fields.into(),
            productions: productions.into(),
            states: states.into(),
            lex_modes: lex_modes.into(),
            lexer,
            externals: externals.into(),
            error_mode,
            names,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn start_state(&self) -> StateId {
        StateId::new(0)
    }

    pub fn symbol_metadata(&self, symbol: SymbolId) -> &SymbolMetadata {
        &self.symbols[symbol.index()]
    }

    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        &self.symbols[symbol.index()].name
    }

    pub fn is_terminal(&self, symbol: SymbolId) -> bool {
        self.symbol_metadata(symbol).is_terminal()
    }

    pub fn is_external(&self, symbol: SymbolId) -> bool {
        self.symbol_metadata(symbol).kind == SymbolKind::External
    }

    /// All symbols with the given name and namedness. Several symbols can
    /// share a name when a grammar aliases them.
    pub fn symbols_for_name(&self, name: &str, named: bool) -> &[SymbolId] {
        self.names.get(&(Box::from(name), named)).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &SymbolMetadata)> + '_ {
        let symbols = self.symbols.iter().enumerate();
        symbols.map(|(index, metadata)| (SymbolId::new(index as u16), metadata))
    }

    pub fn field_name(&self, field: FieldId) -> &str {
        &self.fields[field.index()]
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        let index = self.fields.iter().position(|field| &**field == name)?;
        Some(FieldId::new(index as u16))
    }

    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id.index()]
    }

    pub fn state(&self, state: StateId) -> &ParseState {
        &self.states[state.index()]
    }

    /// Actions for `symbol` in `state`. More than one action means the
    /// grammar has an unresolved conflict there.
    pub fn actions(&self, state: StateId, symbol: SymbolId) -> &[ParseAction] {
        self.state(state).lookup_actions(symbol)
    }

    pub fn goto(&self, state: StateId, symbol: SymbolId) -> Option<StateId> {
        self.state(state).lookup_goto(symbol)
    }

    /// Terminals the lexer should look for in `state`.
    pub fn lex_mode(&self, state: StateId) -> &SymbolSet {
        &self.lex_modes[self.state(state).lex_mode.index()]
    }

    /// Every lexable symbol; used while recovering from errors.
    pub fn error_mode(&self) -> &SymbolSet {
        &self.error_mode
    }

    /// Terminals that have at least one action in `state`.
    pub fn expected_symbols(&self, state: StateId) -> impl Iterator<Item = SymbolId> + '_ {
        self.state(state).actions.iter().map(|(symbol, _)| *symbol)
    }

    pub fn lexer(&self) -> &LexTable {
        &self.lexer
    }

    pub fn externals(&self) -> &[SymbolId] {
        &self.externals
    }
}

fn check(index: usize, len: usize, what: &'static str) -> Result<(), GrammarLoadError> {
    if index < len { Ok(()) } else { Err(GrammarLoadError::InvalidReference { what, index }) }
}

fn validate(parts: &TableParts) -> Result<(), GrammarLoadError> {
    let symbol_count = parts.symbols.len();
    if symbol_count > usize::from(u16::MAX) {
        return Err(GrammarLoadError::Malformed(format!("{symbol_count} symbols")));
    }
    match parts.symbols.get(..2) {
        Some([end, error])
            if &*end.name == "end"
                && end.kind == SymbolKind::Terminal
                && &*error.name == "ERROR" => {}
        _ => return Err(GrammarLoadError::Malformed("missing builtin symbols".to_owned())),
    }
    if parts.states.is_empty() {
        return Err(GrammarLoadError::Malformed("no parse states".to_owned()));
    }

    let symbol = |symbol: SymbolId| check(symbol.index(), symbol_count, "symbol");
    let state = |state: StateId| check(state.index(), parts.states.len(), "state");

    for production in &parts.productions {
        symbol(production.lhs)?;
        if parts.symbols[production.lhs.index()].is_terminal() {
            return Err(GrammarLoadError::Malformed(format!(
                "production for terminal `{}`",
                parts.symbols[production.lhs.index()].name
            )));
        }
        if production.fields.len() != usize::from(production.child_count) {
            return Err(GrammarLoadError::Malformed(format!(
                "production for `{}` has {} field slots for {} children",
                parts.symbols[production.lhs.index()].name,
                production.fields.len(),
                production.child_count
            )));
        }
        for field in production.fields.iter().flatten() {
            check(field.index(), parts.fields.len(), "field")?;
        }
    }

    for parse_state in &parts.states {
        check(parse_state.lex_mode.index(), parts.lex_modes.len(), "lex mode")?;
        for (lookahead, actions) in parse_state.actions.iter() {
            symbol(*lookahead)?;
            for action in actions {
                match *action {
                    ParseAction::Shift(target) => state(target)?,
                    ParseAction::Reduce(production) => {
                        check(production.index(), parts.productions.len(), "production")?;
                    }
                    ParseAction::Accept => {}
                }
            }
        }
        for &(lhs, target) in &parse_state.gotos {
            symbol(lhs)?;
            state(target)?;
        }
    }

    for mode in &parts.lex_modes {
        for member in mode.iter() {
            symbol(member)?;
        }
    }

    let lex_state = |id: LexStateId| check(id.index(), parts.lexer.states.len(), "lex state");
    for lex in &parts.lexer.states {
        for edge in &lex.transitions {
            lex_state(edge.target)?;
            if edge.start > edge.end {
                return Err(GrammarLoadError::Malformed("empty character range".to_owned()));
            }
        }
        for &target in &lex.epsilon {
            lex_state(target)?;
        }
        if let Some(accept) = lex.accept {
            symbol(accept.symbol)?;
        }
    }
    for &(terminal, start) in &parts.lexer.starts {
        symbol(terminal)?;
        lex_state(start)?;
    }

    for &external in &parts.externals {
        symbol(external)?;
        if parts.symbols[external.index()].kind != SymbolKind::External {
            return Err(GrammarLoadError::Malformed(format!(
                "`{}` is listed as external",
                parts.symbols[external.index()].name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{LexAccept, LexState, LexTransition};

    /// `source -> "a"`, with `label: "a"` as a field.
    pub(crate) fn single_token_parts() -> TableParts {
        let end = SymbolMetadata::new("end", SymbolKind::Terminal);
        let error = SymbolMetadata::new("ERROR", SymbolKind::NonTerminal);
        let mut a = SymbolMetadata::new("a", SymbolKind::Terminal);
        a.named = false;
        let source = SymbolMetadata::new("source", SymbolKind::NonTerminal);

        let a_id = SymbolId::new(2);
        let source_id = SymbolId::new(3);

        TableParts {
            name: "single".to_owned(),
            symbols: vec![end, error, a, source],
            fields: vec!["label".into()],
            productions: vec![Production {
                lhs: source_id,
                child_count: 1,
                dynamic_precedence: 0,
                fields: vec![Some(FieldId::new(0))].into(),
            }],
            states: vec![
                ParseState::new(
                    vec![(a_id, vec![ParseAction::Shift(StateId::new(1))].into())],
                    vec![(source_id, StateId::new(2))],
                    LexModeId::new(0),
                ),
                ParseState::new(
                    vec![(SymbolId::END, vec![ParseAction::Reduce(ProductionId::new(0))].into())],
                    vec![],
                    LexModeId::new(1),
                ),
                ParseState::new(
                    vec![(SymbolId::END, vec![ParseAction::Accept].into())],
                    vec![],
                    LexModeId::new(1),
                ),
            ],
            lex_modes: vec![[a_id].into_iter().collect(), [SymbolId::END].into_iter().collect()],
            lexer: LexTable {
                states: vec![
                    LexState {
                        transitions: vec![LexTransition {
                            start: 'a' as u32,
                            end: 'a' as u32,
                            target: LexStateId::new(1),
                        }]
                        .into(),
                        ..LexState::default()
                    },
                    LexState {
                        accept: Some(LexAccept { symbol: a_id, precedence: 0, literal: true }),
                        ..LexState::default()
                    },
                ]
                .into(),
                starts: vec![(a_id, LexStateId::new(0))].into(),
            },
            externals: vec![],
        }
    }

    #[test]
    fn lookups() {
        let table = GrammarTable::new(single_token_parts()).unwrap();
        let a = SymbolId::new(2);
        let source = SymbolId::new(3);

        assert_eq!(table.symbol_name(SymbolId::END), "end");
        assert_eq!(table.actions(StateId::new(0), a), &[ParseAction::Shift(StateId::new(1))]);
        assert_eq!(table.actions(StateId::new(0), SymbolId::END), &[]);
        assert_eq!(table.goto(StateId::new(0), source), Some(StateId::new(2)));
        assert_eq!(table.goto(StateId::new(1), source), None);
        assert!(table.lex_mode(StateId::new(0)).contains(a));
        assert_eq!(table.symbols_for_name("a", false), &[a]);
        assert_eq!(table.symbols_for_name("a", true), &[]);
        assert_eq!(table.field_id("label"), Some(FieldId::new(0)));
        assert_eq!(table.production(ProductionId::new(0)).field(0), Some(FieldId::new(0)));
        assert_eq!(table.expected_symbols(StateId::new(2)).collect::<Vec<_>>(), [SymbolId::END]);
        assert!(table.error_mode().contains(a));
        assert!(!table.error_mode().contains(source));
    }

    #[test]
    fn rejects_dangling_shift() {
        let mut parts = single_token_parts();
        parts.states[0] = ParseState::new(
            vec![(SymbolId::new(2), vec![ParseAction::Shift(StateId::new(9))].into())],
            vec![],
            LexModeId::new(0),
        );
        assert_eq!(
            GrammarTable::new(parts).unwrap_err(),
            GrammarLoadError::InvalidReference { what: "state", index: 9 }
        );
    }

    #[test]
    fn rejects_missing_builtins() {
        let mut parts = single_token_parts();
        parts.symbols.remove(0);
        assert!(matches!(GrammarTable::new(parts), Err(GrammarLoadError::Malformed(_))));
    }

    #[test]
    fn rejects_field_count_mismatch() {
        let mut parts = single_token_parts();
        parts.productions[0].fields = vec![].into();
        assert!(matches!(GrammarTable::new(parts), Err(GrammarLoadError::Malformed(_))));
    }
}
