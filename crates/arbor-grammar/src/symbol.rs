use std::fmt;

/// Index of a symbol in its grammar table.
///
/// Ids `0` and `1` are reserved for [`SymbolId::END`] and [`SymbolId::ERROR`];
/// everything else is assigned by the table generator.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SymbolId(u16);

impl SymbolId {
    /// The zero-width token produced at the end of the input.
    pub const END: Self = Self(0);
    /// The builtin symbol for unparseable input.
    pub const ERROR: Self = Self(1);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SymbolKind {
    /// Produced by the table-driven lexer.
    Terminal,
    /// Produced by the language's external scanner.
    External,
    /// Produced by a reduction.
    NonTerminal,
}

impl SymbolKind {
    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Terminal => 0,
            Self::External => 1,
            Self::NonTerminal => 2,
        }
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Terminal),
            1 => Some(Self::External),
            2 => Some(Self::NonTerminal),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SymbolMetadata {
    pub name: Box<str>,
    pub kind: SymbolKind,
    /// Hidden symbols are kept in the tree but skipped by navigation.
    pub visible: bool,
    /// Named symbols come from grammar rules; anonymous ones from literals.
    pub named: bool,
    /// Extras may appear anywhere between tokens.
    pub extra: bool,
}

impl SymbolMetadata {
    pub fn new(name: impl Into<Box<str>>, kind: SymbolKind) -> Self {
        Self { name: name.into(), kind, visible: true, named: true, extra: false }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind != SymbolKind::NonTerminal
    }

    const VISIBLE: u8 = 0b001;
    const NAMED: u8 = 0b010;
    const EXTRA: u8 = 0b100;

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.visible {
            flags |= Self::VISIBLE;
        }
        if self.named {
            flags |= Self::NAMED;
        }
        if self.extra {
            flags |= Self::EXTRA;
        }
        flags
    }

    pub(crate) fn with_flags(mut self, flags: u8) -> Self {
        self.visible = flags & Self::VISIBLE != 0;
        self.named = flags & Self::NAMED != 0;
        self.extra = flags & Self::EXTRA != 0;
        self
    }
}
