/// Right-hand side of a grammar rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Matches nothing.
    Blank,
    /// Reference to another rule or external token by name.
    Symbol(String),
    /// Anonymous token matching the exact text.
    String(String),
    /// Anonymous token matching a character pattern.
    Pattern(Pattern),
    Seq(Vec<Rule>),
    Choice(Vec<Rule>),
    /// Zero or more repetitions.
    Repeat(Box<Rule>),
    /// One or more repetitions.
    Repeat1(Box<Rule>),
    Optional(Box<Rule>),
    Field(String, Box<Rule>),
    Prec(Precedence, Box<Rule>),
    /// Collapses a combination of strings and patterns into one token.
    Token(Box<Rule>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precedence {
    /// Resolves conflicts by comparing numbers only.
    Static(i32),
    /// Same number wins by reducing.
    Left(i32),
    /// Same number wins by shifting.
    Right(i32),
    /// Preference between complete parses when the grammar stays ambiguous.
    Dynamic(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Assoc {
    Left,
    Right,
}

/// Character-level pattern, built from combinators rather than parsed from a
/// regular expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pattern {
    Literal(String),
    /// Any character in one of the inclusive ranges, or outside all of them
    /// when `negated` is set.
    Class { ranges: Vec<(char, char)>, negated: bool },
    Seq(Vec<Pattern>),
    Choice(Vec<Pattern>),
    Repeat(Box<Pattern>),
    Repeat1(Box<Pattern>),
    Optional(Box<Pattern>),
}

impl Pattern {
    pub fn literal(text: &str) -> Self {
        Self::Literal(text.to_owned())
    }

    pub fn range(start: char, end: char) -> Self {
        Self::Class { ranges: vec![(start, end)], negated: false }
    }

    pub fn ranges(ranges: &[(char, char)]) -> Self {
        Self::Class { ranges: ranges.to_vec(), negated: false }
    }

    /// Any one of the characters in `chars`.
    pub fn one_of(chars: &str) -> Self {
        Self::Class { ranges: chars.chars().map(|ch| (ch, ch)).collect(), negated: false }
    }

    /// Any character except the ones in `chars`.
    pub fn none_of(chars: &str) -> Self {
        Self::Class { ranges: chars.chars().map(|ch| (ch, ch)).collect(), negated: true }
    }

    pub fn any() -> Self {
        Self::Class { ranges: Vec::new(), negated: true }
    }

    pub fn digit() -> Self {
        Self::range('0', '9')
    }

    pub fn seq(parts: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Seq(parts.into_iter().collect())
    }

    pub fn choice(parts: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Choice(parts.into_iter().collect())
    }

    pub fn repeat(self) -> Self {
        Self::Repeat(Box::new(self))
    }

    pub fn repeat1(self) -> Self {
        Self::Repeat1(Box::new(self))
    }

    pub fn optional(self) -> Self {
        Self::Optional(Box::new(self))
    }
}

pub fn blank() -> Rule {
    Rule::Blank
}

pub fn sym(name: &str) -> Rule {
    Rule::Symbol(name.to_owned())
}

pub fn string(text: &str) -> Rule {
    Rule::String(text.to_owned())
}

pub fn pattern(pattern: Pattern) -> Rule {
    Rule::Pattern(pattern)
}

pub fn seq(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Seq(rules.into_iter().collect())
}

pub fn choice(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Choice(rules.into_iter().collect())
}

pub fn repeat(rule: Rule) -> Rule {
    Rule::Repeat(Box::new(rule))
}

pub fn repeat1(rule: Rule) -> Rule {
    Rule::Repeat1(Box::new(rule))
}

pub fn optional(rule: Rule) -> Rule {
    Rule::Optional(Box::new(rule))
}

pub fn field(name: &str, rule: Rule) -> Rule {
    Rule::Field(name.to_owned(), Box::new(rule))
}

pub fn prec(value: i32, rule: Rule) -> Rule {
    Rule::Prec(Precedence::Static(value), Box::new(rule))
}

pub fn prec_left(value: i32, rule: Rule) -> Rule {
    Rule::Prec(Precedence::Left(value), Box::new(rule))
}

pub fn prec_right(value: i32, rule: Rule) -> Rule {
    Rule::Prec(Precedence::Right(value), Box::new(rule))
}

pub fn prec_dynamic(value: i32, rule: Rule) -> Rule {
    Rule::Prec(Precedence::Dynamic(value), Box::new(rule))
}

pub fn token(rule: Rule) -> Rule {
    Rule::Token(Box::new(rule))
}
