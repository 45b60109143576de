//! Lowering of rule trees into flat productions over numbered symbols.

use std::collections::BTreeSet;

use arbor_grammar::{FieldId, SymbolId, SymbolKind, SymbolMetadata};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::rules::{Assoc, Pattern, Precedence, Rule};
use crate::GenerateError;

/// A terminal recognised by the lexer automaton.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LexicalToken {
    pub(crate) pattern: Pattern,
    pub(crate) precedence: i32,
}

impl LexicalToken {
    pub(crate) fn is_literal(&self) -> bool {
        matches!(self.pattern, Pattern::Literal(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) symbol: SymbolId,
    pub(crate) field: Option<String>,
    pub(crate) precedence: i32,
    pub(crate) assoc: Option<Assoc>,
    has_precedence: bool,
}

impl Step {
    fn new(symbol: SymbolId) -> Self {
        Self { symbol, field: None, precedence: 0, assoc: None, has_precedence: false }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Alternative {
    steps: Vec<Step>,
    dynamic_precedence: i32,
}

#[derive(Clone, Debug)]
pub(crate) struct FlatProduction {
    pub(crate) lhs: SymbolId,
    pub(crate) steps: Vec<Step>,
    pub(crate) dynamic_precedence: i32,
}

impl FlatProduction {
    /// Precedence used when this production is reduced: that of its last step.
    pub(crate) fn precedence(&self) -> (i32, Option<Assoc>) {
        self.steps.last().map_or((0, None), |step| (step.precedence, step.assoc))
    }

    pub(crate) fn field_ids(&self, fields: &[String]) -> Box<[Option<FieldId>]> {
        self.steps
            .iter()
            .map(|step| {
                let field = step.field.as_deref()?;
                let index = fields.iter().position(|it| it == field)?;
                Some(FieldId::new(index as u16))
            })
            .collect()
    }
}

pub(crate) struct PreparedGrammar {
    pub(crate) symbols: Vec<SymbolMetadata>,
    pub(crate) tokens: Vec<(SymbolId, LexicalToken)>,
    pub(crate) productions: Vec<FlatProduction>,
    pub(crate) fields: Vec<String>,
    pub(crate) start: SymbolId,
    pub(crate) externals: Vec<SymbolId>,
}

impl PreparedGrammar {
    pub(crate) fn is_terminal(&self, symbol: SymbolId) -> bool {
        self.symbols[symbol.index()].is_terminal()
    }

    /// `start' -> start`. Its left-hand side is never looked up.
    pub(crate) fn augmented_start(&self) -> FlatProduction {
        FlatProduction {
            lhs: SymbolId::ERROR,
            steps: vec![Step::new(self.start)],
            dynamic_precedence: 0,
        }
    }

    pub(crate) fn extras(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .filter(|(_, metadata)| metadata.extra)
            .map(|(index, _)| SymbolId::new(index as u16))
    }
}

pub(crate) fn prepare(
    name: &str,
    rules: &IndexMap<String, Rule>,
    extras: &[String],
    externals: &[String],
) -> Result<PreparedGrammar, GenerateError> {
    let Some((start_name, start_rule)) = rules.first() else {
        return Err(GenerateError::EmptyGrammar(name.to_owned()));
    };
    if is_token_rule(start_rule) {
        return Err(GenerateError::StartIsToken(start_name.clone()));
    }

    let mut lowering = Lowering {
        symbols: vec![
            SymbolMetadata { visible: false, ..SymbolMetadata::new("end", SymbolKind::Terminal) },
            SymbolMetadata::new("ERROR", SymbolKind::NonTerminal),
        ],
        by_name: FxHashMap::default(),
        literals: FxHashMap::default(),
        inline_tokens: IndexMap::new(),
        tokens: Vec::new(),
        productions: Vec::new(),
        repeat_count: 0,
    };

    // Named token rules come first so that ties between equal matches favour
    // them over anonymous tokens created later.
    for (rule_name, rule) in rules {
        if is_token_rule(rule) {
            let token = to_token(rule, rule_name)?;
            let symbol = lowering.push_symbol(rule_name, SymbolKind::Terminal);
            if let Pattern::Literal(text) = &token.pattern {
                lowering.literals.entry(text.clone()).or_insert(symbol);
            }
            lowering.tokens.push((symbol, token));
        }
    }
    for (rule_name, rule) in rules {
        if !is_token_rule(rule) {
            lowering.collect_literals(rule, rule_name)?;
        }
    }
    for external in externals {
        if lowering.by_name.contains_key(external) || rules.contains_key(external) {
            return Err(GenerateError::DuplicateRule(external.clone()));
        }
        lowering.push_symbol(external, SymbolKind::External);
    }
    for (rule_name, rule) in rules {
        if !is_token_rule(rule) {
            lowering.push_symbol(rule_name, SymbolKind::NonTerminal);
        }
    }

    for (rule_name, rule) in rules {
        if is_token_rule(rule) {
            continue;
        }
        let lhs = lowering.by_name[rule_name.as_str()];
        let alternatives = lowering.lower(rule, rule_name)?;
        lowering.push_productions(lhs, alternatives);
    }

    for extra in extras {
        match lowering.by_name.get(extra.as_str()) {
            Some(&symbol) if lowering.symbols[symbol.index()].is_terminal() => {
                lowering.symbols[symbol.index()].extra = true;
            }
            _ => return Err(GenerateError::ExtraNotToken(extra.clone())),
        }
    }

    if lowering.symbols.len() >= usize::from(u16::MAX) {
        return Err(GenerateError::TooManySymbols(lowering.symbols.len()));
    }

    let fields: BTreeSet<&str> = lowering
        .productions
        .iter()
        .flat_map(|production| production.steps.iter())
        .filter_map(|step| step.field.as_deref())
        .collect();
    let fields = fields.into_iter().map(str::to_owned).collect();
    let externals = externals.iter().map(|name| lowering.by_name[name.as_str()]).collect();

    Ok(PreparedGrammar {
        start: lowering.by_name[start_name.as_str()],
        symbols: lowering.symbols,
        tokens: lowering.tokens,
        productions: lowering.productions,
        fields,
        externals,
    })
}

struct Lowering {
    symbols: Vec<SymbolMetadata>,
    by_name: FxHashMap<String, SymbolId>,
    literals: FxHashMap<String, SymbolId>,
    inline_tokens: IndexMap<LexicalToken, SymbolId>,
    tokens: Vec<(SymbolId, LexicalToken)>,
    productions: Vec<FlatProduction>,
    repeat_count: usize,
}

impl Lowering {
    fn push_symbol(&mut self, name: &str, kind: SymbolKind) -> SymbolId {
        let symbol = self.push_anonymous(name, kind, !name.starts_with('_'), true);
        self.by_name.insert(name.to_owned(), symbol);
        symbol
    }

    fn push_anonymous(
        &mut self,
        name: &str,
        kind: SymbolKind,
        visible: bool,
        named: bool,
    ) -> SymbolId {
        let symbol = SymbolId::new(self.symbols.len() as u16);
        self.symbols.push(SymbolMetadata { visible, named, ..SymbolMetadata::new(name, kind) });
        symbol
    }

    /// Allocates terminals for the strings and inline tokens used by `rule`.
    fn collect_literals(&mut self, rule: &Rule, rule_name: &str) -> Result<(), GenerateError> {
        match rule {
            Rule::String(text) => {
                if !self.literals.contains_key(text) {
                    let symbol = self.push_anonymous(text, SymbolKind::Terminal, true, false);
                    self.literals.insert(text.clone(), symbol);
                    self.tokens.push((
                        symbol,
                        LexicalToken { pattern: Pattern::Literal(text.clone()), precedence: 0 },
                    ));
                }
            }
            Rule::Pattern(_) | Rule::Token(_) => {
                let token = to_token(rule, rule_name)?;
                if !self.inline_tokens.contains_key(&token) {
                    let name = format!("_{rule_name}_token{}", self.inline_tokens.len() + 1);
                    let symbol = self.push_anonymous(&name, SymbolKind::Terminal, false, false);
                    self.inline_tokens.insert(token.clone(), symbol);
                    self.tokens.push((symbol, token));
                }
            }
            Rule::Blank | Rule::Symbol(_) => {}
            Rule::Seq(rules) | Rule::Choice(rules) => {
                for rule in rules {
                    self.collect_literals(rule, rule_name)?;
                }
            }
            Rule::Repeat(rule)
            | Rule::Repeat1(rule)
            | Rule::Optional(rule)
            | Rule::Field(_, rule)
            | Rule::Prec(_, rule) => self.collect_literals(rule, rule_name)?,
        }
        Ok(())
    }

    fn lower(&mut self, rule: &Rule, rule_name: &str) -> Result<Vec<Alternative>, GenerateError> {
        let single = |symbol| {
            vec![Alternative { steps: vec![Step::new(symbol)], dynamic_precedence: 0 }]
        };
        Ok(match rule {
            Rule::Blank => vec![Alternative::default()],
            Rule::Symbol(name) => match self.by_name.get(name.as_str()) {
                Some(&symbol) => single(symbol),
                None => {
                    return Err(GenerateError::UndefinedSymbol {
                        name: name.clone(),
                        rule: rule_name.to_owned(),
                    });
                }
            },
            Rule::String(text) => single(self.literals[text.as_str()]),
            Rule::Pattern(_) | Rule::Token(_) => {
                let token = to_token(rule, rule_name)?;
                single(self.inline_tokens[&token])
            }
            Rule::Seq(rules) => {
                let mut result = vec![Alternative::default()];
                for rule in rules {
                    let suffixes = self.lower(rule, rule_name)?;
                    let mut combined = Vec::with_capacity(result.len() * suffixes.len());
                    for prefix in &result {
                        for suffix in &suffixes {
                            let mut steps = prefix.steps.clone();
                            steps.extend(suffix.steps.iter().cloned());
                            combined.push(Alternative {
                                steps,
                                dynamic_precedence: prefix.dynamic_precedence
                                    + suffix.dynamic_precedence,
                            });
                        }
                    }
                    result = combined;
                }
                result
            }
            Rule::Choice(rules) => {
                let mut result = Vec::new();
                for rule in rules {
                    result.extend(self.lower(rule, rule_name)?);
                }
                result
            }
            Rule::Optional(rule) => {
                let mut result = self.lower(rule, rule_name)?;
                result.push(Alternative::default());
                result
            }
            Rule::Repeat1(rule) => {
                let alternatives = self.lower(rule, rule_name)?;
                single(self.repetition(rule_name, alternatives))
            }
            Rule::Repeat(rule) => {
                let alternatives = self.lower(rule, rule_name)?;
                let mut result = single(self.repetition(rule_name, alternatives));
                result.push(Alternative::default());
                result
            }
            Rule::Field(name, rule) => {
                let mut result = self.lower(rule, rule_name)?;
                for step in result.iter_mut().flat_map(|alt| alt.steps.iter_mut()) {
                    step.field.get_or_insert_with(|| name.clone());
                }
                result
            }
            Rule::Prec(precedence, rule) => {
                let mut result = self.lower(rule, rule_name)?;
                for alternative in &mut result {
                    apply_precedence(alternative, *precedence);
                }
                result
            }
        })
    }

    /// Hidden left-recursive helper: `aux -> aux x | x` for every `x`.
    fn repetition(&mut self, rule_name: &str, alternatives: Vec<Alternative>) -> SymbolId {
        self.repeat_count += 1;
        let name = format!("_{}_repeat{}", rule_name.trim_start_matches('_'), self.repeat_count);
        let aux = self.push_anonymous(&name, SymbolKind::NonTerminal, false, false);

        let mut productions = Vec::with_capacity(alternatives.len() * 2);
        for alternative in &alternatives {
            let mut steps = vec![Step::new(aux)];
            steps.extend(alternative.steps.iter().cloned());
            productions.push(Alternative { steps, ..alternative.clone() });
        }
        productions.extend(alternatives);
        self.push_productions(aux, productions);
        aux
    }

    fn push_productions(&mut self, lhs: SymbolId, alternatives: Vec<Alternative>) {
        let mut seen: Vec<Alternative> = Vec::new();
        for alternative in alternatives {
            if seen.contains(&alternative) {
                continue;
            }
            self.productions.push(FlatProduction {
                lhs,
                steps: alternative.steps.clone(),
                dynamic_precedence: alternative.dynamic_precedence,
            });
            seen.push(alternative);
        }
    }
}

fn apply_precedence(alternative: &mut Alternative, precedence: Precedence) {
    let (value, assoc) = match precedence {
        Precedence::Static(value) => (value, None),
        Precedence::Left(value) => (value, Some(Assoc::Left)),
        Precedence::Right(value) => (value, Some(Assoc::Right)),
        Precedence::Dynamic(value) => {
            if alternative.dynamic_precedence == 0 {
                alternative.dynamic_precedence = value;
            }
            return;
        }
    };
    for step in &mut alternative.steps {
        if !step.has_precedence {
            step.precedence = value;
            step.assoc = assoc;
            step.has_precedence = true;
        }
    }
}

/// Whether `rule` describes a single token on its own.
fn is_token_rule(rule: &Rule) -> bool {
    match rule {
        Rule::String(_) | Rule::Pattern(_) | Rule::Token(_) => true,
        Rule::Prec(Precedence::Dynamic(_), _) => false,
        Rule::Prec(_, rule) => is_token_rule(rule),
        _ => false,
    }
}

fn to_token(rule: &Rule, rule_name: &str) -> Result<LexicalToken, GenerateError> {
    let mut precedence = None;
    let pattern = to_pattern(rule, rule_name, &mut precedence)?;
    Ok(LexicalToken { pattern, precedence: precedence.unwrap_or(0) })
}

fn to_pattern(
    rule: &Rule,
    rule_name: &str,
    precedence: &mut Option<i32>,
) -> Result<Pattern, GenerateError> {
    let invalid = |reason| GenerateError::InvalidToken { rule: rule_name.to_owned(), reason };
    let all = |rules: &[Rule], precedence: &mut Option<i32>| {
        rules
            .iter()
            .map(|rule| to_pattern(rule, rule_name, precedence))
            .collect::<Result<Vec<_>, _>>()
    };
    Ok(match rule {
        Rule::Blank => Pattern::Seq(Vec::new()),
        Rule::String(text) => Pattern::Literal(text.clone()),
        Rule::Pattern(pattern) => pattern.clone(),
        Rule::Seq(rules) => Pattern::Seq(all(rules, precedence)?),
        Rule::Choice(rules) => Pattern::Choice(all(rules, precedence)?),
        Rule::Repeat(rule) => Pattern::Repeat(Box::new(to_pattern(rule, rule_name, precedence)?)),
        Rule::Repeat1(rule) => Pattern::Repeat1(Box::new(to_pattern(rule, rule_name, precedence)?)),
        Rule::Optional(rule) => {
            Pattern::Optional(Box::new(to_pattern(rule, rule_name, precedence)?))
        }
        Rule::Token(rule) => to_pattern(rule, rule_name, precedence)?,
        Rule::Prec(
            Precedence::Static(value) | Precedence::Left(value) | Precedence::Right(value),
            rule,
        ) => {
            precedence.get_or_insert(*value);
            to_pattern(rule, rule_name, precedence)?
        }
        Rule::Prec(Precedence::Dynamic(_), _) => {
            return Err(invalid("dynamic precedence cannot apply to a token"));
        }
        Rule::Symbol(_) => return Err(invalid("tokens cannot reference other rules")),
        Rule::Field(..) => return Err(invalid("tokens cannot contain fields")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::*;

    fn rules(list: Vec<(&str, Rule)>) -> IndexMap<String, Rule> {
        list.into_iter().map(|(name, rule)| (name.to_owned(), rule)).collect()
    }

    fn names(grammar: &PreparedGrammar) -> Vec<&str> {
        grammar.symbols.iter().map(|symbol| &*symbol.name).collect()
    }

    #[test]
    fn symbols_are_numbered_terminals_first() {
        let grammar = prepare(
            "test",
            &rules(vec![
                ("list", repeat(seq([sym("item"), string(",")]))),
                ("item", choice([sym("word"), string("?")])),
                ("word", pattern(Pattern::range('a', 'z').repeat1())),
            ]),
            &[],
            &[],
        )
        .unwrap();

        assert_eq!(
            names(&grammar),
            ["end", "ERROR", "word", ",", "?", "list", "item", "_list_repeat1"]
        );
        assert_eq!(grammar.start, SymbolId::new(5));
        assert!(!grammar.symbols[7].visible);
        assert!(!grammar.symbols[3].named);

        // list -> repeat | <blank>, repeat -> repeat item "," | item ","
        let list: Vec<usize> = grammar
            .productions
            .iter()
            .filter(|production| production.lhs == SymbolId::new(5))
            .map(|production| production.steps.len())
            .collect();
        assert_eq!(list, [1, 0]);
        let repeat: Vec<usize> = grammar
            .productions
            .iter()
            .filter(|production| production.lhs == SymbolId::new(7))
            .map(|production| production.steps.len())
            .collect();
        assert_eq!(repeat, [3, 2]);
    }

    #[test]
    fn fields_and_precedence_reach_steps() {
        let grammar = prepare(
            "test",
            &rules(vec![
                (
                    "sum",
                    prec_left(
                        3,
                        seq([field("left", sym("n")), string("+"), field("right", sym("n"))]),
                    ),
                ),
                ("n", pattern(Pattern::digit())),
            ]),
            &[],
            &[],
        )
        .unwrap();

        assert_eq!(grammar.fields, ["left", "right"]);
        let sum = &grammar.productions[0];
        assert_eq!(sum.precedence(), (3, Some(Assoc::Left)));
        assert_eq!(
            sum.field_ids(&grammar.fields).to_vec(),
            [Some(FieldId::new(0)), None, Some(FieldId::new(1))]
        );
    }

    #[test]
    fn named_string_rules_are_shared_with_literals() {
        let grammar = prepare(
            "test",
            &rules(vec![
                ("value", choice([sym("true"), seq([string("!"), string("true")])])),
                ("true", string("true")),
            ]),
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(names(&grammar), ["end", "ERROR", "true", "!", "value"]);
    }

    #[test]
    fn errors() {
        let undefined = prepare("test", &rules(vec![("a", sym("b"))]), &[], &[]);
        assert!(matches!(undefined, Err(GenerateError::UndefinedSymbol { .. })));

        let start = prepare("test", &rules(vec![("a", string("x"))]), &[], &[]);
        assert!(matches!(start, Err(GenerateError::StartIsToken(_))));

        let grammar = rules(vec![("a", sym("b")), ("b", seq([string("x")]))]);
        let extra = prepare("test", &grammar, &["b".to_owned()], &[]);
        assert!(matches!(extra, Err(GenerateError::ExtraNotToken(_))));

        let tokenized = prepare("test", &rules(vec![("a", token(sym("a")))]), &[], &[]);
        assert!(matches!(tokenized, Err(GenerateError::StartIsToken(_))));

        let grammar = rules(vec![("a", seq([token(field("f", string("x")))]))]);
        let with_field = prepare("test", &grammar, &[], &[]);
        assert!(matches!(with_field, Err(GenerateError::InvalidToken { .. })));

        let empty = prepare("test", &IndexMap::new(), &[], &[]);
        assert!(matches!(empty, Err(GenerateError::EmptyGrammar(_))));
    }
}
