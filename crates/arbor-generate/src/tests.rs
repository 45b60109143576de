use arbor_grammar::{GrammarTable, Language, ParseAction, StateId, SymbolId};

use crate::rules::*;
use crate::samples::{self, Sample};
use crate::{GenerateError, GrammarBuilder};

fn symbol(table: &GrammarTable, name: &str, named: bool) -> SymbolId {
    table.symbols_for_name(name, named)[0]
}

fn conflicts(table: &GrammarTable) -> usize {
    (0..table.state_count())
        .map(|state| StateId::new(state as u16))
        .flat_map(|state| table.state(state).actions().map(|(_, actions)| actions.len()))
        .filter(|&count| count > 1)
        .count()
}

/// Runs the LR automaton on a token sequence, requiring a single action at
/// every step. Returns the reductions performed, by left-hand side name.
fn run(table: &GrammarTable, tokens: &[SymbolId]) -> Vec<String> {
    let mut stack = vec![table.start_state()];
    let mut reductions = Vec::new();
    let mut input = tokens.iter().copied().chain([SymbolId::END]).peekable();
    loop {
        let state = *stack.last().unwrap();
        let lookahead = *input.peek().unwrap();
        match table.actions(state, lookahead) {
            [ParseAction::Shift(next)] => {
                stack.push(*next);
                input.next();
            }
            [ParseAction::Reduce(id)] => {
                let production = table.production(*id);
                stack.truncate(stack.len() - usize::from(production.child_count));
                let top = *stack.last().unwrap();
                stack.push(table.goto(top, production.lhs).unwrap());
                reductions.push(table.symbol_name(production.lhs).to_owned());
            }
            [ParseAction::Accept] => return reductions,
            actions => panic!("{actions:?} in state {state:?} on {}", table.symbol_name(lookahead)),
        }
    }
}

#[test]
fn arithmetic_precedence_is_resolved() {
    let language = samples::arithmetic().unwrap();
    let table = language.table();
    assert_eq!(conflicts(table), 0);

    let number = symbol(table, "number", true);
    let plus = symbol(table, "+", false);
    let minus = symbol(table, "-", false);
    let times = symbol(table, "*", false);

    // 1 + 2 * 3
    let reductions = run(table, &[number, plus, number, times, number]);
    let operators: Vec<&str> =
        reductions.iter().map(String::as_str).filter(|name| !name.starts_with('_')).collect();
    assert_eq!(operators, ["product", "sum", "program"]);

    // 1 - 2 - 3 groups to the left
    let reductions = run(table, &[number, minus, number, minus, number]);
    let operators: Vec<&str> =
        reductions.iter().map(String::as_str).filter(|name| !name.starts_with('_')).collect();
    assert_eq!(operators, ["difference", "difference", "program"]);
}

#[test]
fn symbols_and_fields() {
    let language = samples::arithmetic().unwrap();
    let table = language.table();
    assert_eq!(table.symbol_name(SymbolId::END), "end");
    assert_eq!(table.symbol_name(SymbolId::ERROR), "ERROR");

    let number = table.symbol_metadata(symbol(table, "number", true));
    assert!(number.named && number.visible && !number.extra);
    let whitespace = table.symbol_metadata(symbol(table, "_whitespace", true));
    assert!(whitespace.extra && !whitespace.visible);
    let plus = table.symbol_metadata(symbol(table, "+", false));
    assert!(!plus.named && plus.visible);
    assert!(!table.symbol_metadata(symbol(table, "_expression", true)).visible);

    assert_eq!(table.field_count(), 2);
    assert_eq!(table.field_name(table.field_id("left").unwrap()), "left");
    assert!(table.field_id("middle").is_none());
}

#[test]
fn lex_modes_follow_parse_state() {
    let language = samples::statements().unwrap();
    let table = language.table();
    let print = symbol(table, "print", false);
    let identifier = symbol(table, "identifier", true);
    let equals = symbol(table, "=", false);
    let comment = symbol(table, "comment", true);

    let start = table.lex_mode(table.start_state());
    assert!(start.contains(print));
    assert!(start.contains(identifier));
    assert!(start.contains(comment));
    assert!(!start.contains(equals));

    let after_identifier = table.state(table.start_state()).actions().find_map(|(symbol, actions)| {
        match actions {
            [ParseAction::Shift(next)] if symbol == identifier => Some(*next),
            _ => None,
        }
    });
    let after_identifier = table.lex_mode(after_identifier.unwrap());
    assert!(after_identifier.contains(equals));
    assert!(!after_identifier.contains(print));
}

#[test]
fn ambiguities_are_kept() {
    let language = samples::ambiguous().unwrap();
    let table = language.table();
    let shift = |state: StateId, symbol: SymbolId| match table.actions(state, symbol) {
        [ParseAction::Shift(next), ..] => *next,
        actions => panic!("expected a shift, found {actions:?}"),
    };
    let identifier = symbol(table, "identifier", true);
    let star = symbol(table, "*", false);
    let percent = symbol(table, "%", false);
    let semicolon = symbol(table, ";", false);

    // `a` followed by `*` may start a declaration or be an operand.
    let after_identifier = shift(table.start_state(), identifier);
    assert!(matches!(
        table.actions(after_identifier, star),
        [ParseAction::Shift(_), ParseAction::Reduce(_)]
    ));

    // `% ;` reduces to either rule; both stay, `alpha` first.
    let after_percent = shift(shift(table.start_state(), percent), semicolon);
    let [ParseAction::Reduce(first), ParseAction::Reduce(second)] =
        table.actions(after_percent, SymbolId::END)
    else {
        panic!("expected two reductions");
    };
    assert_eq!(table.symbol_name(table.production(*first).lhs), "alpha");
    assert_eq!(table.symbol_name(table.production(*second).lhs), "beta");
    assert!(conflicts(table) >= 2);

    let declaration = symbol(table, "declaration", true);
    let dynamic: Vec<i32> = (0..table.production_count())
        .map(|id| table.production(arbor_grammar::ProductionId::new(id as u16)))
        .filter(|production| production.lhs == declaration)
        .map(|production| production.dynamic_precedence)
        .collect();
    assert_eq!(dynamic, [1]);
}

#[test]
fn tables_survive_serialization() {
    for sample in Sample::ALL {
        let language = sample.language().unwrap();
        let bytes = language.table().to_bytes();
        let reloaded = Language::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.name(), sample.name());
        assert_eq!(reloaded.table().to_bytes(), bytes);
        assert_eq!(Sample::from_name(sample.name()), Some(sample));
    }
}

#[test]
fn nested_comments_have_a_scanner() {
    let language = samples::nested_comments().unwrap();
    assert!(language.scanner().is_some());
    let comment = symbol(language.table(), "comment", true);
    assert!(language.table().is_external(comment));
    assert!(language.table().symbol_metadata(comment).extra);
}

#[test]
fn errors() {
    let duplicate = GrammarBuilder::new("test")
        .rule("a", string("x"))
        .rule("a", string("y"))
        .build();
    assert!(matches!(duplicate, Err(GenerateError::DuplicateRule(name)) if name == "a"));

    let empty = GrammarBuilder::new("empty").build();
    assert_eq!(empty.unwrap_err().to_string(), "grammar `empty` has no rules");

    let undefined = GrammarBuilder::new("test").rule("a", seq([sym("b")])).build();
    assert_eq!(undefined.unwrap_err().to_string(), "undefined symbol `b` referenced from rule `a`");
}
