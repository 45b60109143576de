//! LALR(1) parse table construction.
//!
//! The LR(0) automaton is built first; lookaheads are then propagated between
//! kernel items until nothing changes, which yields the same tables as merging
//! LR(1) states with equal cores. Conflicts that precedence and associativity
//! cannot settle are kept as multiple actions for the GLR driver.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use arbor_grammar::{LexModeId, ParseAction, ParseState, ProductionId, StateId, SymbolId, SymbolSet};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::GenerateError;
use crate::prepare::{FlatProduction, PreparedGrammar, Step};
use crate::rules::Assoc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Item {
    production: usize,
    dot: usize,
}

pub(crate) struct ParseTables {
    pub(crate) states: Vec<ParseState>,
    pub(crate) lex_modes: Vec<SymbolSet>,
}

pub(crate) fn build(grammar: &PreparedGrammar) -> Result<ParseTables, GenerateError> {
    let augmented = grammar.augmented_start();
    let mut productions: Vec<&FlatProduction> = grammar.productions.iter().collect();
    productions.push(&augmented);
    let builder = Builder::new(grammar, productions);

    let automaton = builder.lr0_automaton()?;
    let lookaheads = builder.lookaheads(&automaton);
    let tables = builder.parse_tables(&automaton, &lookaheads);
    tracing::debug!(
        states = tables.states.len(),
        lex_modes = tables.lex_modes.len(),
        "built LALR(1) tables"
    );
    Ok(tables)
}

struct Automaton {
    kernels: Vec<Vec<Item>>,
    /// Outgoing edges of each state, sorted by symbol.
    transitions: Vec<Vec<(SymbolId, usize)>>,
}

impl Automaton {
    fn transition(&self, state: usize, symbol: SymbolId) -> Option<usize> {
        let edges = &self.transitions[state];
        let index = edges.binary_search_by_key(&symbol, |(symbol, _)| *symbol).ok()?;
        Some(edges[index].1)
    }
}

struct Builder<'g> {
    grammar: &'g PreparedGrammar,
    productions: Vec<&'g FlatProduction>,
    augmented: usize,
    by_lhs: Vec<Vec<usize>>,
    first: Vec<SymbolSet>,
    nullable: Vec<bool>,
}

impl<'g> Builder<'g> {
    fn new(grammar: &'g PreparedGrammar, productions: Vec<&'g FlatProduction>) -> Self {
        let symbol_count = grammar.symbols.len();
        let augmented = productions.len() - 1;

        let mut by_lhs = vec![Vec::new(); symbol_count];
        for (index, production) in productions[..augmented].iter().enumerate() {
            by_lhs[production.lhs.index()].push(index);
        }

        let mut first = vec![SymbolSet::new(); symbol_count];
        let mut nullable = vec![false; symbol_count];
        for (index, metadata) in grammar.symbols.iter().enumerate() {
            if metadata.is_terminal() {
                first[index].insert(SymbolId::new(index as u16));
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for production in &productions[..augmented] {
                let lhs = production.lhs.index();
                let mut all_nullable = true;
                for step in &production.steps {
                    let symbol = step.symbol.index();
                    if symbol != lhs {
                        let addition = first[symbol].clone();
                        changed |= first[lhs].union_with(&addition);
                    }
                    if !nullable[symbol] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !nullable[lhs] {
                    nullable[lhs] = true;
                    changed = true;
                }
            }
        }

        Self { grammar, productions, augmented, by_lhs, first, nullable }
    }

    fn next_symbol(&self, item: Item) -> Option<&'g Step> {
        self.productions[item.production].steps.get(item.dot)
    }

    fn is_nonterminal(&self, symbol: SymbolId) -> bool {
        !self.grammar.is_terminal(symbol)
    }

    /// FIRST of `steps` followed by anything in `trailing`.
    fn first_of(&self, steps: &[Step], trailing: &SymbolSet) -> SymbolSet {
        let mut result = SymbolSet::new();
        for step in steps {
            result.union_with(&self.first[step.symbol.index()]);
            if !self.nullable[step.symbol.index()] {
                return result;
            }
        }
        result.union_with(trailing);
        result
    }

    fn lr0_closure(&self, kernel: &[Item]) -> Vec<Item> {
        let mut items = kernel.to_vec();
        let mut expanded = SymbolSet::new();
        let mut index = 0;
        while index < items.len() {
            let item = items[index];
            index += 1;
            let Some(step) = self.next_symbol(item) else {
                continue;
            };
            if self.is_nonterminal(step.symbol) && expanded.insert(step.symbol) {
                let productions = self.by_lhs[step.symbol.index()].iter();
                items.extend(productions.map(|&production| Item { production, dot: 0 }));
            }
        }
        items
    }

    fn lr0_automaton(&self) -> Result<Automaton, GenerateError> {
        let start = vec![Item { production: self.augmented, dot: 0 }];
        let mut index: FxHashMap<Vec<Item>, usize> = FxHashMap::default();
        index.insert(start.clone(), 0);
        let mut kernels = vec![start];
        let mut transitions = Vec::new();

        let mut state = 0;
        while state < kernels.len() {
            let mut successors: BTreeMap<SymbolId, Vec<Item>> = BTreeMap::new();
            for item in self.lr0_closure(&kernels[state]) {
                if let Some(step) = self.next_symbol(item) {
                    let next = Item { dot: item.dot + 1, ..item };
                    successors.entry(step.symbol).or_default().push(next);
                }
            }

            let mut edges = Vec::with_capacity(successors.len());
            for (symbol, mut kernel) in successors {
                kernel.sort_unstable();
                kernel.dedup();
                let target = match index.get(&kernel) {
                    Some(&target) => target,
                    None => {
                        let target = kernels.len();
                        if target >= usize::from(u16::MAX) {
                            return Err(GenerateError::TooManyStates(target + 1));
                        }
                        index.insert(kernel.clone(), target);
                        kernels.push(kernel);
                        target
                    }
                };
                edges.push((symbol, target));
            }
            transitions.push(edges);
            state += 1;
        }

        Ok(Automaton { kernels, transitions })
    }

    /// LR(1) closure of a kernel whose items carry `lookaheads`.
    fn lr1_closure(&self, kernel: &[Item], lookaheads: &[SymbolSet]) -> Vec<(Item, SymbolSet)> {
        let mut items: Vec<(Item, SymbolSet)> =
            kernel.iter().copied().zip(lookaheads.iter().cloned()).collect();
        let mut position: FxHashMap<Item, usize> =
            items.iter().enumerate().map(|(index, (item, _))| (*item, index)).collect();
        let mut stack: Vec<usize> = (0..items.len()).collect();

        while let Some(index) = stack.pop() {
            let item = items[index].0;
            let Some(step) = self.next_symbol(item) else {
                continue;
            };
            if !self.is_nonterminal(step.symbol) {
                continue;
            }
            let rest = &self.productions[item.production].steps[item.dot + 1..];
            let lookahead = self.first_of(rest, &items[index].1);

            for &production in &self.by_lhs[step.symbol.index()] {
                let new = Item { production, dot: 0 };
                match position.get(&new) {
                    Some(&existing) => {
                        if items[existing].1.union_with(&lookahead) {
                            stack.push(existing);
                        }
                    }
                    None => {
                        position.insert(new, items.len());
                        stack.push(items.len());
                        items.push((new, lookahead.clone()));
                    }
                }
            }
        }
        items
    }

    /// Lookahead set of every kernel item, indexed like `automaton.kernels`.
    fn lookaheads(&self, automaton: &Automaton) -> Vec<Vec<SymbolSet>> {
        let mut lookaheads: Vec<Vec<SymbolSet>> = automaton
            .kernels
            .iter()
            .map(|kernel| vec![SymbolSet::new(); kernel.len()])
            .collect();
        lookaheads[0][0].insert(SymbolId::END);

        let mut queued = vec![true; automaton.kernels.len()];
        let mut worklist: Vec<usize> = (0..automaton.kernels.len()).rev().collect();
        while let Some(state) = worklist.pop() {
            queued[state] = false;
            let closure = self.lr1_closure(&automaton.kernels[state], &lookaheads[state]);
            for (item, lookahead) in closure {
                let Some(step) = self.next_symbol(item) else {
                    continue;
                };
                let Some(target) = automaton.transition(state, step.symbol) else {
                    continue;
                };
                let advanced = Item { dot: item.dot + 1, ..item };
                let Ok(slot) = automaton.kernels[target].binary_search(&advanced) else {
                    continue;
                };
                if lookaheads[target][slot].union_with(&lookahead) && !queued[target] {
                    queued[target] = true;
                    worklist.push(target);
                }
            }
        }
        lookaheads
    }

    fn parse_tables(&self, automaton: &Automaton, lookaheads: &[Vec<SymbolSet>]) -> ParseTables {
        let extras: Vec<SymbolId> = self.grammar.extras().collect();
        let mut lex_modes: IndexMap<SymbolSet, LexModeId> = IndexMap::new();
        let mut states = Vec::with_capacity(automaton.kernels.len());

        for (state, kernel) in automaton.kernels.iter().enumerate() {
            let mut shifts: BTreeMap<SymbolId, (StateId, i32)> = BTreeMap::new();
            let mut reduces: BTreeMap<SymbolId, Vec<usize>> = BTreeMap::new();
            let mut accept = false;

            for (item, lookahead) in self.lr1_closure(kernel, &lookaheads[state]) {
                match self.next_symbol(item) {
                    Some(step) if !self.is_nonterminal(step.symbol) => {
                        let Some(target) = automaton.transition(state, step.symbol) else {
                            continue;
                        };
                        let entry = shifts
                            .entry(step.symbol)
                            .or_insert((StateId::new(target as u16), step.precedence));
                        entry.1 = entry.1.max(step.precedence);
                    }
                    Some(_) => {}
                    None if item.production == self.augmented => accept = true,
                    None => {
                        for symbol in lookahead.iter() {
                            reduces.entry(symbol).or_default().push(item.production);
                        }
                    }
                }
            }

            let mut symbols: Vec<SymbolId> = shifts.keys().chain(reduces.keys()).copied().collect();
            if accept {
                symbols.push(SymbolId::END);
            }
            symbols.sort_unstable();
            symbols.dedup();

            let actions: Vec<(SymbolId, Box<[ParseAction]>)> = symbols
                .into_iter()
                .map(|symbol| {
                    let shift = shifts.get(&symbol).copied();
                    let reduces = reduces.remove(&symbol).unwrap_or_default();
                    let accept = accept && symbol == SymbolId::END;
                    (symbol, self.resolve(state, symbol, shift, reduces, accept))
                })
                .collect();

            let gotos = automaton.transitions[state]
                .iter()
                .filter(|(symbol, _)| self.is_nonterminal(*symbol))
                .map(|&(symbol, target)| (symbol, StateId::new(target as u16)))
                .collect();

            let mut valid: SymbolSet = actions.iter().map(|(symbol, _)| *symbol).collect();
            valid.extend(extras.iter().copied());
            let next_mode = LexModeId::new(lex_modes.len() as u16);
            let lex_mode = *lex_modes.entry(valid).or_insert(next_mode);

            states.push(ParseState::new(actions, gotos, lex_mode));
        }

        ParseTables { states, lex_modes: lex_modes.into_keys().collect() }
    }

    fn resolve(
        &self,
        state: usize,
        symbol: SymbolId,
        shift: Option<(StateId, i32)>,
        mut reduces: Vec<usize>,
        accept: bool,
    ) -> Box<[ParseAction]> {
        reduces.sort_unstable();
        reduces.dedup();

        if reduces.len() > 1 {
            let highest = reduces.iter().map(|&id| self.productions[id].precedence().0).max();
            reduces.retain(|&id| Some(self.productions[id].precedence().0) == highest);
        }

        let mut keep_shift = shift.is_some();
        if let Some((_, shift_precedence)) = shift {
            reduces.retain(|&id| {
                let (precedence, assoc) = self.productions[id].precedence();
                match precedence.cmp(&shift_precedence) {
                    Ordering::Greater => {
                        keep_shift = false;
                        true
                    }
                    Ordering::Less => false,
                    Ordering::Equal => match assoc {
                        Some(Assoc::Left) => {
                            keep_shift = false;
                            true
                        }
                        Some(Assoc::Right) => false,
                        None => true,
                    },
                }
            });
        }

        let mut actions = Vec::with_capacity(reduces.len() + 2);
        if let Some((target, _)) = shift.filter(|_| keep_shift) {
            actions.push(ParseAction::Shift(target));
        }
        actions.extend(reduces.iter().map(|&id| ParseAction::Reduce(ProductionId::new(id as u16))));
        if accept {
            actions.push(ParseAction::Accept);
        }

        if actions.len() > 1 {
            tracing::debug!(
                state,
                symbol = &*self.grammar.symbols[symbol.index()].name,
                ?actions,
                "unresolved conflict kept for GLR"
            );
        }
        actions.into()
    }
}
