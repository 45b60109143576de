use std::hash::{Hash, Hasher};

use crate::SymbolId;

const BITS_PER_SLOT: usize = u64::BITS as usize;

/// Set of symbols backed by a growable bitset.
///
/// Used for lex modes (the terminals valid in a parse state) and, in the table
/// generator, for FIRST and lookahead sets.
#[derive(Clone, Debug, Default)]
pub struct SymbolSet {
    bits: Vec<u64>,
}

impl SymbolSet {
    pub const fn new() -> Self {
        Self { bits: Vec::new() }
    }

    pub fn with_capacity(symbol_count: usize) -> Self {
        Self { bits: vec![0; symbol_count.div_ceil(BITS_PER_SLOT)] }
    }

    fn slot(symbol: SymbolId) -> (usize, u64) {
        let index = symbol.index();
        (index / BITS_PER_SLOT, 1 << (index % BITS_PER_SLOT))
    }

    /// Inserts `symbol`, returning `true` if it was not present.
    pub fn insert(&mut self, symbol: SymbolId) -> bool {
        let (slot, mask) = Self::slot(symbol);
        if slot >= self.bits.len() {
            self.bits.resize(slot + 1, 0);
        }
        let was_set = self.bits[slot] & mask != 0;
        self.bits[slot] |= mask;
        !was_set
    }

    pub fn remove(&mut self, symbol: SymbolId) -> bool {
        let (slot, mask) = Self::slot(symbol);
        match self.bits.get_mut(slot) {
            Some(bits) if *bits & mask != 0 => {
                *bits &= !mask;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, symbol: SymbolId) -> bool {
        let (slot, mask) = Self::slot(symbol);
        self.bits.get(slot).is_some_and(|bits| bits & mask != 0)
    }

    /// Adds every symbol of `other`, returning `true` if `self` changed.
    pub fn union_with(&mut self, other: &Self) -> bool {
        if other.bits.len() > self.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        let mut changed = false;
        for (slot, bits) in self.bits.iter_mut().zip(&other.bits) {
            let merged = *slot | bits;
            changed |= merged != *slot;
            *slot = merged;
        }
        changed
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.bits.iter().zip(&other.bits).any(|(a, b)| a & b != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|bits| *bits == 0)
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|bits| bits.count_ones() as usize).sum()
    }

    /// Iterates the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.bits.iter().enumerate().flat_map(|(slot, &bits)| {
            (0..BITS_PER_SLOT).filter(move |bit| bits & (1 << bit) != 0).map(move |bit| {
                SymbolId::new((slot * BITS_PER_SLOT + bit) as u16)
            })
        })
    }

    /// The backing words with trailing empty slots trimmed.
    fn words(&self) -> &[u64] {
        let len = self.bits.iter().rposition(|bits| *bits != 0).map_or(0, |last| last + 1);
        &self.bits[..len]
    }
}

impl PartialEq for SymbolSet {
    fn eq(&self, other: &Self) -> bool {
        self.words() == other.words()
    }
}

impl Eq for SymbolSet {}

impl Hash for SymbolSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.words().hash(state);
    }
}

impl FromIterator<SymbolId> for SymbolSet {
    fn from_iter<I: IntoIterator<Item = SymbolId>>(iter: I) -> Self {
        let mut set = Self::new();
        for symbol in iter {
            set.insert(symbol);
        }
        set
    }
}

impl Extend<SymbolId> for SymbolSet {
    fn extend<I: IntoIterator<Item = SymbolId>>(&mut self, iter: I) {
        for symbol in iter {
            self.insert(symbol);
        }
    }
}
