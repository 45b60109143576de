use std::fmt;
use std::sync::Arc;

use crate::{ExternalScanner, GrammarLoadError, GrammarTable};

/// Everything the lexer and the parser need to know about a language.
///
/// Cloning is cheap: the table and the scanner are shared.
#[derive(Clone)]
pub struct Language {
    table: Arc<GrammarTable>,
    scanner: Option<Arc<dyn ExternalScanner>>,
}

impl Language {
    pub fn new(table: GrammarTable) -> Self {
        Self { table: Arc::new(table), scanner: None }
    }

    /// Decodes a table blob into a language without an external scanner.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GrammarLoadError> {
        GrammarTable::from_bytes(bytes).map(Self::new)
    }

    pub fn with_scanner(mut self, scanner: impl ExternalScanner + 'static) -> Self {
        self.scanner = Some(Arc::new(scanner));
        self
    }

    pub fn table(&self) -> &GrammarTable {
        &self.table
    }

    pub fn scanner(&self) -> Option<&dyn ExternalScanner> {
        self.scanner.as_deref()
    }

    pub fn name(&self) -> &str {
        self.table.name()
    }

    /// Whether both handles refer to the same loaded table.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.table.name())
            .field("external_scanner", &self.scanner.is_some())
            .finish()
    }
}
