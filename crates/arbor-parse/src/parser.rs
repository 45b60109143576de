use std::ops::Range;

use arbor_grammar::Language;
use arbor_tree::SyntaxTree;

use crate::driver::Driver;
use crate::reuse::Reuse;
use crate::{
    EditInconsistencyError, Error, InputEdit, ParseOptions, ParseStats, Utf16Text, utf8_offset,
};

/// Parses text of one language, optionally reusing a previous tree.
///
/// A parser holds no state between calls apart from the statistics of the
/// last run, so one parser can serve any number of documents.
#[derive(Debug)]
pub struct Parser {
    language: Language,
    options: ParseOptions,
    stats: ParseStats,
}

impl Parser {
    pub fn new(language: Language) -> Self {
        Self::with_options(language, ParseOptions::default())
    }

    pub fn with_options(language: Language, options: ParseOptions) -> Self {
        Self { language, options, stats: ParseStats::default() }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Counters for the last call to [`Parser::parse`] or [`Parser::edit`],
    /// including one that ran out of budget.
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn parse(&mut self, text: &[u8]) -> Result<SyntaxTree, Error> {
        self.run(text, None)
    }

    /// Parses `new_text`, which `edit` derives from the text of `tree`,
    /// splicing in every subtree of `tree` the edit cannot have affected.
    ///
    /// The result is the tree a full parse of `new_text` would produce.
    pub fn edit(
        &mut self,
        tree: &SyntaxTree,
        edit: &InputEdit,
        new_text: &[u8],
    ) -> Result<SyntaxTree, Error> {
        self.stats = ParseStats::default();
        if !tree.language().ptr_eq(&self.language) {
            return Err(EditInconsistencyError::LanguageMismatch {
                tree: tree.language().name().to_owned(),
                parser: self.language.name().to_owned(),
            }
            .into());
        }
        edit.validate(tree.text(), new_text)?;

        if edit.is_noop() {
            return Ok(tree.clone());
        }
        self.run(new_text, Some(Reuse::new(tree.green_root(), edit)))
    }

    /// Parses text held as UTF-16. The tree stores it as UTF-8.
    pub fn parse_utf16(&mut self, text: &Utf16Text) -> Result<SyntaxTree, Error> {
        self.stats = ParseStats::default();
        let text = text.to_utf8()?;
        self.parse(text.as_bytes())
    }

    /// Replaces the code units `range` of the text of `tree` with
    /// `replacement` and reparses incrementally.
    pub fn edit_utf16(
        &mut self,
        tree: &SyntaxTree,
        range: Range<usize>,
        replacement: &str,
    ) -> Result<SyntaxTree, Error> {
        self.stats = ParseStats::default();
        let start = utf8_offset(tree.text(), range.start)?;
        let end = utf8_offset(tree.text(), range.end)?;
        let (edit, new_text) = InputEdit::replace(tree.text(), start..end, replacement.as_bytes())?;
        self.edit(tree, &edit, &new_text)
    }

    fn run(&mut self, text: &[u8], reuse: Option<Reuse<'_>>) -> Result<SyntaxTree, Error> {
        let _span = tracing::debug_span!(
            "parse",
            language = self.language.name(),
            bytes = text.len(),
            incremental = reuse.is_some()
        )
        .entered();

        let driver = Driver::new(&self.language, text, reuse, self.options.budget);
        let (root, stats) = driver.run();
        self.stats = stats;
        let root = root.inspect_err(|err| {
            tracing::debug!(%err, operations = stats.operations, "parse failed");
        })?;

        if self.options.log_stats {
            tracing::info!(
                reused_nodes = stats.reused_nodes,
                reused_leaves = stats.reused_leaves,
                lexed_bytes = stats.lexed_bytes,
                forks = stats.forks,
                operations = stats.operations,
                recoveries = stats.recoveries,
                "parsed"
            );
        } else {
            tracing::debug!(
                reused_nodes = stats.reused_nodes,
                lexed_bytes = stats.lexed_bytes,
                forks = stats.forks,
                recoveries = stats.recoveries,
                "parsed"
            );
        }

        Ok(SyntaxTree::new(root, self.language.clone(), text))
    }
}
