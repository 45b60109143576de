use anyhow::Context;
use arbor_generate::samples::{NestedCommentScanner, Sample};
use arbor_grammar::Language;
use camino::Utf8PathBuf;

/// Where the grammar comes from: a built-in sample or a table blob.
#[derive(clap::Args)]
pub(crate) struct GrammarArgs {
    /// Built-in sample grammar.
    #[arg(
        long,
        short,
        value_parser = parse_sample,
        required_unless_present = "table",
        conflicts_with = "table"
    )]
    grammar: Option<Sample>,
    /// Table blob written by `arbor generate`.
    #[arg(long)]
    table: Option<Utf8PathBuf>,
}

impl GrammarArgs {
    pub(crate) fn load(&self) -> anyhow::Result<Language> {
        if let Some(sample) = self.grammar {
            return sample
                .language()
                .with_context(|| format!("failed to build `{}`", sample.name()));
        }
        let Some(path) = &self.table else {
            anyhow::bail!("either `--grammar` or `--table` is required");
        };

        let bytes = std::fs::read(path).with_context(|| format!("failed to read `{path}`"))?;
        let language =
            Language::from_bytes(&bytes).with_context(|| format!("failed to load `{path}`"))?;
        if language.table().externals().is_empty() {
            return Ok(language);
        }

        // Blobs carry no code, so the only scanner on offer is the sample one.
        let scanner = NestedCommentScanner::new(language.table());
        match scanner {
            Some(scanner) if language.name() == Sample::NestedComments.name() => {
                Ok(language.with_scanner(scanner))
            }
            _ => {
                tracing::warn!(
                    grammar = language.name(),
                    "no external scanner for this grammar, external tokens will not be recognized"
                );
                Ok(language)
            }
        }
    }
}

pub(crate) fn parse_sample(name: &str) -> Result<Sample, String> {
    Sample::from_name(name).ok_or_else(|| {
        let names: Vec<&str> = Sample::ALL.iter().map(|sample| sample.name()).collect();
        format!("unknown grammar `{name}`, expected one of: {}", names.join(", "))
    })
}
