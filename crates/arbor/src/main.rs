mod grammar;

use std::fs;
use std::ops::Range;

use anyhow::Context;
use arbor_errors::{Diagnostic, Renderer};
use arbor_generate::samples::Sample;
use arbor_parse::{InputEdit, ParseBudget, ParseOptions, Parser};
use arbor_query::Query;
use camino::{Utf8Path, Utf8PathBuf};
use grammar::{GrammarArgs, parse_sample};
use text_size::{TextRange, TextSize};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(clap::Parser)]
#[command(version, about = "Incremental parsing and structural queries")]
enum Options {
    /// Writes the table of a sample grammar as a blob.
    Generate {
        #[arg(value_parser = parse_sample)]
        grammar: Sample,
        #[arg(long, short)]
        output: Utf8PathBuf,
    },
    /// Parses a file and prints its tree and diagnostics.
    Parse {
        path: Utf8PathBuf,
        #[command(flatten)]
        grammar: GrammarArgs,
        #[command(flatten)]
        budget: BudgetArgs,
        /// Prints the one-line s-expression instead of the indented dump.
        #[arg(long)]
        sexp: bool,
        /// Reparses after replacing a byte range, written `START..END=TEXT`.
        /// Repeatable; each edit applies to the text left by the previous one.
        #[arg(long, value_parser = parse_edit)]
        edit: Vec<EditArg>,
        /// Logs the statistics of every parse.
        #[arg(long)]
        stats: bool,
    },
    /// Runs the patterns of a query file over a parsed file.
    Query {
        path: Utf8PathBuf,
        #[arg(long, short)]
        query: Utf8PathBuf,
        #[command(flatten)]
        grammar: GrammarArgs,
        /// Only reports nodes intersecting `START..END`.
        #[arg(long, value_parser = parse_range)]
        range: Option<Range<usize>>,
    },
}

#[derive(clap::Args)]
struct BudgetArgs {
    #[arg(long)]
    max_forks: Option<u64>,
    #[arg(long)]
    max_lexed_bytes: Option<u64>,
    #[arg(long)]
    max_operations: Option<u64>,
    /// Defaults to the library's limit, which stops tables that loop.
    #[arg(long)]
    max_operations_per_byte: Option<u64>,
}

impl BudgetArgs {
    fn budget(&self) -> ParseBudget {
        let default = ParseBudget::default();
        ParseBudget {
            max_forks: self.max_forks,
            max_lexed_bytes: self.max_lexed_bytes,
            max_operations: self.max_operations,
            max_operations_per_byte: self
                .max_operations_per_byte
                .or(default.max_operations_per_byte),
        }
    }
}

#[derive(Clone, Debug)]
struct EditArg {
    range: Range<usize>,
    text: String,
}

fn parse_range(arg: &str) -> Result<Range<usize>, String> {
    let (start, end) =
        arg.split_once("..").ok_or_else(|| format!("expected `START..END`, got `{arg}`"))?;
    let start =
        start.trim().parse::<usize>().map_err(|err| format!("bad start `{start}`: {err}"))?;
    let end = end.trim().parse::<usize>().map_err(|err| format!("bad end `{end}`: {err}"))?;
    if start > end {
        return Err(format!("range `{arg}` ends before it starts"));
    }
    Ok(start..end)
}

fn parse_edit(arg: &str) -> Result<EditArg, String> {
    let (range, text) =
        arg.split_once('=').ok_or_else(|| format!("expected `START..END=TEXT`, got `{arg}`"))?;
    Ok(EditArg { range: parse_range(range)?, text: text.to_owned() })
}

fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn read(path: &Utf8Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read `{path}`"))
}

fn text_size(offset: usize) -> anyhow::Result<TextSize> {
    TextSize::try_from(offset).with_context(|| format!("offset {offset} is too large"))
}

fn main() -> anyhow::Result<()> {
    match <Options as clap::Parser>::parse() {
        Options::Generate { grammar, output } => {
            init_logging("warn");
            let language = grammar
                .language()
                .with_context(|| format!("failed to build `{}`", grammar.name()))?;
            let bytes = language.table().to_bytes();
            fs::write(&output, &bytes).with_context(|| format!("failed to write `{output}`"))?;

            let table = language.table();
            println!(
                "{}: {} symbols, {} states, {} bytes -> {output}",
                table.name(),
                table.symbol_count(),
                table.state_count(),
                bytes.len()
            );
            Ok(())
        }
        Options::Parse { path, grammar, budget, sexp, edit, stats } => {
            init_logging(if stats { "arbor_parse=info,warn" } else { "warn" });
            let language = grammar.load()?;
            let text = read(&path)?;

            let options =
                ParseOptions::default().with_budget(budget.budget()).with_log_stats(stats);
            let mut parser = Parser::with_options(language, options);
            let mut tree = parser
                .parse(text.as_bytes())
                .with_context(|| format!("failed to parse `{path}`"))?;
            for step in edit {
                let range = step.range.clone();
                let (input_edit, new_text) =
                    InputEdit::replace(tree.text(), range, step.text.as_bytes())
                        .with_context(|| format!("cannot apply edit {:?}", step.range))?;
                tree = parser
                    .edit(&tree, &input_edit, &new_text)
                    .context("failed to reparse after edit")?;
            }

            if sexp {
                println!("{}", tree.to_sexp());
            } else {
                print!("{}", tree.debug_dump());
            }

            let renderer = Renderer::styled();
            let text = String::from_utf8_lossy(tree.text());
            for diagnostic in arbor_parse::diagnostics(&tree) {
                eprintln!("{}", diagnostic.render(&renderer, path.as_str(), &text));
            }
            Ok(())
        }
        Options::Query { path, query, grammar, range } => {
            init_logging("warn");
            let language = grammar.load()?;
            let text = read(&path)?;
            let source = read(&query)?;

            let compiled = match Query::new(&language, &source) {
                Ok(compiled) => compiled,
                Err(err) => {
                    let offset = text_size(err.offset)?;
                    let diagnostic =
                        Diagnostic::error(err.kind.to_string(), TextRange::empty(offset));
                    let renderer = Renderer::styled();
                    let rendered = diagnostic.render(&renderer, query.as_str(), &source);
                    eprintln!("{rendered}");
                    anyhow::bail!("failed to compile `{query}`");
                }
            };
            let tree = arbor_parse::parse(text.as_bytes(), &language)
                .with_context(|| format!("failed to parse `{path}`"))?;

            let mut matches = arbor_query::query(&tree, &compiled);
            if let Some(range) = range {
                let range = TextRange::new(text_size(range.start)?, text_size(range.end)?);
                matches = matches.with_byte_range(range);
            }
            for found in matches {
                println!("pattern {}", found.pattern_index);
                for capture in &found.captures {
                    let node = capture.node;
                    println!(
                        "  @{} {} {:?} `{}`",
                        compiled.capture_names()[capture.index as usize],
                        node.kind(),
                        node.byte_range(),
                        String::from_utf8_lossy(node.text())
                    );
                }
            }
            Ok(())
        }
    }
}
