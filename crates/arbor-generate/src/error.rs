use arbor_grammar::GrammarLoadError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("grammar `{0}` has no rules")]
    EmptyGrammar(String),
    #[error("rule `{0}` is defined twice")]
    DuplicateRule(String),
    #[error("undefined symbol `{name}` referenced from rule `{rule}`")]
    UndefinedSymbol { name: String, rule: String },
    #[error("extra `{0}` is not a token")]
    ExtraNotToken(String),
    #[error("the start rule `{0}` must not be a token")]
    StartIsToken(String),
    #[error("invalid token in rule `{rule}`: {reason}")]
    InvalidToken { rule: String, reason: &'static str },
    #[error("grammar needs {0} symbols, more than the table format supports")]
    TooManySymbols(usize),
    #[error("grammar needs {0} parse states, more than the table format supports")]
    TooManyStates(usize),
    #[error(transparent)]
    Table(#[from] GrammarLoadError),
}
