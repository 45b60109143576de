//! Source diagnostics shared by the parser and the command line tool.

use std::fmt::Display;

pub use annotate_snippets::Renderer;
use annotate_snippets::{Level, Snippet};
pub use text_size::TextRange;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    message: String,
    range: TextRange,
    label: &'static str,
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn error(message: impl Into<String>, range: TextRange) -> Self {
        Self { message: message.into(), range, label: "here" }
    }

    #[must_use]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Renders the diagnostic with a snippet of `text`, which must be the text
    /// the range was computed against.
    pub fn render<'a>(
        &'a self,
        renderer: &'a Renderer,
        path: &'a str,
        text: &'a str,
    ) -> impl Display + 'a {
        let message = Level::Error.title(&self.message).snippet(
            Snippet::source(text)
                .origin(path)
                .annotation(Level::Error.span(self.range.into()).label(self.label))
                .fold(true),
        );
        renderer.render(message)
    }
}

#[cfg(test)]
mod tests {
    use text_size::TextSize;

    use super::*;

    #[test]
    fn renders_message_and_location() {
        let text = "x = 1\ny = ;\n";
        let range = TextRange::new(TextSize::new(10), TextSize::new(11));
        let diagnostic = Diagnostic::error("unexpected `;`", range).with_label("unexpected token");

        let rendered = diagnostic.render(&Renderer::plain(), "input.txt", text).to_string();
        assert!(rendered.contains("error: unexpected `;`"), "{rendered}");
        assert!(rendered.contains("input.txt:2:5"), "{rendered}");
        assert!(rendered.contains("unexpected token"), "{rendered}");
    }
}
