//! Unified error type for every pipeline stage, with source-anchored
//! rendering.
//!
//! Grounded on the teacher's `ParseError::display_with_source` in
//! `examples/Brahmastra-Labs-logicaffeine/src/error.rs`: find the line
//! containing the span, print it with a line-number gutter, and underline
//! the offending range with carets. The teacher's `socratic_explanation`
//! and typo-suggestion machinery is NLP flavor text specific to that
//! project's domain and has no counterpart here (see DESIGN.md).

use crate::lexer::LexError;
use crate::parser::ParseError as SynError;
use crate::span::Span;
use crate::style::Style;

#[derive(Debug, Clone)]
pub enum NoxyError {
    Lex(LexError),
    Parse(SynError),
    Type { message: String, span: Span },
    Module { message: String, span: Option<Span> },
    Runtime { message: String, span: Span },
}

impl NoxyError {
    pub fn span(&self) -> Option<Span> {
        match self {
            NoxyError::Lex(e) => Some(e.span),
            NoxyError::Parse(e) => Some(e.span),
            NoxyError::Type { span, .. } => Some(*span),
            NoxyError::Module { span, .. } => *span,
            NoxyError::Runtime { span, .. } => Some(*span),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            NoxyError::Lex(_) => "lex error",
            NoxyError::Parse(_) => "parse error",
            NoxyError::Type { .. } => "type error",
            NoxyError::Module { .. } => "module error",
            NoxyError::Runtime { .. } => "runtime error",
        }
    }

    fn message(&self) -> String {
        match self {
            NoxyError::Lex(e) => e.message.clone(),
            NoxyError::Parse(e) => e.message.clone(),
            NoxyError::Type { message, .. } => message.clone(),
            NoxyError::Module { message, .. } => message.clone(),
            NoxyError::Runtime { message, .. } => message.clone(),
        }
    }

    /// Renders the error against `source`, with a caret-underlined excerpt
    /// when a span is available.
    pub fn report(&self, source: &str) -> String {
        let label = Style::bold_red(self.label());
        let message = self.message();
        let Some(span) = self.span() else {
            return format!("{label}: {message}");
        };

        let (line_num, line_start, line_content) = find_context(source, span.start);
        let col = span.start.saturating_sub(line_start);
        let len = span.end.saturating_sub(span.start).max(1);
        let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));

        let line_num_str = Style::blue(&format!("{line_num:4}"));
        let pipe = Style::blue("|");
        let underline_colored = Style::red(&underline);

        format!(
            "{label}: {message}\n\n{line_num_str} {pipe} {line_content}\n     {pipe} {underline_colored}"
        )
    }
}

/// Finds the 1-based line number, byte offset of that line's start, and the
/// line's text for the line containing byte offset `at`.
fn find_context(source: &str, at: usize) -> (usize, usize, &str) {
    let mut line_num = 1;
    let mut line_start = 0;
    for (i, c) in source.char_indices() {
        if i >= at {
            break;
        }
        if c == '\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }
    let line_end = source[line_start..]
        .find('\n')
        .map(|off| line_start + off)
        .unwrap_or(source.len());
    (line_num, line_start, &source[line_start..line_end])
}

impl From<LexError> for NoxyError {
    fn from(e: LexError) -> Self {
        NoxyError::Lex(e)
    }
}

impl From<SynError> for NoxyError {
    fn from(e: SynError) -> Self {
        NoxyError::Parse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    #[test]
    fn report_underlines_the_offending_span() {
        let err = NoxyError::Type {
            message: "expected int, found float".to_string(),
            span: Span::new(4, 5, Position { line: 1, column: 5 }),
        };
        let report = err.report("let x: int = 1.5");
        assert!(report.contains("expected int, found float"));
        assert!(report.contains('^'));
    }

    #[test]
    fn report_without_span_is_message_only() {
        let err = NoxyError::Module { message: "module not found: a.b".to_string(), span: None };
        let report = err.report("");
        assert!(report.contains("module not found"));
    }
}
