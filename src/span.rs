//! Source positions and spans shared by every stage of the pipeline.

use std::fmt;

/// A single point in a source file, tracked as the lexer scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 1 };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A byte-offset range plus the (line, column) of its start, attached to
/// every token and AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub pos: Position,
}

impl Span {
    pub fn new(start: usize, end: usize, pos: Position) -> Self {
        Span { start, end, pos }
    }

    /// A span covering from the start of `self` to the end of `other`.
    pub fn to(self, other: Span) -> Span {
        Span { start: self.start, end: other.end, pos: self.pos }
    }
}
