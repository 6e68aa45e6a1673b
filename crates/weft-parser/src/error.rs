//! Parse errors, with the line they occurred on.

use std::fmt;

use serde::Serialize;

/// A line that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// 1-based input line number.
    pub line: usize,
    /// The offending line, verbatim.
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseErrorKind {
    InvalidDecl,
    InvalidExpr,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, line: usize, text: impl Into<String>) -> Self {
        ParseError { kind, line, text: text.into() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            ParseErrorKind::InvalidDecl => "declaration",
            ParseErrorKind::InvalidExpr => "expression",
        };
        write!(f, "Invalid {} [{}]: \"{}\"", what, self.line, self.text)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_line_and_text() {
        let e = ParseError::new(ParseErrorKind::InvalidDecl, 3, "2 F 1");
        assert_eq!(e.to_string(), "Invalid declaration [3]: \"2 F 1\"");
    }
}
