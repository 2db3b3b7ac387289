use std::fmt;

use crate::diagnostic::{line_col, source_line, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NodeNotFound,
    PropertyNotFound,
    TypeMismatch,
    InvalidCondition,
    DivisionByZero,
    InvalidOperand,
    CannotPerform,
    RuntimeError,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::NodeNotFound => "NodeNotFound",
            ErrorKind::PropertyNotFound => "PropertyNotFound",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::InvalidCondition => "InvalidCondition",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::InvalidOperand => "InvalidOperand",
            ErrorKind::CannotPerform => "CannotPerform",
            ErrorKind::RuntimeError => "RuntimeError",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    pub fn node_not_found(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::NodeNotFound, message, span)
    }

    pub fn property_not_found(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::PropertyNotFound, message, span)
    }

    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::TypeMismatch, message, span)
    }

    pub fn division_by_zero(span: Span) -> Self {
        Self::new(ErrorKind::DivisionByZero, "division by zero", span)
    }

    pub fn invalid_operand(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::InvalidOperand, message, span)
    }

    /// Renders against the source text:
    /// `[Error] <label>: <message>` with an `at line N: <source line>` trailer.
    pub fn render(&self, source: &str) -> String {
        let (line, _) = line_col(source, self.span.start);
        match source_line(source, line) {
            Some(text) => format!(
                "[Error] {}: {}\n  at line {}: {}",
                self.kind.label(),
                self.message,
                line,
                text.trim()
            ),
            None => format!(
                "[Error] {}: {}\n  at line {}",
                self.kind.label(),
                self.message,
                line
            ),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Error] {}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_source_line() {
        let source = "Goblin HAS HP 10\nGoblin.HP PRINT";
        let err = RuntimeError::division_by_zero(Span::new(24, 25));
        let rendered = err.render(source);
        assert!(rendered.starts_with("[Error] DivisionByZero: division by zero"));
        assert!(rendered.contains("at line 2: Goblin.HP PRINT"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(ErrorKind::NodeNotFound.label(), "NodeNotFound");
        assert_eq!(ErrorKind::CannotPerform.label(), "CannotPerform");
    }
}
