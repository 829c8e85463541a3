//! Result and errors.
use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::compiler::Span;

pub type JackResult<T> = std::result::Result<T, JackError>;

#[derive(Debug)]
pub enum JackError {
    /// Source text that doesn't form any valid token.
    InvalidToken { span: Span, message: String },
    /// Attempt to advance the lexer past the last token.
    ExhaustedInput,
    /// Token stream doesn't match the grammar.
    Syntax(SyntaxError),
    /// Type or index requested for a name that isn't declared.
    UnknownSymbol(SmolStr),
    /// Name declared twice in the same scope.
    DuplicateSymbol(SmolStr),
    /// Instruction operand the VM can't represent.
    InvalidArgument(String),
    Fmt(fmt::Error),
}

impl JackError {
    /// Location in the source, when the error can be attributed to one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::InvalidToken { span, .. } => Some(*span),
            Self::Syntax(err) => err.span,
            _ => None,
        }
    }
}

impl Display for JackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidToken { message, .. } => write!(f, "invalid token: {}", message),
            Self::ExhaustedInput => write!(f, "no more tokens in source"),
            Self::Syntax(err) => write!(f, "{}", err),
            Self::UnknownSymbol(name) => write!(f, "unknown symbol '{}'", name),
            Self::DuplicateSymbol(name) => write!(f, "symbol '{}' is already defined in this scope", name),
            Self::InvalidArgument(msg) => write!(f, "invalid instruction argument: {}", msg),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for JackError {}

impl From<fmt::Error> for JackError {
    fn from(err: fmt::Error) -> Self {
        JackError::Fmt(err)
    }
}

impl From<SyntaxError> for JackError {
    fn from(err: SyntaxError) -> Self {
        JackError::Syntax(err)
    }
}

/// Error returned when an unexpected token is encountered.
#[derive(Debug)]
pub struct SyntaxError {
    pub expected: String,
    pub encountered: String,
    /// `None` when the source ended early.
    pub span: Option<Span>,
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syntax error: expected {}, encountered {}",
            self.expected, self.encountered
        )
    }
}

impl std::error::Error for SyntaxError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = JackError::from(SyntaxError {
            expected: "symbol ';'".to_string(),
            encountered: "symbol '}'".to_string(),
            span: Some(Span::new(12, 1)),
        });

        assert_eq!(
            err.to_string(),
            "syntax error: expected symbol ';', encountered symbol '}'"
        );
        assert_eq!(err.span(), Some(Span::new(12, 1)));
    }

    #[test]
    fn test_span_absent() {
        assert_eq!(JackError::ExhaustedInput.span(), None);
        assert_eq!(JackError::UnknownSymbol("x".into()).span(), None);
    }
}
