//! Error types for statement compilation.

use core::fmt;

use crate::parser::ParseError;

/// SQLSTATE-style codes attached to non-syntactic failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// 0A000 feature not supported.
    FeatureNotSupported,
    /// 42501 object not found.
    ObjectNotFound,
    /// 42549 duplicate LIMIT.
    DuplicateLimit,
    /// 42561 incompatible data type in conversion.
    IncompatibleConversion,
    /// 42562 incompatible data types in combination.
    IncompatibleCombination,
    /// 42563 incompatible data type in operation.
    IncompatibleOperation,
    /// 42564 degree mismatch.
    DegreeMismatch,
    /// 42565 invalid LIMIT or OFFSET value.
    InvalidLimit,
    /// 42567 parameter type cannot be determined.
    UndeterminedParameter,
    /// 42568 boolean expression required.
    BooleanRequired,
    /// 42572 invalid use of aggregate function.
    InvalidAggregate,
    /// 42573 HAVING not composed of grouping columns.
    InvalidHaving,
    /// 42574 expression not in aggregate or GROUP BY.
    NotGrouped,
    /// 42576 invalid ORDER BY.
    InvalidOrderBy,
    /// 42578 CORRESPONDING column mismatch.
    InvalidCorresponding,
    /// 42580 ambiguous column reference.
    AmbiguousColumn,
    /// 42581 unexpected token or construct.
    UnexpectedToken,
    /// 42582 DISTINCT or ALL not allowed.
    QuantifierNotAllowed,
    /// 42593 column list count mismatch.
    ColumnCountMismatch,
    /// 42608 nested WITH.
    NestedWith,
    /// 54001 statement too complex.
    TooComplex,
}

impl ErrorCode {
    /// The five character class code.
    #[must_use]
    pub const fn sqlstate(&self) -> &'static str {
        match self {
            Self::FeatureNotSupported => "0A000",
            Self::ObjectNotFound => "42501",
            Self::DuplicateLimit => "42549",
            Self::IncompatibleConversion => "42561",
            Self::IncompatibleCombination => "42562",
            Self::IncompatibleOperation => "42563",
            Self::DegreeMismatch => "42564",
            Self::InvalidLimit => "42565",
            Self::UndeterminedParameter => "42567",
            Self::BooleanRequired => "42568",
            Self::InvalidAggregate => "42572",
            Self::InvalidHaving => "42573",
            Self::NotGrouped => "42574",
            Self::InvalidOrderBy => "42576",
            Self::InvalidCorresponding => "42578",
            Self::AmbiguousColumn => "42580",
            Self::UnexpectedToken => "42581",
            Self::QuantifierNotAllowed => "42582",
            Self::ColumnCountMismatch => "42593",
            Self::NestedWith => "42608",
            Self::TooComplex => "54001",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sqlstate())
    }
}

/// Errors that can occur while compiling a statement.
///
/// Only `Parse` is recoverable: the speculative parser rewinds and tries the
/// next alternative. Everything else ends compilation of the statement.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// The token stream did not match any production.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// A construct parsed but violates a SQL rule.
    #[error("[{code}] {message}")]
    Semantic {
        /// Error class.
        code: ErrorCode,
        /// Description.
        message: String,
    },

    /// Column, table, function or sequence references that could not be bound.
    #[error("[42501] user lacks privilege or object not found: {}", .0.join(", "))]
    UnresolvedNames(Vec<String>),

    /// Operand types cannot be unified for an operator.
    #[error("[{code}] {message}")]
    Type {
        /// Error class.
        code: ErrorCode,
        /// Description.
        message: String,
    },

    /// An expression is neither constant, grouped nor aggregated.
    #[error("[{code}] {message}")]
    Grouping {
        /// Error class.
        code: ErrorCode,
        /// Description.
        message: String,
    },

    /// The planner export cannot represent the tree.
    #[error("Unsupported expression: {0}")]
    Export(String),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<CompileError>),
}

impl CompileError {
    /// Creates a structural error.
    #[must_use]
    pub fn semantic(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Semantic {
            code,
            message: message.into(),
        }
    }

    /// Creates a type error.
    #[must_use]
    pub fn type_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Type {
            code,
            message: message.into(),
        }
    }

    /// Creates a grouping error.
    #[must_use]
    pub fn grouping(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Grouping {
            code,
            message: message.into(),
        }
    }

    /// The error class, when the error carries one.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Semantic { code, .. } | Self::Type { code, .. } | Self::Grouping { code, .. } => {
                Some(*code)
            }
            Self::UnresolvedNames(_) => Some(ErrorCode::ObjectNotFound),
            Self::Parse(_) | Self::Export(_) | Self::Multiple(_) => None,
        }
    }

    /// Returns true if a speculative alternative may recover from this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Collapses a list of accumulated errors into one.
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn from_accumulated(mut errors: Vec<Self>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

/// Result type for compilation.
pub type Result<T> = core::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Span;

    #[test]
    fn test_semantic_display_carries_code() {
        let err = CompileError::semantic(ErrorCode::DuplicateLimit, "duplicate LIMIT");
        assert_eq!(err.to_string(), "[42549] duplicate LIMIT");
        assert_eq!(err.code(), Some(ErrorCode::DuplicateLimit));
    }

    #[test]
    fn test_unresolved_names_are_listed_together() {
        let err = CompileError::UnresolvedNames(vec!["X".into(), "T.Y".into()]);
        assert!(err.to_string().ends_with("X, T.Y"));
    }

    #[test]
    fn test_only_parse_errors_are_recoverable() {
        let parse = CompileError::from(ParseError::new("boom", Span::new(0, 1), 0));
        assert!(parse.is_recoverable());
        assert!(!CompileError::Export("x".into()).is_recoverable());
    }

    #[test]
    fn test_from_accumulated() {
        assert_eq!(CompileError::from_accumulated(vec![]), None);
        let one = CompileError::Export("a".into());
        assert_eq!(
            CompileError::from_accumulated(vec![one.clone()]),
            Some(one.clone())
        );
        let many = CompileError::from_accumulated(vec![one.clone(), one]);
        assert!(matches!(many, Some(CompileError::Multiple(v)) if v.len() == 2));
    }
}
