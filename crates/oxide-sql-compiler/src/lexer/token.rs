//! Token types produced by the lexer and consumed by the parser.

use core::fmt;

/// A byte range in the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the smallest span covering both `self` and `other`.
    #[must_use]
    pub const fn to(self, other: Self) -> Self {
        let start = if self.start < other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end > other.end {
            self.end
        } else {
            other.end
        };
        Self { start, end }
    }
}

/// Generates the keyword enum together with its lookup tables.
///
/// Reserved keywords can never be used as identifiers. Non-reserved keywords
/// are recognized by the parser in the positions where they are meaningful and
/// behave like plain identifiers everywhere else.
macro_rules! define_keywords {
    (
        reserved: [$($r:ident => $rs:literal),* $(,)?],
        non_reserved: [$($n:ident => $ns:literal),* $(,)?] $(,)?
    ) => {
        /// SQL keywords.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($r,)*
            $($n,)*
        }

        impl Keyword {
            /// Every keyword, reserved ones first.
            pub const ALL: &'static [Self] = &[$(Self::$r,)* $(Self::$n,)*];

            /// Looks a keyword up by its text, ignoring ASCII case.
            #[must_use]
            #[allow(clippy::should_implement_trait)]
            pub fn from_str(s: &str) -> Option<Self> {
                match s.to_ascii_uppercase().as_str() {
                    $($rs => Some(Self::$r),)*
                    $($ns => Some(Self::$n),)*
                    _ => None,
                }
            }

            /// Returns the canonical upper-case spelling.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$r => $rs,)*
                    $(Self::$n => $ns,)*
                }
            }

            /// Returns true if the keyword can never be used as an identifier.
            #[must_use]
            pub const fn is_reserved(&self) -> bool {
                matches!(self, $(Self::$r)|*)
            }
        }
    };
}

#[rustfmt::skip]
define_keywords!(
    reserved: [
        All => "ALL",
        And => "AND",
        Any => "ANY",
        Array => "ARRAY",
        As => "AS",
        Asymmetric => "ASYMMETRIC",
        Between => "BETWEEN",
        By => "BY",
        Case => "CASE",
        Cast => "CAST",
        Corresponding => "CORRESPONDING",
        Cross => "CROSS",
        Distinct => "DISTINCT",
        Else => "ELSE",
        End => "END",
        Escape => "ESCAPE",
        Except => "EXCEPT",
        Exists => "EXISTS",
        False => "FALSE",
        Fetch => "FETCH",
        For => "FOR",
        From => "FROM",
        Group => "GROUP",
        Having => "HAVING",
        In => "IN",
        Intersect => "INTERSECT",
        Is => "IS",
        Join => "JOIN",
        Like => "LIKE",
        Limit => "LIMIT",
        Match => "MATCH",
        Minus => "MINUS",
        Natural => "NATURAL",
        Not => "NOT",
        Null => "NULL",
        Offset => "OFFSET",
        On => "ON",
        Or => "OR",
        Order => "ORDER",
        Over => "OVER",
        Overlaps => "OVERLAPS",
        Row => "ROW",
        Select => "SELECT",
        Some => "SOME",
        Symmetric => "SYMMETRIC",
        Table => "TABLE",
        Then => "THEN",
        Top => "TOP",
        True => "TRUE",
        Union => "UNION",
        Unique => "UNIQUE",
        Unknown => "UNKNOWN",
        Using => "USING",
        Values => "VALUES",
        When => "WHEN",
        Where => "WHERE",
        With => "WITH",
    ],
    non_reserved: [
        Asc => "ASC",
        Bigint => "BIGINT",
        Binary => "BINARY",
        Blob => "BLOB",
        Boolean => "BOOLEAN",
        Char => "CHAR",
        Character => "CHARACTER",
        Clob => "CLOB",
        Date => "DATE",
        Dec => "DEC",
        Decimal => "DECIMAL",
        Desc => "DESC",
        Double => "DOUBLE",
        First => "FIRST",
        Float => "FLOAT",
        Full => "FULL",
        Inner => "INNER",
        Int => "INT",
        Integer => "INTEGER",
        Last => "LAST",
        Left => "LEFT",
        Next => "NEXT",
        Nulls => "NULLS",
        Numeric => "NUMERIC",
        Only => "ONLY",
        Outer => "OUTER",
        Partial => "PARTIAL",
        Partition => "PARTITION",
        Precision => "PRECISION",
        Real => "REAL",
        Recursive => "RECURSIVE",
        Right => "RIGHT",
        Rows => "ROWS",
        Separator => "SEPARATOR",
        Simple => "SIMPLE",
        Smallint => "SMALLINT",
        Starts => "STARTS",
        Time => "TIME",
        Timestamp => "TIMESTAMP",
        Tinyint => "TINYINT",
        Value => "VALUE",
        Varbinary => "VARBINARY",
        Varchar => "VARCHAR",
        Varying => "VARYING",
    ],
);

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token types.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Words
    /// A keyword, reserved or not.
    Keyword(Keyword),
    /// An unquoted identifier, already folded to upper case.
    Identifier(String),
    /// A double-quoted identifier, case preserved.
    QuotedIdentifier(String),

    // Literals
    /// Integer literal that fits in 64 bits.
    Integer(i64),
    /// Exact numeric literal, kept as written.
    Decimal(String),
    /// Approximate numeric literal (has an exponent).
    Double(f64),
    /// Character string literal.
    String(String),
    /// Binary string literal (`X'..'`).
    Binary(Vec<u8>),

    // Operators
    /// ?
    Question,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// ||
    Concat,
    /// =
    Eq,
    /// <> or !=
    NotEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,

    // Delimiters
    /// (
    LeftParen,
    /// )
    RightParen,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    /// ,
    Comma,
    /// ;
    Semicolon,
    /// .
    Dot,

    /// End of input
    Eof,
    /// Invalid input, with a description
    Error(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(kw) => write!(f, "{kw}"),
            Self::Identifier(name) => f.write_str(name),
            Self::QuotedIdentifier(name) => write!(f, "\"{name}\""),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(text) => f.write_str(text),
            Self::Double(v) => write!(f, "{v:E}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Binary(bytes) => {
                f.write_str("X'")?;
                for b in bytes {
                    write!(f, "{b:02X}")?;
                }
                f.write_str("'")
            }
            Self::Question => f.write_str("?"),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Concat => f.write_str("||"),
            Self::Eq => f.write_str("="),
            Self::NotEq => f.write_str("<>"),
            Self::Lt => f.write_str("<"),
            Self::LtEq => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::GtEq => f.write_str(">="),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::Comma => f.write_str(","),
            Self::Semicolon => f.write_str(";"),
            Self::Dot => f.write_str("."),
            Self::Eof => f.write_str("end of input"),
            Self::Error(message) => f.write_str(message),
        }
    }
}

/// A token with its span in the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The location in the statement text.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is an EOF token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns the keyword if this is a keyword token.
    #[must_use]
    pub const fn as_keyword(&self) -> Option<Keyword> {
        match &self.kind {
            TokenKind::Keyword(kw) => Some(*kw),
            _ => None,
        }
    }

    /// Returns true if this token is the given keyword.
    #[must_use]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.as_keyword() == Some(keyword)
    }

    /// Returns the identifier text if the token can name an object.
    ///
    /// Plain and quoted identifiers qualify, and so do non-reserved keywords.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) | TokenKind::QuotedIdentifier(name) => Some(name),
            TokenKind::Keyword(kw) if !kw.is_reserved() => Some(kw.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_from_str() {
        assert_eq!(Keyword::from_str("SELECT"), Some(Keyword::Select));
        assert_eq!(Keyword::from_str("select"), Some(Keyword::Select));
        assert_eq!(Keyword::from_str("Corresponding"), Some(Keyword::Corresponding));
        assert_eq!(Keyword::from_str("not_a_keyword"), None);
    }

    #[test]
    fn test_keyword_round_trips_through_text() {
        for kw in Keyword::ALL {
            assert_eq!(Keyword::from_str(kw.as_str()), Some(*kw));
        }
    }

    #[test]
    fn test_reserved_split() {
        assert!(Keyword::Select.is_reserved());
        assert!(Keyword::Unknown.is_reserved());
        assert!(!Keyword::First.is_reserved());
        assert!(!Keyword::Outer.is_reserved());
    }

    #[test]
    fn test_token_identifier() {
        let ident = Token::new(TokenKind::Identifier("T".into()), Span::new(0, 1));
        let first = Token::new(TokenKind::Keyword(Keyword::First), Span::new(0, 5));
        let from = Token::new(TokenKind::Keyword(Keyword::From), Span::new(0, 4));
        assert_eq!(ident.identifier(), Some("T"));
        assert_eq!(first.identifier(), Some("FIRST"));
        assert_eq!(from.identifier(), None);
    }

    #[test]
    fn test_span_to() {
        let merged = Span::new(5, 10).to(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
    }

    #[test]
    fn test_token_kind_display() {
        assert_eq!(TokenKind::String("it's".into()).to_string(), "'it''s'");
        assert_eq!(TokenKind::Binary(vec![0x0a, 0xff]).to_string(), "X'0AFF'");
        assert_eq!(TokenKind::NotEq.to_string(), "<>");
    }
}
