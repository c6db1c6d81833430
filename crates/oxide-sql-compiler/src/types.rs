//! SQL data types and the implicit widening rules between them.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, ErrorCode, Result};

/// Largest precision a DECIMAL can carry.
pub const MAX_DECIMAL_PRECISION: u32 = 128;

/// Precision of DECIMAL when none is given.
pub const DEFAULT_DECIMAL_PRECISION: u32 = 128;

/// Length of VARCHAR/VARBINARY when none is given.
pub const DEFAULT_VARYING_LENGTH: u32 = 1_048_576;

/// SQL data types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// Boolean.
    Boolean,

    // Integer types
    /// 1-byte integer.
    TinyInt,
    /// 2-byte integer.
    SmallInt,
    /// 4-byte integer.
    Integer,
    /// 8-byte integer.
    BigInt,

    /// Exact number with precision and scale.
    Decimal {
        /// Total number of digits.
        precision: u32,
        /// Digits after the decimal point.
        scale: u32,
    },
    /// Approximate number.
    Double,

    // Character strings
    /// Fixed-length character string.
    Char(u32),
    /// Variable-length character string.
    Varchar(u32),
    /// Character large object.
    Clob,

    // Binary strings
    /// Fixed-length binary string.
    Binary(u32),
    /// Variable-length binary string.
    Varbinary(u32),
    /// Binary large object.
    Blob,

    // Date/time
    /// Date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    Timestamp,

    /// Array of a single element type.
    Array(Box<DataType>),
}

/// Arithmetic operators, as far as typing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
}

impl ArithmeticOp {
    /// Returns the SQL representation of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

impl DataType {
    /// Type of an integer literal: INTEGER when it fits, BIGINT otherwise.
    #[must_use]
    pub fn for_integer(value: i64) -> Self {
        if i32::try_from(value).is_ok() {
            Self::Integer
        } else {
            Self::BigInt
        }
    }

    /// Type of an exact numeric literal written as `text`.
    #[must_use]
    pub fn for_decimal_text(text: &str) -> Self {
        let digits = text.trim_start_matches(['-', '+']);
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        let whole = whole.trim_start_matches('0');
        let scale = u32::try_from(fraction.len()).unwrap_or(MAX_DECIMAL_PRECISION);
        let integral = u32::try_from(whole.len()).unwrap_or(MAX_DECIMAL_PRECISION);
        Self::Decimal {
            precision: (integral + scale).clamp(1, MAX_DECIMAL_PRECISION),
            scale: scale.min(MAX_DECIMAL_PRECISION),
        }
    }

    /// Returns true for the integer, decimal and double types.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::TinyInt
                | Self::SmallInt
                | Self::Integer
                | Self::BigInt
                | Self::Decimal { .. }
                | Self::Double
        )
    }

    /// Returns true for the integer types.
    #[must_use]
    pub const fn is_integral(&self) -> bool {
        self.integral_width().is_some()
    }

    /// Returns true for the character string types.
    #[must_use]
    pub const fn is_character(&self) -> bool {
        matches!(self, Self::Char(_) | Self::Varchar(_) | Self::Clob)
    }

    /// Returns true for the binary string types.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_) | Self::Varbinary(_) | Self::Blob)
    }

    /// Returns true for DATE, TIME and TIMESTAMP.
    #[must_use]
    pub const fn is_datetime(&self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::Timestamp)
    }

    /// Returns true for BOOLEAN.
    #[must_use]
    pub const fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean)
    }

    /// Returns true for large objects, which cannot be compared or grouped.
    #[must_use]
    pub const fn is_lob(&self) -> bool {
        matches!(self, Self::Clob | Self::Blob)
    }

    /// Nominal bit width of the integer types.
    #[must_use]
    pub const fn integral_width(&self) -> Option<u32> {
        match self {
            Self::TinyInt => Some(8),
            Self::SmallInt => Some(16),
            Self::Integer => Some(32),
            Self::BigInt => Some(64),
            _ => None,
        }
    }

    /// Decimal digits needed to represent the type, for exact numbers.
    #[must_use]
    pub const fn precision(&self) -> u32 {
        match self {
            Self::TinyInt => 3,
            Self::SmallInt => 5,
            Self::Integer => 10,
            Self::BigInt => 19,
            Self::Decimal { precision, .. } => *precision,
            Self::Double => 64,
            Self::Char(n) | Self::Varchar(n) | Self::Binary(n) | Self::Varbinary(n) => *n,
            _ => 0,
        }
    }

    /// Digits after the decimal point; zero for everything but DECIMAL.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        match self {
            Self::Decimal { scale, .. } => *scale,
            _ => 0,
        }
    }

    /// The type name without length, precision or element details.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Decimal { .. } => "DECIMAL",
            Self::Double => "DOUBLE",
            Self::Char(_) => "CHARACTER",
            Self::Varchar(_) => "VARCHAR",
            Self::Clob => "CLOB",
            Self::Binary(_) => "BINARY",
            Self::Varbinary(_) => "VARBINARY",
            Self::Blob => "BLOB",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Array(_) => "ARRAY",
        }
    }

    /// The type both operands can be converted to without loss, used by CASE,
    /// set operations, comparisons and value lists.
    ///
    /// # Errors
    ///
    /// Returns a 42562 type error when the types belong to different families.
    pub fn aggregate_type(&self, other: &Self) -> Result<Self> {
        if self == other {
            return Ok(self.clone());
        }

        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => Ok(Self::aggregate_numeric(a, b)),
            (a, b) if a.is_character() && b.is_character() => {
                Ok(match (a, b) {
                    (Self::Clob, _) | (_, Self::Clob) => Self::Clob,
                    (Self::Char(x), Self::Char(y)) => Self::Char(*x.max(y)),
                    _ => Self::Varchar(a.precision().max(b.precision())),
                })
            }
            (a, b) if a.is_binary() && b.is_binary() => Ok(match (a, b) {
                (Self::Blob, _) | (_, Self::Blob) => Self::Blob,
                (Self::Binary(x), Self::Binary(y)) => Self::Binary(*x.max(y)),
                _ => Self::Varbinary(a.precision().max(b.precision())),
            }),
            (Self::Date, Self::Timestamp) | (Self::Timestamp, Self::Date) => Ok(Self::Timestamp),
            (Self::Array(a), Self::Array(b)) => Ok(Self::Array(Box::new(a.aggregate_type(b)?))),
            _ => Err(incompatible(self, other)),
        }
    }

    fn aggregate_numeric(a: &Self, b: &Self) -> Self {
        if matches!(a, Self::Double) || matches!(b, Self::Double) {
            return Self::Double;
        }
        if let (Some(wa), Some(wb)) = (a.integral_width(), b.integral_width()) {
            return if wa >= wb { a.clone() } else { b.clone() };
        }
        let scale = a.scale().max(b.scale());
        let digits = (a.precision() - a.scale()).max(b.precision() - b.scale());
        Self::Decimal {
            precision: (digits + scale).min(MAX_DECIMAL_PRECISION),
            scale,
        }
    }

    /// Result type of `self <op> other` for numeric operands.
    ///
    /// Addition and multiplication widen integers by summing their widths;
    /// subtraction and division use the aggregate type.
    ///
    /// # Errors
    ///
    /// Returns a 42562 type error when either operand is not numeric.
    pub fn combined_type(&self, op: ArithmeticOp, other: &Self) -> Result<Self> {
        if !self.is_numeric() || !other.is_numeric() {
            return Err(incompatible(self, other));
        }
        if matches!(op, ArithmeticOp::Subtract | ArithmeticOp::Divide) {
            return self.aggregate_type(other);
        }
        if matches!(self, Self::Double) || matches!(other, Self::Double) {
            return Ok(Self::Double);
        }

        let width = self.integral_width().unwrap_or(256) + other.integral_width().unwrap_or(256);
        if width <= 32 {
            return Ok(Self::Integer);
        }
        if width <= 64 {
            return Ok(Self::BigInt);
        }

        let (s1, s2) = (self.scale(), other.scale());
        let (d1, d2) = (self.precision() - s1, other.precision() - s2);
        let (digits, scale) = match op {
            ArithmeticOp::Multiply => (d1 + d2, s1 + s2),
            _ => (d1.max(d2) + 1, s1.max(s2)),
        };
        Ok(Self::Decimal {
            precision: (digits + scale).min(MAX_DECIMAL_PRECISION),
            scale: scale.min(MAX_DECIMAL_PRECISION),
        })
    }

    /// Checks that values of the two types can be compared.
    ///
    /// # Errors
    ///
    /// Returns a 42562 type error for incomparable families, including LOBs.
    pub fn check_comparable(&self, other: &Self) -> Result<()> {
        if self.is_lob() || other.is_lob() {
            return Err(CompileError::type_error(
                ErrorCode::IncompatibleCombination,
                format!("{self} and {other} values cannot be compared"),
            ));
        }
        self.aggregate_type(other).map(|_| ())
    }

    /// Checks that CAST from `self` to `target` is defined.
    ///
    /// # Errors
    ///
    /// Returns a 42561 type error when the conversion is not defined.
    pub fn check_castable(&self, target: &Self) -> Result<()> {
        let ok = match (self, target) {
            (a, b) if a.is_character() || b.is_character() => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) if a.is_binary() && b.is_binary() => true,
            (Self::Boolean, Self::Boolean) => true,
            (Self::Date | Self::Timestamp, Self::Date | Self::Timestamp) => true,
            (Self::Time | Self::Timestamp, Self::Time) => true,
            (Self::Array(a), Self::Array(b)) => a.check_castable(b).is_ok(),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(CompileError::type_error(
                ErrorCode::IncompatibleConversion,
                format!("incompatible data type in conversion: {self} to {target}"),
            ))
        }
    }
}

fn incompatible(a: &DataType, b: &DataType) -> CompileError {
    CompileError::type_error(
        ErrorCode::IncompatibleCombination,
        format!("incompatible data types in combination: {a} and {b}"),
    )
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            Self::Char(n) => write!(f, "CHARACTER({n})"),
            Self::Varchar(n) => write!(f, "VARCHAR({n})"),
            Self::Binary(n) => write!(f, "BINARY({n})"),
            Self::Varbinary(n) => write!(f, "VARBINARY({n})"),
            Self::Array(element) => write!(f, "{element} ARRAY"),
            other => f.write_str(other.type_name()),
        }
    }
}

impl FromStr for DataType {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        crate::parser::parse_type_definition(s)
    }
}

impl TryFrom<String> for DataType {
    type Error = CompileError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_types() {
        assert_eq!(DataType::for_integer(7), DataType::Integer);
        assert_eq!(DataType::for_integer(1 << 40), DataType::BigInt);
        assert_eq!(
            DataType::for_decimal_text("12.50"),
            DataType::Decimal {
                precision: 4,
                scale: 2
            }
        );
        assert_eq!(
            DataType::for_decimal_text(".5"),
            DataType::Decimal {
                precision: 1,
                scale: 1
            }
        );
    }

    #[test]
    fn test_aggregate_numeric() {
        let int = DataType::Integer;
        assert_eq!(int.aggregate_type(&DataType::SmallInt).unwrap(), int);
        assert_eq!(
            int.aggregate_type(&DataType::Double).unwrap(),
            DataType::Double
        );
        let dec = DataType::Decimal {
            precision: 5,
            scale: 2,
        };
        assert_eq!(
            int.aggregate_type(&dec).unwrap(),
            DataType::Decimal {
                precision: 12,
                scale: 2
            }
        );
    }

    #[test]
    fn test_aggregate_character() {
        assert_eq!(
            DataType::Char(3)
                .aggregate_type(&DataType::Char(10))
                .unwrap(),
            DataType::Char(10)
        );
        assert_eq!(
            DataType::Char(3)
                .aggregate_type(&DataType::Varchar(2))
                .unwrap(),
            DataType::Varchar(3)
        );
    }

    #[test]
    fn test_aggregate_mismatch() {
        let err = DataType::Integer
            .aggregate_type(&DataType::Varchar(5))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::IncompatibleCombination));
    }

    #[test]
    fn test_combined_type_widens_by_width() {
        let add = |a: DataType, b: DataType| a.combined_type(ArithmeticOp::Add, &b).unwrap();
        assert_eq!(add(DataType::SmallInt, DataType::SmallInt), DataType::Integer);
        assert_eq!(add(DataType::Integer, DataType::Integer), DataType::BigInt);
        assert!(matches!(
            add(DataType::BigInt, DataType::BigInt),
            DataType::Decimal { scale: 0, .. }
        ));
        assert_eq!(
            DataType::Integer
                .combined_type(ArithmeticOp::Subtract, &DataType::Integer)
                .unwrap(),
            DataType::Integer
        );
    }

    #[test]
    fn test_castable() {
        assert!(DataType::Integer.check_castable(&DataType::Varchar(10)).is_ok());
        assert!(DataType::Date.check_castable(&DataType::Timestamp).is_ok());
        assert!(DataType::Boolean.check_castable(&DataType::Integer).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DataType::Decimal {
                precision: 10,
                scale: 2
            }
            .to_string(),
            "DECIMAL(10,2)"
        );
        assert_eq!(
            DataType::Array(Box::new(DataType::Integer)).to_string(),
            "INTEGER ARRAY"
        );
    }
}
