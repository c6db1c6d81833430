//! Expression tree.
//!
//! Every node is an [`Expression`] wrapping an [`ExprKind`]. The kind fixes the
//! number and meaning of the children, so a comparison always has exactly two
//! operands and a VALUE node never has any. Nodes are built bottom-up by the
//! parser and later annotated in place by the resolver (types, column
//! bindings, subquery correlation).

pub(crate) mod display;
mod ops;

use core::hash::{Hash, Hasher};

pub use ops::KindSet;

use crate::query::QueryExpression;
use crate::types::{ArithmeticOp, DataType};

/// Literal payload of VALUE nodes.
#[derive(Debug, Clone)]
pub enum Literal {
    /// NULL.
    Null,
    /// TRUE or FALSE.
    Boolean(bool),
    /// Integer literal.
    Integer(i64),
    /// Exact decimal literal, kept as written.
    Decimal(String),
    /// Approximate numeric literal.
    Double(f64),
    /// Character string literal.
    String(String),
    /// Binary string literal.
    Binary(Vec<u8>),
    /// `DATE '...'`.
    Date(String),
    /// `TIME '...'`.
    Time(String),
    /// `TIMESTAMP '...'`.
    Timestamp(String),
}

impl Literal {
    /// The type a literal carries before any context adopts it.
    ///
    /// NULL has no type of its own.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        Some(match self {
            Self::Null => return None,
            Self::Boolean(_) => DataType::Boolean,
            Self::Integer(v) => DataType::for_integer(*v),
            Self::Decimal(text) => DataType::for_decimal_text(text),
            Self::Double(_) => DataType::Double,
            Self::String(s) => {
                DataType::Char(u32::try_from(s.chars().count()).unwrap_or(u32::MAX))
            }
            Self::Binary(b) => DataType::Binary(u32::try_from(b.len()).unwrap_or(u32::MAX)),
            Self::Date(_) => DataType::Date,
            Self::Time(_) => DataType::Time,
            Self::Timestamp(_) => DataType::Timestamp,
        })
    }

    /// The literal with its sign flipped, for numeric literals.
    #[must_use]
    pub fn negated(&self) -> Option<Self> {
        match self {
            Self::Integer(v) => v.checked_neg().map(Self::Integer),
            Self::Decimal(text) => Some(Self::Decimal(match text.strip_prefix('-') {
                Some(positive) => positive.to_string(),
                None => format!("-{text}"),
            })),
            Self::Double(v) => Some(Self::Double(-v)),
            _ => None,
        }
    }

    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Binary(a), Self::Binary(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b))
            | (Self::String(a), Self::String(b))
            | (Self::Date(a), Self::Date(b))
            | (Self::Time(a), Self::Time(b))
            | (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Boolean(v) => v.hash(state),
            Self::Integer(v) => v.hash(state),
            Self::Double(v) => v.to_bits().hash(state),
            Self::Binary(v) => v.hash(state),
            Self::Decimal(s)
            | Self::String(s)
            | Self::Date(s)
            | Self::Time(s)
            | Self::Timestamp(s) => s.hash(state),
        }
    }
}

/// A schema object name, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
    /// Schema qualifier.
    pub schema: Option<String>,
    /// Object name.
    pub name: String,
}

impl ObjectName {
    /// Creates an unqualified name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Creates a schema-qualified name.
    #[must_use]
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Returns the name with `schema` filled in when it has none.
    #[must_use]
    pub fn or_schema(&self, schema: &str) -> Self {
        Self {
            schema: Some(self.schema.clone().unwrap_or_else(|| schema.to_string())),
            name: self.name.clone(),
        }
    }
}

/// A possibly qualified column reference: `[schema.][table.]column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnName {
    /// Schema qualifier.
    pub schema: Option<String>,
    /// Table or range alias qualifier.
    pub table: Option<String>,
    /// Column name.
    pub column: String,
}

impl ColumnName {
    /// Creates an unqualified column name.
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: None,
            column: column.into(),
        }
    }

    /// Creates a table-qualified column name.
    #[must_use]
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

/// Where a column reference was bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnBinding {
    /// Scope slot index of the owning range variable.
    pub range: usize,
    /// Ordinal of the column within the range.
    pub column: usize,
    /// Nesting depth of the owning query block.
    pub depth: usize,
    /// Base table the column comes from, when it is a table column.
    pub table: Option<ObjectName>,
}

/// A column reference and, once resolved, its binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// The name as written.
    pub name: ColumnName,
    /// Set by column resolution.
    pub binding: Option<ColumnBinding>,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// =
    Equal,
    /// <>
    NotEqual,
    /// <
    Less,
    /// <=
    LessOrEqual,
    /// >
    Greater,
    /// >=
    GreaterOrEqual,
}

impl ComparisonOp {
    /// Returns the SQL representation of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
        }
    }

    /// The operator with its operands swapped (`a < b` is `b > a`).
    #[must_use]
    pub const fn swapped(&self) -> Self {
        match self {
            Self::Less => Self::Greater,
            Self::LessOrEqual => Self::GreaterOrEqual,
            Self::Greater => Self::Less,
            Self::GreaterOrEqual => Self::LessOrEqual,
            other => *other,
        }
    }
}

/// ANY/ALL discriminator of a quantified comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    /// ANY or SOME.
    Any,
    /// ALL.
    All,
}

/// MATCH predicate variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// MATCH SIMPLE (the default).
    Simple,
    /// MATCH PARTIAL.
    Partial,
    /// MATCH FULL.
    Full,
}

/// Shape of a subquery used as an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubqueryKind {
    /// One row, one column.
    Scalar,
    /// One row, several columns.
    Row,
    /// Any number of rows, as the right side of IN or a quantified comparison.
    Table,
}

/// A derived-table descriptor owned by a subquery-bearing node.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    /// The query producing the rows.
    pub query: Box<QueryExpression>,
    /// Nesting depth of the query block.
    pub depth: usize,
    /// Set by resolution when the query references an enclosing scope.
    pub correlated: bool,
}

impl SubQuery {
    /// Wraps a query parsed at `depth`.
    #[must_use]
    pub fn new(query: QueryExpression, depth: usize) -> Self {
        Self {
            query: Box::new(query),
            depth,
            correlated: false,
        }
    }
}

/// The result pair of a CASEWHEN node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alternative {
    /// Value when the condition holds.
    pub then: Box<Expression>,
    /// Value otherwise.
    pub otherwise: Box<Expression>,
}

/// ORDER BY direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderDirection {
    /// Ascending (default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// NULL ordering in ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullOrdering {
    /// NULLs first.
    First,
    /// NULLs last.
    Last,
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortItem {
    /// The sort key.
    pub expression: Expression,
    /// Sort direction.
    pub direction: OrderDirection,
    /// Explicit NULL ordering.
    pub nulls: Option<NullOrdering>,
}

impl SortItem {
    /// Creates an ascending sort item.
    #[must_use]
    pub const fn new(expression: Expression) -> Self {
        Self {
            expression,
            direction: OrderDirection::Asc,
            nulls: None,
        }
    }

    /// Returns true for DESC.
    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.direction == OrderDirection::Desc
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    /// COUNT
    Count,
    /// SUM
    Sum,
    /// MIN
    Min,
    /// MAX
    Max,
    /// AVG
    Avg,
    /// EVERY
    Every,
    /// SOME / ANY
    Some,
    /// STDDEV_POP
    StddevPop,
    /// STDDEV_SAMP
    StddevSamp,
    /// VAR_POP
    VarPop,
    /// VAR_SAMP
    VarSamp,
    /// GROUP_CONCAT
    GroupConcat,
    /// ARRAY_AGG
    ArrayAgg,
    /// MEDIAN
    Median,
}

impl AggregateFunction {
    /// Looks an aggregate up by its (upper-case) name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "COUNT" => Self::Count,
            "SUM" => Self::Sum,
            "MIN" => Self::Min,
            "MAX" => Self::Max,
            "AVG" => Self::Avg,
            "EVERY" => Self::Every,
            "SOME" | "ANY" => Self::Some,
            "STDDEV_POP" => Self::StddevPop,
            "STDDEV_SAMP" => Self::StddevSamp,
            "VAR_POP" => Self::VarPop,
            "VAR_SAMP" => Self::VarSamp,
            "GROUP_CONCAT" => Self::GroupConcat,
            "ARRAY_AGG" => Self::ArrayAgg,
            "MEDIAN" => Self::Median,
            _ => return None,
        })
    }

    /// Returns the SQL name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Avg => "AVG",
            Self::Every => "EVERY",
            Self::Some => "SOME",
            Self::StddevPop => "STDDEV_POP",
            Self::StddevSamp => "STDDEV_SAMP",
            Self::VarPop => "VAR_POP",
            Self::VarSamp => "VAR_SAMP",
            Self::GroupConcat => "GROUP_CONCAT",
            Self::ArrayAgg => "ARRAY_AGG",
            Self::Median => "MEDIAN",
        }
    }

    /// The statistical functions, which take neither DISTINCT nor ALL.
    #[must_use]
    pub const fn is_statistical(&self) -> bool {
        matches!(
            self,
            Self::StddevPop | Self::StddevSamp | Self::VarPop | Self::VarSamp
        )
    }
}

/// An aggregate invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateCall {
    /// Which aggregate.
    pub function: AggregateFunction,
    /// DISTINCT was given.
    pub distinct: bool,
    /// The argument; an ASTERISK node for `COUNT(*)`.
    pub argument: Box<Expression>,
    /// ORDER BY inside GROUP_CONCAT / ARRAY_AGG.
    pub order_by: Vec<SortItem>,
    /// SEPARATOR of GROUP_CONCAT.
    pub separator: Option<String>,
}

/// Functions usable with OVER.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WindowFunction {
    /// RANK()
    Rank,
    /// DENSE_RANK()
    DenseRank,
    /// ROW_NUMBER()
    RowNumber,
    /// An aggregate over the window.
    Aggregate(AggregateCall),
}

/// A window function invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowCall {
    /// The function applied to each window.
    pub function: WindowFunction,
    /// PARTITION BY keys.
    pub partition_by: Vec<Expression>,
    /// ORDER BY inside OVER.
    pub order_by: Vec<SortItem>,
}

/// Built-in scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFunction {
    /// ABS(n)
    Abs,
    /// MOD(a, b)
    Mod,
    /// POWER(a, b)
    Power,
    /// SQRT(n)
    Sqrt,
    /// FLOOR(n)
    Floor,
    /// CEILING(n)
    Ceiling,
    /// UPPER(s)
    Upper,
    /// LOWER(s)
    Lower,
    /// CHAR_LENGTH(s)
    CharLength,
    /// OCTET_LENGTH(s)
    OctetLength,
    /// SUBSTRING(s, start [, length])
    Substring,
    /// TRIM(s)
    Trim,
    /// CONCAT(a, b, ...)
    Concat,
    /// CURRENT_DATE
    CurrentDate,
    /// CURRENT_TIME
    CurrentTime,
    /// CURRENT_TIMESTAMP
    CurrentTimestamp,
}

impl ScalarFunction {
    /// Looks a built-in function up by its (upper-case) name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ABS" => Self::Abs,
            "MOD" => Self::Mod,
            "POWER" => Self::Power,
            "SQRT" => Self::Sqrt,
            "FLOOR" => Self::Floor,
            "CEILING" | "CEIL" => Self::Ceiling,
            "UPPER" | "UCASE" => Self::Upper,
            "LOWER" | "LCASE" => Self::Lower,
            "CHAR_LENGTH" | "CHARACTER_LENGTH" | "LENGTH" => Self::CharLength,
            "OCTET_LENGTH" => Self::OctetLength,
            "SUBSTRING" | "SUBSTR" => Self::Substring,
            "TRIM" => Self::Trim,
            "CONCAT" => Self::Concat,
            "CURRENT_DATE" => Self::CurrentDate,
            "CURRENT_TIME" => Self::CurrentTime,
            "CURRENT_TIMESTAMP" | "NOW" => Self::CurrentTimestamp,
            _ => return None,
        })
    }

    /// Returns the SQL name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Abs => "ABS",
            Self::Mod => "MOD",
            Self::Power => "POWER",
            Self::Sqrt => "SQRT",
            Self::Floor => "FLOOR",
            Self::Ceiling => "CEILING",
            Self::Upper => "UPPER",
            Self::Lower => "LOWER",
            Self::CharLength => "CHAR_LENGTH",
            Self::OctetLength => "OCTET_LENGTH",
            Self::Substring => "SUBSTRING",
            Self::Trim => "TRIM",
            Self::Concat => "CONCAT",
            Self::CurrentDate => "CURRENT_DATE",
            Self::CurrentTime => "CURRENT_TIME",
            Self::CurrentTimestamp => "CURRENT_TIMESTAMP",
        }
    }

    /// Accepted argument counts, inclusive. `None` means unbounded.
    #[must_use]
    pub const fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Self::CurrentDate | Self::CurrentTime | Self::CurrentTimestamp => (0, Some(0)),
            Self::Abs
            | Self::Sqrt
            | Self::Floor
            | Self::Ceiling
            | Self::Upper
            | Self::Lower
            | Self::CharLength
            | Self::OctetLength
            | Self::Trim => (1, Some(1)),
            Self::Mod | Self::Power => (2, Some(2)),
            Self::Substring => (2, Some(3)),
            Self::Concat => (2, None),
        }
    }

    /// Returns true for the niladic functions written without parentheses.
    #[must_use]
    pub const fn is_niladic(&self) -> bool {
        matches!(
            self,
            Self::CurrentDate | Self::CurrentTime | Self::CurrentTimestamp
        )
    }
}

/// A built-in function invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCall {
    /// The function.
    pub function: ScalarFunction,
    /// Arguments in order.
    pub arguments: Vec<Expression>,
}

/// A user-defined routine invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutineCall {
    /// Schema-qualified routine name.
    pub name: ObjectName,
    /// Arguments in order.
    pub arguments: Vec<Expression>,
    /// Declared parameter types, from the catalog.
    pub parameter_types: Vec<DataType>,
    /// Declared return type, from the catalog.
    pub return_type: DataType,
}

/// The closed set of node kinds, each with its own children.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value; no children.
    Value(Literal),
    /// Dynamic parameter `?`, numbered in statement order.
    Parameter(usize),
    /// Column reference.
    Column(ColumnRef),
    /// Reference to a slot of the materialized select row.
    SimpleColumn(usize),
    /// `*` inside `COUNT(*)`.
    Asterisk,
    /// Row value constructor.
    Row(Vec<Expression>),
    /// `ARRAY[...]`.
    Array(Vec<Expression>),
    /// Value list on the right side of `= ANY`; elements may be rows.
    ValueList(Vec<Expression>),
    /// Unary minus.
    Negate(Box<Expression>),
    /// Arithmetic.
    Arithmetic {
        /// Operator.
        op: ArithmeticOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// String concatenation `||`.
    Concat {
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Comparison, optionally quantified.
    Comparison {
        /// Operator.
        op: ComparisonOp,
        /// ANY/ALL for quantified comparisons.
        quantifier: Option<Quantifier>,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand; a table subquery or value list when quantified.
        right: Box<Expression>,
    },
    /// `left IS NOT DISTINCT FROM right`.
    NotDistinct {
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Conjunction.
    And(Box<Expression>, Box<Expression>),
    /// Disjunction.
    Or(Box<Expression>, Box<Expression>),
    /// Negation.
    Not(Box<Expression>),
    /// `operand IS NULL`.
    IsNull(Box<Expression>),
    /// `value LIKE pattern [ESCAPE escape]`.
    Like {
        /// Matched value.
        value: Box<Expression>,
        /// Pattern.
        pattern: Box<Expression>,
        /// Escape character.
        escape: Option<Box<Expression>>,
    },
    /// `value STARTS WITH prefix`.
    StartsWith {
        /// Matched value.
        value: Box<Expression>,
        /// Prefix.
        prefix: Box<Expression>,
    },
    /// Literal IN list, kept for CHECK and trigger predicates.
    In {
        /// Probed value.
        value: Box<Expression>,
        /// Candidates.
        list: Vec<Expression>,
    },
    /// `EXISTS (query)`.
    Exists(SubQuery),
    /// `UNIQUE (query)`.
    Unique(SubQuery),
    /// `row MATCH [UNIQUE] kind (query)`.
    Match {
        /// Variant.
        kind: MatchKind,
        /// UNIQUE was given.
        unique: bool,
        /// Probed row.
        value: Box<Expression>,
        /// Candidate rows.
        query: SubQuery,
    },
    /// `(start, end) OVERLAPS (start, end)`.
    Overlaps {
        /// Left period.
        left: Box<Expression>,
        /// Right period.
        right: Box<Expression>,
    },
    /// `CASEWHEN(condition, then, otherwise)`.
    CaseWhen {
        /// Boolean condition.
        condition: Box<Expression>,
        /// Result pair.
        alternative: Alternative,
    },
    /// Aggregate function.
    Aggregate(Box<AggregateCall>),
    /// Window function.
    Window(Box<WindowCall>),
    /// Built-in scalar function.
    Function(FunctionCall),
    /// User-defined routine.
    Routine(RoutineCall),
    /// `NEXT VALUE FOR sequence`.
    Sequence(ObjectName),
    /// `CAST(operand AS target)`.
    Cast {
        /// Converted value.
        operand: Box<Expression>,
        /// Target type.
        target: DataType,
    },
    /// Subquery used as a value.
    Subquery {
        /// Expected shape.
        kind: SubqueryKind,
        /// The query.
        query: SubQuery,
    },
}

/// Flat operator tags, one per node shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OpType {
    Value,
    Parameter,
    Column,
    SimpleColumn,
    Asterisk,
    Row,
    Array,
    ValueList,
    Negate,
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    NotDistinct,
    And,
    Or,
    Not,
    IsNull,
    Like,
    StartsWith,
    In,
    Exists,
    Unique,
    Match,
    Overlaps,
    CaseWhen,
    Aggregate,
    Window,
    Function,
    Routine,
    Sequence,
    Cast,
    ScalarSubquery,
    RowSubquery,
    TableSubquery,
}

/// A node of the expression tree.
#[derive(Debug, Clone)]
pub struct Expression {
    kind: ExprKind,
    data_type: Option<DataType>,
    node_types: Vec<Option<DataType>>,
    alias: Option<String>,
    aggregate: bool,
}

impl Expression {
    /// Creates a node of the given kind. VALUE nodes take their literal's type.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        let data_type = match &kind {
            ExprKind::Value(literal) => literal.data_type(),
            ExprKind::Cast { target, .. } => Some(target.clone()),
            _ => None,
        };
        let mut expr = Self {
            kind,
            data_type,
            node_types: Vec::new(),
            alias: None,
            aggregate: false,
        };
        expr.aggregate = expr.compute_aggregate();
        expr
    }

    fn compute_aggregate(&self) -> bool {
        matches!(self.kind, ExprKind::Aggregate(_))
            || self.children().into_iter().any(Self::is_aggregate)
    }

    pub(crate) fn refresh_aggregate(&mut self) {
        self.aggregate = self.compute_aggregate();
    }

    // --- Constructors ---

    /// A literal value.
    #[must_use]
    pub fn value(literal: Literal) -> Self {
        Self::new(ExprKind::Value(literal))
    }

    /// NULL literal.
    #[must_use]
    pub fn null() -> Self {
        Self::value(Literal::Null)
    }

    /// Integer literal.
    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::value(Literal::Integer(value))
    }

    /// Boolean literal.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::value(Literal::Boolean(value))
    }

    /// Character string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::value(Literal::String(value.into()))
    }

    /// Unresolved column reference.
    #[must_use]
    pub fn column(name: ColumnName) -> Self {
        Self::new(ExprKind::Column(ColumnRef {
            name,
            binding: None,
        }))
    }

    /// Dynamic parameter with the given ordinal.
    #[must_use]
    pub fn parameter(index: usize) -> Self {
        Self::new(ExprKind::Parameter(index))
    }

    /// `left op right`.
    #[must_use]
    pub fn arithmetic(op: ArithmeticOp, left: Self, right: Self) -> Self {
        Self::new(ExprKind::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `left op right` for comparisons.
    #[must_use]
    pub fn compare(op: ComparisonOp, left: Self, right: Self) -> Self {
        Self::new(ExprKind::Comparison {
            op,
            quantifier: None,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `left op ANY|ALL right`.
    #[must_use]
    pub fn compare_quantified(
        op: ComparisonOp,
        quantifier: Quantifier,
        left: Self,
        right: Self,
    ) -> Self {
        Self::new(ExprKind::Comparison {
            op,
            quantifier: Some(quantifier),
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `left IS NOT DISTINCT FROM right`.
    #[must_use]
    pub fn not_distinct(left: Self, right: Self) -> Self {
        Self::new(ExprKind::NotDistinct {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `left AND right`.
    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::new(ExprKind::And(Box::new(left), Box::new(right)))
    }

    /// `left OR right`.
    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::new(ExprKind::Or(Box::new(left), Box::new(right)))
    }

    /// `NOT operand`.
    #[must_use]
    pub fn not(operand: Self) -> Self {
        Self::new(ExprKind::Not(Box::new(operand)))
    }

    /// `operand IS NULL`.
    #[must_use]
    pub fn is_null(operand: Self) -> Self {
        Self::new(ExprKind::IsNull(Box::new(operand)))
    }

    /// `-operand`.
    #[must_use]
    pub fn negate(operand: Self) -> Self {
        Self::new(ExprKind::Negate(Box::new(operand)))
    }

    /// `left || right`.
    #[must_use]
    pub fn concat(left: Self, right: Self) -> Self {
        Self::new(ExprKind::Concat {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `CASEWHEN(condition, then, otherwise)`.
    #[must_use]
    pub fn case_when(condition: Self, then: Self, otherwise: Self) -> Self {
        Self::new(ExprKind::CaseWhen {
            condition: Box::new(condition),
            alternative: Alternative {
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        })
    }

    /// Row value constructor.
    #[must_use]
    pub fn row(fields: Vec<Self>) -> Self {
        Self::new(ExprKind::Row(fields))
    }

    /// Value list for quantified comparisons.
    #[must_use]
    pub fn value_list(values: Vec<Self>) -> Self {
        Self::new(ExprKind::ValueList(values))
    }

    /// Conjunction of all `terms`; `None` when empty.
    #[must_use]
    pub fn conjunction(terms: Vec<Self>) -> Option<Self> {
        terms.into_iter().reduce(Self::and)
    }

    // --- Accessors ---

    /// The node kind.
    #[must_use]
    pub const fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ExprKind {
        &mut self.kind
    }

    /// Consumes the node and returns its kind.
    #[must_use]
    pub fn into_kind(self) -> ExprKind {
        self.kind
    }

    /// The resolved data type, if known.
    #[must_use]
    pub const fn data_type(&self) -> Option<&DataType> {
        self.data_type.as_ref()
    }

    pub(crate) fn set_data_type(&mut self, data_type: Option<DataType>) {
        self.data_type = data_type;
    }

    /// Per-position types of ROW nodes and row/table subqueries.
    #[must_use]
    pub fn node_types(&self) -> &[Option<DataType>] {
        &self.node_types
    }

    pub(crate) fn set_node_types(&mut self, types: Vec<Option<DataType>>) {
        self.node_types = types;
    }

    /// Display name given with `AS`.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Sets the display name.
    pub fn set_alias(&mut self, alias: Option<String>) {
        self.alias = alias;
    }

    /// Returns the node with a display name.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// True if the node is, or contains outside subqueries, an aggregate call.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    /// Number of positions for row-shaped nodes, one otherwise.
    #[must_use]
    pub fn degree(&self) -> usize {
        match &self.kind {
            ExprKind::Row(fields) => fields.len(),
            ExprKind::Subquery {
                kind: SubqueryKind::Row | SubqueryKind::Table,
                query,
            } => query.query.degree(),
            _ => 1,
        }
    }

    /// The column reference, for COLUMN nodes.
    #[must_use]
    pub const fn as_column(&self) -> Option<&ColumnRef> {
        match &self.kind {
            ExprKind::Column(column) => Some(column),
            _ => None,
        }
    }

    /// The literal, for VALUE nodes.
    #[must_use]
    pub const fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Value(literal) => Some(literal),
            _ => None,
        }
    }

    /// The operator tag of this node.
    #[must_use]
    pub const fn op_type(&self) -> OpType {
        match &self.kind {
            ExprKind::Value(_) => OpType::Value,
            ExprKind::Parameter(_) => OpType::Parameter,
            ExprKind::Column(_) => OpType::Column,
            ExprKind::SimpleColumn(_) => OpType::SimpleColumn,
            ExprKind::Asterisk => OpType::Asterisk,
            ExprKind::Row(_) => OpType::Row,
            ExprKind::Array(_) => OpType::Array,
            ExprKind::ValueList(_) => OpType::ValueList,
            ExprKind::Negate(_) => OpType::Negate,
            ExprKind::Arithmetic { op, .. } => match op {
                ArithmeticOp::Add => OpType::Add,
                ArithmeticOp::Subtract => OpType::Subtract,
                ArithmeticOp::Multiply => OpType::Multiply,
                ArithmeticOp::Divide => OpType::Divide,
            },
            ExprKind::Concat { .. } => OpType::Concat,
            ExprKind::Comparison { op, .. } => match op {
                ComparisonOp::Equal => OpType::Equal,
                ComparisonOp::NotEqual => OpType::NotEqual,
                ComparisonOp::Less => OpType::Less,
                ComparisonOp::LessOrEqual => OpType::LessOrEqual,
                ComparisonOp::Greater => OpType::Greater,
                ComparisonOp::GreaterOrEqual => OpType::GreaterOrEqual,
            },
            ExprKind::NotDistinct { .. } => OpType::NotDistinct,
            ExprKind::And(..) => OpType::And,
            ExprKind::Or(..) => OpType::Or,
            ExprKind::Not(_) => OpType::Not,
            ExprKind::IsNull(_) => OpType::IsNull,
            ExprKind::Like { .. } => OpType::Like,
            ExprKind::StartsWith { .. } => OpType::StartsWith,
            ExprKind::In { .. } => OpType::In,
            ExprKind::Exists(_) => OpType::Exists,
            ExprKind::Unique(_) => OpType::Unique,
            ExprKind::Match { .. } => OpType::Match,
            ExprKind::Overlaps { .. } => OpType::Overlaps,
            ExprKind::CaseWhen { .. } => OpType::CaseWhen,
            ExprKind::Aggregate(_) => OpType::Aggregate,
            ExprKind::Window(_) => OpType::Window,
            ExprKind::Function(_) => OpType::Function,
            ExprKind::Routine(_) => OpType::Routine,
            ExprKind::Sequence(_) => OpType::Sequence,
            ExprKind::Cast { .. } => OpType::Cast,
            ExprKind::Subquery { kind, .. } => match kind {
                SubqueryKind::Scalar => OpType::ScalarSubquery,
                SubqueryKind::Row => OpType::RowSubquery,
                SubqueryKind::Table => OpType::TableSubquery,
            },
        }
    }

    /// The query owned by subquery-bearing nodes.
    #[must_use]
    pub const fn subquery(&self) -> Option<&SubQuery> {
        match &self.kind {
            ExprKind::Exists(query)
            | ExprKind::Unique(query)
            | ExprKind::Match { query, .. }
            | ExprKind::Subquery { query, .. } => Some(query),
            _ => None,
        }
    }

    pub(crate) fn subquery_mut(&mut self) -> Option<&mut SubQuery> {
        match &mut self.kind {
            ExprKind::Exists(query)
            | ExprKind::Unique(query)
            | ExprKind::Match { query, .. }
            | ExprKind::Subquery { query, .. } => Some(query),
            _ => None,
        }
    }

    /// Direct children in slot order. Subquery bodies are not children.
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match &self.kind {
            ExprKind::Value(_)
            | ExprKind::Parameter(_)
            | ExprKind::Column(_)
            | ExprKind::SimpleColumn(_)
            | ExprKind::Asterisk
            | ExprKind::Sequence(_)
            | ExprKind::Exists(_)
            | ExprKind::Unique(_)
            | ExprKind::Subquery { .. } => Vec::new(),
            ExprKind::Row(items) | ExprKind::Array(items) | ExprKind::ValueList(items) => {
                items.iter().collect()
            }
            ExprKind::Negate(operand)
            | ExprKind::Not(operand)
            | ExprKind::IsNull(operand)
            | ExprKind::Cast { operand, .. } => vec![operand],
            ExprKind::Arithmetic { left, right, .. }
            | ExprKind::Concat { left, right }
            | ExprKind::Comparison { left, right, .. }
            | ExprKind::NotDistinct { left, right }
            | ExprKind::And(left, right)
            | ExprKind::Or(left, right)
            | ExprKind::Overlaps { left, right } => vec![left, right],
            ExprKind::Like {
                value,
                pattern,
                escape,
            } => {
                let mut out: Vec<&Self> = vec![value, pattern];
                out.extend(escape.as_deref());
                out
            }
            ExprKind::StartsWith { value, prefix } => vec![value, prefix],
            ExprKind::In { value, list } => {
                let mut out: Vec<&Self> = vec![value];
                out.extend(list);
                out
            }
            ExprKind::Match { value, .. } => vec![value],
            ExprKind::CaseWhen {
                condition,
                alternative,
            } => vec![condition, &alternative.then, &alternative.otherwise],
            ExprKind::Aggregate(call) => aggregate_children(call),
            ExprKind::Window(call) => {
                let mut out: Vec<&Self> = match &call.function {
                    WindowFunction::Aggregate(inner) => aggregate_children(inner),
                    _ => Vec::new(),
                };
                out.extend(&call.partition_by);
                out.extend(call.order_by.iter().map(|item| &item.expression));
                out
            }
            ExprKind::Function(call) => call.arguments.iter().collect(),
            ExprKind::Routine(call) => call.arguments.iter().collect(),
        }
    }

    /// Mutable direct children, in the same order as [`Expression::children`].
    pub fn children_mut(&mut self) -> Vec<&mut Self> {
        match &mut self.kind {
            ExprKind::Value(_)
            | ExprKind::Parameter(_)
            | ExprKind::Column(_)
            | ExprKind::SimpleColumn(_)
            | ExprKind::Asterisk
            | ExprKind::Sequence(_)
            | ExprKind::Exists(_)
            | ExprKind::Unique(_)
            | ExprKind::Subquery { .. } => Vec::new(),
            ExprKind::Row(items) | ExprKind::Array(items) | ExprKind::ValueList(items) => {
                items.iter_mut().collect()
            }
            ExprKind::Negate(operand)
            | ExprKind::Not(operand)
            | ExprKind::IsNull(operand)
            | ExprKind::Cast { operand, .. } => vec![operand],
            ExprKind::Arithmetic { left, right, .. }
            | ExprKind::Concat { left, right }
            | ExprKind::Comparison { left, right, .. }
            | ExprKind::NotDistinct { left, right }
            | ExprKind::And(left, right)
            | ExprKind::Or(left, right)
            | ExprKind::Overlaps { left, right } => vec![left, right],
            ExprKind::Like {
                value,
                pattern,
                escape,
            } => {
                let mut out: Vec<&mut Self> = vec![value, pattern];
                out.extend(escape.as_deref_mut());
                out
            }
            ExprKind::StartsWith { value, prefix } => vec![value, prefix],
            ExprKind::In { value, list } => {
                let mut out: Vec<&mut Self> = vec![value];
                out.extend(list.iter_mut());
                out
            }
            ExprKind::Match { value, .. } => vec![value],
            ExprKind::CaseWhen {
                condition,
                alternative,
            } => vec![
                condition,
                &mut alternative.then,
                &mut alternative.otherwise,
            ],
            ExprKind::Aggregate(call) => aggregate_children_mut(call),
            ExprKind::Window(call) => {
                let WindowCall {
                    function,
                    partition_by,
                    order_by,
                } = call.as_mut();
                let mut out: Vec<&mut Self> = match function {
                    WindowFunction::Aggregate(inner) => aggregate_children_mut(inner),
                    _ => Vec::new(),
                };
                out.extend(partition_by.iter_mut());
                out.extend(order_by.iter_mut().map(|item| &mut item.expression));
                out
            }
            ExprKind::Function(call) => call.arguments.iter_mut().collect(),
            ExprKind::Routine(call) => call.arguments.iter_mut().collect(),
        }
    }
}

fn aggregate_children(call: &AggregateCall) -> Vec<&Expression> {
    let mut out = vec![call.argument.as_ref()];
    out.extend(call.order_by.iter().map(|item| &item.expression));
    out
}

fn aggregate_children_mut(call: &mut AggregateCall) -> Vec<&mut Expression> {
    let AggregateCall {
        argument, order_by, ..
    } = call;
    let mut out = vec![argument.as_mut()];
    out.extend(order_by.iter_mut().map(|item| &mut item.expression));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Expression {
        Expression::column(ColumnName::new(name))
    }

    fn count_star() -> Expression {
        Expression::new(ExprKind::Aggregate(Box::new(AggregateCall {
            function: AggregateFunction::Count,
            distinct: false,
            argument: Box::new(Expression::new(ExprKind::Asterisk)),
            order_by: Vec::new(),
            separator: None,
        })))
    }

    #[test]
    fn test_value_nodes_carry_literal_type() {
        assert_eq!(Expression::integer(3).data_type(), Some(&DataType::Integer));
        assert_eq!(Expression::null().data_type(), None);
        assert_eq!(
            Expression::string("abc").data_type(),
            Some(&DataType::Char(3))
        );
    }

    #[test]
    fn test_aggregate_flag_is_memoized_upwards() {
        let sum = Expression::arithmetic(ArithmeticOp::Add, count_star(), Expression::integer(1));
        assert!(sum.is_aggregate());
        assert!(!Expression::arithmetic(ArithmeticOp::Add, col("A"), col("B")).is_aggregate());
    }

    #[test]
    fn test_children_follow_kind_arity() {
        let like = Expression::new(ExprKind::Like {
            value: Box::new(col("A")),
            pattern: Box::new(Expression::string("x%")),
            escape: None,
        });
        assert_eq!(like.children().len(), 2);
        assert!(Expression::integer(1).children().is_empty());
        let case = Expression::case_when(
            Expression::boolean(true),
            Expression::integer(1),
            Expression::integer(2),
        );
        assert_eq!(case.children().len(), 3);
    }

    #[test]
    fn test_op_type() {
        let cmp = Expression::compare(ComparisonOp::LessOrEqual, col("A"), col("B"));
        assert_eq!(cmp.op_type(), OpType::LessOrEqual);
        assert_eq!(count_star().op_type(), OpType::Aggregate);
    }

    #[test]
    fn test_literal_negation() {
        assert_eq!(Literal::Integer(5).negated(), Some(Literal::Integer(-5)));
        assert_eq!(
            Literal::Decimal("-1.5".into()).negated(),
            Some(Literal::Decimal("1.5".into()))
        );
        assert_eq!(Literal::String("x".into()).negated(), None);
    }

    #[test]
    fn test_conjunction() {
        assert!(Expression::conjunction(vec![]).is_none());
        let both = Expression::conjunction(vec![col("A"), col("B")]).unwrap();
        assert_eq!(both.op_type(), OpType::And);
    }
}
