//! SQL rendering of expressions.
//!
//! Composite nodes are printed fully parenthesized, so parsing the output
//! yields an equal tree.

use core::fmt::{self, Display, Formatter, Write};

use super::{
    ColumnName, ExprKind, Expression, Literal, MatchKind, NullOrdering, ObjectName,
    OrderDirection, Quantifier, SortItem, WindowFunction,
};
use crate::lexer::Keyword;

/// Writes `name` bare when it lexes back to itself, double-quoted otherwise.
pub(crate) fn write_identifier(f: &mut impl Write, name: &str) -> fmt::Result {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !Keyword::from_str(name).is_some_and(|kw| kw.is_reserved());
    if plain {
        f.write_str(name)
    } else {
        write!(f, "\"{}\"", name.replace('"', "\"\""))
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_sort_items(f: &mut Formatter<'_>, items: &[SortItem]) -> fmt::Result {
    write_list(f, items)
}

impl Display for ObjectName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write_identifier(f, schema)?;
            f.write_char('.')?;
        }
        write_identifier(f, &self.name)
    }
}

impl Display for ColumnName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write_identifier(f, schema)?;
            f.write_char('.')?;
        }
        if let Some(table) = &self.table {
            write_identifier(f, table)?;
            f.write_char('.')?;
        }
        write_identifier(f, &self.column)
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(true) => f.write_str("TRUE"),
            Self::Boolean(false) => f.write_str("FALSE"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(text) => f.write_str(text),
            Self::Double(v) => write!(f, "{v:E}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Binary(bytes) => {
                f.write_str("X'")?;
                for byte in bytes {
                    write!(f, "{byte:02X}")?;
                }
                f.write_char('\'')
            }
            Self::Date(s) => write!(f, "DATE '{s}'"),
            Self::Time(s) => write!(f, "TIME '{s}'"),
            Self::Timestamp(s) => write!(f, "TIMESTAMP '{s}'"),
        }
    }
}

impl Display for SortItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)?;
        if self.direction == OrderDirection::Desc {
            f.write_str(" DESC")?;
        }
        match self.nulls {
            Some(NullOrdering::First) => f.write_str(" NULLS FIRST"),
            Some(NullOrdering::Last) => f.write_str(" NULLS LAST"),
            None => Ok(()),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Value(literal) => write!(f, "{literal}"),
            ExprKind::Parameter(_) => f.write_char('?'),
            ExprKind::Column(column) => write!(f, "{}", column.name),
            ExprKind::SimpleColumn(index) => write!(f, "#{index}"),
            ExprKind::Asterisk => f.write_char('*'),
            ExprKind::Row(fields) => {
                f.write_str("ROW(")?;
                write_list(f, fields)?;
                f.write_char(')')
            }
            ExprKind::Array(elements) => {
                f.write_str("ARRAY[")?;
                write_list(f, elements)?;
                f.write_char(']')
            }
            ExprKind::ValueList(values) => {
                f.write_char('(')?;
                write_list(f, values)?;
                f.write_char(')')
            }
            ExprKind::Negate(operand) => write!(f, "-({operand})"),
            ExprKind::Arithmetic { op, left, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
            ExprKind::Concat { left, right } => write!(f, "({left} || {right})"),
            ExprKind::Comparison {
                op,
                quantifier,
                left,
                right,
            } => {
                write!(f, "({left} {}", op.as_str())?;
                match quantifier {
                    Some(Quantifier::Any) => f.write_str(" ANY")?,
                    Some(Quantifier::All) => f.write_str(" ALL")?,
                    None => {}
                }
                write!(f, " {right})")
            }
            ExprKind::NotDistinct { left, right } => {
                write!(f, "({left} IS NOT DISTINCT FROM {right})")
            }
            ExprKind::And(left, right) => write!(f, "({left} AND {right})"),
            ExprKind::Or(left, right) => write!(f, "({left} OR {right})"),
            ExprKind::Not(operand) => write!(f, "(NOT {operand})"),
            ExprKind::IsNull(operand) => write!(f, "({operand} IS NULL)"),
            ExprKind::Like {
                value,
                pattern,
                escape,
            } => {
                write!(f, "({value} LIKE {pattern}")?;
                if let Some(escape) = escape {
                    write!(f, " ESCAPE {escape}")?;
                }
                f.write_char(')')
            }
            ExprKind::StartsWith { value, prefix } => write!(f, "({value} STARTS WITH {prefix})"),
            ExprKind::In { value, list } => {
                write!(f, "({value} IN (")?;
                write_list(f, list)?;
                f.write_str("))")
            }
            ExprKind::Exists(query) => write!(f, "EXISTS ({})", query.query),
            ExprKind::Unique(query) => write!(f, "UNIQUE ({})", query.query),
            ExprKind::Match {
                kind,
                unique,
                value,
                query,
            } => {
                write!(f, "({value} MATCH ")?;
                if *unique {
                    f.write_str("UNIQUE ")?;
                }
                let kind = match kind {
                    MatchKind::Simple => "SIMPLE",
                    MatchKind::Partial => "PARTIAL",
                    MatchKind::Full => "FULL",
                };
                write!(f, "{kind} ({}))", query.query)
            }
            ExprKind::Overlaps { left, right } => write!(f, "({left} OVERLAPS {right})"),
            ExprKind::CaseWhen {
                condition,
                alternative,
            } => write!(
                f,
                "CASEWHEN({condition}, {}, {})",
                alternative.then, alternative.otherwise
            ),
            ExprKind::Aggregate(call) => {
                write!(f, "{}(", call.function.as_str())?;
                if call.distinct {
                    f.write_str("DISTINCT ")?;
                }
                write!(f, "{}", call.argument)?;
                if !call.order_by.is_empty() {
                    f.write_str(" ORDER BY ")?;
                    write_sort_items(f, &call.order_by)?;
                }
                if let Some(separator) = &call.separator {
                    write!(f, " SEPARATOR '{}'", separator.replace('\'', "''"))?;
                }
                f.write_char(')')
            }
            ExprKind::Window(call) => {
                match &call.function {
                    WindowFunction::Rank => f.write_str("RANK()")?,
                    WindowFunction::DenseRank => f.write_str("DENSE_RANK()")?,
                    WindowFunction::RowNumber => f.write_str("ROW_NUMBER()")?,
                    WindowFunction::Aggregate(inner) => {
                        write!(f, "{}(", inner.function.as_str())?;
                        if inner.distinct {
                            f.write_str("DISTINCT ")?;
                        }
                        write!(f, "{})", inner.argument)?;
                    }
                }
                f.write_str(" OVER (")?;
                if !call.partition_by.is_empty() {
                    f.write_str("PARTITION BY ")?;
                    write_list(f, &call.partition_by)?;
                    if !call.order_by.is_empty() {
                        f.write_char(' ')?;
                    }
                }
                if !call.order_by.is_empty() {
                    f.write_str("ORDER BY ")?;
                    write_sort_items(f, &call.order_by)?;
                }
                f.write_char(')')
            }
            ExprKind::Function(call) => {
                f.write_str(call.function.as_str())?;
                if call.function.is_niladic() {
                    return Ok(());
                }
                f.write_char('(')?;
                write_list(f, &call.arguments)?;
                f.write_char(')')
            }
            ExprKind::Routine(call) => {
                write!(f, "{}(", call.name)?;
                write_list(f, &call.arguments)?;
                f.write_char(')')
            }
            ExprKind::Sequence(name) => write!(f, "NEXT VALUE FOR {name}"),
            ExprKind::Cast { operand, target } => write!(f, "CAST({operand} AS {target})"),
            ExprKind::Subquery { query, .. } => write!(f, "({})", query.query),
        }
    }
}
