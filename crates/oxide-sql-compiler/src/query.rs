//! Query expressions: SELECT blocks, VALUES, set operations and their
//! ORDER BY / LIMIT wrappers.

use core::fmt::{self, Display, Formatter, Write};

use crate::expression::display::write_identifier;
use crate::expression::{Expression, KindSet, SortItem};
use crate::range::{RangeColumn, RangeVariable};
use crate::types::DataType;

/// A named column of a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    /// Column name; `C1`, `C2`, ... when the item has no natural name.
    pub name: String,
    /// Resolved type; `None` only for an untyped NULL or parameter.
    pub data_type: Option<DataType>,
}

/// Set operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperator {
    /// UNION
    Union,
    /// EXCEPT / MINUS
    Except,
    /// INTERSECT
    Intersect,
}

impl SetOperator {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::Except => "EXCEPT",
            Self::Intersect => "INTERSECT",
        }
    }
}

/// `left <op> [ALL|DISTINCT] [CORRESPONDING [BY (...)]] right`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    /// Operator.
    pub operator: SetOperator,
    /// ALL was given.
    pub all: bool,
    /// `Some` when CORRESPONDING was given; the list is empty without BY.
    pub corresponding: Option<Vec<String>>,
    /// Left operand.
    pub left: QueryExpression,
    /// Right operand.
    pub right: QueryExpression,
    /// Left column ordinals taking part, after CORRESPONDING mapping.
    pub left_columns: Vec<usize>,
    /// Right column ordinals taking part, after CORRESPONDING mapping.
    pub right_columns: Vec<usize>,
}

/// One entry of a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// An expression; `AS name` is kept as the expression's alias.
    Expression(Expression),
    /// `*` or `qualifier.*`, replaced by columns during resolution.
    Wildcard(Option<String>),
}

/// A single SELECT block.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpecification {
    /// SELECT DISTINCT.
    pub distinct: bool,
    /// Select list.
    pub items: Vec<SelectItem>,
    /// FROM items, joined left to right.
    pub from: Vec<RangeVariable>,
    /// WHERE condition.
    pub where_clause: Option<Expression>,
    /// GROUP BY expressions.
    pub group_by: Vec<Expression>,
    /// HAVING condition.
    pub having: Option<Expression>,
    /// Nesting depth of the block.
    pub depth: usize,
}

impl QuerySpecification {
    /// An empty block at `depth`.
    #[must_use]
    pub const fn new(depth: usize) -> Self {
        Self {
            distinct: false,
            items: Vec::new(),
            from: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            depth,
        }
    }

    /// True if the block groups rows, explicitly or through aggregates.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
            || self.having.is_some()
            || self.items.iter().any(|item| match item {
                SelectItem::Expression(e) => e.is_aggregate(),
                SelectItem::Wildcard(_) => false,
            })
    }

    /// Select-list expressions; empty slots for unexpanded wildcards.
    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.items.iter().filter_map(|item| match item {
            SelectItem::Expression(e) => Some(e),
            SelectItem::Wildcard(_) => None,
        })
    }
}

/// OFFSET / LIMIT.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    /// Rows to skip.
    pub offset: Option<Expression>,
    /// Maximum rows to return.
    pub limit: Option<Expression>,
}

/// One WITH list element.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonTableExpression {
    /// Query name.
    pub name: String,
    /// Explicit column names, if given.
    pub column_names: Vec<String>,
    /// Definition; for recursive queries a UNION ALL of seed and recursion.
    pub query: QueryExpression,
    /// Defined with RECURSIVE and references itself.
    pub recursive: bool,
    /// Resulting columns, set by resolution.
    pub columns: Vec<RangeColumn>,
}

/// The body of a query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    /// SELECT block.
    Select(Box<QuerySpecification>),
    /// `VALUES row, row, ...`; every row is a ROW node or a single value.
    Values(Vec<Expression>),
    /// Set operation.
    SetOperation(Box<SetOperation>),
}

/// A complete query: optional WITH, a body, and ORDER BY / LIMIT.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpression {
    /// WITH list.
    pub with: Vec<CommonTableExpression>,
    /// The body.
    pub body: QueryBody,
    /// ORDER BY.
    pub order_by: Vec<SortItem>,
    /// OFFSET / LIMIT.
    pub slice: Option<Slice>,
    /// Nesting depth.
    pub depth: usize,
    /// Result columns, set by resolution.
    pub columns: Vec<OutputColumn>,
}

impl QueryExpression {
    /// Wraps a body with no ordering or slicing.
    #[must_use]
    pub const fn new(body: QueryBody, depth: usize) -> Self {
        Self {
            with: Vec::new(),
            body,
            order_by: Vec::new(),
            slice: None,
            depth,
            columns: Vec::new(),
        }
    }

    /// Number of result columns.
    #[must_use]
    pub fn degree(&self) -> usize {
        if !self.columns.is_empty() {
            return self.columns.len();
        }
        match &self.body {
            QueryBody::Select(spec) => spec.items.len(),
            QueryBody::Values(rows) => rows.first().map_or(0, Expression::degree),
            QueryBody::SetOperation(op) => op.left.degree(),
        }
    }

    /// Result column types, after resolution.
    #[must_use]
    pub fn column_types(&self) -> Vec<Option<DataType>> {
        self.columns.iter().map(|c| c.data_type.clone()).collect()
    }

    /// The SELECT block, when the body is one.
    #[must_use]
    pub fn as_select(&self) -> Option<&QuerySpecification> {
        match &self.body {
            QueryBody::Select(spec) => Some(spec),
            _ => None,
        }
    }

    /// Returns true if the query has a LIMIT or OFFSET.
    #[must_use]
    pub const fn has_slice(&self) -> bool {
        self.slice.is_some()
    }

    /// Every expression directly owned by this query and its nested blocks
    /// (WITH definitions, derived tables, set operation branches).
    ///
    /// Expressions inside subquery nodes are reached through the expressions
    /// themselves.
    #[must_use]
    pub fn expressions(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        self.push_expressions(&mut out);
        out
    }

    fn push_expressions<'a>(&'a self, out: &mut Vec<&'a Expression>) {
        for cte in &self.with {
            cte.query.push_expressions(out);
        }
        match &self.body {
            QueryBody::Select(spec) => {
                for range in &spec.from {
                    if let Some(query) = range.derived_query() {
                        query.push_expressions(out);
                    }
                }
            }
            QueryBody::Values(_) => {}
            QueryBody::SetOperation(op) => {
                op.left.push_expressions(out);
                op.right.push_expressions(out);
            }
        }
        out.extend(self.own_expressions());
    }

    /// Expressions of this block only: nested blocks are skipped.
    #[must_use]
    pub fn own_expressions(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        match &self.body {
            QueryBody::Select(spec) => {
                out.extend(spec.expressions());
                for range in &spec.from {
                    out.extend(range.condition.as_ref());
                }
                out.extend(spec.where_clause.as_ref());
                out.extend(&spec.group_by);
                out.extend(spec.having.as_ref());
            }
            QueryBody::Values(rows) => out.extend(rows),
            QueryBody::SetOperation(_) => {}
        }
        out.extend(self.order_by.iter().map(|item| &item.expression));
        if let Some(slice) = &self.slice {
            out.extend(slice.offset.as_ref());
            out.extend(slice.limit.as_ref());
        }
        out
    }

    pub(crate) fn collect_into<'a>(
        &'a self,
        kinds: KindSet,
        stop: KindSet,
        out: &mut Vec<&'a Expression>,
    ) {
        for expr in self.expressions() {
            expr.collect_into(kinds, stop, out);
        }
    }

    /// Collects nodes of the given kinds from the whole query, subqueries included.
    #[must_use]
    pub fn collect(&self, kinds: KindSet, stop: KindSet) -> Vec<&Expression> {
        let mut out = Vec::new();
        self.collect_into(kinds, stop, &mut out);
        out
    }

    /// All range variables of the query and its nested blocks, subqueries included.
    #[must_use]
    pub fn range_variables(&self) -> Vec<&RangeVariable> {
        let mut out = Vec::new();
        self.push_ranges(&mut out);
        out
    }

    fn push_ranges<'a>(&'a self, out: &mut Vec<&'a RangeVariable>) {
        for cte in &self.with {
            cte.query.push_ranges(out);
        }
        match &self.body {
            QueryBody::Select(spec) => {
                for range in &spec.from {
                    out.push(range);
                    if let Some(query) = range.derived_query() {
                        query.push_ranges(out);
                    }
                }
            }
            QueryBody::Values(_) => {}
            QueryBody::SetOperation(op) => {
                op.left.push_ranges(out);
                op.right.push_ranges(out);
            }
        }
        for expr in self.own_expressions() {
            push_subquery_ranges(expr, out);
        }
    }
}

fn push_subquery_ranges<'a>(expr: &'a Expression, out: &mut Vec<&'a RangeVariable>) {
    if let Some(sub) = expr.subquery() {
        sub.query.push_ranges(out);
    }
    for child in expr.children() {
        push_subquery_ranges(child, out);
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

impl Display for SelectItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expr) => {
                write!(f, "{expr}")?;
                if let Some(alias) = expr.alias() {
                    f.write_str(" AS ")?;
                    write_identifier(f, alias)?;
                }
                Ok(())
            }
            Self::Wildcard(None) => f.write_char('*'),
            Self::Wildcard(Some(qualifier)) => {
                write_identifier(f, qualifier)?;
                f.write_str(".*")
            }
        }
    }
}

impl Display for QuerySpecification {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.items)?;
        for (i, range) in self.from.iter().enumerate() {
            if i == 0 {
                write!(f, " FROM {range}")?;
            } else {
                write!(f, " {}", range.joined())?;
            }
        }
        if let Some(condition) = &self.where_clause {
            write!(f, " WHERE {condition}")?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        Ok(())
    }
}

impl Display for QueryExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.with.is_empty() {
            f.write_str("WITH ")?;
            if self.with.iter().any(|cte| cte.recursive) {
                f.write_str("RECURSIVE ")?;
            }
            for (i, cte) in self.with.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_identifier(f, &cte.name)?;
                if !cte.column_names.is_empty() {
                    f.write_str(" (")?;
                    for (j, name) in cte.column_names.iter().enumerate() {
                        if j > 0 {
                            f.write_str(", ")?;
                        }
                        write_identifier(f, name)?;
                    }
                    f.write_char(')')?;
                }
                write!(f, " AS ({})", cte.query)?;
            }
            f.write_char(' ')?;
        }
        match &self.body {
            QueryBody::Select(spec) => write!(f, "{spec}")?,
            QueryBody::Values(rows) => {
                f.write_str("VALUES ")?;
                write_list(f, rows)?;
            }
            QueryBody::SetOperation(op) => {
                write!(f, "({}) {}", op.left, op.operator.as_str())?;
                if op.all {
                    f.write_str(" ALL")?;
                }
                if let Some(columns) = &op.corresponding {
                    f.write_str(" CORRESPONDING")?;
                    if !columns.is_empty() {
                        f.write_str(" BY (")?;
                        for (i, name) in columns.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write_identifier(f, name)?;
                        }
                        f.write_char(')')?;
                    }
                }
                write!(f, " ({})", op.right)?;
            }
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        if let Some(slice) = &self.slice {
            if let Some(limit) = &slice.limit {
                write!(f, " LIMIT {limit}")?;
            }
            if let Some(offset) = &slice.offset {
                write!(f, " OFFSET {offset}")?;
            }
        }
        Ok(())
    }
}
