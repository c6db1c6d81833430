//! Semantic resolution.
//!
//! The resolver walks a parsed [`QueryExpression`] block by block. For each
//! block it fills in the columns of derived tables, expands `*`, binds every
//! column reference through a [`RangeGroup`] chain, types every node bottom-up
//! and validates aggregate placement.
//!
//! Names that cannot be bound and type errors are collected rather than
//! returned at once; [`Resolver::finish`] reports them together. Structural
//! errors (ambiguity, degree mismatches of set operations, grouping) end
//! resolution immediately. Resolving an already resolved tree changes nothing.

mod grouping;
mod types;

use tracing::{debug, trace};

use crate::error::{CompileError, ErrorCode, Result};
use crate::expression::{ColumnBinding, ColumnName, ComparisonOp, ExprKind, Expression, KindSet, Literal, SortItem};
use crate::query::{OutputColumn, QueryBody, QueryExpression, QuerySpecification, SelectItem, SetOperation};
use crate::range::{JoinKind, RangeColumn, RangeGroup, RangeSource, RangeVariable};
use crate::types::DataType;

use self::grouping::{check_grouping, check_nested_aggregates, check_no_aggregate, check_sort_key};
use self::types::{adopt, adopt_field, field_type};

fn scope<'a>(
    ranges: &'a [RangeVariable],
    depth: usize,
    outer: Option<&'a RangeGroup<'a>>,
) -> RangeGroup<'a> {
    match outer {
        Some(outer) => RangeGroup::with_outer(ranges, depth, outer),
        None => RangeGroup::new(ranges, depth),
    }
}

/// A column expression already bound to `range`.
fn bound_column(range: &RangeVariable, ordinal: usize) -> Expression {
    let column = &range.columns[ordinal];
    let name = match range.name() {
        Some(qualifier) => ColumnName::qualified(qualifier, column.name.clone()),
        None => ColumnName::new(column.name.clone()),
    };
    let mut expr = Expression::column(name);
    if let ExprKind::Column(reference) = expr.kind_mut() {
        reference.binding = Some(ColumnBinding {
            range: range.index,
            column: ordinal,
            depth: range.depth,
            table: range.table().cloned(),
        });
    }
    expr.set_data_type(column.data_type.clone());
    expr
}

fn simple_column(index: usize, data_type: Option<DataType>) -> Expression {
    let mut expr = Expression::new(ExprKind::SimpleColumn(index));
    expr.set_data_type(data_type);
    expr
}

fn invalid_order_by(message: impl Into<String>) -> CompileError {
    CompileError::semantic(ErrorCode::InvalidOrderBy, message)
}

/// An ORDER BY ordinal, when the key is an integer literal.
fn sort_ordinal(key: &Expression) -> Option<i64> {
    match key.as_literal() {
        Some(Literal::Integer(n)) => Some(*n),
        _ => None,
    }
}

fn ordinal_index(ordinal: i64, columns: &[OutputColumn]) -> Result<usize> {
    usize::try_from(ordinal)
        .ok()
        .filter(|n| (1..=columns.len()).contains(n))
        .map(|n| n - 1)
        .ok_or_else(|| invalid_order_by(format!("ORDER BY position {ordinal} is not in the select list")))
}

/// Maps ORDER BY keys of a set operation or VALUES onto the output columns.
fn resolve_output_order(order_by: &mut [SortItem], columns: &[OutputColumn]) -> Result<()> {
    for item in order_by {
        let index = match item.expression.kind() {
            ExprKind::SimpleColumn(_) => continue,
            ExprKind::Value(Literal::Integer(n)) => ordinal_index(*n, columns)?,
            ExprKind::Column(column) if column.name.table.is_none() => columns
                .iter()
                .position(|c| c.name == column.name.column)
                .ok_or_else(|| invalid_order_by(format!("ORDER BY column {} is not in the result", column.name)))?,
            _ => {
                return Err(invalid_order_by(format!(
                    "ORDER BY of a set operation must name a result column: {}",
                    item.expression
                )))
            }
        };
        item.expression = simple_column(index, columns[index].data_type.clone());
    }
    Ok(())
}

fn corresponding_columns(
    names: &[String],
    left: &[OutputColumn],
    right: &[OutputColumn],
) -> Result<(Vec<usize>, Vec<usize>)> {
    let names: Vec<&str> = if names.is_empty() {
        left.iter()
            .map(|c| c.name.as_str())
            .filter(|name| right.iter().any(|r| r.name == *name))
            .collect()
    } else {
        names.iter().map(String::as_str).collect()
    };
    if names.is_empty() {
        return Err(CompileError::semantic(
            ErrorCode::InvalidCorresponding,
            "no common columns for CORRESPONDING",
        ));
    }
    let mut left_columns = Vec::with_capacity(names.len());
    let mut right_columns = Vec::with_capacity(names.len());
    for name in names {
        let position = |columns: &[OutputColumn]| columns.iter().position(|c| c.name == name);
        match (position(left), position(right)) {
            (Some(l), Some(r)) => {
                left_columns.push(l);
                right_columns.push(r);
            }
            _ => {
                return Err(CompileError::semantic(
                    ErrorCode::InvalidCorresponding,
                    format!("column {name} is not on both sides of CORRESPONDING"),
                ))
            }
        }
    }
    Ok((left_columns, right_columns))
}

/// Lets an untyped select item at `position` take the type of a set
/// operation column.
fn adopt_output(query: &mut QueryExpression, position: usize, data_type: Option<&DataType>) {
    match &mut query.body {
        QueryBody::Select(spec) => {
            if let Some(SelectItem::Expression(item)) = spec.items.get_mut(position) {
                adopt(item, data_type);
            }
        }
        QueryBody::Values(rows) => {
            for row in rows.iter_mut() {
                adopt_field(row, position, data_type);
            }
        }
        QueryBody::SetOperation(op) => {
            if let Some(&l) = op.left_columns.get(position) {
                adopt_output(&mut op.left, l, data_type);
            }
            if let Some(&r) = op.right_columns.get(position) {
                adopt_output(&mut op.right, r, data_type);
            }
        }
    }
    if let Some(column) = query.columns.get_mut(position) {
        if column.data_type.is_none() {
            column.data_type = data_type.cloned();
        }
    }
}

/// Binds names and types in a parsed statement.
#[derive(Debug, Default)]
pub struct Resolver {
    unresolved: Vec<String>,
    errors: Vec<CompileError>,
}

impl Resolver {
    /// Creates a resolver with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a name that could not be bound. Each name is reported once.
    pub fn note_unresolved(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.unresolved.contains(&name) {
            self.unresolved.push(name);
        }
    }

    /// Returns true once any name failed to bind.
    #[must_use]
    pub fn has_unresolved(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Reports what was collected.
    ///
    /// # Errors
    ///
    /// Unbound names come first, as one 42501 error; otherwise the type
    /// errors, collapsed into one.
    pub fn finish(self) -> Result<()> {
        debug!(
            unresolved = self.unresolved.len(),
            errors = self.errors.len(),
            "resolution finished"
        );
        if !self.unresolved.is_empty() {
            return Err(CompileError::UnresolvedNames(self.unresolved));
        }
        CompileError::from_accumulated(self.errors).map_or(Ok(()), Err)
    }

    /// Resolves a query in the scope `outer` (for subqueries and derived
    /// tables, the enclosing block).
    ///
    /// # Errors
    ///
    /// Returns structural and grouping errors immediately.
    pub fn resolve_query(&mut self, query: &mut QueryExpression, outer: Option<&RangeGroup<'_>>) -> Result<()> {
        let QueryExpression {
            with,
            body,
            order_by,
            depth,
            columns,
            ..
        } = query;

        for cte in with.iter_mut() {
            self.resolve_query(&mut cte.query, None)?;
        }

        *columns = match body {
            QueryBody::Select(spec) => self.resolve_specification(spec, order_by, outer)?,
            QueryBody::Values(rows) => {
                let output = self.resolve_values(rows, *depth, outer)?;
                resolve_output_order(order_by, &output)?;
                output
            }
            QueryBody::SetOperation(op) => {
                let output = self.resolve_set_operation(op, outer)?;
                resolve_output_order(order_by, &output)?;
                output
            }
        };
        trace!(depth = *depth, degree = columns.len(), "resolved query block");
        Ok(())
    }

    /// Binds and types a standalone expression against `scope`.
    ///
    /// # Errors
    ///
    /// Returns structural errors immediately.
    pub fn resolve_expression(&mut self, expr: &mut Expression, scope: &RangeGroup<'_>) -> Result<()> {
        self.resolve_node(expr, scope)?;
        check_nested_aggregates(expr)
    }

    /// Binds and types a search condition, which must be BOOLEAN and free of
    /// aggregates.
    ///
    /// # Errors
    ///
    /// Returns 42572 for aggregates; BOOLEAN violations are collected.
    pub fn resolve_condition(&mut self, expr: &mut Expression, scope: &RangeGroup<'_>, clause: &str) -> Result<()> {
        self.resolve_node(expr, scope)?;
        check_no_aggregate(expr, clause)?;
        self.require_boolean(expr, clause);
        Ok(())
    }

    fn resolve_node(&mut self, expr: &mut Expression, scope: &RangeGroup<'_>) -> Result<()> {
        for child in expr.children_mut() {
            self.resolve_node(child, scope)?;
        }
        if let Some(subquery) = expr.subquery_mut() {
            self.resolve_query(&mut subquery.query, Some(scope))?;
            let depth = subquery.depth;
            subquery.correlated = subquery
                .query
                .collect(KindSet::COLUMNS, KindSet::EMPTY)
                .into_iter()
                .filter_map(|e| e.as_column()?.binding.as_ref())
                .any(|binding| binding.depth < depth);
        }

        let lookup = match expr.kind() {
            ExprKind::Column(column) if column.binding.is_none() => {
                Some((scope.resolve(&column.name)?, column.name.to_string()))
            }
            _ => None,
        };
        match lookup {
            Some((Some(found), _)) => {
                if let ExprKind::Column(column) = expr.kind_mut() {
                    column.binding = Some(found.binding);
                }
                expr.set_data_type(found.data_type);
            }
            Some((None, name)) => {
                trace!(name = %name, "column not found in scope");
                self.note_unresolved(name);
            }
            None => self.infer_type(expr),
        }
        Ok(())
    }

    fn resolve_ranges(&mut self, from: &mut [RangeVariable], depth: usize, outer: Option<&RangeGroup<'_>>) -> Result<()> {
        for i in 0..from.len() {
            if let RangeSource::Derived(query) = &mut from[i].source {
                self.resolve_query(query, outer)?;
                let columns = query
                    .columns
                    .iter()
                    .map(|c| RangeColumn::new(c.name.clone(), c.data_type.clone()))
                    .collect();
                from[i].columns = columns;
                from[i].apply_column_aliases()?;
            }

            if from[i].natural || !from[i].using.is_empty() {
                self.join_common_columns(from, i);
            }

            if let Some(mut condition) = from[i].condition.take() {
                let group = scope(&from[..=i], depth, outer);
                let result = self.resolve_condition(&mut condition, &group, "a join condition");
                from[i].condition = Some(condition);
                result?;
            }
        }
        Ok(())
    }

    /// Fills in the USING list of a NATURAL join and synthesizes the
    /// equality condition of NATURAL and USING joins.
    fn join_common_columns(&mut self, from: &mut [RangeVariable], i: usize) {
        let (left, rest) = from.split_at_mut(i);
        let Some(right) = rest.first_mut() else {
            return;
        };

        if right.natural {
            let mut names: Vec<String> = Vec::new();
            for range in left.iter() {
                for column in &range.columns {
                    if right.find_column(&column.name, true).is_some()
                        && range.find_column(&column.name, false).is_some()
                        && !names.contains(&column.name)
                    {
                        names.push(column.name.clone());
                    }
                }
            }
            if names.is_empty() {
                debug!(range = right.index, "NATURAL join without common columns is a cross join");
                right.natural = false;
                right.join = JoinKind::Cross;
                right.using.clear();
                right.condition = None;
                return;
            }
            right.using = names;
        }

        let mut terms = Vec::with_capacity(right.using.len());
        for name in right.using.clone() {
            let left_side = left
                .iter()
                .find_map(|range| range.find_column(&name, false).map(|ordinal| bound_column(range, ordinal)));
            let right_side = right.find_column(&name, true).map(|ordinal| bound_column(right, ordinal));
            match (left_side, right_side) {
                (Some(l), Some(r)) => terms.push(Expression::compare(ComparisonOp::Equal, l, r)),
                _ => self.note_unresolved(name),
            }
        }
        right.condition = Expression::conjunction(terms);
    }

    /// Replaces `*` and `t.*` with the columns they stand for.
    fn expand_wildcards(&mut self, items: &mut Vec<SelectItem>, from: &[RangeVariable]) {
        if !items.iter().any(|item| matches!(item, SelectItem::Wildcard(_))) {
            return;
        }
        let mut expanded = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            match item {
                SelectItem::Wildcard(None) => {
                    for range in from {
                        for (ordinal, column) in range.columns.iter().enumerate() {
                            if !range.using.contains(&column.name) {
                                expanded.push(SelectItem::Expression(bound_column(range, ordinal)));
                            }
                        }
                    }
                }
                SelectItem::Wildcard(Some(qualifier)) => {
                    match from.iter().find(|range| range.matches_qualifier(None, &qualifier)) {
                        Some(range) => expanded.extend(
                            (0..range.columns.len()).map(|ordinal| SelectItem::Expression(bound_column(range, ordinal))),
                        ),
                        None => self.note_unresolved(qualifier),
                    }
                }
                item @ SelectItem::Expression(_) => expanded.push(item),
            }
        }
        *items = expanded;
    }

    fn resolve_specification(
        &mut self,
        spec: &mut QuerySpecification,
        order_by: &mut [SortItem],
        outer: Option<&RangeGroup<'_>>,
    ) -> Result<Vec<OutputColumn>> {
        self.resolve_ranges(&mut spec.from, spec.depth, outer)?;
        self.expand_wildcards(&mut spec.items, &spec.from);

        {
            let QuerySpecification {
                items,
                from,
                where_clause,
                group_by,
                having,
                depth,
                ..
            } = &mut *spec;
            let group = scope(from, *depth, outer);

            for item in items.iter_mut() {
                if let SelectItem::Expression(expr) = item {
                    self.resolve_expression(expr, &group)?;
                }
            }
            if let Some(condition) = where_clause {
                self.resolve_condition(condition, &group, "WHERE")?;
            }
            for key in group_by.iter_mut() {
                self.resolve_expression(key, &group)?;
                check_no_aggregate(key, "GROUP BY")?;
            }
            if let Some(condition) = having {
                self.resolve_node(condition, &group)?;
                check_nested_aggregates(condition)?;
                self.require_boolean(condition, "HAVING");
            }
        }

        let validate = !self.has_unresolved();
        if validate {
            check_grouping(spec)?;
        }

        let output: Vec<OutputColumn> = spec
            .expressions()
            .enumerate()
            .map(|(i, expr)| OutputColumn {
                name: expr
                    .alias()
                    .map(str::to_owned)
                    .or_else(|| expr.as_column().map(|c| c.name.column.clone()))
                    .unwrap_or_else(|| format!("C{}", i + 1)),
                data_type: expr.data_type().cloned(),
            })
            .collect();

        self.resolve_select_order(order_by, spec, &output, outer)?;
        trace!(
            depth = spec.depth,
            ranges = spec.from.len(),
            grouped = spec.is_grouped(),
            "resolved SELECT"
        );
        Ok(output)
    }

    fn resolve_select_order(
        &mut self,
        order_by: &mut [SortItem],
        spec: &QuerySpecification,
        output: &[OutputColumn],
        outer: Option<&RangeGroup<'_>>,
    ) -> Result<()> {
        if order_by.is_empty() {
            return Ok(());
        }
        let mut targets = Vec::new();
        let mut replacements = Vec::new();
        for (i, expr) in spec.expressions().enumerate() {
            if let Some(alias) = expr.alias() {
                targets.push(Expression::column(ColumnName::new(alias)));
                replacements.push(simple_column(i, expr.data_type().cloned()));
            }
        }

        let group = scope(&spec.from, spec.depth, outer);
        for item in order_by.iter_mut() {
            if let Some(ordinal) = sort_ordinal(&item.expression) {
                let index = ordinal_index(ordinal, output)?;
                item.expression = simple_column(index, output[index].data_type.clone());
                continue;
            }
            item.expression.replace(&targets, &replacements);
            self.resolve_expression(&mut item.expression, &group)?;
            if item.expression.data_type().is_some_and(DataType::is_boolean) {
                return Err(invalid_order_by(format!(
                    "invalid ORDER BY expression of type BOOLEAN: {}",
                    item.expression
                )));
            }
            if !self.has_unresolved() {
                check_sort_key(&item.expression, spec)?;
            }
        }
        Ok(())
    }

    fn resolve_values(
        &mut self,
        rows: &mut [Expression],
        depth: usize,
        outer: Option<&RangeGroup<'_>>,
    ) -> Result<Vec<OutputColumn>> {
        let group = scope(&[], depth, outer);
        for row in rows.iter_mut() {
            self.resolve_expression(row, &group)?;
        }
        let degree = rows.first().map_or(0, Expression::degree);
        if rows.iter().any(|row| row.degree() != degree) {
            return Err(CompileError::semantic(
                ErrorCode::DegreeMismatch,
                "row column count mismatch in VALUES",
            ));
        }

        let mut output = Vec::with_capacity(degree);
        for index in 0..degree {
            let types: Vec<_> = rows.iter().map(|row| field_type(row, index)).collect();
            let data_type = self.aggregate_all(types);
            for row in rows.iter_mut() {
                adopt_field(row, index, data_type.as_ref());
            }
            output.push(OutputColumn {
                name: format!("C{}", index + 1),
                data_type,
            });
        }
        Ok(output)
    }

    fn resolve_set_operation(
        &mut self,
        op: &mut SetOperation,
        outer: Option<&RangeGroup<'_>>,
    ) -> Result<Vec<OutputColumn>> {
        self.resolve_query(&mut op.left, outer)?;
        self.resolve_query(&mut op.right, outer)?;

        let (left_columns, right_columns) = match &op.corresponding {
            Some(names) => corresponding_columns(names, &op.left.columns, &op.right.columns)?,
            None => {
                let (l, r) = (op.left.columns.len(), op.right.columns.len());
                if l != r {
                    return Err(CompileError::semantic(
                        ErrorCode::DegreeMismatch,
                        format!(
                            "each query of {} must have the same number of columns: {l} and {r}",
                            op.operator.as_str()
                        ),
                    ));
                }
                ((0..l).collect(), (0..r).collect())
            }
        };

        let mut output = Vec::with_capacity(left_columns.len());
        for (&l, &r) in left_columns.iter().zip(&right_columns) {
            let data_type = self.aggregate_all([
                op.left.columns[l].data_type.clone(),
                op.right.columns[r].data_type.clone(),
            ]);
            adopt_output(&mut op.left, l, data_type.as_ref());
            adopt_output(&mut op.right, r, data_type.as_ref());
            output.push(OutputColumn {
                name: op.left.columns[l].name.clone(),
                data_type,
            });
        }
        op.left_columns = left_columns;
        op.right_columns = right_columns;
        Ok(output)
    }
}
