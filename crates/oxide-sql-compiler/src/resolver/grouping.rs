//! Aggregate placement and GROUP BY validation.

use crate::error::{CompileError, ErrorCode, Result};
use crate::expression::{Expression, KindSet, OpType};
use crate::query::QuerySpecification;

/// Nodes accepted wholesale in a grouped select list; their insides are
/// checked separately.
const GROUPING_EXEMPT: KindSet =
    KindSet::SUBQUERIES_AND_AGGREGATES.union(KindSet::of(&[OpType::Window]));

/// Rejects aggregates in clauses evaluated per row (WHERE, ON, GROUP BY).
pub(super) fn check_no_aggregate(expr: &Expression, clause: &str) -> Result<()> {
    if expr.is_aggregate() {
        return Err(CompileError::grouping(
            ErrorCode::InvalidAggregate,
            format!("invalid use of aggregate function in {clause}: {expr}"),
        ));
    }
    Ok(())
}

/// Rejects aggregates whose arguments contain aggregates of the same block.
pub(super) fn check_nested_aggregates(expr: &Expression) -> Result<()> {
    for aggregate in expr.collect(KindSet::AGGREGATES, KindSet::SUBQUERIES) {
        if aggregate.children().into_iter().any(Expression::is_aggregate) {
            return Err(CompileError::grouping(
                ErrorCode::InvalidAggregate,
                format!("aggregate function arguments may not contain aggregates: {aggregate}"),
            ));
        }
    }
    Ok(())
}

/// Returns true if `expr` can be evaluated once per group of `allowed`.
///
/// Columns of enclosing blocks are constant per group. Subqueries are
/// accepted when every column they borrow from this block is grouped.
pub(super) fn is_grouped_expression(expr: &Expression, allowed: &[Expression], depth: usize) -> bool {
    if !expr.is_composed_of_at(allowed, GROUPING_EXEMPT, depth) {
        return false;
    }
    expr.collect(KindSet::SUBQUERIES, KindSet::AGGREGATES)
        .into_iter()
        .filter_map(Expression::subquery)
        .all(|subquery| {
            subquery
                .query
                .collect(KindSet::COLUMNS, KindSet::AGGREGATES)
                .into_iter()
                .filter(|column| {
                    column
                        .as_column()
                        .and_then(|c| c.binding.as_ref())
                        .is_some_and(|binding| binding.depth == depth)
                })
                .all(|column| allowed.contains(column))
        })
}

/// Checks the select list and HAVING of a grouped block.
pub(super) fn check_grouping(spec: &QuerySpecification) -> Result<()> {
    if !spec.is_grouped() {
        return Ok(());
    }
    for expr in spec.expressions() {
        if !is_grouped_expression(expr, &spec.group_by, spec.depth) {
            return Err(CompileError::grouping(
                ErrorCode::NotGrouped,
                format!("expression not in aggregate or GROUP BY columns: {expr}"),
            ));
        }
    }
    if let Some(having) = &spec.having {
        if !is_grouped_expression(having, &spec.group_by, spec.depth) {
            return Err(CompileError::grouping(
                ErrorCode::InvalidHaving,
                format!("HAVING expression not in aggregate or GROUP BY columns: {having}"),
            ));
        }
    }
    Ok(())
}

/// Checks an ORDER BY key of a grouped or DISTINCT block.
pub(super) fn check_sort_key(key: &Expression, spec: &QuerySpecification) -> Result<()> {
    if key.op_type() == OpType::SimpleColumn {
        return Ok(());
    }
    let selected: Vec<Expression> = spec.expressions().cloned().collect();
    if spec.distinct && !key.is_composed_of_at(&selected, KindSet::EMPTY, spec.depth) {
        return Err(CompileError::semantic(
            ErrorCode::InvalidOrderBy,
            format!("invalid ORDER BY expression, not in the SELECT DISTINCT list: {key}"),
        ));
    }
    if spec.is_grouped() {
        let mut allowed = spec.group_by.clone();
        allowed.extend(selected);
        if !is_grouped_expression(key, &allowed, spec.depth) {
            return Err(CompileError::grouping(
                ErrorCode::NotGrouped,
                format!("ORDER BY expression not in aggregate or GROUP BY columns: {key}"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{AggregateCall, AggregateFunction, ColumnBinding, ColumnName, ExprKind};
    use crate::query::SelectItem;
    use crate::types::ArithmeticOp;

    fn bound(name: &str, column: usize, depth: usize) -> Expression {
        let mut expr = Expression::column(ColumnName::qualified("T", name));
        if let ExprKind::Column(c) = expr.kind_mut() {
            c.binding = Some(ColumnBinding {
                range: 0,
                column,
                depth,
                table: None,
            });
        }
        expr
    }

    fn sum(argument: Expression) -> Expression {
        Expression::new(ExprKind::Aggregate(Box::new(AggregateCall {
            function: AggregateFunction::Sum,
            distinct: false,
            argument: Box::new(argument),
            order_by: Vec::new(),
            separator: None,
        })))
    }

    fn grouped(items: Vec<Expression>, group_by: Vec<Expression>) -> QuerySpecification {
        let mut spec = QuerySpecification::new(1);
        spec.items = items.into_iter().map(SelectItem::Expression).collect();
        spec.group_by = group_by;
        spec
    }

    #[test]
    fn test_where_rejects_aggregates() {
        let err = check_no_aggregate(&sum(bound("A", 0, 1)), "WHERE").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidAggregate));
        assert!(check_no_aggregate(&bound("A", 0, 1), "WHERE").is_ok());
    }

    #[test]
    fn test_nested_aggregates() {
        let nested = sum(sum(bound("A", 0, 1)));
        assert!(check_nested_aggregates(&nested).is_err());
        assert!(check_nested_aggregates(&sum(bound("A", 0, 1))).is_ok());
    }

    #[test]
    fn test_grouped_select_list() {
        let spec = grouped(
            vec![
                bound("A", 0, 1),
                Expression::arithmetic(ArithmeticOp::Add, sum(bound("B", 1, 1)), Expression::integer(1)),
            ],
            vec![bound("A", 0, 1)],
        );
        assert!(check_grouping(&spec).is_ok());

        let spec = grouped(vec![bound("B", 1, 1)], vec![bound("A", 0, 1)]);
        let err = check_grouping(&spec).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotGrouped));
    }

    #[test]
    fn test_outer_columns_are_constant_per_group() {
        let spec = grouped(vec![bound("X", 0, 0), sum(bound("B", 1, 1))], vec![]);
        assert!(check_grouping(&spec).is_ok());
    }

    #[test]
    fn test_having_must_be_grouped() {
        let mut spec = grouped(vec![sum(bound("B", 1, 1))], vec![bound("A", 0, 1)]);
        spec.having = Some(Expression::compare(
            crate::expression::ComparisonOp::Greater,
            bound("B", 1, 1),
            Expression::integer(0),
        ));
        let err = check_grouping(&spec).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidHaving));
    }
}
