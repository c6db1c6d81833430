//! Whole-statement properties of parsing and resolution.

mod common;
use common::*;

use oxide_sql_compiler::expression::{ObjectName, OpType};
use oxide_sql_compiler::resolver::Resolver;
use oxide_sql_compiler::types::DataType;
use oxide_sql_compiler::{compile_condition, CompileError, CompileOptions, ErrorCode};

fn condition(sql: &str) -> oxide_sql_compiler::Expression {
    let catalog = catalog();
    compile_condition(sql, &ObjectName::new("T"), &catalog, &CompileOptions::default())
        .unwrap_or_else(|e| panic!("Failed to compile: {sql}\nError: {e}"))
        .statement
}

// ===================================================================
// Idempotence of resolution
// ===================================================================

#[test]
fn resolving_twice_changes_nothing() {
    for sql in [
        "SELECT A + 1 AS X, B FROM T WHERE C > ? ORDER BY X",
        "SELECT DEPT, COUNT(*) FROM EMP GROUP BY DEPT HAVING COUNT(*) > 1",
        "SELECT E.NAME, D.TITLE FROM EMP E JOIN DEPT D ON E.DEPT = D.ID",
        "SELECT A FROM T WHERE EXISTS (SELECT 1 FROM EMP WHERE EMP.ID = T.A)",
    ] {
        let compiled = compile(sql);
        let mut again = compiled.statement.clone();
        let mut resolver = Resolver::new();
        resolver.resolve_query(&mut again, None).unwrap();
        resolver.finish().unwrap();
        assert_eq!(again, compiled.statement, "not idempotent: {sql}");
    }
}

// ===================================================================
// Round-trip printing
// ===================================================================

#[test]
fn round_trip_arithmetic() {
    round_trip("1 + 2 * 3 - 4 / 2");
    round_trip("-5 + (2 - 3) * 7");
    round_trip("'a' || 'b'");
}

#[test]
fn round_trip_comparisons_and_logic() {
    round_trip("1 < 2 AND 3 >= 4 OR NOT 5 <> 6");
    round_trip("(1 = 1 OR 2 = 2) AND TRUE");
    round_trip("NOT (A <= 10) AND B = 'x'");
}

// ===================================================================
// Desugaring equivalence
// ===================================================================

#[test]
fn between_resolves_like_two_comparisons() {
    assert_eq!(
        condition("A BETWEEN 1 AND 5"),
        condition("A >= 1 AND A <= 5")
    );
}

#[test]
fn coalesce_is_case_on_null() {
    assert_eq!(
        parse_value("COALESCE(A, B)"),
        parse_value("CASE WHEN A IS NULL THEN B ELSE A END")
    );
    assert_eq!(
        parse_value("COALESCE(NULL, NULL)"),
        parse_value("CASE WHEN NULL IS NULL THEN NULL ELSE NULL END")
    );
}

// ===================================================================
// Backtracking
// ===================================================================

#[test]
fn parenthesized_select_is_a_scalar_subquery() {
    let expr = parse_value("(SELECT 1)");
    assert_eq!(expr.op_type(), OpType::ScalarSubquery);

    let compiled = compile("SELECT (SELECT 1) FROM T");
    assert_eq!(column_types(&compiled), vec![Some(DataType::Integer)]);

    let compiled = compile("SELECT (SELECT MAX(A) FROM T) FROM EMP");
    assert_eq!(column_types(&compiled), vec![Some(DataType::Integer)]);
}

#[test]
fn failed_alternatives_do_not_leak() {
    let compiled = compile("SELECT A FROM T WHERE (A, C) = (SELECT ID, DEPT FROM EMP)");
    assert_eq!(column_names(&compiled), vec!["A"]);
}

// ===================================================================
// Grouping validation
// ===================================================================

#[test]
fn grouped_and_aggregated_columns_resolve() {
    let compiled = compile("SELECT A, SUM(C) FROM T GROUP BY A");
    assert_eq!(
        column_types(&compiled),
        vec![Some(DataType::Integer), Some(DataType::BigInt)]
    );
}

#[test]
fn ungrouped_column_is_rejected() {
    let err = compile_err("SELECT A, B, SUM(C) FROM T GROUP BY A");
    assert!(matches!(err, CompileError::Grouping { .. }));
    assert_eq!(err.code(), Some(ErrorCode::NotGrouped));
}

// ===================================================================
// Correlation detection
// ===================================================================

#[test]
fn outer_reference_marks_subquery_correlated() {
    let compiled = compile("SELECT (SELECT OUTER_T.X FROM INNER_T) FROM OUTER_T");
    let spec = compiled.statement.as_select().unwrap();
    let item = spec.expressions().next().unwrap();
    assert!(item.subquery().unwrap().correlated);

    let compiled = compile("SELECT (SELECT 1 FROM INNER_T) FROM OUTER_T");
    let spec = compiled.statement.as_select().unwrap();
    let item = spec.expressions().next().unwrap();
    assert!(!item.subquery().unwrap().correlated);
}

// ===================================================================
// Error specificity under backtracking
// ===================================================================

#[test]
fn deepest_failure_is_reported() {
    let sql = "SELECT A FROM T WHERE (A + (C * )) > 1";
    let err = parse_err(sql);
    assert_eq!(err.span.start, sql.find("))").unwrap());
}

#[test]
fn deep_failure_inside_subquery() {
    let sql = "SELECT A FROM T WHERE A IN (SELECT ID FROM EMP WHERE ID = )";
    let err = parse_err(sql);
    assert_eq!(err.span.start, sql.rfind(')').unwrap());
}

// ===================================================================
// Recursive WITH
// ===================================================================

#[test]
fn recursive_with_takes_types_from_seed() {
    let compiled =
        compile("WITH RECURSIVE r(n) AS (SELECT 1 UNION ALL SELECT n+1 FROM r WHERE n<5) SELECT * FROM r");
    assert_eq!(column_names(&compiled), vec!["N"]);
    assert_eq!(column_types(&compiled), vec![Some(DataType::Integer)]);
    assert!(compiled.statement.with[0].recursive);
}

#[test]
fn recursive_branch_is_type_checked() {
    let err = compile_err(
        "WITH RECURSIVE R(N) AS (SELECT 1 UNION ALL SELECT B FROM T, R WHERE N < 5) \
         SELECT * FROM R",
    );
    assert_eq!(err.code(), Some(ErrorCode::IncompatibleCombination));
}
