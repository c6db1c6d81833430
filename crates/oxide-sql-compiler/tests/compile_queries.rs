//! End-to-end compilation of queries against the sample catalog.

mod common;
use common::*;

use oxide_sql_compiler::expression::OpType;
use oxide_sql_compiler::types::DataType;
use oxide_sql_compiler::{CompileError, ErrorCode};

// ===================================================================
// FROM and joins
// ===================================================================

#[test]
fn join_with_aliases() {
    let compiled = compile("SELECT E.NAME, D.TITLE FROM EMP E JOIN DEPT D ON E.DEPT = D.ID");
    assert_eq!(
        column_types(&compiled),
        vec![Some(DataType::Varchar(40)), Some(DataType::Varchar(20))]
    );
}

#[test]
fn using_columns_appear_once() {
    let compiled = compile("SELECT * FROM EMP JOIN DEPT USING (ID)");
    assert_eq!(
        column_names(&compiled),
        vec!["ID", "NAME", "DEPT", "SALARY", "TITLE"]
    );
}

#[test]
fn join_condition_must_be_boolean() {
    let err = compile_err("SELECT * FROM EMP JOIN DEPT ON EMP.ID");
    assert_eq!(err.code(), Some(ErrorCode::BooleanRequired));
}

#[test]
fn derived_table_column_aliases() {
    let compiled = compile("SELECT D.X FROM (SELECT ID, NAME FROM EMP) AS D (X, Y)");
    assert_eq!(column_names(&compiled), vec!["X"]);
    assert_eq!(column_types(&compiled), vec![Some(DataType::Integer)]);
}

#[test]
fn table_query_is_select_star() {
    let compiled = compile("TABLE DEPT");
    assert_eq!(column_names(&compiled), vec!["ID", "TITLE"]);
}

#[test]
fn unknown_table() {
    let err = compile_err("SELECT * FROM NOPE");
    assert_eq!(err, CompileError::UnresolvedNames(vec!["NOPE".into()]));
}

#[test]
fn unknown_tables_are_reported_together() {
    let err = compile_err("SELECT X FROM NOPE1, NOPE2");
    assert_eq!(
        err,
        CompileError::UnresolvedNames(vec!["NOPE1".into(), "NOPE2".into(), "X".into()])
    );
}

// ===================================================================
// Names and types
// ===================================================================

#[test]
fn unresolved_columns_are_reported_together() {
    let err = compile_err("SELECT X, A FROM T WHERE Y = 1");
    assert_eq!(
        err,
        CompileError::UnresolvedNames(vec!["X".into(), "Y".into()])
    );
}

#[test]
fn output_names() {
    let compiled = compile("SELECT ID AS KEY_ID, NAME, SALARY * 2 FROM EMP");
    assert_eq!(column_names(&compiled), vec!["KEY_ID", "NAME", "C3"]);
    assert_eq!(
        column_types(&compiled),
        vec![
            Some(DataType::Integer),
            Some(DataType::Varchar(40)),
            Some(DataType::Double)
        ]
    );
}

#[test]
fn aggregate_result_types() {
    let compiled = compile("SELECT COUNT(*), SUM(DEPT), AVG(SALARY), MIN(NAME) FROM EMP");
    assert_eq!(
        column_types(&compiled),
        vec![
            Some(DataType::BigInt),
            Some(DataType::BigInt),
            Some(DataType::Double),
            Some(DataType::Varchar(40))
        ]
    );
}

#[test]
fn aggregate_in_where_is_rejected() {
    let err = compile_err("SELECT ID FROM EMP WHERE COUNT(*) > 1");
    assert_eq!(err.code(), Some(ErrorCode::InvalidAggregate));
}

// ===================================================================
// Parameters
// ===================================================================

#[test]
fn parameters_adopt_operand_types() {
    let compiled = compile("SELECT NAME FROM EMP WHERE SALARY BETWEEN ? AND ? AND ID IN (?, 2)");
    assert_eq!(
        compiled.parameters,
        vec![DataType::Double, DataType::Double, DataType::Integer]
    );
}

#[test]
fn limit_parameter_is_integer() {
    let compiled = compile("SELECT ID FROM EMP ORDER BY ID LIMIT ?");
    assert_eq!(compiled.parameters, vec![DataType::Integer]);
}

#[test]
fn parameter_without_context_is_rejected() {
    let err = compile_err("SELECT ? FROM EMP");
    assert_eq!(err.code(), Some(ErrorCode::UndeterminedParameter));
}

// ===================================================================
// Set operations and ordering
// ===================================================================

#[test]
fn union_widens_types() {
    let compiled = compile("SELECT ID FROM EMP UNION SELECT SALARY FROM EMP");
    assert_eq!(column_names(&compiled), vec!["ID"]);
    assert_eq!(column_types(&compiled), vec![Some(DataType::Double)]);
}

#[test]
fn union_degree_mismatch() {
    let err = compile_err("SELECT ID, NAME FROM EMP UNION SELECT ID FROM DEPT");
    assert_eq!(err.code(), Some(ErrorCode::DegreeMismatch));
}

#[test]
fn set_operation_orders_by_output_column() {
    let compiled = compile("SELECT ID FROM EMP UNION SELECT ID FROM DEPT ORDER BY ID DESC");
    let key = &compiled.statement.order_by[0];
    assert!(key.is_descending());
    assert_eq!(key.expression.op_type(), OpType::SimpleColumn);
}

#[test]
fn order_by_ordinal_out_of_range() {
    let err = compile_err("SELECT ID FROM EMP ORDER BY 2");
    assert_eq!(err.code(), Some(ErrorCode::InvalidOrderBy));
}

// ===================================================================
// Referenced objects
// ===================================================================

#[test]
fn object_names_cover_tables_sequences_and_routines() {
    let compiled = compile("SELECT NEXT VALUE FOR SEQ, TWICE(ID) FROM EMP");
    for name in ["PUBLIC.EMP", "PUBLIC.EMP.ID", "PUBLIC.SEQ", "PUBLIC.TWICE"] {
        assert!(
            compiled.object_names.iter().any(|n| n == name),
            "{name} missing from {:?}",
            compiled.object_names
        );
    }
}
