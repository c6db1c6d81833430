#![allow(dead_code)]

use oxide_sql_compiler::catalog::{
    ColumnSchema, RoutineSchema, SchemaCatalog, SequenceSchema, TableSchema,
};
use oxide_sql_compiler::query::QueryExpression;
use oxide_sql_compiler::types::DataType;
use oxide_sql_compiler::{
    compile_query, CompileError, CompileOptions, CompiledStatement, Expression, ParseError,
    Parser,
};

/// Tables used across the integration tests:
///
/// - `T(A INTEGER NOT NULL, B VARCHAR(10), C INTEGER)`
/// - `EMP(ID INTEGER NOT NULL, NAME VARCHAR(40), DEPT INTEGER, SALARY DOUBLE)`
/// - `DEPT(ID INTEGER NOT NULL, TITLE VARCHAR(20))`
/// - `OUTER_T(X INTEGER)`, `INNER_T(Y INTEGER)`
/// - sequence `SEQ`, routine `TWICE(INTEGER) RETURNS BIGINT`
pub fn catalog() -> SchemaCatalog {
    SchemaCatalog::new()
        .with_table(TableSchema::new(
            "T",
            vec![
                ColumnSchema::new("A", DataType::Integer).not_null(),
                ColumnSchema::new("B", DataType::Varchar(10)),
                ColumnSchema::new("C", DataType::Integer),
            ],
        ))
        .with_table(TableSchema::new(
            "EMP",
            vec![
                ColumnSchema::new("ID", DataType::Integer).not_null(),
                ColumnSchema::new("NAME", DataType::Varchar(40)),
                ColumnSchema::new("DEPT", DataType::Integer),
                ColumnSchema::new("SALARY", DataType::Double),
            ],
        ))
        .with_table(TableSchema::new(
            "DEPT",
            vec![
                ColumnSchema::new("ID", DataType::Integer).not_null(),
                ColumnSchema::new("TITLE", DataType::Varchar(20)),
            ],
        ))
        .with_table(TableSchema::new(
            "OUTER_T",
            vec![ColumnSchema::new("X", DataType::Integer)],
        ))
        .with_table(TableSchema::new(
            "INNER_T",
            vec![ColumnSchema::new("Y", DataType::Integer)],
        ))
        .with_sequence(SequenceSchema {
            schema: "PUBLIC".into(),
            name: "SEQ".into(),
            data_type: DataType::BigInt,
        })
        .with_routine(RoutineSchema {
            schema: "PUBLIC".into(),
            name: "TWICE".into(),
            parameters: vec![DataType::Integer],
            returns: DataType::BigInt,
        })
}

pub fn try_compile(sql: &str) -> Result<CompiledStatement<QueryExpression>, CompileError> {
    compile_query(sql, &catalog(), &CompileOptions::default())
}

pub fn compile(sql: &str) -> CompiledStatement<QueryExpression> {
    try_compile(sql).unwrap_or_else(|e| panic!("Failed to compile: {sql}\nError: {e}"))
}

pub fn compile_err(sql: &str) -> CompileError {
    match try_compile(sql) {
        Ok(compiled) => panic!("Expected error for: {sql}\nGot: {}", compiled.statement),
        Err(e) => e,
    }
}

pub fn parse_err(sql: &str) -> ParseError {
    match compile_err(sql) {
        CompileError::Parse(e) => e,
        other => panic!("Expected syntax error for: {sql}\nGot: {other}"),
    }
}

/// Parses a boolean or value expression without resolving it.
pub fn parse_value(sql: &str) -> Expression {
    let catalog = catalog();
    let options = CompileOptions::default();
    Parser::new(sql, &catalog, &options)
        .parse_condition()
        .unwrap_or_else(|e| panic!("Failed to parse: {sql}\nError: {e}"))
}

/// Verifies that printing an expression and parsing the text back yields
/// an equal tree.
pub fn round_trip(sql: &str) {
    let first = parse_value(sql);
    let rendered = first.to_string();
    let second = parse_value(&rendered);
    assert_eq!(
        first, second,
        "Round-trip failed.\n  Input:    {sql}\n  Rendered: {rendered}"
    );
}

pub fn column_types(compiled: &CompiledStatement<QueryExpression>) -> Vec<Option<DataType>> {
    compiled.statement.column_types()
}

pub fn column_names(compiled: &CompiledStatement<QueryExpression>) -> Vec<String> {
    compiled
        .statement
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect()
}
