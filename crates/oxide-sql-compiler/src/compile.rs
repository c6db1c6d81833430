//! Statement compilation: parse, resolve, collect parameters and references.

use std::collections::BTreeSet;

use tracing::debug;

use crate::catalog::Catalog;
use crate::config::CompileOptions;
use crate::context::CompileContext;
use crate::error::{CompileError, ErrorCode, Result};
use crate::export::{export_expression, export_statement, ExportNode};
use crate::expression::{ExprKind, Expression, KindSet, ObjectName};
use crate::parser::Parser;
use crate::query::QueryExpression;
use crate::range::{RangeColumn, RangeGroup, RangeSource, RangeVariable};
use crate::resolver::Resolver;
use crate::types::DataType;

/// A resolved statement with what the rest of the engine needs from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement<T> {
    /// The resolved tree.
    pub statement: T,
    /// Dynamic parameter types, by parameter index.
    pub parameters: Vec<DataType>,
    /// Qualified names of every referenced table, sequence, routine and
    /// column, sorted.
    pub object_names: Vec<String>,
}

impl CompiledStatement<QueryExpression> {
    /// The planner export tree of the query.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Export`] for kinds the planner cannot consume.
    pub fn export(&self) -> Result<ExportNode> {
        export_statement(&self.statement, &self.parameters)
    }
}

impl CompiledStatement<Expression> {
    /// The planner export tree of the condition.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Export`] for kinds the planner cannot consume.
    pub fn export(&self) -> Result<ExportNode> {
        export_expression(&self.statement)
    }
}

/// Compiles a query statement against `catalog`.
///
/// # Errors
///
/// Returns the most specific syntax error, every unresolved name at once,
/// the accumulated type errors, or the first structural error.
pub fn compile_query(
    sql: &str,
    catalog: &dyn Catalog,
    options: &CompileOptions,
) -> Result<CompiledStatement<QueryExpression>> {
    let mut parser = Parser::new(sql, catalog, options);
    let mut query = parser.parse_query()?;
    let context = parser.into_context();

    let mut resolver = Resolver::new();
    for name in context.unresolved() {
        resolver.note_unresolved(name.clone());
    }
    resolver.resolve_query(&mut query, None)?;
    resolver.finish()?;

    let parameters = parameter_types(&query.collect(KindSet::PARAMETERS, KindSet::EMPTY), &context)?;
    let object_names = object_names(&context, query.expressions());
    debug!(
        degree = query.columns.len(),
        parameters = parameters.len(),
        objects = object_names.len(),
        "compiled query"
    );
    Ok(CompiledStatement {
        statement: query,
        parameters,
        object_names,
    })
}

/// Compiles a CHECK constraint or trigger predicate over the columns of
/// `table`.
///
/// # Errors
///
/// Same as [`compile_query`]; an unknown table is a 42501 error.
pub fn compile_condition(
    sql: &str,
    table: &ObjectName,
    catalog: &dyn Catalog,
    options: &CompileOptions,
) -> Result<CompiledStatement<Expression>> {
    let schema = catalog
        .table(table, &options.default_schema)
        .ok_or_else(|| CompileError::UnresolvedNames(vec![table.to_string()]))?;

    let mut parser = Parser::new(sql, catalog, options);
    let mut condition = parser.parse_condition()?;
    let mut context = parser.into_context();
    context.add_table(0, schema.qualified_name());

    let mut range = RangeVariable::new(
        context.next_range_index(),
        context.depth(),
        RangeSource::Table(schema.qualified_name()),
    );
    range.columns = schema
        .columns
        .iter()
        .map(|column| RangeColumn {
            name: column.name.clone(),
            data_type: Some(column.data_type.clone()),
            nullable: column.nullable,
        })
        .collect();
    let ranges = [range];

    let mut resolver = Resolver::new();
    for name in context.unresolved() {
        resolver.note_unresolved(name.clone());
    }
    resolver.resolve_condition(
        &mut condition,
        &RangeGroup::new(&ranges, context.depth()),
        "a CHECK constraint",
    )?;
    resolver.finish()?;

    let parameters = parameter_types(&condition.collect(KindSet::PARAMETERS, KindSet::EMPTY), &context)?;
    let object_names = object_names(&context, [&condition]);
    debug!(table = %table, objects = object_names.len(), "compiled condition");
    Ok(CompiledStatement {
        statement: condition,
        parameters,
        object_names,
    })
}

/// Final parameter types in index order. A parameter still untyped after
/// resolution cannot be bound.
fn parameter_types(nodes: &[&Expression], context: &CompileContext) -> Result<Vec<DataType>> {
    let mut types: Vec<Option<DataType>> = vec![None; context.parameter_count()];
    for node in nodes {
        if let (ExprKind::Parameter(index), Some(data_type)) = (node.kind(), node.data_type()) {
            if let Some(slot) = types.get_mut(*index) {
                slot.get_or_insert_with(|| data_type.clone());
            }
        }
    }
    types
        .into_iter()
        .enumerate()
        .map(|(index, data_type)| {
            data_type.ok_or_else(|| {
                CompileError::type_error(
                    ErrorCode::UndeterminedParameter,
                    format!("data type of dynamic parameter {} cannot be determined", index + 1),
                )
            })
        })
        .collect()
}

fn object_names<'a>(
    context: &CompileContext,
    expressions: impl IntoIterator<Item = &'a Expression>,
) -> Vec<String> {
    let mut names: BTreeSet<String> = context.objects().map(ToString::to_string).collect();
    for expr in expressions {
        expr.collect_object_names(&mut names);
    }
    names.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSchema, SchemaCatalog, TableSchema};

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new().with_table(TableSchema::new(
            "T",
            vec![
                ColumnSchema::new("A", DataType::Integer).not_null(),
                ColumnSchema::new("B", DataType::Varchar(10)),
            ],
        ))
    }

    fn query(sql: &str) -> Result<CompiledStatement<QueryExpression>> {
        compile_query(sql, &catalog(), &CompileOptions::default())
    }

    #[test]
    fn test_parameters_in_index_order() {
        let compiled = query("SELECT A FROM T WHERE B = ? AND A > ?").unwrap();
        assert_eq!(compiled.parameters, vec![DataType::Varchar(10), DataType::Integer]);
    }

    #[test]
    fn test_untyped_parameter() {
        let err = query("SELECT ? FROM T").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UndeterminedParameter));
    }

    #[test]
    fn test_object_names() {
        let compiled = query("SELECT A FROM T WHERE B IS NULL").unwrap();
        assert_eq!(compiled.object_names, vec!["PUBLIC.T", "PUBLIC.T.A", "PUBLIC.T.B"]);
    }

    #[test]
    fn test_condition_binds_table_columns() {
        let options = CompileOptions::for_constraint();
        let compiled =
            compile_condition("A > 0 AND B IN ('x', 'y')", &ObjectName::new("T"), &catalog(), &options)
                .unwrap();
        assert_eq!(compiled.statement.data_type(), Some(&DataType::Boolean));
        assert!(compiled.object_names.contains(&"PUBLIC.T.A".to_string()));
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let err = compile_condition(
            "A + 1",
            &ObjectName::new("T"),
            &catalog(),
            &CompileOptions::for_constraint(),
        )
        .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BooleanRequired));
    }

    #[test]
    fn test_condition_unknown_table() {
        let err = compile_condition("1 = 1", &ObjectName::new("NOPE"), &catalog(), &CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedNames(_)));
    }
}
