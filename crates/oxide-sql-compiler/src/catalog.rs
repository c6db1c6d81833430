//! Catalog lookups used while compiling.
//!
//! The compiler only reads the catalog: table columns, sequence types and
//! routine signatures. [`SchemaCatalog`] is an in-memory implementation that
//! can be deserialized from JSON.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::expression::ObjectName;
use crate::types::DataType;

fn default_schema() -> String {
    String::from("PUBLIC")
}

const fn default_true() -> bool {
    true
}

fn default_sequence_type() -> DataType {
    DataType::BigInt
}

/// A column of a catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Whether the column is nullable.
    #[serde(default = "default_true")]
    pub nullable: bool,
}

impl ColumnSchema {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableSchema {
    /// Owning schema.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Creates a table in the PUBLIC schema.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            schema: default_schema(),
            name: name.into(),
            columns,
        }
    }

    /// The schema-qualified name.
    #[must_use]
    pub fn qualified_name(&self) -> ObjectName {
        ObjectName::qualified(self.schema.clone(), self.name.clone())
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A catalog sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SequenceSchema {
    /// Owning schema.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Sequence name.
    pub name: String,
    /// Type of generated values.
    #[serde(rename = "type", default = "default_sequence_type")]
    pub data_type: DataType,
}

/// A user-defined routine signature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoutineSchema {
    /// Owning schema.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Routine name.
    pub name: String,
    /// Parameter types in order.
    #[serde(default)]
    pub parameters: Vec<DataType>,
    /// Return type.
    pub returns: DataType,
}

/// Read access to schema objects.
///
/// Unqualified names are looked up in `default_schema`.
pub trait Catalog {
    /// Looks up a table.
    fn table(&self, name: &ObjectName, default_schema: &str) -> Option<&TableSchema>;

    /// Looks up a sequence.
    fn sequence(&self, name: &ObjectName, default_schema: &str) -> Option<&SequenceSchema>;

    /// Looks up a routine.
    fn routine(&self, name: &ObjectName, default_schema: &str) -> Option<&RoutineSchema>;
}

/// A catalog with no objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl Catalog for EmptyCatalog {
    fn table(&self, _: &ObjectName, _: &str) -> Option<&TableSchema> {
        None
    }

    fn sequence(&self, _: &ObjectName, _: &str) -> Option<&SequenceSchema> {
        None
    }

    fn routine(&self, _: &ObjectName, _: &str) -> Option<&RoutineSchema> {
        None
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    #[serde(default)]
    tables: Vec<TableSchema>,
    #[serde(default)]
    sequences: Vec<SequenceSchema>,
    #[serde(default)]
    routines: Vec<RoutineSchema>,
}

/// An in-memory catalog keyed by schema-qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "CatalogDocument")]
pub struct SchemaCatalog {
    tables: BTreeMap<ObjectName, TableSchema>,
    sequences: BTreeMap<ObjectName, SequenceSchema>,
    routines: BTreeMap<ObjectName, RoutineSchema>,
}

impl From<CatalogDocument> for SchemaCatalog {
    fn from(doc: CatalogDocument) -> Self {
        let mut catalog = Self::new();
        for table in doc.tables {
            catalog.add_table(table);
        }
        for sequence in doc.sequences {
            catalog.add_sequence(sequence);
        }
        for routine in doc.routines {
            catalog.add_routine(routine);
        }
        catalog
    }
}

impl SchemaCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, replacing any table of the same name.
    pub fn add_table(&mut self, table: TableSchema) {
        self.tables.insert(table.qualified_name(), table);
    }

    /// Builder form of [`SchemaCatalog::add_table`].
    #[must_use]
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.add_table(table);
        self
    }

    /// Adds a sequence.
    pub fn add_sequence(&mut self, sequence: SequenceSchema) {
        let key = ObjectName::qualified(sequence.schema.clone(), sequence.name.clone());
        self.sequences.insert(key, sequence);
    }

    /// Builder form of [`SchemaCatalog::add_sequence`].
    #[must_use]
    pub fn with_sequence(mut self, sequence: SequenceSchema) -> Self {
        self.add_sequence(sequence);
        self
    }

    /// Adds a routine.
    pub fn add_routine(&mut self, routine: RoutineSchema) {
        let key = ObjectName::qualified(routine.schema.clone(), routine.name.clone());
        self.routines.insert(key, routine);
    }

    /// Builder form of [`SchemaCatalog::add_routine`].
    #[must_use]
    pub fn with_routine(mut self, routine: RoutineSchema) -> Self {
        self.add_routine(routine);
        self
    }

    /// Number of tables.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

impl Catalog for SchemaCatalog {
    fn table(&self, name: &ObjectName, default_schema: &str) -> Option<&TableSchema> {
        self.tables.get(&name.or_schema(default_schema))
    }

    fn sequence(&self, name: &ObjectName, default_schema: &str) -> Option<&SequenceSchema> {
        self.sequences.get(&name.or_schema(default_schema))
    }

    fn routine(&self, name: &ObjectName, default_schema: &str) -> Option<&RoutineSchema> {
        self.routines.get(&name.or_schema(default_schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_uses_default_schema() {
        let catalog = SchemaCatalog::new().with_table(TableSchema::new(
            "ORDERS",
            vec![ColumnSchema::new("ID", DataType::Integer).not_null()],
        ));
        let found = catalog.table(&ObjectName::new("ORDERS"), "PUBLIC").unwrap();
        assert_eq!(found.column("ID").map(|c| c.nullable), Some(false));
        assert!(catalog.table(&ObjectName::new("ORDERS"), "OTHER").is_none());
        assert!(catalog
            .table(&ObjectName::qualified("PUBLIC", "ORDERS"), "OTHER")
            .is_some());
    }

    #[test]
    fn test_deserialize_document() {
        let json = r#"{
            "tables": [
                {"name": "T", "columns": [
                    {"name": "A", "type": "INTEGER"},
                    {"name": "B", "type": "DECIMAL(10,2)", "nullable": false}
                ]}
            ],
            "sequences": [{"name": "S"}],
            "routines": [{"name": "F", "parameters": ["INTEGER"], "returns": "VARCHAR(20)"}]
        }"#;
        let catalog: SchemaCatalog = serde_json::from_str(json).unwrap();
        let table = catalog.table(&ObjectName::new("T"), "PUBLIC").unwrap();
        assert_eq!(
            table.column("B").unwrap().data_type,
            DataType::Decimal {
                precision: 10,
                scale: 2
            }
        );
        let sequence = catalog.sequence(&ObjectName::new("S"), "PUBLIC").unwrap();
        assert_eq!(sequence.data_type, DataType::BigInt);
        let routine = catalog.routine(&ObjectName::new("F"), "PUBLIC").unwrap();
        assert_eq!(routine.returns, DataType::Varchar(20));
    }

    #[test]
    fn test_bad_type_is_rejected() {
        let json = r#"{"tables": [{"name": "T", "columns": [{"name": "A", "type": "NOPE"}]}]}"#;
        assert!(serde_json::from_str::<SchemaCatalog>(json).is_err());
    }

    #[test]
    fn test_empty_catalog() {
        assert!(EmptyCatalog
            .table(&ObjectName::new("T"), "PUBLIC")
            .is_none());
    }
}
