//! # oxide-sql-compiler
//!
//! The query front end of a SQL compiler: it turns SQL text into a typed,
//! semantically resolved query tree and exports that tree to a
//! planner-neutral element format.
//!
//! This crate provides:
//! - A rewindable token source and a speculative recursive-descent parser
//!   that keeps the most specific syntax error across abandoned alternatives
//! - A closed expression tree with structural equality, hashing and
//!   tree-wide collection helpers
//! - A resolver that binds columns across nested and correlated scopes,
//!   infers and coerces types, and validates aggregates and grouping
//! - An export of resolved statements for a downstream planner
//!
//! ## Compiling a query
//!
//! ```rust
//! use oxide_sql_compiler::catalog::{ColumnSchema, SchemaCatalog, TableSchema};
//! use oxide_sql_compiler::types::DataType;
//! use oxide_sql_compiler::{compile_query, CompileOptions};
//!
//! # fn main() -> Result<(), oxide_sql_compiler::CompileError> {
//! let catalog = SchemaCatalog::new().with_table(TableSchema::new(
//!     "USERS",
//!     vec![
//!         ColumnSchema::new("ID", DataType::Integer).not_null(),
//!         ColumnSchema::new("NAME", DataType::Varchar(64)),
//!     ],
//! ));
//!
//! let compiled = compile_query(
//!     "SELECT id, name FROM users WHERE id > ?",
//!     &catalog,
//!     &CompileOptions::default(),
//! )?;
//!
//! // The parameter adopted the type of the column it is compared with.
//! assert_eq!(compiled.parameters, vec![DataType::Integer]);
//! assert_eq!(compiled.statement.columns.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Unbound names are reported together, and type errors are accumulated
//! over the whole statement:
//!
//! ```rust
//! use oxide_sql_compiler::catalog::EmptyCatalog;
//! use oxide_sql_compiler::{compile_query, CompileError, CompileOptions};
//!
//! let err = compile_query("SELECT 1 FROM nowhere", &EmptyCatalog, &CompileOptions::default())
//!     .unwrap_err();
//! assert!(matches!(err, CompileError::UnresolvedNames(_)));
//! ```

pub mod catalog;
pub mod compile;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod expression;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod range;
pub mod resolver;
pub mod types;

pub use catalog::{Catalog, SchemaCatalog};
pub use compile::{compile_condition, compile_query, CompiledStatement};
pub use config::CompileOptions;
pub use error::{CompileError, ErrorCode, Result};
pub use export::ExportNode;
pub use expression::{ExprKind, Expression};
pub use lexer::{Token, TokenKind, TokenSource};
pub use parser::{ParseError, Parser};
pub use query::QueryExpression;
