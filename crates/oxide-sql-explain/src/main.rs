//! oxide-sql-explain CLI
//!
//! Compiles one statement against a JSON catalog and prints the planner
//! export tree or the normalized SQL.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_sql_compiler::expression::ObjectName;
use oxide_sql_compiler::{compile_condition, compile_query, CompileOptions, ExportNode, SchemaCatalog};

/// Output forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Export tree as JSON.
    Json,
    /// Export tree as indented XML-like text.
    Xml,
    /// Normalized SQL of the resolved statement.
    Sql,
}

/// Compile a SQL statement and print what the planner would receive.
#[derive(Debug, Parser)]
#[command(name = "oxide-sql-explain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON catalog with `tables`, `sequences` and `routines`.
    #[arg(short, long, env = "OXIDE_SQL_CATALOG")]
    catalog: Option<PathBuf>,

    /// Output form.
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Compile a CHECK predicate over `--table` instead of a query.
    #[arg(long, requires = "table")]
    constraint: bool,

    /// Table whose columns a constraint may reference.
    #[arg(short, long)]
    table: Option<String>,

    /// Schema for unqualified names.
    #[arg(long, default_value = "PUBLIC")]
    default_schema: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// The statement.
    sql: String,
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<SchemaCatalog> {
    let Some(path) = path else {
        return Ok(SchemaCatalog::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    let catalog: SchemaCatalog = serde_json::from_str(&text)
        .with_context(|| format!("parsing catalog {}", path.display()))?;
    debug!(tables = catalog.table_count(), "catalog loaded");
    Ok(catalog)
}

fn object_name(text: &str) -> ObjectName {
    match text.split_once('.') {
        Some((schema, name)) => ObjectName::qualified(schema.to_uppercase(), name.to_uppercase()),
        None => ObjectName::new(text.to_uppercase()),
    }
}

fn render(
    format: Format,
    sql: String,
    export: impl FnOnce() -> oxide_sql_compiler::Result<ExportNode>,
) -> anyhow::Result<String> {
    Ok(match format {
        Format::Sql => sql,
        Format::Json => export()?.to_json()?,
        Format::Xml => export()?.to_string(),
    })
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let catalog = load_catalog(cli.catalog.as_deref())?;
    let mut options = CompileOptions::default().with_default_schema(cli.default_schema.clone());

    if cli.constraint {
        options.constraint_context = true;
        let table = object_name(cli.table.as_deref().unwrap_or_default());
        let compiled = compile_condition(&cli.sql, &table, &catalog, &options)?;
        info!(objects = ?compiled.object_names, "compiled constraint");
        return render(cli.format, compiled.statement.to_string(), || compiled.export());
    }

    let compiled = compile_query(&cli.sql, &catalog, &options)?;
    info!(
        columns = compiled.statement.columns.len(),
        parameters = ?compiled.parameters,
        objects = ?compiled.object_names,
        "compiled query"
    );
    render(cli.format, compiled.statement.to_string(), || compiled.export())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let output = run(&cli)?;
    println!("{output}");
    Ok(())
}
