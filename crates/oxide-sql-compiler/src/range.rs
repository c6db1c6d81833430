//! Range variables (FROM items) and column lookup across nested scopes.

use core::fmt::{self, Display, Formatter, Write};

use crate::error::{CompileError, ErrorCode, Result};
use crate::expression::display::write_identifier;
use crate::expression::{ColumnBinding, ColumnName, Expression, ObjectName};
use crate::query::QueryExpression;
use crate::types::DataType;

/// A column exposed by a range variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeColumn {
    /// Column name.
    pub name: String,
    /// Column type; `None` until a derived table is resolved.
    pub data_type: Option<DataType>,
    /// Whether NULL may appear.
    pub nullable: bool,
}

impl RangeColumn {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: Option<DataType>) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }
}

/// What a range variable ranges over.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeSource {
    /// A catalog table, schema-qualified.
    Table(ObjectName),
    /// A derived table `(query)`.
    Derived(Box<QueryExpression>),
    /// A WITH query, by name.
    Cte {
        /// Query name.
        name: String,
        /// Reference to a recursive query from inside its own definition.
        recursive: bool,
    },
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinKind {
    /// The first FROM item, or an inner join.
    #[default]
    Inner,
    /// CROSS JOIN or a comma.
    Cross,
    /// LEFT OUTER JOIN.
    Left,
    /// RIGHT OUTER JOIN.
    Right,
    /// FULL OUTER JOIN; UNION JOIN is a full join on FALSE.
    Full,
}

impl JoinKind {
    /// Returns the SQL keywords, without `JOIN`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Cross => "CROSS",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
        }
    }
}

/// A FROM item with its scope slot, columns and join information.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeVariable {
    /// Scope slot; unique within a statement.
    pub index: usize,
    /// Nesting depth of the owning query block.
    pub depth: usize,
    /// What is ranged over.
    pub source: RangeSource,
    /// Correlation name.
    pub alias: Option<String>,
    /// Derived column list given after the alias.
    pub column_aliases: Vec<String>,
    /// Exposed columns.
    pub columns: Vec<RangeColumn>,
    /// How the item joins the items before it.
    pub join: JoinKind,
    /// NATURAL join.
    pub natural: bool,
    /// USING columns; for NATURAL joins, the common columns once resolved.
    pub using: Vec<String>,
    /// Join condition, explicit or synthesized from NATURAL/USING.
    pub condition: Option<Expression>,
}

impl RangeVariable {
    /// Creates an item over `source` with no join information.
    #[must_use]
    pub const fn new(index: usize, depth: usize, source: RangeSource) -> Self {
        Self {
            index,
            depth,
            source,
            alias: None,
            column_aliases: Vec::new(),
            columns: Vec::new(),
            join: JoinKind::Inner,
            natural: false,
            using: Vec::new(),
            condition: None,
        }
    }

    /// The name qualified column references use.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        if let Some(alias) = &self.alias {
            return Some(alias);
        }
        match &self.source {
            RangeSource::Table(table) => Some(&table.name),
            RangeSource::Cte { name, .. } => Some(name),
            RangeSource::Derived(_) => None,
        }
    }

    /// The base table, for table ranges.
    #[must_use]
    pub const fn table(&self) -> Option<&ObjectName> {
        match &self.source {
            RangeSource::Table(table) => Some(table),
            _ => None,
        }
    }

    /// The query, for derived tables.
    #[must_use]
    pub fn derived_query(&self) -> Option<&QueryExpression> {
        match &self.source {
            RangeSource::Derived(query) => Some(query),
            _ => None,
        }
    }

    /// Returns true if `schema.table` names this range.
    #[must_use]
    pub fn matches_qualifier(&self, schema: Option<&str>, table: &str) -> bool {
        if self.alias.is_some() {
            return schema.is_none() && self.alias.as_deref() == Some(table);
        }
        match &self.source {
            RangeSource::Table(name) => {
                name.name == table && schema.map_or(true, |s| name.schema.as_deref() == Some(s))
            }
            RangeSource::Cte { name, .. } => schema.is_none() && name == table,
            RangeSource::Derived(_) => false,
        }
    }

    /// Ordinal of the column called `name`.
    ///
    /// USING columns of a joined item are visible only through a qualifier;
    /// unqualified references see the copy on the left.
    #[must_use]
    pub fn find_column(&self, name: &str, qualified: bool) -> Option<usize> {
        if !qualified && self.using.iter().any(|u| u == name) {
            return None;
        }
        self.columns.iter().position(|c| c.name == name)
    }

    /// Applies the derived column list to `columns`.
    ///
    /// # Errors
    ///
    /// Returns 42593 when the list and the columns differ in count.
    pub fn apply_column_aliases(&mut self) -> Result<()> {
        if self.column_aliases.is_empty() {
            return Ok(());
        }
        if self.column_aliases.len() != self.columns.len() {
            return Err(CompileError::semantic(
                ErrorCode::ColumnCountMismatch,
                format!(
                    "column count mismatch in derived column list of {}",
                    self.name().unwrap_or("derived table")
                ),
            ));
        }
        for (column, alias) in self.columns.iter_mut().zip(&self.column_aliases) {
            column.name.clone_from(alias);
        }
        Ok(())
    }

    /// Renders the item with its join clause.
    #[must_use]
    pub const fn joined(&self) -> Joined<'_> {
        Joined(self)
    }
}

impl Display for RangeVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.source {
            RangeSource::Table(name) => write!(f, "{name}")?,
            RangeSource::Derived(query) => write!(f, "({query})")?,
            RangeSource::Cte { name, .. } => write_identifier(f, name)?,
        }
        if let Some(alias) = &self.alias {
            f.write_str(" AS ")?;
            write_identifier(f, alias)?;
            if !self.column_aliases.is_empty() {
                f.write_str(" (")?;
                for (i, name) in self.column_aliases.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_identifier(f, name)?;
                }
                f.write_char(')')?;
            }
        }
        Ok(())
    }
}

/// Display adapter printing a non-first FROM item with its join clause.
pub struct Joined<'a>(&'a RangeVariable);

impl Display for Joined<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let range = self.0;
        if range.join == JoinKind::Cross {
            return write!(f, "CROSS JOIN {range}");
        }
        if range.natural {
            return write!(f, "NATURAL {} JOIN {range}", range.join.as_str());
        }
        write!(f, "{} JOIN {range}", range.join.as_str())?;
        if !range.using.is_empty() {
            f.write_str(" USING (")?;
            for (i, name) in range.using.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_identifier(f, name)?;
            }
            return f.write_char(')');
        }
        match &range.condition {
            Some(condition) => write!(f, " ON {condition}"),
            None => Ok(()),
        }
    }
}

/// A column found by [`RangeGroup::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    /// Where the column lives.
    pub binding: ColumnBinding,
    /// Column type.
    pub data_type: Option<DataType>,
}

/// The ranges visible from one query block, linked to the enclosing blocks.
#[derive(Debug, Clone, Copy)]
pub struct RangeGroup<'a> {
    ranges: &'a [RangeVariable],
    depth: usize,
    outer: Option<&'a RangeGroup<'a>>,
}

impl<'a> RangeGroup<'a> {
    /// A top-level scope.
    #[must_use]
    pub const fn new(ranges: &'a [RangeVariable], depth: usize) -> Self {
        Self {
            ranges,
            depth,
            outer: None,
        }
    }

    /// An empty scope with no outer scope.
    #[must_use]
    pub const fn empty(depth: usize) -> Self {
        Self::new(&[], depth)
    }

    /// A nested scope whose misses fall back to `outer`.
    #[must_use]
    pub const fn with_outer(ranges: &'a [RangeVariable], depth: usize, outer: &'a RangeGroup<'a>) -> Self {
        Self {
            ranges,
            depth,
            outer: Some(outer),
        }
    }

    /// Ranges of this level.
    #[must_use]
    pub const fn ranges(&self) -> &'a [RangeVariable] {
        self.ranges
    }

    /// Depth of this level.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// The enclosing scope.
    #[must_use]
    pub const fn outer(&self) -> Option<&'a RangeGroup<'a>> {
        self.outer
    }

    /// Looks `name` up in this level, then in the enclosing levels.
    ///
    /// # Errors
    ///
    /// Returns 42580 when two ranges of the innermost matching level expose
    /// the name.
    pub fn resolve(&self, name: &ColumnName) -> Result<Option<ResolvedColumn>> {
        let qualified = name.table.is_some();
        let mut found: Option<ResolvedColumn> = None;
        for range in self.ranges {
            if let Some(table) = &name.table {
                if !range.matches_qualifier(name.schema.as_deref(), table) {
                    continue;
                }
            }
            let Some(ordinal) = range.find_column(&name.column, qualified) else {
                continue;
            };
            if found.is_some() {
                return Err(CompileError::semantic(
                    ErrorCode::AmbiguousColumn,
                    format!("ambiguous column reference: {name}"),
                ));
            }
            found = Some(ResolvedColumn {
                binding: ColumnBinding {
                    range: range.index,
                    column: ordinal,
                    depth: range.depth,
                    table: range.table().cloned(),
                },
                data_type: range.columns[ordinal].data_type.clone(),
            });
        }
        match (found, self.outer) {
            (Some(column), _) => Ok(Some(column)),
            (None, Some(outer)) => outer.resolve(name),
            (None, None) => Ok(None),
        }
    }

    /// Looks a range up by qualifier in this level, then in the enclosing ones.
    #[must_use]
    pub fn find_range(&self, schema: Option<&str>, table: &str) -> Option<&'a RangeVariable> {
        self.ranges
            .iter()
            .find(|range| range.matches_qualifier(schema, table))
            .or_else(|| self.outer.and_then(|outer| outer.find_range(schema, table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(index: usize, name: &str, columns: &[&str]) -> RangeVariable {
        let mut range = RangeVariable::new(
            index,
            0,
            RangeSource::Table(ObjectName::qualified("PUBLIC", name)),
        );
        range.columns = columns
            .iter()
            .map(|c| RangeColumn::new(*c, Some(DataType::Integer)))
            .collect();
        range
    }

    #[test]
    fn test_unqualified_lookup() {
        let ranges = [table(0, "T", &["A", "B"]), table(1, "U", &["C"])];
        let group = RangeGroup::new(&ranges, 0);
        let found = group.resolve(&ColumnName::new("C")).unwrap().unwrap();
        assert_eq!(found.binding.range, 1);
        assert_eq!(found.binding.column, 0);
        assert!(group.resolve(&ColumnName::new("Z")).unwrap().is_none());
    }

    #[test]
    fn test_ambiguous_lookup() {
        let ranges = [table(0, "T", &["A"]), table(1, "U", &["A"])];
        let group = RangeGroup::new(&ranges, 0);
        let err = group.resolve(&ColumnName::new("A")).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AmbiguousColumn));
        let ok = group.resolve(&ColumnName::qualified("U", "A")).unwrap().unwrap();
        assert_eq!(ok.binding.range, 1);
    }

    #[test]
    fn test_alias_hides_table_name() {
        let mut t = table(0, "T", &["A"]);
        t.alias = Some("X".into());
        assert!(t.matches_qualifier(None, "X"));
        assert!(!t.matches_qualifier(None, "T"));
    }

    #[test]
    fn test_outer_fallback() {
        let outer_ranges = [table(0, "T", &["A"])];
        let outer = RangeGroup::new(&outer_ranges, 0);
        let mut inner_range = table(1, "U", &["B"]);
        inner_range.depth = 1;
        let inner_ranges = [inner_range];
        let inner = RangeGroup::with_outer(&inner_ranges, 1, &outer);
        let found = inner.resolve(&ColumnName::new("A")).unwrap().unwrap();
        assert_eq!(found.binding.depth, 0);
    }

    #[test]
    fn test_using_column_seen_once() {
        let left = table(0, "T", &["ID", "A"]);
        let mut right = table(1, "U", &["ID", "B"]);
        right.join = JoinKind::Left;
        right.using = vec!["ID".into()];
        let ranges = [left, right];
        let group = RangeGroup::new(&ranges, 0);
        let found = group.resolve(&ColumnName::new("ID")).unwrap().unwrap();
        assert_eq!(found.binding.range, 0);
        assert!(group.resolve(&ColumnName::qualified("U", "ID")).unwrap().is_some());
    }

    #[test]
    fn test_column_alias_count_mismatch() {
        let mut t = table(0, "T", &["A", "B"]);
        t.column_aliases = vec!["X".into()];
        assert_eq!(
            t.apply_column_aliases().unwrap_err().code(),
            Some(ErrorCode::ColumnCountMismatch)
        );
    }
}
