//! FROM clause: table references, derived tables and joins.

use tracing::trace;

use super::expression::starts_query;
use super::Parser;
use crate::error::{CompileError, ErrorCode, Result};
use crate::expression::Expression;
use crate::lexer::{Keyword, TokenKind};
use crate::range::{JoinKind, RangeColumn, RangeSource, RangeVariable};

/// A parsed join operator.
struct JoinType {
    kind: JoinKind,
    natural: bool,
    union: bool,
}

impl Parser<'_> {
    /// `table_ref {, table_ref}`. Items after a comma are cross joined.
    pub(super) fn read_from_clause(&mut self) -> Result<Vec<RangeVariable>> {
        let mut ranges = self.read_table_reference()?;
        while self.consume(&TokenKind::Comma) {
            let mut next = self.read_table_reference()?;
            if let Some(first) = next.first_mut() {
                first.join = JoinKind::Cross;
            }
            ranges.append(&mut next);
        }
        Ok(ranges)
    }

    /// Parses a table primary followed by any number of join clauses.
    ///
    /// The ranges are returned flattened in FROM order. The join kind of a
    /// clause is stored on the first range of its right side and the join
    /// condition on the last one.
    ///
    /// # Errors
    ///
    /// Returns a syntax error when the reference is malformed, 42581 when an
    /// inner or outer join has neither ON nor USING, and 42501 for unknown
    /// tables.
    pub fn read_table_reference(&mut self) -> Result<Vec<RangeVariable>> {
        let mut ranges = self.read_table_primary()?;
        while let Some(join) = self.read_join_type()? {
            let mut right = self.read_table_primary()?;
            if let Some(first) = right.first_mut() {
                first.join = join.kind;
            }
            self.read_join_specification(&join, &mut right)?;
            ranges.append(&mut right);
        }
        Ok(ranges)
    }

    fn read_join_type(&mut self) -> Result<Option<JoinType>> {
        let natural = self.consume_keyword(Keyword::Natural);
        let keyword = self.current().as_keyword();
        let kind = match keyword {
            Some(Keyword::Join) => JoinKind::Inner,
            Some(Keyword::Inner) => {
                self.advance();
                JoinKind::Inner
            }
            Some(Keyword::Left | Keyword::Right | Keyword::Full) => {
                self.advance();
                self.consume_keyword(Keyword::Outer);
                match keyword {
                    Some(Keyword::Left) => JoinKind::Left,
                    Some(Keyword::Right) => JoinKind::Right,
                    _ => JoinKind::Full,
                }
            }
            Some(Keyword::Cross) if !natural => {
                self.advance();
                JoinKind::Cross
            }
            Some(Keyword::Union) if !natural && self.peek(1).is_keyword(Keyword::Join) => {
                self.advance();
                self.advance();
                return Ok(Some(JoinType {
                    kind: JoinKind::Full,
                    natural: false,
                    union: true,
                }));
            }
            _ if natural => return Err(self.unexpected("JOIN")),
            _ => return Ok(None),
        };
        self.expect_keyword(Keyword::Join)?;
        Ok(Some(JoinType {
            kind,
            natural,
            union: false,
        }))
    }

    /// ON, USING or nothing, depending on the join type.
    fn read_join_specification(
        &mut self,
        join: &JoinType,
        right: &mut [RangeVariable],
    ) -> Result<()> {
        let multiple = right.len() > 1;
        let Some(last) = right.last_mut() else {
            return Ok(());
        };
        if join.union {
            last.condition = Some(Expression::boolean(false));
            return Ok(());
        }
        if join.kind == JoinKind::Cross {
            return Ok(());
        }
        if join.natural {
            if multiple {
                return Err(parenthesized_join_error());
            }
            last.natural = true;
            return Ok(());
        }

        if self.consume_keyword(Keyword::On) {
            let condition = self.read_boolean_expression()?;
            last.condition = match last.condition.take() {
                Some(existing) => Some(Expression::and(existing, condition)),
                None => Some(condition),
            };
            return Ok(());
        }
        if self.consume_keyword(Keyword::Using) {
            if multiple {
                return Err(parenthesized_join_error());
            }
            last.using = self.read_column_name_list()?;
            return Ok(());
        }
        Err(CompileError::semantic(
            ErrorCode::UnexpectedToken,
            format!(
                "{} JOIN requires an ON or USING clause, found {}",
                join.kind.as_str(),
                self.current().kind
            ),
        ))
    }

    fn read_table_primary(&mut self) -> Result<Vec<RangeVariable>> {
        if !self.check(&TokenKind::LeftParen) {
            return Ok(vec![self.read_named_table()?]);
        }
        if starts_query(self.peek(1)) {
            return Ok(vec![self.read_derived_table()?]);
        }
        if self.peek(1).kind == TokenKind::LeftParen {
            trace!(position = self.position(), "derived or joined table");
            return self.either(
                |p| p.read_derived_table().map(|range| vec![range]),
                Self::read_joined_table,
            );
        }
        self.read_joined_table()
    }

    /// `( table_ref )`.
    fn read_joined_table(&mut self) -> Result<Vec<RangeVariable>> {
        self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            let ranges = p.read_table_reference()?;
            p.expect(&TokenKind::RightParen)?;
            Ok(ranges)
        })
    }

    /// `( query ) [AS] alias [(columns)]`. Columns are filled in by the
    /// resolver.
    fn read_derived_table(&mut self) -> Result<RangeVariable> {
        let subquery = self.read_subquery()?;
        let index = self.context.next_range_index();
        let mut range = RangeVariable::new(
            index,
            self.context.depth(),
            RangeSource::Derived(subquery.query),
        );
        self.read_correlation(&mut range)?;
        Ok(range)
    }

    /// A WITH query name or a catalog table, with its correlation.
    pub(super) fn read_named_table(&mut self) -> Result<RangeVariable> {
        let position = self.position();
        let name = self.read_object_name()?;
        let depth = self.context.depth();

        let cte = match name.schema {
            None => self.context.find_cte(&name.name).cloned(),
            Some(_) => None,
        };
        let mut range = if let Some(entry) = cte {
            let index = self.context.next_range_index();
            let mut range = RangeVariable::new(
                index,
                depth,
                RangeSource::Cte {
                    name: entry.name,
                    recursive: entry.recursive,
                },
            );
            range.columns = entry.columns;
            range
        } else {
            let catalog = self.catalog;
            let Some(table) = catalog.table(&name, &self.options.default_schema) else {
                // Reported with the other unresolved names once parsing ends.
                self.context.add_unresolved(position, name.to_string());
                let index = self.context.next_range_index();
                let qualified = name.or_schema(&self.options.default_schema);
                let mut range = RangeVariable::new(index, depth, RangeSource::Table(qualified));
                self.read_correlation(&mut range)?;
                return Ok(range);
            };
            let qualified = table.qualified_name();
            self.context.add_table(position, qualified.clone());
            let index = self.context.next_range_index();
            let mut range = RangeVariable::new(index, depth, RangeSource::Table(qualified));
            range.columns = table
                .columns
                .iter()
                .map(|column| RangeColumn {
                    name: column.name.clone(),
                    data_type: Some(column.data_type.clone()),
                    nullable: column.nullable,
                })
                .collect();
            range
        };

        self.read_correlation(&mut range)?;
        range.apply_column_aliases()?;
        Ok(range)
    }

    /// `[AS] alias [(column, ...)]`. Without AS only a plain or quoted
    /// identifier is taken, so join keywords are never read as aliases.
    fn read_correlation(&mut self, range: &mut RangeVariable) -> Result<()> {
        let alias = if self.consume_keyword(Keyword::As) {
            self.expect_identifier()?
        } else if matches!(
            self.current().kind,
            TokenKind::Identifier(_) | TokenKind::QuotedIdentifier(_)
        ) {
            self.expect_identifier()?
        } else {
            return Ok(());
        };
        range.alias = Some(alias);
        if self.check(&TokenKind::LeftParen) {
            range.column_aliases = self.read_column_name_list()?;
        }
        Ok(())
    }
}

fn parenthesized_join_error() -> CompileError {
    CompileError::semantic(
        ErrorCode::FeatureNotSupported,
        "NATURAL or USING join with a parenthesized joined table",
    )
}

#[cfg(test)]
mod tests {
    use crate::catalog::{ColumnSchema, SchemaCatalog, TableSchema};
    use crate::config::CompileOptions;
    use crate::error::{CompileError, ErrorCode};
    use crate::parser::Parser;
    use crate::range::{JoinKind, RangeSource, RangeVariable};
    use crate::types::DataType;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new()
            .with_table(TableSchema::new(
                "T",
                vec![
                    ColumnSchema::new("ID", DataType::Integer).not_null(),
                    ColumnSchema::new("A", DataType::Integer),
                ],
            ))
            .with_table(TableSchema::new(
                "U",
                vec![
                    ColumnSchema::new("ID", DataType::Integer),
                    ColumnSchema::new("B", DataType::Varchar(5)),
                ],
            ))
            .with_table(TableSchema::new(
                "V",
                vec![ColumnSchema::new("C", DataType::Integer)],
            ))
    }

    fn parse(sql: &str) -> Result<Vec<RangeVariable>, CompileError> {
        let catalog = catalog();
        let options = CompileOptions::default();
        let query = Parser::new(sql, &catalog, &options).parse_query()?;
        Ok(query.as_select().map(|s| s.from.clone()).unwrap_or_default())
    }

    fn ranges(sql: &str) -> Vec<RangeVariable> {
        parse(sql).unwrap()
    }

    #[test]
    fn test_table_columns_from_catalog() {
        let from = ranges("SELECT * FROM T");
        assert_eq!(from.len(), 1);
        assert_eq!(from[0].columns.len(), 2);
        assert!(!from[0].columns[0].nullable);
        assert_eq!(from[0].name(), Some("T"));
    }

    #[test]
    fn test_alias_and_column_aliases() {
        let from = ranges("SELECT * FROM T AS X (P, Q)");
        assert_eq!(from[0].alias.as_deref(), Some("X"));
        assert_eq!(from[0].columns[1].name, "Q");
        let err = parse("SELECT * FROM T X (P)").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ColumnCountMismatch));
    }

    #[test]
    fn test_join_keywords_are_not_aliases() {
        let from = ranges("SELECT * FROM T LEFT JOIN U ON T.ID = U.ID");
        assert_eq!(from.len(), 2);
        assert!(from[0].alias.is_none());
        assert_eq!(from[1].join, JoinKind::Left);
        assert_eq!(
            from[1].condition.as_ref().unwrap().to_string(),
            "(T.ID = U.ID)"
        );
    }

    #[test]
    fn test_join_variants() {
        let from = ranges(
            "SELECT * FROM T FULL OUTER JOIN U USING (ID) CROSS JOIN V, T X NATURAL JOIN U Y",
        );
        let kinds: Vec<_> = from.iter().map(|r| r.join).collect();
        assert_eq!(
            kinds,
            [
                JoinKind::Inner,
                JoinKind::Full,
                JoinKind::Cross,
                JoinKind::Cross,
                JoinKind::Inner
            ]
        );
        assert_eq!(from[1].using, vec!["ID".to_string()]);
        assert!(from[4].natural);
    }

    #[test]
    fn test_union_join_is_full_on_false() {
        let from = ranges("SELECT * FROM T UNION JOIN U");
        assert_eq!(from[1].join, JoinKind::Full);
        assert_eq!(from[1].condition.as_ref().unwrap().to_string(), "FALSE");
    }

    #[test]
    fn test_inner_join_requires_condition() {
        let err = parse("SELECT * FROM T JOIN U").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UnexpectedToken));
    }

    #[test]
    fn test_unknown_tables_are_collected() {
        let catalog = catalog();
        let options = CompileOptions::default();
        let mut parser = Parser::new("SELECT X FROM NOPE1 N, NOPE2", &catalog, &options);
        let query = parser.parse_query().unwrap();
        let from = &query.as_select().unwrap().from;
        assert_eq!(from.len(), 2);
        assert!(from[0].columns.is_empty());
        assert_eq!(from[0].name(), Some("N"));

        let context = parser.into_context();
        let names: Vec<&String> = context.unresolved().collect();
        assert_eq!(names, ["NOPE1", "NOPE2"]);
    }

    #[test]
    fn test_derived_and_parenthesized_tables() {
        let from = ranges("SELECT * FROM (SELECT A FROM T) AS D, (U JOIN V ON U.ID = V.C)");
        assert!(matches!(from[0].source, RangeSource::Derived(_)));
        assert_eq!(from[0].alias.as_deref(), Some("D"));
        assert_eq!(from.len(), 3);
        assert_eq!(from[1].join, JoinKind::Cross);
        assert!(from[2].condition.is_some());
    }

    #[test]
    fn test_range_indexes_are_distinct() {
        let from = ranges("SELECT * FROM T, U, V");
        let indexes: Vec<_> = from.iter().map(|r| r.index).collect();
        assert_eq!(indexes, [0, 1, 2]);
    }
}
