//! Query expressions: WITH lists, set operations, SELECT blocks, VALUES,
//! ORDER BY and the LIMIT/OFFSET/FETCH/TOP family.

use tracing::debug;

use super::Parser;
use crate::context::CteScopeEntry;
use crate::error::{CompileError, ErrorCode, Result};
use crate::expression::{Expression, NullOrdering, OrderDirection, SortItem};
use crate::lexer::{Keyword, TokenKind};
use crate::query::{
    CommonTableExpression, QueryBody, QueryExpression, QuerySpecification, SelectItem,
    SetOperation, SetOperator, Slice,
};
use crate::range::RangeColumn;
use crate::resolver::Resolver;
use crate::types::DataType;

impl Parser<'_> {
    /// Parses `[WITH ...] body [ORDER BY ...] [slice]`.
    ///
    /// # Errors
    ///
    /// Returns a syntax error, or a fatal error for nested WITH lists,
    /// duplicate LIMIT clauses and invalid slice values.
    pub fn read_query_expression(&mut self) -> Result<QueryExpression> {
        let mut ctes = Vec::new();
        if self.check_keyword(Keyword::With) {
            if self.context.in_with() {
                return Err(CompileError::semantic(
                    ErrorCode::NestedWith,
                    "With statements may not be nested.",
                ));
            }
            ctes = self.read_with_list()?;
        }

        let pushed = ctes.len();
        let result = self.read_query_body().and_then(|mut query| {
            self.read_order_and_slice(&mut query)?;
            Ok(query)
        });
        self.context.pop_ctes(pushed);

        let mut query = result?;
        if !ctes.is_empty() {
            ctes.append(&mut query.with);
            query.with = ctes;
        }
        Ok(query)
    }

    fn read_with_list(&mut self) -> Result<Vec<CommonTableExpression>> {
        self.expect_keyword(Keyword::With)?;
        let recursive = self.consume_keyword(Keyword::Recursive);

        let mut ctes = Vec::new();
        self.context.set_in_with(true);
        let result = self.read_with_elements(recursive, &mut ctes);
        self.context.set_in_with(false);
        if let Err(error) = result {
            self.context.pop_ctes(ctes.len());
            return Err(error);
        }
        Ok(ctes)
    }

    fn read_with_elements(
        &mut self,
        recursive: bool,
        ctes: &mut Vec<CommonTableExpression>,
    ) -> Result<()> {
        loop {
            let position = self.position();
            let cte = self.read_common_table_expression(recursive, position)?;
            debug!(name = %cte.name, recursive = cte.recursive, "registered WITH query");
            self.context.push_cte(
                position,
                CteScopeEntry {
                    name: cte.name.clone(),
                    recursive: false,
                    depth: self.context.depth(),
                    columns: cte.columns.clone(),
                },
            );
            ctes.push(cte);
            if !self.consume(&TokenKind::Comma) {
                return Ok(());
            }
        }
    }

    /// `name [(columns)] AS (query)`. The definition is resolved here so
    /// later references see its column names and types.
    fn read_common_table_expression(
        &mut self,
        recursive: bool,
        position: usize,
    ) -> Result<CommonTableExpression> {
        let name = self.expect_identifier()?;
        let column_names = if self.check(&TokenKind::LeftParen) {
            self.read_column_name_list()?
        } else {
            Vec::new()
        };
        self.expect_keyword(Keyword::As)?;
        self.expect(&TokenKind::LeftParen)?;

        let (mut query, seed_columns) = if recursive {
            self.read_recursive_definition(&name, &column_names, position)?
        } else {
            (self.query_block(Self::read_query_expression)?, None)
        };
        self.expect(&TokenKind::RightParen)?;

        let mut resolver = self.resolver_with_unresolved();
        resolver.resolve_query(&mut query, None)?;
        resolver.finish()?;

        let is_recursive = seed_columns.is_some();
        let columns = match seed_columns {
            Some(columns) => columns,
            None => cte_columns(&name, &column_names, &query)?,
        };
        Ok(CommonTableExpression {
            name,
            column_names,
            query,
            recursive: is_recursive,
            columns,
        })
    }

    /// Parses the definition of a WITH RECURSIVE element.
    ///
    /// The first term is the seed. When a UNION follows, the seed is resolved
    /// first and the name is registered with the seed's columns, so that the
    /// recursive member can refer to it. The returned columns are `Some` only
    /// in that case.
    fn read_recursive_definition(
        &mut self,
        name: &str,
        column_names: &[String],
        position: usize,
    ) -> Result<(QueryExpression, Option<Vec<RangeColumn>>)> {
        self.query_block(|p| {
            let mut seed = p.read_query_term()?;
            if !p.check_keyword(Keyword::Union) {
                let mut query = p.read_set_tail(seed)?;
                p.read_order_and_slice(&mut query)?;
                return Ok((query, None));
            }

            let mut resolver = p.resolver_with_unresolved();
            resolver.resolve_query(&mut seed, None)?;
            resolver.finish()?;
            let columns = cte_columns(name, column_names, &seed)?;

            p.context.push_cte(
                position,
                CteScopeEntry {
                    name: name.to_owned(),
                    recursive: true,
                    depth: p.context.depth(),
                    columns: columns.clone(),
                },
            );
            let result = p.read_set_tail(seed).and_then(|mut query| {
                p.read_order_and_slice(&mut query)?;
                Ok(query)
            });
            p.context.pop_ctes(1);
            Ok((result?, Some(columns)))
        })
    }

    /// A resolver that already knows the names the parser failed to find.
    fn resolver_with_unresolved(&self) -> Resolver {
        let mut resolver = Resolver::new();
        for name in self.context.unresolved() {
            resolver.note_unresolved(name.clone());
        }
        resolver
    }

    /// UNION / EXCEPT level, left associative.
    fn read_query_body(&mut self) -> Result<QueryExpression> {
        let left = self.read_query_term()?;
        self.read_set_tail(left)
    }

    fn read_set_tail(&mut self, mut left: QueryExpression) -> Result<QueryExpression> {
        loop {
            let operator = match self.current().as_keyword() {
                Some(Keyword::Union) => SetOperator::Union,
                Some(Keyword::Except | Keyword::Minus) => SetOperator::Except,
                _ => return Ok(left),
            };
            // UNION JOIN belongs to the FROM clause.
            if self.peek(1).is_keyword(Keyword::Join) {
                return Ok(left);
            }
            self.advance();
            let (all, corresponding) = self.read_set_quantifier()?;
            let right = self.read_query_term()?;
            left = self.set_operation(operator, all, corresponding, left, right);
        }
    }

    /// INTERSECT level.
    fn read_query_term(&mut self) -> Result<QueryExpression> {
        let mut left = self.read_query_primary()?;
        while self.consume_keyword(Keyword::Intersect) {
            let (all, corresponding) = self.read_set_quantifier()?;
            let right = self.read_query_primary()?;
            left = self.set_operation(SetOperator::Intersect, all, corresponding, left, right);
        }
        Ok(left)
    }

    fn read_set_quantifier(&mut self) -> Result<(bool, Option<Vec<String>>)> {
        let all = self.consume_keyword(Keyword::All);
        if !all {
            self.consume_keyword(Keyword::Distinct);
        }
        let corresponding = if self.consume_keyword(Keyword::Corresponding) {
            if self.consume_keyword(Keyword::By) {
                Some(self.read_column_name_list()?)
            } else {
                Some(Vec::new())
            }
        } else {
            None
        };
        Ok((all, corresponding))
    }

    fn set_operation(
        &self,
        operator: SetOperator,
        all: bool,
        corresponding: Option<Vec<String>>,
        left: QueryExpression,
        right: QueryExpression,
    ) -> QueryExpression {
        QueryExpression::new(
            QueryBody::SetOperation(Box::new(SetOperation {
                operator,
                all,
                corresponding,
                left,
                right,
                left_columns: Vec::new(),
                right_columns: Vec::new(),
            })),
            self.context.depth(),
        )
    }

    /// SELECT block, VALUES, `TABLE name` or a parenthesized query.
    fn read_query_primary(&mut self) -> Result<QueryExpression> {
        let depth = self.context.depth();
        match self.current().as_keyword() {
            Some(Keyword::Select) => self.read_query_specification(),
            Some(Keyword::Values) => {
                self.advance();
                let mut rows = vec![self.read_row_expression()?];
                while self.consume(&TokenKind::Comma) {
                    rows.push(self.read_row_expression()?);
                }
                Ok(QueryExpression::new(QueryBody::Values(rows), depth))
            }
            Some(Keyword::Table) => {
                self.advance();
                let range = self.read_named_table()?;
                let mut spec = QuerySpecification::new(depth);
                spec.items.push(SelectItem::Wildcard(None));
                spec.from.push(range);
                Ok(QueryExpression::new(QueryBody::Select(Box::new(spec)), depth))
            }
            _ if self.check(&TokenKind::LeftParen) => self.nested(|p| {
                p.advance();
                let query = p.read_query_expression()?;
                p.expect(&TokenKind::RightParen)?;
                Ok(query)
            }),
            _ => Err(self.unexpected("SELECT, VALUES, TABLE or (")),
        }
    }

    /// Parses one SELECT block, with a TOP or leading LIMIT slice if given.
    ///
    /// # Errors
    ///
    /// Returns a syntax error when the block is malformed or uses `*`
    /// without a FROM clause.
    pub fn read_query_specification(&mut self) -> Result<QueryExpression> {
        let depth = self.context.depth();
        self.expect_keyword(Keyword::Select)?;

        let mut slice = None;
        if self.consume_keyword(Keyword::Top) {
            slice = Some(Slice {
                offset: None,
                limit: Some(self.read_slice_value()?),
            });
        } else if self.consume_keyword(Keyword::Limit) {
            let offset = self.read_slice_value()?;
            let limit = self.read_slice_value()?;
            slice = Some(Slice {
                offset: Some(offset),
                limit: Some(limit),
            });
        }

        let mut spec = QuerySpecification::new(depth);
        spec.distinct = self.consume_keyword(Keyword::Distinct);
        if !spec.distinct {
            self.consume_keyword(Keyword::All);
        }

        spec.items.push(self.read_select_item()?);
        while self.consume(&TokenKind::Comma) {
            spec.items.push(self.read_select_item()?);
        }

        // Without FROM the block reads one row with no range variables.
        if self.consume_keyword(Keyword::From) {
            spec.from = self.read_from_clause()?;
        } else if spec.items.iter().any(|item| matches!(item, SelectItem::Wildcard(_))) {
            self.expect_keyword(Keyword::From)?;
        }

        if self.consume_keyword(Keyword::Where) {
            spec.where_clause = Some(self.read_boolean_expression()?);
        }
        if self.consume_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            spec.group_by.push(self.read_value_expression()?);
            while self.consume(&TokenKind::Comma) {
                spec.group_by.push(self.read_value_expression()?);
            }
        }
        if self.consume_keyword(Keyword::Having) {
            spec.having = Some(self.read_boolean_expression()?);
        }

        let mut query = QueryExpression::new(QueryBody::Select(Box::new(spec)), depth);
        query.slice = slice;
        Ok(query)
    }

    fn read_select_item(&mut self) -> Result<SelectItem> {
        if self.consume(&TokenKind::Star) {
            return Ok(SelectItem::Wildcard(None));
        }
        if self.peek(1).kind == TokenKind::Dot && self.peek(2).kind == TokenKind::Star {
            if let Some(qualifier) = self.current().identifier().map(str::to_owned) {
                self.advance();
                self.advance();
                self.advance();
                return Ok(SelectItem::Wildcard(Some(qualifier)));
            }
        }

        let expression = self.read_boolean_expression()?;
        let alias = if self.consume_keyword(Keyword::As) {
            Some(self.expect_identifier()?)
        } else if matches!(
            self.current().kind,
            TokenKind::Identifier(_) | TokenKind::QuotedIdentifier(_)
        ) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        Ok(SelectItem::Expression(match alias {
            Some(alias) => expression.with_alias(alias),
            None => expression,
        }))
    }

    /// `ORDER BY item {, item}`.
    pub(super) fn read_order_by(&mut self) -> Result<Vec<SortItem>> {
        self.expect_keyword(Keyword::Order)?;
        self.expect_keyword(Keyword::By)?;
        let mut items = vec![self.read_sort_item()?];
        while self.consume(&TokenKind::Comma) {
            items.push(self.read_sort_item()?);
        }
        Ok(items)
    }

    fn read_sort_item(&mut self) -> Result<SortItem> {
        let mut item = SortItem::new(self.read_value_expression()?);
        if self.consume_keyword(Keyword::Desc) {
            item.direction = OrderDirection::Desc;
        } else {
            self.consume_keyword(Keyword::Asc);
        }
        if self.consume_keyword(Keyword::Nulls) {
            item.nulls = Some(if self.consume_keyword(Keyword::First) {
                NullOrdering::First
            } else {
                self.expect_keyword(Keyword::Last)?;
                NullOrdering::Last
            });
        }
        Ok(item)
    }

    fn read_order_and_slice(&mut self, query: &mut QueryExpression) -> Result<()> {
        let order_by = if self.check_keyword(Keyword::Order) {
            self.read_order_by()?
        } else {
            Vec::new()
        };
        let slice = self.read_slice()?;

        match (query.slice.is_some(), slice) {
            (true, Some(_)) => Err(duplicate_limit()),
            (true, None) => {
                query.order_by.extend(order_by);
                Ok(())
            }
            (false, slice) => {
                if !order_by.is_empty() {
                    query.order_by = order_by;
                }
                query.slice = slice;
                Ok(())
            }
        }
    }

    /// `LIMIT n [OFFSET m]`, `OFFSET m [ROWS] [LIMIT n | FETCH ...]` or
    /// `FETCH ...`.
    fn read_slice(&mut self) -> Result<Option<Slice>> {
        let mut offset = None;
        let mut limit = None;
        if self.consume_keyword(Keyword::Limit) {
            limit = Some(self.read_slice_value()?);
            if self.consume_keyword(Keyword::Offset) {
                offset = Some(self.read_slice_value()?);
            }
        } else if self.consume_keyword(Keyword::Offset) {
            offset = Some(self.read_slice_value()?);
            if !self.consume_keyword(Keyword::Rows) {
                self.consume_keyword(Keyword::Row);
            }
            if self.consume_keyword(Keyword::Limit) {
                limit = Some(self.read_slice_value()?);
            } else if self.check_keyword(Keyword::Fetch) {
                limit = Some(self.read_fetch()?);
            }
        } else if self.check_keyword(Keyword::Fetch) {
            limit = Some(self.read_fetch()?);
        }

        if offset.is_none() && limit.is_none() {
            return Ok(None);
        }
        if self.check_keyword(Keyword::Limit)
            || self.check_keyword(Keyword::Offset)
            || self.check_keyword(Keyword::Fetch)
        {
            return Err(duplicate_limit());
        }
        Ok(Some(Slice { offset, limit }))
    }

    /// `FETCH {FIRST|NEXT} [n] {ROW|ROWS} ONLY`.
    fn read_fetch(&mut self) -> Result<Expression> {
        self.expect_keyword(Keyword::Fetch)?;
        if !self.consume_keyword(Keyword::First) {
            self.expect_keyword(Keyword::Next)?;
        }
        let count = if self.check_keyword(Keyword::Row) || self.check_keyword(Keyword::Rows) {
            Expression::integer(1)
        } else {
            self.read_slice_value()?
        };
        if !self.consume_keyword(Keyword::Rows) {
            self.expect_keyword(Keyword::Row)?;
        }
        self.expect_keyword(Keyword::Only)?;
        Ok(count)
    }

    /// A non-negative integer literal or a `?`, which is typed INTEGER.
    fn read_slice_value(&mut self) -> Result<Expression> {
        match self.current().kind {
            TokenKind::Integer(n) if n >= 0 => {
                self.advance();
                Ok(Expression::integer(n))
            }
            TokenKind::Question => {
                let mut parameter = self.read_parameter();
                parameter.set_data_type(Some(DataType::Integer));
                Ok(parameter)
            }
            _ => Err(CompileError::semantic(
                ErrorCode::InvalidLimit,
                "invalid value for LIMIT, OFFSET, FETCH or TOP",
            )),
        }
    }
}

fn duplicate_limit() -> CompileError {
    CompileError::semantic(ErrorCode::DuplicateLimit, "duplicate LIMIT clause")
}

/// Range columns of a resolved WITH definition, renamed by its column list.
fn cte_columns(
    name: &str,
    column_names: &[String],
    query: &QueryExpression,
) -> Result<Vec<RangeColumn>> {
    let degree = query.columns.len();
    if !column_names.is_empty() && column_names.len() != degree {
        let which = if column_names.len() > degree {
            "many"
        } else {
            "few"
        };
        return Err(CompileError::semantic(
            ErrorCode::ColumnCountMismatch,
            format!("Too {which} column names in common table expression {name}"),
        ));
    }
    Ok(query
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let name = column_names.get(i).unwrap_or(&column.name);
            RangeColumn::new(name.clone(), column.data_type.clone())
        })
        .collect())
}
