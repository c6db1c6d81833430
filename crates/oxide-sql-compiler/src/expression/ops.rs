//! Structural operations over expression trees.

use std::collections::BTreeSet;

use core::hash::{Hash, Hasher};

use super::{ExprKind, Expression, OpType, WindowFunction};

/// A set of [`OpType`] tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindSet(u64);

impl KindSet {
    /// No kinds.
    pub const EMPTY: Self = Self(0);

    /// Aggregate calls.
    pub const AGGREGATES: Self = Self::of(&[OpType::Aggregate]);

    /// Column references.
    pub const COLUMNS: Self = Self::of(&[OpType::Column]);

    /// Dynamic parameters.
    pub const PARAMETERS: Self = Self::of(&[OpType::Parameter]);

    /// Every node that owns a query.
    pub const SUBQUERIES: Self = Self::of(&[
        OpType::Exists,
        OpType::Unique,
        OpType::Match,
        OpType::ScalarSubquery,
        OpType::RowSubquery,
        OpType::TableSubquery,
    ]);

    /// Subqueries and aggregates.
    pub const SUBQUERIES_AND_AGGREGATES: Self = Self::SUBQUERIES.union(Self::AGGREGATES);

    /// Builds a set from a slice of tags.
    #[must_use]
    pub const fn of(kinds: &[OpType]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < kinds.len() {
            bits |= 1u64 << (kinds[i] as u8);
            i += 1;
        }
        Self(bits)
    }

    /// Returns true if `kind` is in the set.
    #[must_use]
    pub const fn contains(self, kind: OpType) -> bool {
        self.0 & (1u64 << (kind as u8)) != 0
    }

    /// Set union.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        if self.op_type() != other.op_type() || self.data_type != other.data_type {
            return false;
        }
        let same_payload = match (&self.kind, &other.kind) {
            (ExprKind::Value(a), ExprKind::Value(b)) => a == b,
            (ExprKind::Parameter(a), ExprKind::Parameter(b))
            | (ExprKind::SimpleColumn(a), ExprKind::SimpleColumn(b)) => a == b,
            (ExprKind::Column(a), ExprKind::Column(b)) => match (&a.binding, &b.binding) {
                (Some(x), Some(y)) => x.range == y.range && x.column == y.column,
                (None, None) => a.name == b.name,
                _ => false,
            },
            (
                ExprKind::Comparison { quantifier: a, .. },
                ExprKind::Comparison { quantifier: b, .. },
            ) => a == b,
            (ExprKind::Aggregate(a), ExprKind::Aggregate(b)) => {
                a.function == b.function
                    && a.distinct == b.distinct
                    && a.separator == b.separator
                    && same_directions(&a.order_by, &b.order_by)
            }
            (ExprKind::Window(a), ExprKind::Window(b)) => {
                let same_function = match (&a.function, &b.function) {
                    (WindowFunction::Aggregate(x), WindowFunction::Aggregate(y)) => {
                        x.function == y.function && x.distinct == y.distinct
                    }
                    (x, y) => core::mem::discriminant(x) == core::mem::discriminant(y),
                };
                same_function
                    && a.partition_by.len() == b.partition_by.len()
                    && same_directions(&a.order_by, &b.order_by)
            }
            (ExprKind::Function(a), ExprKind::Function(b)) => a.function == b.function,
            (ExprKind::Routine(a), ExprKind::Routine(b)) => a.name == b.name,
            (ExprKind::Sequence(a), ExprKind::Sequence(b)) => a == b,
            (ExprKind::Cast { target: a, .. }, ExprKind::Cast { target: b, .. }) => a == b,
            (ExprKind::Exists(a), ExprKind::Exists(b))
            | (ExprKind::Unique(a), ExprKind::Unique(b))
            | (ExprKind::Subquery { query: a, .. }, ExprKind::Subquery { query: b, .. }) => {
                a.query == b.query
            }
            (
                ExprKind::Match {
                    kind: ka,
                    unique: ua,
                    query: qa,
                    ..
                },
                ExprKind::Match {
                    kind: kb,
                    unique: ub,
                    query: qb,
                    ..
                },
            ) => ka == kb && ua == ub && qa.query == qb.query,
            _ => true,
        };
        same_payload && self.children() == other.children()
    }
}

fn same_directions(a: &[super::SortItem], b: &[super::SortItem]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.direction == y.direction && x.nulls == y.nulls)
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.op_type().hash(state);
        self.data_type.hash(state);
        match &self.kind {
            ExprKind::Value(literal) => literal.hash(state),
            ExprKind::Parameter(index) | ExprKind::SimpleColumn(index) => index.hash(state),
            ExprKind::Column(column) => match &column.binding {
                Some(binding) => {
                    binding.range.hash(state);
                    binding.column.hash(state);
                }
                None => column.name.hash(state),
            },
            ExprKind::Comparison { quantifier, .. } => quantifier.hash(state),
            ExprKind::Aggregate(call) => {
                call.function.hash(state);
                call.distinct.hash(state);
                call.separator.hash(state);
                hash_directions(&call.order_by, state);
            }
            ExprKind::Window(call) => {
                match &call.function {
                    WindowFunction::Aggregate(aggregate) => {
                        aggregate.function.hash(state);
                        aggregate.distinct.hash(state);
                    }
                    other => core::mem::discriminant(other).hash(state),
                }
                call.partition_by.len().hash(state);
                hash_directions(&call.order_by, state);
            }
            ExprKind::Function(call) => call.function.hash(state),
            ExprKind::Routine(call) => call.name.hash(state),
            ExprKind::Sequence(name) => name.hash(state),
            ExprKind::Cast { target, .. } => target.hash(state),
            ExprKind::Exists(query)
            | ExprKind::Unique(query)
            | ExprKind::Subquery { query, .. } => hash_query(query, state),
            ExprKind::Match {
                kind,
                unique,
                query,
                ..
            } => {
                kind.hash(state);
                unique.hash(state);
                hash_query(query, state);
            }
            _ => {}
        }
        for child in self.children() {
            child.hash(state);
        }
    }
}

fn hash_directions<H: Hasher>(items: &[super::SortItem], state: &mut H) {
    items.len().hash(state);
    for item in items {
        item.direction.hash(state);
        item.nulls.hash(state);
    }
}

/// Queries have no `Hash`; equal queries print the same SQL text.
fn hash_query<H: Hasher>(query: &super::SubQuery, state: &mut H) {
    query.query.to_string().hash(state);
}

impl Expression {
    /// Deep copy of the node and its whole subtree, alias included.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Collects nodes whose kind is in `kinds`, children before parents.
    ///
    /// Descends into subqueries; does not descend into nodes whose kind is in
    /// `stop`, and never returns such a node itself.
    #[must_use]
    pub fn collect(&self, kinds: KindSet, stop: KindSet) -> Vec<&Self> {
        let mut out = Vec::new();
        self.collect_into(kinds, stop, &mut out);
        out
    }

    pub(crate) fn collect_into<'a>(
        &'a self,
        kinds: KindSet,
        stop: KindSet,
        out: &mut Vec<&'a Self>,
    ) {
        let op = self.op_type();
        if stop.contains(op) {
            return;
        }
        for child in self.children() {
            child.collect_into(kinds, stop, out);
        }
        if kinds.contains(op) {
            out.push(self);
        }
        if let Some(subquery) = self.subquery() {
            subquery.query.collect_into(kinds, stop, out);
        }
    }

    /// Returns true if the node can be computed from `allowed` alone.
    ///
    /// Literals and parameters are always allowed, as is any node whose kind is
    /// in `exclude`.
    #[must_use]
    pub fn is_composed_of(&self, allowed: &[Self], exclude: KindSet) -> bool {
        self.is_composed_of_at(allowed, exclude, 0)
    }

    /// Like [`Expression::is_composed_of`], also accepting columns bound in a
    /// query block shallower than `depth`.
    pub(crate) fn is_composed_of_at(&self, allowed: &[Self], exclude: KindSet, depth: usize) -> bool {
        let op = self.op_type();
        if matches!(op, OpType::Value | OpType::Parameter) || exclude.contains(op) {
            return true;
        }
        if allowed.contains(self) {
            return true;
        }
        match &self.kind {
            ExprKind::Column(column) => column
                .binding
                .as_ref()
                .is_some_and(|binding| binding.depth < depth),
            ExprKind::SimpleColumn(_)
            | ExprKind::Asterisk
            | ExprKind::Sequence(_)
            | ExprKind::Aggregate(_)
            | ExprKind::Window(_)
            | ExprKind::Exists(_)
            | ExprKind::Unique(_)
            | ExprKind::Match { .. }
            | ExprKind::Subquery { .. } => false,
            _ => self
                .children()
                .into_iter()
                .all(|child| child.is_composed_of_at(allowed, exclude, depth)),
        }
    }

    /// Scope slots referenced by bound columns, subqueries included.
    #[must_use]
    pub fn collect_range_variables(&self) -> BTreeSet<usize> {
        self.collect(KindSet::COLUMNS, KindSet::EMPTY)
            .into_iter()
            .filter_map(|e| e.as_column()?.binding.as_ref())
            .map(|binding| binding.range)
            .collect()
    }

    /// Returns true if any column in the tree is bound to scope slot `range`.
    #[must_use]
    pub fn has_reference(&self, range: usize) -> bool {
        self.collect_range_variables().contains(&range)
    }

    /// Returns true if a column bound at a depth shallower than `depth` occurs
    /// in the tree.
    #[must_use]
    pub fn references_outer(&self, depth: usize) -> bool {
        self.collect(KindSet::COLUMNS, KindSet::EMPTY)
            .into_iter()
            .filter_map(|e| e.as_column()?.binding.as_ref())
            .any(|binding| binding.depth < depth)
    }

    /// Adds fully qualified names of referenced columns, sequences and
    /// routines to `names`.
    pub fn collect_object_names(&self, names: &mut BTreeSet<String>) {
        let kinds = KindSet::of(&[OpType::Column, OpType::Sequence, OpType::Routine]);
        for node in self.collect(kinds, KindSet::EMPTY) {
            match &node.kind {
                ExprKind::Column(column) => {
                    if let Some(table) = column.binding.as_ref().and_then(|b| b.table.as_ref()) {
                        names.insert(format!("{table}.{}", column.name.column));
                    }
                }
                ExprKind::Sequence(name) => {
                    names.insert(name.to_string());
                }
                ExprKind::Routine(call) => {
                    names.insert(call.name.to_string());
                }
                _ => {}
            }
        }
    }

    /// Replaces every subtree equal to `targets[i]` with a copy of
    /// `replacements[i]`. A replaced node keeps its own alias.
    pub fn replace(&mut self, targets: &[Self], replacements: &[Self]) {
        let hit = targets
            .iter()
            .position(|target| target == self)
            .and_then(|i| replacements.get(i));
        if let Some(replacement) = hit {
            let alias = self.alias.take();
            *self = replacement.clone();
            if alias.is_some() {
                self.alias = alias;
            }
            return;
        }
        for child in self.children_mut() {
            child.replace(targets, replacements);
        }
        self.refresh_aggregate();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::expression::{ColumnBinding, ColumnName, ComparisonOp};
    use crate::types::ArithmeticOp;

    fn col(name: &str) -> Expression {
        Expression::column(ColumnName::new(name))
    }

    fn bound(name: ColumnName, range: usize, column: usize) -> Expression {
        let mut expr = Expression::column(name);
        if let ExprKind::Column(c) = expr.kind_mut() {
            c.binding = Some(ColumnBinding {
                range,
                column,
                depth: 0,
                table: None,
            });
        }
        expr
    }

    #[test]
    fn test_kind_set() {
        assert!(KindSet::SUBQUERIES.contains(OpType::Exists));
        assert!(!KindSet::SUBQUERIES.contains(OpType::Column));
        assert!(KindSet::SUBQUERIES_AND_AGGREGATES.contains(OpType::Aggregate));
        assert!(!KindSet::EMPTY.contains(OpType::Value));
    }

    #[test]
    fn test_structural_equality() {
        let a = Expression::arithmetic(ArithmeticOp::Add, col("A"), Expression::integer(1));
        let b = Expression::arithmetic(ArithmeticOp::Add, col("A"), Expression::integer(1));
        let c = Expression::arithmetic(ArithmeticOp::Subtract, col("A"), Expression::integer(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_bound_columns_compare_by_binding() {
        let qualified = bound(ColumnName::qualified("T", "A"), 0, 0);
        let bare = bound(ColumnName::new("A"), 0, 0);
        let other = bound(ColumnName::new("A"), 1, 0);
        assert_eq!(qualified, bare);
        assert_ne!(bare, other);
    }

    #[test]
    fn test_equal_nodes_share_hash_slot() {
        let mut ids: HashMap<Expression, usize> = HashMap::new();
        ids.insert(
            Expression::compare(ComparisonOp::Equal, col("A"), Expression::integer(2)),
            1,
        );
        let probe = Expression::compare(ComparisonOp::Equal, col("A"), Expression::integer(2));
        assert_eq!(ids.get(&probe), Some(&1));
    }

    #[test]
    fn test_hash_follows_binding() {
        use std::hash::DefaultHasher;

        let hash = |expr: &Expression| {
            let mut hasher = DefaultHasher::new();
            expr.hash(&mut hasher);
            hasher.finish()
        };
        let left = bound(ColumnName::qualified("E", "ID"), 0, 0);
        let right = bound(ColumnName::qualified("D", "ID"), 1, 0);
        assert_ne!(hash(&left), hash(&right));
        assert_eq!(
            hash(&left),
            hash(&bound(ColumnName::new("ID"), 0, 0))
        );
        assert_ne!(left, col("ID"));
    }

    #[test]
    fn test_alias_does_not_affect_equality() {
        assert_eq!(col("A").with_alias("X"), col("A"));
    }

    #[test]
    fn test_is_composed_of() {
        let grouped = [col("A")];
        let expr = Expression::arithmetic(ArithmeticOp::Multiply, col("A"), Expression::integer(2));
        assert!(expr.is_composed_of(&grouped, KindSet::EMPTY));
        let other = Expression::arithmetic(ArithmeticOp::Multiply, col("B"), Expression::integer(2));
        assert!(!other.is_composed_of(&grouped, KindSet::EMPTY));
        assert!(Expression::integer(5).is_composed_of(&[], KindSet::EMPTY));
    }

    #[test]
    fn test_collect_children_first() {
        let expr = Expression::and(
            Expression::compare(ComparisonOp::Equal, col("A"), col("B")),
            Expression::is_null(col("C")),
        );
        let columns = expr.collect(KindSet::COLUMNS, KindSet::EMPTY);
        let names: Vec<_> = columns
            .iter()
            .filter_map(|e| e.as_column())
            .map(|c| c.name.column.as_str())
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn test_replace_keeps_alias() {
        let mut expr = Expression::arithmetic(ArithmeticOp::Add, col("A"), col("B")).with_alias("S");
        expr.replace(&[col("B")], &[Expression::integer(7)]);
        assert_eq!(
            expr,
            Expression::arithmetic(ArithmeticOp::Add, col("A"), Expression::integer(7))
        );
        assert_eq!(expr.alias(), Some("S"));
    }

    #[test]
    fn test_range_references() {
        let expr = Expression::compare(
            ComparisonOp::Equal,
            bound(ColumnName::new("A"), 0, 0),
            bound(ColumnName::new("B"), 2, 1),
        );
        assert_eq!(
            expr.collect_range_variables().into_iter().collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert!(expr.has_reference(2));
        assert!(!expr.has_reference(1));
    }
}
