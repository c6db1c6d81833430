//! Planner export.
//!
//! A resolved statement is handed to the planner as a tree of generic
//! [`ExportNode`] elements: a name, string attributes and ordered children.
//! Every expression element carries an `id` derived from the structure of the
//! expression, so structurally equal sub-expressions export the same id and
//! the planner can recognize them as shared.
//!
//! Kinds the planner cannot consume fail with [`CompileError::Export`].

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter, Write as _};
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::Serialize;
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::expression::{
    AggregateFunction, ComparisonOp, ExprKind, Expression, Literal, Quantifier, SortItem,
    SubqueryKind,
};
use crate::query::{QueryBody, QueryExpression, QuerySpecification, SelectItem, SetOperation, Slice};
use crate::range::{RangeSource, RangeVariable};
use crate::types::{ArithmeticOp, DataType};

/// One element of the export tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportNode {
    /// Element name.
    pub name: String,
    /// Attributes, sorted by key.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Child elements in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportNode>,
}

impl ExportNode {
    /// Creates an element with no attributes or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Returns the element with an attribute set.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Returns the element with a child appended.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// The value of attribute `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// The first child called `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Serializes the tree as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an export error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CompileError::Export(e.to_string()))
    }

    fn write_xml(&self, f: &mut Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{:indent$}<{}", "", self.name, indent = indent * 2)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"")?;
            for c in value.chars() {
                match c {
                    '&' => f.write_str("&amp;")?,
                    '<' => f.write_str("&lt;")?,
                    '>' => f.write_str("&gt;")?,
                    '"' => f.write_str("&quot;")?,
                    c => f.write_char(c)?,
                }
            }
            f.write_char('"')?;
        }
        if self.children.is_empty() {
            return f.write_str("/>\n");
        }
        f.write_str(">\n")?;
        for child in &self.children {
            child.write_xml(f, indent + 1)?;
        }
        writeln!(f, "{:indent$}</{}>", "", self.name, indent = indent * 2)
    }
}

/// Indented XML-like text.
impl Display for ExportNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_xml(f, 0)
    }
}

fn unsupported(description: &str) -> CompileError {
    CompileError::Export(description.to_string())
}

/// The structural id of an expression; equal expressions share it.
#[must_use]
pub fn structural_id(expr: &Expression) -> String {
    let mut hasher = DefaultHasher::new();
    expr.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn literal_text(literal: &Literal) -> Option<String> {
    Some(match literal {
        Literal::Null => return None,
        Literal::Boolean(v) => v.to_string(),
        Literal::Integer(v) => v.to_string(),
        Literal::Double(v) => v.to_string(),
        Literal::Binary(bytes) => bytes.iter().fold(String::new(), |mut hex, b| {
            hex.push_str(&format!("{b:02X}"));
            hex
        }),
        Literal::Decimal(text)
        | Literal::String(text)
        | Literal::Date(text)
        | Literal::Time(text)
        | Literal::Timestamp(text) => text.clone(),
    })
}

const fn comparison_optype(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Equal => "equal",
        ComparisonOp::NotEqual => "notequal",
        ComparisonOp::Less => "lessthan",
        ComparisonOp::LessOrEqual => "lessthanorequalto",
        ComparisonOp::Greater => "greaterthan",
        ComparisonOp::GreaterOrEqual => "greaterthanorequalto",
    }
}

const fn arithmetic_optype(op: ArithmeticOp) -> &'static str {
    match op {
        ArithmeticOp::Add => "add",
        ArithmeticOp::Subtract => "subtract",
        ArithmeticOp::Multiply => "multiply",
        ArithmeticOp::Divide => "divide",
    }
}

fn aggregate_optype(function: AggregateFunction) -> Result<&'static str> {
    Ok(match function {
        AggregateFunction::Count => "count",
        AggregateFunction::Sum => "sum",
        AggregateFunction::Min => "min",
        AggregateFunction::Max => "max",
        AggregateFunction::Avg => "avg",
        AggregateFunction::Every => "every",
        AggregateFunction::Some => "some",
        AggregateFunction::StddevPop => "stddevpop",
        AggregateFunction::StddevSamp => "stddevsamp",
        AggregateFunction::VarPop => "varpop",
        AggregateFunction::VarSamp => "varsamp",
        AggregateFunction::GroupConcat | AggregateFunction::ArrayAgg | AggregateFunction::Median => {
            return Err(CompileError::Export(format!(
                "the {} aggregate function",
                function.as_str()
            )))
        }
    })
}

fn operation(optype: &str) -> ExportNode {
    ExportNode::new("operation").with("optype", optype)
}

fn with_type(node: ExportNode, data_type: Option<&DataType>) -> ExportNode {
    match data_type {
        Some(t) => node.with("valuetype", t.type_name()),
        None => node,
    }
}

/// Exports one expression.
///
/// # Errors
///
/// Returns an export error naming the first unsupported kind found.
pub fn export_expression(expr: &Expression) -> Result<ExportNode> {
    let mut children = Vec::new();
    let node = match expr.kind() {
        ExprKind::Value(literal) => {
            let node = match expr.data_type() {
                Some(t) => ExportNode::new("value").with("valuetype", t.type_name()),
                None => ExportNode::new("value").with("valuetype", "NULL"),
            };
            match literal_text(literal) {
                Some(text) => node.with("value", text),
                None => node,
            }
        }
        ExprKind::Parameter(index) => with_type(
            ExportNode::new("value")
                .with("isparam", "true")
                .with("index", index.to_string()),
            expr.data_type(),
        ),
        ExprKind::Column(column) => {
            let mut node = ExportNode::new("columnref").with("column", column.name.column.clone());
            if let Some(qualifier) = &column.name.table {
                node = node.with("tablealias", qualifier.clone());
            }
            if let Some(binding) = &column.binding {
                node = node.with("index", binding.column.to_string());
                if let Some(table) = &binding.table {
                    node = node.with("table", table.name.clone());
                }
            }
            with_type(node, expr.data_type())
        }
        ExprKind::SimpleColumn(index) => {
            with_type(ExportNode::new("simplecolumn").with("index", index.to_string()), expr.data_type())
        }
        ExprKind::Asterisk => ExportNode::new("asterisk"),
        ExprKind::Row(fields) | ExprKind::ValueList(fields) => {
            for field in fields {
                children.push(export_expression(field)?);
            }
            ExportNode::new("row")
        }
        ExprKind::Array(_) => return Err(unsupported("ARRAY constructors")),
        ExprKind::Negate(operand) => {
            children.push(export_expression(operand)?);
            operation("negate")
        }
        ExprKind::Arithmetic { op, left, right } => {
            children.push(export_expression(left)?);
            children.push(export_expression(right)?);
            operation(arithmetic_optype(*op))
        }
        ExprKind::Concat { left, right } => {
            children.push(export_expression(left)?);
            children.push(export_expression(right)?);
            ExportNode::new("function").with("name", "concat")
        }
        ExprKind::Comparison {
            op,
            quantifier,
            left,
            right,
        } => {
            children.push(export_expression(left)?);
            children.push(export_expression(right)?);
            let node = operation(comparison_optype(*op));
            match quantifier {
                Some(Quantifier::Any) => node.with("opsubtype", "any"),
                Some(Quantifier::All) => node.with("opsubtype", "all"),
                None => node,
            }
        }
        ExprKind::NotDistinct { left, right } => {
            children.push(export_expression(left)?);
            children.push(export_expression(right)?);
            operation("notdistinct")
        }
        ExprKind::And(left, right) | ExprKind::Or(left, right) => {
            children.push(export_expression(left)?);
            children.push(export_expression(right)?);
            operation(if matches!(expr.kind(), ExprKind::And(..)) {
                "and"
            } else {
                "or"
            })
        }
        ExprKind::Not(operand) => {
            children.push(export_expression(operand)?);
            operation("not")
        }
        ExprKind::IsNull(operand) => {
            children.push(export_expression(operand)?);
            operation("is_null")
        }
        ExprKind::Like {
            value,
            pattern,
            escape,
        } => {
            children.push(export_expression(value)?);
            children.push(export_expression(pattern)?);
            if let Some(escape) = escape {
                children.push(export_expression(escape)?);
            }
            operation("like")
        }
        ExprKind::StartsWith { value, prefix } => {
            children.push(export_expression(value)?);
            children.push(export_expression(prefix)?);
            operation("startswith")
        }
        ExprKind::In { .. } => {
            return Err(unsupported(
                "the IN operator. Consider using an OR expression",
            ))
        }
        ExprKind::Exists(subquery) => {
            children.push(ExportNode::new("tablesubquery").with_child(export_query(&subquery.query)?));
            operation("exists")
        }
        ExprKind::Unique(_) => return Err(unsupported("the UNIQUE predicate")),
        ExprKind::Match { .. } => return Err(unsupported("the MATCH predicate")),
        ExprKind::Overlaps { .. } => return Err(unsupported("the OVERLAPS predicate")),
        ExprKind::CaseWhen {
            condition,
            alternative,
        } => {
            children.push(export_expression(condition)?);
            let pair = with_type(operation("operator_alternative"), expr.data_type())
                .with_child(export_expression(&alternative.then)?)
                .with_child(export_expression(&alternative.otherwise)?);
            children.push(pair);
            with_type(operation("operator_case_when"), expr.data_type())
        }
        ExprKind::Aggregate(call) => {
            children.push(export_expression(&call.argument)?);
            let node = ExportNode::new("aggregation").with("optype", aggregate_optype(call.function)?);
            let node = if call.distinct {
                node.with("distinct", "true")
            } else {
                node
            };
            with_type(node, expr.data_type())
        }
        ExprKind::Window(_) => return Err(unsupported("window functions")),
        ExprKind::Function(call) => {
            for argument in &call.arguments {
                children.push(export_expression(argument)?);
            }
            let name = call.function.as_str().to_lowercase();
            with_type(ExportNode::new("function").with("name", name), expr.data_type())
        }
        ExprKind::Routine(call) => {
            return Err(CompileError::Export(format!(
                "user-defined routine invocations ({})",
                call.name
            )))
        }
        ExprKind::Sequence(_) => return Err(unsupported("sequence types")),
        ExprKind::Cast { operand, target } => {
            children.push(export_expression(operand)?);
            operation("cast").with("valuetype", target.type_name())
        }
        ExprKind::Subquery { kind, query } => {
            let node = ExportNode::new("tablesubquery").with_child(export_query(&query.query)?);
            match kind {
                SubqueryKind::Scalar => node.with("kind", "scalar"),
                SubqueryKind::Row => node.with("kind", "row"),
                SubqueryKind::Table => node,
            }
        }
    };

    let mut node = node.with("id", structural_id(expr));
    if let Some(alias) = expr.alias() {
        node = node.with("alias", alias);
    }
    node.children.extend(children);
    Ok(node)
}

fn export_list(name: &str, exprs: &[Expression]) -> Result<ExportNode> {
    let mut node = ExportNode::new(name);
    for expr in exprs {
        node.children.push(export_expression(expr)?);
    }
    Ok(node)
}

fn export_order(order_by: &[SortItem]) -> Result<ExportNode> {
    let mut node = ExportNode::new("ordercolumns");
    for item in order_by {
        let mut key = ExportNode::new("orderby").with_child(export_expression(&item.expression)?);
        if item.is_descending() {
            key = key.with("desc", "true");
        }
        node.children.push(key);
    }
    Ok(node)
}

fn export_slice(slice: &Slice, node: &mut ExportNode) -> Result<()> {
    if let Some(limit) = &slice.limit {
        node.children.push(ExportNode::new("limit").with_child(export_expression(limit)?));
    }
    if let Some(offset) = &slice.offset {
        node.children.push(ExportNode::new("offset").with_child(export_expression(offset)?));
    }
    Ok(())
}

fn export_range(range: &RangeVariable) -> Result<ExportNode> {
    let mut node = ExportNode::new("tablescan").with("jointype", range.join.as_str().to_lowercase());
    match &range.source {
        RangeSource::Table(table) => {
            node = node.with("table", table.name.clone());
        }
        RangeSource::Cte { name, .. } => {
            node = node.with("table", name.clone()).with("cte", "true");
        }
        RangeSource::Derived(query) => {
            node.children.push(ExportNode::new("tablesubquery").with_child(export_query(query)?));
        }
    }
    if let Some(alias) = range.name() {
        node = node.with("tablealias", alias);
    }
    if let Some(condition) = &range.condition {
        node.children.push(ExportNode::new("joincond").with_child(export_expression(condition)?));
    }
    Ok(node)
}

fn export_select(spec: &QuerySpecification) -> Result<ExportNode> {
    let mut node = ExportNode::new("select");
    if spec.distinct {
        node = node.with("distinct", "true");
    }
    let mut columns = ExportNode::new("columns");
    for item in &spec.items {
        match item {
            SelectItem::Expression(expr) => columns.children.push(export_expression(expr)?),
            SelectItem::Wildcard(_) => columns.children.push(ExportNode::new("asterisk")),
        }
    }
    node.children.push(columns);

    if !spec.from.is_empty() {
        let mut scans = ExportNode::new("tablescans");
        for range in &spec.from {
            scans.children.push(export_range(range)?);
        }
        node.children.push(scans);
    }

    if let Some(condition) = &spec.where_clause {
        node.children.push(ExportNode::new("querycondition").with_child(export_expression(condition)?));
    }
    if !spec.group_by.is_empty() {
        node.children.push(export_list("groupcolumns", &spec.group_by)?);
    }
    if let Some(having) = &spec.having {
        node.children.push(ExportNode::new("having").with_child(export_expression(having)?));
    }
    Ok(node)
}

fn export_set_operation(op: &SetOperation) -> Result<ExportNode> {
    let mut node = ExportNode::new("union").with("optype", op.operator.as_str().to_lowercase());
    if op.all {
        node = node.with("all", "true");
    }
    if op.corresponding.is_some() {
        let names: Vec<&str> = op
            .left_columns
            .iter()
            .filter_map(|&i| op.left.columns.get(i))
            .map(|c| c.name.as_str())
            .collect();
        node = node.with("corresponding", names.join(","));
    }
    node.children.push(export_query(&op.left)?);
    node.children.push(export_query(&op.right)?);
    Ok(node)
}

/// Exports a resolved query expression.
///
/// # Errors
///
/// Returns an export error naming the first unsupported kind found.
pub fn export_query(query: &QueryExpression) -> Result<ExportNode> {
    let mut node = match &query.body {
        QueryBody::Select(spec) => export_select(spec)?,
        QueryBody::Values(rows) => export_list("values", rows)?,
        QueryBody::SetOperation(op) => export_set_operation(op)?,
    };
    if !query.with.is_empty() {
        let mut with = ExportNode::new("with");
        for cte in &query.with {
            let mut element = ExportNode::new("withitem").with("name", cte.name.clone());
            if cte.recursive {
                element = element.with("recursive", "true");
            }
            with.children.push(element.with_child(export_query(&cte.query)?));
        }
        node.children.insert(0, with);
    }
    if !query.order_by.is_empty() {
        node.children.push(export_order(&query.order_by)?);
    }
    if let Some(slice) = &query.slice {
        export_slice(slice, &mut node)?;
    }
    Ok(node)
}

/// Exports a statement: the query plus its parameter list.
///
/// # Errors
///
/// Returns an export error naming the first unsupported kind found.
pub fn export_statement(query: &QueryExpression, parameters: &[DataType]) -> Result<ExportNode> {
    let mut node = export_query(query)?;
    let mut list = ExportNode::new("parameters");
    for (index, data_type) in parameters.iter().enumerate() {
        list.children.push(
            ExportNode::new("parameter")
                .with("index", index.to_string())
                .with("valuetype", data_type.type_name()),
        );
    }
    node.children.push(list);
    debug!(root = %node.name, parameters = parameters.len(), "exported statement");
    Ok(node)
}
