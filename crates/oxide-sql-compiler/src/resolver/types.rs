//! Bottom-up type inference.
//!
//! Each node is typed after its children. Untyped parameters and NULLs adopt
//! the type their context demands. Type errors are recorded on the resolver
//! and inference carries on, so one statement reports all of them at once.

use crate::error::{CompileError, ErrorCode};
use crate::expression::{
    AggregateCall, AggregateFunction, ExprKind, Expression, Literal, OpType, ScalarFunction,
    SubqueryKind, WindowFunction,
};
use crate::types::{DataType, DEFAULT_VARYING_LENGTH, MAX_DECIMAL_PRECISION};

use super::Resolver;

fn type_of(expr: &Expression) -> Option<DataType> {
    expr.data_type().cloned()
}

fn varchar() -> DataType {
    DataType::Varchar(DEFAULT_VARYING_LENGTH)
}

/// An untyped `?` or NULL, whose type comes from its context.
pub(super) fn is_untyped(expr: &Expression) -> bool {
    expr.data_type().is_none()
        && matches!(
            expr.kind(),
            ExprKind::Parameter(_) | ExprKind::Value(Literal::Null)
        )
}

/// Gives an untyped node the type of its context.
pub(super) fn adopt(expr: &mut Expression, data_type: Option<&DataType>) {
    if let Some(data_type) = data_type {
        if is_untyped(expr) {
            expr.set_data_type(Some(data_type.clone()));
        }
    }
}

/// Per-position types of a row-shaped node; a scalar is a row of one.
pub(super) fn row_types(expr: &Expression) -> Vec<Option<DataType>> {
    match expr.kind() {
        ExprKind::Row(fields) => fields.iter().map(type_of).collect(),
        ExprKind::Subquery {
            kind: SubqueryKind::Row | SubqueryKind::Table,
            query,
        } => query.query.column_types(),
        _ => vec![type_of(expr)],
    }
}

/// Type of position `index` of a row-shaped node.
pub(super) fn field_type(expr: &Expression, index: usize) -> Option<DataType> {
    row_types(expr).get(index).cloned().flatten()
}

/// Lets the untyped fields of a row adopt `types`.
pub(super) fn adopt_row(expr: &mut Expression, types: &[Option<DataType>]) {
    if let ExprKind::Row(fields) = expr.kind_mut() {
        for (field, data_type) in fields.iter_mut().zip(types) {
            adopt(field, data_type.as_ref());
        }
        let node_types = fields.iter().map(type_of).collect();
        expr.set_node_types(node_types);
    } else if let [data_type] = types {
        adopt(expr, data_type.as_ref());
    }
}

/// Lets the untyped field at `index` adopt `data_type`.
pub(super) fn adopt_field(expr: &mut Expression, index: usize, data_type: Option<&DataType>) {
    if let ExprKind::Row(fields) = expr.kind_mut() {
        if let Some(field) = fields.get_mut(index) {
            adopt(field, data_type);
        }
        let node_types = fields.iter().map(type_of).collect();
        expr.set_node_types(node_types);
    } else if index == 0 {
        adopt(expr, data_type);
    }
}

fn operation_error(message: impl Into<String>) -> CompileError {
    CompileError::type_error(ErrorCode::IncompatibleOperation, message)
}

fn degree_error(left: usize, right: usize) -> CompileError {
    CompileError::type_error(
        ErrorCode::DegreeMismatch,
        format!("row column count mismatch: {left} and {right}"),
    )
}

/// Result type of an aggregate over an argument of type `argument`.
pub(super) fn aggregate_result(
    function: AggregateFunction,
    argument: Option<&DataType>,
) -> Result<Option<DataType>, CompileError> {
    use AggregateFunction as F;

    if function == F::Count {
        return Ok(Some(DataType::BigInt));
    }
    if function == F::GroupConcat {
        return Ok(Some(varchar()));
    }
    let Some(argument) = argument else {
        return Ok(None);
    };
    let numeric = || {
        if argument.is_numeric() {
            Ok(())
        } else {
            Err(operation_error(format!(
                "{} requires a numeric argument, found {argument}",
                function.as_str()
            )))
        }
    };
    Ok(Some(match function {
        F::Sum => {
            numeric()?;
            match argument {
                DataType::TinyInt | DataType::SmallInt | DataType::Integer => DataType::BigInt,
                DataType::Double => DataType::Double,
                other => DataType::Decimal {
                    precision: MAX_DECIMAL_PRECISION,
                    scale: other.scale(),
                },
            }
        }
        F::Avg | F::Median => {
            numeric()?;
            argument.clone()
        }
        F::StddevPop | F::StddevSamp | F::VarPop | F::VarSamp => {
            numeric()?;
            DataType::Double
        }
        F::Every | F::Some => {
            if !argument.is_boolean() {
                return Err(operation_error(format!(
                    "{} requires a boolean argument, found {argument}",
                    function.as_str()
                )));
            }
            DataType::Boolean
        }
        F::ArrayAgg => DataType::Array(Box::new(argument.clone())),
        F::Min | F::Max | F::Count | F::GroupConcat => argument.clone(),
    }))
}

impl Resolver {
    pub(super) fn record_error(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    /// Aggregate type of several values; unknown types are skipped.
    pub(super) fn aggregate_all(
        &mut self,
        types: impl IntoIterator<Item = Option<DataType>>,
    ) -> Option<DataType> {
        let mut result: Option<DataType> = None;
        for data_type in types.into_iter().flatten() {
            result = Some(match result {
                None => data_type,
                Some(current) => match current.aggregate_type(&data_type) {
                    Ok(aggregated) => aggregated,
                    Err(e) => {
                        self.record_error(e);
                        return None;
                    }
                },
            });
        }
        result
    }

    /// Reports a non-boolean condition; an untyped one becomes BOOLEAN.
    pub(super) fn require_boolean(&mut self, expr: &mut Expression, clause: &str) {
        if is_untyped(expr) {
            expr.set_data_type(Some(DataType::Boolean));
            return;
        }
        if let Some(data_type) = expr.data_type() {
            if !data_type.is_boolean() {
                let message = format!("boolean expression required in {clause}, found {data_type}");
                self.record_error(CompileError::type_error(ErrorCode::BooleanRequired, message));
            }
        }
    }

    fn require_character(&mut self, expr: &mut Expression, operation: &str) {
        adopt(expr, Some(&varchar()));
        if let Some(data_type) = expr.data_type() {
            if !data_type.is_character() {
                let message = format!("{operation} requires character operands, found {data_type}");
                self.record_error(operation_error(message));
            }
        }
    }

    fn require_numeric(&mut self, expr: &Expression, operation: &str) -> Option<DataType> {
        let data_type = type_of(expr)?;
        if data_type.is_numeric() {
            return Some(data_type);
        }
        let message = format!("{operation} requires a numeric operand, found {data_type}");
        self.record_error(operation_error(message));
        None
    }

    /// Checks that two row-shaped operands line up and are pairwise
    /// comparable. Untyped positions on either side adopt the other side.
    pub(super) fn compare_operands(&mut self, left: &mut Expression, right: &mut Expression) {
        let (left_types, right_types) = (row_types(left), row_types(right));
        if left_types.len() != right_types.len() {
            self.record_error(degree_error(left_types.len(), right_types.len()));
            return;
        }
        adopt_row(left, &right_types);
        adopt_row(right, &left_types);
        for (a, b) in left_types.iter().zip(&right_types) {
            if let (Some(a), Some(b)) = (a, b) {
                if let Err(e) = a.check_comparable(b) {
                    self.record_error(e);
                }
            }
        }
    }

    fn compare_quantified(&mut self, left: &mut Expression, right: &mut Expression) {
        match right.op_type() {
            OpType::Parameter => {
                if let Some(element) = type_of(left) {
                    adopt(right, Some(&DataType::Array(Box::new(element))));
                }
            }
            OpType::ValueList => {
                if let ExprKind::ValueList(values) = right.kind_mut() {
                    for value in values.iter_mut() {
                        self.compare_operands(left, value);
                    }
                }
                let types: Vec<_> = right.children().into_iter().map(type_of).collect();
                let data_type = self.aggregate_all(types);
                right.set_data_type(data_type);
            }
            _ => self.compare_operands(left, right),
        }
    }

    /// Types one node whose children are already typed.
    pub(super) fn infer_type(&mut self, expr: &mut Expression) {
        let data_type = match expr.kind_mut() {
            ExprKind::Value(_)
            | ExprKind::Parameter(_)
            | ExprKind::Column(_)
            | ExprKind::SimpleColumn(_)
            | ExprKind::Sequence(_) => return,
            ExprKind::Asterisk => None,
            ExprKind::Row(fields) => {
                let node_types = fields.iter().map(type_of).collect();
                expr.set_node_types(node_types);
                return;
            }
            ExprKind::Array(elements) => {
                let types: Vec<_> = elements.iter().map(type_of).collect();
                let element = self.aggregate_all(types);
                for e in elements.iter_mut() {
                    adopt(e, element.as_ref());
                }
                element.map(|t| DataType::Array(Box::new(t)))
            }
            ExprKind::ValueList(values) => {
                let degree = values.first().map_or(1, Expression::degree);
                if values.iter().any(|v| v.degree() != degree) {
                    self.record_error(CompileError::type_error(
                        ErrorCode::DegreeMismatch,
                        "value list rows differ in column count",
                    ));
                    return;
                }
                let mut node_types = Vec::with_capacity(degree);
                for index in 0..degree {
                    let types: Vec<_> = values.iter().map(|v| field_type(v, index)).collect();
                    let data_type = self.aggregate_all(types);
                    for value in values.iter_mut() {
                        adopt_field(value, index, data_type.as_ref());
                    }
                    node_types.push(data_type);
                }
                let scalar = if degree == 1 {
                    node_types.first().cloned().flatten()
                } else {
                    None
                };
                expr.set_node_types(node_types);
                scalar
            }
            ExprKind::Negate(operand) => self.require_numeric(operand, "unary minus"),
            ExprKind::Arithmetic { op, left, right } => {
                adopt(left, right.data_type());
                adopt(right, left.data_type());
                match (left.data_type(), right.data_type()) {
                    (Some(a), Some(b)) if !a.is_numeric() || !b.is_numeric() => {
                        let message = format!(
                            "incompatible data types in operation: {a} {} {b}",
                            op.as_str()
                        );
                        self.record_error(operation_error(message));
                        None
                    }
                    (Some(a), Some(b)) => match a.combined_type(*op, b) {
                        Ok(t) => Some(t),
                        Err(e) => {
                            self.record_error(e);
                            None
                        }
                    },
                    _ => None,
                }
            }
            ExprKind::Concat { left, right } => {
                adopt(left, right.data_type().filter(|t| t.is_character()));
                adopt(right, left.data_type().filter(|t| t.is_character()));
                adopt(left, Some(&varchar()));
                adopt(right, Some(&varchar()));
                concat_type(left.data_type(), right.data_type())
                    .map_err(|message| self.record_error(operation_error(message)))
                    .ok()
                    .flatten()
            }
            ExprKind::Comparison {
                quantifier,
                left,
                right,
                ..
            } => {
                if quantifier.is_some() {
                    self.compare_quantified(left, right);
                } else {
                    self.compare_operands(left, right);
                }
                Some(DataType::Boolean)
            }
            ExprKind::NotDistinct { left, right } => {
                self.compare_operands(left, right);
                Some(DataType::Boolean)
            }
            ExprKind::And(left, right) | ExprKind::Or(left, right) => {
                self.require_boolean(left, "a logical operation");
                self.require_boolean(right, "a logical operation");
                Some(DataType::Boolean)
            }
            ExprKind::Not(operand) => {
                self.require_boolean(operand, "NOT");
                Some(DataType::Boolean)
            }
            ExprKind::IsNull(_) | ExprKind::Exists(_) | ExprKind::Unique(_) => {
                Some(DataType::Boolean)
            }
            ExprKind::Like {
                value,
                pattern,
                escape,
            } => {
                self.require_character(value, "LIKE");
                self.require_character(pattern, "LIKE");
                if let Some(escape) = escape {
                    self.require_character(escape, "ESCAPE");
                }
                Some(DataType::Boolean)
            }
            ExprKind::StartsWith { value, prefix } => {
                self.require_character(value, "STARTS WITH");
                self.require_character(prefix, "STARTS WITH");
                Some(DataType::Boolean)
            }
            ExprKind::In { value, list } => {
                for candidate in list.iter_mut() {
                    self.compare_operands(value, candidate);
                }
                Some(DataType::Boolean)
            }
            ExprKind::Match { value, query, .. } => {
                let (left, right) = (value.degree(), query.query.degree());
                if left != right {
                    self.record_error(degree_error(left, right));
                }
                Some(DataType::Boolean)
            }
            ExprKind::Overlaps { left, right } => {
                for period in [left, right] {
                    let types = row_types(period);
                    if types.len() != 2 {
                        self.record_error(degree_error(types.len(), 2));
                        continue;
                    }
                    let start = types.first().cloned().flatten();
                    if let Some(start) = &start {
                        if !start.is_datetime() {
                            let message = format!("OVERLAPS requires datetime periods, found {start}");
                            self.record_error(operation_error(message));
                        }
                    }
                    adopt_row(period, &[start.clone(), start]);
                }
                Some(DataType::Boolean)
            }
            ExprKind::CaseWhen {
                condition,
                alternative,
            } => {
                self.require_boolean(condition, "CASE");
                let result = self.aggregate_all([
                    type_of(&alternative.then),
                    type_of(&alternative.otherwise),
                ]);
                adopt(&mut alternative.then, result.as_ref());
                adopt(&mut alternative.otherwise, result.as_ref());
                result
            }
            ExprKind::Aggregate(call) => self.aggregate_call_type(call),
            ExprKind::Window(call) => match &call.function {
                WindowFunction::Rank | WindowFunction::DenseRank | WindowFunction::RowNumber => {
                    Some(DataType::BigInt)
                }
                WindowFunction::Aggregate(inner) => self.aggregate_call_type(inner),
            },
            ExprKind::Function(call) => self.function_type(call.function, &mut call.arguments),
            ExprKind::Routine(call) => {
                for (argument, declared) in call.arguments.iter_mut().zip(&call.parameter_types) {
                    adopt(argument, Some(declared));
                    if let Some(actual) = argument.data_type() {
                        if let Err(e) = actual.check_castable(declared) {
                            self.record_error(e);
                        }
                    }
                }
                Some(call.return_type.clone())
            }
            ExprKind::Cast { operand, target } => {
                adopt(operand, Some(&*target));
                if let Some(source) = operand.data_type() {
                    if let Err(e) = source.check_castable(target) {
                        self.record_error(e);
                    }
                }
                Some(target.clone())
            }
            ExprKind::Subquery { kind, query } => {
                let kind = *kind;
                let types = query.query.column_types();
                match kind {
                    SubqueryKind::Scalar => types.into_iter().next().flatten(),
                    SubqueryKind::Row | SubqueryKind::Table => {
                        let scalar = match types.as_slice() {
                            [single] => single.clone(),
                            _ => None,
                        };
                        expr.set_node_types(types);
                        scalar
                    }
                }
            }
        };
        expr.set_data_type(data_type);
    }

    fn aggregate_call_type(&mut self, call: &AggregateCall) -> Option<DataType> {
        match aggregate_result(call.function, call.argument.data_type()) {
            Ok(data_type) => data_type,
            Err(e) => {
                self.record_error(e);
                None
            }
        }
    }

    fn function_type(
        &mut self,
        function: ScalarFunction,
        arguments: &mut [Expression],
    ) -> Option<DataType> {
        use ScalarFunction as F;

        match function {
            F::CurrentDate => Some(DataType::Date),
            F::CurrentTime => Some(DataType::Time),
            F::CurrentTimestamp => Some(DataType::Timestamp),
            F::Abs => self.require_numeric(arguments.first()?, function.as_str()),
            F::Floor | F::Ceiling => {
                match self.require_numeric(arguments.first()?, function.as_str())? {
                    DataType::Decimal { precision, .. } => Some(DataType::Decimal {
                        precision,
                        scale: 0,
                    }),
                    other => Some(other),
                }
            }
            F::Mod => {
                let mut types = Vec::with_capacity(arguments.len());
                for argument in arguments.iter() {
                    types.push(self.require_numeric(argument, function.as_str()));
                }
                self.aggregate_all(types)
            }
            F::Power | F::Sqrt => {
                for argument in arguments.iter_mut() {
                    adopt(argument, Some(&DataType::Double));
                    self.require_numeric(argument, function.as_str());
                }
                Some(DataType::Double)
            }
            F::Upper | F::Lower | F::Trim => {
                let argument = arguments.first_mut()?;
                self.require_character(argument, function.as_str());
                type_of(argument).filter(DataType::is_character)
            }
            F::CharLength | F::OctetLength => {
                if let Some(argument) = arguments.first_mut() {
                    adopt(argument, Some(&varchar()));
                }
                Some(DataType::Integer)
            }
            F::Substring => {
                let (source, bounds) = arguments.split_first_mut()?;
                self.require_character(source, function.as_str());
                for bound in bounds {
                    adopt(bound, Some(&DataType::Integer));
                    self.require_numeric(bound, function.as_str());
                }
                match type_of(source)? {
                    DataType::Clob => Some(DataType::Clob),
                    other if other.is_character() => Some(DataType::Varchar(other.precision())),
                    _ => None,
                }
            }
            F::Concat => {
                let mut result = Some(DataType::Varchar(0));
                for argument in arguments.iter_mut() {
                    adopt(argument, Some(&varchar()));
                    result = match concat_type(result.as_ref(), argument.data_type()) {
                        Ok(t) => t,
                        Err(message) => {
                            self.record_error(operation_error(message));
                            return None;
                        }
                    };
                }
                result
            }
        }
    }
}

/// Result type of `left || right`.
///
/// Two character or two binary strings keep their family; a character string
/// combined with any other value produces a character string.
fn concat_type(
    left: Option<&DataType>,
    right: Option<&DataType>,
) -> Result<Option<DataType>, String> {
    let (Some(left), Some(right)) = (left, right) else {
        return Ok(None);
    };
    let length = left
        .precision()
        .saturating_add(right.precision())
        .min(DEFAULT_VARYING_LENGTH);
    Ok(Some(match (left, right) {
        (DataType::Clob, _) | (_, DataType::Clob) => DataType::Clob,
        (DataType::Blob, _) | (_, DataType::Blob) => DataType::Blob,
        (a, b) if a.is_character() && b.is_character() => DataType::Varchar(length),
        (a, b) if a.is_binary() && b.is_binary() => DataType::Varbinary(length),
        (a, b) if a.is_character() || b.is_character() => varchar(),
        (a, b) => return Err(format!("incompatible data types in concatenation: {a} || {b}")),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_result_types() {
        assert_eq!(
            aggregate_result(AggregateFunction::Count, None).unwrap(),
            Some(DataType::BigInt)
        );
        assert_eq!(
            aggregate_result(AggregateFunction::Sum, Some(&DataType::Integer)).unwrap(),
            Some(DataType::BigInt)
        );
        assert_eq!(
            aggregate_result(AggregateFunction::Max, Some(&DataType::Varchar(5))).unwrap(),
            Some(DataType::Varchar(5))
        );
        assert_eq!(
            aggregate_result(AggregateFunction::VarPop, Some(&DataType::Integer)).unwrap(),
            Some(DataType::Double)
        );
    }

    #[test]
    fn test_aggregate_argument_errors() {
        let err = aggregate_result(AggregateFunction::Sum, Some(&DataType::Varchar(5))).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::IncompatibleOperation));
        let err = aggregate_result(AggregateFunction::Every, Some(&DataType::Integer)).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::IncompatibleOperation));
    }

    #[test]
    fn test_concat_type() {
        assert_eq!(
            concat_type(Some(&DataType::Char(2)), Some(&DataType::Varchar(3))),
            Ok(Some(DataType::Varchar(5)))
        );
        assert_eq!(
            concat_type(Some(&DataType::Integer), Some(&DataType::Char(2))),
            Ok(Some(varchar()))
        );
        assert!(concat_type(Some(&DataType::Integer), Some(&DataType::Date)).is_err());
    }

    #[test]
    fn test_parameter_adopts_arithmetic_operand() {
        let mut resolver = Resolver::new();
        let mut expr = Expression::arithmetic(
            crate::types::ArithmeticOp::Add,
            Expression::parameter(0),
            Expression::integer(1),
        );
        for child in expr.children_mut() {
            resolver.infer_type(child);
        }
        resolver.infer_type(&mut expr);
        assert_eq!(expr.children()[0].data_type(), Some(&DataType::Integer));
        assert_eq!(expr.data_type(), Some(&DataType::BigInt));
        assert!(resolver.errors.is_empty());
    }

    #[test]
    fn test_non_boolean_operand_is_recorded() {
        let mut resolver = Resolver::new();
        let mut expr = Expression::and(Expression::integer(1), Expression::boolean(true));
        resolver.infer_type(&mut expr);
        assert_eq!(resolver.errors.len(), 1);
        assert_eq!(resolver.errors[0].code(), Some(ErrorCode::BooleanRequired));
        assert_eq!(expr.data_type(), Some(&DataType::Boolean));
    }

    #[test]
    fn test_row_comparison_degree_mismatch() {
        let mut resolver = Resolver::new();
        let mut expr = Expression::compare(
            crate::expression::ComparisonOp::Equal,
            Expression::row(vec![Expression::integer(1), Expression::integer(2)]),
            Expression::row(vec![Expression::integer(1)]),
        );
        resolver.infer_type(&mut expr);
        assert_eq!(resolver.errors[0].code(), Some(ErrorCode::DegreeMismatch));
    }
}
