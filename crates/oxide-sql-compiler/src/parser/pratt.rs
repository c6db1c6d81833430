//! Binding powers for the numeric/string operator cascade.

use crate::expression::ComparisonOp;
use crate::lexer::TokenKind;
use crate::types::ArithmeticOp;

/// Binding power of unary `+` and `-`.
pub const PREFIX_BINDING_POWER: u8 = 5;

/// Returns the infix binding power for a token.
///
/// Returns `(left_bp, right_bp)` where:
/// - Higher binding power = binds tighter
/// - Left associative: left_bp < right_bp
///
/// Returns `None` if the token is not an infix value operator. Comparisons and
/// AND/OR are handled by the predicate levels, not here.
#[must_use]
pub const fn infix_binding_power(kind: &TokenKind) -> Option<(u8, u8)> {
    match kind {
        // Additive level, concatenation included
        TokenKind::Plus | TokenKind::Minus | TokenKind::Concat => Some((1, 2)),
        // Multiplicative level
        TokenKind::Star | TokenKind::Slash => Some((3, 4)),
        _ => None,
    }
}

/// Returns true for tokens that can be a unary sign.
#[must_use]
pub const fn is_sign(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Plus | TokenKind::Minus)
}

/// Converts an infix token to its arithmetic operator; `||` is not arithmetic.
#[must_use]
pub const fn arithmetic_op(kind: &TokenKind) -> Option<ArithmeticOp> {
    match kind {
        TokenKind::Plus => Some(ArithmeticOp::Add),
        TokenKind::Minus => Some(ArithmeticOp::Subtract),
        TokenKind::Star => Some(ArithmeticOp::Multiply),
        TokenKind::Slash => Some(ArithmeticOp::Divide),
        _ => None,
    }
}

/// Converts a token to a comparison operator.
#[must_use]
pub const fn comparison_op(kind: &TokenKind) -> Option<ComparisonOp> {
    match kind {
        TokenKind::Eq => Some(ComparisonOp::Equal),
        TokenKind::NotEq => Some(ComparisonOp::NotEqual),
        TokenKind::Lt => Some(ComparisonOp::Less),
        TokenKind::LtEq => Some(ComparisonOp::LessOrEqual),
        TokenKind::Gt => Some(ComparisonOp::Greater),
        TokenKind::GtEq => Some(ComparisonOp::GreaterOrEqual),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        let additive = infix_binding_power(&TokenKind::Plus).unwrap();
        let concat = infix_binding_power(&TokenKind::Concat).unwrap();
        let multiplicative = infix_binding_power(&TokenKind::Star).unwrap();
        assert_eq!(additive, concat);
        assert!(multiplicative.0 > additive.1);
        assert!(PREFIX_BINDING_POWER > multiplicative.1);
    }

    #[test]
    fn test_left_associativity() {
        let (l, r) = infix_binding_power(&TokenKind::Minus).unwrap();
        assert!(l < r);
    }

    #[test]
    fn test_not_infix() {
        assert!(infix_binding_power(&TokenKind::Eq).is_none());
        assert!(infix_binding_power(&TokenKind::Comma).is_none());
    }

    #[test]
    fn test_operator_mapping() {
        assert_eq!(arithmetic_op(&TokenKind::Slash), Some(ArithmeticOp::Divide));
        assert_eq!(arithmetic_op(&TokenKind::Concat), None);
        assert_eq!(comparison_op(&TokenKind::GtEq), Some(ComparisonOp::GreaterOrEqual));
        assert!(is_sign(&TokenKind::Minus));
    }
}
