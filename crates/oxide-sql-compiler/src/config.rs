//! Compilation options.

use serde::Deserialize;

/// Options that shape how one statement is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Maximum parenthesis/subquery nesting before compilation is refused.
    pub max_depth: usize,
    /// Schema used for unqualified table, sequence and routine names.
    pub default_schema: String,
    /// Compile boolean expressions as CHECK/trigger predicates.
    ///
    /// In this mode `x IN (list)` stays a literal IN node instead of becoming
    /// `x = ANY (list)`.
    pub constraint_context: bool,
}

impl CompileOptions {
    /// Options for compiling a CHECK constraint or trigger predicate.
    #[must_use]
    pub fn for_constraint() -> Self {
        Self {
            constraint_context: true,
            ..Self::default()
        }
    }

    /// Sets the default schema.
    #[must_use]
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: 200,
            default_schema: String::from("PUBLIC"),
            constraint_context: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::default();
        assert_eq!(options.max_depth, 200);
        assert_eq!(options.default_schema, "PUBLIC");
        assert!(!options.constraint_context);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options: CompileOptions =
            serde_json::from_str(r#"{"constraint_context": true}"#).unwrap();
        assert!(options.constraint_context);
        assert_eq!(options.max_depth, 200);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_str::<CompileOptions>(r#"{"depth": 3}"#).is_err());
    }
}
