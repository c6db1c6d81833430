//! Planner export of compiled statements.

mod common;
use common::*;

use oxide_sql_compiler::expression::ObjectName;
use oxide_sql_compiler::{compile_condition, CompileError, CompileOptions, ExportNode};

fn export(sql: &str) -> ExportNode {
    compile(sql)
        .export()
        .unwrap_or_else(|e| panic!("Failed to export: {sql}\nError: {e}"))
}

fn names(node: &ExportNode) -> Vec<&str> {
    node.children.iter().map(|c| c.name.as_str()).collect()
}

// ===================================================================
// Statement shape
// ===================================================================

#[test]
fn select_elements() {
    let root = export("SELECT NAME FROM EMP WHERE ID = ? ORDER BY NAME DESC LIMIT 5");
    assert_eq!(root.name, "select");
    assert_eq!(
        names(&root),
        vec!["columns", "tablescans", "querycondition", "ordercolumns", "limit", "parameters"]
    );

    let scan = &root.child("tablescans").unwrap().children[0];
    assert_eq!(scan.attribute("table"), Some("EMP"));
    assert_eq!(scan.attribute("tablealias"), Some("EMP"));

    let condition = &root.child("querycondition").unwrap().children[0];
    assert_eq!(condition.attribute("optype"), Some("equal"));

    let order = &root.child("ordercolumns").unwrap().children[0];
    assert_eq!(order.attribute("desc"), Some("true"));

    let parameter = &root.child("parameters").unwrap().children[0];
    assert_eq!(parameter.attribute("valuetype"), Some("INTEGER"));
}

#[test]
fn union_element() {
    let root = export("SELECT ID FROM EMP UNION ALL SELECT ID FROM DEPT");
    assert_eq!(root.name, "union");
    assert_eq!(root.attribute("optype"), Some("union"));
    assert_eq!(root.attribute("all"), Some("true"));
    assert_eq!(names(&root), vec!["select", "select", "parameters"]);
}

#[test]
fn select_without_from_has_no_scans() {
    let root = export("SELECT 1 + 2");
    assert_eq!(names(&root), vec!["columns", "parameters"]);
}

#[test]
fn join_condition_is_nested_in_scan() {
    let root = export("SELECT E.NAME FROM EMP E LEFT JOIN DEPT D ON E.DEPT = D.ID");
    let scans = root.child("tablescans").unwrap();
    assert_eq!(scans.children.len(), 2);
    assert_eq!(scans.children[1].attribute("jointype"), Some("left"));
    assert_eq!(scans.children[1].attribute("tablealias"), Some("D"));
    assert!(scans.children[1].child("joincond").is_some());
}

// ===================================================================
// Expressions
// ===================================================================

#[test]
fn equal_expressions_share_ids() {
    let root = export("SELECT ID + 1, ID + 1, ID + 2 FROM EMP");
    let columns = &root.child("columns").unwrap().children;
    assert_eq!(columns[0].attribute("id"), columns[1].attribute("id"));
    assert_ne!(columns[0].attribute("id"), columns[2].attribute("id"));
}

#[test]
fn columns_of_different_ranges_have_different_ids() {
    let root = export("SELECT E.ID, D.ID FROM EMP E JOIN DEPT D ON E.ID = D.ID");
    let columns = &root.child("columns").unwrap().children;
    assert_eq!(columns[0].name, "columnref");
    assert_ne!(columns[0].attribute("id"), columns[1].attribute("id"));
}

#[test]
fn different_subqueries_have_different_ids() {
    let root = export("SELECT (SELECT MAX(A) FROM T), (SELECT MIN(C) FROM T) FROM T");
    let columns = &root.child("columns").unwrap().children;
    assert_eq!(columns[0].name, "tablesubquery");
    assert_ne!(columns[0].attribute("id"), columns[1].attribute("id"));
}

#[test]
fn quantifier_and_cast_target_change_ids() {
    let root = export(
        "SELECT ID FROM EMP WHERE ID = ANY (SELECT ID FROM DEPT) AND ID = ALL (SELECT ID FROM DEPT)",
    );
    let both = &root.child("querycondition").unwrap().children[0];
    assert_eq!(both.attribute("optype"), Some("and"));
    assert_ne!(both.children[0].attribute("id"), both.children[1].attribute("id"));

    let root = export("SELECT CAST(DEPT AS INTEGER), CAST(DEPT AS BIGINT) FROM EMP");
    let columns = &root.child("columns").unwrap().children;
    assert_ne!(columns[0].attribute("id"), columns[1].attribute("id"));
}

#[test]
fn quantified_comparison_subtype() {
    let root = export("SELECT ID FROM EMP WHERE ID = ANY (SELECT ID FROM DEPT)");
    let condition = &root.child("querycondition").unwrap().children[0];
    assert_eq!(condition.attribute("opsubtype"), Some("any"));
    assert_eq!(condition.children[1].name, "tablesubquery");
}

#[test]
fn distinct_aggregate() {
    let root = export("SELECT COUNT(DISTINCT DEPT) FROM EMP");
    let aggregate = &root.child("columns").unwrap().children[0];
    assert_eq!(aggregate.name, "aggregation");
    assert_eq!(aggregate.attribute("optype"), Some("count"));
    assert_eq!(aggregate.attribute("distinct"), Some("true"));
}

// ===================================================================
// Unsupported kinds
// ===================================================================

#[test]
fn sequence_is_unsupported() {
    let err = compile("SELECT NEXT VALUE FOR SEQ FROM EMP").export().unwrap_err();
    assert_eq!(err, CompileError::Export("sequence types".into()));
    assert_eq!(err.to_string(), "Unsupported expression: sequence types");
}

#[test]
fn literal_in_is_unsupported() {
    let compiled = compile_condition(
        "A IN (1, 2)",
        &ObjectName::new("T"),
        &catalog(),
        &CompileOptions::for_constraint(),
    )
    .unwrap();
    let err = compiled.export().unwrap_err();
    assert!(err.to_string().contains("the IN operator"));
}

// ===================================================================
// Serialization
// ===================================================================

#[test]
fn json_and_xml_forms() {
    let root = export("SELECT ID FROM DEPT");
    let json = root.to_json().unwrap();
    assert!(json.contains("\"name\": \"select\""));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["children"][0]["name"], "columns");

    let xml = root.to_string();
    assert!(xml.starts_with("<select>\n"));
    assert!(xml.ends_with("</select>\n"));
}
