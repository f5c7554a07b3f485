//! Row identity and deduplication
//!
//! Pages fetched with overlapping cursors can return rows already seen. Each
//! row gets a composite key built from its breakdown values plus the primary
//! calculation result; rows whose key was already observed are dropped. The
//! key is the tool's dedup unit, not a guarantee of true backend row identity:
//! two rows with the same breakdown values and the same calculation result are
//! indistinguishable here by construction.

use std::collections::HashSet;

/// A result row as returned by the backend: column name to JSON value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Composite identity of a row: every breakdown value in declaration order,
/// then the primary calculation result. Parts are canonicalized as JSON scalar
/// text so the string `"1"` and the number `1` produce distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(Vec<String>);

impl RowKey {
    /// Build the key for one row. Missing columns canonicalize the same way
    /// as explicit nulls; the backend omits a breakdown column when its value
    /// is absent from the event.
    pub fn from_row(row: &Row, breakdowns: &[String], primary_calculation: &str) -> Self {
        let mut parts = Vec::with_capacity(breakdowns.len() + 1);
        for column in breakdowns {
            parts.push(canonical_part(row.get(column)));
        }
        parts.push(canonical_part(row.get(primary_calculation)));
        RowKey(parts)
    }
}

fn canonical_part(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "null".to_string(),
        // JSON text keeps strings quoted and numbers bare, so types can't
        // collide.
        Some(v) => v.to_string(),
    }
}

/// Filter `rows` down to the ones whose key has not been seen yet, updating
/// `seen_keys` as it goes. Order-preserving relative to the input; calling it
/// twice with the same rows yields everything the first time and nothing the
/// second.
pub fn dedupe_rows(
    rows: &[Row],
    breakdowns: &[String],
    primary_calculation: &str,
    seen_keys: &mut HashSet<RowKey>,
) -> Vec<Row> {
    let mut unique = Vec::new();

    for row in rows {
        let key = RowKey::from_row(row, breakdowns, primary_calculation);
        if seen_keys.insert(key) {
            unique.push(row.clone());
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn service_rows() -> Vec<Row> {
        vec![
            row(&[
                ("service", serde_json::json!("api")),
                ("COUNT", serde_json::json!(120)),
            ]),
            row(&[
                ("service", serde_json::json!("worker")),
                ("COUNT", serde_json::json!(45)),
            ]),
            row(&[
                ("service", serde_json::json!("api")),
                ("COUNT", serde_json::json!(120)),
            ]),
        ]
    }

    #[test]
    fn test_dedupe_drops_repeated_key_within_batch() {
        let breakdowns = vec!["service".to_string()];
        let mut seen = HashSet::new();

        let unique = dedupe_rows(&service_rows(), &breakdowns, "COUNT", &mut seen);

        assert_eq!(unique.len(), 2);
        assert_eq!(seen.len(), 2);
        assert_eq!(unique[0]["service"], serde_json::json!("api"));
        assert_eq!(unique[1]["service"], serde_json::json!("worker"));
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let breakdowns = vec!["service".to_string()];
        let mut seen = HashSet::new();
        let rows = service_rows();

        let first = dedupe_rows(&rows, &breakdowns, "COUNT", &mut seen);
        let second = dedupe_rows(&rows, &breakdowns, "COUNT", &mut seen);

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }

    #[test]
    fn test_same_breakdown_different_count_is_distinct() {
        let breakdowns = vec!["service".to_string()];
        let mut seen = HashSet::new();
        let rows = vec![
            row(&[
                ("service", serde_json::json!("api")),
                ("COUNT", serde_json::json!(120)),
            ]),
            row(&[
                ("service", serde_json::json!("api")),
                ("COUNT", serde_json::json!(121)),
            ]),
        ];

        let unique = dedupe_rows(&rows, &breakdowns, "COUNT", &mut seen);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_empty_breakdowns_key_on_calculation_only() {
        let mut seen = HashSet::new();
        let rows = vec![
            row(&[("COUNT", serde_json::json!(10))]),
            row(&[("COUNT", serde_json::json!(10))]),
            row(&[("COUNT", serde_json::json!(11))]),
        ];

        let unique = dedupe_rows(&rows, &[], "COUNT", &mut seen);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_string_and_number_values_do_not_collide() {
        let breakdowns = vec!["status".to_string()];
        let mut seen = HashSet::new();
        let rows = vec![
            row(&[
                ("status", serde_json::json!("200")),
                ("COUNT", serde_json::json!(1)),
            ]),
            row(&[
                ("status", serde_json::json!(200)),
                ("COUNT", serde_json::json!(1)),
            ]),
        ];

        let unique = dedupe_rows(&rows, &breakdowns, "COUNT", &mut seen);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_missing_column_keys_as_null() {
        let breakdowns = vec!["service".to_string()];
        let mut seen = HashSet::new();
        let rows = vec![
            row(&[("COUNT", serde_json::json!(5))]),
            row(&[
                ("service", serde_json::Value::Null),
                ("COUNT", serde_json::json!(5)),
            ]),
        ];

        let unique = dedupe_rows(&rows, &breakdowns, "COUNT", &mut seen);
        assert_eq!(unique.len(), 1);
    }

    #[test]
    fn test_preserves_input_order() {
        let breakdowns = vec!["service".to_string()];
        let mut seen = HashSet::new();
        let names = ["c", "a", "b"];
        let rows: Vec<Row> = names
            .iter()
            .map(|n| {
                row(&[
                    ("service", serde_json::json!(n)),
                    ("COUNT", serde_json::json!(1)),
                ])
            })
            .collect();

        let unique = dedupe_rows(&rows, &breakdowns, "COUNT", &mut seen);
        let got: Vec<&str> = unique
            .iter()
            .map(|r| r["service"].as_str().unwrap())
            .collect();
        assert_eq!(got, names);
    }
}
