//! Sort / Reference Deriver
//!
//! Reverse-parses the trailing `ORDER BY` of a query's SQL into a single-column
//! sort, and turns the current selection into the `refs` attached to the next
//! request. Both are best-effort: anything unresolvable degrades to "no sort" or
//! to an emptier refs object, never to a failure the user sees.

use crate::domain::error::{AppError, Result};
use crate::domain::query::{Column, Row, ROW_ID_FIELD};
use crate::domain::request::Refs;
use crate::domain::selection::SelectionContext;
use crate::domain::sort::{SortDirection, SortSpec};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Last `ORDER BY` in the statement, up to `LIMIT`, `OFFSET`, `;` or end of text.
static ORDER_BY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^.*\border\s+by\s+(.+?)\s*(?:\blimit\b|\boffset\b|;|\z)").unwrap()
});

/// One `ORDER BY` term: a (possibly quoted or qualified) identifier and an optional direction word.
static SORT_TERM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)^\s*(?P<ident>(?:[^\s"`\[]*(?:"[^"]*"|`[^`]*`|\[[^\]]*\]))+|\S+)(?:\s+(?P<dir>\w+))?"#)
        .unwrap()
});

/// Strips table qualifiers and quoting: `t."amount"` -> `amount`.
fn normalize_identifier(raw: &str) -> String {
    let last = raw.rsplit('.').next().unwrap_or(raw);
    last.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .trim()
        .to_string()
}

/// Resolves a raw SQL identifier to a canonical column.
/// Accepts the column id, the column name, or a 1-based ordinal.
pub fn resolve_column<'a>(identifier: &str, columns: &'a [Column]) -> Option<&'a Column> {
    let name = normalize_identifier(identifier);
    if name.is_empty() {
        return None;
    }
    if let Ok(position) = name.parse::<usize>() {
        return position.checked_sub(1).and_then(|index| columns.get(index));
    }
    columns.iter().find(|column| column.matches_identifier(&name))
}

/// Extracts the sort spec, reporting why nothing could be derived.
pub fn try_derive_sort(sql: &str, columns: &[Column]) -> Result<SortSpec> {
    let clause = ORDER_BY_PATTERN
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| AppError::ParseAmbiguity("No ORDER BY clause".to_string()))?;

    for term in clause.split(',') {
        let Some(caps) = SORT_TERM_PATTERN.captures(term) else {
            continue;
        };
        let Some(identifier) = caps.name("ident") else {
            continue;
        };
        if let Some(column) = resolve_column(identifier.as_str(), columns) {
            let direction = SortDirection::parse_lenient(caps.name("dir").map(|m| m.as_str()));
            return Ok(SortSpec::new(column.id.clone(), direction));
        }
    }

    Err(AppError::ParseAmbiguity(format!(
        "No ORDER BY term resolves to a known column: {}",
        clause.trim()
    )))
}

/// Sort spec implied by `sql`, or `None` when there is nothing resolvable.
pub fn derive_sort(sql: &str, columns: &[Column]) -> Option<SortSpec> {
    match try_derive_sort(sql, columns) {
        Ok(spec) => Some(spec),
        Err(e) => {
            debug!(reason = %e, "No sort derived from SQL");
            None
        }
    }
}

fn row_id(row: &Row) -> Option<u64> {
    row.get(ROW_ID_FIELD).and_then(Value::as_u64)
}

/// Builds the refs for the next request from the selection and the rows currently loaded.
pub fn build_refs(selection: &SelectionContext, columns: &[Column], loaded_rows: &[Row]) -> Refs {
    if let Some(column_id) = selection.referenced_column() {
        let Some(column) = columns
            .iter()
            .find(|c| c.id == column_id)
            .or_else(|| resolve_column(column_id, columns))
        else {
            debug!(column_id = %column_id, "Selected column is not part of the active query");
            return Refs {
                cols: Some(vec![Value::String(column_id.to_string())]),
                rows: None,
            };
        };

        let mut cols = Vec::with_capacity(loaded_rows.len() + 1);
        cols.push(Value::String(column.id.clone()));
        cols.extend(
            loaded_rows
                .iter()
                .map(|row| row.get(&column.column_name).cloned().unwrap_or(Value::Null)),
        );
        return Refs {
            cols: Some(cols),
            rows: None,
        };
    }

    if let Some(selected) = selection.active_rows() {
        let picked: Vec<&Row> = loaded_rows
            .iter()
            .filter(|row| row_id(row).map_or(false, |id| selected.contains(&id)))
            .collect();

        let mut rows = Vec::with_capacity(picked.len() + 1);
        if columns.is_empty() {
            let keys: Vec<String> = picked
                .first()
                .map(|row| row.keys().filter(|k| *k != ROW_ID_FIELD).cloned().collect())
                .unwrap_or_default();
            rows.push(keys.iter().cloned().map(Value::String).collect());
            rows.extend(picked.iter().map(|row| {
                keys.iter()
                    .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
                    .collect()
            }));
        } else {
            rows.push(
                columns
                    .iter()
                    .map(|c| Value::String(c.display_name().to_string()))
                    .collect(),
            );
            rows.extend(picked.iter().map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(&c.column_name).cloned().unwrap_or(Value::Null))
                    .collect()
            }));
        }
        return Refs {
            cols: None,
            rows: Some(rows),
        };
    }

    Refs::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::column;
    use serde_json::json;

    fn columns() -> Vec<Column> {
        vec![
            column("c_wallet", "wallet", "Wallet"),
            column("c_amount", "amount", "Amount"),
            column("c_tx", "tx_count", "Transactions"),
        ]
    }

    fn row(id: u64, wallet: &str, amount: i64) -> Row {
        match json!({ROW_ID_FIELD: id, "wallet": wallet, "amount": amount, "tx_count": 1}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_order_by_desc_with_limit() {
        let spec = derive_sort(
            "SELECT wallet, amount FROM t ORDER BY amount DESC LIMIT 10",
            &columns(),
        );
        assert_eq!(spec, Some(SortSpec::new("c_amount", SortDirection::Desc)));
    }

    #[test]
    fn test_no_order_by_gives_no_sort() {
        assert_eq!(derive_sort("SELECT * FROM t LIMIT 5", &columns()), None);
        assert!(matches!(
            try_derive_sort("SELECT * FROM t", &columns()),
            Err(AppError::ParseAmbiguity(_))
        ));
    }

    #[test]
    fn test_direction_defaults_to_asc() {
        assert_eq!(
            derive_sort("select * from t order by wallet;", &columns()),
            Some(SortSpec::new("c_wallet", SortDirection::Asc))
        );
        assert_eq!(
            derive_sort("select * from t order by wallet nulls last", &columns()),
            Some(SortSpec::new("c_wallet", SortDirection::Asc))
        );
    }

    #[test]
    fn test_first_resolvable_term_wins() {
        let sql = "SELECT * FROM t ORDER BY SUM(x) DESC, tx_count DESC, amount ASC";
        assert_eq!(
            derive_sort(sql, &columns()),
            Some(SortSpec::new("c_tx", SortDirection::Desc))
        );
    }

    #[test]
    fn test_trailing_clause_is_used() {
        let sql = "SELECT * FROM (SELECT * FROM t ORDER BY wallet) s\nORDER BY amount DESC\nOFFSET 20";
        assert_eq!(
            derive_sort(sql, &columns()),
            Some(SortSpec::new("c_amount", SortDirection::Desc))
        );
    }

    #[test]
    fn test_quoted_qualified_and_positional_identifiers() {
        assert_eq!(
            derive_sort(r#"SELECT * FROM t ORDER BY t."amount" DESC"#, &columns()),
            Some(SortSpec::new("c_amount", SortDirection::Desc))
        );
        assert_eq!(
            derive_sort("SELECT * FROM t ORDER BY `wallet`", &columns()),
            Some(SortSpec::new("c_wallet", SortDirection::Asc))
        );
        assert_eq!(
            derive_sort("SELECT * FROM t ORDER BY 2 DESC", &columns()),
            Some(SortSpec::new("c_amount", SortDirection::Desc))
        );
        assert_eq!(derive_sort("SELECT * FROM t ORDER BY 9", &columns()), None);
    }

    #[test]
    fn test_column_id_resolves_directly() {
        assert_eq!(
            derive_sort("SELECT * FROM t ORDER BY c_tx desc", &columns()),
            Some(SortSpec::new("c_tx", SortDirection::Desc))
        );
    }

    #[test]
    fn test_unknown_identifier_gives_no_sort() {
        assert_eq!(derive_sort("SELECT * FROM t ORDER BY created_at DESC", &columns()), None);
    }

    #[test]
    fn test_column_refs_carry_loaded_values() {
        let rows = vec![row(0, "w0", 10), row(1, "w1", 20)];
        let refs = build_refs(&SelectionContext::Column("c_amount".into()), &columns(), &rows);
        assert_eq!(refs.cols, Some(vec![json!("c_amount"), json!(10), json!(20)]));
        assert_eq!(refs.rows, None);
    }

    #[test]
    fn test_column_refs_resolve_by_name() {
        let refs = build_refs(&SelectionContext::Column("wallet".into()), &columns(), &[row(0, "w0", 1)]);
        assert_eq!(refs.cols, Some(vec![json!("c_wallet"), json!("w0")]));
    }

    #[test]
    fn test_row_refs_have_alias_header_and_no_row_id() {
        let rows = vec![row(0, "w0", 10), row(1, "w1", 20), row(2, "w2", 30)];
        let selection = SelectionContext::Rows([0, 2].into_iter().collect());
        let refs = build_refs(&selection, &columns(), &rows);
        assert_eq!(refs.cols, None);
        assert_eq!(
            refs.rows,
            Some(vec![
                vec![json!("Wallet"), json!("Amount"), json!("Transactions")],
                vec![json!("w0"), json!(10), json!(1)],
                vec![json!("w2"), json!(30), json!(1)],
            ])
        );
    }

    #[test]
    fn test_synthetic_column_and_empty_selection_give_empty_refs() {
        let rows = vec![row(0, "w0", 10)];
        assert!(build_refs(&SelectionContext::Empty, &columns(), &rows).is_empty());
        assert!(build_refs(
            &SelectionContext::Column(crate::domain::selection::ADD_COLUMN_ID.into()),
            &columns(),
            &rows
        )
        .is_empty());
    }
}
