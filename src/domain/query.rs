use serde::{Deserialize, Serialize};

/// A single result row as returned by the data endpoint, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Field the grid stamps on every loaded row. Never sent back to the backend.
pub const ROW_ID_FIELD: &str = "__row_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub column_name: String,
    #[serde(default)]
    pub column_type: Option<String>,
    #[serde(default)]
    pub column_alias: Option<String>,
    #[serde(default)]
    pub column_description: Option<String>,
}

impl Column {
    /// Alias if the backend supplied one, column name otherwise.
    pub fn display_name(&self) -> &str {
        self.column_alias
            .as_deref()
            .filter(|alias| !alias.trim().is_empty())
            .unwrap_or(&self.column_name)
    }

    /// True when `identifier` names this column by id or by column name.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.id.eq_ignore_ascii_case(identifier) || self.column_name.eq_ignore_ascii_case(identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub query_id: String,
    pub sql: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub row_count: Option<u64>,
}

/// One page of rows from `GET /data/{query_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPage {
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Absent when the backend does not report a count.
    #[serde(default)]
    pub total_rows: Option<u64>,
}

#[cfg(test)]
pub(crate) fn column(id: &str, name: &str, alias: &str) -> Column {
    Column {
        id: id.to_string(),
        column_name: name.to_string(),
        column_type: Some("varchar".to_string()),
        column_alias: Some(alias.to_string()),
        column_description: None,
    }
}
