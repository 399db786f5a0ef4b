use crate::domain::request::ActionType;
use crate::domain::section::GENERAL_SECTION_ID;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Synthetic grid column used as the "add a column" affordance.
pub const ADD_COLUMN_ID: &str = "__add_column__";

/// Column or row selection. The two are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SelectionContext {
    #[default]
    Empty,
    Column(String),
    Rows(BTreeSet<u64>),
}

impl SelectionContext {
    pub fn active_column(&self) -> Option<&str> {
        match self {
            SelectionContext::Column(id) => Some(id),
            _ => None,
        }
    }

    pub fn active_rows(&self) -> Option<&BTreeSet<u64>> {
        match self {
            SelectionContext::Rows(rows) if !rows.is_empty() => Some(rows),
            _ => None,
        }
    }

    /// Column id that should scope the next request, skipping synthetic ids.
    pub fn referenced_column(&self) -> Option<&str> {
        self.active_column()
            .filter(|id| *id != ADD_COLUMN_ID && *id != GENERAL_SECTION_ID)
    }

    pub fn is_empty(&self) -> bool {
        self.active_column().is_none() && self.active_rows().is_none()
    }
}

/// What a submission does, derived from the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Modify the active query in place.
    Submit,
    /// Drill into a subset of rows in a new linked session.
    New,
    /// Analyze the full loaded result set.
    Analyze,
}

impl Action {
    pub fn classify(selection: &SelectionContext, loaded_row_count: usize) -> Action {
        match selection.active_rows() {
            // nothing loaded yet means the selection cannot cover the full set
            Some(rows) if loaded_row_count == 0 || rows.len() < loaded_row_count => Action::New,
            Some(_) => Action::Analyze,
            None => Action::Submit,
        }
    }

    pub fn request_type(self) -> ActionType {
        match self {
            Action::Submit => ActionType::InteractiveQuery,
            Action::New => ActionType::LinkedSession,
            Action::Analyze => ActionType::DataAnalysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(ids: &[u64]) -> SelectionContext {
        SelectionContext::Rows(ids.iter().copied().collect())
    }

    #[test]
    fn test_classify_without_selection_is_submit() {
        assert_eq!(Action::classify(&SelectionContext::Empty, 50), Action::Submit);
        assert_eq!(
            Action::classify(&SelectionContext::Column("c1".into()), 50),
            Action::Submit
        );
    }

    #[test]
    fn test_classify_subset_is_new_and_full_set_is_analyze() {
        assert_eq!(Action::classify(&rows(&[0, 1, 2]), 50), Action::New);
        assert_eq!(Action::classify(&rows(&[0, 1, 2]), 3), Action::Analyze);
    }

    #[test]
    fn test_rows_without_loaded_data_are_not_analyze() {
        assert_eq!(Action::classify(&rows(&[3, 7, 9]), 0), Action::New);
    }

    #[test]
    fn test_empty_row_set_counts_as_no_selection() {
        assert_eq!(Action::classify(&rows(&[]), 0), Action::Submit);
        assert!(rows(&[]).is_empty());
    }

    #[test]
    fn test_synthetic_columns_are_not_referenced() {
        assert_eq!(SelectionContext::Column(ADD_COLUMN_ID.into()).referenced_column(), None);
        assert_eq!(SelectionContext::Column("general".into()).referenced_column(), None);
        assert_eq!(SelectionContext::Column("c1".into()).referenced_column(), Some("c1"));
    }

    #[test]
    fn test_request_type_mapping() {
        assert_eq!(Action::Submit.request_type(), ActionType::InteractiveQuery);
        assert_eq!(Action::New.request_type(), ActionType::LinkedSession);
        assert_eq!(Action::Analyze.request_type(), ActionType::DataAnalysis);
    }
}
