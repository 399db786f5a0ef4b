use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Anything other than `desc` (case-insensitive) reads as ascending.
    pub fn parse_lenient(token: Option<&str>) -> Self {
        match token {
            Some(t) if t.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-column server sort. `field` is always a canonical column id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Next state when the user clicks `field`'s header: asc, then desc, then unsorted.
    pub fn toggled(current: Option<&SortSpec>, field: &str) -> Option<SortSpec> {
        match current {
            Some(spec) if spec.field == field => match spec.direction {
                SortDirection::Asc => Some(SortSpec::new(field, SortDirection::Desc)),
                SortDirection::Desc => None,
            },
            _ => Some(SortSpec::new(field, SortDirection::Asc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient_defaults_to_asc() {
        assert_eq!(SortDirection::parse_lenient(Some("DESC")), SortDirection::Desc);
        assert_eq!(SortDirection::parse_lenient(Some("asc")), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient(Some("NULLS")), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient(None), SortDirection::Asc);
    }

    #[test]
    fn test_header_click_cycle() {
        let first = SortSpec::toggled(None, "c1");
        assert_eq!(first, Some(SortSpec::new("c1", SortDirection::Asc)));
        let second = SortSpec::toggled(first.as_ref(), "c1");
        assert_eq!(second, Some(SortSpec::new("c1", SortDirection::Desc)));
        assert_eq!(SortSpec::toggled(second.as_ref(), "c1"), None);
        assert_eq!(
            SortSpec::toggled(second.as_ref(), "c2"),
            Some(SortSpec::new("c2", SortDirection::Asc))
        );
    }
}
