use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::*;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub String);

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub String);

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthKey(pub String);

/// `section::row::month_index`; the only lookup key of the pending ledger.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellKey(String);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSettings {
    pub max_pending_entries: usize,
    pub persist_debounce: Duration,
}

impl SectionId {
    pub fn new<S: Into<String>>(id: S) -> SectionId {
        SectionId(id.into())
    }

    pub fn is_addressable(&self) -> bool {
        !self.0.contains(CELL_KEY_SEPARATOR)
    }

    pub fn cell_key_prefix(&self) -> String {
        format!("{}{}", self.0, CELL_KEY_SEPARATOR)
    }
}

impl RowId {
    pub fn new<S: Into<String>>(id: S) -> RowId {
        RowId(id.into())
    }

    pub fn is_addressable(&self) -> bool {
        !self.0.contains(CELL_KEY_SEPARATOR)
    }
}

impl MonthKey {
    pub fn new<S: Into<String>>(key: S) -> MonthKey {
        MonthKey(key.into())
    }
}

impl CellKey {
    pub fn new(section_id: &SectionId, row_id: &RowId, month_index: usize) -> CellKey {
        CellKey(format!(
            "{}{}{}{}{}",
            section_id.0, CELL_KEY_SEPARATOR, row_id.0, CELL_KEY_SEPARATOR, month_index
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn belongs_to_section(&self, section_id: &SectionId) -> bool {
        self.0.starts_with(&section_id.cell_key_prefix())
    }
}

impl Default for EngineSettings {
    fn default() -> EngineSettings {
        EngineSettings {
            max_pending_entries: DEFAULT_MAX_PENDING_ENTRIES,
            persist_debounce: DEFAULT_PERSIST_DEBOUNCE,
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_key_format() {
        let key = CellKey::new(&SectionId::new("food"), &RowId::new("r1"), 0);
        assert_eq!(key.as_str(), "food::r1::0");
    }

    #[test]
    fn test_cell_key_equality() {
        let section = SectionId::new("food");
        let row = RowId::new("r1");
        assert_eq!(CellKey::new(&section, &row, 3), CellKey::new(&section, &row, 3));
        assert_ne!(CellKey::new(&section, &row, 3), CellKey::new(&section, &row, 4));
    }

    #[test]
    fn test_cell_key_belongs_to_section() {
        let key = CellKey::new(&SectionId::new("food"), &RowId::new("r1"), 11);
        assert!(key.belongs_to_section(&SectionId::new("food")));
        assert!(!key.belongs_to_section(&SectionId::new("foo")));
        assert!(!key.belongs_to_section(&SectionId::new("food2")));
    }

    #[test]
    fn test_cell_key_serializes_as_plain_string() {
        let key = CellKey::new(&SectionId::new("a"), &RowId::new("b"), 1);
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"a::b::1\"");
    }
}
