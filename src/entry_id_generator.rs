use std::cell::Cell;

use crate::constants::*;

#[derive(Debug)]
pub struct EntryIdGenerator {
    prefix: String,
    next_number: Cell<u64>,
}

impl EntryIdGenerator {
    pub fn new() -> EntryIdGenerator {
        EntryIdGenerator {
            prefix: chrono::Utc::now().format("%Y%m%d:%H%M%S%3f").to_string(),
            next_number: Cell::new(0),
        }
    }

    pub fn next_entry_id(&self) -> String {
        self.next_id(ENTRY_ID_PREFIX)
    }

    pub fn next_row_id(&self) -> String {
        self.next_id(ROW_ID_PREFIX)
    }

    fn next_id(&self, kind: &str) -> String {
        let number = self.next_number.get();
        self.next_number.set(number + 1);
        format!("{}:{}:{}", kind, self.prefix, number)
    }
}

impl Default for EntryIdGenerator {
    fn default() -> EntryIdGenerator {
        EntryIdGenerator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_entry_ids_are_unique() {
        let generator = EntryIdGenerator::new();
        let ids: HashSet<String> = (0..100).map(|_| generator.next_entry_id()).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| id.starts_with("PE:")));
    }

    #[test]
    fn test_row_ids_share_counter_with_entry_ids() {
        let generator = EntryIdGenerator::new();
        let entry = generator.next_entry_id();
        let row = generator.next_row_id();
        assert!(entry.ends_with(":0"));
        assert!(row.starts_with("row:"));
        assert!(row.ends_with(":1"));
    }
}
