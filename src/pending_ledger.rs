use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::types::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub id: String,
    pub section_id: SectionId,
    pub row_id: RowId,
    pub row_label: String,
    pub month_index: usize,
    pub month_label: MonthKey,
    pub delta: f64,
    pub created_at: DateTime<Utc>,
}

pub type PendingByCell = BTreeMap<CellKey, Vec<PendingEntry>>;

#[derive(Clone, Debug, PartialEq)]
pub struct PendingLedger {
    by_cell: Rc<PendingByCell>,
    max_entries_per_cell: usize,
}

impl PendingEntry {
    pub fn cell_key(&self) -> CellKey {
        CellKey::new(&self.section_id, &self.row_id, self.month_index)
    }
}

impl PendingLedger {
    pub fn new(max_entries_per_cell: usize) -> PendingLedger {
        PendingLedger::from_map(PendingByCell::new(), max_entries_per_cell)
    }

    pub fn from_map(by_cell: PendingByCell, max_entries_per_cell: usize) -> PendingLedger {
        PendingLedger {
            by_cell: Rc::new(by_cell),
            max_entries_per_cell: max_entries_per_cell.max(1),
        }
    }

    pub fn snapshot(&self) -> Rc<PendingByCell> {
        Rc::clone(&self.by_cell)
    }

    pub fn as_map(&self) -> &PendingByCell {
        &self.by_cell
    }

    pub fn is_empty(&self) -> bool {
        self.by_cell.is_empty()
    }

    pub fn register(&mut self, entry: PendingEntry) {
        let max_entries = self.max_entries_per_cell;
        let entries = Rc::make_mut(&mut self.by_cell)
            .entry(entry.cell_key())
            .or_insert_with(Vec::new);
        entries.insert(0, entry);
        entries.truncate(max_entries);
    }

    pub fn pop_latest(&mut self, cell_key: &CellKey) -> Option<PendingEntry> {
        if !self.is_cell_pending(cell_key) {
            return None;
        }
        let by_cell = Rc::make_mut(&mut self.by_cell);
        let entries = by_cell.get_mut(cell_key)?;
        let removed = entries.remove(0);
        if entries.is_empty() {
            by_cell.remove(cell_key);
        }
        Some(removed)
    }

    pub fn entries(&self, cell_key: &CellKey) -> &[PendingEntry] {
        self.by_cell
            .get(cell_key)
            .map(|entries| entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_cell_pending(&self, cell_key: &CellKey) -> bool {
        self.by_cell
            .get(cell_key)
            .map_or(false, |entries| !entries.is_empty())
    }

    pub fn has_pending_changes(&self, section_id: &SectionId) -> bool {
        self.by_cell
            .keys()
            .any(|cell_key| cell_key.belongs_to_section(section_id))
    }

    pub fn remove_section(&mut self, section_id: &SectionId) -> usize {
        if !self.has_pending_changes(section_id) {
            return 0;
        }
        let by_cell = Rc::make_mut(&mut self.by_cell);
        let before = by_cell.len();
        by_cell.retain(|cell_key, _| !cell_key.belongs_to_section(section_id));
        before - by_cell.len()
    }
}
