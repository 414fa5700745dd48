use chrono::Utc;
use log::{debug, info, warn};
use std::rc::Rc;
use std::time::Instant;

use crate::draft_storage::*;
use crate::entry_id_generator::*;
use crate::errors::*;
use crate::overview::*;
use crate::pending_ledger::*;
use crate::persist_timer::*;
use crate::types::*;

/// Working state of one year's editable sections plus its pending ledger.
/// Mutations are copy-on-write: earlier `sections_snapshot`s keep the old
/// state and untouched sections and rows stay shared.
#[derive(Debug)]
pub struct DraftStore {
    settings: EngineSettings,
    year: i32,
    months: Vec<MonthKey>,
    hydrated: bool,
    sections: Rc<Vec<Rc<EditableSection>>>,
    ledger: PendingLedger,
    persist_timer: PersistTimer,
    id_generator: EntryIdGenerator,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HydrationSource {
    PersistedDraft,
    ServerSnapshot,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HydrateOutcome {
    Hydrated(HydrationSource),
    AlreadyHydrated,
    YearMismatch,
}

impl DraftStore {
    pub fn new(year: i32, settings: EngineSettings) -> DraftStore {
        DraftStore {
            settings,
            year,
            months: Vec::new(),
            hydrated: false,
            sections: Rc::new(Vec::new()),
            ledger: PendingLedger::new(settings.max_pending_entries),
            persist_timer: PersistTimer::new(settings.persist_debounce),
            id_generator: EntryIdGenerator::new(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn months(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn month_count(&self) -> usize {
        self.months.len()
    }

    pub fn sections(&self) -> &[Rc<EditableSection>] {
        &self.sections
    }

    pub fn sections_snapshot(&self) -> Rc<Vec<Rc<EditableSection>>> {
        Rc::clone(&self.sections)
    }

    pub fn find_section(&self, section_id: &SectionId) -> Option<&Rc<EditableSection>> {
        self.sections.iter().find(|section| &section.id == section_id)
    }

    pub fn ledger(&self) -> &PendingLedger {
        &self.ledger
    }

    pub fn hydrate(&mut self, overview: &Overview, storage: &dyn DraftStorage) -> HydrateOutcome {
        if overview.year != self.year {
            warn!(
                "Ignoring overview for {} while editing {}",
                overview.year, self.year
            );
            return HydrateOutcome::YearMismatch;
        }
        if self.hydrated {
            return HydrateOutcome::AlreadyHydrated;
        }
        self.months = overview.months.clone();
        let persisted = match load_draft(storage, self.year) {
            Ok(Some(document)) if document.year == self.year => Some(document),
            Ok(Some(document)) => {
                warn!(
                    "Draft slot for {} holds a draft for {}; ignoring it",
                    self.year, document.year
                );
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!("Treating draft for {} as missing: {}", self.year, err);
                None
            }
        };
        let source = if let Some(document) = persisted {
            self.sections = Rc::new(retain_addressable(document.editable_sections));
            self.ledger =
                PendingLedger::from_map(document.pending_by_cell, self.settings.max_pending_entries);
            HydrationSource::PersistedDraft
        } else {
            self.sections = Rc::new(retain_addressable(overview.working_sections()));
            self.ledger = PendingLedger::new(self.settings.max_pending_entries);
            HydrationSource::ServerSnapshot
        };
        self.hydrated = true;
        debug!("Hydrated {} budget from {:?}", self.year, source);
        if source == HydrationSource::ServerSnapshot {
            self.schedule_persist();
        }
        HydrateOutcome::Hydrated(source)
    }

    pub fn set_year(&mut self, year: i32) {
        if year == self.year {
            return;
        }
        self.persist_timer.cancel();
        self.year = year;
        self.months = Vec::new();
        self.hydrated = false;
        self.sections = Rc::new(Vec::new());
        self.ledger = PendingLedger::new(self.settings.max_pending_entries);
    }

    /// Returns false, leaving the state untouched, when the cell does not exist
    /// or the new value is not finite.
    pub fn update_cell<F>(
        &mut self,
        section_id: &SectionId,
        row_id: &RowId,
        month_index: usize,
        f: F,
    ) -> bool
    where
        F: FnOnce(f64) -> f64,
    {
        if month_index >= self.month_count() {
            return false;
        }
        let section_index = match self.sections.iter().position(|s| &s.id == section_id) {
            Some(index) => index,
            None => return false,
        };
        let row_index = match self.sections[section_index]
            .rows
            .iter()
            .position(|r| &r.id == row_id)
        {
            Some(index) => index,
            None => return false,
        };
        let value = f(self.sections[section_index].rows[row_index].value(month_index));
        if !value.is_finite() {
            warn!(
                "Refusing non-finite value {} for cell {}",
                value,
                CellKey::new(section_id, row_id, month_index)
            );
            return false;
        }
        let sections = Rc::make_mut(&mut self.sections);
        let section = Rc::make_mut(&mut sections[section_index]);
        let row = Rc::make_mut(&mut section.rows[row_index]);
        if row.values.len() <= month_index {
            row.values.resize(month_index + 1, 0.0);
        }
        row.values[month_index] = value;
        self.schedule_persist();
        true
    }

    pub fn register_pending_entry(
        &mut self,
        section_id: &SectionId,
        row_id: &RowId,
        row_label: &str,
        month_index: usize,
        month_label: &MonthKey,
        delta: f64,
    ) -> PendingEntry {
        let entry = PendingEntry {
            id: self.id_generator.next_entry_id(),
            section_id: section_id.clone(),
            row_id: row_id.clone(),
            row_label: row_label.to_string(),
            month_index,
            month_label: month_label.clone(),
            delta,
            created_at: Utc::now(),
        };
        self.ledger.register(entry.clone());
        self.schedule_persist();
        entry
    }

    pub fn add_to_cell(
        &mut self,
        section_id: &SectionId,
        row_id: &RowId,
        month_index: usize,
        delta: f64,
    ) -> Result<PendingEntry> {
        ensure!(
            delta.is_finite(),
            ErrorKind::Validation(format!("Amount must be a finite number: {}", delta))
        );
        let month_label = self
            .months
            .get(month_index)
            .cloned()
            .chain_err(|| ErrorKind::Validation(format!("No month at index {}", month_index)))?;
        let row_label = self
            .find_section(section_id)
            .chain_err(|| ErrorKind::Validation(format!("Unknown budget group: {}", section_id)))?
            .find_row(row_id)
            .map(|row| row.label.clone())
            .chain_err(|| {
                ErrorKind::Validation(format!("Unknown row {} in group {}", row_id, section_id))
            })?;
        self.update_cell(section_id, row_id, month_index, |current| current + delta);
        Ok(self.register_pending_entry(
            section_id,
            row_id,
            &row_label,
            month_index,
            &month_label,
            delta,
        ))
    }

    pub fn undo_last_pending_entry_for_cell(
        &mut self,
        section_id: &SectionId,
        row_id: &RowId,
        month_index: usize,
    ) -> Option<PendingEntry> {
        let removed = self
            .ledger
            .pop_latest(&CellKey::new(section_id, row_id, month_index))?;
        self.update_cell(section_id, row_id, month_index, |current| {
            current - removed.delta
        });
        self.schedule_persist();
        Some(removed)
    }

    pub fn is_cell_pending(&self, section_id: &SectionId, row_id: &RowId, month_index: usize) -> bool {
        self.ledger
            .is_cell_pending(&CellKey::new(section_id, row_id, month_index))
    }

    pub fn get_pending_entries(
        &self,
        section_id: &SectionId,
        row_id: &RowId,
        month_index: usize,
    ) -> &[PendingEntry] {
        self.ledger
            .entries(&CellKey::new(section_id, row_id, month_index))
    }

    pub fn has_pending_changes(&self, section_id: &SectionId) -> bool {
        self.ledger.has_pending_changes(section_id)
    }

    // Rows are local to the draft, so system default groups accept them too.
    pub fn add_row(&mut self, section_id: &SectionId, label: &str) -> Result<RowId> {
        let label = label.trim();
        ensure!(
            !label.is_empty(),
            ErrorKind::Validation("Row label must not be empty".to_string())
        );
        let section_index = self
            .sections
            .iter()
            .position(|s| &s.id == section_id)
            .chain_err(|| ErrorKind::Validation(format!("Unknown budget group: {}", section_id)))?;
        let row_id = RowId::new(self.id_generator.next_row_id());
        let month_count = self.month_count();
        let sections = Rc::make_mut(&mut self.sections);
        Rc::make_mut(&mut sections[section_index])
            .rows
            .push(Rc::new(Row {
                id: row_id.clone(),
                label: label.to_string(),
                values: vec![0.0; month_count],
            }));
        self.schedule_persist();
        Ok(row_id)
    }

    pub fn apply_created_group(&mut self, created: &SectionEditable) -> bool {
        let working = Rc::new(created.to_working(&self.months));
        let section = match retain_addressable(vec![working]).pop() {
            Some(section) => section,
            None => return false,
        };
        Rc::make_mut(&mut self.sections).push(section);
        self.schedule_persist();
        true
    }

    pub fn apply_renamed_group(&mut self, section_id: &SectionId, title: &str) -> bool {
        let section_index = match self.sections.iter().position(|s| &s.id == section_id) {
            Some(index) => index,
            None => return false,
        };
        let sections = Rc::make_mut(&mut self.sections);
        Rc::make_mut(&mut sections[section_index]).title = title.to_string();
        self.schedule_persist();
        true
    }

    pub fn apply_deleted_group(&mut self, section_id: &SectionId) -> bool {
        if self.find_section(section_id).is_none() {
            return false;
        }
        Rc::make_mut(&mut self.sections).retain(|section| &section.id != section_id);
        self.ledger.remove_section(section_id);
        self.schedule_persist();
        true
    }

    pub fn to_document(&self) -> DraftDocument {
        DraftDocument {
            year: self.year,
            editable_sections: self.sections.as_ref().clone(),
            pending_by_cell: self.ledger.as_map().clone(),
            updated_at: Utc::now(),
        }
    }

    pub fn persist_deadline(&self) -> Option<Instant> {
        self.persist_timer.deadline()
    }

    pub fn persist_if_due(&mut self, now: Instant, storage: &dyn DraftStorage) -> bool {
        if self.persist_timer.take_due(now) {
            self.write(storage)
        } else {
            false
        }
    }

    pub fn flush(&mut self, storage: &dyn DraftStorage) -> bool {
        if self.persist_timer.is_scheduled() {
            self.persist_timer.cancel();
            self.write(storage)
        } else {
            false
        }
    }

    pub fn close(&mut self) {
        self.persist_timer.cancel();
    }

    fn schedule_persist(&mut self) {
        if self.hydrated {
            self.persist_timer.schedule(Instant::now());
        }
    }

    fn write(&self, storage: &dyn DraftStorage) -> bool {
        match save_draft(storage, &self.to_document()) {
            Ok(()) => {
                info!("Saved budget draft for {}", self.year);
                true
            }
            Err(err) => {
                warn!("Skipping draft persistence for {}: {}", self.year, err);
                false
            }
        }
    }
}

// Ids containing the cell key separator would make cell keys ambiguous.
fn retain_addressable(sections: Vec<Rc<EditableSection>>) -> Vec<Rc<EditableSection>> {
    sections
        .into_iter()
        .filter(|section| {
            if !section.id.is_addressable() {
                warn!("Skipping budget group with unusable id: {}", section.id);
            }
            section.id.is_addressable()
        })
        .map(|mut section| {
            if section.rows.iter().any(|row| !row.id.is_addressable()) {
                Rc::make_mut(&mut section).rows.retain(|row| {
                    if !row.id.is_addressable() {
                        warn!("Skipping budget row with unusable id: {}", row.id);
                    }
                    row.id.is_addressable()
                });
            }
            section
        })
        .collect()
}
