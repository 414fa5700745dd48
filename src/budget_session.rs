use log::{debug, warn};
use std::time::Instant;

use crate::budget_client::*;
use crate::constants::*;
use crate::draft_storage::*;
use crate::draft_store::*;
use crate::errors::*;
use crate::overview::*;
use crate::overview_loader::*;
use crate::types::*;

pub struct BudgetSession<'a> {
    api: &'a dyn BudgetApi,
    storage: &'a dyn DraftStorage,
    loader: OverviewLoader,
    store: DraftStore,
    notices: Vec<String>,
}

impl<'a> BudgetSession<'a> {
    pub fn new(
        api: &'a dyn BudgetApi,
        storage: &'a dyn DraftStorage,
        year: i32,
        settings: EngineSettings,
    ) -> BudgetSession<'a> {
        BudgetSession {
            api,
            storage,
            loader: OverviewLoader::new(year),
            store: DraftStore::new(year, settings),
            notices: Vec::new(),
        }
    }

    pub fn year(&self) -> i32 {
        self.loader.year()
    }

    pub fn loader(&self) -> &OverviewLoader {
        &self.loader
    }

    pub fn overview(&self) -> Option<&Overview> {
        self.loader.snapshot()
    }

    pub fn store(&self) -> &DraftStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DraftStore {
        &mut self.store
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::replace(&mut self.notices, Vec::new())
    }

    pub fn load(&mut self) -> LoadOutcome {
        let outcome = self.loader.load(self.api);
        match outcome {
            LoadOutcome::Loaded => {
                if let Some(overview) = self.loader.snapshot() {
                    let hydrated = self.store.hydrate(overview, self.storage);
                    debug!("Hydration after load: {:?}", hydrated);
                }
            }
            LoadOutcome::Failed(FailureMode::Notice) => {
                let message = format!(
                    "Could not refresh the {} budget; showing the last loaded data: {}",
                    self.year(),
                    self.loader.error().unwrap_or("unknown error")
                );
                warn!("{}", message);
                self.notices.push(message);
            }
            LoadOutcome::Failed(FailureMode::Blocking) | LoadOutcome::Stale => {}
        }
        outcome
    }

    pub fn switch_year(&mut self, year: i32) {
        self.store.set_year(year);
        self.loader.switch_year(year);
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.store.persist_if_due(now, self.storage)
    }

    pub fn flush(&mut self) -> bool {
        self.store.flush(self.storage)
    }

    pub fn close(&mut self) {
        self.store.close();
        self.loader.cancel();
    }

    pub fn create_group(&mut self, title: &str, color: Option<&str>) -> Result<SectionId> {
        let result = self.try_create_group(title, color);
        self.report(result)
    }

    pub fn rename_group(&mut self, section_id: &SectionId, title: &str) -> Result<()> {
        let result = self.try_rename_group(section_id, title);
        self.report(result)
    }

    pub fn delete_group(&mut self, section_id: &SectionId) -> Result<()> {
        let result = self.try_delete_group(section_id);
        self.report(result)
    }

    pub fn sync_category_assignments(&mut self, assignments: &[CategoryAssignment]) -> Result<()> {
        let result = self
            .api
            .sync_category_assignments(assignments)
            .chain_err(|| "Failed to save category assignments");
        self.report(result)
    }

    fn try_create_group(&mut self, title: &str, color: Option<&str>) -> Result<SectionId> {
        let title = validate_group_title(title)?;
        if let Some(color) = color {
            ensure!(
                GROUP_COLOR_REGEX.is_match(color),
                ErrorKind::Validation(format!("Invalid group color (expected #RRGGBB): {}", color))
            );
        }
        let created = self
            .api
            .create_group(title, color)
            .chain_err(|| format!("Failed to create budget group \"{}\"", title))?;
        self.store.apply_created_group(&created);
        self.refresh_after_group_change();
        Ok(created.id)
    }

    fn try_rename_group(&mut self, section_id: &SectionId, title: &str) -> Result<()> {
        let title = validate_group_title(title)?;
        self.ensure_manageable(section_id)?;
        self.api
            .rename_group(section_id, title)
            .chain_err(|| format!("Failed to rename budget group {}", section_id))?;
        self.store.apply_renamed_group(section_id, title);
        self.refresh_after_group_change();
        Ok(())
    }

    fn try_delete_group(&mut self, section_id: &SectionId) -> Result<()> {
        self.ensure_manageable(section_id)?;
        self.api
            .delete_group(section_id)
            .chain_err(|| format!("Failed to delete budget group {}", section_id))?;
        self.store.apply_deleted_group(section_id);
        self.refresh_after_group_change();
        Ok(())
    }

    // Computed rows reference groups by title, so the snapshot has to follow
    // every confirmed group change. The hydrated draft is left as it is.
    fn refresh_after_group_change(&mut self) {
        if self.loader.snapshot().is_some() {
            let outcome = self.load();
            debug!("Refreshed overview after group change: {:?}", outcome);
        }
    }

    fn ensure_manageable(&self, section_id: &SectionId) -> Result<()> {
        if let Some(section) = self.store.find_section(section_id) {
            ensure!(
                !section.is_system_default,
                ErrorKind::Validation(format!(
                    "Budget group \"{}\" is a system default and cannot be renamed or deleted",
                    section.title
                ))
            );
        }
        Ok(())
    }

    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!("{}", err);
            self.notices.push(err.to_string());
        }
        result
    }
}

fn validate_group_title(title: &str) -> Result<&str> {
    let title = title.trim();
    ensure!(
        !title.is_empty(),
        ErrorKind::Validation("Budget group name must not be empty".to_string())
    );
    Ok(title)
}
