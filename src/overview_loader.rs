use log::{debug, warn};

use crate::budget_client::*;
use crate::errors::*;
use crate::overview::*;

/// Only the most recently issued ticket for the current year may change the
/// loader's state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FetchTicket {
    generation: u64,
    pub year: i32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureMode {
    Blocking,
    Notice,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadOutcome {
    Loaded,
    Stale,
    Failed(FailureMode),
}

#[derive(Debug)]
pub struct OverviewLoader {
    year: i32,
    generation: u64,
    loading: bool,
    snapshot: Option<Overview>,
    error: Option<String>,
}

impl OverviewLoader {
    pub fn new(year: i32) -> OverviewLoader {
        OverviewLoader {
            year,
            generation: 0,
            loading: false,
            snapshot: None,
            error: None,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn snapshot(&self) -> Option<&Overview> {
        self.snapshot.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(String::as_str)
    }

    pub fn blocking_error(&self) -> Option<&str> {
        if self.snapshot.is_some() {
            None
        } else {
            self.error()
        }
    }

    pub fn switch_year(&mut self, year: i32) {
        if year == self.year {
            return;
        }
        self.cancel();
        self.year = year;
        self.snapshot = None;
        self.error = None;
    }

    pub fn cancel(&mut self) {
        self.generation += 1;
        self.loading = false;
    }

    pub fn begin(&mut self) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        FetchTicket {
            generation: self.generation,
            year: self.year,
        }
    }

    pub fn finish(&mut self, ticket: FetchTicket, result: Result<Overview>) -> LoadOutcome {
        if ticket.generation != self.generation || ticket.year != self.year {
            warn!("Discarding stale overview response for {}", ticket.year);
            return LoadOutcome::Stale;
        }
        self.loading = false;
        match result {
            Ok(overview) => {
                debug!(
                    "Loaded overview for {} with {} editable sections",
                    overview.year,
                    overview.sections_editable.len()
                );
                self.snapshot = Some(overview);
                self.error = None;
                LoadOutcome::Loaded
            }
            Err(err) => {
                self.error = Some(err.to_string());
                if self.snapshot.is_some() {
                    LoadOutcome::Failed(FailureMode::Notice)
                } else {
                    LoadOutcome::Failed(FailureMode::Blocking)
                }
            }
        }
    }

    pub fn load(&mut self, api: &dyn BudgetApi) -> LoadOutcome {
        let ticket = self.begin();
        let result = api.fetch_overview(ticket.year);
        self.finish(ticket, result)
    }
}
