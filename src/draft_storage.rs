use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::constants::*;
use crate::errors::*;
use crate::overview::*;
use crate::pending_ledger::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDocument {
    pub year: i32,
    pub editable_sections: Vec<Rc<EditableSection>>,
    #[serde(default)]
    pub pending_by_cell: PendingByCell,
    pub updated_at: DateTime<Utc>,
}

pub trait DraftStorage {
    fn read_draft(&self, storage_key: &str) -> Result<Option<String>>;
    fn write_draft(&self, storage_key: &str, document: &str, updated_at: &str) -> Result<()>;
    fn delete_draft(&self, storage_key: &str) -> Result<()>;
}

pub fn load_draft(storage: &dyn DraftStorage, year: i32) -> Result<Option<DraftDocument>> {
    let storage_key = format_draft_storage_key(year);
    debug!("Reading draft from slot: {}", storage_key);
    match storage.read_draft(&storage_key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .chain_err(|| ErrorKind::LocalStorage(format!("Unreadable draft in {}", storage_key))),
        None => Ok(None),
    }
}

pub fn save_draft(storage: &dyn DraftStorage, document: &DraftDocument) -> Result<()> {
    let storage_key = format_draft_storage_key(document.year);
    let raw = serde_json::to_string(document).chain_err(|| {
        ErrorKind::LocalStorage(format!("Failed to serialize draft for {}", storage_key))
    })?;
    debug!("Writing draft to slot: {}", storage_key);
    storage.write_draft(
        &storage_key,
        &raw,
        &document
            .updated_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

pub fn delete_draft(storage: &dyn DraftStorage, year: i32) -> Result<()> {
    storage.delete_draft(&format_draft_storage_key(year))
}

#[cfg(test)]
pub use self::memory::MemoryDraftStorage;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::overview::fixtures::*;

    fn document() -> DraftDocument {
        DraftDocument {
            year: 2025,
            editable_sections: food_overview().working_sections(),
            pending_by_cell: PendingByCell::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_then_load_draft() {
        let storage = MemoryDraftStorage::new();
        let document = document();
        save_draft(&storage, &document).unwrap();
        assert!(storage.raw("budget:draft:2025").is_some());
        assert_eq!(load_draft(&storage, 2025).unwrap(), Some(document));
        assert_eq!(load_draft(&storage, 2024).unwrap(), None);
    }

    #[test]
    fn test_persisted_json_shape() {
        let storage = MemoryDraftStorage::new();
        save_draft(&storage, &document()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&storage.raw("budget:draft:2025").unwrap()).unwrap();
        assert_eq!(json["year"], 2025);
        assert!(json["pendingByCell"].is_object());
        assert!(json["updatedAt"].is_string());
        assert_eq!(json["editableSections"][0]["id"], "food");
        assert_eq!(json["editableSections"][0]["isSystemDefault"], false);
        assert_eq!(
            json["editableSections"][0]["rows"][0]["values"]
                .as_array()
                .unwrap()
                .len(),
            12
        );
    }

    #[test]
    fn test_load_corrupt_draft_is_local_storage_error() {
        let storage = MemoryDraftStorage::new();
        storage
            .slots
            .borrow_mut()
            .insert("budget:draft:2025".to_string(), "{not json".to_string());
        match load_draft(&storage, 2025) {
            Err(Error(ErrorKind::LocalStorage(_), _)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
