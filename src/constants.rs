use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;

pub const DRAFT_STORAGE_KEY_PREFIX: &str = "budget:draft:";
pub const CELL_KEY_SEPARATOR: &str = "::";
pub const ENTRY_ID_PREFIX: &str = "PE";
pub const ROW_ID_PREFIX: &str = "row";
pub const DEFAULT_DATABASE_FILENAME: &str = "drafts.sqlite3";

pub const MONTHS_PER_YEAR: usize = 12;
pub const DEFAULT_MAX_PENDING_ENTRIES: usize = 5;
pub const DEFAULT_PERSIST_DEBOUNCE: Duration = Duration::from_millis(1000);

pub const API_URL_ARG: &str = "api-url";
pub const API_URL_ENV: &str = "BUDGET_API_URL";
pub const ACCESS_TOKEN_ARG: &str = "access-token";
pub const ACCESS_TOKEN_ENV: &str = "BUDGET_ACCESS_TOKEN";
pub const REFRESH_TOKEN_ARG: &str = "refresh-token";
pub const REFRESH_TOKEN_ENV: &str = "BUDGET_REFRESH_TOKEN";
pub const DATABASE_FILE_ARG: &str = "database-file";
pub const DATABASE_FILE_ENV: &str = "BUDGET_DRAFTS_DATABASE_FILE";
pub const YEAR_ARG: &str = "year";
pub const YEAR_ENV: &str = "BUDGET_YEAR";
pub const MAX_PENDING_ENTRIES_ARG: &str = "max-pending-entries";
pub const MAX_PENDING_ENTRIES_ENV: &str = "BUDGET_MAX_PENDING_ENTRIES";
pub const PERSIST_DEBOUNCE_MS_ARG: &str = "persist-debounce-ms";
pub const PERSIST_DEBOUNCE_MS_ENV: &str = "BUDGET_PERSIST_DEBOUNCE_MS";
pub const DRY_RUN_ARG: &str = "dry-run";

pub const SECTION_ARG: &str = "section";
pub const ROW_ARG: &str = "row";
pub const MONTH_ARG: &str = "month";
pub const AMOUNT_ARG: &str = "amount";
pub const TITLE_ARG: &str = "title";
pub const COLOR_ARG: &str = "color";
pub const ID_ARG: &str = "id";
pub const ASSIGNMENT_ARG: &str = "assignment";

pub const SHOW_COMMAND: &str = "show";
pub const ADD_COMMAND: &str = "add";
pub const UNDO_COMMAND: &str = "undo";
pub const PENDING_COMMAND: &str = "pending";
pub const CREATE_GROUP_COMMAND: &str = "create-group";
pub const RENAME_GROUP_COMMAND: &str = "rename-group";
pub const DELETE_GROUP_COMMAND: &str = "delete-group";
pub const ASSIGN_COMMAND: &str = "assign";
pub const RESET_DRAFT_COMMAND: &str = "reset-draft";

lazy_static! {
    pub static ref GROUP_COLOR_REGEX: Regex =
        Regex::new(r"^#[[:xdigit:]]{6}$").expect("GROUP_COLOR_REGEX should be valid");
    pub static ref ASSIGNMENT_REGEX: Regex =
        Regex::new(r"^\s*([^=\s]+)\s*(?:=\s*([^=\s]*)\s*)?$")
            .expect("ASSIGNMENT_REGEX should be valid");
}

pub fn format_draft_storage_key(year: i32) -> String {
    format!("{}{}", DRAFT_STORAGE_KEY_PREFIX, year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_draft_storage_key() {
        assert_eq!(format_draft_storage_key(2025), "budget:draft:2025");
    }

    #[test]
    fn test_group_color_regex() {
        assert!(GROUP_COLOR_REGEX.is_match("#1a2B3c"));
        assert!(!GROUP_COLOR_REGEX.is_match("1a2B3c"));
        assert!(!GROUP_COLOR_REGEX.is_match("#1a2B3"));
    }

    #[test]
    fn test_assignment_regex() {
        let caps = ASSIGNMENT_REGEX.captures("cat-1=food").unwrap();
        assert_eq!(&caps[1], "cat-1");
        assert_eq!(caps.get(2).map(|m| m.as_str()), Some("food"));
        let caps = ASSIGNMENT_REGEX.captures("cat-2").unwrap();
        assert_eq!(caps.get(2), None);
        let caps = ASSIGNMENT_REGEX.captures("cat-3=").unwrap();
        assert_eq!(caps.get(2).map(|m| m.as_str()), Some(""));
    }
}
