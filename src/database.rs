use diesel::prelude::*;
use log::debug;
use std::fs;
use std::path;

use crate::draft_storage::*;
use crate::errors::*;
use crate::schema;

embed_migrations!("migrations");

pub struct Database {
    connection: SqliteConnection,
    dry_run: bool,
}

impl Database {
    pub fn establish_connection(database_file: &str, dry_run: bool) -> Result<Database> {
        let parent = path::Path::new(database_file).parent().chain_err(|| {
            format!(
                "Failed to determine parent directory of database file path: {}",
                database_file
            )
        })?;
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).chain_err(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }
        debug!("Using database file: {}", database_file);
        let connection = SqliteConnection::establish(&database_file)
            .chain_err(|| "Failed to establish SQLite database connection")?;
        embedded_migrations::run(&connection)
            .chain_err(|| "Failed to perform database schema migrations")?;
        Ok(Database {
            connection,
            dry_run,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

impl DraftStorage for Database {
    fn read_draft(&self, storage_key_: &str) -> Result<Option<String>> {
        use schema::drafts::dsl::*;
        schema::drafts::table
            .select(document)
            .filter(storage_key.eq(storage_key_))
            .first::<String>(&self.connection)
            .optional()
            .chain_err(|| {
                ErrorKind::LocalStorage(format!("Failed to load draft {} from database", storage_key_))
            })
    }

    fn write_draft(&self, storage_key_: &str, document_: &str, updated_at_: &str) -> Result<()> {
        if self.dry_run {
            debug!("Dry run; not saving draft {}", storage_key_);
            return Ok(());
        }
        use schema::drafts::dsl::*;
        diesel::replace_into(schema::drafts::table)
            .values((
                storage_key.eq(storage_key_),
                document.eq(document_),
                updated_at.eq(updated_at_),
            ))
            .execute(&self.connection)
            .chain_err(|| {
                ErrorKind::LocalStorage(format!("Failed to save draft {} to database", storage_key_))
            })?;
        Ok(())
    }

    fn delete_draft(&self, storage_key_: &str) -> Result<()> {
        if self.dry_run {
            debug!("Dry run; not deleting draft {}", storage_key_);
            return Ok(());
        }
        use schema::drafts::dsl::*;
        diesel::delete(schema::drafts::table.filter(storage_key.eq(storage_key_)))
            .execute(&self.connection)
            .chain_err(|| {
                ErrorKind::LocalStorage(format!(
                    "Failed to delete draft {} from database",
                    storage_key_
                ))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_replace_delete() {
        let database = Database::establish_connection(":memory:", false).unwrap();
        assert_eq!(database.read_draft("budget:draft:2025").unwrap(), None);
        database
            .write_draft("budget:draft:2025", "{\"a\":1}", "2025-01-01T00:00:00.000Z")
            .unwrap();
        database
            .write_draft("budget:draft:2025", "{\"a\":2}", "2025-01-01T00:00:01.000Z")
            .unwrap();
        assert_eq!(
            database.read_draft("budget:draft:2025").unwrap(),
            Some("{\"a\":2}".to_string())
        );
        assert_eq!(database.read_draft("budget:draft:2024").unwrap(), None);
        database.delete_draft("budget:draft:2025").unwrap();
        assert_eq!(database.read_draft("budget:draft:2025").unwrap(), None);
    }

    #[test]
    fn test_dry_run_never_writes() {
        let database = Database::establish_connection(":memory:", true).unwrap();
        assert!(database.is_dry_run());
        database
            .write_draft("budget:draft:2025", "{}", "2025-01-01T00:00:00.000Z")
            .unwrap();
        assert_eq!(database.read_draft("budget:draft:2025").unwrap(), None);
    }
}
