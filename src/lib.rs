#![warn(clippy::all)]

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;
#[macro_use]
extern crate error_chain;

pub mod budget_client;
pub mod budget_formatter;
pub mod budget_session;
mod cli;
pub mod constants;
pub mod database;
pub mod draft_storage;
pub mod draft_store;
pub mod entry_id_generator;
pub mod grid;
pub mod overview;
pub mod overview_loader;
pub mod pending_ledger;
pub mod persist_timer;
mod schema;
pub mod totals;
pub mod types;

pub mod errors {
    error_chain! {
        errors {
            Network(context: String) {
                description("budget API unreachable")
                display("Could not reach the budget API: {}", context)
            }
            Server(status: u16, message: String) {
                description("budget API error response")
                display("Budget API responded with status {}: {}", status, message)
            }
            LocalStorage(context: String) {
                description("local draft storage failure")
                display("Local draft storage failure: {}", context)
            }
            Validation(message: String) {
                description("invalid input")
                display("{}", message)
            }
        }
    }
}

pub use cli::run;
