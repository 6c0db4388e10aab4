//! Bus fare lookup service: a small on-disk fare table, a two-way stop-to-stop
//! lookup, and an admin workflow that replaces the table from an uploaded spreadsheet.

pub mod admin;
pub mod config;
pub mod error;
pub mod fare_models;
pub mod handlers;
pub mod ingest;
pub mod lookup;
pub mod store;
