//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_log_store_repository;
mod in_memory_settings_repository;
mod postgres_log_store_repository;
mod postgres_settings_repository;

use sqlx::migrate::Migrator;

pub use in_memory_log_store_repository::InMemoryLogStoreRepository;
pub use in_memory_settings_repository::InMemorySettingsRepository;
pub use postgres_log_store_repository::{LOG_TABLE, PostgresLogStoreRepository};
pub use postgres_settings_repository::PostgresSettingsRepository;

/// Schema migrations for the log and settings tables.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
