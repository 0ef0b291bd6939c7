pub mod database;
pub mod jsonl_log;
pub mod repositories;

pub use database::Database;
pub use jsonl_log::JsonlHistoryLog;
pub use repositories::SqliteHistoryRepository;
