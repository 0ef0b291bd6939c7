mod sqlite_history_repository;

pub use sqlite_history_repository::SqliteHistoryRepository;
