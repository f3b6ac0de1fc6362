pub mod history;
pub mod models;

pub use history::SqliteHistoryStore;
