pub mod db;
pub mod fixtures;

pub use db::TestDb;
pub use fixtures::{load_golden, load_golden_json, load_golden_text};
pub use tempfile::TempDir;
