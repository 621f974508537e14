use std::path::Path;

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Connection target for a test database
pub struct TestDb {
    url: String,
}

impl TestDb {
    pub fn new_in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }

    /// SQLite file under `dir`, created on first connect
    pub fn new_file(dir: &Path, name: &str) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", dir.join(name).display()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        Database::connect(&self.url).await
    }
}
