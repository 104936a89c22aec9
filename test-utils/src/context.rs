use sea_orm::{
    sea_query::{IndexCreateStatement, TableCreateStatement},
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
};

use crate::error::TestError;

/// Test context holding an in-memory SQLite connection.
///
/// The connection is created lazily on first access and lives as long as the context.
/// The pool is limited to a single connection so every query sees the same in-memory
/// database; code under test must therefore never query the pool while it holds an open
/// transaction.
pub struct TestContext {
    pub db: Option<DatabaseConnection>,
}

impl TestContext {
    /// Creates a new empty test context.
    pub fn new() -> Self {
        Self { db: None }
    }

    /// Gets or creates the in-memory SQLite database connection.
    ///
    /// # Returns
    /// - `Ok(&DatabaseConnection)` - Reference to the database connection
    /// - `Err(TestError::Database)` - Failed to connect to in-memory SQLite database
    pub async fn database(&mut self) -> Result<&DatabaseConnection, TestError> {
        match self.db {
            Some(ref db) => Ok(db),
            None => {
                let mut opt = ConnectOptions::new("sqlite::memory:");
                opt.max_connections(1).sqlx_logging(false);

                let db = Database::connect(opt).await?;
                let db_ref = self.db.insert(db);

                Ok(&*db_ref)
            }
        }
    }

    /// Executes the CREATE TABLE and CREATE INDEX statements in order.
    ///
    /// Typically called by `TestBuilder::build()` rather than directly.
    ///
    /// # Arguments
    /// - `tables` - CREATE TABLE statements, in foreign key dependency order
    /// - `indexes` - CREATE INDEX statements executed after all tables exist
    ///
    /// # Returns
    /// - `Ok(())` - Schema created
    /// - `Err(TestError::Database)` - A statement failed
    pub async fn with_schema(
        &mut self,
        tables: Vec<TableCreateStatement>,
        indexes: Vec<IndexCreateStatement>,
    ) -> Result<(), TestError> {
        let db = self.database().await?;

        for stmt in tables {
            db.execute(&stmt).await?;
        }
        for stmt in indexes {
            db.execute(&stmt).await?;
        }

        Ok(())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
