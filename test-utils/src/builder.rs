use entity::prelude::*;
use sea_orm::{
    sea_query::{Index, IndexCreateStatement, TableCreateStatement},
    EntityTrait, Schema,
};

use crate::{context::TestContext, error::TestError};

/// Builder for test contexts with a customizable database schema.
///
/// # Example
///
/// ```rust,ignore
/// use test_utils::builder::TestBuilder;
/// use entity::prelude::{User, Panel};
///
/// let test = TestBuilder::new()
///     .with_table(User)
///     .with_table(Panel)
///     .build()
///     .await?;
/// ```
pub struct TestBuilder {
    tables: Vec<TableCreateStatement>,
    indexes: Vec<IndexCreateStatement>,
}

impl TestBuilder {
    /// Creates a new test builder with no tables configured.
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Adds an entity table to the test database schema.
    ///
    /// Tables with foreign keys must be added after the tables they reference.
    ///
    /// # Arguments
    /// - `entity` - SeaORM entity to create the table for
    ///
    /// # Returns
    /// - `Self` - Builder instance for method chaining
    pub fn with_table<E: EntityTrait>(mut self, entity: E) -> Self {
        let schema = Schema::new(sea_orm::DbBackend::Sqlite);
        self.tables.push(schema.create_table_from_entity(entity));
        self
    }

    /// Adds every table used by bot lifecycle, billing and reconciliation tests.
    ///
    /// Adds, in dependency order: User, Panel, Package, PermissionPrice, Bot, Server.
    /// Also creates the unique `(family, template_name)` index the migration puts on
    /// the bot table, so duplicate template names fail here the same way they do in
    /// production.
    ///
    /// # Returns
    /// - `Self` - Builder instance for method chaining
    pub fn with_bot_tables(mut self) -> Self {
        self.indexes.push(
            Index::create()
                .name("idx_bot_family_template_name")
                .table(Bot)
                .col(entity::bot::Column::Family)
                .col(entity::bot::Column::TemplateName)
                .unique()
                .to_owned(),
        );

        self.with_table(User)
            .with_table(Panel)
            .with_table(Package)
            .with_table(PermissionPrice)
            .with_table(Bot)
            .with_table(Server)
    }

    /// Builds the test context and creates the configured schema.
    ///
    /// # Returns
    /// - `Ok(TestContext)` - Initialized context with tables ready
    /// - `Err(TestError::Database)` - Failed to connect or create tables
    pub async fn build(self) -> Result<TestContext, TestError> {
        let mut setup = TestContext::new();

        setup.with_schema(self.tables, self.indexes).await?;

        Ok(setup)
    }
}

impl Default for TestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
