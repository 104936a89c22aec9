use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PermissionPrice::Table)
                    .if_not_exists()
                    .col(pk_auto(PermissionPrice::Id))
                    .col(string_uniq(PermissionPrice::Key))
                    .col(string(PermissionPrice::Name))
                    .col(big_integer(PermissionPrice::Price))
                    .col(boolean(PermissionPrice::MultiValued).default(false))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PermissionPrice::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PermissionPrice {
    Table,
    Id,
    Key,
    Name,
    Price,
    MultiValued,
}
