use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Package::Table)
                    .if_not_exists()
                    .col(pk_auto(Package::Id))
                    .col(string(Package::Family))
                    .col(string(Package::Name))
                    .col(big_integer(Package::Amount))
                    .col(integer_null(Package::Days))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Package::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Package {
    Table,
    Id,
    Family,
    Name,
    Amount,
    Days,
}
