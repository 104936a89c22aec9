use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Panel::Table)
                    .if_not_exists()
                    .col(pk_auto(Panel::Id))
                    .col(string(Panel::Family))
                    .col(string(Panel::Name))
                    .col(string(Panel::Host))
                    .col(string(Panel::Token))
                    .col(integer(Panel::MaxBotCapacity))
                    .col(integer(Panel::CurrentBotCount).default(0))
                    .col(string(Panel::Status).default("offline"))
                    .col(
                        timestamp(Panel::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Panel::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Panel {
    Table,
    Id,
    Family,
    Name,
    Host,
    Token,
    MaxBotCapacity,
    CurrentBotCount,
    Status,
    CreatedAt,
}
