use sea_orm_migration::{prelude::*, schema::*};

use super::m20260105_000001_create_user_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Server::Table)
                    .if_not_exists()
                    .col(pk_auto(Server::Id))
                    .col(string(Server::OwnerUsername))
                    .col(string(Server::Name))
                    .col(integer(Server::VirtualServerId))
                    .col(integer(Server::Port))
                    .col(integer(Server::Slots))
                    .col(integer_null(Server::PackageId))
                    .col(string(Server::LifecycleState).default("active"))
                    .col(timestamp_null(Server::ExpiresAt))
                    .col(boolean(Server::Autorenew).default(false))
                    .col(text(Server::BillingSnapshot))
                    .col(
                        timestamp(Server::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_server_owner_username")
                            .from(Server::Table, Server::OwnerUsername)
                            .to(User::Table, User::Username)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Server::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Server {
    Table,
    Id,
    OwnerUsername,
    Name,
    VirtualServerId,
    Port,
    Slots,
    PackageId,
    LifecycleState,
    ExpiresAt,
    Autorenew,
    BillingSnapshot,
    CreatedAt,
}
