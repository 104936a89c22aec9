use sea_orm_migration::{prelude::*, schema::*};

use super::{
    m20260105_000001_create_user_table::User, m20260105_000002_create_panel_table::Panel,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bot::Table)
                    .if_not_exists()
                    .col(pk_auto(Bot::Id))
                    .col(string(Bot::Family))
                    .col(string(Bot::TemplateName))
                    .col(string(Bot::OwnerUsername))
                    .col(integer_null(Bot::PanelId))
                    .col(integer_null(Bot::PackageId))
                    .col(string(Bot::LifecycleState).default("active"))
                    .col(string(Bot::ConnectionStatus).default("offline"))
                    .col(timestamp_null(Bot::ExpiresAt))
                    .col(boolean(Bot::Autorenew).default(false))
                    .col(text(Bot::BillingSnapshot))
                    .col(text(Bot::Template))
                    .col(
                        timestamp(Bot::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bot_owner_username")
                            .from(Bot::Table, Bot::OwnerUsername)
                            .to(User::Table, User::Username)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bot_panel_id")
                            .from(Bot::Table, Bot::PanelId)
                            .to(Panel::Table, Panel::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Template names address bots on their remote panel and must not collide
        // within a family.
        manager
            .create_index(
                Index::create()
                    .name("idx_bot_family_template_name")
                    .table(Bot::Table)
                    .col(Bot::Family)
                    .col(Bot::TemplateName)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bot::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Bot {
    Table,
    Id,
    Family,
    TemplateName,
    OwnerUsername,
    PanelId,
    PackageId,
    LifecycleState,
    ConnectionStatus,
    ExpiresAt,
    Autorenew,
    BillingSnapshot,
    Template,
    CreatedAt,
}
