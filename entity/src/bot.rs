use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "bot")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub family: String,
    pub template_name: String,
    pub owner_username: String,
    pub panel_id: Option<i32>,
    pub package_id: Option<i32>,
    pub lifecycle_state: String,
    pub connection_status: String,
    pub expires_at: Option<DateTimeUtc>,
    pub autorenew: bool,
    /// JSON encoded billing basis frozen at creation or edit time.
    #[sea_orm(column_type = "Text")]
    pub billing_snapshot: String,
    /// JSON encoded template data sent to the panel on (re)creation.
    #[sea_orm(column_type = "Text")]
    pub template: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerUsername",
        to = "super::user::Column::Username",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::panel::Entity",
        from = "Column::PanelId",
        to = "super::panel::Column::Id",
        on_delete = "SetNull",
        on_update = "Cascade"
    )]
    Panel,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::panel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Panel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
