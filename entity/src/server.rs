use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "server")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub owner_username: String,
    pub name: String,
    /// Virtual server id addressed through the TeamSpeak query interface.
    pub virtual_server_id: i32,
    pub port: i32,
    /// Desired slot count.
    pub slots: i32,
    pub package_id: Option<i32>,
    pub lifecycle_state: String,
    pub expires_at: Option<DateTimeUtc>,
    pub autorenew: bool,
    #[sea_orm(column_type = "Text")]
    pub billing_snapshot: String,
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
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
