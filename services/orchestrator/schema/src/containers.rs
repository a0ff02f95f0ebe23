use sea_orm::entity::prelude::*;

/// Container inventory row. `(host_id, container_uid)` is unique; the
/// port/env/volume lists keep the agent's reported order. `watch` is owned
/// by operators and survives inventory upserts.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "containers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub host_id: i64,
    pub container_uid: String,
    pub name: String,
    pub image: String,
    pub digest: String,
    pub ports: Vec<String>,
    pub env_vars: Vec<String>,
    pub volumes: Vec<String>,
    pub network: Option<String>,
    pub watch: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::hosts::Entity",
        from = "Column::HostId",
        to = "super::hosts::Column::Id",
        on_delete = "Cascade"
    )]
    Host,
}

impl Related<super::hosts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Host.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
