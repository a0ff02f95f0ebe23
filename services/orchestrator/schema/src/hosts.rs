use sea_orm::entity::prelude::*;

/// Managed host, keyed by the stable MAC address of its first non-loopback
/// interface. Rows are never deleted by the control plane.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "hosts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub mac_address: String,
    pub hostname: String,
    pub ip_address: String,
    pub last_heartbeat: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::containers::Entity")]
    Containers,
    #[sea_orm(has_many = "super::update_status::Entity")]
    UpdateStatus,
}

impl Related<super::containers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Containers.def()
    }
}

impl Related<super::update_status::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UpdateStatus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
