use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Opaque random identifier carried in the `session_id` cookie.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Foreign key to users table
    pub user_id: String,

    /// SHA-256 hex digest of the refresh token bound to this session.
    #[serde(skip_serializing)]
    pub refresh_token: String,

    /// Revoked sessions are kept for audit, never deleted.
    pub is_revoked: bool,

    /// Unix timestamp (seconds).
    pub expires_at: i64,

    pub created_at: i64,

    pub user_agent: Option<String>,

    pub ip_address: Option<String>,
}

impl Model {
    pub fn is_live_at(&self, now: i64) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
