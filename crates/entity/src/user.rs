use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// UUIDv7 string.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Always stored trimmed and lowercased.
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id PHC string; `None` for accounts that only sign in through a provider.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// `email`, `google` or `github`: how the account was first created.
    pub provider: String,

    /// Only ever moves from false to true.
    pub onboarded: bool,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::profile::Entity")]
    Profile,

    #[sea_orm(has_many = "super::session::Entity")]
    Session,

    #[sea_orm(has_many = "super::store::Entity")]
    Store,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
