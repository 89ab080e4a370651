use chrono::Utc;
use entity::{profile, store, user};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    SqlErr, TransactionTrait,
};
use turnstile_core::credentials::normalize_email;
use turnstile_core::models::{OnboardingPayload, Role};
use turnstile_core::oauth::AuthProvider;
use uuid::Uuid;

use crate::error::AuthError;

/// Users, their profiles and the onboarding flag.
#[derive(Clone)]
pub struct ProfileRepository {
    db: DatabaseConnection,
}

impl ProfileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<user::Model>, AuthError> {
        Ok(user::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, AuthError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await?)
    }

    pub async fn find_profile(&self, user_id: &str) -> Result<Option<profile::Model>, AuthError> {
        Ok(profile::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?)
    }

    pub async fn list_users(&self) -> Result<Vec<user::Model>, AuthError> {
        Ok(user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Return the account for `email`, creating it (with an empty profile) if it is new.
    ///
    /// The boolean is `true` only when this call inserted the row. `password_hash` is
    /// stored only on creation. A concurrent insert of the same email loses on the unique
    /// index and resolves to the winner's row.
    pub async fn find_or_create_by_email(
        &self,
        email: &str,
        provider: AuthProvider,
        password_hash: Option<String>,
    ) -> Result<(user::Model, bool), AuthError> {
        let email = normalize_email(email);
        if let Some(existing) = self.find_by_email(&email).await? {
            return Ok((existing, false));
        }

        let now = Utc::now().timestamp();
        let created = user::Model {
            id: Uuid::now_v7().to_string(),
            email: email.clone(),
            password_hash,
            provider: provider.as_str().to_string(),
            onboarded: false,
            created_at: now,
            updated_at: now,
        };

        let txn = self.db.begin().await?;

        let insert = user::Entity::insert(user::ActiveModel {
            id: Set(created.id.clone()),
            email: Set(created.email.clone()),
            password_hash: Set(created.password_hash.clone()),
            provider: Set(created.provider.clone()),
            onboarded: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await;

        match insert {
            Ok(_) => {}
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                txn.rollback().await?;
                log::info!("Concurrent signup for {email}; using the existing account");
                let existing = self.find_by_email(&email).await?.ok_or_else(|| {
                    AuthError::Internal(format!("account for {email} vanished after a unique violation"))
                })?;
                return Ok((existing, false));
            }
            Err(e) => return Err(e.into()),
        }

        profile::Entity::insert(profile::ActiveModel {
            id: Set(created.id.clone()),
            full_name: Set(None),
            role: Set(None),
            referral_source: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await?;

        txn.commit().await?;

        log::info!(
            "Created user {} ({}) via {}",
            created.id,
            created.email,
            created.provider
        );
        Ok((created, true))
    }

    /// Record the onboarding answers and flip `users.onboarded` in one transaction.
    ///
    /// Sellers also get a `stores` row. If any statement fails nothing is kept: the flag
    /// stays false and the profile keeps its previous contents.
    pub async fn mark_onboarded(
        &self,
        user_id: &str,
        fields: &OnboardingPayload,
    ) -> Result<(), AuthError> {
        let now = Utc::now().timestamp();
        let txn = self.db.begin().await?;

        let flipped = user::Entity::update_many()
            .col_expr(user::Column::Onboarded, Expr::value(true))
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(user_id))
            .filter(user::Column::Onboarded.eq(false))
            .exec(&txn)
            .await?;

        if flipped.rows_affected == 0 {
            let exists = user::Entity::find_by_id(user_id.to_string())
                .one(&txn)
                .await?
                .is_some();
            txn.rollback().await?;
            return Err(if exists {
                AuthError::AlreadyOnboarded
            } else {
                AuthError::UserNotFound
            });
        }

        profile::Entity::insert(profile::ActiveModel {
            id: Set(user_id.to_string()),
            full_name: Set(Some(fields.full_name.trim().to_string())),
            role: Set(Some(fields.role.as_str().to_string())),
            referral_source: Set(fields.referral_source.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(profile::Column::Id)
                .update_columns([
                    profile::Column::FullName,
                    profile::Column::Role,
                    profile::Column::ReferralSource,
                    profile::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        if fields.role == Role::Seller {
            let details = fields.store.as_ref().ok_or_else(|| {
                AuthError::InvalidInput("Sellers must provide store details".to_string())
            })?;

            store::Entity::insert(store::ActiveModel {
                id: Set(Uuid::now_v7().to_string()),
                owner_id: Set(user_id.to_string()),
                store_name: Set(details.store_name.trim().to_string()),
                address: Set(details.address.clone()),
                contact: Set(details.contact.trim().to_string()),
                category: Set(details.category.clone()),
                created_at: Set(now),
            })
            .exec_without_returning(&txn)
            .await?;
        }

        txn.commit().await?;

        log::info!("User {user_id} completed onboarding as {}", fields.role.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use sea_orm::{ConnectionTrait, PaginatorTrait};
    use turnstile_core::models::StoreDetails;

    fn buyer() -> OnboardingPayload {
        OnboardingPayload {
            full_name: "Ada Lovelace".into(),
            role: Role::Buyer,
            referral_source: Some("friend".into()),
            store: None,
        }
    }

    fn seller() -> OnboardingPayload {
        OnboardingPayload {
            full_name: "Charles Babbage".into(),
            role: Role::Seller,
            referral_source: None,
            store: Some(StoreDetails {
                store_name: "Difference Engines".into(),
                address: Some("1 Dorset St".into()),
                contact: "+44 20 7946 0000".into(),
                category: Some("machines".into()),
            }),
        }
    }

    #[actix_web::test]
    async fn find_or_create_is_idempotent_per_email() {
        let db = test_support::test_db().await;
        let repo = ProfileRepository::new(db.clone());

        let (first, created) = repo
            .find_or_create_by_email("New@Example.com", AuthProvider::Google, None)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.email, "new@example.com");
        assert_eq!(first.provider, "google");
        assert!(!first.onboarded);
        assert!(first.password_hash.is_none());

        let (second, created) = repo
            .find_or_create_by_email("new@example.com ", AuthProvider::Github, None)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.provider, "google");

        let profile = repo.find_profile(&first.id).await.unwrap().unwrap();
        assert!(profile.full_name.is_none());
        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn mark_onboarded_buyer() {
        let db = test_support::test_db().await;
        let repo = ProfileRepository::new(db.clone());
        let user = test_support::seed_user(&db, "buyer@example.com").await;

        repo.mark_onboarded(&user.id, &buyer()).await.unwrap();

        let reloaded = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(reloaded.onboarded);
        let profile = repo.find_profile(&user.id).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(profile.role.as_deref(), Some("buyer"));
        assert_eq!(store::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn mark_onboarded_seller_creates_store() {
        let db = test_support::test_db().await;
        let repo = ProfileRepository::new(db.clone());
        let user = test_support::seed_user(&db, "seller@example.com").await;

        repo.mark_onboarded(&user.id, &seller()).await.unwrap();

        let stores = store::Entity::find().all(&db).await.unwrap();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].owner_id, user.id);
        assert_eq!(stores[0].store_name, "Difference Engines");
    }

    #[actix_web::test]
    async fn onboarding_only_happens_once() {
        let db = test_support::test_db().await;
        let repo = ProfileRepository::new(db.clone());
        let user = test_support::seed_user(&db, "once@example.com").await;

        repo.mark_onboarded(&user.id, &buyer()).await.unwrap();
        let again = repo.mark_onboarded(&user.id, &seller()).await;

        assert!(matches!(again, Err(AuthError::AlreadyOnboarded)));
        assert_eq!(store::Entity::find().count(&db).await.unwrap(), 0);

        let missing = repo.mark_onboarded("nobody", &buyer()).await;
        assert!(matches!(missing, Err(AuthError::UserNotFound)));
    }

    #[actix_web::test]
    async fn failed_store_insert_rolls_everything_back() {
        let db = test_support::test_db().await;
        let repo = ProfileRepository::new(db.clone());
        let user = test_support::seed_user(&db, "seller@example.com").await;

        db.execute_unprepared("DROP TABLE stores").await.unwrap();

        let result = repo.mark_onboarded(&user.id, &seller()).await;
        assert!(matches!(result, Err(AuthError::Storage(_))));

        let reloaded = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(!reloaded.onboarded);
        let profile = repo.find_profile(&user.id).await.unwrap().unwrap();
        assert!(profile.full_name.is_none());
        assert!(profile.role.is_none());
    }
}
