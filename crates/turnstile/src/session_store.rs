use actix_web::{http::header, HttpRequest};
use chrono::Utc;
use entity::session;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, TransactionTrait,
};
use turnstile_core::crypto;

use crate::config::SessionWritePolicy;
use crate::error::AuthError;

const USER_AGENT_MAX_LEN: usize = 512;

/// Request fingerprint recorded on each session row.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl ClientInfo {
    pub fn from_request(req: &HttpRequest) -> Self {
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(USER_AGENT_MAX_LEN).collect());

        // Forwarded headers are client-controlled; record the socket peer.
        let ip_address = req.peer_addr().map(|addr| addr.ip().to_string());

        Self {
            user_agent,
            ip_address,
        }
    }
}

/// Persistence for login sessions. Rows are revoked, never deleted.
#[derive(Clone)]
pub struct SessionStore {
    db: DatabaseConnection,
    ttl: i64,
    write_policy: SessionWritePolicy,
}

impl SessionStore {
    pub fn new(db: DatabaseConnection, ttl: i64, write_policy: SessionWritePolicy) -> Self {
        Self {
            db,
            ttl,
            write_policy,
        }
    }

    async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        session_id: &str,
        user_id: &str,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<(), DbErr> {
        let now = Utc::now().timestamp();
        let row = session::ActiveModel {
            id: Set(session_id.to_string()),
            user_id: Set(user_id.to_string()),
            refresh_token: Set(crypto::sha256_hex(refresh_token)),
            is_revoked: Set(false),
            expires_at: Set(now + self.ttl),
            created_at: Set(now),
            user_agent: Set(client.user_agent.clone()),
            ip_address: Set(client.ip_address.clone()),
        };

        session::Entity::insert(row).exec_without_returning(conn).await?;
        Ok(())
    }

    /// Persist a new session bound to `refresh_token` and return its id.
    pub async fn create_session(
        &self,
        user_id: &str,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<String, AuthError> {
        let session_id = crypto::new_session_id();

        match self
            .insert(&self.db, &session_id, user_id, refresh_token, client)
            .await
        {
            Ok(()) => {
                log::debug!("Created session for user {user_id}");
                Ok(session_id)
            }
            Err(e) => match self.write_policy {
                SessionWritePolicy::Strict => {
                    log::error!("Failed to persist session for user {user_id}: {e}");
                    Err(e.into())
                }
                SessionWritePolicy::Degraded => {
                    log::error!(
                        "Failed to persist session for user {user_id}: {e}; continuing with an unsaved session"
                    );
                    Ok(session_id)
                }
            },
        }
    }

    /// The session row, if it exists, is not revoked and has not expired.
    pub async fn find_live(&self, session_id: &str) -> Result<Option<session::Model>, AuthError> {
        let now = Utc::now().timestamp();
        let found = session::Entity::find_by_id(session_id.to_string())
            .one(&self.db)
            .await?;

        Ok(found.filter(|s| s.is_live_at(now)))
    }

    pub async fn is_live(&self, session_id: &str) -> Result<bool, AuthError> {
        Ok(self.find_live(session_id).await?.is_some())
    }

    /// Idempotent: revoking an unknown or already revoked session is not an error.
    pub async fn revoke(&self, session_id: &str) -> Result<(), AuthError> {
        let result = session::Entity::update_many()
            .col_expr(session::Column::IsRevoked, Expr::value(true))
            .filter(session::Column::Id.eq(session_id))
            .filter(session::Column::IsRevoked.eq(false))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            log::info!("Revoked session {}", short_id(session_id));
        }
        Ok(())
    }

    /// Revoke `old_id` and open a replacement bound to `new_refresh_token`, atomically.
    ///
    /// The revoke is a conditional update on a live row owned by `user_id`. When two
    /// rotations race on the same session only one update matches; the other rolls back
    /// and gets `SessionRevoked`.
    pub async fn rotate_session(
        &self,
        old_id: &str,
        user_id: &str,
        new_refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let txn = self.db.begin().await?;

        let revoked = session::Entity::update_many()
            .col_expr(session::Column::IsRevoked, Expr::value(true))
            .filter(session::Column::Id.eq(old_id))
            .filter(session::Column::UserId.eq(user_id))
            .filter(session::Column::IsRevoked.eq(false))
            .filter(session::Column::ExpiresAt.gt(now))
            .exec(&txn)
            .await?;

        if revoked.rows_affected != 1 {
            txn.rollback().await?;
            log::warn!(
                "Refused to rotate session {} for user {user_id}: not live",
                short_id(old_id)
            );
            return Err(AuthError::SessionRevoked);
        }

        let new_id = crypto::new_session_id();
        self.insert(&txn, &new_id, user_id, new_refresh_token, client)
            .await?;
        txn.commit().await?;

        log::info!(
            "Rotated session {} -> {} for user {user_id}",
            short_id(old_id),
            short_id(&new_id)
        );
        Ok(new_id)
    }

    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let result = session::Entity::update_many()
            .col_expr(session::Column::IsRevoked, Expr::value(true))
            .filter(session::Column::UserId.eq(user_id))
            .filter(session::Column::IsRevoked.eq(false))
            .exec(&self.db)
            .await?;

        log::info!("Revoked {} session(s) for user {user_id}", result.rows_affected);
        Ok(result.rows_affected)
    }
}

/// Enough of a session id to correlate log lines without making the log a credential store.
fn short_id(session_id: &str) -> &str {
    let end = session_id
        .char_indices()
        .nth(8)
        .map_or(session_id.len(), |(i, _)| i);
    &session_id[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use sea_orm::PaginatorTrait;

    fn client() -> ClientInfo {
        ClientInfo {
            user_agent: Some("test-agent".into()),
            ip_address: Some("127.0.0.1".into()),
        }
    }

    #[actix_web::test]
    async fn create_then_revoke() {
        let db = test_support::test_db().await;
        let user = test_support::seed_user(&db, "a@example.com").await;
        let store = SessionStore::new(db.clone(), 3600, SessionWritePolicy::Strict);

        let sid = store.create_session(&user.id, "refresh-1", &client()).await.unwrap();
        assert!(store.is_live(&sid).await.unwrap());

        let row = store.find_live(&sid).await.unwrap().unwrap();
        assert_eq!(row.refresh_token, crypto::sha256_hex("refresh-1"));
        assert_eq!(row.user_agent.as_deref(), Some("test-agent"));

        store.revoke(&sid).await.unwrap();
        assert!(!store.is_live(&sid).await.unwrap());

        // Second revoke is a no-op.
        store.revoke(&sid).await.unwrap();
        store.revoke("does-not-exist").await.unwrap();
    }

    #[actix_web::test]
    async fn expired_sessions_are_not_live() {
        let db = test_support::test_db().await;
        let user = test_support::seed_user(&db, "a@example.com").await;
        let store = SessionStore::new(db.clone(), -1, SessionWritePolicy::Strict);

        let sid = store.create_session(&user.id, "refresh-1", &client()).await.unwrap();
        assert!(!store.is_live(&sid).await.unwrap());
    }

    #[actix_web::test]
    async fn rotate_revokes_old_and_opens_new() {
        let db = test_support::test_db().await;
        let user = test_support::seed_user(&db, "a@example.com").await;
        let store = SessionStore::new(db.clone(), 3600, SessionWritePolicy::Strict);

        let old = store.create_session(&user.id, "refresh-1", &client()).await.unwrap();
        let new = store
            .rotate_session(&old, &user.id, "refresh-2", &client())
            .await
            .unwrap();

        assert_ne!(old, new);
        assert!(!store.is_live(&old).await.unwrap());
        assert!(store.is_live(&new).await.unwrap());

        let replay = store.rotate_session(&old, &user.id, "refresh-3", &client()).await;
        assert!(matches!(replay, Err(AuthError::SessionRevoked)));
    }

    #[actix_web::test]
    async fn rotate_refuses_foreign_user() {
        let db = test_support::test_db().await;
        let alice = test_support::seed_user(&db, "alice@example.com").await;
        let mallory = test_support::seed_user(&db, "mallory@example.com").await;
        let store = SessionStore::new(db.clone(), 3600, SessionWritePolicy::Strict);

        let sid = store.create_session(&alice.id, "refresh-1", &client()).await.unwrap();
        let stolen = store.rotate_session(&sid, &mallory.id, "refresh-2", &client()).await;

        assert!(matches!(stolen, Err(AuthError::SessionRevoked)));
        assert!(store.is_live(&sid).await.unwrap());
    }

    #[actix_web::test]
    async fn concurrent_rotations_have_one_winner() {
        let db = test_support::test_db().await;
        let user = test_support::seed_user(&db, "a@example.com").await;
        let store = SessionStore::new(db.clone(), 3600, SessionWritePolicy::Strict);
        let old = store.create_session(&user.id, "refresh-1", &client()).await.unwrap();

        let info = client();
        let (a, b) = tokio::join!(
            store.rotate_session(&old, &user.id, "refresh-a", &info),
            store.rotate_session(&old, &user.id, "refresh-b", &info),
        );

        let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!([a, b]
            .into_iter()
            .any(|r| matches!(r, Err(AuthError::SessionRevoked))));
    }

    #[actix_web::test]
    async fn contended_rotations_on_a_pooled_database_have_one_winner() {
        let (db, path) = test_support::test_file_db(4).await;
        let user = test_support::seed_user(&db, "a@example.com").await;
        let store = SessionStore::new(db.clone(), 3600, SessionWritePolicy::Strict);
        let old = store.create_session(&user.id, "refresh-1", &client()).await.unwrap();

        let info = client();
        let (a, b, c) = tokio::join!(
            store.rotate_session(&old, &user.id, "refresh-a", &info),
            store.rotate_session(&old, &user.id, "refresh-b", &info),
            store.rotate_session(&old, &user.id, "refresh-c", &info),
        );

        // Losers either see the revoked row or lose the SQLite write lock; neither may
        // produce a session.
        let results = [a, b, c];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(!store.is_live(&old).await.unwrap());

        let live = session::Entity::find()
            .filter(session::Column::UserId.eq(user.id.as_str()))
            .filter(session::Column::IsRevoked.eq(false))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(live, 1);

        db.close().await.unwrap();
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn client_ip_ignores_forwarded_headers() {
        let req = actix_web::test::TestRequest::default()
            .peer_addr("10.1.2.3:54321".parse().unwrap())
            .insert_header(("x-forwarded-for", "6.6.6.6"))
            .insert_header(("forwarded", "for=6.6.6.6"))
            .insert_header((header::USER_AGENT, "curl/8"))
            .to_http_request();

        let info = ClientInfo::from_request(&req);
        assert_eq!(info.ip_address.as_deref(), Some("10.1.2.3"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8"));
    }

    #[actix_web::test]
    async fn strict_policy_surfaces_storage_errors() {
        let db = test_support::test_db().await;
        let store = SessionStore::new(db.clone(), 3600, SessionWritePolicy::Strict);

        // No such user: the foreign key rejects the insert.
        let result = store.create_session("ghost", "refresh-1", &client()).await;
        assert!(matches!(result, Err(AuthError::Storage(_))));
    }

    #[actix_web::test]
    async fn degraded_policy_still_returns_an_id() {
        let db = test_support::test_db().await;
        let store = SessionStore::new(db.clone(), 3600, SessionWritePolicy::Degraded);

        let sid = store.create_session("ghost", "refresh-1", &client()).await.unwrap();
        assert_eq!(sid.len(), 43);
        assert!(!store.is_live(&sid).await.unwrap());
    }

    #[actix_web::test]
    async fn revoke_all_for_user_counts_live_sessions() {
        let db = test_support::test_db().await;
        let user = test_support::seed_user(&db, "a@example.com").await;
        let store = SessionStore::new(db.clone(), 3600, SessionWritePolicy::Strict);

        let a = store.create_session(&user.id, "r1", &client()).await.unwrap();
        store.create_session(&user.id, "r2", &client()).await.unwrap();
        store.revoke(&a).await.unwrap();

        assert_eq!(store.revoke_all_for_user(&user.id).await.unwrap(), 1);
    }

    #[test]
    fn short_id_truncates() {
        assert_eq!(short_id("abcdefghijkl"), "abcdefgh");
        assert_eq!(short_id("abc"), "abc");
    }
}
