pub use sea_orm_migration::prelude::*;

mod m20260110_000001_create_auth_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260110_000001_create_auth_tables::Migration)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::sea_orm::{ConnectOptions, ConnectionTrait, Database};

    #[tokio::test]
    async fn up_then_down_on_sqlite() {
        // Every pooled connection to `:memory:` is its own database.
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1);
        let db = Database::connect(options).await.unwrap();

        Migrator::up(&db, None).await.unwrap();
        for table in ["users", "profiles", "sessions", "stores"] {
            assert!(
                SchemaManager::new(&db).has_table(table).await.unwrap(),
                "missing table {table}"
            );
        }

        Migrator::down(&db, None).await.unwrap();
        assert!(!SchemaManager::new(&db).has_table("users").await.unwrap());

        // Connection stays usable after a full rollback.
        db.execute_unprepared("SELECT 1").await.unwrap();
    }
}
