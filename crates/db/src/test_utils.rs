//! Throwaway `PostgreSQL` databases for integration tests.

use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use tracing::info;

/// Server coordinates read from `TEST_DB_*` environment variables.
#[derive(Debug, Clone)]
pub struct TestServer {
    /// `host:port` of the server.
    pub address: String,
    /// Role used to create and drop databases.
    pub user: String,
    /// Password of `user`.
    pub password: String,
}

impl TestServer {
    /// Read the server from the environment, defaulting to the local compose setup.
    #[must_use]
    pub fn from_env() -> Self {
        let var =
            |key: &str, fallback: &str| std::env::var(key).unwrap_or_else(|_| fallback.to_string());
        Self {
            address: format!(
                "{}:{}",
                var("TEST_DB_HOST", "localhost"),
                var("TEST_DB_PORT", "5433")
            ),
            user: var("TEST_DB_USER", "sinmungo_test"),
            password: var("TEST_DB_PASSWORD", "sinmungo_test"),
        }
    }

    /// Connection URL for `database` on this server.
    #[must_use]
    pub fn url(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}/{database}",
            self.user, self.password, self.address
        )
    }
}

/// A freshly created database that is dropped by [`TestDatabase::drop_database`].
pub struct TestDatabase {
    conn: Arc<DatabaseConnection>,
    server: TestServer,
    name: String,
}

impl TestDatabase {
    /// Create an empty database with a random name.
    pub async fn create_unique() -> Result<Self, DbErr> {
        let server = TestServer::from_env();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("sinmungo_test_{}", &suffix[..12]);

        let admin = Database::connect(&server.url("postgres")).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{name}\""),
            ))
            .await?;
        admin.close().await?;

        let conn = Database::connect(&server.url(&name)).await?;
        info!(database = %name, "Created test database");

        Ok(Self {
            conn: Arc::new(conn),
            server,
            name,
        })
    }

    /// Apply every migration.
    pub async fn migrate(&self) -> Result<(), DbErr> {
        use sea_orm_migration::MigratorTrait;
        crate::migrations::Migrator::up(self.conn.as_ref(), None).await
    }

    /// Shared handle for building repositories.
    #[must_use]
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.conn.clone()
    }

    /// Terminate open sessions and drop the database.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        let Self { conn, server, name } = self;
        if let Ok(conn) = Arc::try_unwrap(conn) {
            conn.close().await?;
        }

        let admin = Database::connect(&server.url("postgres")).await?;
        // Repositories may still hold pooled sessions.
        let _ = admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                     WHERE datname = '{name}'"
                ),
            ))
            .await;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("DROP DATABASE IF EXISTS \"{name}\""),
            ))
            .await?;
        admin.close().await?;

        info!(database = %name, "Dropped test database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url() {
        let server = TestServer {
            address: "db:5432".to_string(),
            user: "user".to_string(),
            password: "pass".to_string(),
        };
        assert_eq!(server.url("testdb"), "postgres://user:pass@db:5432/testdb");
    }
}
