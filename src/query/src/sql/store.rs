//! SQLite relational cache of the directory

use crate::config::DatabaseConfig;
use crate::error::{QueryError, Result};
use async_trait::async_trait;
use dirgate_core::{CoreError, DirectoryBackend, EntityId, Group, InMemoryDirectory, User};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

pub(crate) fn group_from_row(row: &SqliteRow) -> std::result::Result<Group, sqlx::Error> {
    let id: String = row.try_get("id")?;
    Ok(Group {
        id: EntityId::from(id),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

pub(crate) fn user_from_row(row: &SqliteRow) -> std::result::Result<User, sqlx::Error> {
    let id: String = row.try_get("id")?;
    Ok(User {
        id: EntityId::from(id),
        username: row.try_get("username")?,
        last_name: row.try_get("last_name")?,
        first_name: row.try_get("first_name")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        active: row.try_get("active")?,
    })
}

fn db_error(context: &str, err: sqlx::Error) -> CoreError {
    CoreError::database(format!("{}: {}", context, err))
}

/// Directory cached in SQLite
///
/// Holds entities, one-hop membership edges and the transitive closure,
/// both as recursive views and as materialized tables. `LIKE` is made
/// case-sensitive on every connection so it agrees with the in-memory
/// pattern matcher.
#[derive(Debug, Clone)]
pub struct SqlDirectory {
    pool: SqlitePool,
}

impl SqlDirectory {
    /// Open a pool for `config.url` and install the schema
    ///
    /// Every connection to `sqlite::memory:` opens its own database, so the
    /// pool keeps a single connection alive for its whole lifetime there.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| QueryError::configuration(format!("Invalid database url: {}", e)))?
            .create_if_missing(true)
            .pragma("case_sensitive_like", "ON");

        let in_memory = config.url.contains(":memory:");
        let max_connections = if in_memory { 1 } else { config.max_connections };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(if in_memory { 1 } else { 0 })
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| QueryError::database(format!("Failed to connect to database: {}", e)))?;

        let directory = Self { pool };
        directory.run_migrations().await?;
        Ok(directory)
    }

    /// In-memory cache with default settings
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&DatabaseConfig::default()).await
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("directory schema migrated");
        Ok(())
    }

    /// Get database pool for compiled queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Replace the cached directory with `source` and rebuild the closure
    ///
    /// Runs as one transaction. Group self-loops are dropped.
    pub async fn import(&self, source: &InMemoryDirectory) -> Result<()> {
        let snapshot = source.snapshot();
        let mut tx = self.pool.begin().await?;

        for table in ["user_membership", "group_membership", "users", "groups"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        for group in &snapshot.groups {
            sqlx::query("INSERT INTO groups (id, name, description) VALUES (?, ?, ?)")
                .bind(group.id.as_str())
                .bind(&group.name)
                .bind(&group.description)
                .execute(&mut *tx)
                .await?;
        }

        for user in &snapshot.users {
            sqlx::query(
                r#"
                INSERT INTO users (id, username, last_name, first_name, display_name, email, active)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user.id.as_str())
            .bind(&user.username)
            .bind(&user.last_name)
            .bind(&user.first_name)
            .bind(&user.display_name)
            .bind(&user.email)
            .bind(user.active)
            .execute(&mut *tx)
            .await?;
        }

        for edge in snapshot.group_members.iter().filter(|e| e.parent != e.member) {
            sqlx::query("INSERT OR IGNORE INTO group_membership (parent_group_id, member_group_id) VALUES (?, ?)")
                .bind(edge.parent.as_str())
                .bind(edge.member.as_str())
                .execute(&mut *tx)
                .await?;
        }

        for edge in &snapshot.user_members {
            sqlx::query("INSERT OR IGNORE INTO user_membership (parent_group_id, member_user_id) VALUES (?, ?)")
                .bind(edge.parent.as_str())
                .bind(edge.member.as_str())
                .execute(&mut *tx)
                .await?;
        }

        rebuild_closures(&mut tx).await?;
        tx.commit().await?;

        info!(
            groups = snapshot.groups.len(),
            users = snapshot.users.len(),
            group_edges = snapshot.group_members.len(),
            user_edges = snapshot.user_members.len(),
            "directory imported"
        );
        Ok(())
    }

    /// Rebuild the materialized closure tables
    ///
    /// Readers see either the previous closure or the new one, never a mix.
    pub async fn refresh_closures(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        rebuild_closures(&mut tx).await?;
        tx.commit().await?;
        info!("membership closure refreshed");
        Ok(())
    }

    async fn fetch_ids(&self, sql: &str, id: &EntityId, context: &str) -> dirgate_core::Result<Vec<EntityId>> {
        let rows = sqlx::query(sql)
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(context, e))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map(EntityId::from))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_error(context, e))
    }
}

async fn rebuild_closures(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    sqlx::query("DELETE FROM group_membership_transitive")
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM user_membership_transitive")
        .execute(&mut **tx)
        .await?;

    let groups = sqlx::query(
        r#"
        INSERT INTO group_membership_transitive (parent_group_id, member_group_id, depth, down_key, up_key)
        SELECT parent_group_id, member_group_id, depth, down_key, up_key FROM group_membership_closure
        "#,
    )
    .execute(&mut **tx)
    .await?;

    let users = sqlx::query(
        r#"
        INSERT INTO user_membership_transitive (parent_group_id, member_user_id, depth, down_key, up_key)
        SELECT parent_group_id, member_user_id, depth, down_key, up_key FROM user_membership_closure
        "#,
    )
    .execute(&mut **tx)
    .await?;

    debug!(
        group_rows = groups.rows_affected(),
        user_rows = users.rows_affected(),
        "closure tables rebuilt"
    );
    Ok(())
}

#[async_trait]
impl DirectoryBackend for SqlDirectory {
    async fn group(&self, id: &EntityId) -> dirgate_core::Result<Option<Group>> {
        let row = sqlx::query("SELECT id, name, description FROM groups WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get group", e))?;

        row.map(|row| group_from_row(&row))
            .transpose()
            .map_err(|e| db_error("Failed to parse group", e))
    }

    async fn user(&self, id: &EntityId) -> dirgate_core::Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, last_name, first_name, display_name, email, active FROM users WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get user", e))?;

        row.map(|row| user_from_row(&row))
            .transpose()
            .map_err(|e| db_error("Failed to parse user", e))
    }

    async fn groups(&self) -> dirgate_core::Result<Vec<Group>> {
        let rows = sqlx::query("SELECT id, name, description FROM groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list groups", e))?;

        rows.iter()
            .map(group_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_error("Failed to parse group", e))
    }

    async fn users(&self) -> dirgate_core::Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, username, last_name, first_name, display_name, email, active FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list users", e))?;

        rows.iter()
            .map(user_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_error("Failed to parse user", e))
    }

    async fn member_groups_of(&self, group: &EntityId) -> dirgate_core::Result<Vec<EntityId>> {
        self.fetch_ids(
            "SELECT member_group_id FROM group_membership WHERE parent_group_id = ? ORDER BY seq",
            group,
            "Failed to list member groups",
        )
        .await
    }

    async fn member_users_of(&self, group: &EntityId) -> dirgate_core::Result<Vec<EntityId>> {
        self.fetch_ids(
            "SELECT member_user_id FROM user_membership WHERE parent_group_id = ? ORDER BY seq",
            group,
            "Failed to list member users",
        )
        .await
    }

    async fn parent_groups_of_group(&self, group: &EntityId) -> dirgate_core::Result<Vec<EntityId>> {
        self.fetch_ids(
            "SELECT parent_group_id FROM group_membership WHERE member_group_id = ? ORDER BY seq",
            group,
            "Failed to list parent groups",
        )
        .await
    }

    async fn parent_groups_of_user(&self, user: &EntityId) -> dirgate_core::Result<Vec<EntityId>> {
        self.fetch_ids(
            "SELECT parent_group_id FROM user_membership WHERE member_user_id = ? ORDER BY seq",
            user,
            "Failed to list user groups",
        )
        .await
    }
}
