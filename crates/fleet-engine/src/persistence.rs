//! Persistence bridge: the only place `SnapshotStore` talks to a database.
//! Failures here are caught and logged by the caller, never propagated.

use fleet_core::{Level, Provider, Scope, SnapshotPayload};

/// Keyed blob store for the latest snapshot of a (provider, scope, hosts,
/// level) combination. `NullPersistence` is used in tests and whenever no
/// database is configured; `SqlxSnapshotPersistence` backs it with a real
/// table.
#[async_trait::async_trait]
pub trait SnapshotPersistence: Send + Sync {
    async fn upsert_snapshot(
        &self,
        provider: Provider,
        scope: Scope,
        hosts_key: &str,
        level: Level,
        payload: &SnapshotPayload,
    ) -> anyhow::Result<()>;

    async fn get_snapshot(
        &self,
        provider: Provider,
        scope: Scope,
        hosts_key: &str,
        level: Level,
    ) -> anyhow::Result<Option<SnapshotPayload>>;
}

/// No-op persistence: every write is discarded, every read is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistence;

#[async_trait::async_trait]
impl SnapshotPersistence for NullPersistence {
    async fn upsert_snapshot(
        &self,
        _provider: Provider,
        _scope: Scope,
        _hosts_key: &str,
        _level: Level,
        _payload: &SnapshotPayload,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_snapshot(
        &self,
        _provider: Provider,
        _scope: Scope,
        _hosts_key: &str,
        _level: Level,
    ) -> anyhow::Result<Option<SnapshotPayload>> {
        Ok(None)
    }
}

/// `sqlx`-backed implementation over a `snapshots(provider, scope, hosts_key,
/// level, payload_json, updated_at)` table. Works against any pool whose
/// database sqlx has macro support for; `SqlitePool` is the common case.
pub struct SqlxSnapshotPersistence {
    pool: sqlx::SqlitePool,
}

impl SqlxSnapshotPersistence {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the backing table if it doesn't exist yet. Call once at
    /// startup; not run implicitly so callers control migration ordering.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshots (
                provider TEXT NOT NULL,
                scope TEXT NOT NULL,
                hosts_key TEXT NOT NULL,
                level TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (provider, scope, hosts_key, level)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SnapshotPersistence for SqlxSnapshotPersistence {
    async fn upsert_snapshot(
        &self,
        provider: Provider,
        scope: Scope,
        hosts_key: &str,
        level: Level,
        payload: &SnapshotPayload,
    ) -> anyhow::Result<()> {
        let payload_json = serde_json::to_string(payload)?;
        let updated_at = payload.generated_at.to_rfc3339();
        sqlx::query(
            "INSERT INTO snapshots (provider, scope, hosts_key, level, payload_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(provider, scope, hosts_key, level)
             DO UPDATE SET payload_json = excluded.payload_json, updated_at = excluded.updated_at",
        )
        .bind(provider.as_str())
        .bind(scope.as_str())
        .bind(hosts_key)
        .bind(level.as_str())
        .bind(payload_json)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_snapshot(
        &self,
        provider: Provider,
        scope: Scope,
        hosts_key: &str,
        level: Level,
    ) -> anyhow::Result<Option<SnapshotPayload>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload_json FROM snapshots
             WHERE provider = ?1 AND scope = ?2 AND hosts_key = ?3 AND level = ?4",
        )
        .bind(provider.as_str())
        .bind(scope.as_str())
        .bind(hosts_key)
        .bind(level.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((payload_json,)) => Ok(Some(serde_json::from_str(&payload_json)?)),
            None => Ok(None),
        }
    }
}
