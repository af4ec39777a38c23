// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # Event Store
//!
//! SQLite persistence for credential-issuance events and authorization
//! rules.
//!
//! ## Single Writer
//!
//! The production pool is pinned to one open connection. This serializes
//! write transactions and removes most contention while keeping reasonable
//! performance for this workload. Tests instead open a named shared-cache
//! in-memory database with a larger pool and no busy timeout, so concurrent
//! transactions surface `SQLITE_BUSY`/`SQLITE_LOCKED` and exercise the
//! retry path in the service layer.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::info;

use crate::models::{Action, AuthorizationRule, CredentialEventType, NodeId, OperatorType, Resource};

/// Handle to the credential event database.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if necessary) the database at `path`.
    ///
    /// Enables WAL journaling and pins the pool to a single connection; see
    /// the module docs for why.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "credential database opened");

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open a named shared-cache in-memory database.
    ///
    /// Connections with the same `name` see the same database, which lets a
    /// multi-connection pool hit one shared store. The busy timeout is zero
    /// so lock contention is reported immediately rather than absorbed.
    pub async fn open_in_memory(name: &str) -> Result<Self, sqlx::Error> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:file:{name}?mode=memory&cache=shared"))?
                .busy_timeout(Duration::ZERO);

        // At least one connection must stay open or the shared in-memory
        // database is dropped.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// The underlying pool, for callers that need ad-hoc queries (tests).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a write transaction on the single writer.
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Close the pool, waiting for in-flight connections to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Schema
    // =========================================================================

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        // The un-migrated table shape predates operator types; creating it
        // this way keeps a fresh database and a legacy database on the same
        // migration path.
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS credential_events (
                node_id BLOB(20) NOT NULL,
                timestamp INTEGER NOT NULL,
                type INTEGER CHECK (type >= 0 AND type <= 1) NOT NULL,
                PRIMARY KEY (node_id, timestamp)
            );
            CREATE TABLE IF NOT EXISTS authorization_rules (
                node_id BLOB(20) NOT NULL,
                resource INTEGER CHECK (resource >= 0 AND resource <= 1) NOT NULL,
                action INTEGER CHECK (action >= 0 AND action <= 1) NOT NULL,
                PRIMARY KEY (node_id, resource)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        self.migrate_operator_type().await
    }

    /// Add the `operator_type` column and widen the primary key.
    ///
    /// Idempotent: a no-op when the column already exists. Pre-migration
    /// rows were all rocket-pool issuances, so they are backfilled with
    /// operator type 0.
    async fn migrate_operator_type(&self) -> Result<(), sqlx::Error> {
        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('credential_events') WHERE name = 'operator_type'",
        )
        .fetch_one(&self.pool)
        .await?;

        if existing > 0 {
            return Ok(());
        }

        sqlx::raw_sql(
            r#"
            CREATE TABLE _credential_events_copy (
                node_id BLOB(20) NOT NULL,
                timestamp INTEGER NOT NULL,
                type INTEGER CHECK (type >= 0 AND type <= 1) NOT NULL,
                operator_type INTEGER NOT NULL,
                PRIMARY KEY (node_id, operator_type, timestamp)
            );

            INSERT INTO _credential_events_copy (node_id, timestamp, type, operator_type)
                SELECT node_id, timestamp, type, 0 FROM credential_events;
            DROP TABLE credential_events;
            ALTER TABLE _credential_events_copy RENAME TO credential_events;
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("credential_events migrated to operator-type primary key");
        Ok(())
    }

    // =========================================================================
    // Event queries
    // =========================================================================

    /// Latest event timestamp and event count for `node` after `since`.
    ///
    /// Returns `(0, 0)` when no matching events exist.
    pub async fn event_max_and_count(
        conn: &mut SqliteConnection,
        node: &NodeId,
        since: i64,
        event: CredentialEventType,
        operator_type: OperatorType,
    ) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(MAX(timestamp), 0), COUNT(*) FROM credential_events \
             WHERE node_id = ? AND timestamp > ? AND type = ? AND operator_type = ?",
        )
        .bind(node.as_slice())
        .bind(since)
        .bind(event.as_i64())
        .bind(operator_type.as_i64())
        .fetch_one(conn)
        .await
    }

    /// Event timestamps for `node` in `(since, until]`, newest first.
    pub async fn list_event_timestamps(
        &self,
        node: &NodeId,
        since: i64,
        until: i64,
        event: CredentialEventType,
        operator_type: OperatorType,
        limit: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT timestamp FROM credential_events \
             WHERE node_id = ? AND timestamp > ? AND timestamp <= ? AND type = ? AND operator_type = ? \
             ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(node.as_slice())
        .bind(since)
        .bind(until)
        .bind(event.as_i64())
        .bind(operator_type.as_i64())
        .bind(limit)
        .fetch_all(self.pool())
        .await
    }

    /// Append an event row.
    ///
    /// The primary key `(node_id, operator_type, timestamp)` makes a second
    /// issuance for the same identity in the same second a constraint
    /// violation, which the caller treats as a retriable conflict.
    pub async fn insert_event(
        conn: &mut SqliteConnection,
        node: &NodeId,
        timestamp: i64,
        event: CredentialEventType,
        operator_type: OperatorType,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO credential_events (node_id, timestamp, type, operator_type) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(node.as_slice())
        .bind(timestamp)
        .bind(event.as_i64())
        .bind(operator_type.as_i64())
        .execute(conn)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Authorization rules
    // =========================================================================

    /// Whether a `Deny` rule exists for `node` on `resource`.
    pub async fn is_denied(&self, node: &NodeId, resource: Resource) -> Result<bool, sqlx::Error> {
        let denies: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM authorization_rules \
             WHERE node_id = ? AND resource = ? AND action = ?",
        )
        .bind(node.as_slice())
        .bind(resource.as_i64())
        .bind(Action::Deny.as_i64())
        .fetch_one(self.pool())
        .await?;
        Ok(denies > 0)
    }

    /// Insert or overwrite an authorization rule.
    pub async fn put_rule(&self, rule: AuthorizationRule) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO authorization_rules (node_id, resource, action) VALUES (?, ?, ?) \
             ON CONFLICT (node_id, resource) DO UPDATE SET action = excluded.action",
        )
        .bind(rule.node_id.as_slice())
        .bind(rule.resource.as_i64())
        .bind(rule.action.as_i64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Remove the rule for `node` on `resource`, if any.
    pub async fn delete_rule(&self, node: &NodeId, resource: Resource) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM authorization_rules WHERE node_id = ? AND resource = ?")
            .bind(node.as_slice())
            .bind(resource.as_i64())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

/// Whether a storage error is worth retrying.
///
/// Busy and locked conditions come from writer contention on the single
/// connection; constraint violations come from two requests for the same
/// identity racing into the same second. Both resolve on retry, when the
/// competing transaction's commit becomes visible.
pub fn is_transient(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    if db.is_unique_violation() || db.is_check_violation() {
        return true;
    }
    match db.code().as_deref().and_then(|c| c.parse::<i64>().ok()) {
        // Primary result codes: SQLITE_BUSY (5), SQLITE_LOCKED (6),
        // SQLITE_CONSTRAINT (19), including their extended forms.
        Some(code) => matches!(code & 0xff, 5 | 6 | 19),
        None => false,
    }
}
