//! # SQLite Task Store
//!
//! Embedded relational store adapter built on sqlx. Suited to single-node
//! deployments and test harnesses; the compare-and-swap contract maps onto a
//! conditional `UPDATE ... WHERE status = ?` checked via `rows_affected`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::constants::TASK_TABLE;
use crate::models::{StatusUpdate, TaskRecord, TaskStatus};

use super::errors::{StoreError, StoreResult};
use super::TaskStore;

/// SQLite-backed task store
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

/// Row shape as persisted; `status` stays a string until decode
#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    partition: String,
    row_key: String,
    activity_type: String,
    status: String,
    input_payload: String,
    output_payload: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    fn into_record(self) -> StoreResult<TaskRecord> {
        let status = TaskStatus::from_str(&self.status)
            .map_err(|e| StoreError::backend("decode", e))?;
        Ok(TaskRecord {
            partition: self.partition,
            row_key: self.row_key,
            activity_type: self.activity_type,
            status,
            input_payload: self.input_payload,
            output_payload: self.output_payload,
            error_message: self.error_message,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

const SELECT_COLUMNS: &str = "partition_key AS partition, row_key, activity_type, status, \
     input_payload, output_payload, error_message, created_at, started_at, completed_at";

impl SqliteTaskStore {
    /// Open (creating if missing) a database file at `path`
    pub async fn connect(path: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!(path = %path, "connected to sqlite task store");
        Ok(Self { pool })
    }

    /// Open a private in-memory database. The pool is pinned to a single
    /// connection: each SQLite `:memory:` connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(StoreError::from)?;
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Build a store over an existing connection pool
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create_if_not_exists(&self) -> StoreResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {TASK_TABLE} (\
                 partition_key  TEXT NOT NULL,\
                 row_key        TEXT NOT NULL,\
                 activity_type  TEXT NOT NULL,\
                 status         TEXT NOT NULL,\
                 input_payload  TEXT NOT NULL,\
                 output_payload TEXT,\
                 error_message  TEXT,\
                 created_at     TEXT NOT NULL,\
                 started_at     TEXT,\
                 completed_at   TEXT,\
                 PRIMARY KEY (partition_key, row_key)\
             )"
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        debug!(table = TASK_TABLE, "task table ensured");
        Ok(())
    }

    async fn create(&self, record: &TaskRecord) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {TASK_TABLE} \
             (partition_key, row_key, activity_type, status, input_payload, \
              output_payload, error_message, created_at, started_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        );
        let result = sqlx::query(&sql)
            .bind(&record.partition)
            .bind(&record.row_key)
            .bind(&record.activity_type)
            .bind(record.status.to_string())
            .bind(&record.input_payload)
            .bind(record.output_payload.as_deref())
            .bind(record.error_message.as_deref())
            .bind(record.created_at)
            .bind(record.started_at)
            .bind(record.completed_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!(
                    partition = %record.partition,
                    row_key = %record.row_key,
                    activity_type = %record.activity_type,
                    "task record created"
                );
                Ok(())
            }
            Err(e) => {
                let unique_violation = e
                    .as_database_error()
                    .map(|d| matches!(d.kind(), sqlx::error::ErrorKind::UniqueViolation))
                    .unwrap_or(false);
                if unique_violation {
                    Err(StoreError::already_exists(
                        &record.partition,
                        &record.row_key,
                    ))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn get(&self, partition: &str, row_key: &str) -> StoreResult<Option<TaskRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {TASK_TABLE} \
             WHERE partition_key = ?1 AND row_key = ?2"
        );
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(partition)
            .bind(row_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TaskRow::into_record).transpose()
    }

    async fn update_status(
        &self,
        partition: &str,
        row_key: &str,
        expected: TaskStatus,
        update: StatusUpdate,
    ) -> StoreResult<TaskRecord> {
        // The WHERE clause carries the expected status, so the transition and
        // the status check are one atomic statement.
        let sql = format!(
            "UPDATE {TASK_TABLE} SET \
                 status = ?1, \
                 started_at = COALESCE(?2, started_at), \
                 output_payload = COALESCE(?3, output_payload), \
                 error_message = COALESCE(?4, error_message), \
                 completed_at = COALESCE(?5, completed_at) \
             WHERE partition_key = ?6 AND row_key = ?7 AND status = ?8"
        );
        let result = sqlx::query(&sql)
            .bind(update.new_status.to_string())
            .bind(update.started_at)
            .bind(update.output_payload.as_deref())
            .bind(update.error_message.as_deref())
            .bind(update.completed_at)
            .bind(partition)
            .bind(row_key)
            .bind(expected.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Lost the CAS or the row is gone; a follow-up read tells which.
            return match self.get(partition, row_key).await? {
                Some(current) => Err(StoreError::conflict(
                    partition,
                    row_key,
                    expected,
                    current.status,
                )),
                None => Err(StoreError::not_found(partition, row_key)),
            };
        }

        debug!(
            partition = %partition,
            row_key = %row_key,
            status = %update.new_status,
            "task status updated"
        );

        self.get(partition, row_key)
            .await?
            .ok_or_else(|| StoreError::not_found(partition, row_key))
    }

    async fn delete(&self, partition: &str, row_key: &str) -> StoreResult<()> {
        let sql = format!(
            "DELETE FROM {TASK_TABLE} WHERE partition_key = ?1 AND row_key = ?2"
        );
        let result = sqlx::query(&sql)
            .bind(partition)
            .bind(row_key)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(partition, row_key));
        }
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
