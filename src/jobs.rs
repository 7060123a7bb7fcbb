use std::fmt::Display;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::unix_millis;
use crate::key::RequestId;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        self != JobState::Pending
    }

    fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "pending" => Ok(JobState::Pending),
            "complete" => Ok(JobState::Complete),
            "failed" => Ok(JobState::Failed),
            other => bail!("Unknown job state {}", other),
        }
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one tracked generation request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JobRecord {
    pub id: RequestId,
    pub topic: String,
    pub state: JobState,
    /// Where the artifact lands once the job completes
    pub artifact_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<SqliteRow> for JobRecord {
    type Error = anyhow::Error;

    fn try_from(row: SqliteRow) -> Result<Self> {
        let id: String = row.try_get("id")?;
        let state: String = row.try_get("state")?;
        Ok(JobRecord {
            id: RequestId::parse(&id).ok_or_else(|| anyhow!("Corrupt job id {}", id))?,
            topic: row.try_get("topic")?,
            state: JobState::parse(&state)?,
            artifact_key: row.try_get("artifact_key")?,
            failure: row.try_get("failure")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Job records kept in SQLite. A record only ever moves from pending to a terminal state.
#[derive(Clone, Debug)]
pub struct JobBook {
    pool: SqlitePool,
}

impl JobBook {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS generation_job (
                id TEXT PRIMARY KEY NOT NULL,
                topic TEXT NOT NULL,
                state TEXT NOT NULL,
                artifact_key TEXT NOT NULL,
                failure TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn create(&self, id: &RequestId, topic: &str, artifact_key: &str) -> Result<JobRecord> {
        let now = unix_millis();
        sqlx::query(
            "INSERT INTO generation_job (id, topic, state, artifact_key, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(topic)
        .bind(JobState::Pending.as_str())
        .bind(artifact_key)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(JobRecord {
            id: id.clone(),
            topic: topic.to_string(),
            state: JobState::Pending,
            artifact_key: artifact_key.to_string(),
            failure: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn complete(&self, id: &RequestId) -> Result<()> {
        self.finish(id, JobState::Complete, None).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fail(&self, id: &RequestId, reason: &str) -> Result<()> {
        self.finish(id, JobState::Failed, Some(reason)).await
    }

    async fn finish(&self, id: &RequestId, state: JobState, failure: Option<&str>) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE generation_job SET state = ?, failure = ?, updated_at = ?
             WHERE id = ? AND state = 'pending'",
        )
        .bind(state.as_str())
        .bind(failure)
        .bind(unix_millis())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            bail!("Job {} is unknown or already finished", id);
        }
        Ok(())
    }

    pub async fn get(&self, id: &RequestId) -> Result<Option<JobRecord>> {
        let row = sqlx::query(
            "SELECT id, topic, state, artifact_key, failure, created_at, updated_at
             FROM generation_job WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(JobRecord::try_from).transpose()
    }
}
