// SQLite-backed store for spaces, apps, setup runs and app events

use crate::error::AppError;
use crate::executor::RunStatus;
use crate::gateway::NotificationSink;
use crate::state::models::{AppTarget, SetupRecord, SpaceRecord};
use crate::state::store::{AppCatalog, SpaceDirectory, SpaceRouteNames, WorkflowStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct AppRow {
    id: String,
    name: String,
    space: String,
    org: String,
    tags: String,
}

impl AppRow {
    fn into_target(self) -> Result<AppTarget, AppError> {
        Ok(AppTarget {
            id: parse_id(&self.id)?,
            name: self.name,
            space: self.space,
            org: self.org,
            space_tags: split_tags(&self.tags),
        })
    }
}

#[derive(Debug, FromRow)]
struct SetupRow {
    id: String,
    app_id: String,
    app_name: String,
    progress: f64,
    status: String,
    failure_message: String,
    created_at: i64,
    updated_at: i64,
}

impl SetupRow {
    fn into_record(self) -> Result<SetupRecord, AppError> {
        Ok(SetupRecord {
            id: parse_id(&self.id)?,
            app_id: parse_id(&self.app_id)?,
            app_name: self.app_name,
            progress: self.progress,
            status: RunStatus::from(self.status.as_str()),
            failure_message: self.failure_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A recorded app event
#[derive(Debug, Clone, PartialEq)]
pub struct AppEvent {
    /// Event type, e.g. `config_change`
    pub event_type: String,
    /// Event payload
    pub payload: Value,
    /// Unix seconds
    pub created_at: i64,
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt id {:?} in store: {}", raw, e)))
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

const APP_COLUMNS: &str =
    "SELECT a.id, a.name, a.space, a.org, s.tags FROM apps a JOIN spaces s ON s.name = a.space";

/// Database-backed implementation of every persistence seam
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and run migrations
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file, or a `sqlite:` URL
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        if !db_path.starts_with("sqlite:") {
            if let Some(parent) = PathBuf::from(db_path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("Failed to create db directory: {}", e))
                })?;
            }
        }

        let connection_string = if db_path.starts_with("sqlite:") {
            db_path.to_string()
        } else {
            format!("sqlite:{}", db_path)
        };

        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid database path: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to connect to database: {}", e))
            })?;

        info!("Connected to SQLite database at: {}", db_path);

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), AppError> {
        let migration_sql = include_str!("../../migrations/001_create_app_setups.sql");

        let mut cleaned_sql = String::new();
        for line in migration_sql.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }
            let without_comments = match trimmed.find("--") {
                Some(pos) => &trimmed[..pos],
                None => trimmed,
            };
            cleaned_sql.push_str(without_comments.trim());
            cleaned_sql.push(' ');
        }

        for statement in cleaned_sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::Internal(anyhow::anyhow!(
                        "Migration failed: {} - Statement: {}",
                        e,
                        statement.chars().take(100).collect::<String>()
                    ))
                })?;
        }

        debug!("Database migrations completed");
        Ok(())
    }

    /// Events recorded for an app, oldest first
    pub async fn events_for(&self, app_id: Uuid) -> Result<Vec<AppEvent>, AppError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT event_type, payload, created_at FROM app_events WHERE app_id = ? ORDER BY rowid",
        )
        .bind(app_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(event_type, payload, created_at)| {
                let payload = serde_json::from_str(&payload).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("Corrupt event payload: {}", e))
                })?;
                Ok(AppEvent {
                    event_type,
                    payload,
                    created_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn create_setup(&self, app: &AppTarget) -> Result<SetupRecord, AppError> {
        let id = Uuid::new_v4();
        let timestamp = now();
        sqlx::query(
            "INSERT INTO app_setups (id, app_id, progress, status, failure_message, created_at, updated_at)
             VALUES (?, ?, 0, ?, '', ?, ?)",
        )
        .bind(id.to_string())
        .bind(app.id.to_string())
        .bind(RunStatus::Pending.as_str())
        .bind(timestamp)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(SetupRecord {
            id,
            app_id: app.id,
            app_name: app.name.clone(),
            progress: 0.0,
            status: RunStatus::Pending,
            failure_message: String::new(),
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    async fn persist_progress(&self, setup_id: Uuid, fraction: f64) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE app_setups
             SET progress = MAX(progress, ?),
                 status = CASE WHEN status = 'pending' THEN 'running' ELSE status END,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(fraction.clamp(0.0, 1.0))
        .bind(now())
        .bind(setup_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Setup {} not found", setup_id)));
        }
        Ok(())
    }

    async fn persist_terminal(
        &self,
        setup_id: Uuid,
        status: RunStatus,
        failure_message: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE app_setups SET progress = 1.0, status = ?, failure_message = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(failure_message)
        .bind(now())
        .bind(setup_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Setup {} not found", setup_id)));
        }
        Ok(())
    }

    async fn get_setup(&self, setup_id: Uuid) -> Result<Option<SetupRecord>, AppError> {
        let row = sqlx::query_as::<_, SetupRow>(
            "SELECT s.id, s.app_id, a.name AS app_name, s.progress, s.status, s.failure_message,
                    s.created_at, s.updated_at
             FROM app_setups s JOIN apps a ON a.id = s.app_id
             WHERE s.id = ?",
        )
        .bind(setup_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SetupRow::into_record).transpose()
    }
}

#[async_trait]
impl AppCatalog for SqliteStore {
    async fn register_space(&self, space: &SpaceRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO spaces (name, stack, region, tags, created_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET stack = excluded.stack, region = excluded.region, tags = excluded.tags",
        )
        .bind(&space.name)
        .bind(&space.stack)
        .bind(&space.region)
        .bind(space.tags.join(","))
        .bind(now())
        .execute(&self.pool)
        .await?;

        info!(space = %space.name, stack = %space.stack, region = %space.region, "Space registered");
        Ok(())
    }

    async fn register_app(
        &self,
        org: &str,
        space: &str,
        name: &str,
    ) -> Result<AppTarget, AppError> {
        let tags: Option<String> = sqlx::query_scalar("SELECT tags FROM spaces WHERE name = ?")
            .bind(space)
            .fetch_optional(&self.pool)
            .await?;
        let Some(tags) = tags else {
            return Err(AppError::NotFound(format!(
                "The specified space {} was not found.",
                space
            )));
        };

        let id = Uuid::new_v4();
        let inserted = sqlx::query(
            "INSERT INTO apps (id, name, space, org, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(space)
        .bind(org)
        .bind(now())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::Conflict(format!(
                    "The application {}-{} already exists.",
                    name, space
                )))
            }
            Err(e) => return Err(e.into()),
        }

        info!(app = %format!("{}-{}", name, space), app_id = %id, "App registered");
        Ok(AppTarget {
            id,
            name: name.to_string(),
            space: space.to_string(),
            org: org.to_string(),
            space_tags: split_tags(&tags),
        })
    }

    async fn find_app(&self, key: &str) -> Result<AppTarget, AppError> {
        let row = if let Ok(id) = Uuid::parse_str(key) {
            sqlx::query_as::<_, AppRow>(&format!("{} WHERE a.id = ?", APP_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?
        } else if let Some((name, space)) = key.split_once('-') {
            sqlx::query_as::<_, AppRow>(&format!("{} WHERE a.name = ? AND a.space = ?", APP_COLUMNS))
                .bind(name)
                .bind(space)
                .fetch_optional(&self.pool)
                .await?
        } else {
            None
        };

        row.map(AppRow::into_target)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("The app {} was not found.", key)))
    }
}

#[async_trait]
impl SpaceDirectory for SqliteStore {
    async fn space_route(&self, space: &str) -> Result<Option<SpaceRouteNames>, AppError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT stack, region FROM spaces WHERE name = ?")
                .bind(space)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(stack, region)| SpaceRouteNames { stack, region }))
    }
}

#[async_trait]
impl NotificationSink for SqliteStore {
    async fn notify(
        &self,
        app: &AppTarget,
        event_type: &str,
        payload: Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO app_events (id, app_id, event_type, payload, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(app.id.to_string())
        .bind(event_type)
        .bind(payload.to_string())
        .bind(now())
        .execute(&self.pool)
        .await?;

        debug!(app = %app.key(), event_type = %event_type, "App event recorded");
        Ok(())
    }
}
