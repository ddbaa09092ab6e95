use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::BackupJob;
use crate::schema::backup_jobs;

#[derive(Clone)]
pub struct BackupJobRepository {
    pool: AsyncDbPool,
}

impl BackupJobRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<BackupJob> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        backup_jobs::table
            .find(id)
            .select(BackupJob::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::not_found("BackupJob", "id", id))
    }

    pub async fn list_active(&self) -> AppResult<Vec<BackupJob>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        backup_jobs::table
            .filter(backup_jobs::is_active.eq(true))
            .order(backup_jobs::id.asc())
            .select(BackupJob::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }
}
