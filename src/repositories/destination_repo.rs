use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::Destination;
use crate::schema::destinations;

#[derive(Clone)]
pub struct DestinationRepository {
    pool: AsyncDbPool,
}

impl DestinationRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Destination> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        destinations::table
            .find(id)
            .select(Destination::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::not_found("Destination", "id", id))
    }
}
