// PostgreSQL implementations of the store interfaces.
//
// Queries are runtime-checked (`sqlx::query_as` + `FromRow` row structs) so the
// crate builds without a live database. Role arrays are stored raw and pass
// through normalization on every read.

mod client;
mod document;
mod identity;
mod preapproval;
mod task;

use sqlx::PgPool;

use super::manager::DatabaseManager;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(manager: &DatabaseManager) -> Self {
        Self {
            pool: manager.pool().clone(),
        }
    }
}
