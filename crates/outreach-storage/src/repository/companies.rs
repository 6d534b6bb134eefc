//! Company repository (shared companies database, read-only)

use sqlx::PgPool;

use crate::models::Company;
use outreach_common::types::CompanyId;

/// Company repository
#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    /// Create a new company repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a company by ID
    pub async fn get(&self, id: CompanyId) -> Result<Option<Company>, sqlx::Error> {
        sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
