//! Repository for the `users` table (read-only from this subsystem).

use courier_core::types::DbId;
use sqlx::PgPool;

pub struct UserRepo;

impl UserRepo {
    /// Resolve a user's role. `None` if the user does not exist.
    pub async fn find_role(pool: &PgPool, user_id: DbId) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a user and return its id. Account management lives elsewhere;
    /// this exists for seeding and tests.
    pub async fn create(
        pool: &PgPool,
        email: &str,
        full_name: &str,
        role: &str,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO users (email, full_name, role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(email)
        .bind(full_name)
        .bind(role)
        .fetch_one(pool)
        .await
    }
}
