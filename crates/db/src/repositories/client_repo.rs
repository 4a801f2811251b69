//! Read-only queries over `clients` and `policies`.

use courier_core::types::{Date, DbId};
use sqlx::PgPool;

use crate::models::client::{ClientContact, EventRecipient};

pub struct ClientRepo;

impl ClientRepo {
    pub async fn find_contact(
        pool: &PgPool,
        client_id: DbId,
    ) -> Result<Option<ClientContact>, sqlx::Error> {
        sqlx::query_as::<_, ClientContact>(
            "SELECT id, user_id, full_name, phone, telegram_peer FROM clients WHERE id = $1",
        )
        .bind(client_id)
        .fetch_optional(pool)
        .await
    }

    /// Clients of `user_id` holding a policy that ends on `end_date`.
    pub async fn policies_ending_on(
        pool: &PgPool,
        user_id: DbId,
        end_date: Date,
    ) -> Result<Vec<EventRecipient>, sqlx::Error> {
        sqlx::query_as::<_, EventRecipient>(
            "SELECT c.id AS client_id, c.full_name, c.phone, c.telegram_peer, \
                    c.preferred_channel, p.policy_number, p.end_date AS event_date \
             FROM policies p \
             JOIN clients c ON c.id = p.client_id \
             WHERE c.user_id = $1 AND p.end_date = $2 \
             ORDER BY c.id, p.id",
        )
        .bind(user_id)
        .bind(end_date)
        .fetch_all(pool)
        .await
    }

    /// Clients of `user_id` whose birthday (month and day) falls on `date`.
    ///
    /// `event_date` is the birthday in `date`'s year.
    pub async fn birthdays_on(
        pool: &PgPool,
        user_id: DbId,
        date: Date,
    ) -> Result<Vec<EventRecipient>, sqlx::Error> {
        sqlx::query_as::<_, EventRecipient>(
            "SELECT id AS client_id, full_name, phone, telegram_peer, preferred_channel, \
                    NULL::TEXT AS policy_number, $2::DATE AS event_date \
             FROM clients \
             WHERE user_id = $1 \
               AND birth_date IS NOT NULL \
               AND EXTRACT(MONTH FROM birth_date) = EXTRACT(MONTH FROM $2::DATE) \
               AND EXTRACT(DAY FROM birth_date) = EXTRACT(DAY FROM $2::DATE) \
             ORDER BY id",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(pool)
        .await
    }

    /// Insert a client and return its id (seeding and tests).
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        full_name: &str,
        phone: Option<&str>,
        telegram_peer: Option<&str>,
        birth_date: Option<Date>,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO clients (user_id, full_name, phone, telegram_peer, birth_date) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(user_id)
        .bind(full_name)
        .bind(phone)
        .bind(telegram_peer)
        .bind(birth_date)
        .fetch_one(pool)
        .await
    }

    /// Attach a policy to a client (seeding and tests).
    pub async fn add_policy(
        pool: &PgPool,
        client_id: DbId,
        policy_number: &str,
        end_date: Date,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO policies (client_id, policy_number, end_date) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(client_id)
        .bind(policy_number)
        .bind(end_date)
        .fetch_one(pool)
        .await
    }
}
