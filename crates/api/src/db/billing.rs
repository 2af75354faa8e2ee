//! Stripe webhook bookkeeping.

use serde_json::Value;
use sqlx::PgPool;

use shopforge_core::BillingStatus;

use super::RepositoryError;

/// What applying a billing event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedEvent {
    /// Already recorded by an earlier delivery; nothing changed.
    Duplicate,
    /// Recorded; `stores` rows had their billing status updated.
    Recorded { stores: u64 },
}

/// Repository for processed billing events.
pub struct BillingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BillingRepository<'a> {
    /// Create a new billing repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an event and apply its status change in one transaction.
    ///
    /// A redelivered event (same Stripe id) is reported as `Duplicate` and
    /// changes nothing. If the status update fails the event stays
    /// unrecorded, so Stripe's retry processes it again.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn apply_event(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &Value,
        update: Option<(&str, BillingStatus)>,
    ) -> Result<AppliedEvent, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"
            INSERT INTO shopforge.billing_events (stripe_event_id, event_type, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (stripe_event_id) DO NOTHING
            ",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Ok(AppliedEvent::Duplicate);
        }

        let mut stores = 0;
        if let Some((customer, status)) = update {
            stores = sqlx::query(
                r"
                UPDATE shopforge.stores
                SET billing_status = $2, updated_at = NOW()
                WHERE stripe_customer_id = $1
                ",
            )
            .bind(customer)
            .bind(status)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(AppliedEvent::Recorded { stores })
    }
}
