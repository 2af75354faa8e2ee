//! Custom domain repository.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use shopforge_core::{
    CustomDomainId, CustomDomainState, DomainName, DomainVerificationStatus, SslStatus, StoreId,
};

use super::{RepositoryError, conflict_on_unique, decode_json, encode_json};
use crate::models::{CustomDomain, DnsRecord};

#[derive(Debug, sqlx::FromRow)]
struct CustomDomainRow {
    id: CustomDomainId,
    store_id: StoreId,
    domain: String,
    verification_token: String,
    verification_status: DomainVerificationStatus,
    ssl_status: SslStatus,
    is_primary: bool,
    dns_records: Value,
    custom_headers: Value,
    verified_at: Option<DateTime<Utc>>,
    last_checked_at: Option<DateTime<Utc>>,
    ssl_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomDomainRow> for CustomDomain {
    type Error = RepositoryError;

    fn try_from(row: CustomDomainRow) -> Result<Self, Self::Error> {
        let domain = DomainName::parse(&row.domain).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid domain in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            store_id: row.store_id,
            domain,
            verification_token: row.verification_token,
            verification_status: row.verification_status,
            ssl_status: row.ssl_status,
            is_primary: row.is_primary,
            dns_records: decode_json(row.dns_records, "dns_records")?,
            custom_headers: decode_json(row.custom_headers, "custom_headers")?,
            verified_at: row.verified_at,
            last_checked_at: row.last_checked_at,
            ssl_expires_at: row.ssl_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const DOMAIN_COLUMNS: &str = "id, store_id, domain, verification_token, verification_status, \
                              ssl_status, is_primary, dns_records, custom_headers, verified_at, \
                              last_checked_at, ssl_expires_at, created_at, updated_at";

fn guard_failure(exists: bool) -> RepositoryError {
    if exists {
        RepositoryError::Conflict(
            "domain state changed or does not allow this; reload and retry".to_owned(),
        )
    } else {
        RepositoryError::NotFound
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResolvedRow {
    store_id: StoreId,
    slug: String,
}

/// Repository for custom domain database operations.
pub struct CustomDomainRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomDomainRepository<'a> {
    /// Create a new custom domain repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Domains of a store, primary first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<CustomDomain>, RepositoryError> {
        let rows = sqlx::query_as::<_, CustomDomainRow>(&format!(
            r"
            SELECT {DOMAIN_COLUMNS}
            FROM shopforge.custom_domains
            WHERE store_id = $1
            ORDER BY is_primary DESC, domain
            "
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one of a store's domains.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the domain does not belong to the store.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: CustomDomainId,
    ) -> Result<CustomDomain, RepositoryError> {
        let row = sqlx::query_as::<_, CustomDomainRow>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM shopforge.custom_domains WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Attach a new domain in `pending` state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if any store already uses the domain.
    pub async fn create(
        &self,
        store_id: StoreId,
        domain: &DomainName,
        verification_token: &str,
        dns_records: &[DnsRecord],
    ) -> Result<CustomDomain, RepositoryError> {
        let row = sqlx::query_as::<_, CustomDomainRow>(&format!(
            r"
            INSERT INTO shopforge.custom_domains (store_id, domain, verification_token, dns_records)
            VALUES ($1, $2, $3, $4)
            RETURNING {DOMAIN_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(domain)
        .bind(verification_token)
        .bind(encode_json(&dns_records, "dns_records")?)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "domain is already registered"))?;

        row.try_into()
    }

    /// Persist the outcome of a verification check made against `from`.
    ///
    /// The update only applies while the row is still in `from`, so a check
    /// cannot overwrite a change made while its DNS lookup was in flight.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the domain was deleted meanwhile,
    /// `RepositoryError::Conflict` if its state changed meanwhile.
    pub async fn record_check(
        &self,
        id: CustomDomainId,
        from: CustomDomainState,
        state: CustomDomainState,
    ) -> Result<CustomDomain, RepositoryError> {
        let verified = state.verification == DomainVerificationStatus::Verified;
        let row = sqlx::query_as::<_, CustomDomainRow>(&format!(
            r"
            UPDATE shopforge.custom_domains
            SET verification_status = $2,
                ssl_status = $3,
                verified_at = CASE WHEN $4 THEN COALESCE(verified_at, NOW()) ELSE NULL END,
                -- A domain that loses verification cannot stay primary.
                is_primary = is_primary AND $4,
                last_checked_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND verification_status = $5 AND ssl_status = $6
            RETURNING {DOMAIN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(state.verification)
        .bind(state.ssl)
        .bind(verified)
        .bind(from.verification)
        .bind(from.ssl)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(self.missing_or_changed(id, None).await?),
        }
    }

    /// Record an SSL status change decided against `from`.
    ///
    /// The update only applies while the row is still in `from`, so the
    /// verified state the transition relied on cannot change underneath it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the domain does not belong to the
    /// store, `RepositoryError::Conflict` if its state changed meanwhile.
    pub async fn set_ssl(
        &self,
        store_id: StoreId,
        id: CustomDomainId,
        from: CustomDomainState,
        ssl: SslStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<CustomDomain, RepositoryError> {
        let row = sqlx::query_as::<_, CustomDomainRow>(&format!(
            r"
            UPDATE shopforge.custom_domains
            SET ssl_status = $3,
                ssl_expires_at = $4,
                updated_at = NOW()
            WHERE id = $1 AND store_id = $2
              AND verification_status = $5 AND ssl_status = $6
            RETURNING {DOMAIN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store_id)
        .bind(ssl)
        .bind(expires_at)
        .bind(from.verification)
        .bind(from.ssl)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(self.missing_or_changed(id, Some(store_id)).await?),
        }
    }

    /// Make a verified domain the store's primary, clearing the previous one.
    ///
    /// Both updates run in one transaction; the partial unique index on
    /// `(store_id) WHERE is_primary` rejects a concurrent winner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the domain does not belong to the
    /// store, `RepositoryError::Conflict` if it is not verified or another
    /// request won the race.
    pub async fn set_primary(
        &self,
        store_id: StoreId,
        id: CustomDomainId,
    ) -> Result<CustomDomain, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE shopforge.custom_domains
            SET is_primary = FALSE, updated_at = NOW()
            WHERE store_id = $1 AND is_primary AND id <> $2
            ",
        )
        .bind(store_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, CustomDomainRow>(&format!(
            r"
            UPDATE shopforge.custom_domains
            SET is_primary = TRUE, updated_at = NOW()
            WHERE id = $1 AND store_id = $2 AND verification_status = 'verified'
            RETURNING {DOMAIN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "another primary domain was set concurrently"))?;

        // Dropping `tx` rolls back the cleared primary.
        let Some(row) = row else {
            return Err(self.missing_or_changed(id, Some(store_id)).await?);
        };

        tx.commit()
            .await
            .map_err(|e| conflict_on_unique(e, "another primary domain was set concurrently"))?;

        row.try_into()
    }

    /// Error for a guarded update that matched no row: `NotFound` if the
    /// domain is gone, otherwise `Conflict` because its state did not match.
    async fn missing_or_changed(
        &self,
        id: CustomDomainId,
        store_id: Option<StoreId>,
    ) -> Result<RepositoryError, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM shopforge.custom_domains
                WHERE id = $1 AND ($2::INTEGER IS NULL OR store_id = $2)
            )
            ",
        )
        .bind(id)
        .bind(store_id)
        .fetch_one(self.pool)
        .await?;

        Ok(guard_failure(exists))
    }

    /// Remove a domain. Returns `false` if it did not belong to the store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, store_id: StoreId, id: CustomDomainId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shopforge.custom_domains WHERE id = $1 AND store_id = $2")
                .bind(id)
                .bind(store_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every domain still awaiting verification, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn list_pending(&self) -> Result<Vec<CustomDomain>, RepositoryError> {
        let rows = sqlx::query_as::<_, CustomDomainRow>(&format!(
            r"
            SELECT {DOMAIN_COLUMNS}
            FROM shopforge.custom_domains
            WHERE verification_status = 'pending'
            ORDER BY created_at
            "
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Map a verified domain to its active store's id and slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn resolve(
        &self,
        domain: &DomainName,
    ) -> Result<Option<(StoreId, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, ResolvedRow>(
            r"
            SELECT s.id AS store_id, s.slug
            FROM shopforge.custom_domains d
            JOIN shopforge.stores s ON s.id = d.store_id
            WHERE d.domain = $1
              AND d.verification_status = 'verified'
              AND s.is_active
            ",
        )
        .bind(domain)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| (r.store_id, r.slug)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_failure() {
        assert!(matches!(guard_failure(false), RepositoryError::NotFound));
        assert!(matches!(guard_failure(true), RepositoryError::Conflict(_)));
    }
}
