//! Custom domain ownership verification over DNS.
//!
//! A store owner proves control of a domain by publishing a TXT record
//! `shopforge-verify=<token>` at `_shopforge-verification.<domain>`. The
//! record is looked up with DNS-over-HTTPS (JSON API). A pending domain
//! whose record is still missing 72 hours after it was added is marked
//! failed; a verified domain whose record disappears loses verification.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use shopforge_core::{CustomDomainState, DomainName, DomainVerificationStatus, TransitionError};

use crate::db::{CustomDomainRepository, RepositoryError};
use crate::models::{CustomDomain, DnsRecord};

/// Value prefix of the ownership TXT record.
pub const VERIFICATION_PREFIX: &str = "shopforge-verify=";

/// Hours a domain may stay pending before it is marked failed.
pub const VERIFICATION_WINDOW_HOURS: i64 = 72;

const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// TXT record type number.
const TXT: u16 = 16;

/// Errors from a verification check.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The resolver could not be reached.
    #[error("DNS request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The resolver answered with a non-success HTTP status.
    #[error("DNS resolver returned HTTP {0}")]
    Status(u16),

    /// The resolver answered with a DNS error code other than NXDOMAIN.
    #[error("DNS lookup for {name} failed with rcode {rcode}")]
    Rcode { name: String, rcode: u16 },

    /// Persisting the result failed.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    /// The stored state does not allow the computed move.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Looks up TXT records.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// All TXT strings published at `name`; empty if the name does not exist.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, VerificationError>;
}

/// DNS-over-HTTPS resolver using the `application/dns-json` API
/// (Cloudflare, Google).
#[derive(Clone)]
pub struct DohResolver {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u16,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

impl DohResolver {
    /// Create a resolver for a DoH JSON endpoint.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::Http` if the HTTP client fails to build.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, VerificationError> {
        let client = reqwest::Client::builder().timeout(DNS_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl DnsResolver for DohResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, VerificationError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("type", "TXT")])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerificationError::Status(status.as_u16()));
        }

        let body: DohResponse = response.json().await?;
        match body.status {
            0 => {}
            // NXDOMAIN: the record simply is not there (yet).
            3 => return Ok(Vec::new()),
            rcode => {
                return Err(VerificationError::Rcode {
                    name: name.to_owned(),
                    rcode,
                });
            }
        }

        Ok(body
            .answer
            .iter()
            .filter(|a| a.record_type == TXT)
            .map(|a| unquote_txt(&a.data))
            .collect())
    }
}

/// Join the quoted character-strings of a TXT answer (`"ab" "cd"` → `abcd`).
fn unquote_txt(data: &str) -> String {
    if !data.contains('"') {
        return data.to_owned();
    }
    data.split('"').skip(1).step_by(2).collect()
}

/// A fresh verification token (32 hex characters).
#[must_use]
pub fn generate_verification_token() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// The records a store owner must publish for `domain`.
///
/// `target_host` is the host storefront traffic should be pointed at.
#[must_use]
pub fn dns_records_for(domain: &DomainName, token: &str, target_host: &str) -> Vec<DnsRecord> {
    // Apex names cannot carry a CNAME; most providers offer ALIAS/ANAME instead.
    let routing_type = if domain.is_apex() { "ALIAS" } else { "CNAME" };
    vec![
        DnsRecord {
            record_type: "TXT".to_owned(),
            name: domain.verification_record_name(),
            value: format!("{VERIFICATION_PREFIX}{token}"),
        },
        DnsRecord {
            record_type: routing_type.to_owned(),
            name: domain.as_str().to_owned(),
            value: target_host.to_owned(),
        },
    ]
}

/// Verification status after a lookup.
///
/// `current` must not be `Failed`; a failed domain is moved back to
/// `Pending` before it is re-checked.
#[must_use]
pub fn decide(
    current: DomainVerificationStatus,
    record_found: bool,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DomainVerificationStatus {
    match (current, record_found) {
        (_, true) => DomainVerificationStatus::Verified,
        (DomainVerificationStatus::Verified, false) => DomainVerificationStatus::Failed,
        (_, false) if now - created_at >= chrono::Duration::hours(VERIFICATION_WINDOW_HOURS) => {
            DomainVerificationStatus::Failed
        }
        (_, false) => DomainVerificationStatus::Pending,
    }
}

/// Whether `domain` publishes the TXT record for `token`.
///
/// # Errors
///
/// Returns `VerificationError` if the lookup fails.
pub async fn has_verification_record(
    resolver: &dyn DnsResolver,
    domain: &DomainName,
    token: &str,
) -> Result<bool, VerificationError> {
    let expected = format!("{VERIFICATION_PREFIX}{token}");
    let records = resolver
        .lookup_txt(&domain.verification_record_name())
        .await?;
    Ok(records.iter().any(|r| r.trim() == expected))
}

/// Check one domain now and persist the outcome.
///
/// # Errors
///
/// Returns `VerificationError` if the lookup or the update fails.
#[tracing::instrument(skip(pool, resolver, domain), fields(domain = %domain.domain))]
pub async fn verify_domain(
    pool: &PgPool,
    resolver: &dyn DnsResolver,
    domain: &CustomDomain,
) -> Result<CustomDomain, VerificationError> {
    let mut state = domain.state();
    if state.verification == DomainVerificationStatus::Failed {
        state = state.advance_verification(DomainVerificationStatus::Pending)?;
    }

    let found =
        has_verification_record(resolver, &domain.domain, &domain.verification_token).await?;
    let next = decide(state.verification, found, domain.created_at, Utc::now());
    let state: CustomDomainState = state.advance_verification(next)?;

    if next != domain.verification_status {
        tracing::info!(from = %domain.verification_status, to = %next, "Domain verification changed");
    }

    Ok(CustomDomainRepository::new(pool)
        .record_check(domain.id, domain.state(), state)
        .await?)
}

/// Totals from one sweep over pending domains.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: u32,
    pub verified: u32,
    pub failed: u32,
    pub still_pending: u32,
    /// Lookups that errored; those domains are retried next sweep.
    pub errors: u32,
}

/// Re-check every pending domain.
///
/// A failed lookup for one domain is logged and counted; it does not stop
/// the sweep.
///
/// # Errors
///
/// Returns `VerificationError::Database` if pending domains cannot be listed.
pub async fn sweep_pending(
    pool: &PgPool,
    resolver: &dyn DnsResolver,
) -> Result<SweepReport, VerificationError> {
    let pending = CustomDomainRepository::new(pool).list_pending().await?;
    let mut report = SweepReport::default();

    for domain in &pending {
        report.checked += 1;
        match verify_domain(pool, resolver, domain).await {
            Ok(updated) => match updated.verification_status {
                DomainVerificationStatus::Verified => report.verified += 1,
                DomainVerificationStatus::Failed => report.failed += 1,
                DomainVerificationStatus::Pending => report.still_pending += 1,
            },
            Err(e) => {
                tracing::warn!(domain = %domain.domain, error = %e, "Domain check failed");
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        checked = report.checked,
        verified = report.verified,
        failed = report.failed,
        errors = report.errors,
        "Domain verification sweep finished"
    );

    Ok(report)
}
