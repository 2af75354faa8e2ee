//! Status enums and lifecycle state machines.
//!
//! Custom domains carry two independent lifecycles: DNS ownership
//! verification and SSL certificate provisioning. Transitions are checked
//! here so every writer (API handlers, the verification sweep, the CLI)
//! enforces the same rules.

use serde::{Deserialize, Serialize};

/// A rejected lifecycle transition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot transition {entity} from {from} to {to}")]
pub struct TransitionError {
    /// Which lifecycle rejected the move.
    pub entity: &'static str,
    /// Current state.
    pub from: String,
    /// Requested state.
    pub to: String,
}

/// Custom domain ownership verification status.
///
/// ```text
/// pending ──► verified ──► failed ──► pending
///    │  ▲                              ▲
///    │  └─(still checking)             │
///    └──────────► failed ──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shopforge.verification_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DomainVerificationStatus {
    #[default]
    Pending,
    Verified,
    Failed,
}

impl DomainVerificationStatus {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending | Self::Verified | Self::Failed)
                | (Self::Verified, Self::Verified | Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }

    /// Move to `next` if allowed.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` for moves outside the lifecycle.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "domain verification",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for DomainVerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Verified => write!(f, "verified"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// SSL certificate lifecycle for a custom domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shopforge.ssl_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SslStatus {
    #[default]
    Pending,
    Active,
    Failed,
    Expired,
}

impl SslStatus {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// `active → active` is a renewal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active | Self::Failed)
                | (Self::Active, Self::Active | Self::Expired)
                | (Self::Expired | Self::Failed, Self::Pending)
        )
    }

    /// Move to `next` if allowed.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` for moves outside the lifecycle.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "ssl",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for SslStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Failed => write!(f, "failed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Combined lifecycle of a custom domain.
///
/// SSL provisioning cannot start until ownership is verified, and losing
/// verification takes a live certificate back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CustomDomainState {
    pub verification: DomainVerificationStatus,
    pub ssl: SslStatus,
}

impl CustomDomainState {
    /// Apply a verification result.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if the verification move is illegal.
    pub fn advance_verification(
        self,
        next: DomainVerificationStatus,
    ) -> Result<Self, TransitionError> {
        let verification = self.verification.transition_to(next)?;
        let ssl = if verification == DomainVerificationStatus::Verified {
            self.ssl
        } else {
            SslStatus::Pending
        };
        Ok(Self { verification, ssl })
    }

    /// Apply an SSL status change.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if the domain is not verified yet or the
    /// SSL move is illegal.
    pub fn advance_ssl(self, next: SslStatus) -> Result<Self, TransitionError> {
        if self.verification != DomainVerificationStatus::Verified && next != SslStatus::Pending {
            return Err(TransitionError {
                entity: "ssl",
                from: format!("{} (domain {})", self.ssl, self.verification),
                to: next.to_string(),
            });
        }
        let ssl = self.ssl.transition_to(next)?;
        Ok(Self { ssl, ..self })
    }

    /// Whether the domain can serve storefront traffic.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.verification == DomainVerificationStatus::Verified && self.ssl == SslStatus::Active
    }
}

/// Role attached to an API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shopforge.api_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ApiRole {
    /// Owns one or more stores; uses the admin dashboard.
    StoreOwner,
    /// Shops on a storefront.
    Customer,
    /// Operates the platform; may access every store.
    PlatformAdmin,
}

impl std::fmt::Display for ApiRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreOwner => write!(f, "store_owner"),
            Self::Customer => write!(f, "customer"),
            Self::PlatformAdmin => write!(f, "platform_admin"),
        }
    }
}

impl std::str::FromStr for ApiRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "store_owner" => Ok(Self::StoreOwner),
            "customer" => Ok(Self::Customer),
            "platform_admin" => Ok(Self::PlatformAdmin),
            _ => Err(format!("invalid api role: {s}")),
        }
    }
}

/// Background job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shopforge.job_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job has stopped (pollers can stop polling).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Store subscription status, mirrored from Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shopforge.billing_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    #[default]
    None,
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl BillingStatus {
    /// Map a Stripe subscription `status` string.
    ///
    /// `incomplete`, `unpaid` and `paused` collapse into `past_due`;
    /// unknown values yield `None`.
    #[must_use]
    pub fn from_stripe(status: &str) -> Option<Self> {
        match status {
            "trialing" => Some(Self::Trialing),
            "active" => Some(Self::Active),
            "past_due" | "incomplete" | "unpaid" | "paused" => Some(Self::PastDue),
            "canceled" | "incomplete_expired" => Some(Self::Canceled),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_transitions() {
        use DomainVerificationStatus::{Failed, Pending, Verified};

        assert!(Pending.can_transition_to(Verified));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Pending));
        assert!(Verified.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));

        assert!(!Failed.can_transition_to(Verified));
        assert!(!Verified.can_transition_to(Pending));
    }

    #[test]
    fn test_verification_error_message() {
        let err = DomainVerificationStatus::Failed
            .transition_to(DomainVerificationStatus::Verified)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot transition domain verification from failed to verified"
        );
    }

    #[test]
    fn test_ssl_transitions() {
        use SslStatus::{Active, Expired, Failed, Pending};

        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Active));
        assert!(Active.can_transition_to(Expired));
        assert!(Expired.can_transition_to(Pending));
        assert!(Failed.can_transition_to(Pending));

        assert!(!Pending.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Failed.can_transition_to(Active));
    }

    #[test]
    fn test_ssl_requires_verified_domain() {
        let state = CustomDomainState::default();
        assert!(state.advance_ssl(SslStatus::Active).is_err());

        let verified = state
            .advance_verification(DomainVerificationStatus::Verified)
            .unwrap();
        let live = verified.advance_ssl(SslStatus::Active).unwrap();
        assert!(live.is_live());
    }

    #[test]
    fn test_losing_verification_resets_ssl() {
        let live = CustomDomainState {
            verification: DomainVerificationStatus::Verified,
            ssl: SslStatus::Active,
        };
        let lost = live
            .advance_verification(DomainVerificationStatus::Failed)
            .unwrap();
        assert_eq!(lost.ssl, SslStatus::Pending);
        assert!(!lost.is_live());
    }

    #[test]
    fn test_api_role_roundtrip_strings() {
        for role in [ApiRole::StoreOwner, ApiRole::Customer, ApiRole::PlatformAdmin] {
            assert_eq!(role.to_string().parse::<ApiRole>().unwrap(), role);
        }
        assert!("owner".parse::<ApiRole>().is_err());
    }

    #[test]
    fn test_billing_status_from_stripe() {
        assert_eq!(BillingStatus::from_stripe("active"), Some(BillingStatus::Active));
        assert_eq!(BillingStatus::from_stripe("unpaid"), Some(BillingStatus::PastDue));
        assert_eq!(
            BillingStatus::from_stripe("incomplete_expired"),
            Some(BillingStatus::Canceled)
        );
        assert_eq!(BillingStatus::from_stripe("mystery"), None);
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
