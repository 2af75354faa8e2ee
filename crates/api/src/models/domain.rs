//! Custom domains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use shopforge_core::{
    CustomDomainId, CustomDomainState, DomainName, DomainVerificationStatus, SslStatus, StoreId,
};

/// A DNS record the store owner must create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub value: String,
}

/// A custom domain attached to a store.
#[derive(Debug, Clone, Serialize)]
pub struct CustomDomain {
    pub id: CustomDomainId,
    pub store_id: StoreId,
    pub domain: DomainName,
    pub verification_token: String,
    pub verification_status: DomainVerificationStatus,
    pub ssl_status: SslStatus,
    pub is_primary: bool,
    pub dns_records: Vec<DnsRecord>,
    pub custom_headers: Map<String, Value>,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub ssl_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomDomain {
    /// Verification and SSL status as one state machine value.
    #[must_use]
    pub const fn state(&self) -> CustomDomainState {
        CustomDomainState {
            verification: self.verification_status,
            ssl: self.ssl_status,
        }
    }
}
