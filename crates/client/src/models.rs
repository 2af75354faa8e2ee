//! Response payloads decoded by the client.
//!
//! Only the fields the client needs are declared; unknown fields are
//! ignored so the API can grow without breaking older clients.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use shopforge_core::shipping::{ShippingConditions, ShippingMethodKind};
use shopforge_core::slots::SlotConfiguration;
use shopforge_core::{
    CustomDomainId, DomainName, DomainVerificationStatus, JobStatus, ShippingMethodId, SslStatus,
};

/// A page layout at a version.
#[derive(Debug, Clone, Deserialize)]
pub struct Layout {
    #[serde(flatten)]
    pub configuration: SlotConfiguration,
    /// 0 when the page was never saved.
    pub version: i32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    pub method: ShippingMethodKind,
    #[serde(default)]
    pub conditions: ShippingConditions,
}

/// A DNS record to publish for domain verification or routing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomDomain {
    pub id: CustomDomainId,
    pub domain: DomainName,
    pub verification_token: String,
    pub verification_status: DomainVerificationStatus,
    pub ssl_status: SslStatus,
    pub is_primary: bool,
    #[serde(default)]
    pub dns_records: Vec<DnsRecord>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

/// A background job.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}
