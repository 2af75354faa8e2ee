//! Saved page layouts and their history headers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopforge_core::history::VersionKind;
use shopforge_core::slots::SlotConfiguration;
use shopforge_core::UserId;

/// The current layout of one page type.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutRecord {
    #[serde(flatten)]
    pub configuration: SlotConfiguration,
    /// 0 when nothing has been saved yet.
    pub version: i32,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One entry of a layout's history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LayoutVersion {
    pub version: i32,
    pub kind: VersionKind,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
