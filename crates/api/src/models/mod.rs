//! API resource models.
//!
//! These are the shapes handlers return inside the `{ success, data }`
//! envelope and the inputs they accept. Row types stay private to `db`.

pub mod auth;
pub mod domain;
pub mod job;
pub mod layout;
pub mod plugin;
pub mod store;
pub mod storefront;

pub use auth::{ApiToken, Principal, User};
pub use domain::{CustomDomain, DnsRecord};
pub use job::Job;
pub use layout::{LayoutRecord, LayoutVersion};
pub use plugin::{
    Plugin, PluginDetail, PluginHandler, PluginUpdate, PluginVersionHeader, PluginWidget,
    PublicWidget, WidgetInput,
};
pub use store::{NewStore, Store, StoreUpdate};
pub use storefront::{
    LabelPosition, PdfTemplate, PdfTemplateInput, PdfTemplateType, ProductLabel,
    ProductLabelInput, ShippingMethod, ShippingMethodInput, ShippingQuote,
};
