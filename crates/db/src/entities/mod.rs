//! Database entities.

#![allow(missing_docs)]

pub mod audit_log;
pub mod campaign;
pub mod campaign_application;
pub mod dispute;
pub mod dispute_message;
pub mod dispute_reason;
pub mod notification;
pub mod shop_order;
pub mod user;

pub use audit_log::Entity as AuditLog;
pub use campaign::Entity as Campaign;
pub use campaign_application::Entity as CampaignApplication;
pub use dispute::Entity as Dispute;
pub use dispute_message::Entity as DisputeMessage;
pub use dispute_reason::Entity as DisputeReason;
pub use notification::Entity as Notification;
pub use shop_order::Entity as ShopOrder;
pub use user::Entity as User;
