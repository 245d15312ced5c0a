//! Dispute entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a dispute is about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DisputeContext {
    #[sea_orm(string_value = "order")]
    Order,
    #[sea_orm(string_value = "campaign")]
    Campaign,
    #[sea_orm(string_value = "application")]
    Application,
}

impl DisputeContext {
    /// Wire and storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Campaign => "campaign",
            Self::Application => "application",
        }
    }

    /// Key that identifies the disputed subject, e.g. `order:01h...`.
    #[must_use]
    pub fn subject_key(self, subject_id: &str) -> String {
        format!("{}:{subject_id}", self.as_str())
    }
}

/// Workflow state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "in_review")]
    InReview,
    /// Waiting on the buyer or influencer.
    #[sea_orm(string_value = "awaiting_party_a")]
    AwaitingPartyA,
    /// Waiting on the seller.
    #[sea_orm(string_value = "awaiting_party_b")]
    AwaitingPartyB,
    #[sea_orm(string_value = "proposal")]
    Proposal,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "closed_expired")]
    ClosedExpired,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "escalated")]
    Escalated,
}

impl DisputeStatus {
    /// States no action can leave except an admin override.
    pub const TERMINAL: [Self; 3] = [Self::Resolved, Self::ClosedExpired, Self::Rejected];

    /// Whether the dispute is closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::ClosedExpired | Self::Rejected)
    }

    /// Wire and storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InReview => "in_review",
            Self::AwaitingPartyA => "awaiting_party_a",
            Self::AwaitingPartyB => "awaiting_party_b",
            Self::Proposal => "proposal",
            Self::Resolved => "resolved",
            Self::ClosedExpired => "closed_expired",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
        }
    }
}

/// A party's answer to a resolution proposal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dispute")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub context: DisputeContext,

    /// Buyer, or influencer for campaign and application disputes.
    pub buyer_id: String,

    pub seller_id: String,

    #[sea_orm(nullable)]
    pub order_id: Option<String>,

    #[sea_orm(nullable)]
    pub campaign_id: Option<String>,

    #[sea_orm(nullable)]
    pub application_id: Option<String>,

    #[sea_orm(nullable)]
    pub product_id: Option<String>,

    #[sea_orm(nullable)]
    pub shop_id: Option<String>,

    pub reason_code: String,

    #[sea_orm(column_type = "Text")]
    pub initial_description: String,

    pub status: DisputeStatus,

    pub sla_hours: i32,

    /// Null once the dispute is closed.
    #[sea_orm(nullable)]
    pub current_deadline: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub closure_type: Option<String>,

    #[sea_orm(nullable)]
    pub proposal_buyer_status: Option<ProposalStatus>,

    #[sea_orm(nullable)]
    pub proposal_seller_status: Option<ProposalStatus>,

    #[sea_orm(nullable)]
    pub moderator_assigned_to: Option<String>,

    /// Username of the assigned moderator.
    #[sea_orm(nullable)]
    pub moderator_key: Option<String>,

    /// Bumped on every write; updates compare against it.
    pub version: i32,

    /// `<context>:<subject id>`, part of the uniqueness key.
    pub subject_key: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// ID of the order, campaign or application under dispute.
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        match self.context {
            DisputeContext::Order => self.order_id.as_deref(),
            DisputeContext::Campaign => self.campaign_id.as_deref(),
            DisputeContext::Application => self.application_id.as_deref(),
        }
    }

    /// Whether `user_id` is one of the two parties.
    #[must_use]
    pub fn is_party(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::dispute_message::Entity")]
    Messages,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::BuyerId",
        to = "super::user::Column::Id"
    )]
    Buyer,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SellerId",
        to = "super::user::Column::Id"
    )]
    Seller,
}

impl Related<super::dispute_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
