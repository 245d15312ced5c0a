//! JSON shapes of disputes as clients and real-time subscribers see them.

use chrono::{DateTime, Utc};
use mercado_db::entities::{
    dispute::{self, DisputeContext, DisputeStatus, ProposalStatus},
    dispute_message::{self, Attachment, AuthorRole},
    user,
};
use serde::Serialize;

use super::access::Capability;

/// Public dispute fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeView {
    pub id: String,
    pub context: DisputeContext,
    pub buyer_id: String,
    pub seller_id: String,
    pub order_id: Option<String>,
    pub campaign_id: Option<String>,
    pub application_id: Option<String>,
    pub product_id: Option<String>,
    pub shop_id: Option<String>,
    #[serde(rename = "motivoClave")]
    pub reason_code: String,
    #[serde(rename = "descripcionInicial")]
    pub initial_description: String,
    #[serde(rename = "estado")]
    pub status: DisputeStatus,
    #[serde(rename = "slaHoras")]
    pub sla_hours: i32,
    #[serde(rename = "vencimientoActual")]
    pub current_deadline: Option<DateTime<Utc>>,
    #[serde(rename = "cierreTipo")]
    pub closure_type: Option<String>,
    pub proposal_buyer_status: Option<ProposalStatus>,
    pub proposal_seller_status: Option<ProposalStatus>,
    pub moderator_assigned_to: Option<String>,
    pub moderator_key: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&dispute::Model> for DisputeView {
    fn from(d: &dispute::Model) -> Self {
        Self {
            id: d.id.clone(),
            context: d.context,
            buyer_id: d.buyer_id.clone(),
            seller_id: d.seller_id.clone(),
            order_id: d.order_id.clone(),
            campaign_id: d.campaign_id.clone(),
            application_id: d.application_id.clone(),
            product_id: d.product_id.clone(),
            shop_id: d.shop_id.clone(),
            reason_code: d.reason_code.clone(),
            initial_description: d.initial_description.clone(),
            status: d.status,
            sla_hours: d.sla_hours,
            current_deadline: d.current_deadline.map(|t| t.with_timezone(&Utc)),
            closure_type: d.closure_type.clone(),
            proposal_buyer_status: d.proposal_buyer_status,
            proposal_seller_status: d.proposal_seller_status,
            moderator_assigned_to: d.moderator_assigned_to.clone(),
            moderator_key: d.moderator_key.clone(),
            version: d.version,
            created_at: d.created_at.with_timezone(&Utc),
            updated_at: d.updated_at.with_timezone(&Utc),
        }
    }
}

/// A message in a dispute thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub dispute_id: String,
    #[serde(rename = "autorRol")]
    pub author_role: AuthorRole,
    #[serde(rename = "autorId")]
    pub author_id: Option<String>,
    #[serde(rename = "texto")]
    pub text: String,
    #[serde(rename = "adjuntos")]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl From<&dispute_message::Model> for MessageView {
    fn from(m: &dispute_message::Model) -> Self {
        Self {
            id: m.id.clone(),
            dispute_id: m.dispute_id.clone(),
            author_role: m.author_role,
            author_id: m.author_id.clone(),
            text: m.text.clone(),
            attachments: m.attachment_list(),
            created_at: m.created_at.with_timezone(&Utc),
        }
    }
}

/// Display data for a user shown next to a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<&user::Model> for UserSummary {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone().unwrap_or_else(|| u.username.clone()),
            avatar_url: u.avatar_url.clone(),
        }
    }
}

/// A dispute with its participants resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeListItem {
    #[serde(flatten)]
    pub dispute: DisputeView,
    pub buyer: Option<UserSummary>,
    pub seller: Option<UserSummary>,
    pub moderator: Option<UserSummary>,
}

/// One page of disputes.
#[derive(Debug, Clone, Serialize)]
pub struct DisputePage {
    pub items: Vec<DisputeListItem>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Everything the detail screen needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeDetail {
    #[serde(flatten)]
    pub item: DisputeListItem,
    pub messages: Vec<MessageView>,
    pub capability: Capability,
}

/// Result of opening a dispute.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    #[serde(flatten)]
    pub dispute: DisputeView,
    /// False when an existing dispute for the same subject was returned.
    pub created: bool,
}

/// Result of a workflow action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    #[serde(flatten)]
    pub dispute: DisputeView,
    /// False when the action was a repeat and nothing was written.
    pub changed: bool,
}

/// A message appended to a thread, with the dispute it moved.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePosted {
    pub message: MessageView,
    pub dispute: DisputeView,
}

/// A catalogue entry offered when opening a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonView {
    pub clave: String,
    pub titulo: String,
    pub categoria: String,
}
