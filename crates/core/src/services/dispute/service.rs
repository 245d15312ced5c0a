//! Dispute lifecycle: opening, messages and moderation actions.

use chrono::{DateTime, Duration, Utc};
use mercado_common::{AppError, AppResult, get_metrics, is_valid_id};
use mercado_db::{
    entities::{
        audit_log,
        dispute::{self, DisputeContext, DisputeStatus},
        dispute_message::{self, Attachment, AuthorRole},
        notification::NotificationType,
        user,
    },
    repositories::DisputeWrite,
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::Ordering;
use validator::Validate;

use super::{
    DisputeService, RequestMeta,
    access::{self, Capability},
    view::{ActionOutcome, CreateOutcome, DisputeDetail, DisputeView, MessagePosted, MessageView},
    workflow::{self, Decision, DisputeChange, Party},
};
use crate::services::{
    event_publisher::{DISPUTE_MESSAGE, DISPUTE_UPDATED},
    notification::NotificationInput,
    storage::AttachmentUpload,
};

/// Maximum length of a message body, in characters.
const MAX_MESSAGE_CHARS: usize = 5000;

/// Input for opening a dispute.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDisputeInput {
    pub context: DisputeContext,
    pub order_id: Option<String>,
    pub campaign_id: Option<String>,
    pub application_id: Option<String>,
    #[validate(length(max = 64))]
    pub product_id: Option<String>,
    #[serde(rename = "motivoClave")]
    #[validate(length(min = 1, max = 64))]
    pub reason_code: String,
    #[serde(rename = "descripcionInicial")]
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
}

impl CreateDisputeInput {
    /// The id of the subject named by `context`. Other subject ids must be absent.
    fn subject_id(&self) -> AppResult<&str> {
        let (wanted, others) = match self.context {
            DisputeContext::Order => (&self.order_id, [&self.campaign_id, &self.application_id]),
            DisputeContext::Campaign => (&self.campaign_id, [&self.order_id, &self.application_id]),
            DisputeContext::Application => {
                (&self.application_id, [&self.order_id, &self.campaign_id])
            }
        };

        if others.iter().any(|id| id.is_some()) {
            return Err(AppError::Validation(format!(
                "Only the {} id may be given for a {} dispute",
                self.context.as_str(),
                self.context.as_str()
            )));
        }

        wanted
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!("{}Id is required", self.context.as_str()))
            })
    }
}

/// Input for a thread message.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MessageInput {
    #[validate(length(max = 5000))]
    pub texto: Option<String>,
}

/// Input for asking one party for more information.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestInfoInput {
    pub target: Party,
    #[validate(length(min = 1, max = 5000))]
    pub texto: String,
}

/// Input for proposing a resolution.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProposalInput {
    #[validate(length(min = 1, max = 5000))]
    pub texto: String,
    #[validate(length(min = 1, max = 64))]
    pub cierre_tipo: Option<String>,
}

/// Input for answering a proposal.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionInput {
    pub decision: Decision,
    /// Side being answered for. Required when staff answers for a party.
    pub party: Option<Party>,
}

/// Input for asking for mediation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MediationInput {
    #[validate(length(max = 5000))]
    pub texto: Option<String>,
}

/// Input for the staff state override.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdateInput {
    pub estado: DisputeStatus,
    #[validate(length(max = 5000))]
    pub nota: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub cierre_tipo: Option<String>,
}

/// Input for assigning a moderator. `None` clears the assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignModeratorInput {
    pub moderator_id: Option<String>,
}

/// Party ids resolved from a dispute subject.
struct Parties {
    buyer_id: String,
    seller_id: String,
    shop_id: Option<String>,
    campaign_id: Option<String>,
}

/// Workflow columns recorded in audit entries.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditSnapshot {
    estado: DisputeStatus,
    vencimiento_actual: Option<DateTime<Utc>>,
    cierre_tipo: Option<String>,
    proposal_buyer_status: Option<dispute::ProposalStatus>,
    proposal_seller_status: Option<dispute::ProposalStatus>,
    moderator_assigned_to: Option<String>,
    version: i32,
}

impl AuditSnapshot {
    fn of(d: &dispute::Model) -> Self {
        Self {
            estado: d.status,
            vencimiento_actual: d.current_deadline.map(|t| t.with_timezone(&Utc)),
            cierre_tipo: d.closure_type.clone(),
            proposal_buyer_status: d.proposal_buyer_status,
            proposal_seller_status: d.proposal_seller_status,
            moderator_assigned_to: d.moderator_assigned_to.clone(),
            version: d.version,
        }
    }

    fn after(d: &dispute::Model, change: &DisputeChange) -> Self {
        Self {
            estado: change.status,
            vencimiento_actual: change.deadline,
            cierre_tipo: change.closure_type.clone(),
            proposal_buyer_status: change.proposal_buyer_status,
            proposal_seller_status: change.proposal_seller_status,
            moderator_assigned_to: d.moderator_assigned_to.clone(),
            version: d.version + 1,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn party_label(context: DisputeContext, party: Party) -> &'static str {
    match (party, access::buyer_capability(context)) {
        (Party::Seller, _) => "seller",
        (Party::Buyer, Capability::Influencer) => "influencer",
        (Party::Buyer, _) => "buyer",
    }
}

fn party_user(dispute: &dispute::Model, party: Party) -> &str {
    match party {
        Party::Buyer => &dispute.buyer_id,
        Party::Seller => &dispute.seller_id,
    }
}

const fn other(party: Party) -> Party {
    match party {
        Party::Buyer => Party::Seller,
        Party::Seller => Party::Buyer,
    }
}

impl DisputeService {
    // ========== Opening ==========

    /// Open a dispute, or return the one already open for the same subject.
    pub async fn create(
        &self,
        user: &user::Model,
        input: CreateDisputeInput,
        uploads: Vec<AttachmentUpload>,
    ) -> AppResult<CreateOutcome> {
        input.validate()?;
        self.attachments.validate(&uploads)?;

        let context = input.context;
        let subject_id = input.subject_id()?.to_string();
        let parties = self.resolve_parties(user, context, &subject_id).await?;
        self.ensure_known_reason(context, &input.reason_code).await?;

        let subject_key = context.subject_key(&subject_id);
        if let Some(existing) = self
            .dispute_repo
            .find_by_subject(context, &parties.buyer_id, &parties.seller_id, &subject_key)
            .await?
        {
            return Ok(CreateOutcome {
                dispute: DisputeView::from(&existing),
                created: false,
            });
        }

        let now = Utc::now();
        let id = self.id_gen.generate();
        let attachments = self.attachments.store(&id, uploads).await?;

        let dispute = dispute::Model {
            id: id.clone(),
            context,
            buyer_id: parties.buyer_id,
            seller_id: parties.seller_id,
            order_id: (context == DisputeContext::Order).then(|| subject_id.clone()),
            campaign_id: match context {
                DisputeContext::Campaign => Some(subject_id.clone()),
                _ => parties.campaign_id,
            },
            application_id: (context == DisputeContext::Application).then(|| subject_id.clone()),
            product_id: input.product_id,
            shop_id: parties.shop_id,
            reason_code: input.reason_code,
            initial_description: input.description.trim().to_string(),
            status: DisputeStatus::Open,
            sla_hours: self.config.default_sla_hours,
            current_deadline: Some(workflow::deadline_from(now, self.config.default_sla_hours).into()),
            closure_type: None,
            proposal_buyer_status: None,
            proposal_seller_status: None,
            moderator_assigned_to: None,
            moderator_key: None,
            version: 0,
            subject_key,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let author_role = access::buyer_capability(context)
            .author_role()
            .unwrap_or(AuthorRole::Buyer);
        let opening = self.new_message(
            &id,
            author_role,
            Some(&user.id),
            dispute.initial_description.clone(),
            &attachments,
            now,
        );

        let created = match self
            .dispute_repo
            .create(dispute.clone().into(), opening.clone().into())
            .await
        {
            Ok(created) => created,
            Err(e) => {
                self.attachments.discard(&attachments).await;
                return Err(e);
            }
        };
        let Some(created) = created else {
            // Lost the race to a concurrent create for the same subject.
            self.attachments.discard(&attachments).await;
            let existing = self
                .dispute_repo
                .find_by_subject(
                    context,
                    &dispute.buyer_id,
                    &dispute.seller_id,
                    &dispute.subject_key,
                )
                .await?
                .ok_or_else(|| {
                    AppError::Conflict("Dispute was created concurrently".to_string())
                })?;
            return Ok(CreateOutcome {
                dispute: DisputeView::from(&existing),
                created: false,
            });
        };

        let metrics = get_metrics();
        metrics.disputes_created.fetch_add(1, Ordering::Relaxed);
        metrics.dispute_messages.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            dispute_id = %created.id,
            context = context.as_str(),
            buyer_id = %created.buyer_id,
            seller_id = %created.seller_id,
            "Dispute opened"
        );

        self.notify(
            &created,
            vec![created.seller_id.clone()],
            NotificationType::DisputeCreated,
            "New dispute",
            format!(
                "A {} opened a dispute: {}",
                party_label(context, Party::Buyer),
                created.reason_code
            ),
        )
        .await;
        self.broadcast(&created, Some(&opening)).await;

        Ok(CreateOutcome {
            dispute: DisputeView::from(&created),
            created: true,
        })
    }

    async fn resolve_parties(
        &self,
        user: &user::Model,
        context: DisputeContext,
        subject_id: &str,
    ) -> AppResult<Parties> {
        match context {
            DisputeContext::Order => {
                let order = self
                    .subject_repo
                    .find_order(subject_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Order {subject_id}")))?;
                if order.buyer_id != user.id {
                    return Err(AppError::Forbidden(
                        "Only the buyer of the order can open a dispute".to_string(),
                    ));
                }
                Ok(Parties {
                    buyer_id: order.buyer_id,
                    seller_id: order.seller_id,
                    shop_id: order.shop_id,
                    campaign_id: None,
                })
            }
            DisputeContext::Campaign => {
                let campaign = self
                    .subject_repo
                    .find_campaign(subject_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Campaign {subject_id}")))?;
                if campaign.seller_id == user.id {
                    return Err(AppError::Forbidden(
                        "You cannot open a dispute on your own campaign".to_string(),
                    ));
                }
                Ok(Parties {
                    buyer_id: user.id.clone(),
                    seller_id: campaign.seller_id,
                    shop_id: campaign.shop_id,
                    campaign_id: None,
                })
            }
            DisputeContext::Application => {
                let (application, campaign) = self
                    .subject_repo
                    .find_application(subject_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Application {subject_id}")))?;
                if application.influencer_id != user.id {
                    return Err(AppError::Forbidden(
                        "Only the applicant can open a dispute on an application".to_string(),
                    ));
                }
                let campaign = campaign.ok_or_else(|| {
                    AppError::NotFound(format!("Campaign {}", application.campaign_id))
                })?;
                Ok(Parties {
                    buyer_id: application.influencer_id,
                    seller_id: campaign.seller_id,
                    shop_id: campaign.shop_id,
                    campaign_id: Some(campaign.id),
                })
            }
        }
    }

    async fn ensure_known_reason(&self, context: DisputeContext, code: &str) -> AppResult<()> {
        let known = self
            .reasons(Some(context.as_str()))
            .await?
            .iter()
            .any(|r| r.clave == code);
        if !known {
            return Err(AppError::Validation(format!(
                "Unknown reason {code} for {} disputes",
                context.as_str()
            )));
        }
        Ok(())
    }

    // ========== Reading ==========

    /// Load a dispute, rejecting malformed ids before touching the database.
    pub(super) async fn load(&self, id: &str) -> AppResult<dispute::Model> {
        if !is_valid_id(id) {
            return Err(AppError::BadRequest(format!("Invalid dispute id: {id}")));
        }
        self.dispute_repo.get_by_id(id).await
    }

    async fn load_for(
        &self,
        user: &user::Model,
        id: &str,
    ) -> AppResult<(dispute::Model, Capability)> {
        let dispute = self.load(id).await?;
        let capability = access::resolve_capability(user, &dispute);
        access::ensure_can_view(capability)?;
        Ok((dispute, capability))
    }

    /// A dispute with its thread, participants and the caller's capability.
    pub async fn get_detail(
        &self,
        user: &user::Model,
        id: &str,
    ) -> AppResult<DisputeDetail> {
        let (dispute, capability) = self.load_for(user, id).await?;
        let messages = self.dispute_repo.find_messages(&dispute.id).await?;
        let item = self
            .enrich(vec![dispute])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Enrichment dropped the dispute".to_string()))?;

        Ok(DisputeDetail {
            item,
            messages: messages.iter().map(MessageView::from).collect(),
            capability,
        })
    }

    // ========== Thread ==========

    /// Append a message from a party or the moderating staff.
    pub async fn add_message(
        &self,
        user: &user::Model,
        id: &str,
        input: MessageInput,
        uploads: Vec<AttachmentUpload>,
    ) -> AppResult<MessagePosted> {
        input.validate()?;
        self.attachments.validate(&uploads)?;
        let (dispute, capability) = self.load_for(user, id).await?;
        if capability.is_staff() {
            access::ensure_can_moderate(capability, &user.id, &dispute)?;
        }
        let role = capability
            .author_role()
            .ok_or_else(|| AppError::Forbidden("You are not part of this dispute".to_string()))?;

        let text = input.texto.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() && uploads.is_empty() {
            return Err(AppError::Validation(
                "A message needs text or attachments".to_string(),
            ));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::Validation("Message is too long".to_string()));
        }

        let now = Utc::now();
        let change = workflow::record_message(&dispute, now)?;
        let attachments = self.attachments.store(&dispute.id, uploads).await?;
        let message = self.new_message(
            &dispute.id,
            role,
            Some(&user.id),
            text.to_string(),
            &attachments,
            now,
        );

        let updated = match self
            .commit(&dispute, change.into_active_model(now), Some(&message), None)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.attachments.discard(&attachments).await;
                return Err(e);
            }
        };

        let recipients = self
            .audience(&updated)
            .into_iter()
            .filter(|u| *u != user.id)
            .collect();
        self.notify(
            &updated,
            recipients,
            NotificationType::DisputeMessage,
            "New dispute message",
            format!("New message on dispute {}", updated.id),
        )
        .await;
        self.broadcast(&updated, Some(&message)).await;

        Ok(MessagePosted {
            message: MessageView::from(&message),
            dispute: DisputeView::from(&updated),
        })
    }

    // ========== Moderation ==========

    /// Ask one party for more information.
    pub async fn request_info(
        &self,
        user: &user::Model,
        id: &str,
        input: RequestInfoInput,
        meta: &RequestMeta,
    ) -> AppResult<DisputeView> {
        input.validate()?;
        let (dispute, capability) = self.load_for(user, id).await?;
        access::ensure_can_moderate(capability, &user.id, &dispute)?;

        let now = Utc::now();
        let change = workflow::request_info(&dispute, input.target, now)?;
        let message = self.new_message(
            &dispute.id,
            AuthorRole::Moderator,
            Some(&user.id),
            input.texto.trim().to_string(),
            &[],
            now,
        );
        let audit = self.new_audit(
            Some(&user.id),
            "dispute.request_info",
            &dispute,
            AuditSnapshot::after(&dispute, &change),
            meta,
            now,
        );

        let updated = self
            .commit(&dispute, change.into_active_model(now), Some(&message), Some(audit))
            .await?;

        tracing::info!(
            dispute_id = %updated.id,
            moderator_id = %user.id,
            target = party_label(updated.context, input.target),
            "Information requested"
        );

        self.notify(
            &updated,
            vec![party_user(&updated, input.target).to_string()],
            NotificationType::DisputeInfoRequested,
            "Information requested",
            "A moderator needs more information about your dispute".to_string(),
        )
        .await;
        self.broadcast(&updated, Some(&message)).await;

        Ok(DisputeView::from(&updated))
    }

    /// Propose a resolution both parties must accept.
    pub async fn propose(
        &self,
        user: &user::Model,
        id: &str,
        input: ProposalInput,
        meta: &RequestMeta,
    ) -> AppResult<DisputeView> {
        input.validate()?;
        let (dispute, capability) = self.load_for(user, id).await?;
        access::ensure_can_moderate(capability, &user.id, &dispute)?;

        let now = Utc::now();
        let change = workflow::propose(&dispute, input.cierre_tipo, now)?;
        let message = self.new_message(
            &dispute.id,
            AuthorRole::Moderator,
            Some(&user.id),
            input.texto.trim().to_string(),
            &[],
            now,
        );
        let audit = self.new_audit(
            Some(&user.id),
            "dispute.proposal",
            &dispute,
            AuditSnapshot::after(&dispute, &change),
            meta,
            now,
        );

        let updated = self
            .commit(&dispute, change.into_active_model(now), Some(&message), Some(audit))
            .await?;

        tracing::info!(dispute_id = %updated.id, moderator_id = %user.id, "Resolution proposed");

        self.notify(
            &updated,
            vec![updated.buyer_id.clone(), updated.seller_id.clone()],
            NotificationType::DisputeProposal,
            "Resolution proposed",
            "A moderator proposed a resolution for your dispute".to_string(),
        )
        .await;
        self.broadcast(&updated, Some(&message)).await;

        Ok(DisputeView::from(&updated))
    }

    /// Record a party's answer to the open proposal.
    ///
    /// Staff may answer for a named party. Repeating an answer changes nothing.
    pub async fn decide(
        &self,
        user: &user::Model,
        id: &str,
        input: DecisionInput,
        meta: &RequestMeta,
    ) -> AppResult<ActionOutcome> {
        let (dispute, capability) = self.load_for(user, id).await?;

        let (party, on_behalf) = match capability.party() {
            Some(own) => {
                if input.party.is_some_and(|p| p != own) {
                    return Err(AppError::Forbidden(
                        "You can only answer for your own side".to_string(),
                    ));
                }
                (own, false)
            }
            None => {
                access::ensure_can_moderate(capability, &user.id, &dispute)?;
                let party = input.party.ok_or_else(|| {
                    AppError::Validation("party is required when answering for a party".to_string())
                })?;
                (party, true)
            }
        };

        let now = Utc::now();
        let Some(change) = workflow::decide(&dispute, party, input.decision, now)? else {
            return Ok(ActionOutcome {
                dispute: DisputeView::from(&dispute),
                changed: false,
            });
        };

        let verb = match input.decision {
            Decision::Accept => "accepted",
            Decision::Reject => "rejected",
        };
        let mut text = format!(
            "The {} {verb} the proposal",
            party_label(dispute.context, party)
        );
        if on_behalf {
            text.push_str(" (recorded by a moderator)");
        }

        let role = capability.author_role().unwrap_or(AuthorRole::System);
        let message = self.new_message(&dispute.id, role, Some(&user.id), text.clone(), &[], now);
        let audit = on_behalf.then(|| {
            self.new_audit(
                Some(&user.id),
                "dispute.proposal.decision",
                &dispute,
                AuditSnapshot::after(&dispute, &change),
                meta,
                now,
            )
        });

        let updated = self
            .commit(&dispute, change.into_active_model(now), Some(&message), audit)
            .await?;

        tracing::info!(
            dispute_id = %updated.id,
            party = party_label(updated.context, party),
            decision = verb,
            status = updated.status.as_str(),
            "Proposal answered"
        );

        let recipients = self
            .audience(&updated)
            .into_iter()
            .filter(|u| *u != user.id)
            .collect();
        self.notify(
            &updated,
            recipients,
            NotificationType::DisputeProposalDecision,
            "Proposal answered",
            text,
        )
        .await;
        self.broadcast(&updated, Some(&message)).await;

        Ok(ActionOutcome {
            dispute: DisputeView::from(&updated),
            changed: true,
        })
    }

    /// A party asks for a moderator on an open dispute.
    pub async fn request_mediation(
        &self,
        user: &user::Model,
        id: &str,
        input: MediationInput,
    ) -> AppResult<DisputeView> {
        input.validate()?;
        let (dispute, capability) = self.load_for(user, id).await?;
        let party = access::ensure_party(capability)?;

        let now = Utc::now();
        let change = workflow::request_mediation(&dispute, now)?;

        let label = party_label(dispute.context, party);
        let message = match input.texto.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => self.new_message(
                &dispute.id,
                capability.author_role().unwrap_or(AuthorRole::System),
                Some(&user.id),
                text.to_string(),
                &[],
                now,
            ),
            _ => self.new_message(
                &dispute.id,
                AuthorRole::System,
                None,
                format!("Mediation requested by the {label}"),
                &[],
                now,
            ),
        };

        let updated = self
            .commit(&dispute, change.into_active_model(now), Some(&message), None)
            .await?;

        tracing::info!(dispute_id = %updated.id, requested_by = label, "Mediation requested");

        let mut recipients: Vec<String> = match self.user_repo.find_staff().await {
            Ok(staff) => staff.into_iter().map(|u| u.id).collect(),
            Err(e) => {
                tracing::warn!(error = %e, dispute_id = %updated.id, "Failed to load staff for mediation notice");
                vec![]
            }
        };
        recipients.push(party_user(&updated, other(party)).to_string());
        recipients.retain(|u| *u != user.id);

        self.notify(
            &updated,
            recipients,
            NotificationType::DisputeMediation,
            "Mediation requested",
            format!("The {label} asked a moderator to review dispute {}", updated.id),
        )
        .await;
        self.broadcast(&updated, Some(&message)).await;

        Ok(DisputeView::from(&updated))
    }

    // ========== Staff ==========

    /// Move a dispute to any state.
    pub async fn admin_update_state(
        &self,
        user: &user::Model,
        id: &str,
        input: StateUpdateInput,
        meta: &RequestMeta,
    ) -> AppResult<DisputeView> {
        input.validate()?;
        let (dispute, capability) = self.load_for(user, id).await?;
        access::ensure_can_moderate(capability, &user.id, &dispute)?;

        let now = Utc::now();
        let change = workflow::override_status(&dispute, input.estado, input.cierre_tipo, now);

        let mut text = format!("Status changed to {}", input.estado.as_str());
        if let Some(note) = input.nota.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            text.push_str("\n\n");
            text.push_str(note);
        }
        let message = self.new_message(&dispute.id, AuthorRole::System, None, text, &[], now);
        let audit = self.new_audit(
            Some(&user.id),
            "dispute.state.update",
            &dispute,
            AuditSnapshot::after(&dispute, &change),
            meta,
            now,
        );

        let updated = self
            .commit(&dispute, change.into_active_model(now), Some(&message), Some(audit))
            .await?;

        tracing::info!(
            dispute_id = %updated.id,
            moderator_id = %user.id,
            from = dispute.status.as_str(),
            to = updated.status.as_str(),
            "Dispute state overridden"
        );

        self.notify(
            &updated,
            vec![updated.buyer_id.clone(), updated.seller_id.clone()],
            NotificationType::DisputeStateChanged,
            "Dispute updated",
            format!("Your dispute is now {}", updated.status.as_str()),
        )
        .await;
        self.broadcast(&updated, Some(&message)).await;

        Ok(DisputeView::from(&updated))
    }

    /// Set or clear the moderator a dispute is reserved for.
    ///
    /// Moderators may only take a dispute for themselves.
    pub async fn assign_moderator(
        &self,
        user: &user::Model,
        id: &str,
        input: AssignModeratorInput,
        meta: &RequestMeta,
    ) -> AppResult<ActionOutcome> {
        let (dispute, capability) = self.load_for(user, id).await?;
        access::ensure_can_moderate(capability, &user.id, &dispute)?;

        let target_id = input.moderator_id.as_deref().map(str::trim);
        if capability == Capability::Moderator && target_id != Some(user.id.as_str()) {
            return Err(AppError::Forbidden(
                "Moderators can only assign themselves".to_string(),
            ));
        }

        let moderator = match target_id {
            Some(target_id) => {
                let target = self
                    .user_repo
                    .find_by_id(target_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("User {target_id}")))?;
                if !target.is_staff() {
                    return Err(AppError::Validation(format!(
                        "User {target_id} is not a moderator"
                    )));
                }
                if dispute.is_party(&target.id) {
                    return Err(AppError::Validation(
                        "A party cannot moderate its own dispute".to_string(),
                    ));
                }
                Some(target)
            }
            None => None,
        };

        let moderator_id = moderator.as_ref().map(|m| m.id.clone());
        if moderator_id == dispute.moderator_assigned_to {
            return Ok(ActionOutcome {
                dispute: DisputeView::from(&dispute),
                changed: false,
            });
        }

        let now = Utc::now();
        let changes = dispute::ActiveModel {
            moderator_assigned_to: Set(moderator_id.clone()),
            moderator_key: Set(moderator.as_ref().map(|m| m.username.clone())),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let text = match &moderator {
            Some(m) => format!("Moderator @{} assigned", m.username),
            None => "Moderator unassigned".to_string(),
        };
        let message = self.new_message(&dispute.id, AuthorRole::System, None, text, &[], now);

        let mut after = AuditSnapshot::of(&dispute);
        after.moderator_assigned_to.clone_from(&moderator_id);
        after.version += 1;
        let audit = self.new_audit(
            Some(&user.id),
            "dispute.moderator.assign",
            &dispute,
            after,
            meta,
            now,
        );

        let updated = self
            .commit(&dispute, changes, Some(&message), Some(audit))
            .await?;

        tracing::info!(
            dispute_id = %updated.id,
            assigned_by = %user.id,
            moderator_id = ?updated.moderator_assigned_to,
            "Moderator assignment changed"
        );

        if let Some(moderator_id) = moderator_id.filter(|m| *m != user.id) {
            self.notify(
                &updated,
                vec![moderator_id],
                NotificationType::DisputeModeratorAssigned,
                "Dispute assigned",
                format!("You were assigned dispute {}", updated.id),
            )
            .await;
        }
        self.broadcast(&updated, Some(&message)).await;

        Ok(ActionOutcome {
            dispute: DisputeView::from(&updated),
            changed: true,
        })
    }

    // ========== SLA ==========

    /// Close up to `batch` active disputes whose deadline passed more than
    /// `grace_hours` before `now`. Returns how many were closed.
    ///
    /// Disputes changed concurrently are skipped and picked up by a later run.
    pub async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        grace_hours: i64,
        batch: u64,
    ) -> AppResult<usize> {
        let cutoff = now - Duration::hours(grace_hours);
        let overdue = self.dispute_repo.find_overdue(cutoff, batch).await?;
        let mut expired = 0;

        for dispute in overdue {
            let Some(change) = workflow::expire(&dispute, cutoff) else {
                continue;
            };

            let message = self.new_message(
                &dispute.id,
                AuthorRole::System,
                None,
                "Closed automatically: the deadline passed without a response".to_string(),
                &[],
                now,
            );
            let audit = self.new_audit(
                None,
                "dispute.expire",
                &dispute,
                AuditSnapshot::after(&dispute, &change),
                &RequestMeta::default(),
                now,
            );

            match self
                .commit(&dispute, change.into_active_model(now), Some(&message), Some(audit))
                .await
            {
                Ok(updated) => {
                    expired += 1;
                    tracing::info!(dispute_id = %updated.id, "Dispute expired");
                    self.notify(
                        &updated,
                        vec![updated.buyer_id.clone(), updated.seller_id.clone()],
                        NotificationType::DisputeExpired,
                        "Dispute closed",
                        "Your dispute was closed because its deadline passed".to_string(),
                    )
                    .await;
                    self.broadcast(&updated, Some(&message)).await;
                }
                Err(AppError::Conflict(_)) => {
                    tracing::debug!(dispute_id = %dispute.id, "Dispute changed during sweep, skipping");
                }
                Err(e) => {
                    tracing::warn!(error = %e, dispute_id = %dispute.id, "Failed to expire dispute");
                }
            }
        }

        Ok(expired)
    }

    // ========== Helpers ==========

    fn new_message(
        &self,
        dispute_id: &str,
        role: AuthorRole,
        author_id: Option<&str>,
        text: String,
        attachments: &[Attachment],
        now: DateTime<Utc>,
    ) -> dispute_message::Model {
        dispute_message::Model {
            id: self.id_gen.generate(),
            dispute_id: dispute_id.to_string(),
            author_role: role,
            author_id: author_id.map(ToString::to_string),
            text,
            attachments: serde_json::to_value(attachments).unwrap_or_else(|_| json!([])),
            created_at: now.into(),
        }
    }

    fn new_audit(
        &self,
        actor_id: Option<&str>,
        action: &str,
        before: &dispute::Model,
        after: AuditSnapshot,
        meta: &RequestMeta,
        now: DateTime<Utc>,
    ) -> audit_log::ActiveModel {
        audit_log::ActiveModel {
            id: Set(self.id_gen.generate()),
            actor_id: Set(actor_id.map(ToString::to_string)),
            action: Set(action.to_string()),
            entity_type: Set("dispute".to_string()),
            entity_id: Set(before.id.clone()),
            before: Set(Some(AuditSnapshot::of(before).to_json())),
            after: Set(Some(after.to_json())),
            metadata: Set(serde_json::to_value(meta).ok()),
            created_at: Set(now.into()),
        }
    }

    /// Write a change guarded by the version the caller read.
    async fn commit(
        &self,
        dispute: &dispute::Model,
        changes: dispute::ActiveModel,
        message: Option<&dispute_message::Model>,
        audit: Option<audit_log::ActiveModel>,
    ) -> AppResult<dispute::Model> {
        let write = DisputeWrite {
            changes,
            message: message.map(|m| m.clone().into()),
            audit,
        };

        let metrics = get_metrics();
        match self
            .dispute_repo
            .commit(&dispute.id, dispute.version, write)
            .await
        {
            Ok(updated) => {
                metrics.record_transition();
                if message.is_some() {
                    metrics.dispute_messages.fetch_add(1, Ordering::Relaxed);
                }
                Ok(updated)
            }
            Err(e) => {
                if matches!(e, AppError::Conflict(_)) {
                    metrics.dispute_conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(e)
            }
        }
    }

    /// Users who follow a dispute in real time.
    fn audience(&self, dispute: &dispute::Model) -> Vec<String> {
        let mut users = vec![dispute.buyer_id.clone(), dispute.seller_id.clone()];
        if let Some(moderator) = &dispute.moderator_assigned_to {
            users.push(moderator.clone());
        }
        users
    }

    async fn notify(
        &self,
        dispute: &dispute::Model,
        users: Vec<String>,
        kind: NotificationType,
        title: &str,
        message: String,
    ) {
        if users.is_empty() {
            return;
        }

        let input = NotificationInput {
            users,
            kind,
            title: title.to_string(),
            message,
            entity: Some(("dispute".to_string(), dispute.id.clone())),
            data: Some(json!({
                "disputeId": dispute.id,
                "estado": dispute.status,
            })),
        };

        if let Err(e) = self.notification_service.emit_and_persist(input).await {
            get_metrics().record_notification(false);
            tracing::warn!(error = %e, dispute_id = %dispute.id, "Failed to send dispute notification");
        }
    }

    async fn broadcast(&self, dispute: &dispute::Model, message: Option<&dispute_message::Model>) {
        let Some(publisher) = &self.event_publisher else {
            return;
        };
        let users = self.audience(dispute);
        let metrics = get_metrics();

        if let Some(message) = message {
            let body = serde_json::to_value(MessageView::from(message)).unwrap_or_default();
            match publisher.publish_to_users(&users, DISPUTE_MESSAGE, body).await {
                Ok(()) => {
                    metrics.events_published.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!(error = %e, dispute_id = %dispute.id, "Failed to publish dispute message");
                }
            }
        }

        let body = serde_json::to_value(DisputeView::from(dispute)).unwrap_or_default();
        match publisher.publish_to_users(&users, DISPUTE_UPDATED, body).await {
            Ok(()) => {
                metrics.events_published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(error = %e, dispute_id = %dispute.id, "Failed to publish dispute update");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{
        event_publisher::testing::RecordingPublisher,
        notification::NotificationService,
        storage::{AttachmentService, NoOpStorage, StorageService, testing::RecordingStorage},
    };
    use mercado_common::{DisputeConfig, IdGenerator};
    use mercado_db::{
        entities::{dispute_reason, shop_order},
        repositories::{DisputeRepository, NotificationRepository, SubjectRepository, UserRepository},
        test_utils::fixtures,
    };
    use bytes::Bytes;
    use sea_orm::{
        DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Statement, Value,
    };
    use std::sync::Arc;

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn build(
        db: MockDatabase,
        storage: StorageService,
    ) -> (DisputeService, Arc<RecordingPublisher>, Arc<DatabaseConnection>) {
        let db = Arc::new(db.into_connection());
        let config = DisputeConfig::default();
        let mut service = DisputeService::new(
            DisputeRepository::new(db.clone()),
            UserRepository::new(db.clone()),
            SubjectRepository::new(db.clone()),
            NotificationService::new(NotificationRepository::new(db.clone())),
            AttachmentService::new(storage, &config),
            config,
        );
        let publisher = Arc::new(RecordingPublisher::default());
        service.set_event_publisher(publisher.clone());
        (service, publisher, db)
    }

    fn service(db: MockDatabase) -> (DisputeService, Arc<RecordingPublisher>) {
        let storage = Arc::new(NoOpStorage::new("https://files.test".to_string()));
        let (service, publisher, _) = build(db, storage);
        (service, publisher)
    }

    /// Statements of the transaction that wrote the dispute row.
    fn commit_statements(service: DisputeService, db: Arc<DatabaseConnection>) -> Vec<Statement> {
        drop(service);
        let db = Arc::try_unwrap(db).ok().unwrap();
        db.into_transaction_log()
            .into_iter()
            .map(|txn| txn.statements().to_vec())
            .find(|stmts| stmts.iter().any(|s| s.sql.starts_with(r#"UPDATE "dispute""#)))
            .unwrap()
    }

    fn inserts_into(stmts: &[Statement], table: &str) -> bool {
        let prefix = format!(r#"INSERT INTO "{table}""#);
        stmts.iter().any(|s| s.sql.starts_with(&prefix))
    }

    fn new_id() -> String {
        IdGenerator::new().generate()
    }

    fn staff(id: &str, admin: bool) -> user::Model {
        let mut u = fixtures::user(id, id);
        u.is_admin = admin;
        u.is_moderator = !admin;
        u
    }

    fn audit_row(dispute_id: &str) -> audit_log::Model {
        audit_log::Model {
            id: new_id(),
            actor_id: None,
            action: "dispute.expire".to_string(),
            entity_type: "dispute".to_string(),
            entity_id: dispute_id.to_string(),
            before: None,
            after: None,
            metadata: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let (service, _) = service(MockDatabase::new(DatabaseBackend::Postgres));
        let buyer = fixtures::user("buyer", "buyer");

        let result = service.get_detail(&buyer, "not-an-id").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_outsider_cannot_view() {
        let id = new_id();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::dispute(&id, "buyer", "seller")]]);
        let (service, _) = service(db);
        let outsider = fixtures::user("outsider", "outsider");

        let result = service.get_detail(&outsider, &id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_returns_existing_dispute() {
        let existing = fixtures::dispute(&new_id(), "buyer", "seller");
        let order = shop_order::Model {
            id: "order-1".to_string(),
            buyer_id: "buyer".to_string(),
            seller_id: "seller".to_string(),
            shop_id: None,
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[order]])
            .append_query_results([Vec::<dispute_reason::Model>::new()])
            .append_query_results([[existing.clone()]]);
        let (service, publisher) = service(db);

        let input = CreateDisputeInput {
            context: DisputeContext::Order,
            order_id: Some("order-1".to_string()),
            campaign_id: None,
            application_id: None,
            product_id: None,
            reason_code: "no_recibido".to_string(),
            description: "Never arrived".to_string(),
        };
        let outcome = service
            .create(&fixtures::user("buyer", "buyer"), input, vec![])
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.dispute.id, existing.id);
        assert!(publisher.names().is_empty());
    }

    #[test]
    fn test_create_input_requires_matching_subject() {
        let mut input = CreateDisputeInput {
            context: DisputeContext::Campaign,
            order_id: Some("order-1".to_string()),
            campaign_id: None,
            application_id: None,
            product_id: None,
            reason_code: "otro".to_string(),
            description: "x".to_string(),
        };
        assert!(matches!(input.subject_id(), Err(AppError::Validation(_))));

        input.order_id = None;
        assert!(input.subject_id().is_err());

        input.campaign_id = Some(" camp-1 ".to_string());
        assert_eq!(input.subject_id().unwrap(), "camp-1");
    }

    #[tokio::test]
    async fn test_mediation_moves_to_review_and_broadcasts() {
        let id = new_id();
        let before = fixtures::dispute(&id, "buyer", "seller");
        let mut after = before.clone();
        after.status = DisputeStatus::InReview;
        after.version = 1;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[before]])
            .append_exec_results([exec(1), exec(2)])
            .append_query_results([[fixtures::message(&new_id(), &id)]])
            .append_query_results([[after]])
            .append_query_results([[staff("mod-a", false)]]);
        let (service, publisher) = service(db);

        let view = service
            .request_mediation(&fixtures::user("buyer", "buyer"), &id, MediationInput::default())
            .await
            .unwrap();

        assert_eq!(view.status, DisputeStatus::InReview);
        assert_eq!(
            publisher.names(),
            vec!["notification", "notification", DISPUTE_MESSAGE, DISPUTE_UPDATED]
        );
    }

    #[tokio::test]
    async fn test_second_mediation_request_is_rejected() {
        let id = new_id();
        let mut d = fixtures::dispute(&id, "buyer", "seller");
        d.status = DisputeStatus::InReview;
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[d]]);
        let (service, publisher) = service(db);

        let result = service
            .request_mediation(&fixtures::user("seller", "seller"), &id, MediationInput::default())
            .await;

        assert!(matches!(result, Err(AppError::InvalidState(_))));
        assert!(publisher.names().is_empty());
    }

    #[tokio::test]
    async fn test_assigned_moderator_blocks_other_moderator() {
        let id = new_id();
        let mut d = fixtures::dispute(&id, "buyer", "seller");
        d.moderator_assigned_to = Some("mod-a".to_string());
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[d]]);
        let (service, _) = service(db);

        let input = ProposalInput {
            texto: "Full refund".to_string(),
            cierre_tipo: None,
        };
        let result = service
            .propose(&staff("mod-b", false), &id, input, &RequestMeta::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_request_info_blocked_for_other_moderator() {
        let id = new_id();
        let mut d = fixtures::dispute(&id, "buyer", "seller");
        d.moderator_assigned_to = Some("mod-a".to_string());
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[d]]);
        let (service, publisher) = service(db);

        let input = RequestInfoInput {
            target: Party::Buyer,
            texto: "Please send the tracking number".to_string(),
        };
        let result = service
            .request_info(&staff("mod-b", false), &id, input, &RequestMeta::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(publisher.names().is_empty());
    }

    #[tokio::test]
    async fn test_request_info_audits_inside_commit() {
        let id = new_id();
        let mut before = fixtures::dispute(&id, "buyer", "seller");
        before.moderator_assigned_to = Some("mod-a".to_string());
        let mut after = before.clone();
        after.status = DisputeStatus::AwaitingPartyA;
        after.version = 1;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[before]])
            .append_exec_results([exec(1), exec(1)])
            .append_query_results([[fixtures::message(&new_id(), &id)]])
            .append_query_results([[audit_row(&id)]])
            .append_query_results([[after]]);
        let storage = Arc::new(NoOpStorage::default());
        let (service, _, db) = build(db, storage);

        let input = RequestInfoInput {
            target: Party::Buyer,
            texto: "Please send the tracking number".to_string(),
        };
        let view = service
            .request_info(&staff("mod-a", false), &id, input, &RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(view.status, DisputeStatus::AwaitingPartyA);

        let stmts = commit_statements(service, db);
        assert!(inserts_into(&stmts, "dispute_message"));
        assert!(inserts_into(&stmts, "audit_log"));
        assert_eq!(stmts.last().map(|s| s.sql.as_str()), Some("COMMIT"));
    }

    #[tokio::test]
    async fn test_terminal_override_clears_deadline() {
        let id = new_id();
        let before = fixtures::dispute(&id, "buyer", "seller");
        let mut after = before.clone();
        after.status = DisputeStatus::Resolved;
        after.current_deadline = None;
        after.version = 1;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[before]])
            .append_exec_results([exec(1), exec(2)])
            .append_query_results([[fixtures::message(&new_id(), &id)]])
            .append_query_results([[audit_row(&id)]])
            .append_query_results([[after]]);
        let storage = Arc::new(NoOpStorage::default());
        let (service, _, db) = build(db, storage);

        let input = StateUpdateInput {
            estado: DisputeStatus::Resolved,
            nota: Some("Refund confirmed by the seller".to_string()),
            cierre_tipo: Some("refund".to_string()),
        };
        let view = service
            .admin_update_state(&staff("root", true), &id, input, &RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(view.status, DisputeStatus::Resolved);
        assert!(view.current_deadline.is_none());

        let stmts = commit_statements(service, db);
        let update = stmts
            .iter()
            .find(|s| s.sql.starts_with(r#"UPDATE "dispute""#))
            .unwrap();
        let values = &update.values.as_ref().unwrap().0;
        assert!(
            values
                .iter()
                .any(|v| matches!(v, Value::ChronoDateTimeWithTimeZone(None)))
        );

        assert!(inserts_into(&stmts, "audit_log"));
        let audit_after = stmts
            .iter()
            .filter(|s| s.sql.starts_with(r#"INSERT INTO "audit_log""#))
            .flat_map(|s| s.values.iter().flat_map(|v| v.0.iter()))
            .find_map(|v| match v {
                Value::Json(Some(json)) if json.get("estado") == Some(&json!("resolved")) => {
                    Some((**json).clone())
                }
                _ => None,
            })
            .unwrap();
        assert!(audit_after["vencimientoActual"].is_null());
    }

    #[tokio::test]
    async fn test_failed_message_write_discards_attachments() {
        let id = new_id();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::dispute(&id, "buyer", "seller")]])
            .append_exec_results([exec(0)]);
        let storage = Arc::new(RecordingStorage::default());
        let (service, publisher, _) = build(db, storage.clone());

        let input = MessageInput {
            texto: Some("Photo of the box".to_string()),
        };
        let uploads = vec![AttachmentUpload {
            file_name: "box.png".to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(b"png"),
        }];
        let result = service
            .add_message(&fixtures::user("buyer", "buyer"), &id, input, uploads)
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(storage.uploaded().len(), 1);
        assert_eq!(storage.deleted(), storage.uploaded());
        assert!(publisher.names().is_empty());
    }

    #[tokio::test]
    async fn test_admin_proposes_on_assigned_dispute() {
        let id = new_id();
        let mut before = fixtures::dispute(&id, "buyer", "seller");
        before.moderator_assigned_to = Some("mod-a".to_string());
        let mut after = before.clone();
        after.status = DisputeStatus::Proposal;
        after.version = 1;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[before]])
            .append_exec_results([exec(1), exec(2)])
            .append_query_results([[fixtures::message(&new_id(), &id)]])
            .append_query_results([[audit_row(&id)]])
            .append_query_results([[after]]);
        let (service, _) = service(db);

        let input = ProposalInput {
            texto: "Full refund".to_string(),
            cierre_tipo: Some("refund".to_string()),
        };
        let view = service
            .propose(&staff("root", true), &id, input, &RequestMeta::default())
            .await
            .unwrap();

        assert_eq!(view.status, DisputeStatus::Proposal);
    }

    #[tokio::test]
    async fn test_repeated_decision_writes_nothing() {
        let id = new_id();
        let mut d = fixtures::dispute(&id, "buyer", "seller");
        d.status = DisputeStatus::Proposal;
        d.proposal_buyer_status = Some(dispute::ProposalStatus::Accepted);
        d.proposal_seller_status = Some(dispute::ProposalStatus::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[d]]);
        let (service, publisher) = service(db);

        let input = DecisionInput {
            decision: Decision::Accept,
            party: None,
        };
        let outcome = service
            .decide(&fixtures::user("buyer", "buyer"), &id, input, &RequestMeta::default())
            .await
            .unwrap();

        assert!(!outcome.changed);
        assert!(publisher.names().is_empty());
    }

    #[tokio::test]
    async fn test_party_cannot_answer_for_other_side() {
        let id = new_id();
        let mut d = fixtures::dispute(&id, "buyer", "seller");
        d.status = DisputeStatus::Proposal;
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[d]]);
        let (service, _) = service(db);

        let input = DecisionInput {
            decision: Decision::Accept,
            party: Some(Party::Seller),
        };
        let result = service
            .decide(&fixtures::user("buyer", "buyer"), &id, input, &RequestMeta::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_stale_version_returns_conflict() {
        let id = new_id();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::dispute(&id, "buyer", "seller")]])
            .append_exec_results([exec(0)]);
        let (service, publisher) = service(db);

        let input = MessageInput {
            texto: Some("Any update?".to_string()),
        };
        let result = service
            .add_message(&fixtures::user("buyer", "buyer"), &id, input, vec![])
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(publisher.names().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let id = new_id();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::dispute(&id, "buyer", "seller")]]);
        let (service, _) = service(db);

        let input = MessageInput {
            texto: Some("   ".to_string()),
        };
        let result = service
            .add_message(&fixtures::user("seller", "seller"), &id, input, vec![])
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_moderator_cannot_assign_someone_else() {
        let id = new_id();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::dispute(&id, "buyer", "seller")]]);
        let (service, _) = service(db);

        let input = AssignModeratorInput {
            moderator_id: Some("mod-b".to_string()),
        };
        let result = service
            .assign_moderator(&staff("mod-a", false), &id, input, &RequestMeta::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_party_cannot_be_assigned_as_moderator() {
        let id = new_id();
        let seller = staff("seller", false);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[fixtures::dispute(&id, "buyer", "seller")]])
            .append_query_results([[seller]]);
        let (service, _) = service(db);

        let input = AssignModeratorInput {
            moderator_id: Some("seller".to_string()),
        };
        let result = service
            .assign_moderator(&staff("root", true), &id, input, &RequestMeta::default())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_expire_overdue_skips_conflicts() {
        let now = Utc::now();
        let mut first = fixtures::dispute(&new_id(), "buyer", "seller");
        first.current_deadline = Some((now - Duration::hours(2)).into());
        let mut second = fixtures::dispute(&new_id(), "buyer", "seller-2");
        second.current_deadline = Some((now - Duration::hours(1)).into());
        let mut closed = first.clone();
        closed.status = DisputeStatus::ClosedExpired;
        closed.current_deadline = None;
        closed.version = 1;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[first.clone(), second]])
            .append_exec_results([exec(1), exec(2), exec(0)])
            .append_query_results([[fixtures::message(&new_id(), &first.id)]])
            .append_query_results([[audit_row(&first.id)]])
            .append_query_results([[closed]]);
        let (service, publisher) = service(db);

        let expired = service.expire_overdue(now, 0, 100).await.unwrap();

        assert_eq!(expired, 1);
        assert!(publisher.names().contains(&DISPUTE_UPDATED.to_string()));
    }

    #[test]
    fn test_party_labels_follow_context() {
        assert_eq!(party_label(DisputeContext::Order, Party::Buyer), "buyer");
        assert_eq!(party_label(DisputeContext::Campaign, Party::Buyer), "influencer");
        assert_eq!(party_label(DisputeContext::Application, Party::Seller), "seller");
    }
}
