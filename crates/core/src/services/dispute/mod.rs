//! Dispute resolution.
//!
//! [`workflow`] holds the state machine, [`access`] the role checks, and
//! [`DisputeService`] ties them to storage, notifications and real-time
//! events.

mod listing;
mod reasons;
mod service;

pub mod access;
pub mod view;
pub mod workflow;

pub use access::Capability;
pub use listing::{AdminDisputeQuery, ListRole, PartyDisputeQuery};
pub use service::{
    AssignModeratorInput, CreateDisputeInput, DecisionInput, MediationInput, MessageInput,
    ProposalInput, RequestInfoInput, StateUpdateInput,
};
pub use view::{
    ActionOutcome, CreateOutcome, DisputeDetail, DisputeListItem, DisputePage, DisputeView,
    MessagePosted, MessageView, ReasonView, UserSummary,
};
pub use workflow::{Decision, DisputeChange, Party};

use mercado_common::{DisputeConfig, IdGenerator};
use mercado_db::repositories::{DisputeRepository, SubjectRepository, UserRepository};
use serde::Serialize;

use crate::services::{
    event_publisher::EventPublisherService, notification::NotificationService,
    storage::AttachmentService,
};

/// Where a privileged request came from, stored with its audit entry.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Normalized page parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u64 = 20;
    pub const MAX_LIMIT: u64 = 100;

    /// Page defaults to 1, limit to 20 and is capped at 100.
    #[must_use]
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.page - 1) * self.limit
    }
}

/// Dispute service for business logic.
#[derive(Clone)]
pub struct DisputeService {
    dispute_repo: DisputeRepository,
    user_repo: UserRepository,
    subject_repo: SubjectRepository,
    notification_service: NotificationService,
    attachments: AttachmentService,
    event_publisher: Option<EventPublisherService>,
    config: DisputeConfig,
    id_gen: IdGenerator,
}

impl DisputeService {
    /// Create a new dispute service.
    #[must_use]
    pub const fn new(
        dispute_repo: DisputeRepository,
        user_repo: UserRepository,
        subject_repo: SubjectRepository,
        notification_service: NotificationService,
        attachments: AttachmentService,
        config: DisputeConfig,
    ) -> Self {
        Self {
            dispute_repo,
            user_repo,
            subject_repo,
            notification_service,
            attachments,
            event_publisher: None,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Workflow settings in effect.
    #[must_use]
    pub const fn config(&self) -> &DisputeConfig {
        &self.config
    }
}
