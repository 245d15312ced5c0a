//! Business logic services.

#![allow(missing_docs)]

pub mod dispute;
pub mod event_publisher;
pub mod notification;
pub mod storage;
pub mod user;

pub use dispute::{
    AdminDisputeQuery, AssignModeratorInput, CreateDisputeInput, DecisionInput, DisputeService,
    MediationInput, MessageInput, PartyDisputeQuery, ProposalInput, RequestInfoInput, RequestMeta,
    StateUpdateInput,
};
pub use event_publisher::{EventPublisher, EventPublisherService, NoOpEventPublisher, UserEvent};
pub use notification::{NotificationInput, NotificationService};
pub use storage::{AttachmentService, AttachmentUpload, NoOpStorage, StorageService};
pub use user::UserService;
