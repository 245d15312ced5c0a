//! Repositories.

mod dispute;
mod notification;
mod subject;
mod user;

pub use dispute::{
    DisputeRepository, DisputeSearch, DisputeWrite, ModeratorFilter, PartyDisputeFilter, PartySide,
};
pub use notification::NotificationRepository;
pub use subject::SubjectRepository;
pub use user::UserRepository;
