//! Notification service.
//!
//! Persists in-app notifications and pushes them to the recipients'
//! real-time rooms.

use crate::services::event_publisher::{EventPublisherService, NOTIFICATION};
use mercado_common::{AppResult, IdGenerator, get_metrics};
use mercado_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};

/// A notification to deliver to one or more users.
#[derive(Debug, Clone)]
pub struct NotificationInput {
    /// Recipients. Duplicates are delivered once.
    pub users: Vec<String>,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    /// Related entity, e.g. `("dispute", id)`.
    pub entity: Option<(String, String)>,
    pub data: Option<serde_json::Value>,
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Store one notification per recipient and push each to its owner.
    ///
    /// Storage errors are returned; push errors are logged and skipped.
    pub async fn emit_and_persist(
        &self,
        input: NotificationInput,
    ) -> AppResult<Vec<notification::Model>> {
        let mut users = input.users;
        users.sort();
        users.dedup();

        let now = chrono::Utc::now();
        let (entity_type, entity_id) = input.entity.unzip();

        let models: Vec<notification::Model> = users
            .into_iter()
            .map(|user_id| notification::Model {
                id: self.id_gen.generate(),
                notifiee_id: user_id,
                notification_type: input.kind,
                title: input.title.clone(),
                message: input.message.clone(),
                entity_type: entity_type.clone(),
                entity_id: entity_id.clone(),
                data: input.data.clone(),
                is_read: false,
                created_at: now.into(),
            })
            .collect();

        let active: Vec<notification::ActiveModel> =
            models.iter().cloned().map(Into::into).collect();

        self.notification_repo.create_many(active).await?;

        if let Some(publisher) = &self.event_publisher {
            for model in &models {
                let body = serde_json::to_value(model).unwrap_or_default();
                if let Err(e) = publisher
                    .publish_to_users(std::slice::from_ref(&model.notifiee_id), NOTIFICATION, body)
                    .await
                {
                    tracing::warn!(error = %e, user_id = %model.notifiee_id, "Failed to push notification");
                }
            }
        }

        get_metrics()
            .notifications_sent
            .fetch_add(models.len() as u64, std::sync::atomic::Ordering::Relaxed);

        Ok(models)
    }
}
