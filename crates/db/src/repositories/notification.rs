//! Notification repository.

use std::sync::Arc;

use crate::entities::{Notification, notification};
use mercado_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, EntityTrait};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a batch of notifications in one statement.
    pub async fn create_many(&self, models: Vec<notification::ActiveModel>) -> AppResult<u64> {
        if models.is_empty() {
            return Ok(0);
        }

        Notification::insert_many(models)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    #[tokio::test]
    async fn test_create_many_empty_is_noop() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = NotificationRepository::new(db);

        assert_eq!(repo.create_many(vec![]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_many() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );
        let repo = NotificationRepository::new(db);

        let model = |id: &str, user: &str| notification::ActiveModel {
            id: Set(id.to_string()),
            notifiee_id: Set(user.to_string()),
            notification_type: Set(notification::NotificationType::DisputeCreated),
            title: Set("Dispute opened".to_string()),
            message: Set("A dispute was opened".to_string()),
            entity_type: Set(Some("dispute".to_string())),
            entity_id: Set(Some("d1".to_string())),
            data: Set(None),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        let inserted = repo
            .create_many(vec![model("n1", "u1"), model("n2", "u2")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
    }
}
