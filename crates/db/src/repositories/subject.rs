//! Read access to the records a dispute can be about.

use std::sync::Arc;

use crate::entities::{Campaign, CampaignApplication, ShopOrder, campaign, campaign_application, shop_order};
use mercado_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, EntityTrait};

/// Repository over orders, campaigns and campaign applications.
#[derive(Clone)]
pub struct SubjectRepository {
    db: Arc<DatabaseConnection>,
}

impl SubjectRepository {
    /// Create a new subject repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an order by ID.
    pub async fn find_order(&self, id: &str) -> AppResult<Option<shop_order::Model>> {
        ShopOrder::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a campaign by ID.
    pub async fn find_campaign(&self, id: &str) -> AppResult<Option<campaign::Model>> {
        Campaign::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a campaign application together with its campaign.
    pub async fn find_application(
        &self,
        id: &str,
    ) -> AppResult<Option<(campaign_application::Model, Option<campaign::Model>)>> {
        CampaignApplication::find_by_id(id)
            .find_also_related(Campaign)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
