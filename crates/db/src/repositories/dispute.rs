//! Dispute repository.
//!
//! Every state change goes through [`DisputeRepository::commit`], which
//! applies the change only if the row still carries the version the caller
//! read, and writes the accompanying message and audit entry in the same
//! transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
    sea_query::Expr,
};

use crate::entities::{
    Dispute, DisputeMessage, DisputeReason, audit_log,
    dispute::{self, DisputeContext, DisputeStatus},
    dispute_message, dispute_reason,
};
use mercado_common::{AppError, AppResult};

/// Which side of the dispute a listing is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartySide {
    /// Disputes the user opened (buyer or influencer).
    Buyer,
    /// Disputes raised against the user.
    Seller,
}

/// Filters for a party's own dispute list.
#[derive(Debug, Clone, Default)]
pub struct PartyDisputeFilter {
    pub status: Option<DisputeStatus>,
    pub context: Option<DisputeContext>,
    pub side: Option<PartySide>,
}

/// Moderator filter on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeratorFilter {
    /// No moderator assigned.
    Unassigned,
    /// Assigned to the given user.
    Assigned(String),
}

/// Filters for the moderation dashboard.
#[derive(Debug, Clone, Default)]
pub struct DisputeSearch {
    pub context: Option<DisputeContext>,
    pub status: Option<DisputeStatus>,
    /// Substring of the dispute, order, campaign or application id.
    pub query: Option<String>,
    /// Restrict to these buyers; an empty list matches nothing.
    pub buyer_ids: Option<Vec<String>>,
    /// Restrict to these sellers; an empty list matches nothing.
    pub seller_ids: Option<Vec<String>>,
    pub reason_code: Option<String>,
    pub moderator: Option<ModeratorFilter>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Deadline strictly after this instant.
    pub deadline_after: Option<DateTime<Utc>>,
    /// Deadline at or before this instant.
    pub deadline_before: Option<DateTime<Utc>>,
    /// Exclude closed disputes.
    pub active_only: bool,
}

impl DisputeSearch {
    fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        if let Some(context) = self.context {
            cond = cond.add(dispute::Column::Context.eq(context));
        }
        if let Some(status) = self.status {
            cond = cond.add(dispute::Column::Status.eq(status));
        }
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            cond = cond.add(
                Condition::any()
                    .add(dispute::Column::Id.contains(query))
                    .add(dispute::Column::OrderId.contains(query))
                    .add(dispute::Column::CampaignId.contains(query))
                    .add(dispute::Column::ApplicationId.contains(query)),
            );
        }
        if let Some(ids) = &self.buyer_ids {
            cond = cond.add(dispute::Column::BuyerId.is_in(ids.clone()));
        }
        if let Some(ids) = &self.seller_ids {
            cond = cond.add(dispute::Column::SellerId.is_in(ids.clone()));
        }
        if let Some(code) = &self.reason_code {
            cond = cond.add(dispute::Column::ReasonCode.eq(code.as_str()));
        }
        match &self.moderator {
            Some(ModeratorFilter::Unassigned) => {
                cond = cond.add(dispute::Column::ModeratorAssignedTo.is_null());
            }
            Some(ModeratorFilter::Assigned(id)) => {
                cond = cond.add(dispute::Column::ModeratorAssignedTo.eq(id.as_str()));
            }
            None => {}
        }
        if let Some(from) = self.created_from {
            cond = cond.add(dispute::Column::CreatedAt.gte(from));
        }
        if let Some(to) = self.created_to {
            cond = cond.add(dispute::Column::CreatedAt.lte(to));
        }
        if let Some(after) = self.deadline_after {
            cond = cond.add(dispute::Column::CurrentDeadline.gt(after));
        }
        if let Some(before) = self.deadline_before {
            cond = cond.add(dispute::Column::CurrentDeadline.lte(before));
        }
        if self.active_only {
            cond = cond.add(dispute::Column::Status.is_not_in(DisputeStatus::TERMINAL));
        }

        cond
    }
}

/// Everything written alongside a dispute state change.
#[derive(Debug, Default)]
pub struct DisputeWrite {
    /// Columns to change. Unset columns are left alone.
    pub changes: dispute::ActiveModel,
    pub message: Option<dispute_message::ActiveModel>,
    pub audit: Option<audit_log::ActiveModel>,
}

/// Dispute repository for database operations.
#[derive(Clone)]
pub struct DisputeRepository {
    db: Arc<DatabaseConnection>,
}

impl DisputeRepository {
    /// Create a new dispute repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a dispute by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<dispute::Model>> {
        Dispute::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a dispute by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<dispute::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DisputeNotFound(id.to_string()))
    }

    /// Find the dispute occupying a uniqueness slot.
    pub async fn find_by_subject(
        &self,
        context: DisputeContext,
        buyer_id: &str,
        seller_id: &str,
        subject_key: &str,
    ) -> AppResult<Option<dispute::Model>> {
        Dispute::find()
            .filter(dispute::Column::Context.eq(context))
            .filter(dispute::Column::BuyerId.eq(buyer_id))
            .filter(dispute::Column::SellerId.eq(seller_id))
            .filter(dispute::Column::SubjectKey.eq(subject_key))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a dispute and its opening message.
    ///
    /// Returns `None` when another dispute already holds the same
    /// `(context, buyer, seller, subject)` slot; nothing is written then.
    pub async fn create(
        &self,
        dispute: dispute::ActiveModel,
        opening: dispute_message::ActiveModel,
    ) -> AppResult<Option<dispute::Model>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = match dispute.insert(&txn).await {
            Ok(model) => model,
            Err(e) if is_unique_violation(&e) => return Ok(None),
            Err(e) => return Err(AppError::Database(e.to_string())),
        };

        opening
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Some(created))
    }

    /// Apply a state change if the row is still at `expected_version`.
    ///
    /// Bumps `version`, inserts the optional message and audit entry, and
    /// returns the row as committed. A stale version yields
    /// [`AppError::Conflict`] with nothing written.
    pub async fn commit(
        &self,
        id: &str,
        expected_version: i32,
        write: DisputeWrite,
    ) -> AppResult<dispute::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Dispute::update_many()
            .set(write.changes)
            .col_expr(
                dispute::Column::Version,
                Expr::col(dispute::Column::Version).add(1),
            )
            .filter(dispute::Column::Id.eq(id))
            .filter(dispute::Column::Version.eq(expected_version))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Err(AppError::Conflict(format!(
                "Dispute {id} was modified by another request"
            )));
        }

        if let Some(message) = write.message {
            message
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        if let Some(audit) = write.audit {
            audit
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        let updated = Dispute::find_by_id(id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::DisputeNotFound(id.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Message thread of a dispute, oldest first.
    pub async fn find_messages(&self, dispute_id: &str) -> AppResult<Vec<dispute_message::Model>> {
        DisputeMessage::find()
            .filter(dispute_message::Column::DisputeId.eq(dispute_id))
            .order_by_asc(dispute_message::Column::CreatedAt)
            .order_by_asc(dispute_message::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Disputes a user takes part in, newest first, with the total count.
    pub async fn find_for_party(
        &self,
        user_id: &str,
        filter: &PartyDisputeFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<dispute::Model>, u64)> {
        let party = match filter.side {
            Some(PartySide::Buyer) => Condition::all().add(dispute::Column::BuyerId.eq(user_id)),
            Some(PartySide::Seller) => Condition::all().add(dispute::Column::SellerId.eq(user_id)),
            None => Condition::any()
                .add(dispute::Column::BuyerId.eq(user_id))
                .add(dispute::Column::SellerId.eq(user_id)),
        };

        let mut cond = Condition::all().add(party);
        if let Some(status) = filter.status {
            cond = cond.add(dispute::Column::Status.eq(status));
        }
        if let Some(context) = filter.context {
            cond = cond.add(dispute::Column::Context.eq(context));
        }

        self.page(cond, limit, offset).await
    }

    /// Dashboard search, newest first, with the total count.
    pub async fn search(
        &self,
        search: &DisputeSearch,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<dispute::Model>, u64)> {
        if search.buyer_ids.as_ref().is_some_and(Vec::is_empty)
            || search.seller_ids.as_ref().is_some_and(Vec::is_empty)
        {
            return Ok((vec![], 0));
        }

        self.page(search.condition(), limit, offset).await
    }

    async fn page(
        &self,
        cond: Condition,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<dispute::Model>, u64)> {
        let total = Dispute::find()
            .filter(cond.clone())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let items = Dispute::find()
            .filter(cond)
            .order_by_desc(dispute::Column::CreatedAt)
            .order_by_desc(dispute::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((items, total))
    }

    /// Active disputes whose deadline is before `cutoff`, oldest deadline first.
    pub async fn find_overdue(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<dispute::Model>> {
        Dispute::find()
            .filter(dispute::Column::Status.is_not_in(DisputeStatus::TERMINAL))
            .filter(dispute::Column::CurrentDeadline.lt(cutoff))
            .order_by_asc(dispute::Column::CurrentDeadline)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active catalogue reasons, optionally for one category.
    pub async fn find_reasons(
        &self,
        categoria: Option<&str>,
    ) -> AppResult<Vec<dispute_reason::Model>> {
        let mut query = DisputeReason::find().filter(dispute_reason::Column::Activo.eq(true));

        if let Some(categoria) = categoria {
            query = query.filter(dispute_reason::Column::Categoria.eq(categoria));
        }

        query
            .order_by_asc(dispute_reason::Column::Orden)
            .order_by_asc(dispute_reason::Column::Clave)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
