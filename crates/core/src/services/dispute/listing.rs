//! Dispute listings and the reason catalogue.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use mercado_common::{AppError, AppResult};
use mercado_db::{
    entities::{
        dispute::{self, DisputeContext, DisputeStatus},
        user,
    },
    repositories::{DisputeSearch, ModeratorFilter, PartyDisputeFilter, PartySide},
};
use serde::Deserialize;

use super::{
    DisputeService, Pagination,
    reasons::fallback_reasons,
    view::{DisputeListItem, DisputePage, ReasonView, UserSummary},
};

/// Which side of their disputes a user wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListRole {
    #[serde(alias = "influencer")]
    Buyer,
    Seller,
}

/// Query for `GET /disputes`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartyDisputeQuery {
    pub estado: Option<DisputeStatus>,
    pub context: Option<DisputeContext>,
    pub rol: Option<ListRole>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Query for the staff dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDisputeQuery {
    pub context: Option<DisputeContext>,
    pub estado: Option<DisputeStatus>,
    /// Substring of the dispute, order, campaign or application id.
    pub q: Option<String>,
    pub buyer_email: Option<String>,
    pub seller_email: Option<String>,
    pub motivo_clave: Option<String>,
    /// A user id, or `unassigned`.
    pub moderator: Option<String>,
    /// Creation range, RFC 3339 or `YYYY-MM-DD`.
    pub desde: Option<String>,
    pub hasta: Option<String>,
    #[serde(default)]
    pub due_soon: bool,
    #[serde(default)]
    pub overdue: bool,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Parse a range bound. Bare dates cover the whole day.
fn parse_bound(raw: &str, end_of_day: bool) -> AppResult<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date: {raw}")))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        Some(NaiveTime::MIN)
    };
    time.map(|t| date.and_time(t).and_utc())
        .ok_or_else(|| AppError::Validation(format!("Invalid date: {raw}")))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl DisputeService {
    /// Reasons offered when opening a dispute, from the catalogue table or
    /// the built-in list when the table has none for the category.
    pub async fn reasons(&self, categoria: Option<&str>) -> AppResult<Vec<ReasonView>> {
        let categoria = non_blank(categoria);
        let rows = self.dispute_repo.find_reasons(categoria).await?;
        if rows.is_empty() {
            return Ok(fallback_reasons(categoria));
        }

        Ok(rows
            .into_iter()
            .map(|r| ReasonView {
                clave: r.clave,
                titulo: r.titulo,
                categoria: r.categoria,
            })
            .collect())
    }

    /// Disputes the user takes part in.
    pub async fn list_mine(
        &self,
        user: &user::Model,
        query: PartyDisputeQuery,
    ) -> AppResult<DisputePage> {
        let pagination = Pagination::new(query.page, query.limit);
        let filter = PartyDisputeFilter {
            status: query.estado,
            context: query.context,
            side: query.rol.map(|r| match r {
                ListRole::Buyer => PartySide::Buyer,
                ListRole::Seller => PartySide::Seller,
            }),
        };

        let (items, total) = self
            .dispute_repo
            .find_for_party(&user.id, &filter, pagination.limit, pagination.offset())
            .await?;

        Ok(DisputePage {
            items: self.enrich(items).await?,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    /// Staff dashboard search.
    pub async fn admin_list(
        &self,
        user: &user::Model,
        query: AdminDisputeQuery,
    ) -> AppResult<DisputePage> {
        if !user.is_staff() {
            return Err(AppError::Forbidden(
                "Only moderators may list all disputes".to_string(),
            ));
        }

        let pagination = Pagination::new(query.page, query.limit);
        let search = self.build_search(&query, Utc::now()).await?;
        let (items, total) = self
            .dispute_repo
            .search(&search, pagination.limit, pagination.offset())
            .await?;

        Ok(DisputePage {
            items: self.enrich(items).await?,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    async fn build_search(
        &self,
        query: &AdminDisputeQuery,
        now: DateTime<Utc>,
    ) -> AppResult<DisputeSearch> {
        if query.overdue && query.due_soon {
            return Err(AppError::Validation(
                "overdue and dueSoon cannot be combined".to_string(),
            ));
        }

        let mut search = DisputeSearch {
            context: query.context,
            status: query.estado,
            query: non_blank(query.q.as_deref()).map(ToString::to_string),
            reason_code: non_blank(query.motivo_clave.as_deref()).map(ToString::to_string),
            created_from: non_blank(query.desde.as_deref())
                .map(|d| parse_bound(d, false))
                .transpose()?,
            created_to: non_blank(query.hasta.as_deref())
                .map(|d| parse_bound(d, true))
                .transpose()?,
            ..Default::default()
        };

        search.moderator = non_blank(query.moderator.as_deref()).map(|m| {
            if m.eq_ignore_ascii_case("unassigned") {
                ModeratorFilter::Unassigned
            } else {
                ModeratorFilter::Assigned(m.to_string())
            }
        });

        if let Some(prefix) = non_blank(query.buyer_email.as_deref()) {
            search.buyer_ids = Some(self.user_repo.find_ids_by_email_prefix(prefix).await?);
        }
        if let Some(prefix) = non_blank(query.seller_email.as_deref()) {
            search.seller_ids = Some(self.user_repo.find_ids_by_email_prefix(prefix).await?);
        }

        // Both windows only make sense for disputes still running.
        if query.overdue {
            search.deadline_before = Some(now);
            search.active_only = true;
        } else if query.due_soon {
            search.deadline_after = Some(now);
            search.deadline_before = Some(now + Duration::hours(self.config.due_soon_hours));
            search.active_only = true;
        }

        Ok(search)
    }

    /// Attach participant display data with one user lookup for the batch.
    pub(super) async fn enrich(
        &self,
        disputes: Vec<dispute::Model>,
    ) -> AppResult<Vec<DisputeListItem>> {
        let mut ids: Vec<String> = disputes
            .iter()
            .flat_map(|d| {
                [Some(&d.buyer_id), Some(&d.seller_id), d.moderator_assigned_to.as_ref()]
                    .into_iter()
                    .flatten()
                    .cloned()
            })
            .collect();
        ids.sort();
        ids.dedup();

        let users: HashMap<String, UserSummary> = self
            .user_repo
            .find_by_ids(&ids)
            .await?
            .iter()
            .map(|u| (u.id.clone(), UserSummary::from(u)))
            .collect();

        Ok(disputes
            .iter()
            .map(|d| DisputeListItem {
                dispute: d.into(),
                buyer: users.get(&d.buyer_id).cloned(),
                seller: users.get(&d.seller_id).cloned(),
                moderator: d
                    .moderator_assigned_to
                    .as_ref()
                    .and_then(|m| users.get(m))
                    .cloned(),
            })
            .collect())
    }
}
