//! Dispute state machine.
//!
//! Pure functions from the current row to the next values of the mutable
//! workflow columns. Nothing here touches the database or the clock; callers
//! pass `now` and persist the returned [`DisputeChange`].

use chrono::{DateTime, Duration, Utc};
use mercado_common::{AppError, AppResult};
use mercado_db::entities::dispute::{self, DisputeStatus, ProposalStatus};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Closure type recorded when both parties accept a proposal without one.
pub const DEFAULT_CLOSURE_TYPE: &str = "proposal_accepted";

/// One side of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// Buyer, or influencer for campaign and application disputes.
    #[serde(alias = "influencer")]
    Buyer,
    Seller,
}

/// A party's answer to a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    const fn as_status(self) -> ProposalStatus {
        match self {
            Self::Accept => ProposalStatus::Accepted,
            Self::Reject => ProposalStatus::Rejected,
        }
    }
}

/// Next values of the workflow columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeChange {
    pub status: DisputeStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub proposal_buyer_status: Option<ProposalStatus>,
    pub proposal_seller_status: Option<ProposalStatus>,
    pub closure_type: Option<String>,
}

impl DisputeChange {
    fn from_current(dispute: &dispute::Model) -> Self {
        Self {
            status: dispute.status,
            deadline: dispute.current_deadline.map(|d| d.with_timezone(&Utc)),
            proposal_buyer_status: dispute.proposal_buyer_status,
            proposal_seller_status: dispute.proposal_seller_status,
            closure_type: dispute.closure_type.clone(),
        }
    }

    /// Columns to write, stamped with `now` as `updated_at`.
    #[must_use]
    pub fn into_active_model(self, now: DateTime<Utc>) -> dispute::ActiveModel {
        dispute::ActiveModel {
            status: Set(self.status),
            current_deadline: Set(self.deadline.map(Into::into)),
            proposal_buyer_status: Set(self.proposal_buyer_status),
            proposal_seller_status: Set(self.proposal_seller_status),
            closure_type: Set(self.closure_type),
            updated_at: Set(now.into()),
            ..Default::default()
        }
    }
}

/// Deadline for the next pending action.
#[must_use]
pub fn deadline_from(now: DateTime<Utc>, sla_hours: i32) -> DateTime<Utc> {
    now + Duration::hours(i64::from(sla_hours))
}

/// Fail with `InvalidState` when the dispute is closed.
pub fn ensure_active(dispute: &dispute::Model) -> AppResult<()> {
    if dispute.status.is_terminal() {
        return Err(AppError::InvalidState(format!(
            "Dispute is {} and can no longer change",
            dispute.status.as_str()
        )));
    }
    Ok(())
}

/// A moderator asks one party for more information.
pub fn request_info(
    dispute: &dispute::Model,
    target: Party,
    now: DateTime<Utc>,
) -> AppResult<DisputeChange> {
    ensure_active(dispute)?;

    let mut change = DisputeChange::from_current(dispute);
    change.status = match target {
        Party::Buyer => DisputeStatus::AwaitingPartyA,
        Party::Seller => DisputeStatus::AwaitingPartyB,
    };
    change.deadline = Some(deadline_from(now, dispute.sla_hours));
    Ok(change)
}

/// A moderator proposes a resolution; both parties must answer again.
pub fn propose(
    dispute: &dispute::Model,
    closure_type: Option<String>,
    now: DateTime<Utc>,
) -> AppResult<DisputeChange> {
    ensure_active(dispute)?;

    let mut change = DisputeChange::from_current(dispute);
    change.status = DisputeStatus::Proposal;
    change.proposal_buyer_status = Some(ProposalStatus::Pending);
    change.proposal_seller_status = Some(ProposalStatus::Pending);
    if closure_type.is_some() {
        change.closure_type = closure_type;
    }
    change.deadline = Some(deadline_from(now, dispute.sla_hours));
    Ok(change)
}

/// Record one party's decision on the open proposal.
///
/// Returns `None` when the party already gave the same answer.
pub fn decide(
    dispute: &dispute::Model,
    party: Party,
    decision: Decision,
    now: DateTime<Utc>,
) -> AppResult<Option<DisputeChange>> {
    ensure_active(dispute)?;
    if dispute.status != DisputeStatus::Proposal {
        return Err(AppError::InvalidState(
            "There is no open proposal to decide on".to_string(),
        ));
    }

    let answer = decision.as_status();
    let current = match party {
        Party::Buyer => dispute.proposal_buyer_status,
        Party::Seller => dispute.proposal_seller_status,
    };
    if current == Some(answer) {
        return Ok(None);
    }

    let mut change = DisputeChange::from_current(dispute);
    match party {
        Party::Buyer => change.proposal_buyer_status = Some(answer),
        Party::Seller => change.proposal_seller_status = Some(answer),
    }

    match decision {
        Decision::Reject => {
            change.status = DisputeStatus::InReview;
            change.deadline = Some(deadline_from(now, dispute.sla_hours));
        }
        Decision::Accept => {
            let both_accepted = change.proposal_buyer_status == Some(ProposalStatus::Accepted)
                && change.proposal_seller_status == Some(ProposalStatus::Accepted);
            if both_accepted {
                change.status = DisputeStatus::Resolved;
                change.deadline = None;
                if change.closure_type.is_none() {
                    change.closure_type = Some(DEFAULT_CLOSURE_TYPE.to_string());
                }
            }
        }
    }

    Ok(Some(change))
}

/// A party asks for a moderator. Only possible while the dispute is `open`.
pub fn request_mediation(dispute: &dispute::Model, now: DateTime<Utc>) -> AppResult<DisputeChange> {
    if dispute.status != DisputeStatus::Open {
        return Err(AppError::InvalidState(format!(
            "Mediation can only be requested on an open dispute, not {}",
            dispute.status.as_str()
        )));
    }

    let mut change = DisputeChange::from_current(dispute);
    change.status = DisputeStatus::InReview;
    change.deadline = Some(deadline_from(now, dispute.sla_hours));
    Ok(change)
}

/// Staff moves the dispute to an arbitrary state.
#[must_use]
pub fn override_status(
    dispute: &dispute::Model,
    status: DisputeStatus,
    closure_type: Option<String>,
    now: DateTime<Utc>,
) -> DisputeChange {
    let mut change = DisputeChange::from_current(dispute);
    change.status = status;
    change.deadline = if status.is_terminal() {
        None
    } else {
        Some(deadline_from(now, dispute.sla_hours))
    };
    if status == DisputeStatus::Proposal {
        change.proposal_buyer_status = Some(ProposalStatus::Pending);
        change.proposal_seller_status = Some(ProposalStatus::Pending);
    }
    if closure_type.is_some() {
        change.closure_type = closure_type;
    }
    change
}

/// A new message restarts the clock.
pub fn record_message(dispute: &dispute::Model, now: DateTime<Utc>) -> AppResult<DisputeChange> {
    ensure_active(dispute)?;

    let mut change = DisputeChange::from_current(dispute);
    change.deadline = Some(deadline_from(now, dispute.sla_hours));
    Ok(change)
}

/// Close an active dispute whose deadline is before `cutoff`.
#[must_use]
pub fn expire(dispute: &dispute::Model, cutoff: DateTime<Utc>) -> Option<DisputeChange> {
    if dispute.status.is_terminal() {
        return None;
    }
    let deadline = dispute.current_deadline?.with_timezone(&Utc);
    if deadline >= cutoff {
        return None;
    }

    let mut change = DisputeChange::from_current(dispute);
    change.status = DisputeStatus::ClosedExpired;
    change.deadline = None;
    Some(change)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercado_db::test_utils::fixtures;
    use sea_orm::Iterable;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn in_proposal() -> dispute::Model {
        let mut d = fixtures::dispute("d1", "buyer", "seller");
        d.status = DisputeStatus::Proposal;
        d.proposal_buyer_status = Some(ProposalStatus::Pending);
        d.proposal_seller_status = Some(ProposalStatus::Pending);
        d
    }

    fn apply(d: &mut dispute::Model, change: DisputeChange) {
        d.status = change.status;
        d.current_deadline = change.deadline.map(Into::into);
        d.proposal_buyer_status = change.proposal_buyer_status;
        d.proposal_seller_status = change.proposal_seller_status;
        d.closure_type = change.closure_type;
    }

    #[test]
    fn test_request_info_targets_party() {
        let d = fixtures::dispute("d1", "buyer", "seller");
        let t = now();

        let a = request_info(&d, Party::Buyer, t).unwrap();
        assert_eq!(a.status, DisputeStatus::AwaitingPartyA);
        assert_eq!(a.deadline, Some(t + Duration::hours(72)));

        let b = request_info(&d, Party::Seller, t).unwrap();
        assert_eq!(b.status, DisputeStatus::AwaitingPartyB);
    }

    #[test]
    fn test_actions_rejected_on_terminal_states() {
        for status in DisputeStatus::TERMINAL {
            let mut d = fixtures::dispute("d1", "buyer", "seller");
            d.status = status;

            assert!(matches!(
                request_info(&d, Party::Buyer, now()),
                Err(AppError::InvalidState(_))
            ));
            assert!(propose(&d, None, now()).is_err());
            assert!(record_message(&d, now()).is_err());
            assert!(request_mediation(&d, now()).is_err());
        }
    }

    #[test]
    fn test_propose_resets_statuses() {
        let mut d = fixtures::dispute("d1", "buyer", "seller");
        d.status = DisputeStatus::InReview;
        d.proposal_buyer_status = Some(ProposalStatus::Rejected);

        let change = propose(&d, Some("refund".to_string()), now()).unwrap();
        assert_eq!(change.status, DisputeStatus::Proposal);
        assert_eq!(change.proposal_buyer_status, Some(ProposalStatus::Pending));
        assert_eq!(change.proposal_seller_status, Some(ProposalStatus::Pending));
        assert_eq!(change.closure_type.as_deref(), Some("refund"));
    }

    #[test]
    fn test_both_accept_resolves() {
        let mut d = in_proposal();

        let seller = decide(&d, Party::Seller, Decision::Accept, now()).unwrap().unwrap();
        assert_eq!(seller.status, DisputeStatus::Proposal);
        apply(&mut d, seller);

        let buyer = decide(&d, Party::Buyer, Decision::Accept, now()).unwrap().unwrap();
        assert_eq!(buyer.status, DisputeStatus::Resolved);
        assert_eq!(buyer.deadline, None);
        assert_eq!(buyer.closure_type.as_deref(), Some(DEFAULT_CLOSURE_TYPE));
    }

    #[test]
    fn test_accept_keeps_existing_closure_type() {
        let mut d = in_proposal();
        d.closure_type = Some("partial_refund".to_string());
        d.proposal_seller_status = Some(ProposalStatus::Accepted);

        let change = decide(&d, Party::Buyer, Decision::Accept, now()).unwrap().unwrap();
        assert_eq!(change.closure_type.as_deref(), Some("partial_refund"));
    }

    #[test]
    fn test_reject_returns_to_review() {
        let d = in_proposal();
        let t = now();

        let change = decide(&d, Party::Buyer, Decision::Reject, t).unwrap().unwrap();
        assert_eq!(change.status, DisputeStatus::InReview);
        assert_eq!(change.deadline, Some(t + Duration::hours(i64::from(d.sla_hours))));
        assert_eq!(change.proposal_buyer_status, Some(ProposalStatus::Rejected));
    }

    #[test]
    fn test_repeated_decision_is_noop() {
        let mut d = in_proposal();
        d.proposal_seller_status = Some(ProposalStatus::Accepted);

        assert!(decide(&d, Party::Seller, Decision::Accept, now()).unwrap().is_none());
    }

    #[test]
    fn test_decide_outside_proposal() {
        let d = fixtures::dispute("d1", "buyer", "seller");
        assert!(matches!(
            decide(&d, Party::Buyer, Decision::Accept, now()),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_mediation_only_from_open() {
        let mut d = fixtures::dispute("d1", "buyer", "seller");

        let change = request_mediation(&d, now()).unwrap();
        assert_eq!(change.status, DisputeStatus::InReview);
        apply(&mut d, change);

        assert!(matches!(
            request_mediation(&d, now()),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_override_terminal_clears_deadline() {
        let d = fixtures::dispute("d1", "buyer", "seller");

        for status in DisputeStatus::iter() {
            let change = override_status(&d, status, None, now());
            assert_eq!(change.status, status);
            assert_eq!(change.deadline.is_none(), status.is_terminal(), "{status:?}");
        }
    }

    #[test]
    fn test_override_into_proposal_resets_statuses() {
        let mut d = fixtures::dispute("d1", "buyer", "seller");
        d.status = DisputeStatus::Resolved;
        d.current_deadline = None;
        d.proposal_buyer_status = Some(ProposalStatus::Accepted);
        d.proposal_seller_status = Some(ProposalStatus::Accepted);

        let change = override_status(&d, DisputeStatus::Proposal, None, now());
        assert_eq!(change.proposal_buyer_status, Some(ProposalStatus::Pending));
        assert_eq!(change.proposal_seller_status, Some(ProposalStatus::Pending));
        assert!(change.deadline.is_some());
    }

    #[test]
    fn test_expire_only_overdue_active() {
        let t = now();
        let mut d = fixtures::dispute("d1", "buyer", "seller");

        d.current_deadline = Some((t + Duration::hours(1)).into());
        assert!(expire(&d, t).is_none());

        d.current_deadline = Some((t - Duration::hours(1)).into());
        let change = expire(&d, t).unwrap();
        assert_eq!(change.status, DisputeStatus::ClosedExpired);
        assert_eq!(change.deadline, None);

        d.status = DisputeStatus::Resolved;
        assert!(expire(&d, t).is_none());
    }

    #[test]
    fn test_full_scenario_ends_resolved_without_deadline() {
        let mut d = fixtures::dispute("d1", "buyer", "seller");

        let change = request_mediation(&d, now()).unwrap();
        apply(&mut d, change);
        let change = propose(&d, None, now()).unwrap();
        apply(&mut d, change);
        let change = decide(&d, Party::Buyer, Decision::Accept, now()).unwrap().unwrap();
        apply(&mut d, change);
        let change = decide(&d, Party::Seller, Decision::Accept, now()).unwrap().unwrap();
        apply(&mut d, change);

        assert_eq!(d.status, DisputeStatus::Resolved);
        assert!(d.current_deadline.is_none());
    }

    #[test]
    fn test_party_accepts_influencer_alias() {
        let party: Party = serde_json::from_str("\"influencer\"").unwrap();
        assert_eq!(party, Party::Buyer);
    }
}
