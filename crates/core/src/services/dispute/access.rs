//! Who may do what on a dispute.

use mercado_common::{AppError, AppResult};
use mercado_db::entities::{
    dispute::{self, DisputeContext},
    dispute_message::AuthorRole,
    user,
};
use serde::Serialize;

use super::workflow::Party;

/// A user's standing on one dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Buyer,
    Influencer,
    Seller,
    Moderator,
    Admin,
    Unauthorized,
}

impl Capability {
    /// The side this capability speaks for, if it is a party.
    #[must_use]
    pub const fn party(self) -> Option<Party> {
        match self {
            Self::Buyer | Self::Influencer => Some(Party::Buyer),
            Self::Seller => Some(Party::Seller),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Moderator | Self::Admin)
    }

    /// Role recorded on messages written with this capability.
    #[must_use]
    pub const fn author_role(self) -> Option<AuthorRole> {
        match self {
            Self::Buyer => Some(AuthorRole::Buyer),
            Self::Influencer => Some(AuthorRole::Influencer),
            Self::Seller => Some(AuthorRole::Seller),
            Self::Moderator | Self::Admin => Some(AuthorRole::Moderator),
            Self::Unauthorized => None,
        }
    }
}

/// Role of the buyer-side party for a dispute context.
#[must_use]
pub const fn buyer_capability(context: DisputeContext) -> Capability {
    match context {
        DisputeContext::Order => Capability::Buyer,
        DisputeContext::Campaign | DisputeContext::Application => Capability::Influencer,
    }
}

/// Resolve what `user` may do on `dispute`. Party roles win over staff roles.
#[must_use]
pub fn resolve_capability(user: &user::Model, dispute: &dispute::Model) -> Capability {
    if user.id == dispute.buyer_id {
        buyer_capability(dispute.context)
    } else if user.id == dispute.seller_id {
        Capability::Seller
    } else if user.is_admin {
        Capability::Admin
    } else if user.is_moderator {
        Capability::Moderator
    } else {
        Capability::Unauthorized
    }
}

/// Fail unless the capability may see the dispute at all.
pub fn ensure_can_view(capability: Capability) -> AppResult<()> {
    if capability == Capability::Unauthorized {
        return Err(AppError::Forbidden(
            "You are not part of this dispute".to_string(),
        ));
    }
    Ok(())
}

/// Fail unless the capability belongs to a party and return that party.
pub fn ensure_party(capability: Capability) -> AppResult<Party> {
    capability.party().ok_or_else(|| {
        AppError::Forbidden("Only the parties of the dispute may do this".to_string())
    })
}

/// Fail unless `user_id` may moderate the dispute.
///
/// Admins always may. Moderators may while the dispute is unassigned or
/// assigned to them.
pub fn ensure_can_moderate(
    capability: Capability,
    user_id: &str,
    dispute: &dispute::Model,
) -> AppResult<()> {
    match capability {
        Capability::Admin => Ok(()),
        Capability::Moderator => match dispute.moderator_assigned_to.as_deref() {
            Some(assigned) if assigned != user_id => Err(AppError::Forbidden(
                "Dispute is assigned to another moderator".to_string(),
            )),
            _ => Ok(()),
        },
        _ => Err(AppError::Forbidden(
            "Only moderators may do this".to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercado_db::test_utils::fixtures;

    fn moderator(id: &str) -> user::Model {
        let mut u = fixtures::user(id, id);
        u.is_moderator = true;
        u
    }

    fn admin(id: &str) -> user::Model {
        let mut u = fixtures::user(id, id);
        u.is_admin = true;
        u
    }

    #[test]
    fn test_party_roles_by_context() {
        let mut d = fixtures::dispute("d1", "buyer", "seller");
        let buyer = fixtures::user("buyer", "b");
        let seller = fixtures::user("seller", "s");

        assert_eq!(resolve_capability(&buyer, &d), Capability::Buyer);
        assert_eq!(resolve_capability(&seller, &d), Capability::Seller);

        d.context = DisputeContext::Campaign;
        assert_eq!(resolve_capability(&buyer, &d), Capability::Influencer);
        assert_eq!(Capability::Influencer.party(), Some(Party::Buyer));
    }

    #[test]
    fn test_party_wins_over_staff_role() {
        let d = fixtures::dispute("d1", "buyer", "seller");
        let mut seller = admin("seller");
        seller.is_moderator = true;

        let capability = resolve_capability(&seller, &d);
        assert_eq!(capability, Capability::Seller);
        assert!(ensure_can_moderate(capability, "seller", &d).is_err());
    }

    #[test]
    fn test_outsider_is_unauthorized() {
        let d = fixtures::dispute("d1", "buyer", "seller");
        let outsider = fixtures::user("x", "x");

        let capability = resolve_capability(&outsider, &d);
        assert_eq!(capability, Capability::Unauthorized);
        assert!(matches!(ensure_can_view(capability), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_assigned_moderator_blocks_others_but_not_admin() {
        let mut d = fixtures::dispute("d1", "buyer", "seller");
        d.moderator_assigned_to = Some("mod-a".to_string());

        let a = resolve_capability(&moderator("mod-a"), &d);
        let b = resolve_capability(&moderator("mod-b"), &d);
        let root = resolve_capability(&admin("root"), &d);

        assert!(ensure_can_moderate(a, "mod-a", &d).is_ok());
        assert!(matches!(
            ensure_can_moderate(b, "mod-b", &d),
            Err(AppError::Forbidden(_))
        ));
        assert!(ensure_can_moderate(root, "root", &d).is_ok());
    }

    #[test]
    fn test_unassigned_dispute_open_to_any_moderator() {
        let d = fixtures::dispute("d1", "buyer", "seller");
        let capability = resolve_capability(&moderator("mod-b"), &d);
        assert!(ensure_can_moderate(capability, "mod-b", &d).is_ok());
    }

    #[test]
    fn test_ensure_party() {
        assert_eq!(ensure_party(Capability::Seller).unwrap(), Party::Seller);
        assert!(ensure_party(Capability::Admin).is_err());
    }
}
