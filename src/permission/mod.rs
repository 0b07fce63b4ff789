//! Authorization policy.
//!
//! Every privileged operation builds an [`Actor`] from the freshly loaded
//! profile and asks [`authorize`] whether it may perform an [`Action`] on a
//! [`Resource`]. There are no other role checks in the crate.

use crate::error::ActionError;
use crate::orm::profiles::{self, Role};

/// The signed-in caller of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i32, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role >= Role::Admin
    }

    pub fn is_organizer(&self) -> bool {
        self.role >= Role::Organizer
    }
}

impl From<&profiles::Model> for Actor {
    fn from(profile: &profiles::Model) -> Self {
        Self::new(profile.id, profile.role)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    CreateEvent,
    EditEvent,
    CancelEvent,
    ModerateEvent,
    ViewRegistrations,
    ConfirmRegistration,
    UploadPhoto,
    ModeratePhoto,
    RequestPayout,
    ReviewPayout,
    CreateDiscussion,
    Comment,
    Vote,
    MarkBestAnswer,
    CreateCommunity,
    ManageRoles,
    ViewOrganizerDashboard,
    ViewAdminDashboard,
}

/// What an action is performed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// Site-wide actions with no owner.
    Site,
    /// A row owned by the given profile (event organizer, discussion author).
    OwnedBy(i32),
}

impl Resource {
    fn is_owned_by(&self, actor: &Actor) -> bool {
        matches!(self, Resource::OwnedBy(owner) if *owner == actor.id)
    }
}

/// Who may perform an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rule {
    AnyUser,
    MinRole(Role),
    OwnerOrMinRole(Role),
    OwnerOnly,
}

fn rule_for(action: Action) -> Rule {
    use Action::*;
    match action {
        CreateDiscussion | Comment | Vote | UploadPhoto => Rule::AnyUser,
        CreateEvent | CreateCommunity | RequestPayout | ViewOrganizerDashboard => {
            Rule::MinRole(Role::Organizer)
        }
        EditEvent | CancelEvent | ViewRegistrations | ConfirmRegistration | ModeratePhoto => {
            Rule::OwnerOrMinRole(Role::Admin)
        }
        ReviewPayout | ViewAdminDashboard => Rule::MinRole(Role::Admin),
        ModerateEvent | ManageRoles => Rule::MinRole(Role::SuperAdmin),
        MarkBestAnswer => Rule::OwnerOnly,
    }
}

fn denial_message(rule: Rule) -> String {
    match rule {
        Rule::AnyUser => "You are not allowed to do that.".to_string(),
        Rule::MinRole(Role::Organizer) => "Only organizers can do that.".to_string(),
        Rule::MinRole(Role::SuperAdmin) => "Only super admins can do that.".to_string(),
        Rule::MinRole(_) => "Only admins can do that.".to_string(),
        Rule::OwnerOrMinRole(_) => "Only the owner or an admin can do that.".to_string(),
        Rule::OwnerOnly => "Only the author can do that.".to_string(),
    }
}

/// Returns true when `actor` may perform `action` on `resource`.
pub fn can(actor: &Actor, action: Action, resource: &Resource) -> bool {
    match rule_for(action) {
        Rule::AnyUser => true,
        Rule::MinRole(role) => actor.role >= role,
        Rule::OwnerOrMinRole(role) => resource.is_owned_by(actor) || actor.role >= role,
        Rule::OwnerOnly => resource.is_owned_by(actor),
    }
}

/// Same as [`can`], but yields the error to hand back to the caller.
pub fn authorize(actor: &Actor, action: Action, resource: &Resource) -> Result<(), ActionError> {
    if can(actor, action, resource) {
        Ok(())
    } else {
        log::debug!(
            "Denied {:?} on {:?} for user {} ({})",
            action,
            resource,
            actor.id,
            actor.role
        );
        Err(ActionError::Unauthorized(denial_message(rule_for(action))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i32 = 7;

    fn actor(role: Role) -> Actor {
        Actor::new(1, role)
    }

    fn owner(role: Role) -> Actor {
        Actor::new(OWNER, role)
    }

    #[test]
    fn test_roles_are_ordered() {
        assert!(Role::User < Role::Organizer);
        assert!(Role::Organizer < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
    }

    #[test]
    fn test_event_moderation_needs_super_admin() {
        let event = Resource::OwnedBy(OWNER);
        assert!(!can(&actor(Role::Admin), Action::ModerateEvent, &event));
        assert!(!can(&owner(Role::Organizer), Action::ModerateEvent, &event));
        assert!(can(&actor(Role::SuperAdmin), Action::ModerateEvent, &event));
    }

    #[test]
    fn test_payout_review_needs_admin() {
        let payout = Resource::OwnedBy(OWNER);
        assert!(!can(&owner(Role::Organizer), Action::ReviewPayout, &payout));
        assert!(can(&actor(Role::Admin), Action::ReviewPayout, &payout));
        assert!(can(&actor(Role::SuperAdmin), Action::ReviewPayout, &payout));
    }

    #[test]
    fn test_photo_moderation_by_event_owner_or_admin() {
        let event = Resource::OwnedBy(OWNER);
        assert!(can(&owner(Role::Organizer), Action::ModeratePhoto, &event));
        assert!(can(&actor(Role::Admin), Action::ModeratePhoto, &event));
        assert!(!can(&actor(Role::Organizer), Action::ModeratePhoto, &event));
        assert!(!can(&actor(Role::User), Action::ModeratePhoto, &event));
    }

    #[test]
    fn test_best_answer_is_author_only() {
        let discussion = Resource::OwnedBy(OWNER);
        assert!(can(&owner(Role::User), Action::MarkBestAnswer, &discussion));
        assert!(!can(&actor(Role::SuperAdmin), Action::MarkBestAnswer, &discussion));
    }

    #[test]
    fn test_organizer_actions() {
        assert!(!can(&actor(Role::User), Action::CreateEvent, &Resource::Site));
        assert!(can(&actor(Role::Organizer), Action::CreateEvent, &Resource::Site));
        assert!(can(&actor(Role::Admin), Action::RequestPayout, &Resource::Site));
    }

    #[test]
    fn test_any_user_actions() {
        for action in [Action::Vote, Action::Comment, Action::CreateDiscussion] {
            assert!(can(&actor(Role::User), action, &Resource::Site));
        }
    }

    #[test]
    fn test_denial_is_unauthorized_error() {
        let err = authorize(&actor(Role::User), Action::ReviewPayout, &Resource::Site)
            .expect_err("users cannot review payouts");
        assert!(matches!(err, ActionError::Unauthorized(ref msg) if msg == "Only admins can do that."));
    }
}
