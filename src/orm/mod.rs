//! SeaORM entities, one module per table.

pub mod communities;
pub mod community_members;
pub mod discussion_comments;
pub mod discussions;
pub mod event_photos;
pub mod event_registrations;
pub mod events;
pub mod mod_log;
pub mod organizer_payouts;
pub mod password_reset_tokens;
pub mod profiles;
pub mod transactions;
pub mod votes;
