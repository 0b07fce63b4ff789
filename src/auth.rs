//! Accounts: sign-up, sign-in and password reset.
//!
//! Sessions themselves live in [`crate::session`]; this module only decides
//! who the caller is.

use crate::error::{ActionError, ActionResult};
use crate::orm::password_reset_tokens;
use crate::orm::profiles::{self, Role};
use crate::session::{hash_password, verify_password};
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};

pub const RESET_TOKEN_LENGTH: usize = 64;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_password(password: &str) -> ActionResult<()> {
    let len = password.chars().count();
    if !(8..=128).contains(&len) {
        return Err(ActionError::validation(
            "Password must be between 8 and 128 characters.",
        ));
    }
    Ok(())
}

fn hash_or_fail(password: &str) -> ActionResult<String> {
    hash_password(password).map_err(|e| {
        log::error!("Password hashing failed: {}", e);
        ActionError::Backend(DbErr::Custom("password hashing failed".to_string()))
    })
}

pub fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Only this digest is stored; the token itself goes out by mail.
pub fn hash_reset_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> ActionResult<Option<profiles::Model>> {
    Ok(profiles::Entity::find()
        .filter(profiles::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await?)
}

pub async fn sign_up(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    display_name: &str,
) -> ActionResult<profiles::Model> {
    let email = normalize_email(email);
    if !validator::validate_email(email.as_str()) {
        return Err(ActionError::validation("Please enter a valid email address."));
    }
    check_password(password)?;
    let display_name = display_name.trim();
    let name_len = display_name.chars().count();
    if !(1..=80).contains(&name_len) {
        return Err(ActionError::validation(
            "Display name must be between 1 and 80 characters.",
        ));
    }

    if find_by_email(db, &email).await?.is_some() {
        return Err(ActionError::conflict(
            "An account with that email already exists.",
        ));
    }

    let now = Utc::now().naive_utc();
    let profile = profiles::ActiveModel {
        email: Set(email),
        password_hash: Set(hash_or_fail(password)?),
        display_name: Set(display_name.to_string()),
        role: Set(Role::User),
        city: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("New account {}", profile.id);
    Ok(profile)
}

/// Unknown emails and wrong passwords fail the same way.
pub async fn sign_in(db: &DatabaseConnection, email: &str, password: &str) -> ActionResult<profiles::Model> {
    let profile = match find_by_email(db, email).await? {
        Some(profile) => profile,
        None => {
            log::debug!("sign_in: unknown email");
            return Err(ActionError::InvalidCredentials);
        }
    };

    if !verify_password(password, &profile.password_hash) {
        log::debug!("sign_in: bad password for {}", profile.id);
        return Err(ActionError::InvalidCredentials);
    }

    log::info!("User {} signed in", profile.id);
    Ok(profile)
}

/// Issues a reset token for the account behind `email`, if there is one.
/// Earlier unused tokens for the account stop working.
pub async fn request_password_reset(
    db: &DatabaseConnection,
    email: &str,
) -> ActionResult<Option<(profiles::Model, String)>> {
    let profile = match find_by_email(db, email).await? {
        Some(profile) => profile,
        None => {
            log::debug!("Password reset requested for unknown email");
            return Ok(None);
        }
    };

    let token = generate_reset_token();
    let now = Utc::now().naive_utc();

    let txn = db.begin().await?;

    password_reset_tokens::Entity::delete_many()
        .filter(password_reset_tokens::Column::ProfileId.eq(profile.id))
        .filter(password_reset_tokens::Column::UsedAt.is_null())
        .exec(&txn)
        .await?;

    password_reset_tokens::ActiveModel {
        profile_id: Set(profile.id),
        token_hash: Set(hash_reset_token(&token)),
        expires_at: Set(now + Duration::hours(RESET_TOKEN_TTL_HOURS)),
        used_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    log::info!("Password reset token issued for user {}", profile.id);
    Ok(Some((profile, token)))
}

pub async fn reset_password(
    db: &DatabaseConnection,
    token: &str,
    new_password: &str,
) -> ActionResult<profiles::Model> {
    check_password(new_password)?;

    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;

    let reset = password_reset_tokens::Entity::find()
        .filter(password_reset_tokens::Column::TokenHash.eq(hash_reset_token(token.trim())))
        .filter(password_reset_tokens::Column::UsedAt.is_null())
        .filter(password_reset_tokens::Column::ExpiresAt.gt(now))
        .one(&txn)
        .await?
        .ok_or_else(|| {
            ActionError::validation("This reset link is invalid or has expired.")
        })?;

    let profile = profiles::Entity::find_by_id(reset.profile_id)
        .one(&txn)
        .await?
        .ok_or(ActionError::NotFound("User"))?;

    let mut active: profiles::ActiveModel = profile.into();
    active.password_hash = Set(hash_or_fail(new_password)?);
    active.updated_at = Set(now);
    let profile = active.update(&txn).await?;

    let mut reset: password_reset_tokens::ActiveModel = reset.into();
    reset.used_at = Set(Some(now));
    reset.update(&txn).await?;

    txn.commit().await?;

    log::info!("User {} reset their password", profile.id);
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_tokens() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        let digest = hash_reset_token(&token);
        assert_eq!(digest.len(), 64);
        assert_ne!(digest, token);
        assert_eq!(digest, hash_reset_token(&token));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Asha@Example.COM "), "asha@example.com");
    }
}
