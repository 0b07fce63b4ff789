//! Password hashing and the signed-in user's session cookie.
//!
//! The cookie only carries the profile id. The profile, including its role,
//! is loaded from the database on every request by `ClientCtx`.

use crate::orm::profiles;
use actix_session::Session;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sea_orm::{DatabaseConnection, EntityTrait};

const SESSION_USER_KEY: &str = "user_id";

pub fn get_argon2() -> Argon2<'static> {
    Argon2::default()
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    Ok(get_argon2()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

/// False for a wrong password and for a hash that does not parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Binds the session cookie to `user_id`. The session id is renewed to
/// prevent fixation.
pub fn start_session(session: &Session, user_id: i32) -> Result<(), actix_web::Error> {
    session.renew();
    session
        .insert(SESSION_USER_KEY, user_id)
        .map_err(|_| actix_web::error::ErrorInternalServerError("middleware error"))
}

pub fn end_session(session: &Session) {
    session.purge();
}

pub fn get_session_user_id(session: &Session) -> Option<i32> {
    match session.get::<i32>(SESSION_USER_KEY) {
        Ok(id) => id,
        Err(e) => {
            log::debug!("Unreadable session user id: {}", e);
            None
        }
    }
}

/// Loads the profile bound to this session, if any.
pub async fn authenticate_client_by_session(
    db: &DatabaseConnection,
    session: &Session,
) -> Option<profiles::Model> {
    let user_id = get_session_user_id(session)?;

    match profiles::Entity::find_by_id(user_id).one(db).await {
        Ok(Some(profile)) => Some(profile),
        Ok(None) => {
            log::debug!("Session refers to missing profile {}", user_id);
            session.remove(SESSION_USER_KEY);
            None
        }
        Err(e) => {
            log::error!("authenticate_client_by_session: {}", e);
            None
        }
    }
}
