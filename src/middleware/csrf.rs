//! CSRF protection for form posts.
//!
//! One token per session, stored in the session cookie. Every form carries
//! it in a hidden `csrf_token` field and every POST handler checks it with
//! [`validate_csrf_token`] before touching anything.

use crate::error::ActionError;
use actix_session::Session;
use rand::{distributions::Alphanumeric, Rng};

pub const CSRF_TOKEN_LENGTH: usize = 32;
const CSRF_SESSION_KEY: &str = "csrf_token";

pub fn generate_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Called by `ClientCtx` on every request so templates always have a token.
pub fn get_or_create_csrf_token(session: &Session) -> Result<String, actix_web::Error> {
    match session.get::<String>(CSRF_SESSION_KEY) {
        Ok(Some(token)) => Ok(token),
        _ => {
            let token = generate_csrf_token();
            session.insert(CSRF_SESSION_KEY, token.clone()).map_err(|_| {
                actix_web::error::ErrorInternalServerError("Failed to store CSRF token")
            })?;
            Ok(token)
        }
    }
}

pub fn validate_csrf_token(session: &Session, provided_token: &str) -> Result<(), ActionError> {
    let expected_token = match session.get::<String>(CSRF_SESSION_KEY) {
        Ok(Some(token)) => token,
        _ => {
            log::warn!("CSRF token missing from session");
            return Err(ActionError::unauthorized(
                "Your session expired. Reload the page and try again.",
            ));
        }
    };

    if !tokens_match(provided_token, &expected_token) {
        log::warn!("CSRF token validation failed");
        return Err(ActionError::unauthorized(
            "Your session expired. Reload the page and try again.",
        ));
    }

    Ok(())
}

fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len()
        && provided
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_alphanumeric() {
        let token = generate_csrf_token();
        assert_eq!(token.len(), CSRF_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_csrf_token());
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("ab", "abc"));
        assert!(!tokens_match("", "abc"));
    }
}
