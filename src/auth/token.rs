use actix_web::cookie::{time, Cookie, SameSite};
use jwt_simple::prelude::*;

use crate::app::AppError;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_TTL_DAYS: u64 = 7;

/// Claims carried inside the signed session token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

/// Signs and verifies session tokens. There is no revocation list:
/// a token stays valid until its natural expiry.
pub struct Authenticator {
    key: HS256Key,
}

impl Authenticator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: HS256Key::from_bytes(secret),
        }
    }

    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let secret = std::env::var("SESSION_SECRET")
            .expect("Environment variable 'SESSION_SECRET' not set");
        Self::new(secret.as_bytes())
    }

    /// Issues a signed token with a 7 day expiry.
    pub fn issue(&self, user_id: &str, email: &str, role: &str) -> Result<String, AppError> {
        let claims = Claims::with_custom_claims(
            SessionClaims {
                user_id: user_id.to_string(),
                email: email.to_string(),
                role: role.to_string(),
            },
            Duration::from_days(SESSION_TTL_DAYS),
        );
        self.key.authenticate(claims).map_err(|err| {
            log::error!("failed to sign session token: {}", err);
            AppError::InternalServerError
        })
    }

    /// Verifies signature and expiry. Any failure yields None, which callers
    /// must treat as "unauthenticated", never as a hard error.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        self.key
            .verify_token::<SessionClaims>(token, None)
            .ok()
            .map(|claims| claims.custom)
    }
}

/// Builds the HTTP-only session cookie carrying the token.
pub fn session_cookie<'a>(token: String) -> Cookie<'a> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS as i64))
        .finish()
}

/// Builds the removal cookie used on logout.
pub fn removal_cookie<'a>() -> Cookie<'a> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn authenticator() -> Authenticator {
        Authenticator::new(b"test-secret-0123456789abcdef")
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let auth = authenticator();
        let token = auth
            .issue("user-1", "reader@example.com", "admin")
            .unwrap();
        let claims = auth.verify(&token).unwrap();

        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.email, "reader@example.com");
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = authenticator();
        let mut token = auth
            .issue("user-1", "reader@example.com", "user")
            .unwrap();
        token.push('x');
        assert!(auth.verify(&token).is_none());
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let token = authenticator()
            .issue("user-1", "reader@example.com", "user")
            .unwrap();
        let other = Authenticator::new(b"another-secret-entirely-here");
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(authenticator().verify("not-a-token").is_none());
    }

    #[test]
    fn session_cookie_is_http_only_lax() {
        let cookie = session_cookie("abc".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
