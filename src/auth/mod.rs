pub mod permissions;
pub mod token;

use actix_web::HttpRequest;

use crate::app::{AppError, AppState};
use crate::database::models::user::User;
use permissions::Role;
use token::SESSION_COOKIE;

/// Resolves the current user from the session cookie.
///
/// Returns None on any failure — missing cookie, bad signature, expired
/// token, or a user deleted since the token was issued. Callers must treat
/// None as "unauthenticated", not as an error.
pub fn get_auth_user(req: &HttpRequest, app_state: &AppState) -> Option<User> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    let claims = app_state.auth.verify(cookie.value())?;
    let conn = app_state.psql_pool.get().ok()?;
    User::find_by_id(&conn, &claims.user_id).ok()
}

/// Requires a logged-in user, 401 otherwise.
pub fn require_user(req: &HttpRequest, app_state: &AppState) -> Result<User, AppError> {
    get_auth_user(req, app_state).ok_or(AppError::Unauthorized)
}

/// Requires a logged-in user passing the given role predicate.
/// Missing session is a 401; wrong role on a valid session is a 403.
pub fn require_role(
    req: &HttpRequest,
    app_state: &AppState,
    check: fn(Role) -> bool,
) -> Result<User, AppError> {
    let user = require_user(req, app_state)?;
    if !check(user.role()) {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}
