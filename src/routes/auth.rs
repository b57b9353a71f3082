use actix_web::{get, post, put, web::Data, HttpRequest, HttpResponse};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::app::{AppError, AppState};
use crate::auth::permissions::Role;
use crate::auth::token::{removal_cookie, session_cookie};
use crate::auth::require_user;
use crate::database::models::user::User;
use crate::routes::{decode_base64, encode_bytes};

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct ProfileRequest {
    username: Option<String>,
    dark_mode: Option<bool>,
    /// Base64 encoded image bytes.
    profile_image: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub dark_mode: bool,
    pub created_by: Option<String>,
    pub profile_image: Option<String>,
    pub created_at: NaiveDateTime,
}

pub fn user_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id.clone(),
        email: user.email.clone(),
        username: user.username.clone(),
        role: user.role.clone(),
        dark_mode: user.dark_mode,
        created_by: user.created_by.clone(),
        profile_image: user.profile_image.as_deref().map(encode_bytes),
        created_at: user.created_at,
    }
}

/// Registers a regular user and logs them straight in.
/// - url: `{domain}/api/auth/register`
///
/// # Response
/// ## Ok
/// - the created user, with the session cookie set
/// ## Error
/// - Bad request (validation)
/// - Conflict (email already registered)
#[post("/api/auth/register")]
pub async fn register(
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let body: RegisterRequest = serde_json::from_str(&req_body)?;
    let conn = app_state.conn()?;

    let user = User::new(
        &conn,
        &body.email,
        &body.username,
        &body.password,
        Role::User,
        None,
    )?;

    let token = app_state.auth.issue(&user.id, &user.email, &user.role)?;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token))
        .json(user_response(&user)))
}

/// Verifies credentials and issues the signed session cookie (7 day expiry).
/// - url: `{domain}/api/auth/login`
///
/// # Response
/// ## Ok
/// - the logged-in user, with the session cookie set
/// ## Error
/// - Bad request
/// - Unauthorized (unknown email or wrong password, indistinguishable)
#[post("/api/auth/login")]
pub async fn login(
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let body: LoginRequest = serde_json::from_str(&req_body)?;
    let conn = app_state.conn()?;

    let user = User::find_by_email(&conn, &body.email).ok_or(AppError::Unauthorized)?;
    if !user.verify_password(&body.password) {
        return Err(AppError::Unauthorized);
    }

    let token = app_state.auth.issue(&user.id, &user.email, &user.role)?;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token))
        .json(user_response(&user)))
}

/// Clears the session cookie. There is nothing to revoke server-side.
/// - url: `{domain}/api/auth/logout`
#[post("/api/auth/logout")]
pub async fn logout() -> HttpResponse {
    HttpResponse::Ok().cookie(removal_cookie()).finish()
}

/// Returns the current user, resolved from the session cookie.
/// - url: `{domain}/api/auth/me`
///
/// # Response
/// ## Ok
/// ## Error
/// - Unauthorized (missing, expired or malformed session)
#[get("/api/auth/me")]
pub async fn me(req: HttpRequest, app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let user = require_user(&req, &app_state)?;
    Ok(HttpResponse::Ok().json(user_response(&user)))
}

/// Updates profile fields of the current user.
/// - url: `{domain}/api/auth/profile`
#[put("/api/auth/profile")]
pub async fn update_profile(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(&req, &app_state)?;
    let body: ProfileRequest = serde_json::from_str(&req_body)?;
    let conn = app_state.conn()?;

    let profile_image = match &body.profile_image {
        Some(encoded) => Some(decode_base64("profile_image", encoded)?),
        None => None,
    };

    let updated = user.update_profile(
        &conn,
        body.username.as_deref(),
        body.dark_mode,
        profile_image,
    )?;
    Ok(HttpResponse::Ok().json(user_response(&updated)))
}

#[cfg(test)]
mod tests {
    use actix_web::test::{self, call_service};
    use actix_web::App;

    use crate::auth::token::SESSION_COOKIE;

    #[actix_rt::test]
    async fn test_logout_clears_session_cookie() {
        let app = test::init_service(App::new().service(super::logout)).await;

        let req = test::TestRequest::post().uri("/api/auth/logout").to_request();
        let resp = call_service(&app, req).await;
        assert!(resp.status().is_success());

        let set_cookie = resp
            .headers()
            .get(actix_web::http::header::SET_COOKIE)
            .expect("logout must send a removal cookie")
            .to_str()
            .unwrap();
        assert!(set_cookie.contains(SESSION_COOKIE));
        assert!(set_cookie.contains("Max-Age=0"));
    }
}
