use actix_web::{
    delete, get, post,
    web::{self, Data},
    HttpRequest, HttpResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::{AppError, AppState};
use crate::auth::permissions::{
    can_create_admins, can_manage_all_posts, can_manage_own_posts, can_manage_users,
    can_view_global_analytics, Role,
};
use crate::auth::require_role;
use crate::database::models::analytics::{self, DashboardTotals};
use crate::database::models::audit::AuditLog;
use crate::database::models::post::{Post, PostListQuery, PostSort};
use crate::database::models::user::User;
use crate::routes::auth::{user_response, UserResponse};
use crate::routes::{clamp_page, Paginated};

#[derive(Deserialize)]
pub struct AnalyticsParams {
    period: Option<String>,
}

#[derive(Deserialize)]
pub struct PageParams {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct CreateAdminRequest {
    email: String,
    username: String,
    password: String,
}

#[derive(Serialize)]
struct DashboardResponse {
    totals: DashboardTotals,
    recent_posts: Vec<RecentPost>,
}

#[derive(Serialize)]
struct RecentPost {
    id: i32,
    title: String,
    slug: String,
    status: String,
    created_at: chrono::NaiveDateTime,
}

/// Maps the reporting period parameter onto its window length in days.
fn parse_period(period: Option<&str>) -> Result<i64, AppError> {
    match period {
        None | Some("30d") => Ok(30),
        Some("7d") => Ok(7),
        Some("90d") => Ok(90),
        Some(_) => Err(AppError::bad_request("Invalid period, expected 7d, 30d or 90d")),
    }
}

/// Global analytics for a reporting window: per-metric period-over-period
/// totals plus the daily trend series. Superadmin only.
/// - url: `{domain}/api/admin/analytics?period=7d|30d|90d`
#[get("/api/admin/analytics")]
pub async fn global_analytics(
    req: HttpRequest,
    params: web::Query<AnalyticsParams>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_role(&req, &app_state, can_view_global_analytics)?;
    let days = parse_period(params.period.as_deref())?;
    let conn = app_state.conn()?;

    let summary = analytics::summarize(&conn, days)?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Dashboard totals and recent posts. Admins see their own posts,
/// superadmins see everything.
/// - url: `{domain}/api/admin/dashboard`
#[get("/api/admin/dashboard")]
pub async fn dashboard(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_role(&req, &app_state, can_manage_own_posts)?;
    let conn = app_state.conn()?;

    let scope = if can_manage_all_posts(user.role()) {
        None
    } else {
        Some(user.id.as_str())
    };
    let totals = analytics::dashboard_totals(&conn, scope)?;

    let (recent, _) = Post::list(
        &conn,
        &PostListQuery {
            page: 1,
            limit: 5,
            search: None,
            category_id: None,
            tag_id: None,
            status: None,
            author_id: scope.map(String::from),
            sort: PostSort::Newest,
        },
    )?;
    let recent_posts = recent
        .into_iter()
        .map(|p| RecentPost {
            id: p.id,
            title: p.title,
            slug: p.slug,
            status: p.status,
            created_at: p.created_at,
        })
        .collect();

    Ok(HttpResponse::Ok().json(DashboardResponse {
        totals,
        recent_posts,
    }))
}

/// Paginated user listing with roles and provenance. Superadmin only.
/// - url: `{domain}/api/admin/users`
#[get("/api/admin/users")]
pub async fn list_users(
    req: HttpRequest,
    params: web::Query<PageParams>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_role(&req, &app_state, can_manage_users)?;
    let (page, limit) = clamp_page(params.page, params.limit);
    let conn = app_state.conn()?;

    let (users, total) = User::list(&conn, page, limit)?;
    let items: Vec<UserResponse> = users.iter().map(user_response).collect();

    Ok(HttpResponse::Ok().json(Paginated {
        items,
        total,
        page,
        limit,
    }))
}

/// Creates an admin account with provenance pointing at the actor.
/// Superadmin only.
/// - url: `{domain}/api/admin/admins`
#[post("/api/admin/admins")]
pub async fn create_admin(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let actor = require_role(&req, &app_state, can_create_admins)?;
    let body: CreateAdminRequest = serde_json::from_str(&req_body)?;
    let conn = app_state.conn()?;

    let admin = User::new(
        &conn,
        &body.email,
        &body.username,
        &body.password,
        Role::Admin,
        Some(&actor.id),
    )?;

    AuditLog::record(
        &conn,
        &actor.id,
        "admin.create",
        "users",
        &admin.id,
        json!({ "email": admin.email, "username": admin.username }),
    );

    Ok(HttpResponse::Ok().json(user_response(&admin)))
}

/// Deletes a user and cascades everything they own. Superadmin only;
/// refuses self-deletion and superadmin targets.
/// - url: `{domain}/api/admin/users/{user_id}`
#[delete("/api/admin/users/{user_id}")]
pub async fn delete_user(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let actor = require_role(&req, &app_state, can_manage_users)?;
    let user_id = req.match_info().query("user_id").to_string();
    let conn = app_state.conn()?;

    if user_id == actor.id {
        return Err(AppError::bad_request("Cannot delete your own account"));
    }
    let target = User::find_by_id(&conn, &user_id)?;
    if target.role() == Role::Superadmin {
        return Err(AppError::Forbidden);
    }

    target.delete(&conn)?;

    AuditLog::record(
        &conn,
        &actor.id,
        "user.delete",
        "users",
        &target.id,
        json!({ "email": target.email, "role": target.role }),
    );

    Ok(HttpResponse::Ok().finish())
}

/// Paginated audit trail, newest first. Superadmin only.
/// - url: `{domain}/api/admin/audit-log`
#[get("/api/admin/audit-log")]
pub async fn audit_log(
    req: HttpRequest,
    params: web::Query<PageParams>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_role(&req, &app_state, can_manage_users)?;
    let (page, limit) = clamp_page(params.page, params.limit);
    let conn = app_state.conn()?;

    let (items, total) = AuditLog::list(&conn, page, limit)?;
    Ok(HttpResponse::Ok().json(Paginated {
        items,
        total,
        page,
        limit,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn period_parsing_accepts_known_windows() {
        assert_eq!(parse_period(None).unwrap(), 30);
        assert_eq!(parse_period(Some("7d")).unwrap(), 7);
        assert_eq!(parse_period(Some("30d")).unwrap(), 30);
        assert_eq!(parse_period(Some("90d")).unwrap(), 90);
    }

    #[test]
    fn period_parsing_rejects_everything_else() {
        assert!(parse_period(Some("1d")).is_err());
        assert!(parse_period(Some("month")).is_err());
        assert!(parse_period(Some("")).is_err());
    }
}
