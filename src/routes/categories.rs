use actix_web::{delete, get, post, put, web::Data, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::{AppError, AppState};
use crate::auth::permissions::can_manage_own_posts;
use crate::auth::require_role;
use crate::database::models::audit::AuditLog;
use crate::database::models::category::Category;

#[derive(Deserialize)]
struct CreateCategoryRequest {
    name: String,
    #[serde(default)]
    color: String,
}

#[derive(Deserialize)]
struct UpdateCategoryRequest {
    name: Option<String>,
    color: Option<String>,
}

#[derive(Serialize)]
struct CategoryWithCount {
    #[serde(flatten)]
    category: Category,
    post_count: i64,
}

/// Public category listing with per-category post counts.
/// - url: `{domain}/api/categories`
#[get("/api/categories")]
pub async fn list_categories(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let conn = app_state.conn()?;

    let mut items = Vec::new();
    for category in Category::list(&conn)? {
        let post_count = category.post_count(&conn)?;
        items.push(CategoryWithCount {
            category,
            post_count,
        });
    }

    Ok(HttpResponse::Ok().json(items))
}

/// Creates a category. Admin tier required.
/// - url: `{domain}/api/categories`
#[post("/api/categories")]
pub async fn create_category(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_role(&req, &app_state, can_manage_own_posts)?;
    let body: CreateCategoryRequest = serde_json::from_str(&req_body)?;
    let conn = app_state.conn()?;

    let created = Category::new(&conn, &body.name, &body.color)?;

    AuditLog::record(
        &conn,
        &user.id,
        "category.create",
        "categories",
        &created.id.to_string(),
        json!({ "name": created.name }),
    );

    Ok(HttpResponse::Ok().json(created))
}

/// Renames or recolors a category. Admin tier required.
/// - url: `{domain}/api/categories/{category_id}`
#[put("/api/categories/{category_id}")]
pub async fn update_category(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_role(&req, &app_state, can_manage_own_posts)?;
    let category_id = req.match_info().query("category_id").parse::<i32>()?;
    let body: UpdateCategoryRequest = serde_json::from_str(&req_body)?;
    let conn = app_state.conn()?;

    let category = Category::find_by_id(&conn, category_id)
        .ok_or_else(|| AppError::not_found("Category"))?;
    let updated = category.edit(&conn, body.name.as_deref(), body.color.as_deref())?;

    AuditLog::record(
        &conn,
        &user.id,
        "category.update",
        "categories",
        &updated.id.to_string(),
        json!({ "name": updated.name }),
    );

    Ok(HttpResponse::Ok().json(updated))
}

/// Deletes a category; its posts are detached, not deleted.
/// - url: `{domain}/api/categories/{category_id}`
#[delete("/api/categories/{category_id}")]
pub async fn delete_category(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_role(&req, &app_state, can_manage_own_posts)?;
    let category_id = req.match_info().query("category_id").parse::<i32>()?;
    let conn = app_state.conn()?;

    let category = Category::find_by_id(&conn, category_id)
        .ok_or_else(|| AppError::not_found("Category"))?;
    category.delete(&conn)?;

    AuditLog::record(
        &conn,
        &user.id,
        "category.delete",
        "categories",
        &category.id.to_string(),
        json!({ "name": category.name }),
    );

    Ok(HttpResponse::Ok().finish())
}
