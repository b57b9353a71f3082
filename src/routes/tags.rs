use actix_web::{delete, get, web::Data, HttpRequest, HttpResponse};
use serde_json::json;

use crate::app::{AppError, AppState};
use crate::auth::permissions::can_manage_own_posts;
use crate::auth::require_role;
use crate::database::models::audit::AuditLog;
use crate::database::models::tag::Tag;

/// Public tag listing. Tags are never created here — they appear ad hoc
/// when posts reference them by name.
/// - url: `{domain}/api/tags`
#[get("/api/tags")]
pub async fn list_tags(app_state: Data<AppState>) -> Result<HttpResponse, AppError> {
    let conn = app_state.conn()?;
    let tags = Tag::list(&conn)?;
    Ok(HttpResponse::Ok().json(tags))
}

/// Deletes a tag, unlinking it from every post first. Admin tier required.
/// - url: `{domain}/api/tags/{tag_id}`
#[delete("/api/tags/{tag_id}")]
pub async fn delete_tag(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_role(&req, &app_state, can_manage_own_posts)?;
    let tag_id = req.match_info().query("tag_id").parse::<i32>()?;
    let conn = app_state.conn()?;

    let tag = Tag::find_by_id(&conn, tag_id).ok_or_else(|| AppError::not_found("Tag"))?;
    tag.delete(&conn)?;

    AuditLog::record(
        &conn,
        &user.id,
        "tag.delete",
        "tags",
        &tag.id.to_string(),
        json!({ "name": tag.name }),
    );

    Ok(HttpResponse::Ok().finish())
}
