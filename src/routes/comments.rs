use actix_web::{delete, get, post, web::Data, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::app::{AppError, AppState};
use crate::auth::permissions::can_moderate_comments;
use crate::auth::require_user;
use crate::database::models::audit::AuditLog;
use crate::database::models::comment::Comment;
use crate::database::models::post::Post;

#[derive(Deserialize)]
struct CreateCommentRequest {
    content: String,
    /// Id of the top-level comment this replies to, if any.
    parent_id: Option<String>,
}

/// All comments on a post, oldest first, with author usernames. Replies
/// reference their parent through `parent_id`; nesting is left to the client.
/// - url: `{domain}/api/posts/{post_id}/comments`
#[get("/api/posts/{post_id}/comments")]
pub async fn list_comments(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let post_id = req.match_info().query("post_id").parse::<i32>()?;
    let conn = app_state.conn()?;

    Post::find_by_id(&conn, post_id).ok_or_else(|| AppError::not_found("Post"))?;
    let comments = Comment::list_for_post(&conn, post_id)?;

    Ok(HttpResponse::Ok().json(comments))
}

/// Creates a comment (optionally a reply) as the session user.
/// - url: `{domain}/api/posts/{post_id}/comments`
///
/// # Response
/// ## Ok
/// - the created comment
/// ## Error
/// - Bad request (empty content, cross-post or nested parent)
/// - Unauthorized
/// - Not found (post or parent comment)
#[post("/api/posts/{post_id}/comments")]
pub async fn create_comment(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(&req, &app_state)?;
    let post_id = req.match_info().query("post_id").parse::<i32>()?;
    let body: CreateCommentRequest = serde_json::from_str(&req_body)?;
    let conn = app_state.conn()?;

    Post::find_by_id(&conn, post_id).ok_or_else(|| AppError::not_found("Post"))?;
    let comment = Comment::new(
        &conn,
        post_id,
        &user.id,
        &body.content,
        body.parent_id.as_deref(),
    )?;

    Ok(HttpResponse::Ok().json(comment))
}

/// Deletes a comment. Allowed for its author, for superadmins, and for
/// admins moderating comments on their own posts. Moderation (deleting
/// someone else's comment) is audited.
/// - url: `{domain}/api/comments/{comment_id}`
#[delete("/api/comments/{comment_id}")]
pub async fn delete_comment(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(&req, &app_state)?;
    let comment_id = req.match_info().query("comment_id").to_string();
    let conn = app_state.conn()?;

    let comment = Comment::find_by_id(&conn, &comment_id)
        .ok_or_else(|| AppError::not_found("Comment"))?;
    let post = Post::find_by_id(&conn, comment.post_id)
        .ok_or_else(|| AppError::not_found("Post"))?;

    let own_comment = comment.user_id == user.id;
    if !own_comment && !can_moderate_comments(user.role(), &post.author_id, &user.id) {
        return Err(AppError::Forbidden);
    }

    comment.delete(&conn)?;

    if !own_comment {
        AuditLog::record(
            &conn,
            &user.id,
            "comment.delete",
            "comments",
            &comment.id,
            json!({ "post_id": comment.post_id, "comment_author": comment.user_id }),
        );
    }

    Ok(HttpResponse::Ok().finish())
}
