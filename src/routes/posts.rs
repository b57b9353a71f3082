use actix_web::{
    delete, get, post, put,
    web::{self, Data},
    HttpRequest, HttpResponse,
};
use chrono::NaiveDateTime;
use diesel::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::{AppError, AppState, DbConn};
use crate::auth::permissions::{can_manage_all_posts, can_manage_own_posts};
use crate::auth::{get_auth_user, require_role, require_user};
use crate::database::models::analytics::PostAnalytic;
use crate::database::models::audit::AuditLog;
use crate::database::models::category::Category;
use crate::database::models::comment::Comment;
use crate::database::models::like::Like;
use crate::database::models::post::{
    NewPostData, Post, PostChanges, PostListQuery, PostSort, PostStatus,
};
use crate::database::models::post_image::PostImage;
use crate::database::models::user::User;
use crate::routes::{clamp_page, decode_base64, encode_bytes, Paginated};

#[derive(Deserialize)]
pub struct PostListParams {
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
    category: Option<String>,
    tag: Option<String>,
    status: Option<String>,
    sort: Option<String>,
}

#[derive(Deserialize)]
struct CreatePostRequest {
    title: String,
    content: String,
    excerpt: Option<String>,
    status: Option<String>,
    category_id: Option<i32>,
    #[serde(default)]
    tags: Vec<String>,
    /// Base64 encoded bytes.
    thumbnail: Option<String>,
    /// Base64 encoded gallery, in display order.
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct UpdatePostRequest {
    title: Option<String>,
    content: Option<String>,
    excerpt: Option<String>,
    status: Option<String>,
    category_id: Option<i32>,
    tags: Option<Vec<String>>,
    thumbnail: Option<String>,
    images: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct PostSummary {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub status: String,
    pub author: String,
    pub category: Option<Category>,
    pub tags: Vec<String>,
    pub reading_time: Option<i32>,
    pub thumbnail: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub summary: PostSummary,
    pub content: String,
    pub images: Vec<String>,
}

fn post_summary(conn: &DbConn, post: &Post) -> Result<PostSummary, AppError> {
    let author = User::find_by_id(conn, &post.author_id)
        .map(|u| u.username)
        .unwrap_or_else(|_| "[deleted]".to_string());
    let category = post
        .category_id
        .and_then(|id| Category::find_by_id(conn, id));

    Ok(PostSummary {
        id: post.id,
        title: post.title.clone(),
        slug: post.slug.clone(),
        excerpt: post.excerpt.clone(),
        status: post.status.clone(),
        author,
        category,
        tags: post.tag_names(conn)?,
        reading_time: post.reading_time,
        thumbnail: post.thumbnail.as_deref().map(encode_bytes),
        like_count: Like::count_for_post(conn, post.id)?,
        comment_count: Comment::count_for_post(conn, post.id)?,
        view_count: PostAnalytic::views_for_post(conn, post.id)?,
        published_at: post.published_at,
        created_at: post.created_at,
        updated_at: post.updated_at,
    })
}

fn post_detail(conn: &DbConn, post: &Post) -> Result<PostDetail, AppError> {
    let images = PostImage::list_for_post(conn, post.id)?
        .iter()
        .map(|img| encode_bytes(&img.data))
        .collect();
    Ok(PostDetail {
        summary: post_summary(conn, post)?,
        content: post.content.clone(),
        images,
    })
}

/// True when the user may edit or delete this particular post.
fn can_touch_post(user: &User, post: &Post) -> bool {
    can_manage_all_posts(user.role())
        || (can_manage_own_posts(user.role()) && post.author_id == user.id)
}

/// Public post listing with pagination, search, filters and sort.
/// - url: `{domain}/api/posts`
///
/// Browsing non-published statuses requires an admin session; admins are
/// scoped to their own posts, superadmins see everything.
#[get("/api/posts")]
pub async fn list_posts(
    req: HttpRequest,
    params: web::Query<PostListParams>,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let conn = app_state.conn()?;
    let (page, limit) = clamp_page(params.page, params.limit);

    let sort = match params.sort.as_deref() {
        Some(name) => PostSort::from_name(name)
            .ok_or_else(|| AppError::bad_request("Invalid sort order"))?,
        None => PostSort::Newest,
    };

    let (status, author_scope) = match params.status.as_deref() {
        None | Some("published") => (PostStatus::Published, None),
        Some(other) => {
            let status = PostStatus::from_name(other)
                .ok_or_else(|| AppError::bad_request("Invalid status"))?;
            let user = require_role(&req, &app_state, can_manage_own_posts)?;
            let scope = if can_manage_all_posts(user.role()) {
                None
            } else {
                Some(user.id.clone())
            };
            (status, scope)
        }
    };

    let category_id = match &params.category {
        Some(slug) => match Category::find_by_slug(&conn, slug) {
            Some(category) => Some(category.id),
            None => {
                return Ok(HttpResponse::Ok().json(Paginated::<PostSummary> {
                    items: Vec::new(),
                    total: 0,
                    page,
                    limit,
                }))
            }
        },
        None => None,
    };
    let tag_id = match &params.tag {
        Some(slug) => match crate::database::models::tag::Tag::find_by_slug(&conn, slug) {
            Some(tag) => Some(tag.id),
            None => {
                return Ok(HttpResponse::Ok().json(Paginated::<PostSummary> {
                    items: Vec::new(),
                    total: 0,
                    page,
                    limit,
                }))
            }
        },
        None => None,
    };

    let query = PostListQuery {
        page,
        limit,
        search: params.search.clone().filter(|s| !s.trim().is_empty()),
        category_id,
        tag_id,
        status: Some(status.as_name().to_string()),
        author_id: author_scope,
        sort,
    };
    let (posts, total) = Post::list(&conn, &query)?;

    let mut items = Vec::with_capacity(posts.len());
    for post in &posts {
        items.push(post_summary(&conn, post)?);
    }

    Ok(HttpResponse::Ok().json(Paginated {
        items,
        total,
        page,
        limit,
    }))
}

/// Full post by slug, including content and the base64 gallery.
/// - url: `{domain}/api/posts/{slug}`
///
/// Unpublished posts are a 404 for everyone except their author and
/// superadmins — existence is not revealed.
#[get("/api/posts/{slug}")]
pub async fn get_post(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let slug = req.match_info().query("slug").to_string();
    let conn = app_state.conn()?;

    let post = Post::find_by_slug(&conn, &slug).ok_or_else(|| AppError::not_found("Post"))?;
    if post.status() != PostStatus::Published {
        let visible = get_auth_user(&req, &app_state)
            .map(|user| can_touch_post(&user, &post))
            .unwrap_or(false);
        if !visible {
            return Err(AppError::not_found("Post"));
        }
    }

    Ok(HttpResponse::Ok().json(post_detail(&conn, &post)?))
}

/// Creates a post. Admin tier required; the author is the session user.
/// - url: `{domain}/api/posts`
///
/// # Response
/// ## Ok
/// - the created post
/// ## Error
/// - Bad request (validation)
/// - Unauthorized / Forbidden
/// - Conflict (slug already taken)
#[post("/api/posts")]
pub async fn create_post(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_role(&req, &app_state, can_manage_own_posts)?;
    let body: CreatePostRequest = serde_json::from_str(&req_body)?;
    let conn = app_state.conn()?;

    let status = match body.status.as_deref() {
        Some(name) => PostStatus::from_name(name)
            .ok_or_else(|| AppError::bad_request("Invalid status"))?,
        None => PostStatus::Draft,
    };
    if let Some(category_id) = body.category_id {
        if Category::find_by_id(&conn, category_id).is_none() {
            return Err(AppError::bad_request("Unknown category"));
        }
    }
    let thumbnail = match &body.thumbnail {
        Some(encoded) => Some(decode_base64("thumbnail", encoded)?),
        None => None,
    };
    let mut images = Vec::with_capacity(body.images.len());
    for encoded in &body.images {
        images.push(decode_base64("images", encoded)?);
    }

    let created = Post::new(
        &conn,
        &user,
        NewPostData {
            title: body.title,
            content: body.content,
            excerpt: body.excerpt,
            status,
            category_id: body.category_id,
            tags: body.tags,
            thumbnail,
            images,
        },
    )?;

    AuditLog::record(
        &conn,
        &user.id,
        "post.create",
        "posts",
        &created.id.to_string(),
        json!({ "title": created.title, "status": created.status }),
    );

    Ok(HttpResponse::Ok().json(post_detail(&conn, &created)?))
}

/// Partial update; tags and gallery are replaced wholesale when present.
/// - url: `{domain}/api/posts/{post_id}`
#[put("/api/posts/{post_id}")]
pub async fn update_post(
    req: HttpRequest,
    req_body: String,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(&req, &app_state)?;
    let post_id = req.match_info().query("post_id").parse::<i32>()?;
    let conn = app_state.conn()?;

    let post = Post::find_by_id(&conn, post_id).ok_or_else(|| AppError::not_found("Post"))?;
    if !can_touch_post(&user, &post) {
        return Err(AppError::Forbidden);
    }

    let body: UpdatePostRequest = serde_json::from_str(&req_body)?;
    let status = match body.status.as_deref() {
        Some(name) => Some(
            PostStatus::from_name(name)
                .ok_or_else(|| AppError::bad_request("Invalid status"))?,
        ),
        None => None,
    };
    if let Some(category_id) = body.category_id {
        if Category::find_by_id(&conn, category_id).is_none() {
            return Err(AppError::bad_request("Unknown category"));
        }
    }
    let thumbnail = match &body.thumbnail {
        Some(encoded) => Some(decode_base64("thumbnail", encoded)?),
        None => None,
    };
    let images = match &body.images {
        Some(gallery) => {
            let mut decoded = Vec::with_capacity(gallery.len());
            for encoded in gallery {
                decoded.push(decode_base64("images", encoded)?);
            }
            Some(decoded)
        }
        None => None,
    };

    let updated = post.edit(
        &conn,
        PostChanges {
            title: body.title,
            content: body.content,
            excerpt: body.excerpt,
            status,
            category_id: body.category_id,
            thumbnail,
            tags: body.tags,
            images,
        },
    )?;

    AuditLog::record(
        &conn,
        &user.id,
        "post.update",
        "posts",
        &updated.id.to_string(),
        json!({ "title": updated.title, "status": updated.status }),
    );

    Ok(HttpResponse::Ok().json(post_detail(&conn, &updated)?))
}

/// Hard delete with cascade to comments, likes, tags links, analytics and
/// gallery images.
/// - url: `{domain}/api/posts/{post_id}`
#[delete("/api/posts/{post_id}")]
pub async fn delete_post(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(&req, &app_state)?;
    let post_id = req.match_info().query("post_id").parse::<i32>()?;
    let conn = app_state.conn()?;

    let post = Post::find_by_id(&conn, post_id).ok_or_else(|| AppError::not_found("Post"))?;
    if !can_touch_post(&user, &post) {
        return Err(AppError::Forbidden);
    }

    conn.transaction::<_, AppError, _>(|| Post::delete_cascade(&conn, post.id))?;

    AuditLog::record(
        &conn,
        &user.id,
        "post.delete",
        "posts",
        &post.id.to_string(),
        json!({ "title": post.title }),
    );

    Ok(HttpResponse::Ok().finish())
}

/// Tracking endpoint for page views; upserts today's analytics bucket.
/// - url: `{domain}/api/posts/{post_id}/view`
#[post("/api/posts/{post_id}/view")]
pub async fn track_view(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let post_id = req.match_info().query("post_id").parse::<i32>()?;
    let conn = app_state.conn()?;

    Post::find_by_id(&conn, post_id).ok_or_else(|| AppError::not_found("Post"))?;
    PostAnalytic::track_view(&conn, post_id)?;

    Ok(HttpResponse::Ok().finish())
}

/// Toggles the viewer's like on the post.
/// - url: `{domain}/api/posts/{post_id}/like`
///
/// # Response
/// ## Ok
/// - `{ "liked": bool, "count": n }` reflecting the state after the toggle
#[post("/api/posts/{post_id}/like")]
pub async fn toggle_like(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(&req, &app_state)?;
    let post_id = req.match_info().query("post_id").parse::<i32>()?;
    let conn = app_state.conn()?;

    Post::find_by_id(&conn, post_id).ok_or_else(|| AppError::not_found("Post"))?;
    let liked = Like::toggle(&conn, &user.id, post_id)?;
    let count = Like::count_for_post(&conn, post_id)?;

    Ok(HttpResponse::Ok().json(json!({ "liked": liked, "count": count })))
}

/// Like count plus whether the current viewer (if any) has liked the post.
/// - url: `{domain}/api/posts/{post_id}/likes`
#[get("/api/posts/{post_id}/likes")]
pub async fn like_status(
    req: HttpRequest,
    app_state: Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let post_id = req.match_info().query("post_id").parse::<i32>()?;
    let conn = app_state.conn()?;

    Post::find_by_id(&conn, post_id).ok_or_else(|| AppError::not_found("Post"))?;
    let count = Like::count_for_post(&conn, post_id)?;
    let liked = match get_auth_user(&req, &app_state) {
        Some(user) => Like::exists(&conn, &user.id, post_id)?,
        None => false,
    };

    Ok(HttpResponse::Ok().json(json!({ "liked": liked, "count": count })))
}

#[cfg(test)]
mod tests {
    use actix_web::{cookie::Cookie, test, App};
    use diesel::prelude::*;
    use uuid::Uuid;

    use super::*;
    use crate::auth::permissions::Role;
    use crate::auth::token::SESSION_COOKIE;
    use crate::database::models::test_support;
    use crate::schema::post_analytics;

    #[actix_rt::test]
    async fn delete_post_removes_the_post_and_its_dependents() {
        let conn = match test_support::checkout() {
            Some(conn) => conn,
            None => return,
        };
        std::env::set_var("SESSION_SECRET", "route-test-secret-0123456789");
        let app_state = AppState::new(None);

        let author = User::new(
            &conn,
            &format!("{}@example.com", Uuid::new_v4()),
            "route-author",
            "longenoughpassword",
            Role::Admin,
            None,
        )
        .unwrap();
        let created = Post::new(
            &conn,
            &author,
            NewPostData {
                title: format!("Removable {}", Uuid::new_v4()),
                content: "Plenty of content to satisfy the minimum length check."
                    .to_string(),
                excerpt: None,
                status: PostStatus::Published,
                category_id: None,
                tags: vec!["ephemeral".to_string()],
                thumbnail: None,
                images: Vec::new(),
            },
        )
        .unwrap();
        PostAnalytic::track_view(&conn, created.id).unwrap();

        let token = app_state
            .auth
            .issue(&author.id, &author.email, &author.role)
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state.clone()))
                .service(delete_post),
        )
        .await;
        let req = test::TestRequest::delete()
            .uri(&format!("/api/posts/{}", created.id))
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        assert!(Post::find_by_id(&conn, created.id).is_none());
        let buckets: i64 = post_analytics::table
            .filter(post_analytics::post_id.eq(created.id))
            .count()
            .get_result(&conn)
            .unwrap();
        assert_eq!(buckets, 0);

        author.delete(&conn).unwrap();
    }
}
