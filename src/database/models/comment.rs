use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::app::{AppError, DbConn};
use crate::database::models::analytics::PostAnalytic;
use crate::schema::{comments, users};

#[derive(Debug, Queryable, Clone, Serialize)]
pub struct Comment {
    pub id: String,
    pub post_id: i32,
    pub user_id: String,
    /// Present on thread replies. Threads are a single level deep: a reply
    /// can never itself be replied to.
    pub parent_id: Option<String>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "comments"]
struct CommentInsert {
    id: String,
    post_id: i32,
    user_id: String,
    parent_id: Option<String>,
    content: String,
    created_at: NaiveDateTime,
}

/// Comment plus its author's username, for list responses.
#[derive(Debug, Serialize)]
pub struct CommentWithAuthor {
    pub id: String,
    pub post_id: i32,
    pub user_id: String,
    pub author: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

impl Comment {
    /** Creates a comment on the post and bumps today's comments bucket in the
    same transaction. A parent, when given, must be a top-level comment on
    the same post. */
    pub fn new(
        conn: &DbConn,
        post_id: i32,
        user_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::bad_request("Comment content is required"));
        }

        if let Some(parent) = parent_id {
            let parent = Comment::find_by_id(conn, parent)
                .ok_or_else(|| AppError::not_found("Parent comment"))?;
            if parent.post_id != post_id {
                return Err(AppError::bad_request(
                    "Parent comment belongs to a different post",
                ));
            }
            if parent.parent_id.is_some() {
                return Err(AppError::bad_request("Cannot reply to a reply"));
            }
        }

        let record = CommentInsert {
            id: Uuid::new_v4().to_string(),
            post_id,
            user_id: user_id.to_string(),
            parent_id: parent_id.map(String::from),
            content: content.trim().to_string(),
            created_at: Utc::now().naive_utc(),
        };

        conn.transaction::<_, AppError, _>(|| {
            let created: Comment = diesel::insert_into(comments::table)
                .values(&record)
                .get_result(conn)?;
            PostAnalytic::bump_comments(conn, post_id, created.created_at.date(), 1)?;
            Ok(created)
        })
    }

    pub fn find_by_id(conn: &DbConn, comment_id: &str) -> Option<Comment> {
        comments::table
            .filter(comments::id.eq(comment_id))
            .first::<Comment>(conn)
            .ok()
    }

    /// Flat ascending listing with author usernames resolved in one extra
    /// query; the client nests replies via `parent_id`.
    pub fn list_for_post(
        conn: &DbConn,
        post_id: i32,
    ) -> Result<Vec<CommentWithAuthor>, AppError> {
        let rows = comments::table
            .filter(comments::post_id.eq(post_id))
            .order(comments::created_at.asc())
            .load::<Comment>(conn)?;

        let author_ids: Vec<String> = rows.iter().map(|c| c.user_id.clone()).collect();
        let authors: Vec<(String, String)> = users::table
            .filter(users::id.eq_any(author_ids))
            .select((users::id, users::username))
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|c| {
                let author = authors
                    .iter()
                    .find(|(id, _)| *id == c.user_id)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_else(|| "[deleted]".to_string());
                CommentWithAuthor {
                    id: c.id,
                    post_id: c.post_id,
                    user_id: c.user_id,
                    author,
                    parent_id: c.parent_id,
                    content: c.content,
                    created_at: c.created_at,
                }
            })
            .collect())
    }

    pub fn count_for_post(conn: &DbConn, post_id: i32) -> Result<i64, AppError> {
        let count = comments::table
            .filter(comments::post_id.eq(post_id))
            .count()
            .get_result(conn)?;
        Ok(count)
    }

    /** Deletes the comment together with its replies in one transaction,
    decrementing the analytics bucket of each removed comment's creation
    day. */
    pub fn delete(&self, conn: &DbConn) -> Result<(), AppError> {
        conn.transaction::<_, AppError, _>(|| {
            let replies = comments::table
                .filter(comments::parent_id.eq(&self.id))
                .load::<Comment>(conn)?;
            for reply in &replies {
                PostAnalytic::bump_comments(
                    conn,
                    reply.post_id,
                    reply.created_at.date(),
                    -1,
                )?;
            }
            diesel::delete(comments::table.filter(comments::parent_id.eq(&self.id)))
                .execute(conn)?;

            diesel::delete(comments::table.filter(comments::id.eq(&self.id)))
                .execute(conn)?;
            PostAnalytic::bump_comments(conn, self.post_id, self.created_at.date(), -1)?;
            Ok(())
        })
    }
}
