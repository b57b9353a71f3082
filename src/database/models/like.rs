use chrono::Utc;
use diesel::prelude::*;

use crate::app::{AppError, DbConn};
use crate::database::models::analytics::PostAnalytic;
use crate::schema::likes;

/// A like is a toggle row, not a counter: the composite `(user_id, post_id)`
/// key makes duplicates impossible even under concurrent identical requests.
#[derive(Debug, Queryable, Insertable, Clone)]
#[table_name = "likes"]
pub struct Like {
    pub user_id: String,
    pub post_id: i32,
    pub created_at: chrono::NaiveDateTime,
}

impl Like {
    /// Flips the like state for the user on the post and mirrors the change
    /// into today's analytics bucket in the same transaction.
    /// Returns whether the post is liked after the call.
    pub fn toggle(conn: &DbConn, user_id: &str, post_id: i32) -> Result<bool, AppError> {
        conn.transaction::<_, AppError, _>(|| {
            let existing = likes::table
                .filter(likes::user_id.eq(user_id))
                .filter(likes::post_id.eq(post_id))
                .first::<Like>(conn)
                .optional()?;

            let today = Utc::now().naive_utc().date();
            match existing {
                Some(_) => {
                    diesel::delete(
                        likes::table
                            .filter(likes::user_id.eq(user_id))
                            .filter(likes::post_id.eq(post_id)),
                    )
                    .execute(conn)?;
                    PostAnalytic::bump_likes(conn, post_id, today, -1)?;
                    Ok(false)
                }
                None => {
                    // A concurrent identical toggle can win the insert; the
                    // composite key deduplicates and the winner already bumped
                    // the bucket.
                    let inserted = diesel::insert_into(likes::table)
                        .values(&Like {
                            user_id: user_id.to_string(),
                            post_id,
                            created_at: Utc::now().naive_utc(),
                        })
                        .on_conflict_do_nothing()
                        .execute(conn)?;
                    if inserted > 0 {
                        PostAnalytic::bump_likes(conn, post_id, today, 1)?;
                    }
                    Ok(true)
                }
            }
        })
    }

    pub fn exists(conn: &DbConn, user_id: &str, post_id: i32) -> Result<bool, AppError> {
        let found = likes::table
            .filter(likes::user_id.eq(user_id))
            .filter(likes::post_id.eq(post_id))
            .first::<Like>(conn)
            .optional()?;
        Ok(found.is_some())
    }

    /// Total likes are always derived by counting rows.
    pub fn count_for_post(conn: &DbConn, post_id: i32) -> Result<i64, AppError> {
        let count = likes::table
            .filter(likes::post_id.eq(post_id))
            .count()
            .get_result(conn)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use crate::auth::permissions::Role;
    use crate::database::models::post::{NewPostData, Post, PostStatus};
    use crate::database::models::test_support;
    use crate::database::models::user::User;
    use crate::schema::post_analytics;

    #[test]
    fn toggle_flips_state_and_mirrors_the_bucket() {
        let conn = match test_support::checkout() {
            Some(conn) => conn,
            None => return,
        };
        let user = User::new(
            &conn,
            &format!("{}@example.com", Uuid::new_v4()),
            "like-toggler",
            "longenoughpassword",
            Role::Admin,
            None,
        )
        .unwrap();
        let post = Post::new(
            &conn,
            &user,
            NewPostData {
                title: format!("Likeable {}", Uuid::new_v4()),
                content: "Plenty of content to satisfy the minimum length check."
                    .to_string(),
                excerpt: None,
                status: PostStatus::Published,
                category_id: None,
                tags: Vec::new(),
                thumbnail: None,
                images: Vec::new(),
            },
        )
        .unwrap();

        assert!(Like::toggle(&conn, &user.id, post.id).unwrap());
        assert!(Like::exists(&conn, &user.id, post.id).unwrap());
        assert_eq!(Like::count_for_post(&conn, post.id).unwrap(), 1);

        assert!(!Like::toggle(&conn, &user.id, post.id).unwrap());
        assert!(!Like::exists(&conn, &user.id, post.id).unwrap());
        assert_eq!(Like::count_for_post(&conn, post.id).unwrap(), 0);

        // The unlike unwound the same bucket the like filled.
        let bucket: PostAnalytic = post_analytics::table
            .filter(post_analytics::post_id.eq(post.id))
            .first(&conn)
            .unwrap();
        assert_eq!(bucket.likes_count, 0);

        user.delete(&conn).unwrap();
    }
}
