use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use rand::distributions::{Alphanumeric, DistString};
use uuid::Uuid;

use crate::app::{AppError, DbConn};
use crate::auth::permissions::Role;
use crate::database::models::analytics::PostAnalytic;
use crate::database::models::comment::Comment;
use crate::database::models::like::Like;
use crate::database::models::post::Post;
use crate::schema::{comments, likes, posts, users};

#[derive(Debug, Queryable, Clone)]
pub struct User {
    pub id: String,
    /// Stored lowercased; lookups lowercase their input.
    pub email: String,
    pub username: String,
    /// Hex SHA-256 of salt + password.
    pub pass: String,
    pub salt: String,
    pub role: String,
    /// Provenance for admin accounts created from the admin surface.
    pub created_by: Option<String>,
    pub profile_image: Option<Vec<u8>>,
    pub dark_mode: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "users"]
struct UserInsert {
    id: String,
    email: String,
    username: String,
    pass: String,
    salt: String,
    role: String,
    created_by: Option<String>,
    profile_image: Option<Vec<u8>>,
    dark_mode: bool,
    created_at: NaiveDateTime,
}

pub fn generate_salt() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), 16)
}

pub fn hash_password(salt: &str, password: &str) -> String {
    sha256::digest(format!("{}{}", salt, password))
}

impl User {
    /// Validates credentials and inserts a new user.
    /// Duplicate emails are rejected with a conflict before touching the table.
    pub fn new(
        conn: &DbConn,
        email: &str,
        username: &str,
        password: &str,
        role: Role,
        created_by: Option<&str>,
    ) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        let username = username.trim();

        if email.is_empty() || !email.contains('@') {
            return Err(AppError::bad_request("Invalid email address"));
        }
        if username.is_empty() {
            return Err(AppError::bad_request("Username is required"));
        }
        if password.len() < 10 {
            return Err(AppError::bad_request(
                "Password must be at least 10 characters",
            ));
        }
        if User::find_by_email(conn, &email).is_some() {
            return Err(AppError::conflict("Email already registered"));
        }

        let salt = generate_salt();
        let to_insert = UserInsert {
            id: Uuid::new_v4().to_string(),
            pass: hash_password(&salt, password),
            salt,
            email,
            username: username.to_string(),
            role: role.as_name().to_string(),
            created_by: created_by.map(String::from),
            profile_image: None,
            dark_mode: false,
            created_at: Utc::now().naive_utc(),
        };

        let ret_user: User = diesel::insert_into(users::table)
            .values(&to_insert)
            .get_result(conn)?;

        Ok(ret_user)
    }

    pub fn role(&self) -> Role {
        Role::from_name(&self.role)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.pass
    }

    /** Returns the user with the id specified */
    pub fn find_by_id(conn: &DbConn, user_id: &str) -> Result<User, AppError> {
        users::table
            .filter(users::id.eq(user_id))
            .first::<User>(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Lookup by email; the input is lowercased to match storage.
    pub fn find_by_email(conn: &DbConn, email: &str) -> Option<User> {
        users::table
            .filter(users::email.eq(email.trim().to_lowercase()))
            .first::<User>(conn)
            .ok()
    }

    /// Paginated user listing, newest first, with the total row count.
    pub fn list(conn: &DbConn, page: i64, limit: i64) -> Result<(Vec<User>, i64), AppError> {
        let total: i64 = users::table.count().get_result(conn)?;
        let items = users::table
            .order(users::created_at.desc())
            .offset((page - 1) * limit)
            .limit(limit)
            .load::<User>(conn)?;
        Ok((items, total))
    }

    /// Updates profile fields, keeping current values where no change was sent.
    pub fn update_profile(
        &self,
        conn: &DbConn,
        username: Option<&str>,
        dark_mode: Option<bool>,
        profile_image: Option<Vec<u8>>,
    ) -> Result<User, AppError> {
        if let Some(name) = username {
            if name.trim().is_empty() {
                return Err(AppError::bad_request("Username is required"));
            }
        }

        let updated: User = diesel::update(users::table.filter(users::id.eq(&self.id)))
            .set((
                users::username.eq(username.unwrap_or(&self.username).trim()),
                users::dark_mode.eq(dark_mode.unwrap_or(self.dark_mode)),
                users::profile_image
                    .eq(profile_image.or_else(|| self.profile_image.clone())),
            ))
            .get_result(conn)?;

        Ok(updated)
    }

    /** Deletes the user and everything they own: posts (with their comments,
    likes, tags and images), comments and likes left elsewhere. Runs in a
    single transaction so the cascade is never observed half-done. */
    pub fn delete(&self, conn: &DbConn) -> Result<(), AppError> {
        conn.transaction::<_, AppError, _>(|| {
            let owned: Vec<i32> = posts::table
                .filter(posts::author_id.eq(&self.id))
                .select(posts::id)
                .load(conn)?;
            for post_id in owned {
                Post::delete_cascade(conn, post_id)?;
            }

            // Comments and likes left on other users' posts: decrement each
            // row's creation-day bucket before removing it, the same mirror
            // the live mutations maintain.
            let own_comments: Vec<Comment> = comments::table
                .filter(comments::user_id.eq(&self.id))
                .load(conn)?;
            let comment_ids: Vec<String> =
                own_comments.iter().map(|c| c.id.clone()).collect();

            // Replies to this user's comments lose their parent instead of
            // dangling.
            diesel::update(
                comments::table.filter(comments::parent_id.eq_any(&comment_ids[..])),
            )
            .set(comments::parent_id.eq::<Option<String>>(None))
            .execute(conn)?;

            for comment in &own_comments {
                PostAnalytic::bump_comments(
                    conn,
                    comment.post_id,
                    comment.created_at.date(),
                    -1,
                )?;
            }
            diesel::delete(comments::table.filter(comments::user_id.eq(&self.id)))
                .execute(conn)?;

            let own_likes: Vec<Like> = likes::table
                .filter(likes::user_id.eq(&self.id))
                .load(conn)?;
            for like in &own_likes {
                PostAnalytic::bump_likes(conn, like.post_id, like.created_at.date(), -1)?;
            }
            diesel::delete(likes::table.filter(likes::user_id.eq(&self.id)))
                .execute(conn)?;
            diesel::delete(users::table.filter(users::id.eq(&self.id))).execute(conn)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::database::models::post::{NewPostData, PostStatus};
    use crate::database::models::test_support;
    use crate::schema::post_analytics;

    fn sample_user(conn: &DbConn, role: Role) -> User {
        User::new(
            conn,
            &format!("{}@example.com", Uuid::new_v4()),
            "cascade-user",
            "longenoughpassword",
            role,
            None,
        )
        .unwrap()
    }

    #[test]
    fn delete_cascades_and_unwinds_analytics_buckets() {
        let conn = match test_support::checkout() {
            Some(conn) => conn,
            None => return,
        };
        let author = sample_user(&conn, Role::Admin);
        let visitor = sample_user(&conn, Role::User);
        let post = Post::new(
            &conn,
            &author,
            NewPostData {
                title: format!("Cascade target {}", Uuid::new_v4()),
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

        Like::toggle(&conn, &visitor.id, post.id).unwrap();
        let comment =
            Comment::new(&conn, post.id, &visitor.id, "A visiting comment", None).unwrap();

        visitor.delete(&conn).unwrap();

        assert!(User::find_by_id(&conn, &visitor.id).is_err());
        assert!(Comment::find_by_id(&conn, &comment.id).is_none());
        assert!(!Like::exists(&conn, &visitor.id, post.id).unwrap());

        // The visitor's engagement is unwound from the daily buckets too.
        let bucket: PostAnalytic = post_analytics::table
            .filter(post_analytics::post_id.eq(post.id))
            .first(&conn)
            .unwrap();
        assert_eq!(bucket.likes_count, 0);
        assert_eq!(bucket.comments_count, 0);

        author.delete(&conn).unwrap();
    }
}
