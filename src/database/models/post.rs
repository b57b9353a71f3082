use chrono::{NaiveDateTime, Utc};
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::BigInt;

use crate::app::{AppError, DbConn};
use crate::database::models::post_image::PostImage;
use crate::database::models::tag::Tag;
use crate::database::models::user::User;
use crate::schema::{comments, likes, post_analytics, post_images, post_tags, posts, users};

pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_CONTENT_LEN: usize = 10;
const WORDS_PER_MINUTE: i32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn from_name(name: &str) -> Option<PostStatus> {
        match name {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            "archived" => Some(PostStatus::Archived),
            _ => None,
        }
    }

    pub fn as_name(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSort {
    Newest,
    Oldest,
    Popular,
    Liked,
    Commented,
}

impl PostSort {
    pub fn from_name(name: &str) -> Option<PostSort> {
        match name {
            "newest" => Some(PostSort::Newest),
            "oldest" => Some(PostSort::Oldest),
            "popular" => Some(PostSort::Popular),
            "liked" => Some(PostSort::Liked),
            "commented" => Some(PostSort::Commented),
            _ => None,
        }
    }
}

/// Derives the URL-safe unique identifier from a title.
/// Runs of non-alphanumeric characters collapse into single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut prev_dash = false;
    for ch in title.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            prev_dash = false;
        } else if !prev_dash && !slug.is_empty() {
            slug.push('-');
            prev_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Rough minutes-to-read estimate, never below one minute.
pub fn estimate_reading_time(content: &str) -> i32 {
    let words = content.split_whitespace().count() as i32;
    ((words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE).max(1)
}

pub fn validate_title_content(title: &str, content: &str) -> Result<(), AppError> {
    if title.trim().chars().count() < MIN_TITLE_LEN {
        return Err(AppError::bad_request(format!(
            "Title must be at least {} characters",
            MIN_TITLE_LEN
        )));
    }
    if content.chars().count() < MIN_CONTENT_LEN {
        return Err(AppError::bad_request(format!(
            "Content must be at least {} characters",
            MIN_CONTENT_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Queryable, Clone)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub status: String,
    pub category_id: Option<i32>,
    pub author_id: String,
    pub thumbnail: Option<Vec<u8>>,
    pub reading_time: Option<i32>,
    /// Set only the first time the post transitions into `published`.
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "posts"]
struct PostInsert {
    title: String,
    slug: String,
    content: String,
    excerpt: Option<String>,
    status: String,
    category_id: Option<i32>,
    author_id: String,
    thumbnail: Option<Vec<u8>>,
    reading_time: Option<i32>,
    published_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Everything needed to create a post in one call.
pub struct NewPostData {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub status: PostStatus,
    pub category_id: Option<i32>,
    pub tags: Vec<String>,
    pub thumbnail: Option<Vec<u8>>,
    pub images: Vec<Vec<u8>>,
}

/// Partial update; None fields keep their current value.
#[derive(Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<PostStatus>,
    pub category_id: Option<i32>,
    pub thumbnail: Option<Vec<u8>>,
    /// Some(_) replaces the tag set wholesale.
    pub tags: Option<Vec<String>>,
    /// Some(_) replaces the gallery wholesale.
    pub images: Option<Vec<Vec<u8>>>,
}

/// List filters and pagination resolved by the route layer.
pub struct PostListQuery {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub category_id: Option<i32>,
    pub tag_id: Option<i32>,
    pub status: Option<String>,
    pub author_id: Option<String>,
    pub sort: PostSort,
}

impl Post {
    /// Validates, derives the slug (rejecting collisions up front so no
    /// partial record is created) and inserts the post with its tags and
    /// gallery in one transaction.
    pub fn new(conn: &DbConn, author: &User, data: NewPostData) -> Result<Post, AppError> {
        validate_title_content(&data.title, &data.content)?;

        let slug = slugify(&data.title);
        if slug.is_empty() {
            return Err(AppError::bad_request(
                "Title must contain alphanumeric characters",
            ));
        }
        if Post::find_by_slug(conn, &slug).is_some() {
            return Err(AppError::conflict("A post with this slug already exists"));
        }

        let now = Utc::now().naive_utc();
        let published = data.status == PostStatus::Published;
        let to_insert = PostInsert {
            title: data.title.trim().to_string(),
            slug,
            reading_time: Some(estimate_reading_time(&data.content)),
            content: data.content,
            excerpt: data.excerpt,
            status: data.status.as_name().to_string(),
            category_id: data.category_id,
            author_id: author.id.clone(),
            thumbnail: data.thumbnail,
            published_at: if published { Some(now) } else { None },
            created_at: now,
            updated_at: now,
        };

        conn.transaction::<_, AppError, _>(|| {
            let post: Post = diesel::insert_into(posts::table)
                .values(&to_insert)
                .get_result(conn)?;
            Post::replace_tags(conn, post.id, &data.tags)?;
            if !data.images.is_empty() {
                PostImage::replace_for_post(conn, post.id, &data.images)?;
            }
            Ok(post)
        })
    }

    pub fn find_by_id(conn: &DbConn, post_id: i32) -> Option<Post> {
        posts::table
            .filter(posts::id.eq(post_id))
            .first::<Post>(conn)
            .ok()
    }

    pub fn find_by_slug(conn: &DbConn, post_slug: &str) -> Option<Post> {
        posts::table
            .filter(posts::slug.eq(post_slug))
            .first::<Post>(conn)
            .ok()
    }

    pub fn status(&self) -> PostStatus {
        PostStatus::from_name(&self.status).unwrap_or(PostStatus::Draft)
    }

    fn filtered(q: &PostListQuery) -> posts::BoxedQuery<'static, diesel::pg::Pg> {
        let mut query = posts::table.into_boxed();
        if let Some(status) = &q.status {
            query = query.filter(posts::status.eq(status.clone()));
        }
        if let Some(author) = &q.author_id {
            query = query.filter(posts::author_id.eq(author.clone()));
        }
        if let Some(category) = q.category_id {
            query = query.filter(posts::category_id.eq(category));
        }
        if let Some(tag) = q.tag_id {
            query = query.filter(
                posts::id.eq_any(
                    post_tags::table
                        .filter(post_tags::tag_id.eq(tag))
                        .select(post_tags::post_id),
                ),
            );
        }
        if let Some(search) = &q.search {
            let pattern = format!("%{}%", search);
            query = query.filter(
                posts::title
                    .ilike(pattern.clone())
                    .or(posts::content.ilike(pattern.clone()))
                    .or(posts::author_id.eq_any(
                        users::table
                            .filter(users::username.ilike(pattern))
                            .select(users::id),
                    )),
            );
        }
        query
    }

    /// Filtered, sorted, paginated listing plus the total match count.
    /// Engagement sorts order by a correlated count subquery, so pagination
    /// stays in SQL.
    pub fn list(conn: &DbConn, q: &PostListQuery) -> Result<(Vec<Post>, i64), AppError> {
        let total: i64 = Post::filtered(q).count().get_result(conn)?;

        let query = match q.sort {
            // TODO: order popular by summed bucket views once the analytics
            // table grows an index usable for it; until then it falls back
            // to newest.
            PostSort::Newest | PostSort::Popular => {
                Post::filtered(q).order(posts::created_at.desc())
            }
            PostSort::Oldest => Post::filtered(q).order(posts::created_at.asc()),
            PostSort::Liked => Post::filtered(q)
                .order(
                    sql::<BigInt>(
                        "(select count(*) from likes where likes.post_id = posts.id)",
                    )
                    .desc(),
                )
                .then_order_by(posts::created_at.desc()),
            PostSort::Commented => Post::filtered(q)
                .order(
                    sql::<BigInt>(
                        "(select count(*) from comments where comments.post_id = posts.id)",
                    )
                    .desc(),
                )
                .then_order_by(posts::created_at.desc()),
        };

        let items = query
            .offset((q.page - 1) * q.limit)
            .limit(q.limit)
            .load::<Post>(conn)?;

        Ok((items, total))
    }

    /// Applies a partial update. Retitling re-derives the slug with a
    /// collision check; tags and gallery images are replaced wholesale when
    /// present. Everything runs inside one transaction.
    pub fn edit(&self, conn: &DbConn, changes: PostChanges) -> Result<Post, AppError> {
        let title = match &changes.title {
            Some(t) => t.trim().to_string(),
            None => self.title.clone(),
        };
        let content = changes.content.clone().unwrap_or_else(|| self.content.clone());
        validate_title_content(&title, &content)?;

        let slug = if changes.title.is_some() {
            let slug = slugify(&title);
            if slug.is_empty() {
                return Err(AppError::bad_request(
                    "Title must contain alphanumeric characters",
                ));
            }
            match Post::find_by_slug(conn, &slug) {
                Some(existing) if existing.id != self.id => {
                    return Err(AppError::conflict(
                        "A post with this slug already exists",
                    ))
                }
                _ => slug,
            }
        } else {
            self.slug.clone()
        };

        let status = changes.status.unwrap_or_else(|| self.status());
        let now = Utc::now().naive_utc();
        let published_at = match (status, self.published_at) {
            (PostStatus::Published, None) => Some(now),
            (_, existing) => existing,
        };
        let reading_time = if changes.content.is_some() {
            Some(estimate_reading_time(&content))
        } else {
            self.reading_time
        };

        conn.transaction::<_, AppError, _>(|| {
            let updated: Post = diesel::update(posts::table.filter(posts::id.eq(self.id)))
                .set((
                    posts::title.eq(&title),
                    posts::slug.eq(&slug),
                    posts::content.eq(&content),
                    posts::excerpt
                        .eq(changes.excerpt.clone().or_else(|| self.excerpt.clone())),
                    posts::status.eq(status.as_name()),
                    posts::category_id.eq(changes.category_id.or(self.category_id)),
                    posts::thumbnail
                        .eq(changes.thumbnail.clone().or_else(|| self.thumbnail.clone())),
                    posts::reading_time.eq(reading_time),
                    posts::published_at.eq(published_at),
                    posts::updated_at.eq(now),
                ))
                .get_result(conn)?;

            if let Some(tags) = &changes.tags {
                Post::replace_tags(conn, self.id, tags)?;
            }
            if let Some(images) = &changes.images {
                PostImage::replace_for_post(conn, self.id, images)?;
            }
            Ok(updated)
        })
    }

    /// Wholesale tag replacement: drop every link, then find-or-create each
    /// named tag and relink.
    fn replace_tags(conn: &DbConn, post_id: i32, names: &[String]) -> Result<(), AppError> {
        diesel::delete(post_tags::table.filter(post_tags::post_id.eq(post_id)))
            .execute(conn)?;
        let mut seen: Vec<String> = Vec::new();
        for name in names {
            let tag = Tag::find_or_create(conn, name)?;
            if seen.contains(&tag.slug) {
                continue;
            }
            seen.push(tag.slug.clone());
            diesel::insert_into(post_tags::table)
                .values((
                    post_tags::post_id.eq(post_id),
                    post_tags::tag_id.eq(tag.id),
                ))
                .execute(conn)?;
        }
        Ok(())
    }

    pub fn tag_names(&self, conn: &DbConn) -> Result<Vec<String>, AppError> {
        let tag_ids: Vec<i32> = post_tags::table
            .filter(post_tags::post_id.eq(self.id))
            .select(post_tags::tag_id)
            .load(conn)?;
        let names = crate::schema::tags::table
            .filter(crate::schema::tags::id.eq_any(tag_ids))
            .select(crate::schema::tags::name)
            .load::<String>(conn)?;
        Ok(names)
    }

    /// Hard delete of the post and every dependent row. Callers wrap this in
    /// a transaction when it has to be atomic with other work.
    pub fn delete_cascade(conn: &DbConn, post_id: i32) -> Result<(), AppError> {
        diesel::delete(post_tags::table.filter(post_tags::post_id.eq(post_id)))
            .execute(conn)?;
        diesel::delete(comments::table.filter(comments::post_id.eq(post_id)))
            .execute(conn)?;
        diesel::delete(likes::table.filter(likes::post_id.eq(post_id))).execute(conn)?;
        diesel::delete(post_analytics::table.filter(post_analytics::post_id.eq(post_id)))
            .execute(conn)?;
        diesel::delete(post_images::table.filter(post_images::post_id.eq(post_id)))
            .execute(conn)?;
        diesel::delete(posts::table.filter(posts::id.eq(post_id))).execute(conn)?;
        Ok(())
    }

    pub fn count_by_author(conn: &DbConn, author: &str) -> Result<i64, AppError> {
        let count = posts::table
            .filter(posts::author_id.eq(author))
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
    use crate::database::models::like::Like;
    use crate::database::models::test_support;

    fn sample_post(title: &str) -> NewPostData {
        NewPostData {
            title: title.to_string(),
            content: "Plenty of content to satisfy the minimum length check.".to_string(),
            excerpt: None,
            status: PostStatus::Published,
            category_id: None,
            tags: Vec::new(),
            thumbnail: None,
            images: Vec::new(),
        }
    }

    fn sample_author(conn: &DbConn) -> User {
        User::new(
            conn,
            &format!("{}@example.com", Uuid::new_v4()),
            "post-model-author",
            "longenoughpassword",
            Role::Admin,
            None,
        )
        .unwrap()
    }

    #[test]
    fn duplicate_slug_is_rejected_without_partial_rows() {
        let conn = match test_support::checkout() {
            Some(conn) => conn,
            None => return,
        };
        let author = sample_author(&conn);
        let title = format!("Collision check {}", Uuid::new_v4());

        let first = Post::new(&conn, &author, sample_post(&title)).unwrap();
        // Same slug after normalization, different raw title.
        let err = Post::new(&conn, &author, sample_post(&title.to_uppercase())).unwrap_err();
        assert_eq!(
            err,
            AppError::conflict("A post with this slug already exists")
        );

        let rows: i64 = posts::table
            .filter(posts::slug.eq(&first.slug))
            .count()
            .get_result(&conn)
            .unwrap();
        assert_eq!(rows, 1);

        author.delete(&conn).unwrap();
    }

    #[test]
    fn liked_sort_puts_most_liked_first() {
        let conn = match test_support::checkout() {
            Some(conn) => conn,
            None => return,
        };
        let author = sample_author(&conn);
        let quiet = Post::new(
            &conn,
            &author,
            sample_post(&format!("Quiet {}", Uuid::new_v4())),
        )
        .unwrap();
        let hot = Post::new(
            &conn,
            &author,
            sample_post(&format!("Hot {}", Uuid::new_v4())),
        )
        .unwrap();
        Like::toggle(&conn, &author.id, hot.id).unwrap();

        let query = PostListQuery {
            page: 1,
            limit: 50,
            search: None,
            category_id: None,
            tag_id: None,
            status: Some("published".to_string()),
            author_id: Some(author.id.clone()),
            sort: PostSort::Liked,
        };
        let (items, total) = Post::list(&conn, &query).unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].id, hot.id);
        assert_eq!(items[1].id, quiet.id);

        author.delete(&conn).unwrap();
    }

    #[test]
    fn slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust & Diesel -- a guide  "), "rust-diesel-a-guide");
    }

    #[test]
    fn slugify_is_stable_for_equivalent_titles() {
        // Titles normalizing to the same slug must collide at create time.
        assert_eq!(slugify("My First Post"), slugify("my first POST"));
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("Café über alles"), "caf-ber-alles");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn reading_time_never_below_one_minute() {
        assert_eq!(estimate_reading_time("a few words only"), 1);
        let long = "word ".repeat(401);
        assert_eq!(estimate_reading_time(&long), 3);
    }

    #[test]
    fn title_and_content_minimums() {
        assert!(validate_title_content("ab", "long enough content").is_err());
        assert!(validate_title_content("A valid title", "short").is_err());
        assert!(validate_title_content("A valid title", "long enough content").is_ok());
    }

    #[test]
    fn status_parsing_is_closed() {
        assert_eq!(PostStatus::from_name("published"), Some(PostStatus::Published));
        assert_eq!(PostStatus::from_name("deleted"), None);
        for status in [PostStatus::Draft, PostStatus::Published, PostStatus::Archived] {
            assert_eq!(PostStatus::from_name(status.as_name()), Some(status));
        }
    }

    #[test]
    fn sort_parsing_is_closed() {
        assert_eq!(PostSort::from_name("liked"), Some(PostSort::Liked));
        assert_eq!(PostSort::from_name("views"), None);
    }
}
