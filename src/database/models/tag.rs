use diesel::prelude::*;
use serde::Serialize;

use crate::app::{AppError, DbConn};
use crate::database::models::post::slugify;
use crate::schema::{post_tags, tags};

#[derive(Debug, Queryable, Clone, Serialize)]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Insertable)]
#[table_name = "tags"]
struct TagInsert {
    name: String,
    slug: String,
}

impl Tag {
    /// Tags are created ad hoc from the post editor: an existing slug is
    /// reused, anything else becomes a new tag.
    pub fn find_or_create(conn: &DbConn, name: &str) -> Result<Tag, AppError> {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::bad_request(
                "Tag name must contain alphanumeric characters",
            ));
        }
        if let Some(existing) = Tag::find_by_slug(conn, &slug) {
            return Ok(existing);
        }

        let created: Tag = diesel::insert_into(tags::table)
            .values(&TagInsert {
                name: name.to_string(),
                slug,
            })
            .get_result(conn)?;
        Ok(created)
    }

    pub fn find_by_id(conn: &DbConn, tag_id: i32) -> Option<Tag> {
        tags::table
            .filter(tags::id.eq(tag_id))
            .first::<Tag>(conn)
            .ok()
    }

    pub fn find_by_slug(conn: &DbConn, tag_slug: &str) -> Option<Tag> {
        tags::table
            .filter(tags::slug.eq(tag_slug))
            .first::<Tag>(conn)
            .ok()
    }

    pub fn list(conn: &DbConn) -> Result<Vec<Tag>, AppError> {
        let all = tags::table.order(tags::name.asc()).load::<Tag>(conn)?;
        Ok(all)
    }

    /// Unlinks the tag from every post before removing it.
    pub fn delete(&self, conn: &DbConn) -> Result<(), AppError> {
        conn.transaction::<_, AppError, _>(|| {
            diesel::delete(post_tags::table.filter(post_tags::tag_id.eq(self.id)))
                .execute(conn)?;
            diesel::delete(tags::table.filter(tags::id.eq(self.id))).execute(conn)?;
            Ok(())
        })
    }
}
