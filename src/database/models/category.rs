use diesel::prelude::*;
use serde::Serialize;

use crate::app::{AppError, DbConn};
use crate::database::models::post::slugify;
use crate::schema::{categories, posts};

#[derive(Debug, Queryable, Clone, Serialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Insertable)]
#[table_name = "categories"]
struct CategoryInsert {
    name: String,
    slug: String,
    color: String,
}

impl Category {
    pub fn new(conn: &DbConn, name: &str, color: &str) -> Result<Category, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("Category name is required"));
        }
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::bad_request(
                "Category name must contain alphanumeric characters",
            ));
        }
        if Category::find_by_slug(conn, &slug).is_some() {
            return Err(AppError::conflict("A category with this slug already exists"));
        }

        let created: Category = diesel::insert_into(categories::table)
            .values(&CategoryInsert {
                name: name.to_string(),
                slug,
                color: color.trim().to_string(),
            })
            .get_result(conn)?;
        Ok(created)
    }

    pub fn find_by_id(conn: &DbConn, category_id: i32) -> Option<Category> {
        categories::table
            .filter(categories::id.eq(category_id))
            .first::<Category>(conn)
            .ok()
    }

    pub fn find_by_slug(conn: &DbConn, category_slug: &str) -> Option<Category> {
        categories::table
            .filter(categories::slug.eq(category_slug))
            .first::<Category>(conn)
            .ok()
    }

    pub fn list(conn: &DbConn) -> Result<Vec<Category>, AppError> {
        let all = categories::table
            .order(categories::name.asc())
            .load::<Category>(conn)?;
        Ok(all)
    }

    pub fn post_count(&self, conn: &DbConn) -> Result<i64, AppError> {
        let count = posts::table
            .filter(posts::category_id.eq(self.id))
            .count()
            .get_result(conn)?;
        Ok(count)
    }

    /// Renames and recolors; a rename re-derives the slug with a collision
    /// check against the other categories.
    pub fn edit(
        &self,
        conn: &DbConn,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<Category, AppError> {
        let name = name.map(str::trim).unwrap_or(&self.name);
        if name.is_empty() {
            return Err(AppError::bad_request("Category name is required"));
        }
        let slug = slugify(name);
        match Category::find_by_slug(conn, &slug) {
            Some(existing) if existing.id != self.id => {
                return Err(AppError::conflict(
                    "A category with this slug already exists",
                ))
            }
            _ => {}
        }

        let updated: Category =
            diesel::update(categories::table.filter(categories::id.eq(self.id)))
                .set((
                    categories::name.eq(name),
                    categories::slug.eq(&slug),
                    categories::color.eq(color.unwrap_or(&self.color).trim()),
                ))
                .get_result(conn)?;
        Ok(updated)
    }

    /// Deletes the category; posts that referenced it are detached, not
    /// deleted.
    pub fn delete(&self, conn: &DbConn) -> Result<(), AppError> {
        conn.transaction::<_, AppError, _>(|| {
            diesel::update(posts::table.filter(posts::category_id.eq(self.id)))
                .set(posts::category_id.eq::<Option<i32>>(None))
                .execute(conn)?;
            diesel::delete(categories::table.filter(categories::id.eq(self.id)))
                .execute(conn)?;
            Ok(())
        })
    }
}
