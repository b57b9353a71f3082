use diesel::prelude::*;

use crate::app::{AppError, DbConn};
use crate::schema::post_images;

/// Gallery image owned by a post. The gallery is replaced wholesale on edit,
/// never diffed.
#[derive(Debug, Queryable, Clone)]
pub struct PostImage {
    pub id: i32,
    pub post_id: i32,
    pub data: Vec<u8>,
    pub position: i32,
}

#[derive(Insertable)]
#[table_name = "post_images"]
struct PostImageInsert {
    post_id: i32,
    data: Vec<u8>,
    position: i32,
}

impl PostImage {
    pub fn list_for_post(conn: &DbConn, post_id: i32) -> Result<Vec<PostImage>, AppError> {
        let images = post_images::table
            .filter(post_images::post_id.eq(post_id))
            .order(post_images::position.asc())
            .load::<PostImage>(conn)?;
        Ok(images)
    }

    /// Drops the current gallery and recreates it in the given order.
    pub fn replace_for_post(
        conn: &DbConn,
        post_id: i32,
        images: &[Vec<u8>],
    ) -> Result<(), AppError> {
        diesel::delete(post_images::table.filter(post_images::post_id.eq(post_id)))
            .execute(conn)?;
        for (position, data) in images.iter().enumerate() {
            diesel::insert_into(post_images::table)
                .values(&PostImageInsert {
                    post_id,
                    data: data.clone(),
                    position: position as i32,
                })
                .execute(conn)?;
        }
        Ok(())
    }
}
