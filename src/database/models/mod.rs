pub mod analytics;
pub mod audit;
pub mod category;
pub mod comment;
pub mod like;
pub mod post;
pub mod post_image;
pub mod tag;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::app::DbConn;
    use crate::database::db_utils::psql_connect_to_db;

    /// Checks out a live connection when `DATABASE_URL` is configured.
    /// Tests that need real storage skip themselves when it is not.
    pub fn checkout() -> Option<DbConn> {
        dotenv::dotenv().ok();
        std::env::var("DATABASE_URL").ok()?;
        psql_connect_to_db(None).get().ok()
    }
}
