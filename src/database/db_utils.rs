use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use dotenv::dotenv;
use std::{env, sync::Arc};

/// Builds the postgres connection pool.
/// Falls back to the `DATABASE_URL` environment variable when no url is given.
///
/// # Example
/// ```
/// let pool = psql_connect_to_db(None);
/// ```
pub fn psql_connect_to_db(
    database_url: Option<&str>,
) -> Arc<Pool<ConnectionManager<PgConnection>>> {
    dotenv().ok();

    let url = match database_url {
        Some(url) => url.to_string(),
        None => env::var("DATABASE_URL")
            .expect("Environment variable 'DATABASE_URL' not set"),
    };

    let manager = ConnectionManager::<PgConnection>::new(url);
    Arc::new(
        Pool::builder()
            .build(manager)
            .expect("Error building database pool"),
    )
}
