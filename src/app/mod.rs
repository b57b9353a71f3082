use std::{fmt::Display, num::ParseIntError, sync::Arc};

use actix_web::{HttpResponse, ResponseError};
use diesel::{
    r2d2::{ConnectionManager, Pool, PooledConnection},
    PgConnection,
};

use crate::auth::token::Authenticator;
use crate::database::db_utils::psql_connect_to_db;

pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

/** Used for storing the database pool and the session signer when handling requests */
pub struct AppState {
    pub psql_pool: Arc<Pool<ConnectionManager<PgConnection>>>,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    pub fn new(database_url: Option<&str>) -> Self {
        Self {
            psql_pool: psql_connect_to_db(database_url),
            auth: Arc::new(Authenticator::from_env()),
        }
    }

    /// Checks out a pooled connection, mapping pool exhaustion to a 500.
    pub fn conn(&self) -> Result<DbConn, AppError> {
        self.psql_pool.get().map_err(|err| {
            log::error!("failed to check out database connection: {}", err);
            AppError::InternalServerError
        })
    }
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            psql_pool: self.psql_pool.clone(),
            auth: self.auth.clone(),
        }
    }
}

/** Holds the errors we will use during request processing */
#[derive(Debug, PartialEq)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    InternalServerError,
}

impl AppError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        AppError::Conflict(msg.into())
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg) => f.write_str(msg),
            AppError::Unauthorized => f.write_str("Unauthorized"),
            AppError::Forbidden => f.write_str("Forbidden"),
            AppError::NotFound(what) => write!(f, "{} not found", what),
            AppError::Conflict(msg) => f.write_str(msg),
            AppError::InternalServerError => f.write_str("Internal server error"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            AppError::BadRequest(_) => actix_web::http::StatusCode::BAD_REQUEST,
            AppError::Unauthorized => actix_web::http::StatusCode::UNAUTHORIZED,
            AppError::Forbidden => actix_web::http::StatusCode::FORBIDDEN,
            AppError::NotFound(_) => actix_web::http::StatusCode::NOT_FOUND,
            AppError::Conflict(_) => actix_web::http::StatusCode::CONFLICT,
            AppError::InternalServerError => {
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => AppError::not_found("Resource"),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => AppError::conflict("Duplicate record"),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                _,
            ) => AppError::bad_request("Referenced record does not exist"),
            _ => {
                log::error!("database error: {}", err);
                AppError::InternalServerError
            }
        }
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        log::error!("connection pool error: {}", err);
        AppError::InternalServerError
    }
}

impl From<ParseIntError> for AppError {
    fn from(_: ParseIntError) -> Self {
        AppError::bad_request("Invalid numeric parameter")
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Io => AppError::InternalServerError,
            _ => AppError::bad_request(format!("Invalid JSON body: {}", err)),
        }
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_codes_match_failure_class() {
        assert_eq!(
            AppError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::not_found("Post").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::conflict("slug taken").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InternalServerError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(AppError::not_found("Post").to_string(), "Post not found");
    }

    #[test]
    fn diesel_not_found_becomes_404() {
        let err: AppError = diesel::result::Error::NotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
