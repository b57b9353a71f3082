pub mod admin;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod posts;
pub mod tags;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::app::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 50;

/// Normalizes user-supplied pagination: page is 1-based, the limit is capped.
pub fn clamp_page(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .max(1)
        .min(MAX_PAGE_SIZE);
    (page, limit)
}

/// Standard list envelope.
#[derive(Serialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Binary columns cross the JSON boundary as base64.
pub fn encode_bytes(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, AppError> {
    STANDARD
        .decode(value)
        .map_err(|_| AppError::bad_request(format!("Invalid base64 data in '{}'", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pagination_defaults_and_caps() {
        assert_eq!(clamp_page(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(clamp_page(Some(0), Some(0)), (1, 1));
        assert_eq!(clamp_page(Some(-3), Some(500)), (1, MAX_PAGE_SIZE));
        assert_eq!(clamp_page(Some(4), Some(25)), (4, 25));
    }

    #[test]
    fn base64_round_trip() {
        let bytes = vec![0u8, 159, 146, 150];
        let encoded = encode_bytes(&bytes);
        assert_eq!(decode_base64("thumbnail", &encoded).unwrap(), bytes);
    }

    #[test]
    fn invalid_base64_names_the_field() {
        let err = decode_base64("thumbnail", "!!!").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid base64 data in 'thumbnail'"
        );
    }
}
