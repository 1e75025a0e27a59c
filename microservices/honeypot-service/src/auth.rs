//! `x-api-key` header enforcement.

use crate::error::Error;
use axum::http::HeaderMap;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Constant-time equality: always walks the full length of `expected` so a
/// wrong key doesn't leak how many leading bytes matched via timing.
fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

/// Returns the validated key on success; the exact `Error` variant drives
/// the 401 response body and matches the product's wording.
pub fn verify_api_key(headers: &HeaderMap, expected: &str) -> Result<(), Error> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::MissingApiKey)?;

    if !constant_time_eq(provided, expected) {
        return Err(Error::InvalidApiKey);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_rejected() {
        let headers = HeaderMap::new();
        assert!(matches!(verify_api_key(&headers, "secret"), Err(Error::MissingApiKey)));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        assert!(matches!(verify_api_key(&headers, "secret"), Err(Error::InvalidApiKey)));
    }

    #[test]
    fn matching_key_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(verify_api_key(&headers, "secret").is_ok());
    }
}
