use http::header::{
    HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, AUTHORIZATION, CONTENT_TYPE,
};
use oauth2::AccessToken;

pub const MIME_TYPE_JSON: &str = "application/json";
pub const MIME_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

pub const BEARER: &str = "Bearer";

pub fn header_starts_with_ignoring_case(header: &HeaderValue, expected_start: &str) -> bool {
    header
        .to_str()
        .ok()
        .filter(|ct| ct.to_lowercase().starts_with(&expected_start.to_lowercase()))
        .is_some()
}

// Media types are case insensitive and may carry parameters (e.g., charset), so only the prefix
// is compared.
pub fn has_content_type(headers: &HeaderMap, content_type: &str) -> bool {
    headers
        .get(CONTENT_TYPE)
        .map_or(false, |value| header_starts_with_ignoring_case(value, content_type))
}

// The error deliberately carries no detail, since the header value holds the token.
pub fn auth_bearer(
    access_token: &AccessToken,
) -> Result<(HeaderName, HeaderValue), InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("{} {}", BEARER, access_token.secret()))?;
    value.set_sensitive(true);
    Ok((AUTHORIZATION, value))
}
