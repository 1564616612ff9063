use crate::helpers::value_kind;
use crate::http_utils::{auth_bearer, MIME_TYPE_JSON};
use crate::id_token::IdTokenClaims;
use crate::types::SubjectIdentifier;
use crate::{AccessToken, AsyncHttpClient, HttpRequest, HttpResponse, UserInfoUrl};

use http::header::{HeaderValue, ACCEPT};
use http::method::Method;
use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

use std::future::Future;

#[cfg(test)]
mod tests;

// Profile fields that extension claims may not overwrite.
const RESERVED_PROFILE_FIELDS: [&str; 5] = ["id", "displayName", "name", "_raw", "_json"];

/// Name components of an end-user.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileName {
    /// Surname(s) (`family_name`).
    pub family_name: Option<String>,
    /// Given name(s) (`given_name`).
    pub given_name: Option<String>,
    /// Middle name(s) (`middle_name`).
    pub middle_name: Option<String>,
}

/// Normalized identity record handed to the verify callback.
///
/// Built either from the UserInfo response or from the ID token claims, and only after the ID
/// token has been fully verified. Serializes to the conventional shape
/// (`id`, `displayName`, `name`, `_raw`, `_json`) with extension fields at the top level.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Profile {
    id: SubjectIdentifier,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    name: ProfileName,
    #[serde(rename = "_raw")]
    raw: Option<String>,
    #[serde(rename = "_json")]
    json: serde_json::Value,
    #[serde(flatten)]
    extensions: serde_json::Map<String, serde_json::Value>,
}
impl Profile {
    /// Build a profile from a UserInfo response body.
    ///
    /// The subject is taken from `sub`, falling back to `user_id`, and finally to
    /// `expected_subject`. When the response names a subject, it must equal `expected_subject`.
    pub fn from_user_info<RE>(
        body: &[u8],
        expected_subject: Option<&SubjectIdentifier>,
    ) -> Result<Self, UserInfoError<RE>>
    where
        RE: std::error::Error + 'static,
    {
        let json: serde_json::Map<String, serde_json::Value> =
            serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(body))
                .map_err(UserInfoError::Parse)?;

        let id = match (subject_field(&json), expected_subject) {
            (Some(found), Some(expected)) if found != **expected => {
                return Err(UserInfoError::SubjectMismatch {
                    expected: expected.clone(),
                    found: SubjectIdentifier::new(found),
                });
            }
            (Some(found), _) => SubjectIdentifier::new(found),
            (None, Some(expected)) => expected.clone(),
            (None, None) => return Err(UserInfoError::MissingSubject),
        };

        Ok(Self {
            id,
            display_name: string_field(&json, "name"),
            name: name_from(&json),
            raw: Some(String::from_utf8_lossy(body).into_owned()),
            json: serde_json::Value::Object(json),
            extensions: serde_json::Map::new(),
        })
    }

    /// Build a profile from verified ID token claims.
    ///
    /// The `ext` claim, when present, is a JSON object (or a string holding one) whose fields
    /// become extension fields of the profile.
    pub fn from_claims(
        subject: &SubjectIdentifier,
        claims: &IdTokenClaims,
    ) -> Result<Self, ExtensionClaimError> {
        let json = serde_json::to_value(claims).map_err(ExtensionClaimError::Serialize)?;
        let extensions = match claims.additional_claims().get("ext") {
            None | Some(serde_json::Value::Null) => serde_json::Map::new(),
            Some(ext) => extension_fields(ext)?,
        };

        let fields = json.as_object();
        Ok(Self {
            id: subject.clone(),
            display_name: fields.and_then(|fields| string_field(fields, "name")),
            name: fields.map(name_from).unwrap_or_default(),
            raw: None,
            json,
            extensions,
        })
    }

    /// The end-user's subject identifier.
    pub fn id(&self) -> &SubjectIdentifier {
        &self.id
    }

    /// The end-user's full name (`name`).
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// The end-user's name components.
    pub fn name(&self) -> &ProfileName {
        &self.name
    }

    /// The raw UserInfo response body (absent for profiles built from ID token claims).
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// The parsed UserInfo response, or the ID token claims.
    pub fn json(&self) -> &serde_json::Value {
        &self.json
    }

    /// Provider extension fields taken from the `ext` claim.
    pub fn extensions(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extensions
    }
}

fn string_field(json: &serde_json::Map<String, serde_json::Value>, name: &str) -> Option<String> {
    json.get(name)
        .and_then(|value| value.as_str())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// Numeric identifiers are accepted, as they are in ID tokens.
fn subject_field(json: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    ["sub", "user_id"].iter().find_map(|name| match json.get(*name) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn name_from(json: &serde_json::Map<String, serde_json::Value>) -> ProfileName {
    ProfileName {
        family_name: string_field(json, "family_name"),
        given_name: string_field(json, "given_name"),
        middle_name: string_field(json, "middle_name"),
    }
}

fn extension_fields(
    ext: &serde_json::Value,
) -> Result<serde_json::Map<String, serde_json::Value>, ExtensionClaimError> {
    let parsed;
    let ext = match ext {
        serde_json::Value::String(encoded) => {
            parsed = serde_json::from_str::<serde_json::Value>(encoded)
                .map_err(ExtensionClaimError::Parse)?;
            &parsed
        }
        other => other,
    };
    let fields = ext
        .as_object()
        .ok_or_else(|| ExtensionClaimError::NotAnObject(value_kind(ext)))?;

    Ok(fields
        .iter()
        .filter(|(name, _)| {
            let reserved = RESERVED_PROFILE_FIELDS.contains(&name.as_str());
            if reserved {
                log::debug!("Ignoring reserved profile field `{}` in `ext` claim", name);
            }
            !reserved
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect())
}

/// Error building a profile from the `ext` claim.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtensionClaimError {
    /// The `ext` claim is a string but not valid JSON.
    #[error("Failed to parse `ext` claim")]
    Parse(#[source] serde_json::Error),
    /// The `ext` claim is not a JSON object.
    #[error("Invalid `ext` claim: expected a JSON object, found {0}")]
    NotAnObject(&'static str),
    /// The claims could not be re-serialized.
    #[error("Failed to serialize claims")]
    Serialize(#[source] serde_json::Error),
}

/// A request to the UserInfo endpoint.
///
/// The access token is sent as a bearer credential in the `Authorization` header, never in the
/// query string.
#[derive(Clone, Debug)]
pub struct UserInfoRequest {
    access_token: AccessToken,
    expected_subject: Option<SubjectIdentifier>,
    url: UserInfoUrl,
}
impl UserInfoRequest {
    /// Request the profile of the user `access_token` was issued for.
    pub fn new(url: UserInfoUrl, access_token: AccessToken) -> Self {
        Self {
            access_token,
            expected_subject: None,
            url,
        }
    }

    /// Requires the response to describe `subject` (typically the verified ID token subject).
    pub fn require_subject(mut self, subject: SubjectIdentifier) -> Self {
        self.expected_subject = Some(subject);
        self
    }

    /// Submits this request asynchronously using the specified HTTP client.
    ///
    /// Any `200 OK` body is parsed as JSON whatever its `Content-Type`, since providers mislabel
    /// UserInfo responses.
    pub fn request_async<'c, C>(
        self,
        http_client: &'c C,
    ) -> impl Future<Output = Result<Profile, UserInfoError<<C as AsyncHttpClient<'c>>::Error>>>
           + 'c
    where
        C: AsyncHttpClient<'c>,
    {
        Box::pin(async move {
            log::debug!("Fetching user profile from {}", self.url.as_str());
            let http_request = self.prepare_request().map_err(UserInfoError::Other)?;
            let http_response = http_client
                .call(http_request)
                .await
                .map_err(UserInfoError::Request)?;
            self.user_info_response(http_response)
        })
    }

    fn prepare_request(&self) -> Result<HttpRequest, String> {
        let (auth_header, auth_value) = auth_bearer(&self.access_token)
            .map_err(|_| "access token is not a valid header value".to_string())?;
        http::Request::builder()
            .uri(self.url.as_str())
            .method(Method::GET)
            .header(ACCEPT, HeaderValue::from_static(MIME_TYPE_JSON))
            .header(auth_header, auth_value)
            .body(Vec::new())
            .map_err(|err| format!("failed to prepare request: {err}"))
    }

    fn user_info_response<RE>(
        &self,
        http_response: HttpResponse,
    ) -> Result<Profile, UserInfoError<RE>>
    where
        RE: std::error::Error + 'static,
    {
        if http_response.status() != StatusCode::OK {
            return Err(UserInfoError::Response(
                http_response.status(),
                http_response.body().to_owned(),
                format!(
                    "HTTP status code {} at {}",
                    http_response.status(),
                    self.url.as_str()
                ),
            ));
        }

        Profile::from_user_info(http_response.body(), self.expected_subject.as_ref())
    }
}

/// Error fetching the end-user's profile.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserInfoError<RE>
where
    RE: std::error::Error + 'static,
{
    /// The response named no subject and none was expected.
    #[error("UserInfo response is missing a subject")]
    MissingSubject,
    /// An unexpected error occurred.
    #[error("Other error: {0}")]
    Other(String),
    /// Failed to parse server response.
    #[error("Failed to parse server response")]
    Parse(#[source] serde_path_to_error::Error<serde_json::Error>),
    /// An error occurred while sending the request or receiving the response (e.g., network
    /// connectivity failed).
    #[error("Request failed")]
    Request(#[source] RE),
    /// Server returned an invalid response.
    #[error("Server returned invalid response: {2}")]
    Response(StatusCode, Vec<u8>, String),
    /// The response describes a different end-user than the ID token.
    #[error("UserInfo subject `{found}` does not match ID token subject `{expected}`")]
    SubjectMismatch {
        /// Subject of the verified ID token.
        expected: SubjectIdentifier,
        /// Subject named by the UserInfo response.
        found: SubjectIdentifier,
    },
}
