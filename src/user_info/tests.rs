use crate::id_token::IdTokenClaims;
use crate::types::SubjectIdentifier;
use crate::user_info::{ExtensionClaimError, Profile, ProfileName, UserInfoError, UserInfoRequest};
use crate::{AccessToken, HttpRequest, HttpResponse, UserInfoUrl};

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("connection refused")]
struct MockTransportError;

type TestUserInfoError = UserInfoError<MockTransportError>;

fn subject(id: &str) -> SubjectIdentifier {
    SubjectIdentifier::new(id.to_string())
}

fn user_info_url() -> UserInfoUrl {
    UserInfoUrl::new("https://example/userinfo".to_string()).unwrap()
}

#[test]
fn test_profile_from_user_info() {
    let body = br#"{
        "sub": "248289761001",
        "name": "Jane Doe",
        "given_name": "Jane",
        "family_name": "Doe",
        "email": "janedoe@example.com"
    }"#;

    let profile =
        Profile::from_user_info::<MockTransportError>(body, Some(&subject("248289761001")))
            .unwrap();
    assert_eq!(profile.id().as_str(), "248289761001");
    assert_eq!(profile.display_name(), Some("Jane Doe"));
    assert_eq!(
        *profile.name(),
        ProfileName {
            family_name: Some("Doe".to_string()),
            given_name: Some("Jane".to_string()),
            middle_name: None,
        }
    );
    assert_eq!(profile.raw(), Some(std::str::from_utf8(body).unwrap()));
    assert_eq!(profile.json()["email"], json!("janedoe@example.com"));
    assert!(profile.extensions().is_empty());

    assert_eq!(
        serde_json::to_value(&profile).unwrap()["name"],
        json!({ "familyName": "Doe", "givenName": "Jane" })
    );
}

#[test]
fn test_profile_subject() {
    // Legacy `user_id`, numeric.
    let profile =
        Profile::from_user_info::<MockTransportError>(br#"{"user_id": 42}"#, None).unwrap();
    assert_eq!(profile.id().as_str(), "42");

    // No subject in the response: the verified subject is used.
    let profile =
        Profile::from_user_info::<MockTransportError>(br#"{"name": "x"}"#, Some(&subject("u1")))
            .unwrap();
    assert_eq!(profile.id().as_str(), "u1");

    match Profile::from_user_info::<MockTransportError>(br#"{"name": "x"}"#, None) {
        Err(UserInfoError::MissingSubject) => {}
        other => panic!("unexpected result: {:?}", other),
    }

    match Profile::from_user_info::<MockTransportError>(
        br#"{"sub": "someone-else"}"#,
        Some(&subject("u1")),
    ) {
        Err(err @ UserInfoError::SubjectMismatch { .. }) => assert_eq!(
            err.to_string(),
            "UserInfo subject `someone-else` does not match ID token subject `u1`"
        ),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_profile_parse_errors() {
    for body in [&b"not json"[..], &b"[1, 2]"[..], &b""[..]] {
        match Profile::from_user_info::<MockTransportError>(body, Some(&subject("u1"))) {
            Err(UserInfoError::Parse(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

fn claims(value: serde_json::Value) -> IdTokenClaims {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_profile_from_claims() {
    let claims = claims(json!({
        "iss": "https://accounts.example.com",
        "sub": "u1",
        "name": "Jane Doe",
        "middle_name": "Q",
        "ext": "{\"tenant\":\"acme\",\"roles\":[\"admin\"]}",
    }));

    let profile = Profile::from_claims(&subject("u1"), &claims).unwrap();
    assert_eq!(profile.id().as_str(), "u1");
    assert_eq!(profile.display_name(), Some("Jane Doe"));
    assert_eq!(profile.name().middle_name.as_deref(), Some("Q"));
    assert_eq!(profile.raw(), None);
    assert_eq!(profile.json()["iss"], json!("https://accounts.example.com"));
    assert_eq!(profile.extensions().get("tenant"), Some(&json!("acme")));

    // Extension fields are flattened into the serialized profile.
    let serialized = serde_json::to_value(&profile).unwrap();
    assert_eq!(serialized["id"], json!("u1"));
    assert_eq!(serialized["displayName"], json!("Jane Doe"));
    assert_eq!(serialized["tenant"], json!("acme"));
    assert_eq!(serialized["roles"], json!(["admin"]));
    assert_eq!(serialized.get("_raw"), None);
}

#[test]
fn test_profile_extension_claim() {
    // An object is accepted as-is.
    let profile = Profile::from_claims(
        &subject("u1"),
        &claims(json!({ "sub": "u1", "ext": { "tenant": "acme" } })),
    )
    .unwrap();
    assert_eq!(profile.extensions().get("tenant"), Some(&json!("acme")));

    // Extension fields cannot replace the verified identity.
    let profile = Profile::from_claims(
        &subject("u1"),
        &claims(json!({ "sub": "u1", "ext": { "id": "admin", "displayName": "Root" } })),
    )
    .unwrap();
    assert!(profile.extensions().is_empty());
    assert_eq!(serde_json::to_value(&profile).unwrap()["id"], json!("u1"));

    match Profile::from_claims(&subject("u1"), &claims(json!({ "sub": "u1", "ext": "{" }))) {
        Err(ExtensionClaimError::Parse(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    match Profile::from_claims(&subject("u1"), &claims(json!({ "sub": "u1", "ext": "[1]" }))) {
        Err(ExtensionClaimError::NotAnObject("array")) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    match Profile::from_claims(&subject("u1"), &claims(json!({ "sub": "u1", "ext": 7 }))) {
        Err(ExtensionClaimError::NotAnObject("number")) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_prepare_request() {
    let request = UserInfoRequest::new(user_info_url(), AccessToken::new("abc".to_string()));
    let http_request = request.prepare_request().unwrap();

    assert_eq!(*http_request.method(), Method::GET);
    assert_eq!(http_request.uri(), "https://example/userinfo");
    assert_eq!(http_request.headers()[AUTHORIZATION], "Bearer abc");
    assert_eq!(http_request.headers()[ACCEPT], "application/json");
    assert!(http_request.body().is_empty());

    // The access token never ends up in the Debug output.
    assert!(!format!("{:?}", request).contains("abc"));
}

#[tokio::test]
async fn test_request_async() {
    let http_client = |request: HttpRequest| {
        let authorized = request
            .headers()
            .get(AUTHORIZATION)
            .map_or(false, |value| value == "Bearer abc");
        std::future::ready(Ok::<HttpResponse, MockTransportError>(
            http::Response::builder()
                .status(if authorized {
                    StatusCode::OK
                } else {
                    StatusCode::UNAUTHORIZED
                })
                .header(CONTENT_TYPE, "text/plain")
                .body(br#"{"sub":"u1","name":"Jane"}"#.to_vec())
                .unwrap(),
        ))
    };

    // A mislabelled JSON body is still accepted.
    let profile = UserInfoRequest::new(user_info_url(), AccessToken::new("abc".to_string()))
        .require_subject(subject("u1"))
        .request_async(&http_client)
        .await
        .unwrap();
    assert_eq!(profile.id().as_str(), "u1");
    assert_eq!(profile.display_name(), Some("Jane"));

    let result: Result<Profile, TestUserInfoError> =
        UserInfoRequest::new(user_info_url(), AccessToken::new("wrong".to_string()))
            .request_async(&http_client)
            .await;
    match result {
        Err(UserInfoError::Response(status, _, message)) => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(
                message,
                "HTTP status code 401 Unauthorized at https://example/userinfo"
            );
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let failing_client =
        |_: HttpRequest| std::future::ready(Err::<HttpResponse, _>(MockTransportError));
    match UserInfoRequest::new(user_info_url(), AccessToken::new("abc".to_string()))
        .request_async(&failing_client)
        .await
    {
        Err(UserInfoError::Request(MockTransportError)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}
