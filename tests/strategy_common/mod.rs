#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use oidc_strategy::{
    AuthenticateOptions, AuthenticationError, AuthenticationOutcome, BoxError, BoxFuture,
    CallbackRequest, HttpRequest, HttpResponse, ProfileArgs, Strategy, StrategyOptions,
    TokenRequest, TokenResponse, Verdict, VerifyCallback,
};
use serde_json::json;
use sha2::Sha256;
use thiserror::Error;
use url::Url;

use std::cell::RefCell;
use std::future::Ready;
use std::sync::Once;

pub const TEST_ISSUER: &str = "https://idp.example";
pub const TEST_CLIENT_ID: &str = "client-123";
pub const TEST_CLIENT_SECRET: &str = "secret-456";
pub const TEST_NOW: i64 = 1_000_000;

static INIT_LOG: Once = Once::new();

thread_local! {
    static TEST_ID: RefCell<&'static str> = RefCell::new("UNINITIALIZED_TEST_ID");
}

pub fn get_test_id() -> &'static str {
    TEST_ID.with(|id| *id.borrow())
}

pub fn set_test_id(test_id: &'static str) {
    TEST_ID.with(|id| *id.borrow_mut() = test_id);
}

#[macro_export]
macro_rules! log_debug {
    ($($args:tt)+) => {
        log::debug!("[{}] {}", strategy_common::get_test_id(), format!($($args)+));
    }
}

pub fn init_log(test_id: &'static str) {
    INIT_LOG.call_once(env_logger::init);
    set_test_id(test_id);
}

#[derive(Debug, Error)]
#[error("mock transport failure")]
pub struct MockError;

pub type TestOutcome =
    Result<AuthenticationOutcome<String>, AuthenticationError<MockError, MockError>>;

pub fn claims() -> serde_json::Value {
    json!({
        "iss": TEST_ISSUER,
        "sub": "u1",
        "aud": TEST_CLIENT_ID,
        "exp": TEST_NOW + 600,
        "iat": TEST_NOW - 60,
    })
}

fn encode_segment(value: &serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string())
}

/// A compact ID token declaring no signature algorithm.
pub fn unsigned_id_token(claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.",
        encode_segment(&json!({ "typ": "JWT" })),
        encode_segment(claims)
    )
}

/// A compact ID token declaring `alg` with a signature that verifies under no key.
pub fn id_token_with_alg(alg: &str, claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.{}",
        encode_segment(&json!({ "alg": alg, "typ": "JWT" })),
        encode_segment(claims),
        URL_SAFE_NO_PAD.encode(b"not a signature")
    )
}

/// A compact ID token MACed with the test client secret.
pub fn hs256_id_token(claims: &serde_json::Value) -> String {
    let signing_input = format!(
        "{}.{}",
        encode_segment(&json!({ "alg": "HS256", "typ": "JWT" })),
        encode_segment(claims)
    );
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_CLIENT_SECRET.as_bytes()).unwrap();
    mac.update(signing_input.as_bytes());
    format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    )
}

pub fn options() -> StrategyOptions {
    serde_json::from_value(json!({
        "authorization_url": "https://idp.example/authorize",
        "token_url": "https://idp.example/token",
        "issuer": TEST_ISSUER,
        "client_id": TEST_CLIENT_ID,
        "client_secret": TEST_CLIENT_SECRET,
        "callback_url": "https://app.example/auth/callback",
        "skip_user_profile": true,
    }))
    .unwrap()
}

pub fn offline_http_client(_: HttpRequest) -> Ready<Result<HttpResponse, MockError>> {
    std::future::ready(Err(MockError))
}

/// Token exchange answering every request with `access_token` and `id_token`.
pub fn issue_tokens(
    access_token: &'static str,
    id_token: String,
) -> impl Fn(TokenRequest) -> Ready<Result<TokenResponse, MockError>> {
    move |_| {
        std::future::ready(
            TokenResponse::from_params(
                json!({
                    "access_token": access_token,
                    "token_type": "Bearer",
                    "id_token": id_token,
                })
                .as_object()
                .unwrap()
                .clone(),
            )
            .ok_or(MockError),
        )
    }
}

/// Accepts every identity as its profile ID.
pub fn accept_profile_id() -> VerifyCallback<String> {
    VerifyCallback::profile(
        |args: ProfileArgs| -> BoxFuture<Result<Verdict<String>, BoxError>> {
            Box::pin(std::future::ready(Ok(Verdict::accept(
                args.profile.id().to_string(),
            ))))
        },
    )
}

/// Run one callback request carrying `code` through a strategy whose token endpoint returns
/// `access_token` and `id_token`.
pub async fn authenticate(access_token: &'static str, id_token: String) -> TestOutcome {
    let strategy = Strategy::with_token_exchange(
        options(),
        issue_tokens(access_token, id_token),
        offline_http_client,
        accept_profile_id(),
    )
    .unwrap()
    .set_time_fn(|| Utc.timestamp_opt(TEST_NOW, 0).unwrap());

    let request = CallbackRequest::from_url(
        Url::parse("https://app.example/auth/callback?code=code-1&state=s1").unwrap(),
    );
    strategy
        .authenticate(&request, &AuthenticateOptions::default())
        .await
}
