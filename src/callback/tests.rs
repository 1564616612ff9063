use crate::callback::{
    BoxError, BoxFuture, ClaimsArgs, IdentityArgs, ProfileArgs, TokenParamsArgs, TokensArgs,
    Verdict, VerifiedIdentity, VerifyCallback,
};
use crate::id_token::IdTokenClaims;
use crate::strategy::CallbackRequest;
use crate::types::SubjectIdentifier;
use crate::user_info::Profile;
use crate::{AccessToken, RefreshToken};

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;

type Outcome = BoxFuture<Result<Verdict<String>, BoxError>>;

fn outcome(result: Result<Verdict<String>, BoxError>) -> Outcome {
    Box::pin(std::future::ready(result))
}

fn verified_identity() -> VerifiedIdentity {
    let subject = SubjectIdentifier::new("u1".to_string());
    let claims: IdTokenClaims = serde_json::from_value(json!({
        "iss": "https://idp.example",
        "sub": "u1",
        "name": "Jane",
    }))
    .unwrap();
    let mut params = serde_json::Map::new();
    params.insert("token_type".to_string(), json!("Bearer"));

    VerifiedIdentity {
        request: Some(CallbackRequest::from_url(
            Url::parse("https://app.example/callback?code=abc").unwrap(),
        )),
        issuer: "https://idp.example".to_string(),
        profile: Profile::from_claims(&subject, &claims).unwrap(),
        subject,
        claims,
        access_token: AccessToken::new("at".to_string()),
        refresh_token: Some(RefreshToken::new("rt".to_string())),
        params,
    }
}

#[tokio::test]
async fn test_dispatch_shapes() {
    let identity = VerifyCallback::identity(|args: IdentityArgs| {
        assert!(args.request.is_some());
        outcome(Ok(Verdict::accept(format!(
            "{}|{}",
            args.issuer, args.subject
        ))))
    });
    assert_eq!(
        identity.dispatch(verified_identity()).await.unwrap(),
        Verdict::accept("https://idp.example|u1".to_string())
    );

    let profile = VerifyCallback::profile(|args: ProfileArgs| {
        outcome(Ok(Verdict::accept(
            args.profile.display_name().unwrap_or_default().to_string(),
        )))
    });
    assert_eq!(
        profile.dispatch(verified_identity()).await.unwrap(),
        Verdict::accept("Jane".to_string())
    );

    let tokens = VerifyCallback::tokens(|args: TokensArgs| {
        outcome(Ok(Verdict::accept(format!(
            "{}|{}",
            args.access_token.secret(),
            args.refresh_token
                .map(|rt| rt.secret().to_string())
                .unwrap_or_default()
        ))))
    });
    assert_eq!(
        tokens.dispatch(verified_identity()).await.unwrap(),
        Verdict::accept("at|rt".to_string())
    );

    let token_params = VerifyCallback::token_params(|args: TokenParamsArgs| {
        outcome(Ok(Verdict::accept(
            args.params["token_type"].as_str().unwrap().to_string(),
        )))
    });
    assert_eq!(
        token_params.dispatch(verified_identity()).await.unwrap(),
        Verdict::accept("Bearer".to_string())
    );

    let claims = VerifyCallback::claims(|args: ClaimsArgs| {
        outcome(Ok(Verdict::accept(
            args.claims.additional_claim_str("name").unwrap().to_string(),
        )))
    });
    assert_eq!(
        claims.dispatch(verified_identity()).await.unwrap(),
        Verdict::accept("Jane".to_string())
    );
}

#[tokio::test]
async fn test_dispatch_reject_and_error() {
    let reject = VerifyCallback::identity(|_: IdentityArgs| {
        outcome(Ok(
            Verdict::reject().with_info(json!({ "message": "locked" }))
        ))
    });
    assert_eq!(
        reject.dispatch(verified_identity()).await.unwrap(),
        Verdict::Reject {
            info: Some(json!({ "message": "locked" }))
        }
    );

    let failing =
        VerifyCallback::identity(|_: IdentityArgs| outcome(Err("database unavailable".into())));
    assert_eq!(
        failing
            .dispatch(verified_identity())
            .await
            .unwrap_err()
            .to_string(),
        "database unavailable"
    );
}

#[test]
fn test_verdict_with_info() {
    assert_eq!(
        Verdict::accept(1).with_info(json!("welcome")),
        Verdict::Accept {
            user: 1,
            info: Some(json!("welcome"))
        }
    );
}

#[test]
fn test_debug() {
    let callback: VerifyCallback<String> =
        VerifyCallback::token_params(|_: TokenParamsArgs| outcome(Ok(Verdict::reject())));
    assert_eq!(format!("{:?}", callback), "VerifyCallback::TokenParams(..)");
    assert_eq!(
        format!("{:?}", callback.clone()),
        "VerifyCallback::TokenParams(..)"
    );
}
