#![warn(missing_docs)]
//!
//! [OpenID Connect](https://openid.net/specs/openid-connect-core-1_0.html) relying-party
//! authentication for the Authorization Code flow.
//!
//! A [`Strategy`] handles the two requests a relying party sees during sign-in:
//!
//!  1. The login request, which is answered with a redirect to the provider's authorization
//!     endpoint ([`AuthenticationOutcome::Redirect`]).
//!  2. The callback request carrying an authorization `code`. The code is exchanged for tokens,
//!     the ID token is decoded and verified (signature, claims and `at_hash`), the end-user's
//!     [`Profile`] is resolved, and the application's [`VerifyCallback`] decides whether the
//!     user may sign in.
//!
//! # Verification
//!
//! The ID token's signature is checked according to its declared `alg`:
//!
//!  * `HS256`, `HS384` and `HS512` are verified with the client secret as MAC key. The token must
//!    be addressed to a single audience.
//!  * `RS256`, `RS384`, `RS512`, `ES256`, `ES384` and `ES512` are verified against the trusted
//!    certificates. The token is accepted when any one certificate verifies it, which allows keys
//!    to be rotated.
//!  * Tokens without `alg` skip signature verification unless
//!    [`StrategyOptions::require_signed_id_token`] is set.
//!
//! Claims are then checked in a fixed order and the first failure is reported. See
//! [`IdTokenVerifier::verify_claims`].
//!
//! # HTTP clients
//!
//! Requests to the token and UserInfo endpoints are sent with any [`AsyncHttpClient`], including
//! plain async functions taking an [`HttpRequest`] and returning a `Result<HttpResponse, E>`.
//! The token exchange itself may be replaced by implementing [`TokenExchange`].
//!
//! # Example
//!
//! ```no_run
//! use oidc_strategy::{
//!     AuthenticateOptions, AuthenticationOutcome, BoxError, BoxFuture, CallbackRequest,
//!     IdentityArgs, Strategy, StrategyOptions, Verdict, VerifyCallback,
//! };
//! # use oidc_strategy::{HttpRequest, HttpResponse};
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("offline")]
//! # struct Offline;
//! # async fn http_client(_: HttpRequest) -> Result<HttpResponse, Offline> { Err(Offline) }
//!
//! # async fn err_wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let options: StrategyOptions = serde_json::from_str(
//!     r#"{
//!         "authorization_url": "https://accounts.example.com/authorize",
//!         "token_url": "https://accounts.example.com/token",
//!         "issuer": "https://accounts.example.com",
//!         "client_id": "client_id",
//!         "client_secret": "client_secret",
//!         "callback_url": "/auth/callback",
//!         "scopes": ["profile", "email"],
//!         "skip_user_profile": true
//!     }"#,
//! )?;
//!
//! let strategy = Strategy::new(
//!     options,
//!     http_client,
//!     VerifyCallback::identity(
//!         |args: IdentityArgs| -> BoxFuture<Result<Verdict<String>, BoxError>> {
//!             let user = args.subject.to_string();
//!             Box::pin(async move { Ok::<_, BoxError>(Verdict::accept(user)) })
//!         },
//!     ),
//! )?;
//!
//! let request = CallbackRequest::from_url(
//!     "https://app.example.com/auth/callback?code=abc".parse()?,
//! );
//! match strategy.authenticate(&request, &AuthenticateOptions::default()).await? {
//!     AuthenticationOutcome::Redirect { url, .. } => println!("Redirect to {}", url),
//!     AuthenticationOutcome::Success { user, .. } => println!("Signed in as {}", user),
//!     AuthenticationOutcome::Failure(reason) => println!("Sign-in failed: {:?}", reason),
//! }
//! # Ok(())
//! # }
//! ```

pub use oauth2::{
    AccessToken, AsyncHttpClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    HttpRequest, HttpResponse, RedirectUrl, RefreshToken, Scope, TokenUrl,
};

pub use crate::authorization::AuthorizationRequest;
pub use crate::callback::{
    BoxError, BoxFuture, ClaimsArgs, IdentityArgs, ProfileArgs, TokenParamsArgs, TokensArgs,
    Verdict, VerifyCallback,
};
pub use crate::certificate::{
    load_certificates, resolve_certificate_path, CertificateError, CertificateKind,
    TrustedCertificate,
};
pub use crate::core::{AlgorithmFamily, CoreJwsSigningAlgorithm, CryptoBackend, RustCryptoBackend};
pub use crate::helpers::Timestamp;
pub use crate::id_token::{IdToken, IdTokenClaims};
pub use crate::jwt::{DecodeError, JsonWebToken, JsonWebTokenHeader, TokenSegment};
pub use crate::strategy::{
    AuthenticateOptions, AuthenticationError, AuthenticationOutcome, CallbackRequest,
    ConfigurationError, FailureReason, ProfilePolicy, ProviderError, Strategy, StrategyOptions,
};
pub use crate::token::{
    HttpTokenExchange, TokenExchange, TokenExchangeError, TokenGrant, TokenRequest, TokenResponse,
};
pub use crate::types::{
    AccessTokenHash, Audience, AudienceClaim, IssuerUrl, SubjectIdentifier, UserInfoUrl,
};
pub use crate::user_info::{
    ExtensionClaimError, Profile, ProfileName, UserInfoError, UserInfoRequest,
};
pub use crate::verification::{
    ClaimsVerificationError, IdTokenVerifier, SignatureVerificationError,
};

// Must precede the modules that invoke its macros.
#[macro_use]
mod macros;

mod authorization;
mod callback;
mod certificate;
mod core;
mod helpers;
mod http_utils;
mod id_token;
mod jwt;
mod strategy;
mod token;
mod types;
mod user_info;
mod verification;
