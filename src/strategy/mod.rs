use crate::authorization::AuthorizationRequest;
use crate::callback::{BoxError, BoxFuture, Verdict, VerifiedIdentity, VerifyCallback};
use crate::certificate::{load_certificates, CertificateError, TrustedCertificate};
use crate::core::CryptoBackend;
use crate::id_token::IdToken;
use crate::jwt::DecodeError;
use crate::token::{HttpTokenExchange, TokenExchange, TokenRequest};
use crate::types::SubjectIdentifier;
use crate::user_info::{ExtensionClaimError, Profile, UserInfoError, UserInfoRequest};
use crate::verification::{ClaimsVerificationError, IdTokenVerifier};
use crate::{
    AsyncHttpClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl,
    RedirectUrl, Scope, TokenUrl, UserInfoUrl,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use url::Url;

use std::borrow::Cow;
use std::fmt::{Debug, Formatter, Result as FormatterResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;


/// Configuration of a [`Strategy`].
///
/// Every field is optional at the type level so that options can be deserialized from partial
/// configuration files; [`Strategy::new`] rejects incomplete configurations.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyOptions {
    /// Authorization endpoint. Required.
    pub authorization_url: Option<AuthUrl>,
    /// Token endpoint. Required.
    pub token_url: Option<TokenUrl>,
    /// UserInfo endpoint. Required unless profiles are always built from the ID token.
    pub user_info_url: Option<UserInfoUrl>,
    /// Expected `iss` claim. Required.
    pub issuer: Option<IssuerUrl>,
    /// Client ID registered with the provider. Required.
    pub client_id: Option<ClientId>,
    /// Client secret registered with the provider. Required.
    pub client_secret: Option<ClientSecret>,
    /// Where the provider sends the user back to. May be relative to the request URL.
    pub callback_url: Option<String>,
    /// Scopes requested in addition to `openid`.
    pub scopes: Vec<Scope>,
    /// Separator placed between scopes. Defaults to a single space.
    pub scope_separator: Option<String>,
    /// Hands the originating [`CallbackRequest`] to the verify callback.
    pub pass_request_to_callback: bool,
    /// Builds the profile from the ID token instead of fetching it from the UserInfo endpoint.
    pub skip_user_profile: bool,
    /// Loads the certificates listed in `ca_cert_paths`.
    pub add_ca_cert: bool,
    /// PEM files holding the certificates trusted to sign ID tokens.
    pub ca_cert_paths: Option<Vec<String>>,
    /// Directory `ca_cert_paths` are resolved against. Defaults to the working directory.
    pub certificate_root: Option<PathBuf>,
    /// Rejects ID tokens that declare no signature algorithm.
    pub require_signed_id_token: bool,
    /// Rejects ID tokens issued more than this many seconds ago.
    pub max_token_age: Option<u64>,
}

/// Error constructing a [`Strategy`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// A required option is absent.
    #[error("Missing required option: {0}")]
    MissingField(&'static str),
    /// An option is present but unusable.
    #[error("Invalid option `{0}`: {1}")]
    InvalidField(&'static str, String),
    /// `add_ca_cert` is set but no certificate paths are listed.
    #[error("Certificate loading requested but no certificate paths are configured")]
    MissingCertificatePaths,
    /// A trusted certificate could not be loaded.
    #[error("Failed to load trusted certificates")]
    Certificate(#[source] CertificateError),
}

/// Decides whether the end-user's profile is fetched from the UserInfo endpoint or built from the
/// ID token claims.
///
/// Decision functions receive the verified issuer and subject and return `true` to fetch.
#[derive(Clone)]
pub enum ProfilePolicy {
    /// Always fetch from the UserInfo endpoint.
    Fetch,
    /// Always build from the ID token claims.
    Skip,
    /// Decide synchronously.
    Decide(Arc<dyn Fn(&str, &SubjectIdentifier) -> bool + Send + Sync>),
    /// Decide asynchronously.
    DecideAsync(
        Arc<dyn Fn(String, SubjectIdentifier) -> BoxFuture<Result<bool, BoxError>> + Send + Sync>,
    ),
}
impl ProfilePolicy {
    /// Decide synchronously with `decide`.
    pub fn decide<F>(decide: F) -> Self
    where
        F: Fn(&str, &SubjectIdentifier) -> bool + Send + Sync + 'static,
    {
        ProfilePolicy::Decide(Arc::new(decide))
    }

    /// Decide asynchronously with `decide`.
    pub fn decide_async<F>(decide: F) -> Self
    where
        F: Fn(String, SubjectIdentifier) -> BoxFuture<Result<bool, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        ProfilePolicy::DecideAsync(Arc::new(decide))
    }

    fn may_fetch(&self) -> bool {
        !matches!(self, ProfilePolicy::Skip)
    }

    async fn should_fetch(
        &self,
        issuer: &str,
        subject: &SubjectIdentifier,
    ) -> Result<bool, BoxError> {
        match self {
            ProfilePolicy::Fetch => Ok(true),
            ProfilePolicy::Skip => Ok(false),
            ProfilePolicy::Decide(decide) => Ok(decide(issuer, subject)),
            ProfilePolicy::DecideAsync(decide) => {
                decide(issuer.to_string(), subject.clone()).await
            }
        }
    }
}
impl Debug for ProfilePolicy {
    fn fmt(&self, f: &mut Formatter) -> FormatterResult {
        match self {
            ProfilePolicy::Fetch => f.write_str("Fetch"),
            ProfilePolicy::Skip => f.write_str("Skip"),
            ProfilePolicy::Decide(_) => f.write_str("Decide(..)"),
            ProfilePolicy::DecideAsync(_) => f.write_str("DecideAsync(..)"),
        }
    }
}

/// The request that reached the application's callback route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackRequest {
    params: Vec<(String, String)>,
    url: Url,
}
impl CallbackRequest {
    /// Wrap the full URL of the incoming request, query included.
    pub fn from_url(url: Url) -> Self {
        let params = url
            .query_pairs()
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        Self { params, url }
    }

    /// The first value of query parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value.as_str())
    }

    /// The full request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Per-attempt overrides of the strategy's configuration.
#[derive(Clone, Debug, Default)]
pub struct AuthenticateOptions {
    /// Overrides [`StrategyOptions::callback_url`].
    pub callback_url: Option<String>,
    /// Overrides [`StrategyOptions::scopes`].
    pub scopes: Option<Vec<Scope>>,
    /// `state` sent to the authorization endpoint.
    pub state: Option<CsrfToken>,
}

/// Error details returned by the provider on the callback URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderError {
    /// Error code (`error`).
    pub error: String,
    /// Human-readable description (`error_description`).
    pub error_description: Option<String>,
    /// Page describing the error (`error_uri`).
    pub error_uri: Option<String>,
}

/// Why an attempt failed without an error.
#[derive(Clone, Debug, PartialEq)]
pub enum FailureReason {
    /// The provider declined the authorization request.
    Provider(ProviderError),
    /// The verify callback rejected the identity.
    Rejected {
        /// Information supplied by the callback.
        info: Option<serde_json::Value>,
    },
}

/// Result of a single authentication attempt.
#[derive(Clone, Debug)]
pub enum AuthenticationOutcome<U> {
    /// Send the user agent to the authorization endpoint.
    Redirect {
        /// Authorization URL.
        url: Url,
        /// `state` carried by the URL, to be checked when the user returns.
        state: Option<CsrfToken>,
    },
    /// The user is authenticated.
    Success {
        /// Identity accepted by the verify callback.
        user: U,
        /// Information supplied by the callback.
        info: Option<serde_json::Value>,
    },
    /// Authentication failed.
    Failure(FailureReason),
}

/// Error during an authentication attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthenticationError<XE, UE>
where
    XE: std::error::Error + 'static,
    UE: std::error::Error + 'static,
{
    /// The callback URL could not be resolved.
    #[error("Invalid callback URL")]
    InvalidCallbackUrl(#[source] url::ParseError),
    /// The token exchange failed.
    #[error("Failed to obtain access token")]
    TokenExchange(#[source] XE),
    /// The token response carried no ID token.
    #[error("ID Token not present in token response")]
    MissingIdToken,
    /// The ID token is malformed.
    #[error("Failed to decode ID token")]
    Decode(#[source] DecodeError),
    /// The ID token failed verification.
    #[error(transparent)]
    Verification(ClaimsVerificationError),
    /// The profile decision function failed.
    #[error("Failed to decide whether to load the user profile")]
    ProfilePolicy(#[source] BoxError),
    /// The UserInfo request failed.
    #[error("Failed to fetch user profile")]
    UserInfo(#[source] UserInfoError<UE>),
    /// The profile could not be built from the ID token.
    #[error("Failed to build user profile")]
    Profile(#[source] ExtensionClaimError),
    /// The verify callback failed.
    #[error("Verify callback failed")]
    Callback(#[source] BoxError),
}

/// OpenID Connect relying-party strategy for the Authorization Code flow.
///
/// A strategy is immutable once built and may serve any number of concurrent attempts.
pub struct Strategy<U, X, C> {
    auth_url: AuthUrl,
    callback_url: Option<String>,
    client_id: ClientId,
    extra_params: Vec<(String, String)>,
    http_client: C,
    pass_request_to_callback: bool,
    profile_policy: ProfilePolicy,
    scope_separator: Option<String>,
    scopes: Vec<Scope>,
    token_exchange: X,
    user_info_url: Option<UserInfoUrl>,
    verifier: IdTokenVerifier,
    verify: VerifyCallback<U>,
}
impl<U, C> Strategy<U, HttpTokenExchange<C>, C>
where
    C: Clone,
{
    /// Build a strategy that exchanges codes at the configured token endpoint with `http_client`.
    pub fn new(
        options: StrategyOptions,
        http_client: C,
        verify: VerifyCallback<U>,
    ) -> Result<Self, ConfigurationError> {
        let required = required_options(&options)?;
        let token_exchange = HttpTokenExchange::new(
            required.client_id,
            required.client_secret,
            required.token_url,
            http_client.clone(),
        );
        Self::with_token_exchange(options, token_exchange, http_client, verify)
    }
}
impl<U, X, C> Strategy<U, X, C> {
    /// Build a strategy that obtains tokens through `token_exchange`.
    ///
    /// `http_client` is still used for the UserInfo endpoint.
    pub fn with_token_exchange(
        options: StrategyOptions,
        token_exchange: X,
        http_client: C,
        verify: VerifyCallback<U>,
    ) -> Result<Self, ConfigurationError> {
        let RequiredOptions {
            auth_url,
            client_id,
            client_secret,
            issuer,
            ..
        } = required_options(&options)?;

        let certificates = if options.add_ca_cert {
            let paths = options
                .ca_cert_paths
                .as_ref()
                .filter(|paths| !paths.is_empty())
                .ok_or(ConfigurationError::MissingCertificatePaths)?;
            let root = options
                .certificate_root
                .clone()
                .unwrap_or_else(|| PathBuf::from("."));
            load_certificates(&root, paths).map_err(ConfigurationError::Certificate)?
        } else {
            Vec::new()
        };
        log::debug!("Trusting {} certificate(s) for ID tokens", certificates.len());

        let mut verifier = IdTokenVerifier::new_confidential_client(
            client_id.clone(),
            client_secret,
            issuer,
            certificates,
        )
        .require_signed_token(options.require_signed_id_token);
        if let Some(max_token_age) = options.max_token_age {
            let max_token_age =
                chrono::Duration::from_std(std::time::Duration::from_secs(max_token_age))
                    .map_err(|err| {
                        ConfigurationError::InvalidField("max_token_age", err.to_string())
                    })?;
            verifier = verifier.set_max_token_age(max_token_age);
        }

        let profile_policy = if options.skip_user_profile {
            ProfilePolicy::Skip
        } else {
            ProfilePolicy::Fetch
        };
        if profile_policy.may_fetch() && options.user_info_url.is_none() {
            return Err(ConfigurationError::MissingField("user_info_url"));
        }

        Ok(Self {
            auth_url,
            callback_url: options.callback_url,
            client_id,
            extra_params: Vec::new(),
            http_client,
            pass_request_to_callback: options.pass_request_to_callback,
            profile_policy,
            scope_separator: options.scope_separator,
            scopes: options.scopes,
            token_exchange,
            user_info_url: options.user_info_url,
            verifier,
            verify,
        })
    }

    /// Replaces the policy derived from [`StrategyOptions::skip_user_profile`].
    pub fn set_profile_policy(mut self, policy: ProfilePolicy) -> Result<Self, ConfigurationError> {
        if policy.may_fetch() && self.user_info_url.is_none() {
            return Err(ConfigurationError::MissingField("user_info_url"));
        }
        self.profile_policy = policy;
        Ok(self)
    }

    /// Appends a provider-specific parameter to every authorization request.
    pub fn add_authorization_param<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.extra_params.push((name.into(), value.into()));
        self
    }

    /// Specifies a function for returning the current time when checking token expiry.
    pub fn set_time_fn<T>(mut self, time_fn: T) -> Self
    where
        T: Fn() -> DateTime<Utc> + 'static + Send + Sync,
    {
        self.verifier = self.verifier.set_time_fn(time_fn);
        self
    }

    /// Specifies the primitives used to check ID token signatures.
    pub fn set_crypto_backend<B>(mut self, backend: B) -> Self
    where
        B: CryptoBackend + 'static,
    {
        self.verifier = self.verifier.set_crypto_backend(backend);
        self
    }

    /// The ID token verifier.
    pub fn verifier(&self) -> &IdTokenVerifier {
        &self.verifier
    }

    /// Certificates trusted to sign ID tokens. Their PEM text may also be added to the HTTP
    /// client's trust store.
    pub fn certificates(&self) -> &[TrustedCertificate] {
        self.verifier.certificates()
    }

    /// The profile policy.
    pub fn profile_policy(&self) -> &ProfilePolicy {
        &self.profile_policy
    }

    /// Handle a request to the login or callback route.
    ///
    /// A request carrying `error` fails, one carrying `code` completes the flow, and anything
    /// else is redirected to the authorization endpoint.
    pub async fn authenticate<'c>(
        &'c self,
        request: &CallbackRequest,
        options: &AuthenticateOptions,
    ) -> Result<
        AuthenticationOutcome<U>,
        AuthenticationError<<X as TokenExchange<'c>>::Error, <C as AsyncHttpClient<'c>>::Error>,
    >
    where
        X: TokenExchange<'c>,
        C: AsyncHttpClient<'c>,
    {
        if let Some(error) = request.param("error") {
            let provider_error = ProviderError {
                error: error.to_string(),
                error_description: request.param("error_description").map(str::to_string),
                error_uri: request.param("error_uri").map(str::to_string),
            };
            log::warn!("Authorization server returned error `{}`", provider_error.error);
            return Ok(AuthenticationOutcome::Failure(FailureReason::Provider(
                provider_error,
            )));
        }

        let redirect_url = self
            .resolve_callback_url(request, options)
            .map_err(|err| {
                log::warn!("Invalid callback URL: {}", err);
                AuthenticationError::InvalidCallbackUrl(err)
            })?;

        match request.param("code") {
            Some(code) => {
                self.complete(
                    request,
                    AuthorizationCode::new(code.to_string()),
                    redirect_url,
                )
                .await
            }
            None => Ok(self.redirect(redirect_url, options)),
        }
    }

    fn resolve_callback_url(
        &self,
        request: &CallbackRequest,
        options: &AuthenticateOptions,
    ) -> Result<Option<RedirectUrl>, url::ParseError> {
        let Some(callback_url) = options.callback_url.as_ref().or(self.callback_url.as_ref())
        else {
            return Ok(None);
        };
        let url = match Url::parse(callback_url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => request.url().join(callback_url)?,
            Err(err) => return Err(err),
        };
        Ok(Some(RedirectUrl::from_url(url)))
    }

    fn redirect(
        &self,
        redirect_url: Option<RedirectUrl>,
        options: &AuthenticateOptions,
    ) -> AuthenticationOutcome<U> {
        let scopes = options.scopes.as_ref().unwrap_or(&self.scopes);
        let mut authorization_request = AuthorizationRequest::new(&self.auth_url, &self.client_id)
            .add_scopes(scopes.iter().cloned());
        if let Some(ref separator) = self.scope_separator {
            authorization_request = authorization_request.set_scope_separator(separator.as_str());
        }
        if let Some(redirect_url) = redirect_url {
            authorization_request =
                authorization_request.set_redirect_uri(Cow::Owned(redirect_url));
        }
        if let Some(ref state) = options.state {
            authorization_request = authorization_request.set_state(state.clone());
        }
        for (name, value) in &self.extra_params {
            authorization_request =
                authorization_request.add_extra_param(name.as_str(), value.as_str());
        }

        let (url, state) = authorization_request.url();
        log::debug!("Redirecting to authorization endpoint {}", self.auth_url.as_str());
        AuthenticationOutcome::Redirect { url, state }
    }

    async fn complete<'c>(
        &'c self,
        request: &CallbackRequest,
        code: AuthorizationCode,
        redirect_url: Option<RedirectUrl>,
    ) -> Result<
        AuthenticationOutcome<U>,
        AuthenticationError<<X as TokenExchange<'c>>::Error, <C as AsyncHttpClient<'c>>::Error>,
    >
    where
        X: TokenExchange<'c>,
        C: AsyncHttpClient<'c>,
    {
        log::debug!("Exchanging authorization code");
        let token_response = self
            .token_exchange
            .exchange(TokenRequest::authorization_code(code, redirect_url))
            .await
            .map_err(|err| {
                log::warn!("Token exchange failed: {}", err);
                AuthenticationError::TokenExchange(err)
            })?;

        let id_token = token_response.id_token().ok_or_else(|| {
            log::warn!("Token response carries no ID token");
            AuthenticationError::MissingIdToken
        })?;
        let id_token = IdToken::from_str(id_token).map_err(|err| {
            log::warn!("Malformed ID token: {}", err);
            AuthenticationError::Decode(err)
        })?;

        log::debug!("Verifying ID token");
        let claims = id_token
            .claims(&self.verifier, Some(token_response.access_token()))
            .map_err(|err| {
                log::warn!("ID token rejected: {}", err);
                AuthenticationError::Verification(err)
            })?;
        let (Some(issuer), Some(subject)) = (claims.issuer(), claims.subject()) else {
            return Err(AuthenticationError::Verification(
                ClaimsVerificationError::MissingClaims(vec!["iss", "sub"]),
            ));
        };

        let fetch = self
            .profile_policy
            .should_fetch(issuer, subject)
            .await
            .map_err(|err| {
                log::warn!("Profile policy failed: {}", err);
                AuthenticationError::ProfilePolicy(err)
            })?;
        let profile = if fetch {
            let user_info_url = self.user_info_url.clone().ok_or_else(|| {
                AuthenticationError::UserInfo(UserInfoError::Other(
                    "no UserInfo endpoint configured".to_string(),
                ))
            })?;
            UserInfoRequest::new(user_info_url, token_response.access_token().clone())
                .require_subject(subject.clone())
                .request_async(&self.http_client)
                .await
                .map_err(|err| {
                    log::warn!("UserInfo request failed: {}", err);
                    AuthenticationError::UserInfo(err)
                })?
        } else {
            log::debug!("Building profile from ID token claims");
            Profile::from_claims(subject, claims).map_err(|err| {
                log::warn!("Invalid profile claims: {}", err);
                AuthenticationError::Profile(err)
            })?
        };

        let verified = VerifiedIdentity {
            request: self.pass_request_to_callback.then(|| request.clone()),
            issuer: issuer.to_string(),
            subject: subject.clone(),
            profile,
            claims: claims.clone(),
            access_token: token_response.access_token().clone(),
            refresh_token: token_response.refresh_token().cloned(),
            params: token_response.raw_params().clone(),
        };
        match self
            .verify
            .dispatch(verified)
            .await
            .map_err(AuthenticationError::Callback)?
        {
            Verdict::Accept { user, info } => {
                log::debug!("Authenticated subject `{}`", subject);
                Ok(AuthenticationOutcome::Success { user, info })
            }
            Verdict::Reject { info } => {
                log::warn!("Verify callback rejected subject `{}`", subject);
                Ok(AuthenticationOutcome::Failure(FailureReason::Rejected { info }))
            }
        }
    }
}
impl<U, X, C> Debug for Strategy<U, X, C> {
    fn fmt(&self, f: &mut Formatter) -> FormatterResult {
        f.debug_struct("Strategy")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("issuer", self.verifier.issuer())
            .field("profile_policy", &self.profile_policy)
            .field("verify", &self.verify)
            .finish_non_exhaustive()
    }
}

struct RequiredOptions {
    auth_url: AuthUrl,
    client_id: ClientId,
    client_secret: ClientSecret,
    issuer: IssuerUrl,
    token_url: TokenUrl,
}

// The first missing option is reported.
fn required_options(options: &StrategyOptions) -> Result<RequiredOptions, ConfigurationError> {
    let auth_url = options
        .authorization_url
        .clone()
        .ok_or(ConfigurationError::MissingField("authorization_url"))?;
    let token_url = options
        .token_url
        .clone()
        .ok_or(ConfigurationError::MissingField("token_url"))?;
    let issuer = options
        .issuer
        .clone()
        .ok_or(ConfigurationError::MissingField("issuer"))?;
    let client_id = options
        .client_id
        .clone()
        .ok_or(ConfigurationError::MissingField("client_id"))?;
    let client_secret = options
        .client_secret
        .clone()
        .ok_or(ConfigurationError::MissingField("client_secret"))?;
    Ok(RequiredOptions {
        auth_url,
        client_id,
        client_secret,
        issuer,
        token_url,
    })
}
