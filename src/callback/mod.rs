use crate::id_token::IdTokenClaims;
use crate::strategy::CallbackRequest;
use crate::types::SubjectIdentifier;
use crate::user_info::Profile;
use crate::{AccessToken, RefreshToken};

use std::fmt::{Debug, Formatter, Result as FormatterResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Error returned by application-supplied functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by application-supplied functions.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Decision reached by the verify callback.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict<U> {
    /// Authentication succeeds as `user`.
    Accept {
        /// Application-level identity.
        user: U,
        /// Additional information passed back to the caller.
        info: Option<serde_json::Value>,
    },
    /// Authentication fails even though the ID token is valid.
    Reject {
        /// Reason passed back to the caller.
        info: Option<serde_json::Value>,
    },
}
impl<U> Verdict<U> {
    /// Accept `user` without additional information.
    pub fn accept(user: U) -> Self {
        Verdict::Accept { user, info: None }
    }

    /// Reject without additional information.
    pub fn reject() -> Self {
        Verdict::Reject { info: None }
    }

    /// Attach additional information to the verdict.
    pub fn with_info(self, info: serde_json::Value) -> Self {
        match self {
            Verdict::Accept { user, .. } => Verdict::Accept {
                user,
                info: Some(info),
            },
            Verdict::Reject { .. } => Verdict::Reject { info: Some(info) },
        }
    }
}

/// Verified issuer and subject.
#[derive(Clone, Debug)]
pub struct IdentityArgs {
    /// The originating request, when the strategy is configured to pass it along.
    pub request: Option<CallbackRequest>,
    /// Verified issuer (`iss`).
    pub issuer: String,
    /// Verified subject (`sub`, or the legacy `user_id`).
    pub subject: SubjectIdentifier,
}

/// [`IdentityArgs`] plus the resolved profile.
#[derive(Clone, Debug)]
pub struct ProfileArgs {
    /// The originating request, when the strategy is configured to pass it along.
    pub request: Option<CallbackRequest>,
    /// Verified issuer (`iss`).
    pub issuer: String,
    /// Verified subject (`sub`, or the legacy `user_id`).
    pub subject: SubjectIdentifier,
    /// Resolved profile.
    pub profile: Profile,
}

/// [`ProfileArgs`] plus the tokens.
#[derive(Clone, Debug)]
pub struct TokensArgs {
    /// The originating request, when the strategy is configured to pass it along.
    pub request: Option<CallbackRequest>,
    /// Verified issuer (`iss`).
    pub issuer: String,
    /// Verified subject (`sub`, or the legacy `user_id`).
    pub subject: SubjectIdentifier,
    /// Resolved profile.
    pub profile: Profile,
    /// Access token bound to the ID token.
    pub access_token: AccessToken,
    /// Refresh token, if one was issued.
    pub refresh_token: Option<RefreshToken>,
}

/// [`TokensArgs`] plus the raw token response parameters.
#[derive(Clone, Debug)]
pub struct TokenParamsArgs {
    /// The originating request, when the strategy is configured to pass it along.
    pub request: Option<CallbackRequest>,
    /// Verified issuer (`iss`).
    pub issuer: String,
    /// Verified subject (`sub`, or the legacy `user_id`).
    pub subject: SubjectIdentifier,
    /// Resolved profile.
    pub profile: Profile,
    /// Access token bound to the ID token.
    pub access_token: AccessToken,
    /// Refresh token, if one was issued.
    pub refresh_token: Option<RefreshToken>,
    /// Token response parameters, excluding `refresh_token`.
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Everything: [`TokenParamsArgs`] plus the verified ID token claims.
#[derive(Clone, Debug)]
pub struct ClaimsArgs {
    /// The originating request, when the strategy is configured to pass it along.
    pub request: Option<CallbackRequest>,
    /// Verified issuer (`iss`).
    pub issuer: String,
    /// Verified subject (`sub`, or the legacy `user_id`).
    pub subject: SubjectIdentifier,
    /// Resolved profile.
    pub profile: Profile,
    /// Verified ID token claims.
    pub claims: IdTokenClaims,
    /// Access token bound to the ID token.
    pub access_token: AccessToken,
    /// Refresh token, if one was issued.
    pub refresh_token: Option<RefreshToken>,
    /// Token response parameters, excluding `refresh_token`.
    pub params: serde_json::Map<String, serde_json::Value>,
}

type CallbackFn<A, U> = Arc<dyn Fn(A) -> BoxFuture<Result<Verdict<U>, BoxError>> + Send + Sync>;

/// Application-supplied function deciding whether a verified identity may sign in.
///
/// Each variant fixes which arguments the function receives.
pub enum VerifyCallback<U> {
    /// Receives the issuer and subject.
    Identity(CallbackFn<IdentityArgs, U>),
    /// Receives the issuer, subject and profile.
    Profile(CallbackFn<ProfileArgs, U>),
    /// Receives the issuer, subject, profile and tokens.
    Tokens(CallbackFn<TokensArgs, U>),
    /// Receives the issuer, subject, profile, tokens and raw token response parameters.
    TokenParams(CallbackFn<TokenParamsArgs, U>),
    /// Receives everything, including the verified ID token claims.
    Claims(CallbackFn<ClaimsArgs, U>),
}
impl<U> VerifyCallback<U> {
    /// Callback receiving [`IdentityArgs`].
    pub fn identity<F>(f: F) -> Self
    where
        F: Fn(IdentityArgs) -> BoxFuture<Result<Verdict<U>, BoxError>> + Send + Sync + 'static,
    {
        VerifyCallback::Identity(Arc::new(f))
    }

    /// Callback receiving [`ProfileArgs`].
    pub fn profile<F>(f: F) -> Self
    where
        F: Fn(ProfileArgs) -> BoxFuture<Result<Verdict<U>, BoxError>> + Send + Sync + 'static,
    {
        VerifyCallback::Profile(Arc::new(f))
    }

    /// Callback receiving [`TokensArgs`].
    pub fn tokens<F>(f: F) -> Self
    where
        F: Fn(TokensArgs) -> BoxFuture<Result<Verdict<U>, BoxError>> + Send + Sync + 'static,
    {
        VerifyCallback::Tokens(Arc::new(f))
    }

    /// Callback receiving [`TokenParamsArgs`].
    pub fn token_params<F>(f: F) -> Self
    where
        F: Fn(TokenParamsArgs) -> BoxFuture<Result<Verdict<U>, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        VerifyCallback::TokenParams(Arc::new(f))
    }

    /// Callback receiving [`ClaimsArgs`].
    pub fn claims<F>(f: F) -> Self
    where
        F: Fn(ClaimsArgs) -> BoxFuture<Result<Verdict<U>, BoxError>> + Send + Sync + 'static,
    {
        VerifyCallback::Claims(Arc::new(f))
    }

    fn shape(&self) -> &'static str {
        match self {
            VerifyCallback::Identity(_) => "Identity",
            VerifyCallback::Profile(_) => "Profile",
            VerifyCallback::Tokens(_) => "Tokens",
            VerifyCallback::TokenParams(_) => "TokenParams",
            VerifyCallback::Claims(_) => "Claims",
        }
    }

    /// Invoke the callback with the arguments its shape calls for.
    pub(crate) async fn dispatch(
        &self,
        verified: VerifiedIdentity,
    ) -> Result<Verdict<U>, BoxError> {
        log::debug!("Invoking {} verify callback", self.shape());
        let VerifiedIdentity {
            request,
            issuer,
            subject,
            profile,
            claims,
            access_token,
            refresh_token,
            params,
        } = verified;

        match self {
            VerifyCallback::Identity(f) => {
                f(IdentityArgs {
                    request,
                    issuer,
                    subject,
                })
                .await
            }
            VerifyCallback::Profile(f) => {
                f(ProfileArgs {
                    request,
                    issuer,
                    subject,
                    profile,
                })
                .await
            }
            VerifyCallback::Tokens(f) => {
                f(TokensArgs {
                    request,
                    issuer,
                    subject,
                    profile,
                    access_token,
                    refresh_token,
                })
                .await
            }
            VerifyCallback::TokenParams(f) => {
                f(TokenParamsArgs {
                    request,
                    issuer,
                    subject,
                    profile,
                    access_token,
                    refresh_token,
                    params,
                })
                .await
            }
            VerifyCallback::Claims(f) => {
                f(ClaimsArgs {
                    request,
                    issuer,
                    subject,
                    profile,
                    claims,
                    access_token,
                    refresh_token,
                    params,
                })
                .await
            }
        }
    }
}
impl<U> Clone for VerifyCallback<U> {
    fn clone(&self) -> Self {
        match self {
            VerifyCallback::Identity(f) => VerifyCallback::Identity(f.clone()),
            VerifyCallback::Profile(f) => VerifyCallback::Profile(f.clone()),
            VerifyCallback::Tokens(f) => VerifyCallback::Tokens(f.clone()),
            VerifyCallback::TokenParams(f) => VerifyCallback::TokenParams(f.clone()),
            VerifyCallback::Claims(f) => VerifyCallback::Claims(f.clone()),
        }
    }
}
impl<U> Debug for VerifyCallback<U> {
    fn fmt(&self, f: &mut Formatter) -> FormatterResult {
        write!(f, "VerifyCallback::{}(..)", self.shape())
    }
}

/// Everything the pipeline has established by the time the verify callback runs.
pub(crate) struct VerifiedIdentity {
    pub(crate) request: Option<CallbackRequest>,
    pub(crate) issuer: String,
    pub(crate) subject: SubjectIdentifier,
    pub(crate) profile: Profile,
    pub(crate) claims: IdTokenClaims,
    pub(crate) access_token: AccessToken,
    pub(crate) refresh_token: Option<RefreshToken>,
    pub(crate) params: serde_json::Map<String, serde_json::Value>,
}
