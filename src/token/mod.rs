use crate::http_utils::{has_content_type, MIME_TYPE_FORM_URLENCODED, MIME_TYPE_JSON};
use crate::{
    AccessToken, AsyncHttpClient, AuthorizationCode, ClientId, ClientSecret, HttpRequest,
    HttpResponse, RedirectUrl, RefreshToken, TokenUrl,
};

use http::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use http::method::Method;
use http::status::StatusCode;
use thiserror::Error;

use std::fmt::{Debug, Formatter, Result as FormatterResult};
use std::future::Future;
use std::pin::Pin;


/// Grant presented to the token endpoint.
#[derive(Clone, Debug)]
pub enum TokenGrant {
    /// Exchange an authorization code (`grant_type=authorization_code`).
    AuthorizationCode(AuthorizationCode),
    /// Exchange a refresh token (`grant_type=refresh_token`).
    RefreshToken(RefreshToken),
}
impl TokenGrant {
    /// The `grant_type` parameter for this grant.
    pub fn grant_type(&self) -> &'static str {
        match self {
            TokenGrant::AuthorizationCode(_) => "authorization_code",
            TokenGrant::RefreshToken(_) => "refresh_token",
        }
    }
}

/// A request to the token endpoint.
#[derive(Clone, Debug)]
pub struct TokenRequest {
    grant: TokenGrant,
    redirect_url: Option<RedirectUrl>,
}
impl TokenRequest {
    /// Exchange `code` for tokens. `redirect_url` must match the one sent to the authorization
    /// endpoint.
    pub fn authorization_code(code: AuthorizationCode, redirect_url: Option<RedirectUrl>) -> Self {
        Self {
            grant: TokenGrant::AuthorizationCode(code),
            redirect_url,
        }
    }

    /// Exchange `refresh_token` for fresh tokens.
    pub fn refresh_token(refresh_token: RefreshToken) -> Self {
        Self {
            grant: TokenGrant::RefreshToken(refresh_token),
            redirect_url: None,
        }
    }

    /// The grant being exchanged.
    pub fn grant(&self) -> &TokenGrant {
        &self.grant
    }

    /// The redirect URI sent alongside the grant, if any.
    pub fn redirect_url(&self) -> Option<&RedirectUrl> {
        self.redirect_url.as_ref()
    }
}

/// Successful response from the token endpoint.
#[derive(Clone)]
pub struct TokenResponse {
    access_token: AccessToken,
    refresh_token: Option<RefreshToken>,
    raw_params: serde_json::Map<String, serde_json::Value>,
}
impl TokenResponse {
    /// Build a response from the parameters returned by the token endpoint.
    ///
    /// `refresh_token` is moved out of the raw parameters and is only available through
    /// [`TokenResponse::refresh_token`].
    pub fn from_params(
        mut raw_params: serde_json::Map<String, serde_json::Value>,
    ) -> Option<Self> {
        let access_token = raw_params
            .get("access_token")
            .and_then(|value| value.as_str())
            .filter(|token| !token.is_empty())
            .map(|token| AccessToken::new(token.to_string()))?;
        let refresh_token = raw_params
            .remove("refresh_token")
            .and_then(|value| match value {
                serde_json::Value::String(token) if !token.is_empty() => Some(token),
                _ => None,
            })
            .map(RefreshToken::new);

        Some(Self {
            access_token,
            refresh_token,
            raw_params,
        })
    }

    /// The access token.
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// The refresh token, if one was issued.
    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    /// The compact-serialized ID token, if the provider returned one.
    pub fn id_token(&self) -> Option<&str> {
        self.raw_params
            .get("id_token")
            .and_then(|value| value.as_str())
            .filter(|id_token| !id_token.is_empty())
    }

    /// Every parameter returned by the token endpoint except `refresh_token`.
    pub fn raw_params(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.raw_params
    }
}
// The raw parameters include the access token, so only their names are printed.
impl Debug for TokenResponse {
    fn fmt(&self, f: &mut Formatter) -> FormatterResult {
        f.debug_struct("TokenResponse")
            .field("access_token", &self.access_token)
            .field("refresh_token", &self.refresh_token)
            .field("raw_params", &self.raw_params.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Converts a grant into tokens.
///
/// This is the seam between the authentication pipeline and the token endpoint. Besides
/// [`HttpTokenExchange`], any `Fn(TokenRequest) -> impl Future<Output = Result<TokenResponse, E>>`
/// implements this trait, which allows wrapping or replacing the default exchange.
pub trait TokenExchange<'c> {
    /// Error type returned by the exchange.
    type Error: std::error::Error + 'static;
    /// Future returned by [`TokenExchange::exchange`].
    type Future: Future<Output = Result<TokenResponse, Self::Error>> + 'c;

    /// Perform the exchange.
    fn exchange(&'c self, request: TokenRequest) -> Self::Future;
}
impl<'c, E, F, T> TokenExchange<'c> for T
where
    E: std::error::Error + 'static,
    F: Future<Output = Result<TokenResponse, E>> + 'c,
    T: Fn(TokenRequest) -> F,
{
    type Error = E;
    type Future = F;

    fn exchange(&'c self, request: TokenRequest) -> Self::Future {
        self(request)
    }
}

/// Token exchange over HTTP: a form-encoded `POST` to the token endpoint carrying the client
/// credentials.
#[derive(Clone, Debug)]
pub struct HttpTokenExchange<C> {
    client_id: ClientId,
    client_secret: ClientSecret,
    http_client: C,
    token_url: TokenUrl,
}
impl<C> HttpTokenExchange<C> {
    /// Exchange tokens at `token_url` with `http_client`.
    pub fn new(
        client_id: ClientId,
        client_secret: ClientSecret,
        token_url: TokenUrl,
        http_client: C,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            http_client,
            token_url,
        }
    }

    /// The token endpoint.
    pub fn token_url(&self) -> &TokenUrl {
        &self.token_url
    }

    fn prepare_request(&self, request: &TokenRequest) -> Result<HttpRequest, http::Error> {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", request.grant.grant_type());
        if let Some(redirect_url) = request.redirect_url() {
            form.append_pair("redirect_uri", redirect_url.as_str());
        }
        form.append_pair("client_id", &self.client_id);
        form.append_pair("client_secret", self.client_secret.secret());
        match request.grant {
            TokenGrant::AuthorizationCode(ref code) => form.append_pair("code", code.secret()),
            TokenGrant::RefreshToken(ref token) => {
                form.append_pair("refresh_token", token.secret())
            }
        };

        http::Request::builder()
            .uri(self.token_url.as_str())
            .method(Method::POST)
            .header(ACCEPT, HeaderValue::from_static(MIME_TYPE_JSON))
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static(MIME_TYPE_FORM_URLENCODED),
            )
            .body(form.finish().into_bytes())
    }

    fn token_response<RE>(
        &self,
        http_response: HttpResponse,
    ) -> Result<TokenResponse, TokenExchangeError<RE>>
    where
        RE: std::error::Error + 'static,
    {
        if !http_response.status().is_success() {
            return Err(TokenExchangeError::Response(
                http_response.status(),
                http_response.body().to_owned(),
                format!(
                    "HTTP status code {} at {}",
                    http_response.status(),
                    self.token_url.as_str()
                ),
            ));
        }

        TokenResponse::from_params(parse_token_params(&http_response))
            .ok_or(TokenExchangeError::MissingAccessToken)
    }
}
impl<'c, C> TokenExchange<'c> for HttpTokenExchange<C>
where
    C: AsyncHttpClient<'c>,
{
    type Error = TokenExchangeError<<C as AsyncHttpClient<'c>>::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<TokenResponse, Self::Error>> + 'c>>;

    fn exchange(&'c self, request: TokenRequest) -> Self::Future {
        Box::pin(async move {
            log::debug!(
                "Exchanging {} grant at {}",
                request.grant.grant_type(),
                self.token_url.as_str()
            );
            let http_request = self.prepare_request(&request).map_err(|err| {
                TokenExchangeError::Other(format!("failed to prepare request: {err}"))
            })?;
            let http_response = self
                .http_client
                .call(http_request)
                .await
                .map_err(TokenExchangeError::Request)?;
            self.token_response(http_response)
        })
    }
}

// Responses should be JSON, but some providers send form-encoded bodies (often without saying
// so), so anything that is not a JSON object is parsed as a form.
fn parse_token_params(
    http_response: &HttpResponse,
) -> serde_json::Map<String, serde_json::Value> {
    let body = http_response.body();
    if !has_content_type(http_response.headers(), MIME_TYPE_FORM_URLENCODED) {
        if let Ok(params) = serde_json::from_slice::<serde_json::Map<_, _>>(body) {
            return params;
        }
    }
    log::debug!("Token response is not a JSON object; parsing it as a form");
    url::form_urlencoded::parse(body)
        .map(|(name, value)| {
            (
                name.into_owned(),
                serde_json::Value::String(value.into_owned()),
            )
        })
        .collect()
}

/// Error exchanging a grant for tokens.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenExchangeError<RE>
where
    RE: std::error::Error + 'static,
{
    /// The token response carried no `access_token`.
    #[error("Access token not present in token response")]
    MissingAccessToken,
    /// An unexpected error occurred.
    #[error("Other error: {0}")]
    Other(String),
    /// An error occurred while sending the request or receiving the response (e.g., network
    /// connectivity failed).
    #[error("Request failed")]
    Request(#[source] RE),
    /// Server returned an invalid response.
    #[error("Server returned invalid response: {2}")]
    Response(StatusCode, Vec<u8>, String),
}
