use crate::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};

use itertools::Itertools;
use url::Url;

use std::borrow::Cow;

const OPENID_SCOPE: &str = "openid";
const DEFAULT_SCOPE_SEPARATOR: &str = " ";

/// A request to the authorization endpoint using the Authorization Code flow.
///
/// The `openid` scope is always requested, ahead of any scopes added to the request.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest<'a> {
    auth_url: &'a AuthUrl,
    client_id: &'a ClientId,
    extra_params: Vec<(Cow<'a, str>, Cow<'a, str>)>,
    redirect_url: Option<Cow<'a, RedirectUrl>>,
    scope_separator: Cow<'a, str>,
    scopes: Vec<Cow<'a, Scope>>,
    state: Option<CsrfToken>,
}
impl<'a> AuthorizationRequest<'a> {
    /// Begins a request for `client_id` at `auth_url`.
    pub fn new(auth_url: &'a AuthUrl, client_id: &'a ClientId) -> Self {
        Self {
            auth_url,
            client_id,
            extra_params: Vec::new(),
            redirect_url: None,
            scope_separator: Cow::Borrowed(DEFAULT_SCOPE_SEPARATOR),
            scopes: Vec::new(),
            state: None,
        }
    }

    /// Appends a new scope to the authorization URL.
    pub fn add_scope(mut self, scope: Scope) -> Self {
        self.scopes.push(Cow::Owned(scope));
        self
    }

    /// Appends a collection of scopes to the authorization URL.
    pub fn add_scopes<I>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = Scope>,
    {
        self.scopes.extend(scopes.into_iter().map(Cow::Owned));
        self
    }

    /// Overrides the separator placed between scopes (a single space by default).
    pub fn set_scope_separator<S>(mut self, separator: S) -> Self
    where
        S: Into<Cow<'a, str>>,
    {
        self.scope_separator = separator.into();
        self
    }

    /// Sets the `redirect_uri` the provider returns the user to.
    pub fn set_redirect_uri(mut self, redirect_url: Cow<'a, RedirectUrl>) -> Self {
        self.redirect_url = Some(redirect_url);
        self
    }

    /// Sets the opaque `state` value echoed back by the provider.
    pub fn set_state(mut self, state: CsrfToken) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets a freshly generated random `state` value.
    pub fn set_random_state(self) -> Self {
        self.set_state(CsrfToken::new_random())
    }

    /// Appends an extra param to the authorization URL.
    ///
    /// This method allows provider-specific extensions to be used without direct support from
    /// this crate. If `name` conflicts with a parameter managed by this crate, the provider
    /// receives both.
    pub fn add_extra_param<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<Cow<'a, str>>,
        V: Into<Cow<'a, str>>,
    {
        self.extra_params.push((name.into(), value.into()));
        self
    }

    /// The value of the `scope` parameter: `openid` followed by any requested scopes.
    pub fn scope_param(&self) -> String {
        std::iter::once(OPENID_SCOPE)
            .chain(self.scopes.iter().map(|scope| scope.as_str()))
            .join(self.scope_separator.as_ref())
    }

    /// Returns the full authorization URL and the `state` it carries, if any.
    pub fn url(self) -> (Url, Option<CsrfToken>) {
        let scope = self.scope_param();

        let mut url: Url = self.auth_url.url().to_owned();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", self.client_id);
            if let Some(ref redirect_url) = self.redirect_url {
                query.append_pair("redirect_uri", redirect_url.as_str());
            }
            query.append_pair("scope", &scope);
            if let Some(ref state) = self.state {
                query.append_pair("state", state.secret());
            }
            query.extend_pairs(self.extra_params.iter().map(|(k, v)| (&k[..], &v[..])));
        }

        (url, self.state)
    }
}
