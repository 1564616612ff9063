use crate::core::CoreJwsSigningAlgorithm;
use crate::helpers::base64_url_safe_no_pad;
use crate::AccessToken;

use base64::Engine;
use serde::{Deserialize, Serialize};

use std::fmt::{Display, Formatter};


new_type![
    /// Base64url-encoded left half of the access token's hash, bound into the ID token as
    /// `at_hash`.
    #[derive(Deserialize, Hash, Serialize)]
    AccessTokenHash(String)
    impl {
        /// Initialize a new access token hash from an [`AccessToken`] and the signature
        /// algorithm declared by the ID token.
        pub fn from_token(access_token: &AccessToken, alg: &CoreJwsSigningAlgorithm) -> Self {
            let hash = alg.hash_bytes(access_token.secret().as_bytes());
            Self::new(base64_url_safe_no_pad().encode(&hash[0..hash.len() / 2]))
        }
    }
];

new_type![
    /// Audience claim value.
    #[derive(Deserialize, Hash, Ord, PartialOrd, Serialize)]
    Audience(String)
];

new_type![
    /// Unique identifier for the end-user at the issuer.
    #[derive(Deserialize, Hash, Ord, PartialOrd, Serialize)]
    SubjectIdentifier(String)
];
impl From<String> for SubjectIdentifier {
    fn from(s: String) -> Self {
        SubjectIdentifier(s)
    }
}
impl Display for SubjectIdentifier {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        Display::fmt(&self.0, f)
    }
}

new_url_type![
    /// URL for the issuer of ID tokens. Compared as an exact string against the `iss` claim.
    IssuerUrl
];

new_url_type![
    /// URL for the OpenID Connect UserInfo Endpoint.
    UserInfoUrl
];

/// The `aud` claim, which providers emit either as a single string or as an array.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AudienceClaim {
    /// A single audience string.
    Single(Audience),
    /// An array of audiences, possibly empty.
    Multiple(Vec<Audience>),
}
impl AudienceClaim {
    /// All audiences in declaration order.
    pub fn audiences(&self) -> Vec<&Audience> {
        match self {
            AudienceClaim::Single(aud) => vec![aud],
            AudienceClaim::Multiple(auds) => auds.iter().collect(),
        }
    }

    /// The audience when exactly one is present, whether or not it was wrapped in an array.
    pub fn sole(&self) -> Option<&Audience> {
        match self {
            AudienceClaim::Single(aud) => Some(aud),
            AudienceClaim::Multiple(auds) if auds.len() == 1 => auds.first(),
            AudienceClaim::Multiple(_) => None,
        }
    }

    /// An empty audience string counts as absent. An empty array does not.
    pub(crate) fn is_present(&self) -> bool {
        match self {
            AudienceClaim::Single(aud) => !aud.is_empty(),
            AudienceClaim::Multiple(_) => true,
        }
    }
}
