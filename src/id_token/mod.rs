use crate::helpers::{deserialize_string_or_number_opt, Timestamp};
use crate::jwt::{DecodeError, JsonWebToken, JsonWebTokenHeader};
use crate::types::{AccessTokenHash, AudienceClaim, SubjectIdentifier};
use crate::verification::{ClaimsVerificationError, IdTokenVerifier};
use crate::{AccessToken, ClientId};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use std::str::FromStr;


/// OpenID Connect ID token.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IdToken(JsonWebToken<IdTokenClaims>);
impl FromStr for IdToken {
    type Err = DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonWebToken::decode(s).map(IdToken)
    }
}
impl IdToken {
    /// Verifies and returns a reference to the ID token claims.
    ///
    /// `access_token` is checked against the `at_hash` claim when the claim is present.
    pub fn claims<'a>(
        &'a self,
        verifier: &IdTokenVerifier,
        access_token: Option<&AccessToken>,
    ) -> Result<&'a IdTokenClaims, ClaimsVerificationError> {
        verifier.verified_claims(&self.0, access_token)
    }

    /// The decoded JOSE header.
    pub fn header(&self) -> &JsonWebTokenHeader {
        self.0.unverified_header()
    }

    /// The claims, *without* any verification.
    pub fn unverified_claims(&self) -> &IdTokenClaims {
        self.0.unverified_payload()
    }

    #[cfg(test)]
    pub(crate) fn jwt(&self) -> &JsonWebToken<IdTokenClaims> {
        &self.0
    }
}

/// Claims carried by an ID token.
///
/// Every field is optional at the type level; the verifier enforces which claims are required.
/// Empty strings and zero timestamps count as absent.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct IdTokenClaims {
    iss: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number_opt")]
    sub: Option<SubjectIdentifier>,
    #[serde(default, deserialize_with = "deserialize_string_or_number_opt")]
    user_id: Option<SubjectIdentifier>,
    aud: Option<AudienceClaim>,
    azp: Option<ClientId>,
    exp: Option<Timestamp>,
    iat: Option<Timestamp>,
    at_hash: Option<AccessTokenHash>,

    #[serde(flatten)]
    additional_claims: serde_json::Map<String, serde_json::Value>,
}
impl IdTokenClaims {
    /// Issuer identifier (`iss`).
    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_deref().filter(|iss| !iss.is_empty())
    }

    /// Subject identifier (`sub`), falling back to the legacy `user_id` claim.
    pub fn subject(&self) -> Option<&SubjectIdentifier> {
        self.sub
            .as_ref()
            .filter(|sub| !sub.is_empty())
            .or_else(|| self.user_id.as_ref().filter(|user_id| !user_id.is_empty()))
    }

    /// Audience(s) (`aud`).
    pub fn audiences(&self) -> Option<&AudienceClaim> {
        self.aud.as_ref().filter(|aud| aud.is_present())
    }

    /// Authorized party (`azp`).
    pub fn authorized_party(&self) -> Option<&ClientId> {
        self.azp.as_ref().filter(|azp| !azp.is_empty())
    }

    /// Expiration time (`exp`).
    pub fn expiration(&self) -> Option<&Timestamp> {
        self.exp.as_ref().filter(|exp| !exp.is_zero())
    }

    /// Issue time (`iat`).
    pub fn issue_time(&self) -> Option<&Timestamp> {
        self.iat.as_ref().filter(|iat| !iat.is_zero())
    }

    /// Access token hash (`at_hash`).
    pub fn access_token_hash(&self) -> Option<&AccessTokenHash> {
        self.at_hash.as_ref().filter(|at_hash| !at_hash.is_empty())
    }

    /// Provider-specific claims not modelled above (e.g. `ext`, `name`).
    pub fn additional_claims(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.additional_claims
    }

    /// A provider-specific claim, when it is a string.
    pub fn additional_claim_str(&self, name: &str) -> Option<&str> {
        self.additional_claims.get(name).and_then(|v| v.as_str())
    }
}
