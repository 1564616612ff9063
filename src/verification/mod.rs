use crate::certificate::TrustedCertificate;
use crate::core::{AlgorithmFamily, CoreJwsSigningAlgorithm, CryptoBackend, RustCryptoBackend};
use crate::helpers::{rounded_unix_seconds, Timestamp};
use crate::id_token::IdTokenClaims;
use crate::jwt::{JsonWebToken, JsonWebTokenHeader};
use crate::types::{AccessTokenHash, AudienceClaim};
use crate::{AccessToken, ClientId, ClientSecret, IssuerUrl};

use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use thiserror::Error;

use std::sync::Arc;


/// Error verifying claims.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClaimsVerificationError {
    /// One or more of `iss`, `sub` (or `user_id`), `aud`, `exp` and `iat` is absent.
    #[error("Missing required claim(s): {}", .0.join(", "))]
    MissingClaims(Vec<&'static str>),
    /// Issuer claim does not match the configured issuer.
    #[error("Mismatched Issuer: {0}")]
    InvalidIssuer(String),
    /// Authorized party claim is present but is not this client.
    #[error("Mismatched Authorized Party: {0}")]
    InvalidAuthorizedParty(String),
    /// Audience claim is an empty array.
    #[error("Audience is empty.")]
    EmptyAudience,
    /// Audience claim lists several audiences alongside an authorized party.
    #[error("Audience may not have more than one entry.")]
    MultipleAudiences,
    /// Audience claim lists several audiences without an authorized party.
    #[error("Authorized Party is required.")]
    AuthorizedPartyRequired,
    /// Sole audience is not this client.
    #[error("Mismatched Client Id: {0}")]
    InvalidAudience(String),
    /// Claims have expired.
    #[error("Current time ({now}) is past ID Token Expired Time Claim ({expiration}).")]
    Expired {
        /// Current time in whole seconds since the epoch.
        now: i64,
        /// The token's `exp` claim.
        expiration: Timestamp,
    },
    /// Token was issued further in the past than the configured maximum age allows.
    #[error("Invalid issue time: {0}")]
    InvalidIssueTime(String),
    /// `at_hash` is present but the token declares no signature algorithm.
    #[error("Access token hash: Unspecified Algorithm.")]
    AccessTokenHashUnspecifiedAlg,
    /// `at_hash` is present but the declared algorithm has no defined hash function.
    #[error("Access token hash: Unsupported Algorithm `{0}`.")]
    AccessTokenHashUnsupportedAlg(String),
    /// `at_hash` does not match the access token.
    #[error("Access token hash: Mismatched Hashes.")]
    AccessTokenHashMismatch,
    /// Failed to verify the claims signature.
    #[error(transparent)]
    SignatureVerification(SignatureVerificationError),
}

/// Error verifying claims signature.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignatureVerificationError {
    /// A symmetrically signed token has a multi-valued audience.
    #[error("Token is invalid. Invalid Audience.")]
    InvalidAudienceShape,
    /// A symmetrically signed token has an authorized party that differs from its audience.
    #[error("Token is invalid. Authorized Party does not match with Audience.")]
    AuthorizedPartyMismatch,
    /// The MAC did not verify under the client secret.
    #[error("Token is invalid. Validation failed.")]
    InvalidMac,
    /// An asymmetrically signed token arrived but no certificates are trusted.
    #[error("Certificate(s) are not provided. Validation failed.")]
    NoCertificates,
    /// No trusted certificate verified the signature.
    #[error("Invalid certificate(s).")]
    NoMatchingCertificate,
    /// Invalid signature for the supplied claims and signing key.
    #[error("Crypto error: {0}")]
    CryptoError(String),
    /// The supplied signature algorithm is disallowed by the verifier.
    #[error("Disallowed signature algorithm: {0}")]
    DisallowedAlg(String),
    /// The supplied key cannot be used with the declared algorithm.
    #[error("Invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// No signature algorithm declared but claims must be signed.
    #[error("No signature found")]
    NoSignature,
    /// Unsupported signature algorithm.
    #[error("Invalid algorithm: {0}")]
    UnsupportedAlg(String),
    /// An unexpected error occurred.
    #[error("Other error: {0}")]
    Other(String),
}

/// ID token verifier.
///
/// Cheap to clone, and safe to share between concurrent authentication attempts.
#[derive(Clone)]
pub struct IdTokenVerifier {
    backend: Arc<dyn CryptoBackend>,
    certificates: Arc<Vec<TrustedCertificate>>,
    client_id: ClientId,
    client_secret: Option<ClientSecret>,
    issuer: IssuerUrl,
    max_token_age: Option<Duration>,
    require_signature: bool,
    time_fn: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}
impl IdTokenVerifier {
    fn new(
        client_id: ClientId,
        client_secret: Option<ClientSecret>,
        issuer: IssuerUrl,
        certificates: Vec<TrustedCertificate>,
    ) -> Self {
        IdTokenVerifier {
            backend: Arc::new(RustCryptoBackend),
            certificates: Arc::new(certificates),
            client_id,
            client_secret,
            issuer,
            // By default, accept any issued time (iat claim).
            max_token_age: None,
            // Tokens declaring no `alg` are accepted unverified unless this is enabled.
            require_signature: false,
            // By default, use the current system time.
            time_fn: Arc::new(Utc::now),
        }
    }

    /// Initializes a new verifier for a public client (i.e., one without a client secret).
    ///
    /// Tokens signed with a shared-secret algorithm are rejected, since anyone holding the
    /// (non-confidential) client ID could forge them.
    pub fn new_public_client(
        client_id: ClientId,
        issuer: IssuerUrl,
        certificates: Vec<TrustedCertificate>,
    ) -> Self {
        Self::new(client_id, None, issuer, certificates)
    }

    /// Initializes a new verifier for a confidential client (i.e., one with a client secret).
    ///
    /// For `HS256`, `HS384` and `HS512` the client secret is the MAC key.
    pub fn new_confidential_client(
        client_id: ClientId,
        client_secret: ClientSecret,
        issuer: IssuerUrl,
        certificates: Vec<TrustedCertificate>,
    ) -> Self {
        Self::new(client_id, Some(client_secret), issuer, certificates)
    }

    /// Specifies the primitives used to check signatures and MACs.
    pub fn set_crypto_backend<B>(mut self, backend: B) -> Self
    where
        B: CryptoBackend + 'static,
    {
        self.backend = Arc::new(backend);
        self
    }

    /// Specifies a function for returning the current time.
    ///
    /// This function is used for verifying the ID token expiration and issue times.
    pub fn set_time_fn<T>(mut self, time_fn: T) -> Self
    where
        T: Fn() -> DateTime<Utc> + 'static + Send + Sync,
    {
        self.time_fn = Arc::new(time_fn);
        self
    }

    /// Rejects tokens whose `iat` claim is more than `max_token_age` in the past.
    pub fn set_max_token_age(mut self, max_token_age: Duration) -> Self {
        self.max_token_age = Some(max_token_age);
        self
    }

    /// Specifies whether tokens that declare no signature algorithm are rejected.
    ///
    /// Disabled by default: such tokens skip signature verification but remain subject to every
    /// claim check.
    pub fn require_signed_token(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    /// Certificates trusted for asymmetric algorithms.
    pub fn certificates(&self) -> &[TrustedCertificate] {
        &self.certificates
    }

    /// The client ID tokens must be issued to.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// The issuer tokens must be issued by.
    pub fn issuer(&self) -> &IssuerUrl {
        &self.issuer
    }

    /// Dispatch on the declared `alg` and verify the token's signature or MAC.
    pub fn verify_signature(
        &self,
        jwt: &JsonWebToken<IdTokenClaims>,
    ) -> Result<(), SignatureVerificationError> {
        // NB: The algorithm is taken from the header, which an attacker controls. Each family is
        // keyed by material that cannot be substituted: HMAC only with the client secret, and
        // RSA/ECDSA only with configured certificates.
        let declared_alg = match jwt.unverified_header().alg() {
            Some(alg) => alg,
            None if self.require_signature => return Err(SignatureVerificationError::NoSignature),
            None => {
                log::debug!("ID token declares no signature algorithm; skipping verification");
                return Ok(());
            }
        };
        let signature_alg = CoreJwsSigningAlgorithm::from_alg(declared_alg)
            .ok_or_else(|| SignatureVerificationError::UnsupportedAlg(declared_alg.to_string()))?;

        match signature_alg.family() {
            AlgorithmFamily::Symmetric => self.verify_mac(jwt, &signature_alg),
            AlgorithmFamily::Rsa | AlgorithmFamily::EllipticCurve => {
                self.verify_with_certificates(jwt, &signature_alg)
            }
        }
    }

    fn verify_mac(
        &self,
        jwt: &JsonWebToken<IdTokenClaims>,
        signature_alg: &CoreJwsSigningAlgorithm,
    ) -> Result<(), SignatureVerificationError> {
        // The MAC key is bound to a single client, so the token must be addressed to exactly one
        // audience, and any authorized party must be that audience.
        let claims = jwt.unverified_payload();
        let sole_audience = match claims.audiences() {
            Some(AudienceClaim::Multiple(auds)) if auds.len() != 1 => {
                return Err(SignatureVerificationError::InvalidAudienceShape);
            }
            Some(aud) => aud.sole(),
            None => None,
        };
        if let Some(azp) = claims.authorized_party() {
            if sole_audience.map(|aud| aud.as_str()) != Some(azp.as_str()) {
                return Err(SignatureVerificationError::AuthorizedPartyMismatch);
            }
        }

        let client_secret = self.client_secret.as_ref().ok_or_else(|| {
            // The client secret isn't confidential for public clients, so anyone can forge a
            // JWT with a valid signature.
            SignatureVerificationError::DisallowedAlg(
                "symmetric signatures are disallowed for public clients".to_string(),
            )
        })?;

        self.backend
            .verify_hmac(
                signature_alg,
                client_secret.secret().as_bytes(),
                jwt.signing_input(),
                jwt.signature(),
            )
            .map_err(|err| {
                log::debug!("{} MAC rejected: {}", signature_alg, err);
                SignatureVerificationError::InvalidMac
            })
    }

    fn verify_with_certificates(
        &self,
        jwt: &JsonWebToken<IdTokenClaims>,
        signature_alg: &CoreJwsSigningAlgorithm,
    ) -> Result<(), SignatureVerificationError> {
        if self.certificates.is_empty() {
            return Err(SignatureVerificationError::NoCertificates);
        }

        let verified = self.certificates.iter().any(|certificate| {
            match self.backend.verify_with_certificate(
                signature_alg,
                certificate,
                jwt.signing_input(),
                jwt.signature(),
            ) {
                Ok(()) => {
                    log::debug!(
                        "{} signature verified by certificate from {}",
                        signature_alg,
                        certificate.source()
                    );
                    true
                }
                Err(err) => {
                    log::debug!(
                        "{} signature not verified by certificate from {}: {}",
                        signature_alg,
                        certificate.source(),
                        err
                    );
                    false
                }
            }
        });

        if verified {
            Ok(())
        } else {
            Err(SignatureVerificationError::NoMatchingCertificate)
        }
    }

    /// Check the required claims, issuer, authorized party, audience and expiry, in that order.
    /// The first failing check is returned.
    pub fn verify_claims(&self, claims: &IdTokenClaims) -> Result<(), ClaimsVerificationError> {
        let (Some(issuer), Some(_), Some(audiences), Some(expiration), Some(issue_time)) = (
            claims.issuer(),
            claims.subject(),
            claims.audiences(),
            claims.expiration(),
            claims.issue_time(),
        ) else {
            return Err(ClaimsVerificationError::MissingClaims(missing_claims(claims)));
        };

        if issuer != self.issuer.as_str() {
            return Err(ClaimsVerificationError::InvalidIssuer(format!(
                "expected `{}` (found `{}`)",
                self.issuer.as_str(),
                issuer
            )));
        }

        let authorized_party = claims.authorized_party();
        if let Some(azp) = authorized_party {
            if **azp != *self.client_id {
                return Err(ClaimsVerificationError::InvalidAuthorizedParty(format!(
                    "expected `{}` (found `{}`)",
                    *self.client_id, **azp
                )));
            }
        }

        match audiences {
            AudienceClaim::Multiple(auds) if auds.is_empty() => {
                return Err(ClaimsVerificationError::EmptyAudience);
            }
            // A multi-valued audience is never trusted, even when it names this client and the
            // authorized party matches.
            AudienceClaim::Multiple(auds) if auds.len() > 1 => {
                return Err(if authorized_party.is_some() {
                    ClaimsVerificationError::MultipleAudiences
                } else {
                    ClaimsVerificationError::AuthorizedPartyRequired
                });
            }
            _ => {
                if let Some(aud) = audiences.sole() {
                    if **aud != *self.client_id {
                        return Err(ClaimsVerificationError::InvalidAudience(format!(
                            "expected `{}` (found `{}`)",
                            *self.client_id, **aud
                        )));
                    }
                }
            }
        }

        let now = (*self.time_fn)();
        let now_seconds = rounded_unix_seconds(&now);
        let expired = expiration
            .as_seconds()
            .map_or(true, |exp| now_seconds as f64 >= exp);
        if expired {
            return Err(ClaimsVerificationError::Expired {
                now: now_seconds,
                expiration: expiration.clone(),
            });
        }

        if let Some(max_token_age) = self.max_token_age {
            let issued_at = issue_time.to_utc().ok_or_else(|| {
                ClaimsVerificationError::InvalidIssueTime(format!(
                    "`{}` is not a valid timestamp",
                    issue_time
                ))
            })?;
            if now - issued_at > max_token_age {
                return Err(ClaimsVerificationError::InvalidIssueTime(format!(
                    "issued at {} which is more than {} seconds ago",
                    issue_time,
                    max_token_age.num_seconds()
                )));
            }
        }

        Ok(())
    }

    /// Check the `at_hash` claim, if present, against `access_token`.
    pub fn verify_access_token_hash(
        &self,
        header: &JsonWebTokenHeader,
        claims: &IdTokenClaims,
        access_token: &AccessToken,
    ) -> Result<(), ClaimsVerificationError> {
        let Some(expected_hash) = claims.access_token_hash() else {
            return Ok(());
        };
        let declared_alg = header
            .alg()
            .ok_or(ClaimsVerificationError::AccessTokenHashUnspecifiedAlg)?;
        let signature_alg = CoreJwsSigningAlgorithm::from_alg(declared_alg).ok_or_else(|| {
            ClaimsVerificationError::AccessTokenHashUnsupportedAlg(declared_alg.to_string())
        })?;

        let actual_hash = AccessTokenHash::from_token(access_token, &signature_alg);
        if bool::from(actual_hash.as_bytes().ct_eq(expected_hash.as_bytes())) {
            Ok(())
        } else {
            Err(ClaimsVerificationError::AccessTokenHashMismatch)
        }
    }

    /// Run every check in order: signature, claims, then the access token binding (when
    /// `access_token` is supplied).
    pub(crate) fn verified_claims<'b>(
        &self,
        jwt: &'b JsonWebToken<IdTokenClaims>,
        access_token: Option<&AccessToken>,
    ) -> Result<&'b IdTokenClaims, ClaimsVerificationError> {
        self.verify_signature(jwt)
            .map_err(ClaimsVerificationError::SignatureVerification)?;

        let claims = jwt.unverified_payload();
        self.verify_claims(claims)?;

        if let Some(access_token) = access_token {
            self.verify_access_token_hash(jwt.unverified_header(), claims, access_token)?;
        }

        Ok(claims)
    }
}

fn missing_claims(claims: &IdTokenClaims) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if claims.issuer().is_none() {
        missing.push("iss");
    }
    if claims.subject().is_none() {
        missing.push("sub");
    }
    if claims.audiences().is_none() {
        missing.push("aud");
    }
    if claims.expiration().is_none() {
        missing.push("exp");
    }
    if claims.issue_time().is_none() {
        missing.push("iat");
    }
    missing
}
