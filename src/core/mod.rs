use oauth2::helpers::variant_name;
use serde::{Deserialize, Serialize};
use sha2::Digest;

use std::fmt::{Display, Error as FormatterError, Formatter};

pub use self::crypto::{CryptoBackend, RustCryptoBackend};

mod crypto;


///
/// JWS signing algorithms accepted on ID tokens.
///
/// These algorithms represent the `alg` header parameter values for JSON Web Signature, as
/// described in [Section 3.1 of RFC 7518](https://tools.ietf.org/html/rfc7518#section-3.1).
/// Tokens declaring any other algorithm (including `none`) are rejected.
///
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CoreJwsSigningAlgorithm {
    ///
    /// HMAC using SHA-256.
    ///
    #[serde(rename = "HS256")]
    HmacSha256,
    ///
    /// HMAC using SHA-384.
    ///
    #[serde(rename = "HS384")]
    HmacSha384,
    ///
    /// HMAC using SHA-512.
    ///
    #[serde(rename = "HS512")]
    HmacSha512,
    ///
    /// RSA SSA PKCS#1 v1.5 using SHA-256.
    ///
    #[serde(rename = "RS256")]
    RsaSsaPkcs1V15Sha256,
    ///
    /// RSA SSA PKCS#1 v1.5 using SHA-384.
    ///
    #[serde(rename = "RS384")]
    RsaSsaPkcs1V15Sha384,
    ///
    /// RSA SSA PKCS#1 v1.5 using SHA-512.
    ///
    #[serde(rename = "RS512")]
    RsaSsaPkcs1V15Sha512,
    ///
    /// ECDSA using P-256 and SHA-256.
    ///
    #[serde(rename = "ES256")]
    EcdsaP256Sha256,
    ///
    /// ECDSA using P-384 and SHA-384.
    ///
    #[serde(rename = "ES384")]
    EcdsaP384Sha384,
    ///
    /// ECDSA using P-521 and SHA-512.
    ///
    #[serde(rename = "ES512")]
    EcdsaP521Sha512,
}
impl CoreJwsSigningAlgorithm {
    /// Parse a JWS `alg` header value. Returns `None` for unsupported algorithms.
    pub fn from_alg(alg: &str) -> Option<Self> {
        serde_plain::from_str(alg).ok()
    }

    /// Key family this algorithm belongs to.
    pub fn family(&self) -> AlgorithmFamily {
        match *self {
            CoreJwsSigningAlgorithm::HmacSha256
            | CoreJwsSigningAlgorithm::HmacSha384
            | CoreJwsSigningAlgorithm::HmacSha512 => AlgorithmFamily::Symmetric,
            CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256
            | CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha384
            | CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha512 => AlgorithmFamily::Rsa,
            CoreJwsSigningAlgorithm::EcdsaP256Sha256
            | CoreJwsSigningAlgorithm::EcdsaP384Sha384
            | CoreJwsSigningAlgorithm::EcdsaP521Sha512 => AlgorithmFamily::EllipticCurve,
        }
    }

    /// Hash `bytes` with the SHA-2 function selected by the algorithm's size suffix.
    pub fn hash_bytes(&self, bytes: &[u8]) -> Vec<u8> {
        match *self {
            CoreJwsSigningAlgorithm::HmacSha256
            | CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256
            | CoreJwsSigningAlgorithm::EcdsaP256Sha256 => sha2::Sha256::digest(bytes).to_vec(),
            CoreJwsSigningAlgorithm::HmacSha384
            | CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha384
            | CoreJwsSigningAlgorithm::EcdsaP384Sha384 => sha2::Sha384::digest(bytes).to_vec(),
            CoreJwsSigningAlgorithm::HmacSha512
            | CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha512
            | CoreJwsSigningAlgorithm::EcdsaP521Sha512 => sha2::Sha512::digest(bytes).to_vec(),
        }
    }
}
impl Display for CoreJwsSigningAlgorithm {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FormatterError> {
        write!(f, "{}", variant_name(self))
    }
}

/// Signature algorithm family, which determines the key material used for verification.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AlgorithmFamily {
    /// HMAC keyed by the client secret.
    Symmetric,
    /// RSA keyed by a trusted certificate.
    Rsa,
    /// ECDSA keyed by a trusted certificate.
    EllipticCurve,
}
