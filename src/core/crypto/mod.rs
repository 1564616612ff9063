use crate::certificate::TrustedCertificate;
use crate::core::CoreJwsSigningAlgorithm;
use crate::verification::SignatureVerificationError;

use hmac::Mac;
use rsa::pkcs8::DecodePublicKey;
use sha2::Digest;

/// Signature and MAC primitives used to verify ID tokens.
///
/// The verifier decides *which* primitive to invoke and with which key material; implementations
/// only answer whether a single signature is valid. Implementations must not include key material
/// in returned errors.
pub trait CryptoBackend: Send + Sync {
    /// Verify an HMAC over `message` keyed by `key` (the client secret).
    fn verify_hmac(
        &self,
        alg: &CoreJwsSigningAlgorithm,
        key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureVerificationError>;

    /// Verify an RSA or ECDSA signature over `message` using the public key of `certificate`.
    fn verify_with_certificate(
        &self,
        alg: &CoreJwsSigningAlgorithm,
        certificate: &TrustedCertificate,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureVerificationError>;
}

/// Default [`CryptoBackend`] built on the RustCrypto crates.
#[derive(Clone, Copy, Debug, Default)]
pub struct RustCryptoBackend;

impl CryptoBackend for RustCryptoBackend {
    fn verify_hmac(
        &self,
        alg: &CoreJwsSigningAlgorithm,
        key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureVerificationError> {
        match *alg {
            CoreJwsSigningAlgorithm::HmacSha256 => {
                verify_hmac::<hmac::Hmac<sha2::Sha256>>(key, message, signature)
            }
            CoreJwsSigningAlgorithm::HmacSha384 => {
                verify_hmac::<hmac::Hmac<sha2::Sha384>>(key, message, signature)
            }
            CoreJwsSigningAlgorithm::HmacSha512 => {
                verify_hmac::<hmac::Hmac<sha2::Sha512>>(key, message, signature)
            }
            ref other => Err(SignatureVerificationError::UnsupportedAlg(other.to_string())),
        }
    }

    fn verify_with_certificate(
        &self,
        alg: &CoreJwsSigningAlgorithm,
        certificate: &TrustedCertificate,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureVerificationError> {
        let spki = certificate.public_key_der();
        match *alg {
            CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256 => verify_rsa_signature(
                spki,
                rsa::Pkcs1v15Sign::new::<sha2::Sha256>(),
                &sha2::Sha256::digest(message),
                signature,
            ),
            CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha384 => verify_rsa_signature(
                spki,
                rsa::Pkcs1v15Sign::new::<sha2::Sha384>(),
                &sha2::Sha384::digest(message),
                signature,
            ),
            CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha512 => verify_rsa_signature(
                spki,
                rsa::Pkcs1v15Sign::new::<sha2::Sha512>(),
                &sha2::Sha512::digest(message),
                signature,
            ),
            CoreJwsSigningAlgorithm::EcdsaP256Sha256 => {
                use p256::ecdsa::signature::Verifier;

                let public_key = p256::PublicKey::from_public_key_der(spki).map_err(|_| {
                    SignatureVerificationError::InvalidKey("not a P-256 public key".to_string())
                })?;
                let signature = p256::ecdsa::Signature::from_slice(signature).map_err(|_| {
                    SignatureVerificationError::CryptoError("malformed ECDSA signature".to_string())
                })?;
                p256::ecdsa::VerifyingKey::from(&public_key)
                    .verify(message, &signature)
                    .map_err(|_| SignatureVerificationError::CryptoError("bad ECDSA".to_string()))
            }
            CoreJwsSigningAlgorithm::EcdsaP384Sha384 => {
                use p384::ecdsa::signature::Verifier;

                let public_key = p384::PublicKey::from_public_key_der(spki).map_err(|_| {
                    SignatureVerificationError::InvalidKey("not a P-384 public key".to_string())
                })?;
                let signature = p384::ecdsa::Signature::from_slice(signature).map_err(|_| {
                    SignatureVerificationError::CryptoError("malformed ECDSA signature".to_string())
                })?;
                p384::ecdsa::VerifyingKey::from(&public_key)
                    .verify(message, &signature)
                    .map_err(|_| SignatureVerificationError::CryptoError("bad ECDSA".to_string()))
            }
            CoreJwsSigningAlgorithm::EcdsaP521Sha512 => {
                use p521::ecdsa::signature::Verifier;

                let public_key = p521::PublicKey::from_public_key_der(spki).map_err(|_| {
                    SignatureVerificationError::InvalidKey("not a P-521 public key".to_string())
                })?;
                let verifying_key = p521::ecdsa::VerifyingKey::from_affine(*public_key.as_affine())
                    .map_err(|_| {
                        SignatureVerificationError::InvalidKey("not a P-521 public key".to_string())
                    })?;
                let signature = p521::ecdsa::Signature::from_slice(signature).map_err(|_| {
                    SignatureVerificationError::CryptoError("malformed ECDSA signature".to_string())
                })?;
                verifying_key
                    .verify(message, &signature)
                    .map_err(|_| SignatureVerificationError::CryptoError("bad ECDSA".to_string()))
            }
            ref other => Err(SignatureVerificationError::UnsupportedAlg(other.to_string())),
        }
    }
}

fn verify_hmac<M>(
    key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureVerificationError>
where
    M: Mac + hmac::digest::KeyInit,
{
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| SignatureVerificationError::Other(format!("Could not create key: {}", e)))?;
    mac.update(message);
    mac.verify_slice(signature)
        .map_err(|_| SignatureVerificationError::CryptoError("bad HMAC".to_string()))
}

fn verify_rsa_signature(
    spki: &[u8],
    padding: rsa::Pkcs1v15Sign,
    hashed: &[u8],
    signature: &[u8],
) -> Result<(), SignatureVerificationError> {
    let public_key = rsa::RsaPublicKey::from_public_key_der(spki)
        .map_err(|_| SignatureVerificationError::InvalidKey("not an RSA public key".to_string()))?;
    public_key
        .verify(padding, hashed, signature)
        .map_err(|_| SignatureVerificationError::CryptoError("bad RSA signature".to_string()))
}
