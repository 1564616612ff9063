use crate::core::CoreJwsSigningAlgorithm;
use crate::helpers::base64_url_safe_no_pad;

use base64::Engine;
use serde::de::{DeserializeOwned, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use std::fmt::{Debug, Display, Formatter, Result as FormatterResult};
use std::marker::PhantomData;
use std::str::FromStr;


/// Segment of a compact-serialized JWT.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenSegment {
    /// JOSE header (first segment).
    Header,
    /// Claims payload (second segment).
    Payload,
    /// Signature (third segment).
    Signature,
}
impl Display for TokenSegment {
    fn fmt(&self, f: &mut Formatter) -> FormatterResult {
        match self {
            TokenSegment::Header => f.write_str("header"),
            TokenSegment::Payload => f.write_str("payload"),
            TokenSegment::Signature => f.write_str("signature"),
        }
    }
}

/// Error decoding a compact-serialized JWT.
///
/// Errors describe the failing segment but never include the token's contents, since they may
/// carry personal data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The token did not have two or three `.`-separated segments.
    #[error("Invalid JSON web token: found {0} parts (expected 3)")]
    SegmentCount(usize),
    /// A segment was not valid base64url.
    #[error("Invalid base64url {segment} encoding")]
    Base64 {
        /// Segment that failed to decode.
        segment: TokenSegment,
        /// Underlying decode error.
        #[source]
        source: base64::DecodeError,
    },
    /// The header or payload was not valid JSON of the expected shape.
    #[error("Failed to parse {segment} JSON")]
    Json {
        /// Segment that failed to parse.
        segment: TokenSegment,
        /// Underlying parse error, including the JSON path of the failure.
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
}

/// JOSE header of a JWS. Only `alg` is interpreted; all other fields are preserved.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct JsonWebTokenHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}
impl JsonWebTokenHeader {
    /// Create a header declaring `alg`.
    pub fn new(alg: Option<String>) -> Self {
        Self {
            alg,
            other: serde_json::Map::new(),
        }
    }

    /// The declared `alg`, if any. An empty string is treated as not declared.
    pub fn alg(&self) -> Option<&str> {
        self.alg.as_deref().filter(|alg| !alg.is_empty())
    }

    /// The declared `alg`, if it is one this crate can verify.
    pub fn signing_alg(&self) -> Option<CoreJwsSigningAlgorithm> {
        self.alg().and_then(CoreJwsSigningAlgorithm::from_alg)
    }

    /// Header fields other than `alg`.
    pub fn other_fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.other
    }
}

/// Compact-serialized JSON Web Token whose payload has been decoded but not verified.
#[derive(Clone, PartialEq)]
pub struct JsonWebToken<P> {
    header: JsonWebTokenHeader,
    payload: P,
    signature: Vec<u8>,
    signing_input: String,
}
impl<P> JsonWebToken<P>
where
    P: DeserializeOwned,
{
    /// Decode a compact-serialized JWT.
    ///
    /// Both `header.payload.signature` and the unsigned `header.payload` forms are accepted;
    /// an absent signature segment decodes as an empty signature.
    pub fn decode(raw_token: &str) -> Result<Self, DecodeError> {
        let parts = raw_token.split('.').collect::<Vec<_>>();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(DecodeError::SegmentCount(parts.len()));
        }

        let header = decode_json_segment(TokenSegment::Header, parts[0])?;
        let payload = decode_json_segment(TokenSegment::Payload, parts[1])?;
        let signature = match parts.get(2) {
            Some(signature) => base64_url_safe_no_pad()
                .decode(signature)
                .map_err(|source| DecodeError::Base64 {
                    segment: TokenSegment::Signature,
                    source,
                })?,
            None => Vec::new(),
        };

        Ok(Self {
            header,
            payload,
            signature,
            signing_input: format!("{}.{}", parts[0], parts[1]),
        })
    }
}
impl<P> JsonWebToken<P> {
    /// The decoded JOSE header.
    pub fn unverified_header(&self) -> &JsonWebTokenHeader {
        &self.header
    }

    /// The decoded payload. Nothing about it has been verified.
    pub fn unverified_payload(&self) -> &P {
        &self.payload
    }

    /// The raw signature bytes (empty for unsigned tokens).
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The `header.payload` bytes covered by the signature.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }
}
// Payloads may carry personal data, so only the header is printed.
impl<P> Debug for JsonWebToken<P> {
    fn fmt(&self, f: &mut Formatter) -> FormatterResult {
        f.debug_struct("JsonWebToken")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
impl<P> FromStr for JsonWebToken<P>
where
    P: DeserializeOwned,
{
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
impl<'de, P> Deserialize<'de> for JsonWebToken<P>
where
    P: DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct JsonWebTokenVisitor<P>(PhantomData<P>);
        impl<'de, P> Visitor<'de> for JsonWebTokenVisitor<P>
        where
            P: DeserializeOwned,
        {
            type Value = JsonWebToken<P>;

            fn expecting(&self, formatter: &mut Formatter) -> FormatterResult {
                formatter.write_str("JsonWebToken")
            }

            fn visit_str<DE>(self, v: &str) -> Result<Self::Value, DE>
            where
                DE: serde::de::Error,
            {
                JsonWebToken::decode(v).map_err(DE::custom)
            }
        }
        deserializer.deserialize_str(JsonWebTokenVisitor(PhantomData))
    }
}
impl<P> Serialize for JsonWebToken<P> {
    fn serialize<SE>(&self, serializer: SE) -> Result<SE::Ok, SE::Error>
    where
        SE: Serializer,
    {
        if self.signature.is_empty() {
            return serializer.serialize_str(&self.signing_input);
        }
        let signature_base64 = base64_url_safe_no_pad().encode(&self.signature);
        serializer.serialize_str(&format!("{}.{}", self.signing_input, signature_base64))
    }
}

fn decode_json_segment<T>(segment: TokenSegment, encoded: &str) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
{
    let raw = base64_url_safe_no_pad()
        .decode(encoded)
        .map_err(|source| DecodeError::Base64 { segment, source })?;
    let deserializer = &mut serde_json::Deserializer::from_slice(&raw);
    serde_path_to_error::deserialize(deserializer)
        .map_err(|source| DecodeError::Json { segment, source })
}
