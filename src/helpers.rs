use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use std::fmt::{Display, Formatter};

// Providers occasionally pad their base64url segments, so accept either on decode.
pub(crate) fn base64_url_safe_no_pad() -> GeneralPurpose {
    GeneralPurpose::new(
        &alphabet::URL_SAFE,
        NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
    )
}

// Some providers emit numeric user identifiers; accept them as strings.
pub(crate) fn deserialize_string_or_number_opt<'de, T, D>(
    deserializer: D,
) -> Result<Option<T>, D::Error>
where
    T: From<String>,
    D: serde::de::Deserializer<'de>,
{
    use serde::de::Error;

    let value: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(T::from(s))),
        Some(serde_json::Value::Number(n)) => Ok(Some(T::from(n.to_string()))),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, found {}",
            value_kind(&other)
        ))),
    }
}

pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Timestamp as seconds since the unix epoch.
///
/// Providers are inconsistent about emitting integer or fractional seconds, so the raw JSON number
/// is retained and only interpreted when compared.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Timestamp(serde_json::Number);
impl Timestamp {
    /// Create a timestamp from whole seconds since the unix epoch.
    pub fn from_seconds(seconds: i64) -> Self {
        Timestamp(seconds.into())
    }

    /// The timestamp as (possibly fractional) seconds since the unix epoch.
    pub fn as_seconds(&self) -> Option<f64> {
        self.0.as_f64()
    }

    /// A zero timestamp is indistinguishable from an absent one for presence checks.
    pub(crate) fn is_zero(&self) -> bool {
        self.as_seconds().map_or(true, |seconds| seconds == 0.0)
    }

    /// Convert to a UTC datetime, if in range.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let (secs, nsecs) = if let Some(secs) = self.0.as_i64() {
            (secs, 0u32)
        } else {
            let secs_f64 = self.0.as_f64()?;
            let secs = secs_f64.floor();
            (
                secs as i64,
                ((secs_f64 - secs) * 1_000_000_000.).floor() as u32,
            )
        };
        Utc.timestamp_opt(secs, nsecs).single()
    }
}
impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        Display::fmt(&self.0, f)
    }
}

/// Current time in whole seconds, rounded to the nearest second from millisecond precision.
pub(crate) fn rounded_unix_seconds(now: &DateTime<Utc>) -> i64 {
    (now.timestamp_millis() as f64 / 1000.0).round() as i64
}
