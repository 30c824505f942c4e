//! RFC 3339 timestamps for turns.
//!
//! Use with `#[serde(with = "crate::utils::time")]` on an `OffsetDateTime` field.

use serde::{Deserialize, Deserializer, Serializer, de, ser};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

/// Serialize an `OffsetDateTime` as an RFC 3339 string.
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = datetime.format(&Rfc3339).map_err(ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}

/// Deserialize an RFC 3339 string into an `OffsetDateTime`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&raw, &Rfc3339).map_err(de::Error::custom)
}

/// Wall-clock `HH:MM:SS` for history listings.
pub fn clock(datetime: OffsetDateTime) -> String {
    datetime
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".to_string())
}
