//! Helpers for the `{ "<tag>": u8, "data": {...} }` wire shape.
//!
//! Every union on the wire is an object with a numeric tag field and a
//! `data` payload. Decoding reads the tag first and only then parses
//! `data` into the payload type for that tag. Anything else fails:
//! a missing tag, an unknown tag, a missing `data`, extra keys next to
//! them, or a payload that does not match the tag.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Writes `{ tag_field: tag, "data": data }`.
pub fn serialize<S, T>(
    serializer: S,
    tag_field: &'static str,
    tag: u8,
    data: &T,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut state = serializer.serialize_struct("Tagged", 2)?;
    state.serialize_field(tag_field, &tag)?;
    state.serialize_field("data", data)?;
    state.end()
}

/// Reads the tag and the raw `data` value.
pub fn deserialize<'de, D>(
    deserializer: D,
    tag_field: &'static str,
) -> Result<(u8, Value), D::Error>
where
    D: Deserializer<'de>,
{
    let mut map = Map::<String, Value>::deserialize(deserializer)?;

    let tag = map
        .remove(tag_field)
        .ok_or_else(|| de::Error::missing_field(tag_field))?;
    let tag = tag
        .as_u64()
        .and_then(|t| u8::try_from(t).ok())
        .ok_or_else(|| {
            de::Error::custom(format!("{tag_field} must be a u8, got {tag}"))
        })?;

    let data = map
        .remove("data")
        .ok_or_else(|| de::Error::missing_field("data"))?;

    if let Some(extra) = map.keys().next() {
        return Err(de::Error::custom(format!("unexpected field `{extra}`")));
    }

    Ok((tag, data))
}

/// Parses a payload that was split off by [`deserialize`].
pub fn payload<T, E>(data: Value) -> Result<T, E>
where
    T: DeserializeOwned,
    E: de::Error,
{
    serde_json::from_value(data).map_err(E::custom)
}

/// Error for a tag that no variant claims.
pub fn unknown_tag<E: de::Error>(tag_field: &'static str, tag: u8) -> E {
    E::custom(format!("unknown {tag_field} {tag}"))
}

/// The empty payload `{}`; rejects any field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Empty {}
