//! Serde helpers that write durations as (fractional) seconds, plus a parser for durations
//! given on the command line.

use std::time::Duration;

use serde::{de::Error, Deserialize, Deserializer, Serializer};

use crate::{EnvcoreError, EnvcoreResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Serializes a [`Duration`] as a number of seconds.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Deserializes a [`Duration`] from a non-negative number of seconds.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| D::Error::custom(format!("invalid duration in seconds: {secs}")))
}

/// Parses a duration written as seconds (`5`, `2.5`, `5s`) or milliseconds (`500ms`).
pub fn parse(value: &str) -> EnvcoreResult<Duration> {
    let value = value.trim();
    let (number, scale) = if let Some(ms) = value.strip_suffix("ms") {
        (ms, 1e-3)
    } else if let Some(secs) = value.strip_suffix('s') {
        (secs, 1.0)
    } else {
        (value, 1.0)
    };

    number
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|n| Duration::try_from_secs_f64(n * scale).ok())
        .ok_or_else(|| EnvcoreError::Configuration(format!("invalid duration: '{value}'")))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
