// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DateTime Serde Module
//!
//! RFC3339 serialization for the timestamp fields of the staging state
//! (`staged_at`, `base_modified_at`). Timestamps are stored internally as
//! `DateTime<Utc>` and rendered in a *stable display timezone* derived from
//! the `TZ` environment variable:
//!
//! - `TZ` unset or empty → the process-local timezone
//! - `TZ` set to a valid IANA name → that timezone
//! - `TZ` set but unrecognized → UTC
//!
//! The resolution happens once and is cached for the lifetime of the
//! process, so repeated serializations of the same state are byte-stable.
//! Deserialization accepts any RFC3339 offset and normalizes to UTC.
//!
//! ## Usage
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize)]
//! struct Entry {
//!     #[serde(with = "datetime_serde")]
//!     staged_at: DateTime<Utc>,
//!     #[serde(default, with = "datetime_serde::optional")]
//!     base_modified_at: Option<DateTime<Utc>>,
//! }
//! ```

use chrono::{DateTime, Local, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serializer};

/// The display timezone staged timestamps are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayZone {
    /// Process-local timezone (TZ unset or empty).
    Local,
    /// UTC fallback (TZ set but unrecognized).
    Utc,
    /// A named IANA timezone from TZ.
    Named(chrono_tz::Tz),
}

static DISPLAY_ZONE: OnceCell<DisplayZone> = OnceCell::new();

/// Resolves a raw `TZ` value into a display zone.
///
/// Pure so the fallback rules are testable without touching the process
/// environment; [`display_zone`] applies it to the real variable once.
pub fn resolve_zone(tz: Option<&str>) -> DisplayZone {
    match tz {
        None => DisplayZone::Local,
        Some(raw) if raw.trim().is_empty() => DisplayZone::Local,
        Some(raw) => match raw.trim().parse::<chrono_tz::Tz>() {
            Ok(named) => DisplayZone::Named(named),
            Err(_) => DisplayZone::Utc,
        },
    }
}

/// The cached display zone for this process.
///
/// Reads `TZ` on first use; later changes to the environment do not affect
/// an already-running process.
pub fn display_zone() -> DisplayZone {
    *DISPLAY_ZONE.get_or_init(|| resolve_zone(std::env::var("TZ").ok().as_deref()))
}

/// Renders a UTC instant as RFC3339 in the cached display zone.
pub fn format_rfc3339(dt: &DateTime<Utc>) -> String {
    match display_zone() {
        DisplayZone::Local => dt.with_timezone(&Local).to_rfc3339(),
        DisplayZone::Utc => dt.to_rfc3339(),
        DisplayZone::Named(tz) => dt.with_timezone(&tz).to_rfc3339(),
    }
}

/// Parses an RFC3339 string and normalizes it to UTC.
pub fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Serializes a `DateTime<Utc>` as an RFC3339 string in the display zone.
pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_rfc3339(dt))
}

/// Deserializes an RFC3339 string into a `DateTime<Utc>`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_rfc3339(&s).map_err(serde::de::Error::custom)
}

/// RFC3339 serialization for `Option<DateTime<Utc>>` fields.
///
/// `None` serializes as JSON null and deserializes from null or absence
/// (with `#[serde(default)]`).
pub mod optional {
    use super::*;

    pub fn serialize<S>(opt_dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match opt_dt {
            Some(dt) => serializer.serialize_some(&format_rfc3339(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) => parse_rfc3339(&s).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
