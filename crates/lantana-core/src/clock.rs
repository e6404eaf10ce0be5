//! Injectable time sources.
//!
//! Components never read the system clock directly; they are handed a
//! [`Clock`]. Timestamps are truncated to microseconds, the precision the
//! bundle format records.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// A clock that starts at a fixed instant and advances by a fixed step on
/// every read. A zero step always returns the same instant.
#[derive(Debug)]
pub struct FixedClock {
    start: DateTime<Utc>,
    step_micros: i64,
    reads: AtomicI64,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start: start.trunc_subsecs(6),
            step_micros: 0,
            reads: AtomicI64::new(0),
        }
    }

    /// Builder: advance by `step` after each read.
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step_micros = step.num_microseconds().unwrap_or(0);
        self
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.reads.fetch_add(1, Ordering::Relaxed);
        self.start + Duration::microseconds(n * self.step_micros)
    }
}

/// ISO-8601 with microseconds and a `Z` suffix, e.g. `2024-01-01T00:00:00.000000Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// True if `raw` is a UTC RFC 3339 timestamp with a `Z` suffix and a
/// fractional-seconds part, the shape [`format_timestamp`] writes.
pub fn is_bundle_timestamp(raw: &str) -> bool {
    let Some(body) = raw.strip_suffix('Z') else {
        return false;
    };
    let has_fraction = body
        .rsplit_once('.')
        .is_some_and(|(_, frac)| !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()));
    has_fraction && DateTime::parse_from_rfc3339(raw).is_ok()
}

/// Serde adapter writing timestamps with [`format_timestamp`].
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
