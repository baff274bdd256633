//! Timestamp and decimal codecs for the database layer.
//!
//! Timestamps are stored as `INTEGER` Unix epoch milliseconds (UTC); money is
//! stored as `TEXT` so no precision is lost on round trips.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::{Error, Result};

#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[inline]
pub fn datetime_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Values outside chrono's range clamp to the nearest representable timestamp.
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    match Utc.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => {
            if ms.is_negative() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            }
        }
    }
}

pub fn decimal_to_db(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

pub fn decimal_from_db(column: &str, value: Option<&str>) -> Result<Option<Decimal>> {
    value
        .map(|raw| {
            Decimal::from_str(raw)
                .map_err(|e| Error::validation(format!("invalid decimal in {column}: {raw} ({e})")))
        })
        .transpose()
}
