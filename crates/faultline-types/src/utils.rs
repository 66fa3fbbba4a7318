use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serializer;

/// Unix timestamp with microsecond precision, as the protocol expects for event times
pub(crate) fn timestamp_to_f64(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp_micros() as f64 / 1_000_000.0
}

/// ISO 8601 with a trailing `Z` and no fractional seconds: `2025-10-12T12:15:47Z`
pub(crate) fn format_sent_at(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn serialize_timestamp<S: Serializer>(
    dt: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(timestamp_to_f64(dt))
}

pub(crate) fn serialize_opt_timestamp<S: Serializer>(
    dt: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match dt {
        Some(dt) => serializer.serialize_f64(timestamp_to_f64(dt)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sent_at_has_trailing_z() {
        let dt = Utc.with_ymd_and_hms(2025, 10, 12, 12, 15, 47).unwrap();
        assert_eq!(format_sent_at(&dt), "2025-10-12T12:15:47Z");
    }

    #[test]
    fn timestamp_keeps_microseconds() {
        let dt = Utc.timestamp_micros(1_700_000_000_250_000).unwrap();
        assert_eq!(timestamp_to_f64(&dt), 1_700_000_000.25);
    }
}
