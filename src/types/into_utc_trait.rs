use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Converts a request timestamp into a UTC instant.
///
/// Naive timestamps are interpreted in the request's timezone; aware timestamps
/// keep their own offset and the zone is ignored.
pub trait IntoUtcDateTime {
    fn into_utc(self, timezone: &Tz) -> DateTime<Utc>;
}

impl IntoUtcDateTime for NaiveDateTime {
    fn into_utc(self, timezone: &Tz) -> DateTime<Utc> {
        match timezone.from_local_datetime(&self) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // Inside a DST gap: treat the wall clock time as UTC.
            LocalResult::None => Utc.from_utc_datetime(&self),
        }
    }
}

impl IntoUtcDateTime for DateTime<Utc> {
    fn into_utc(self, _timezone: &Tz) -> DateTime<Utc> {
        self
    }
}

impl IntoUtcDateTime for DateTime<FixedOffset> {
    fn into_utc(self, _timezone: &Tz) -> DateTime<Utc> {
        self.with_timezone(&Utc)
    }
}

impl IntoUtcDateTime for DateTime<Tz> {
    fn into_utc(self, _timezone: &Tz) -> DateTime<Utc> {
        self.with_timezone(&Utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_naive_is_localized_in_request_zone() {
        let naive = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let utc = naive.into_utc(&chrono_tz::Europe::Berlin);
        assert_eq!(utc.to_rfc3339(), "2024-07-01T10:00:00+00:00");
    }

    #[test]
    fn test_aware_keeps_its_offset() {
        let dt = DateTime::parse_from_rfc3339("2024-01-15T06:00:00+01:00").unwrap();
        let utc = dt.into_utc(&chrono_tz::America::New_York);
        assert_eq!(utc.to_rfc3339(), "2024-01-15T05:00:00+00:00");
    }
}
