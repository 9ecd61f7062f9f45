//! Pure epoch/calendar conversions used by the query post-filters and the
//! statistics partitions. All functions take epoch seconds unless noted;
//! pre-epoch inputs saturate to the epoch instead of panicking.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs.max(0), 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Epoch milliseconds to epoch seconds.
pub fn ms_to_sec(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

pub fn second_of_minute(secs: i64) -> u32 {
    at(secs).second()
}

/// Seconds since midnight UTC.
pub fn second_of_day(secs: i64) -> u32 {
    at(secs).num_seconds_from_midnight()
}

pub fn minute_of_day(secs: i64) -> u32 {
    second_of_day(secs) / 60
}

pub fn hour_of_day(secs: i64) -> u32 {
    at(secs).hour()
}

/// Day of week, Sunday = 0 .. Saturday = 6.
pub fn weekday(secs: i64) -> u32 {
    at(secs).weekday().num_days_from_sunday()
}

/// Day of month, 1-based.
pub fn day_of_month(secs: i64) -> u32 {
    at(secs).day()
}

/// Month of year, 1-based.
pub fn month_of_year(secs: i64) -> u32 {
    at(secs).month()
}

pub fn start_of_minute(secs: i64) -> i64 {
    let secs = secs.max(0);
    secs - secs % 60
}

pub fn start_of_day(secs: i64) -> i64 {
    let secs = secs.max(0);
    secs - i64::from(at(secs).num_seconds_from_midnight())
}

pub fn start_of_year(secs: i64) -> i64 {
    let year = at(secs).year();
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .map_or(0, |dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2019-01-01 20:30:50 UTC
    const T: i64 = 1_546_374_650;

    #[test]
    fn test_ms_to_sec() {
        assert_eq!(ms_to_sec(T * 1000 + 999), T);
        assert_eq!(ms_to_sec(0), 0);
    }

    #[test]
    fn test_time_of_day_parts() {
        assert_eq!(hour_of_day(T), 20);
        assert_eq!(second_of_minute(T), 50);
        assert_eq!(second_of_day(T), 20 * 3600 + 30 * 60 + 50);
        assert_eq!(minute_of_day(T), 20 * 60 + 30);
    }

    #[test]
    fn test_calendar_parts() {
        // 2019-01-01 was a Tuesday.
        assert_eq!(weekday(T), 2);
        assert_eq!(day_of_month(T), 1);
        assert_eq!(month_of_year(T), 1);
    }

    #[test]
    fn test_period_starts() {
        assert_eq!(start_of_minute(T), T - 50);
        assert_eq!(start_of_day(T) % 86_400, 0);
        assert_eq!(start_of_year(T), 1_546_300_800); // 2019-01-01 00:00:00
    }

    #[test]
    fn test_pre_epoch_saturates() {
        assert_eq!(hour_of_day(-5), 0);
        assert_eq!(start_of_day(-5), 0);
        assert_eq!(weekday(-5), weekday(0));
    }
}
