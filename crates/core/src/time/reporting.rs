use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Utc, Weekday};

// Ad platforms keep restating a day's numbers for a few hours after
// midnight; before this local hour the previous day is not settled yet and
// the digest reaches one day further back.
const SETTLED_CUTOFF_HOUR: u32 = 6;

/// The day a digest run should report on: an explicit override, or the most
/// recent fully settled day in the account's reporting timezone.
pub fn resolve_report_date(
    date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    tz_offset_hours: i32,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = date_arg {
        return Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?);
    }

    let tz = FixedOffset::east_opt(tz_offset_hours * 3600).context("invalid reporting offset")?;
    let now_local = now_utc.with_timezone(&tz);

    let mut date = now_local.date_naive() - Duration::days(1);
    if now_local.hour() < SETTLED_CUTOFF_HOUR {
        date = date - Duration::days(1);
    }
    Ok(date)
}

/// Current calendar date in the account's reporting timezone.
pub fn current_date(now_utc: DateTime<Utc>, tz_offset_hours: i32) -> anyhow::Result<NaiveDate> {
    let tz = FixedOffset::east_opt(tz_offset_hours * 3600).context("invalid reporting offset")?;
    Ok(now_utc.with_timezone(&tz).date_naive())
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let d = resolve_report_date(Some("2025-12-24"), now, 0).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 12, 24).unwrap());
    }

    #[test]
    fn settled_day_is_yesterday_after_the_cutoff() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let d = resolve_report_date(None, now, 0).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 4).unwrap());
    }

    #[test]
    fn before_the_cutoff_reaches_one_day_further_back() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 3, 0, 0).unwrap();
        let d = resolve_report_date(None, now, 0).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 3).unwrap());
    }

    #[test]
    fn offset_shifts_the_local_clock() {
        // 2026-01-05 22:00 UTC is already 07:00 on the 6th at UTC+9, past
        // the cutoff, so the settled day is the 5th.
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 22, 0, 0).unwrap();
        let d = resolve_report_date(None, now, 9).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    }

    #[test]
    fn weekend_flag_matches_the_calendar() {
        // 2026-01-03 is Saturday, the 4th Sunday, the 5th Monday.
        assert!(is_weekend(NaiveDate::from_ymd_opt(2026, 1, 3).unwrap()));
        assert!(is_weekend(NaiveDate::from_ymd_opt(2026, 1, 4).unwrap()));
        assert!(!is_weekend(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()));
    }
}
