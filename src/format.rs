//! Human-readable rendering of arrival estimates.

use chrono::{DateTime, TimeZone};

/// Formats the time remaining until `estimated` as seen at `now`.
///
/// | Input                         | Output      |
/// |-------------------------------|-------------|
/// | no estimate                   | `N/A`       |
/// | rounds to zero minutes or less | `Arriving` |
/// | rounds to one minute          | `1 min`     |
/// | rounds to `n` minutes         | `n mins`    |
///
/// Minutes round to nearest with halves going down, so 90 s is `1 min`
/// and 150 s is `2 mins`.
pub fn format_arrival<Tz1, Tz2>(now: DateTime<Tz1>, estimated: Option<DateTime<Tz2>>) -> String
where
    Tz1: TimeZone,
    Tz2: TimeZone,
{
    let Some(estimated) = estimated else {
        return "N/A".into();
    };

    let seconds = estimated
        .with_timezone(&chrono::Utc)
        .signed_duration_since(now.with_timezone(&chrono::Utc))
        .num_seconds();
    let minutes = (seconds as f64 / 60.0 - 0.5).ceil() as i64;

    match minutes {
        m if m <= 0 => "Arriving".into(),
        1 => "1 min".into(),
        m => format!("{m} mins"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    #[test]
    fn test_format_arrival_cases() {
        let now = Utc::now();
        assert_eq!(format_arrival(now, Some(now + Duration::seconds(90))), "1 min");
        assert_eq!(format_arrival(now, Some(now - Duration::seconds(5))), "Arriving");
        assert_eq!(format_arrival::<Utc, Utc>(now, None), "N/A");
        assert_eq!(format_arrival(now, Some(now + Duration::seconds(150))), "2 mins");
    }

    #[test]
    fn test_format_arrival_under_a_minute_is_arriving() {
        let now = Utc::now();
        assert_eq!(format_arrival(now, Some(now + Duration::seconds(30))), "Arriving");
        assert_eq!(format_arrival(now, Some(now)), "Arriving");
    }

    #[test]
    fn test_format_arrival_rounds_to_nearest_minute() {
        let now = Utc::now();
        assert_eq!(format_arrival(now, Some(now + Duration::seconds(110))), "2 mins");
        assert_eq!(format_arrival(now, Some(now + Duration::seconds(45))), "1 min");
        assert_eq!(format_arrival(now, Some(now + Duration::seconds(89))), "1 min");
        assert_eq!(format_arrival(now, Some(now + Duration::seconds(151))), "3 mins");
    }

    #[test]
    fn test_format_arrival_across_timezones() {
        // DataMall reports +08:00 timestamps
        let sgt = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = Utc::now();
        let estimated = (now + Duration::minutes(12)).with_timezone(&sgt);
        assert_eq!(format_arrival(now, Some(estimated)), "12 mins");
    }
}
