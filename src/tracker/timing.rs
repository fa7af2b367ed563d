use chrono::{DateTime, Days, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// The school's time zone. Hour slots and the daily refresh boundary follow
/// it, not UTC and not the server's locale.
pub const HOME_TZ: Tz = chrono_tz::America::New_York;

/// How long until the next wall-clock boundary of `period` (top of the
/// second, top of the minute). Drivers sleep this amount every iteration
/// rather than using a free-running interval, so ticks stay aligned even
/// after a slow callback.
pub fn until_next_boundary(period: Duration) -> Duration {
    let period_ms = period.as_millis() as i64;
    let rem = Utc::now().timestamp_millis().rem_euclid(period_ms);
    Duration::from_millis((period_ms - rem) as u64)
}

/// Next midnight in the home time zone, as a UTC instant. Recomputed from the
/// calendar on every firing so DST shifts move the boundary instead of
/// drifting a fixed 24h period.
pub fn next_home_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_date = now.with_timezone(&HOME_TZ).date_naive();
    let mut next_day = local_date + Days::new(1);
    loop {
        // Midnight can be skipped by a DST jump in some zones; fall forward a
        // day at a time until a representable local midnight is found.
        let candidate = next_day.and_hms_opt(0, 0, 0).expect("valid midnight");
        match HOME_TZ.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => next_day = next_day + Days::new(1),
        }
    }
}
