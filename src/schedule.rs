use crate::tracker::timing::HOME_TZ;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};

/// Class start time for a bell period, per the conference schedule.
pub fn start_time_for_period(period: u8) -> Option<NaiveTime> {
    let (hour, minute) = match period {
        1 => (8, 0),
        2 => (8, 50),
        3 => (9, 40),
        4 => (10, 30),
        5 => (11, 20),
        6 => (12, 10),
        7 => (13, 0),
        8 => (13, 50),
        9 => (14, 40),
        10 => (15, 30),
        _ => return None,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Accepts "today", "tomorrow", `MM/DD` or `YYYY-MM-DD`. A month/day that
/// has already passed rolls into next year.
pub fn parse_due_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    match input.trim().to_ascii_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.succ_opt(),
        text => {
            if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return Some(date);
            }
            let (month, day) = text.split_once('/')?;
            let month: u32 = month.parse().ok()?;
            let day: u32 = day.parse().ok()?;
            let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if date < today {
                date.with_year(today.year() + 1)
            } else {
                Some(date)
            }
        }
    }
}

/// Resolve a home-time-zone date plus optional bell period to an absolute
/// instant. Without a period the homework is due at the end of the day.
pub fn due_instant(date: NaiveDate, period: Option<u8>) -> Option<DateTime<Utc>> {
    let time = match period {
        Some(period) => start_time_for_period(period)?,
        None => NaiveTime::from_hms_opt(23, 59, 0)?,
    };
    HOME_TZ
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

pub fn today_home() -> NaiveDate {
    Utc::now().with_timezone(&HOME_TZ).date_naive()
}
