use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

pub const FALLBACK_DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

// Longest real-world DST gap is two hours.
const GAP_STEP_MINUTES: i64 = 15;
const MAX_GAP_STEPS: usize = 16;

/// Parses the deployment default. An unknown name degrades to UTC.
pub fn parse_default_timezone(name: &str) -> Tz {
    name.trim().parse::<Tz>().unwrap_or(Tz::UTC)
}

/// Resolves a user's stored timezone, falling back to `default` when it is
/// missing, blank or not an IANA name.
pub fn resolve_timezone(name: Option<&str>, default: Tz) -> Tz {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(default)
}

/// Local calendar date of `at` in `tz`.
pub fn calendar_date_key(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: Tz) -> bool {
    calendar_date_key(a, tz) == calendar_date_key(b, tz)
}

/// First instant of the next local day. A midnight skipped by a DST jump
/// resolves to the first valid local time after it; an ambiguous one to the
/// earlier instant.
pub fn next_local_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    calendar_date_key(now, tz)
        .succ_opt()
        .and_then(|tomorrow| first_valid_instant(tomorrow.and_time(NaiveTime::MIN), tz))
        .unwrap_or(now + TimeDelta::days(1))
}

/// First local occurrence of `time` strictly after `now`. Gaps and overlaps
/// resolve the same way as in [`next_local_midnight`].
pub fn next_local_time(now: DateTime<Utc>, tz: Tz, time: NaiveTime) -> DateTime<Utc> {
    let mut date = calendar_date_key(now, tz);
    for _ in 0..3 {
        if let Some(instant) = first_valid_instant(date.and_time(time), tz) {
            if instant > now {
                return instant;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    now + TimeDelta::days(1)
}

fn first_valid_instant(mut local: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    for _ in 0..MAX_GAP_STEPS {
        if let Some(instant) = tz.from_local_datetime(&local).earliest() {
            return Some(instant.with_timezone(&Utc));
        }
        local += TimeDelta::minutes(GAP_STEP_MINUTES);
    }
    None
}

pub fn next_top_of_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    let next = (now.timestamp().div_euclid(3600) + 1) * 3600;
    DateTime::<Utc>::from_timestamp(next, 0).unwrap_or(now + TimeDelta::hours(1))
}
