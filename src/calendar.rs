//! Calendar arithmetic on the tick timeline.
//!
//! Instants are counted in 100-nanosecond ticks since 0001-01-01 00:00:00 in
//! the proleptic Gregorian calendar. The occurrence search does all of its
//! comparisons in ticks and only converts back to `chrono` types at the API
//! boundary. The civil conversions use the era-based algorithms, exact over
//! the whole searchable range.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

pub(crate) const TICKS_PER_SECOND: i64 = 10_000_000;
pub(crate) const TICKS_PER_DAY: i64 = 86_400 * TICKS_PER_SECOND;

/// Highest year the occurrence search will visit.
pub(crate) const MAX_YEAR: i32 = 2499;

/// Days between 0000-03-01 (the era origin of the civil conversions) and
/// 0001-01-01 (tick zero).
const ERA_OFFSET: i64 = 306;

#[inline]
pub(crate) fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Returns the number of days in the month, 28-31.
pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => unreachable!("month out of range: {month}"),
    }
}

/// Days since 0001-01-01 for a civil date.
pub(crate) fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let year = i64::from(year) - i64::from(month <= 2);
    let era = year.div_euclid(400);
    let yoe = year - era * 400;
    let mp = i64::from((month + 9) % 12);
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - ERA_OFFSET
}

/// Civil date for a count of days since 0001-01-01.
pub(crate) fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let days = days + ERA_OFFSET;
    let era = days.div_euclid(146_097);
    let doe = days.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    ((year + i64::from(month <= 2)) as i32, month, day)
}

/// Day of the week for a civil date, Sunday = 0 through Saturday = 6.
#[inline]
pub(crate) fn day_of_week(year: i32, month: u32, day: u32) -> u32 {
    // 0001-01-01 is a Monday
    (days_from_civil(year, month, day) + 1).rem_euclid(7) as u32
}

/// Recomposes civil date-time parts into ticks.
pub(crate) fn date_time_to_ticks(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> i64 {
    let seconds = i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second);
    days_from_civil(year, month, day) * TICKS_PER_DAY + seconds * TICKS_PER_SECOND
}

/// Decomposes ticks into `(second, minute, hour, day, month, year)`.
/// Sub-second tick remainders are below the resolution of the search and are
/// discarded.
pub(crate) fn fill_date_time_parts(ticks: i64) -> (u32, u32, u32, u32, u32, i32) {
    let days = ticks.div_euclid(TICKS_PER_DAY);
    let seconds = ticks.rem_euclid(TICKS_PER_DAY) / TICKS_PER_SECOND;
    let (year, month, day) = civil_from_days(days);
    (
        (seconds % 60) as u32,
        (seconds / 60 % 60) as u32,
        (seconds / 3600) as u32,
        day,
        month,
        year,
    )
}

/// Rounds ticks up to the next whole second.
#[inline]
pub(crate) fn ceiling_to_second(ticks: i64) -> i64 {
    let rem = ticks.rem_euclid(TICKS_PER_SECOND);
    if rem == 0 {
        ticks
    } else {
        ticks - rem + TICKS_PER_SECOND
    }
}

/// Realizes the `W` modifier: the closest Monday-Friday to the given day
/// without leaving the month.
pub(crate) fn move_to_nearest_week_day(year: i32, month: u32, day: u32) -> u32 {
    match day_of_week(year, month, day) {
        // Saturday backs up to Friday, unless that would cross into the
        // previous month
        6 => {
            if day == 1 {
                3
            } else {
                day - 1
            }
        }
        // Sunday moves on to Monday, unless that would cross into the next
        // month
        0 => {
            if day == days_in_month(year, month) {
                day - 2
            } else {
                day + 1
            }
        }
        _ => day,
    }
}

/// True iff the given day is the last occurrence of its weekday in the month.
#[inline]
pub(crate) fn is_last_day_of_week(year: i32, month: u32, day: u32) -> bool {
    day + 7 > days_in_month(year, month)
}

/// True iff the given day falls in the n-th occurrence of its weekday within
/// the month.
#[inline]
pub(crate) fn is_nth_day_of_week(day: u32, nth: u32) -> bool {
    (day + 6) / 7 == nth
}

/// Local civil time to ticks.
pub(crate) fn ticks_from_naive(local: NaiveDateTime) -> i64 {
    let date = local.date();
    let days = days_from_civil(date.year(), date.month(), date.day());
    days * TICKS_PER_DAY
        + i64::from(local.num_seconds_from_midnight()) * TICKS_PER_SECOND
        + i64::from(local.nanosecond()) / 100
}

/// Ticks to local civil time. Only called on search results, which always
/// name valid whole-second civil dates.
pub(crate) fn naive_from_ticks(ticks: i64) -> NaiveDateTime {
    let (second, minute, hour, day, month, year) = fill_date_time_parts(ticks);
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .expect("search results are valid civil dates")
}
