//! A Quartz-style cron expression parser and time-zone aware occurrence
//! finder.
//!
//! Expressions use the classic five-field layout (or six with a leading
//! seconds field, see [`Format`]) and support the Quartz extensions `L`, `W`,
//! `#`, `?`, month and weekday names, and the `@yearly`-style macros. A
//! parsed [`Cron`] value is a handful of bitmaps; matching a time against it
//! and walking to the next matching time are both branch-and-shift work with
//! no allocation.
//!
//! Occurrence searches are available on plain UTC timestamps and on any
//! [`chrono::TimeZone`], in which case the search understands daylight-saving
//! transitions: times skipped by a spring-forward jump are snapped to the
//! first valid instant, and times repeated by a fall-back overlap fire once
//! for fixed schedules and once per clock reading for repeating ones.
//!
//! # Example
//! ```
//! use cassia::Cron;
//! use chrono::{TimeZone, Utc};
//!
//! let cron: Cron = "*/15 9-17 * * MON-FRI".parse().expect("valid cron expression");
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let times: Vec<_> = cron.iter_from(start).take(3).collect();
//!
//! assert_eq!(times[0], Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
//! assert_eq!(times[1], Utc.with_ymd_and_hms(2024, 1, 1, 9, 15, 0).unwrap());
//! assert_eq!(times[2], Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap());
//! ```

mod calendar;
pub mod parse;
mod zoned;

use core::fmt::{self, Display, Formatter};
use core::hash::{Hash, Hasher};
use core::iter::FusedIterator;
use core::ops::{Bound, RangeBounds};
use core::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

pub use crate::parse::{CronExpr, Field, Format, ParseError};

pub(crate) mod internal {
    pub trait Sealed {}
}

// Full-range masks per field. The day-of-month and month bitmaps are
// one-based (bit 0 unused) so a calendar value is its own bit index. Day of
// week keeps bit 7 as the alternate spelling of Sunday.
const SECONDS_ALL: u64 = 0x0FFF_FFFF_FFFF_FFFF;
const MINUTES_ALL: u64 = 0x0FFF_FFFF_FFFF_FFFF;
const HOURS_ALL: u64 = 0x00FF_FFFF;
const DOMS_ALL: u64 = 0xFFFF_FFFE;
const MONTHS_ALL: u64 = 0x1FFE;
const DOWS_ALL: u64 = 0xFF;

/// Bit 0 only: the seconds bitmap of a five-field expression.
const SECONDS_DEFAULT: u64 = 1;

/// The finder's "no occurrence" sentinel; no searchable instant has tick 0.
pub(crate) const NOT_FOUND: i64 = 0;

#[inline]
const fn bit_set(bits: u64, index: u32) -> bool {
    bits & (1 << index) != 0
}

#[inline]
const fn first_set(bits: u64) -> u32 {
    bits.trailing_zeros()
}

/// Finds the lowest set bit strictly above `from`. When none remains, wraps
/// to the lowest set bit overall and reports `false`, which the search
/// interprets as a carry into the next coarser field.
#[inline]
const fn next_set(bits: u64, from: u32) -> (u32, bool) {
    if from >= 63 {
        return (bits.trailing_zeros(), false);
    }
    let above = (bits >> (from + 1)) << (from + 1);
    if above != 0 {
        (above.trailing_zeros(), true)
    } else {
        (bits.trailing_zeros(), false)
    }
}

/// Bits `start..=end`, both at most 63.
#[inline]
fn span_bits(start: u8, end: u8) -> u64 {
    (u64::MAX >> (63 - u32::from(end))) & (u64::MAX << u32::from(start))
}

/// Treats bit 7 as the canonical Sunday bit 0 for equality and display.
#[inline]
const fn fold_sundays(dows: u64) -> u64 {
    (dows & 0x7F) | ((dows >> 7) & 1)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
struct Flags(u8);

impl Flags {
    /// The day-of-month field is an `L` form; `last_dom_offset` applies.
    const DOM_LAST: Flags = Flags(1);
    /// The day-of-week field is a `dL` form (last such weekday of the month).
    const DOW_LAST: Flags = Flags(1 << 1);
    /// The day-of-week field is a `d#n` form; `nth_dow` applies.
    const NTH_DOW: Flags = Flags(1 << 2);
    /// A `W` modifier moves the day to the closest weekday.
    const NEAREST_WEEKDAY: Flags = Flags(1 << 3);
    /// The time-of-day part is not a single fixed point. Repeating schedules
    /// run again in the repeated half of a fall-back overlap; fixed ones
    /// must not.
    const INTERVAL: Flags = Flags(1 << 4);

    const fn empty() -> Flags {
        Flags(0)
    }

    #[inline]
    const fn has(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    const fn with(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }
}

/// A compiled cron expression. This can be used to check whether a given time
/// matches and to iterate over all future matching times, in UTC or in a
/// civil time zone.
///
/// Values are plain bitmaps: cheap to copy, immutable, and freely shareable
/// across threads.
///
/// # Example
/// ```
/// use cassia::Cron;
/// use chrono::{TimeZone, Utc};
///
/// let cron: Cron = "*/10 0 * OCT MON".parse().expect("couldn't parse expression");
///
/// // check if a given time matches the expression
/// assert!(cron.contains(&Utc.with_ymd_and_hms(2020, 10, 19, 0, 30, 0).unwrap()));
///
/// // iterate over future matching times
/// let start = Utc.with_ymd_and_hms(2020, 10, 1, 0, 0, 0).unwrap();
/// for time in cron.iter_from(start).take(5) {
///     assert!(cron.contains(&time));
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Cron {
    seconds: u64,
    minutes: u64,
    hours: u64,
    doms: u64,
    months: u64,
    dows: u64,
    nth_dow: u8,
    last_dom_offset: u8,
    flags: Flags,
}

impl FromStr for Cron {
    type Err = ParseError;

    /// Parses a five-field expression (or macro) and compiles it.
    ///
    /// Any parsed expression can carry redundant information, but it
    /// compresses into a neat bitmap per field where each bit is one
    /// second/minute/hour/day/month/weekday the expression matches.
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cron::parse(s, Format::Standard)
    }
}

impl Cron {
    /// `0 0 1 1 *`: midnight on January 1st. Also `@yearly` / `@annually`.
    pub const YEARLY: Cron = Cron {
        seconds: SECONDS_DEFAULT,
        minutes: 1,
        hours: 1,
        doms: 1 << 1,
        months: 1 << 1,
        dows: DOWS_ALL,
        nth_dow: 0,
        last_dom_offset: 0,
        flags: Flags::empty(),
    };

    /// `0 0 1 * *`: midnight on the first of the month. Also `@monthly`.
    pub const MONTHLY: Cron = Cron {
        seconds: SECONDS_DEFAULT,
        minutes: 1,
        hours: 1,
        doms: 1 << 1,
        months: MONTHS_ALL,
        dows: DOWS_ALL,
        nth_dow: 0,
        last_dom_offset: 0,
        flags: Flags::empty(),
    };

    /// `0 0 * * 0`: midnight on Sunday. Also `@weekly`.
    pub const WEEKLY: Cron = Cron {
        seconds: SECONDS_DEFAULT,
        minutes: 1,
        hours: 1,
        doms: DOMS_ALL,
        months: MONTHS_ALL,
        dows: 1,
        nth_dow: 0,
        last_dom_offset: 0,
        flags: Flags::empty(),
    };

    /// `0 0 * * *`: every midnight. Also `@daily` / `@midnight`.
    pub const DAILY: Cron = Cron {
        seconds: SECONDS_DEFAULT,
        minutes: 1,
        hours: 1,
        doms: DOMS_ALL,
        months: MONTHS_ALL,
        dows: DOWS_ALL,
        nth_dow: 0,
        last_dom_offset: 0,
        flags: Flags::empty(),
    };

    /// `0 * * * *`: the top of every hour. Also `@hourly`.
    pub const HOURLY: Cron = Cron {
        seconds: SECONDS_DEFAULT,
        minutes: 1,
        hours: HOURS_ALL,
        doms: DOMS_ALL,
        months: MONTHS_ALL,
        dows: DOWS_ALL,
        nth_dow: 0,
        last_dom_offset: 0,
        flags: Flags::INTERVAL,
    };

    /// `* * * * *`: every minute. Also `@every_minute`.
    pub const EVERY_MINUTE: Cron = Cron {
        seconds: SECONDS_DEFAULT,
        minutes: MINUTES_ALL,
        hours: HOURS_ALL,
        doms: DOMS_ALL,
        months: MONTHS_ALL,
        dows: DOWS_ALL,
        nth_dow: 0,
        last_dom_offset: 0,
        flags: Flags::INTERVAL,
    };

    /// `* * * * * *`: every second. Also `@every_second`.
    pub const EVERY_SECOND: Cron = Cron {
        seconds: SECONDS_ALL,
        minutes: MINUTES_ALL,
        hours: HOURS_ALL,
        doms: DOMS_ALL,
        months: MONTHS_ALL,
        dows: DOWS_ALL,
        nth_dow: 0,
        last_dom_offset: 0,
        flags: Flags::INTERVAL,
    };

    /// Parses a cron expression in the given field format and compiles it.
    ///
    /// `@`-macros are accepted in either format.
    ///
    /// # Example
    /// ```
    /// use cassia::{Cron, Format};
    ///
    /// let cron = Cron::parse("*/30 * * * * *", Format::IncludeSeconds).unwrap();
    /// assert_eq!(cron.to_string(), "0,30 * * * * *");
    ///
    /// assert_eq!(Cron::parse("@daily", Format::Standard).unwrap(), Cron::DAILY);
    /// ```
    pub fn parse(input: &str, format: Format) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        if let Some(name) = trimmed.strip_prefix('@') {
            return Self::expand_macro(name)
                .ok_or_else(|| ParseError::UnknownMacro(name.to_string()));
        }
        CronExpr::parse(trimmed, format).map(Cron::new)
    }

    fn expand_macro(name: &str) -> Option<Cron> {
        Some(match name.to_ascii_lowercase().as_str() {
            "yearly" | "annually" => Self::YEARLY,
            "monthly" => Self::MONTHLY,
            "weekly" => Self::WEEKLY,
            "daily" | "midnight" => Self::DAILY,
            "hourly" => Self::HOURLY,
            "every_minute" => Self::EVERY_MINUTE,
            "every_second" => Self::EVERY_SECOND,
            _ => return None,
        })
    }

    /// Compiles a parsed expression into a cron value.
    pub fn new(expr: CronExpr) -> Self {
        let seconds = compile_expr(expr.seconds, SECONDS_ALL);
        let minutes = compile_expr(expr.minutes, MINUTES_ALL);
        let hours = compile_expr(expr.hours, HOURS_ALL);
        let months = compile_expr(expr.months, MONTHS_ALL);

        let mut flags = Flags::empty();
        let mut last_dom_offset = 0;
        let doms = match expr.doms {
            parse::DayOfMonthExpr::All => DOMS_ALL,
            parse::DayOfMonthExpr::Last(last) => {
                flags = flags.with(Flags::DOM_LAST);
                match last {
                    parse::Last::Day => {}
                    parse::Last::Weekday => flags = flags.with(Flags::NEAREST_WEEKDAY),
                    parse::Last::Offset(offset) => last_dom_offset = u8::from(offset),
                    parse::Last::OffsetWeekday(offset) => {
                        flags = flags.with(Flags::NEAREST_WEEKDAY);
                        last_dom_offset = u8::from(offset);
                    }
                }
                // the bitmap is unused under DOM_LAST; keeping it full means
                // the month scan still starts from day 1
                DOMS_ALL
            }
            parse::DayOfMonthExpr::ClosestWeekday(day) => {
                flags = flags.with(Flags::NEAREST_WEEKDAY);
                1u64 << u8::from(day)
            }
            parse::DayOfMonthExpr::Many(exprs) => {
                let bits = exprs.into_iter().fold(0, |bits, e| bits | ors_bits(e));
                debug_assert!(bits & !DOMS_ALL == 0, "days mapped outside the field mask");
                bits
            }
        };

        let mut nth_dow = 0;
        let dows = match expr.dows {
            parse::DayOfWeekExpr::All => DOWS_ALL,
            parse::DayOfWeekExpr::Last(day) => {
                flags = flags.with(Flags::DOW_LAST);
                1u64 << u8::from(day)
            }
            parse::DayOfWeekExpr::Nth(day, nth) => {
                flags = flags.with(Flags::NTH_DOW);
                nth_dow = u8::from(nth);
                1u64 << u8::from(day)
            }
            parse::DayOfWeekExpr::Many(exprs) => {
                let bits = exprs.into_iter().fold(0, |bits, e| bits | ors_bits(e));
                debug_assert!(bits & !DOWS_ALL == 0, "weekdays mapped outside the field mask");
                bits
            }
        };

        if seconds.count_ones() > 1 || minutes.count_ones() > 1 || hours.count_ones() > 1 {
            flags = flags.with(Flags::INTERVAL);
        }

        Cron {
            seconds,
            minutes,
            hours,
            doms,
            months,
            dows,
            nth_dow,
            last_dom_offset,
            flags,
        }
    }

    /// Returns whether this cron value can ever match any time.
    ///
    /// Some values never match: a day of the month beyond the length of every
    /// month the expression selects can never land on a real date.
    ///
    /// # Example
    /// ```
    /// use cassia::Cron;
    ///
    /// // February has a 29th day on leap years
    /// assert!("* * 29 2 *".parse::<Cron>().unwrap().any());
    ///
    /// // November does not have a 31st day
    /// assert!(!"* * 31 11 *".parse::<Cron>().unwrap().any());
    /// ```
    #[inline]
    pub fn any(&self) -> bool {
        let longest = self.longest_selected_month();
        if self.flags.has(Flags::DOM_LAST) {
            u32::from(self.last_dom_offset) < longest
        } else {
            first_set(self.doms) <= longest
        }
    }

    fn longest_selected_month(&self) -> u32 {
        // one-based month bits with 31 and 30 days respectively
        const MONTHS_31: u64 = 0b1_0101_1010_1010;
        const MONTHS_30: u64 = 0b0_1010_0101_0000;
        if self.months & MONTHS_31 != 0 {
            31
        } else if self.months & MONTHS_30 != 0 {
            30
        } else {
            29
        }
    }

    /// Returns whether this cron value matches the given time.
    ///
    /// The time is interpreted as the civil (wall-clock) reading in its own
    /// time zone; occurrences are whole seconds, so a time with a fractional
    /// second never matches.
    pub fn contains<Tz: TimeZone>(&self, date: &DateTime<Tz>) -> bool {
        let local = date.naive_local();
        if local.nanosecond() != 0 {
            return false;
        }
        bit_set(self.seconds, local.second())
            && bit_set(self.minutes, local.minute())
            && bit_set(self.hours, local.hour())
            && bit_set(self.months, local.month())
            && self.day_matches(local.year(), local.month(), local.day())
    }

    /// Whether the given calendar day satisfies both day fields.
    fn day_matches(&self, year: i32, month: u32, day: u32) -> bool {
        let dom_ok = if self.flags.has(Flags::DOM_LAST) {
            match calendar::days_in_month(year, month).checked_sub(u32::from(self.last_dom_offset))
            {
                Some(last) if last >= 1 => {
                    let expected = if self.flags.has(Flags::NEAREST_WEEKDAY) {
                        calendar::move_to_nearest_week_day(year, month, last)
                    } else {
                        last
                    };
                    day == expected
                }
                _ => false,
            }
        } else if self.flags.has(Flags::NEAREST_WEEKDAY) {
            let base = first_set(self.doms);
            base <= calendar::days_in_month(year, month)
                && day == calendar::move_to_nearest_week_day(year, month, base)
        } else {
            bit_set(self.doms, day)
        };
        dom_ok && self.dow_matches(year, month, day)
    }

    /// The day-of-week side of a day test: `dL`, `d#n`, and the bitmap, with
    /// bit 7 honored as Sunday.
    fn dow_matches(&self, year: i32, month: u32, day: u32) -> bool {
        if self.flags.has(Flags::DOW_LAST) && !calendar::is_last_day_of_week(year, month, day) {
            return false;
        }
        if self.flags.has(Flags::NTH_DOW)
            && !calendar::is_nth_day_of_week(day, u32::from(self.nth_dow))
        {
            return false;
        }
        if self.dows == DOWS_ALL {
            return true;
        }
        let weekday = calendar::day_of_week(year, month, day);
        bit_set(self.dows, weekday) || (weekday == 0 && bit_set(self.dows, 7))
    }

    pub(crate) fn is_interval(&self) -> bool {
        self.flags.has(Flags::INTERVAL)
    }

    /// Finds the next matching tick at or after `from_ticks` (strictly after
    /// when not inclusive), or [`NOT_FOUND`] once the search passes the last
    /// supported year.
    ///
    /// The walk advances second, minute, hour, and day like a digit increment
    /// over non-contiguous alphabets: each field moves to its next set bit
    /// and carries into the next coarser field when it wraps. Finer fields
    /// reset to their first set bit only once a coarser field has moved
    /// strictly past the start value, which keeps the result minimal.
    pub(crate) fn find_occurrence(&self, from_ticks: i64, inclusive: bool) -> i64 {
        let ticks = if inclusive { from_ticks } else { from_ticks + 1 };
        // the search works at second resolution
        let ticks = calendar::ceiling_to_second(ticks);

        let (start_second, start_minute, start_hour, start_day, start_month, start_year) =
            calendar::fill_date_time_parts(ticks);
        if start_year > calendar::MAX_YEAR {
            return NOT_FOUND;
        }

        let (mut second, mut minute, mut hour) = (start_second, start_minute, start_hour);
        let (mut day, mut month, mut year) = (start_day, start_month, start_year);

        // where the day scan restarts after a month rollover
        let min_matched_day = first_set(self.doms);

        let mut advance_month = false;

        if !bit_set(self.seconds, second) {
            let (next, in_field) = next_set(self.seconds, second);
            second = next;
            if !in_field {
                minute += 1;
            }
        }
        if !bit_set(self.minutes, minute) {
            let (next, in_field) = next_set(self.minutes, minute);
            minute = next;
            if !in_field {
                hour += 1;
            }
        }
        if !bit_set(self.hours, hour) {
            let (next, in_field) = next_set(self.hours, hour);
            hour = next;
            if !in_field {
                day += 1;
            }
        }
        if self.flags.has(Flags::NEAREST_WEEKDAY) {
            // the W move can shift backwards within the month, so the scan
            // must start from the field minimum rather than today
            day = min_matched_day;
        } else if !bit_set(self.doms, day) {
            let (next, in_field) = next_set(self.doms, day);
            day = next;
            advance_month = !in_field;
        }
        if !bit_set(self.months, month) {
            advance_month = true;
        }

        'months: loop {
            if advance_month {
                let (next, in_field) = next_set(self.months, month);
                month = next;
                if !in_field {
                    year += 1;
                    if year > calendar::MAX_YEAR {
                        return NOT_FOUND;
                    }
                }
                day = min_matched_day;
            }
            advance_month = true;

            loop {
                let offset = if self.flags.has(Flags::DOM_LAST) {
                    u32::from(self.last_dom_offset)
                } else {
                    0
                };
                let last_day = calendar::days_in_month(year, month).saturating_sub(offset);
                if last_day == 0 || day > last_day {
                    continue 'months;
                }
                if self.flags.has(Flags::DOM_LAST) {
                    day = last_day;
                }
                let last_checked_day = day;
                if self.flags.has(Flags::NEAREST_WEEKDAY) {
                    day = calendar::move_to_nearest_week_day(year, month, day);
                }
                if self.dow_matches(year, month, day) {
                    if (year, month, day) > (start_year, start_month, start_day) {
                        hour = first_set(self.hours);
                        minute = first_set(self.minutes);
                        second = first_set(self.seconds);
                    } else if hour > start_hour {
                        minute = first_set(self.minutes);
                        second = first_set(self.seconds);
                    } else if minute > start_minute {
                        second = first_set(self.seconds);
                    }
                    let found =
                        calendar::date_time_to_ticks(year, month, day, hour, minute, second);
                    // a W move can land before the start; such a day is not it
                    if found >= ticks {
                        return found;
                    }
                }
                day = last_checked_day;
                let (next, in_field) = next_set(self.doms, day);
                day = next;
                if !in_field {
                    continue 'months;
                }
            }
        }
    }

    /// The range-limited form of [`find_occurrence`](Self::find_occurrence):
    /// a candidate past `end_ticks` is no occurrence at all.
    pub(crate) fn find_occurrence_in_range(
        &self,
        from_ticks: i64,
        end_ticks: i64,
        inclusive: bool,
    ) -> i64 {
        match self.find_occurrence(from_ticks, inclusive) {
            found if found == NOT_FOUND || found > end_ticks => NOT_FOUND,
            found => found,
        }
    }

    /// Creates an iterator over the times matching this cron value, starting
    /// at (and including) `start`. Short for `iter(start..)`.
    ///
    /// # Example
    /// ```
    /// use cassia::Cron;
    /// use chrono::{TimeZone, Utc};
    ///
    /// let cron = "*/10 * * * *".parse::<Cron>().expect("couldn't parse expression");
    /// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    ///
    /// let mut iter = cron.iter_from(start);
    /// assert_eq!(iter.next(), Some(start));
    /// assert_eq!(iter.next(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 10, 0).single());
    /// ```
    #[inline]
    pub fn iter_from<Tz: TimeZone>(self, start: DateTime<Tz>) -> Occurrences<Tz> {
        self.iter((Bound::Included(start), Bound::Unbounded))
    }

    /// Creates an iterator over the times matching this cron value strictly
    /// after `start`. Short for `iter((Bound::Excluded(start), Bound::Unbounded))`.
    ///
    /// # Example
    /// ```
    /// use cassia::Cron;
    /// use chrono::{TimeZone, Utc};
    ///
    /// let cron = "0 12 * * *".parse::<Cron>().unwrap();
    /// let noon = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    ///
    /// assert_eq!(
    ///     cron.iter_after(noon).next(),
    ///     Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).single(),
    /// );
    /// ```
    #[inline]
    pub fn iter_after<Tz: TimeZone>(self, start: DateTime<Tz>) -> Occurrences<Tz> {
        self.iter((Bound::Excluded(start), Bound::Unbounded))
    }

    /// Creates an iterator over the times matching this cron value within the
    /// given range bounds.
    ///
    /// If the start bound lies after the end bound the iterator yields
    /// nothing. An unbounded start begins at the minimum representable
    /// instant; if both bounds are unbounded there is no value to take a time
    /// zone from and the iterator is empty.
    ///
    /// In a zone with daylight-saving transitions the yielded times carry the
    /// offsets the search resolved: see
    /// [`next_from`](Self::next_from) for the rules.
    ///
    /// # Example
    /// ```
    /// use cassia::Cron;
    /// use chrono::{Duration, TimeZone, Utc};
    ///
    /// let cron = "*/10 * * * *".parse::<Cron>().expect("couldn't parse expression");
    /// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    ///
    /// // all matching times in the next half hour, end exclusive
    /// let times: Vec<_> = cron.iter(start..start + Duration::minutes(30)).collect();
    /// assert_eq!(times.len(), 3); // 00:00, 00:10, 00:20
    /// ```
    pub fn iter<Tz, R>(self, bounds: R) -> Occurrences<Tz>
    where
        Tz: TimeZone,
        R: RangeBounds<DateTime<Tz>>,
    {
        let end = match bounds.end_bound() {
            Bound::Unbounded => None,
            Bound::Included(end) => Some((end.clone(), true)),
            Bound::Excluded(end) => Some((end.clone(), false)),
        };
        let mut state = match bounds.start_bound() {
            Bound::Included(start) => Some((start.clone(), true)),
            Bound::Excluded(start) => Some((start.clone(), false)),
            Bound::Unbounded => end.as_ref().map(|(end, _)| {
                let tz = end.timezone();
                (DateTime::<Utc>::MIN_UTC.with_timezone(&tz), true)
            }),
        };
        if let (Some((start, _)), Some((end, _))) = (&state, &end) {
            if start > end {
                state = None;
            }
        }
        if !self.any() {
            state = None;
        }
        Occurrences {
            cron: self,
            state,
            end,
        }
    }
}

fn compile_expr<E>(expr: parse::Expr<E>, all: u64) -> u64
where
    E: parse::ExprValue + Copy + PartialEq,
    u8: From<E>,
{
    match expr {
        parse::Expr::All => all,
        parse::Expr::Many(exprs) => {
            let bits = exprs.into_iter().fold(0, |bits, e| bits | ors_bits(e));
            debug_assert!(bits & !all == 0, "values mapped outside the field mask");
            bits
        }
    }
}

fn ors_bits<E>(expr: parse::OrsExpr<E>) -> u64
where
    E: parse::ExprValue + Copy + PartialEq,
    u8: From<E>,
{
    match expr.normalize() {
        parse::OrsExpr::One(value) => 1u64 << u8::from(value),
        parse::OrsExpr::Range(start, end) => {
            let (start, end) = (u8::from(start), u8::from(end));
            if start <= end {
                span_bits(start, end)
            } else {
                // ranges may wrap around the field, e.g. `FRI-MON` or
                // minutes `50-10`
                span_bits(start, E::MAX) | span_bits(E::MIN, end)
            }
        }
        parse::OrsExpr::Step { start, end, step } => {
            let (start, end) = (u8::from(start), u8::from(end));
            let step = usize::from(<u8 as From<parse::Step<E>>>::from(step));
            let mut bits = 0u64;
            if start <= end {
                for value in (start..=end).step_by(step) {
                    bits |= 1u64 << value;
                }
            } else {
                for value in (start..=E::MAX).chain(E::MIN..=end).step_by(step) {
                    bits |= 1u64 << value;
                }
            }
            bits
        }
    }
}

impl PartialEq for Cron {
    fn eq(&self, other: &Cron) -> bool {
        self.seconds == other.seconds
            && self.minutes == other.minutes
            && self.hours == other.hours
            && self.doms == other.doms
            && self.months == other.months
            && fold_sundays(self.dows) == fold_sundays(other.dows)
            && self.nth_dow == other.nth_dow
            && self.last_dom_offset == other.last_dom_offset
            && self.flags == other.flags
    }
}

impl Eq for Cron {}

impl Hash for Cron {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seconds.hash(state);
        self.minutes.hash(state);
        self.hours.hash(state);
        self.doms.hash(state);
        self.months.hash(state);
        fold_sundays(self.dows).hash(state);
        self.nth_dow.hash(state);
        self.last_dom_offset.hash(state);
        self.flags.hash(state);
    }
}

impl Display for Cron {
    /// Reconstructs the canonical text of the expression.
    ///
    /// A seconds field appears only when it is not the five-field default
    /// `{0}`; a full-range field prints as `*`; day-of-week bit 7 folds into
    /// the canonical `0`.
    ///
    /// # Example
    /// ```
    /// use cassia::Cron;
    ///
    /// let cron: Cron = "@daily".parse().unwrap();
    /// assert_eq!(cron.to_string(), "0 0 * * *");
    ///
    /// let cron: Cron = "0,30 */6 1,15 * *".parse().unwrap();
    /// assert_eq!(cron.to_string(), "0,30 0,6,12,18 1,15 * *");
    /// ```
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.seconds != SECONDS_DEFAULT {
            fmt_field(f, self.seconds, SECONDS_ALL)?;
            f.write_str(" ")?;
        }
        fmt_field(f, self.minutes, MINUTES_ALL)?;
        f.write_str(" ")?;
        fmt_field(f, self.hours, HOURS_ALL)?;
        f.write_str(" ")?;
        if self.flags.has(Flags::DOM_LAST) {
            f.write_str("L")?;
            if self.last_dom_offset > 0 {
                write!(f, "-{}", self.last_dom_offset)?;
            }
        } else {
            fmt_field(f, self.doms, DOMS_ALL)?;
        }
        if self.flags.has(Flags::NEAREST_WEEKDAY) {
            f.write_str("W")?;
        }
        f.write_str(" ")?;
        fmt_field(f, self.months, MONTHS_ALL)?;
        f.write_str(" ")?;
        fmt_field(f, fold_sundays(self.dows), fold_sundays(DOWS_ALL))?;
        if self.flags.has(Flags::DOW_LAST) {
            f.write_str("L")?;
        } else if self.flags.has(Flags::NTH_DOW) {
            write!(f, "#{}", self.nth_dow)?;
        }
        Ok(())
    }
}

/// Writes one field as `*` or its set bits in ascending order.
fn fmt_field(f: &mut Formatter, bits: u64, all: u64) -> fmt::Result {
    if bits == all {
        return f.write_str("*");
    }
    let mut rest = bits;
    let mut first = true;
    while rest != 0 {
        if !first {
            f.write_str(",")?;
        }
        write!(f, "{}", rest.trailing_zeros())?;
        rest &= rest - 1;
        first = false;
    }
    Ok(())
}

/// An iterator over the times matching the contained cron value, in
/// ascending order. Created with [`Cron::iter`], [`Cron::iter_from`], and
/// [`Cron::iter_after`].
pub struct Occurrences<Tz: TimeZone> {
    cron: Cron,
    /// The next search origin and whether it is included, or `None` once
    /// exhausted.
    state: Option<(DateTime<Tz>, bool)>,
    /// The end bound and whether it is included.
    end: Option<(DateTime<Tz>, bool)>,
}

impl<Tz: TimeZone> Occurrences<Tz> {
    /// Returns the underlying cron value.
    pub fn cron(&self) -> &Cron {
        &self.cron
    }
}

impl<Tz: TimeZone> Iterator for Occurrences<Tz> {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        let (start, inclusive) = self.state.take()?;
        let found = if inclusive {
            self.cron.next_from(&start)
        } else {
            self.cron.next_after(&start)
        }?;
        if let Some((end, end_inclusive)) = &self.end {
            let in_bounds = if *end_inclusive {
                found <= *end
            } else {
                found < *end
            };
            if !in_bounds {
                return None;
            }
        }
        self.state = Some((found.clone(), false));
        Some(found)
    }
}

impl<Tz: TimeZone> FusedIterator for Occurrences<Tz> {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    const FORMAT: &str = "%F %T";

    fn utc(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, FORMAT)
            .expect("failed to parse test date")
            .and_utc()
    }

    fn check_does_contain(cron: &str, dates: impl IntoIterator<Item = impl AsRef<str>>) {
        let parsed: Cron = cron.parse().unwrap();

        for date in dates.into_iter().map(|s| utc(s.as_ref())) {
            assert!(
                parsed.contains(&date),
                "cron \"{}\" should contain {}. compiled: {:#?}",
                cron,
                date,
                parsed
            );
        }
    }

    fn check_does_not_contain(cron: &str, dates: impl IntoIterator<Item = impl AsRef<str>>) {
        let parsed: Cron = cron.parse().unwrap();

        for date in dates.into_iter().map(|s| utc(s.as_ref())) {
            assert!(
                !parsed.contains(&date),
                "cron \"{}\" shouldn't contain {}. compiled: {:#?}",
                cron,
                date,
                parsed
            );
        }
    }

    mod bits {
        use super::*;

        #[test]
        fn first_set_is_lowest() {
            assert_eq!(first_set(0b1000), 3);
            assert_eq!(first_set(1), 0);
            assert_eq!(first_set(1 << 63), 63);
        }

        #[test]
        fn next_set_moves_strictly_forward() {
            assert_eq!(next_set(0b1001, 0), (3, true));
            assert_eq!(next_set(0b1001, 1), (3, true));
            assert_eq!(next_set(0b0110, 1), (2, true));
        }

        #[test]
        fn next_set_wraps_with_carry() {
            assert_eq!(next_set(0b1001, 3), (0, false));
            assert_eq!(next_set(0b1, 5), (0, false));
            assert_eq!(next_set(0b1, 63), (0, false));
            assert_eq!(next_set(1 << 63, 62), (63, true));
        }

        #[test]
        fn span_covers_both_ends() {
            assert_eq!(span_bits(0, 0), 1);
            assert_eq!(span_bits(1, 3), 0b1110);
            assert_eq!(span_bits(0, 59), SECONDS_ALL);
            assert_eq!(span_bits(1, 31), DOMS_ALL);
        }
    }

    mod compile {
        use super::*;

        #[test]
        fn star_fields_use_the_full_mask() {
            let cron: Cron = "* * * * *".parse().unwrap();
            assert_eq!(cron.seconds, SECONDS_DEFAULT);
            assert_eq!(cron.minutes, MINUTES_ALL);
            assert_eq!(cron.hours, HOURS_ALL);
            assert_eq!(cron.doms, DOMS_ALL);
            assert_eq!(cron.months, MONTHS_ALL);
            assert_eq!(cron.dows, DOWS_ALL);
        }

        #[test]
        fn interval_flag_tracks_time_of_day_fields() {
            // fixed time of day
            assert!(!"0 0 * * *".parse::<Cron>().unwrap().is_interval());
            assert!(!"30 6 1,15 * *".parse::<Cron>().unwrap().is_interval());
            // repeating time of day
            assert!("*/30 * * * *".parse::<Cron>().unwrap().is_interval());
            assert!("0 * * * *".parse::<Cron>().unwrap().is_interval());
            assert!(Cron::parse("*/5 0 0 * * *", Format::IncludeSeconds)
                .unwrap()
                .is_interval());
            // day fields alone do not make an interval
            assert!(!"30 1 * * MON".parse::<Cron>().unwrap().is_interval());
        }

        #[test]
        fn wrapping_ranges() {
            let cron: Cron = "50-10 * * * *".parse().unwrap();
            assert_eq!(cron.minutes, span_bits(50, 59) | span_bits(0, 10));

            let cron: Cron = "0 0 * * FRI-MON".parse().unwrap();
            assert_eq!(cron.dows, span_bits(5, 7) | span_bits(0, 1));
        }

        #[test]
        fn sunday_aliases_compare_equal() {
            let zero: Cron = "0 0 * * 0".parse().unwrap();
            let seven: Cron = "0 0 * * 7".parse().unwrap();
            assert_ne!(zero.dows, seven.dows);
            assert_eq!(zero, seven);
        }

        #[test]
        fn macros_expand_to_the_constants() {
            assert_eq!("@yearly".parse::<Cron>().unwrap(), Cron::YEARLY);
            assert_eq!("@annually".parse::<Cron>().unwrap(), Cron::YEARLY);
            assert_eq!("@monthly".parse::<Cron>().unwrap(), Cron::MONTHLY);
            assert_eq!("@weekly".parse::<Cron>().unwrap(), Cron::WEEKLY);
            assert_eq!("@daily".parse::<Cron>().unwrap(), Cron::DAILY);
            assert_eq!("@midnight".parse::<Cron>().unwrap(), Cron::DAILY);
            assert_eq!("@hourly".parse::<Cron>().unwrap(), Cron::HOURLY);
            assert_eq!("@every_minute".parse::<Cron>().unwrap(), Cron::EVERY_MINUTE);
            assert_eq!("@every_second".parse::<Cron>().unwrap(), Cron::EVERY_SECOND);
            assert_eq!("@EVERY_SECOND".parse::<Cron>().unwrap(), Cron::EVERY_SECOND);

            assert_eq!(
                "@fortnightly".parse::<Cron>(),
                Err(ParseError::UnknownMacro("fortnightly".to_string()))
            );
        }

        #[test]
        fn constants_match_their_text_form() {
            assert_eq!(Cron::YEARLY, "0 0 1 1 *".parse().unwrap());
            assert_eq!(Cron::MONTHLY, "0 0 1 * *".parse().unwrap());
            assert_eq!(Cron::WEEKLY, "0 0 * * 0".parse().unwrap());
            assert_eq!(Cron::DAILY, "0 0 * * *".parse().unwrap());
            assert_eq!(Cron::HOURLY, "0 * * * *".parse().unwrap());
            assert_eq!(Cron::EVERY_MINUTE, "* * * * *".parse().unwrap());
            assert_eq!(
                Cron::EVERY_SECOND,
                Cron::parse("* * * * * *", Format::IncludeSeconds).unwrap()
            );
        }
    }

    mod contains {
        use super::*;

        #[test]
        fn anytime() {
            check_does_contain(
                "* * * * *",
                [
                    "1970-01-01 00:00:00",
                    "2016-11-08 23:53:00",
                    "2020-07-04 15:42:00",
                    "2072-02-29 01:15:00",
                ],
            );
        }

        #[test]
        fn seconds_default_to_zero() {
            check_does_not_contain("* * * * *", ["2020-01-01 00:00:30"]);
        }

        #[test]
        fn fractional_seconds_never_match() {
            let cron: Cron = "* * * * *".parse().unwrap();
            let date = utc("2020-01-01 00:00:00") + chrono::Duration::milliseconds(1);
            assert!(!cron.contains(&date));
        }

        #[test]
        fn specific_time() {
            let cron = "5 0 23 8 *";

            check_does_contain(
                cron,
                [
                    "2020-08-23 00:05:00",
                    "2021-08-23 00:05:00",
                    "2022-08-23 00:05:00",
                ],
            );

            check_does_not_contain(
                cron,
                [
                    "1970-01-01 00:00:00",
                    "2020-07-04 15:42:00",
                    "2020-08-23 11:05:00",
                ],
            );
        }

        #[test]
        fn weekday_and_day_of_month_are_anded() {
            // Friday the 13th
            let cron = "0 0 13 * FRI";

            check_does_contain(cron, ["2020-03-13 00:00:00", "2020-11-13 00:00:00"]);
            // a 13th that is not Friday, and a Friday that is not the 13th
            check_does_not_contain(cron, ["2020-04-13 00:00:00", "2020-03-20 00:00:00"]);
        }

        #[test]
        fn last_day_of_month() {
            check_does_contain(
                "0 0 L FEB *",
                [
                    "2400-02-29 00:00:00",
                    "2100-02-28 00:00:00",
                    "2024-02-29 00:00:00",
                    "2023-02-28 00:00:00",
                ],
            );

            check_does_not_contain("0 0 L FEB *", ["2024-02-28 00:00:00"]);
        }

        #[test]
        fn offset_last_day_of_month() {
            check_does_contain(
                "0 0 L-1 FEB *",
                ["2024-02-28 00:00:00", "2023-02-27 00:00:00"],
            );
            check_does_not_contain(
                "0 0 L-1 FEB *",
                ["2024-02-29 00:00:00", "2023-02-28 00:00:00"],
            );
        }

        #[test]
        fn last_weekday_of_month() {
            check_does_contain(
                "0 0 LW MAY *",
                [
                    "2025-05-30 00:00:00", // last day is a Saturday
                    "2021-05-31 00:00:00", // last day is a Monday
                    "2020-05-29 00:00:00", // last day is a Sunday
                ],
            );
        }

        #[test]
        fn closest_weekday() {
            check_does_contain(
                "0 0 1W MAY *",
                [
                    "2020-05-01 00:00:00", // the 1st is a Friday
                    "2022-05-02 00:00:00", // the 1st is a Sunday
                    "2021-05-03 00:00:00", // the 1st is a Saturday
                ],
            );
        }

        #[test]
        fn last_weekday_expr() {
            let cron = "0 0 * * 6L"; // the last Saturday of every month

            check_does_contain(
                cron,
                [
                    "2020-01-25 00:00:00",
                    "2020-02-29 00:00:00",
                    "2020-03-28 00:00:00",
                    "2020-04-25 00:00:00",
                    "2020-05-30 00:00:00",
                ],
            );

            check_does_not_contain(
                cron,
                [
                    "2020-01-18 00:00:00",
                    "2020-02-28 00:00:00",
                    "2020-03-31 00:00:00",
                ],
            );
        }

        #[test]
        fn nth_weekday_expr() {
            let cron = "0 0 * * SAT#5"; // the 5th Saturday of every month

            check_does_contain(
                cron,
                [
                    "2020-02-29 00:00:00",
                    "2020-05-30 00:00:00",
                    "2020-08-29 00:00:00",
                    "2020-10-31 00:00:00",
                ],
            );

            check_does_not_contain(cron, ["2020-02-22 00:00:00", "2020-03-28 00:00:00"]);
        }

        #[test]
        fn six_field_expressions() {
            let cron = Cron::parse("30 5 0 23 8 *", Format::IncludeSeconds).unwrap();
            assert!(cron.contains(&utc("2020-08-23 00:05:30")));
            assert!(!cron.contains(&utc("2020-08-23 00:05:00")));
        }
    }

    mod display {
        use super::*;

        #[test]
        fn constants_render_canonically() {
            assert_eq!(Cron::EVERY_SECOND.to_string(), "* * * * * *");
            assert_eq!(Cron::EVERY_MINUTE.to_string(), "* * * * *");
            assert_eq!(Cron::HOURLY.to_string(), "0 * * * *");
            assert_eq!(Cron::DAILY.to_string(), "0 0 * * *");
            assert_eq!(Cron::WEEKLY.to_string(), "0 0 * * 0");
            assert_eq!(Cron::MONTHLY.to_string(), "0 0 1 * *");
            assert_eq!(Cron::YEARLY.to_string(), "0 0 1 1 *");
        }

        #[test]
        fn extensions_render() {
            for (input, expected) in [
                ("0 0 L * *", "0 0 L * *"),
                ("0 0 L-2 * *", "0 0 L-2 * *"),
                ("0 0 LW * *", "0 0 LW * *"),
                ("0 0 L-2W * *", "0 0 L-2W * *"),
                ("0 0 15W * *", "0 0 15W * *"),
                ("0 0 * * FRIL", "0 0 * * 5L"),
                ("0 0 * * MON#3", "0 0 * * 1#3"),
                ("0 0 * * 7", "0 0 * * 0"),
                ("0 0 ? * ?", "0 0 * * *"),
                ("0 12 * JAN-MAR MON-FRI", "0 12 * 1,2,3 1,2,3,4,5"),
            ] {
                let cron: Cron = input.parse().unwrap();
                assert_eq!(cron.to_string(), expected, "input: {input}");
            }
        }

        #[test]
        fn seconds_render_only_when_not_default() {
            let cron = Cron::parse("15 * * * * *", Format::IncludeSeconds).unwrap();
            assert_eq!(cron.to_string(), "15 * * * * *");

            // an explicit seconds value of zero is the five-field default
            let cron = Cron::parse("0 30 * * * *", Format::IncludeSeconds).unwrap();
            assert_eq!(cron.to_string(), "30 * * * *");
        }

        #[test]
        fn round_trips_through_text() {
            for input in [
                "* * * * *",
                "*/15 * * * *",
                "0,30 0,6,12,18 1,15 * *",
                "5 0 23 8 *",
                "0 0 L * *",
                "0 0 L-2 * *",
                "0 0 LW * *",
                "0 0 15W * *",
                "0 0 * * 5L",
                "0 0 * * 1#3",
                "0 0 * * 7",
                "50-10 * * * *",
                "0 0 29 2 *",
            ] {
                let cron: Cron = input.parse().unwrap();
                let round_tripped: Cron = cron.to_string().parse().unwrap();
                assert_eq!(cron, round_tripped, "input: {input}");
            }

            for input in ["* * * * * *", "15,45 * * * * *", "*/5 */5 * * * *"] {
                let cron = Cron::parse(input, Format::IncludeSeconds).unwrap();
                let round_tripped = Cron::parse(&cron.to_string(), Format::IncludeSeconds).unwrap();
                assert_eq!(cron, round_tripped, "input: {input}");
            }
        }
    }

    mod next {
        use super::*;

        fn check_next_from(cron: &str, from: &str, expected: &str) {
            let cron: Cron = cron.parse().unwrap();
            assert_eq!(
                cron.next_from(&utc(from)),
                Some(utc(expected)),
                "inclusive search from {from}"
            );
        }

        fn check_next_after(cron: &str, from: &str, expected: &str) {
            let cron: Cron = cron.parse().unwrap();
            assert_eq!(
                cron.next_after(&utc(from)),
                Some(utc(expected)),
                "exclusive search from {from}"
            );
        }

        #[test]
        fn matching_start_is_returned_when_inclusive() {
            check_next_from("0 0 * * *", "2020-01-01 00:00:00", "2020-01-01 00:00:00");
            check_next_after("0 0 * * *", "2020-01-01 00:00:00", "2020-01-02 00:00:00");
        }

        #[test]
        fn minute_steps() {
            check_next_from("*/15 * * * *", "2020-05-10 12:07:00", "2020-05-10 12:15:00");
            check_next_from("*/15 * * * *", "2020-05-10 12:45:01", "2020-05-10 13:00:00");
        }

        #[test]
        fn second_steps() {
            let cron = Cron::parse("*/5 * * * * *", Format::IncludeSeconds).unwrap();
            assert_eq!(
                cron.next_from(&utc("2024-01-01 00:00:01")),
                Some(utc("2024-01-01 00:00:05"))
            );
            assert_eq!(
                cron.next_from(&utc("2024-01-01 00:00:00")),
                Some(utc("2024-01-01 00:00:00"))
            );
        }

        #[test]
        fn leap_day() {
            check_next_from("0 0 29 2 *", "2021-03-01 00:00:00", "2024-02-29 00:00:00");
            check_next_from("0 0 29 2 *", "2024-02-29 00:00:00", "2024-02-29 00:00:00");
            check_next_after("0 0 29 2 *", "2024-02-29 00:00:00", "2028-02-29 00:00:00");
        }

        #[test]
        fn last_day_of_month() {
            check_next_from("0 0 L * *", "2024-02-01 00:00:00", "2024-02-29 00:00:00");
            check_next_from("0 0 L * *", "2024-04-15 00:00:00", "2024-04-30 00:00:00");
            check_next_from("0 0 L-2 * *", "2024-02-01 00:00:00", "2024-02-27 00:00:00");
        }

        #[test]
        fn nearest_weekday() {
            // the 15th is a Wednesday
            check_next_from("0 0 15W * *", "2020-07-01 00:00:00", "2020-07-15 00:00:00");
            // the 15th is a Saturday, so the occurrence is Friday the 14th
            check_next_from("0 0 15W * *", "2020-08-01 00:00:00", "2020-08-14 00:00:00");
            // the 15th is a Sunday, so the occurrence is Monday the 16th
            check_next_from("0 0 15W * *", "2020-11-01 00:00:00", "2020-11-16 00:00:00");
            // starting past the moved day rolls over to the next month
            check_next_from("0 0 15W * *", "2020-08-15 00:00:00", "2020-09-15 00:00:00");
        }

        #[test]
        fn first_weekday_never_crosses_months() {
            // 2021-05-01 is a Saturday; 1W must give Monday the 3rd, not
            // April 30th
            check_next_from("0 0 1W 5 *", "2021-01-01 00:00:00", "2021-05-03 00:00:00");
        }

        #[test]
        fn last_weekday_of_month() {
            check_next_from("0 0 LW 5 *", "2020-05-01 00:00:00", "2020-05-29 00:00:00");
            check_next_from("0 0 LW 5 *", "2021-05-01 00:00:00", "2021-05-31 00:00:00");
        }

        #[test]
        fn nth_weekday() {
            check_next_from("0 0 * * MON#3", "2024-01-01 00:00:00", "2024-01-15 00:00:00");
            check_next_after("0 0 * * MON#3", "2024-01-15 00:00:00", "2024-02-19 00:00:00");
        }

        #[test]
        fn last_weekday_of_week_kind() {
            check_next_from("0 0 * * FRIL", "2024-01-01 00:00:00", "2024-01-26 00:00:00");
            check_next_after("0 0 * * FRIL", "2024-01-26 00:00:00", "2024-02-23 00:00:00");
        }

        #[test]
        fn weekday_and_day_of_month_are_anded() {
            // the next Friday the 13th after New Year 2020
            check_next_from("0 0 13 * FRI", "2020-01-01 00:00:00", "2020-03-13 00:00:00");
        }

        #[test]
        fn sunday_as_seven() {
            check_next_from("0 0 * * 7", "2024-01-01 00:00:00", "2024-01-07 00:00:00");
        }

        #[test]
        fn fractional_seconds_floor_and_exclude() {
            let cron: Cron = "0 0 * * *".parse().unwrap();
            let from = utc("2020-01-01 00:00:00") + chrono::Duration::milliseconds(500);
            assert_eq!(cron.next_from(&from), Some(utc("2020-01-02 00:00:00")));
        }

        #[test]
        fn impossible_day_yields_none() {
            let cron: Cron = "0 0 30 2 *".parse().unwrap();
            assert_eq!(cron.next_from(&utc("2020-01-01 00:00:00")), None);
        }

        #[test]
        fn search_stops_at_the_year_bound() {
            let cron: Cron = "0 0 1 1 *".parse().unwrap();
            assert_eq!(cron.next_after(&utc("2499-01-01 00:00:00")), None);
            assert_eq!(
                cron.next_from(&utc("2499-01-01 00:00:00")),
                Some(utc("2499-01-01 00:00:00"))
            );
        }

        #[test]
        fn searches_are_monotone() {
            let cron: Cron = "23 1-5 * * *".parse().unwrap();
            let mut current = utc("2024-03-30 00:00:00");
            for _ in 0..20 {
                let next = cron.next_after(&current).unwrap();
                assert!(next > current);
                assert!(cron.contains(&next));
                current = next;
            }
        }
    }

    mod iter {
        use super::*;

        fn assert<'a, R: RangeBounds<&'a str>>(cron: &str, range: R, times: &[&str]) {
            let cron = cron.parse::<Cron>().expect("failed to parse cron expression");
            let start = match range.start_bound() {
                Bound::Unbounded => Bound::Unbounded,
                Bound::Included(start) => Bound::Included(utc(start)),
                Bound::Excluded(start) => Bound::Excluded(utc(start)),
            };
            let end = match range.end_bound() {
                Bound::Unbounded => Bound::Unbounded,
                Bound::Included(end) => Bound::Included(utc(end)),
                Bound::Excluded(end) => Bound::Excluded(utc(end)),
            };

            let results = cron.iter((start, end)).collect::<Vec<_>>();
            let times = times.iter().map(|&time| utc(time)).collect::<Vec<_>>();
            assert_eq!(times, results);
        }

        #[test]
        fn inclusive_bound_range_has_one_item() {
            assert(
                "* * * * *",
                (
                    Bound::Included("2021-01-01 00:00:00"),
                    Bound::Included("2021-01-01 00:00:00"),
                ),
                &["2021-01-01 00:00:00"],
            );
        }

        #[test]
        fn exclusive_bound_range_over_three_minutes_only_has_one() {
            assert(
                "* * * * *",
                (
                    Bound::Excluded("2021-01-01 00:00:00"),
                    Bound::Excluded("2021-01-01 00:02:00"),
                ),
                &["2021-01-01 00:01:00"],
            );
        }

        #[test]
        fn cron_without_any_yields_none() {
            assert(
                "* * 31 2 *",
                (Bound::<&str>::Unbounded, Bound::<&str>::Unbounded),
                &[],
            );
        }

        #[test]
        fn start_beyond_end_bound_yields_none() {
            assert(
                "* * * * *",
                (
                    Bound::Included("2021-01-01 00:01:00"),
                    Bound::Included("2021-01-01 00:00:00"),
                ),
                &[],
            );
        }

        #[test]
        fn simple_10_min_step_over_30_min() {
            assert(
                "*/10 * * * *",
                "1970-01-01 00:00:00".."1970-01-01 00:30:00",
                // doesn't include 00:30 since .. is exclusive end
                &[
                    "1970-01-01 00:00:00",
                    "1970-01-01 00:10:00",
                    "1970-01-01 00:20:00",
                ],
            )
        }

        #[test]
        fn simple_10_min_step_over_30_min_inclusive() {
            assert(
                "*/10 * * * *",
                "1970-01-01 00:00:00"..="1970-01-01 00:30:00",
                &[
                    "1970-01-01 00:00:00",
                    "1970-01-01 00:10:00",
                    "1970-01-01 00:20:00",
                    "1970-01-01 00:30:00",
                ],
            )
        }

        #[test]
        fn every_second_steps_by_one() {
            let cron = Cron::parse("* * * * * *", Format::IncludeSeconds).unwrap();
            let start = utc("2024-01-01 00:00:58");
            let times: Vec<_> = cron.iter_from(start).take(3).collect();
            assert_eq!(
                times,
                [
                    utc("2024-01-01 00:00:58"),
                    utc("2024-01-01 00:00:59"),
                    utc("2024-01-01 00:01:00"),
                ]
            );
        }

        #[test]
        fn feb_edges() {
            // fun edge cases in february
            assert(
                "0 0 29 2 *",
                "1970-01-01 00:00:00".."2021-01-01 00:00:00",
                &[
                    "1972-02-29 00:00:00",
                    "1976-02-29 00:00:00",
                    "1980-02-29 00:00:00",
                    "1984-02-29 00:00:00",
                    "1988-02-29 00:00:00",
                    "1992-02-29 00:00:00",
                    "1996-02-29 00:00:00",
                    "2000-02-29 00:00:00",
                    "2004-02-29 00:00:00",
                    "2008-02-29 00:00:00",
                    "2012-02-29 00:00:00",
                    "2016-02-29 00:00:00",
                    "2020-02-29 00:00:00",
                ],
            );

            assert(
                "59 12 LW 2 *",
                "1970-01-01 00:00:00".."1980-01-01 00:00:00",
                &[
                    "1970-02-27 12:59:00",
                    "1971-02-26 12:59:00",
                    "1972-02-29 12:59:00",
                    "1973-02-28 12:59:00",
                    "1974-02-28 12:59:00",
                    "1975-02-28 12:59:00",
                    "1976-02-27 12:59:00",
                    "1977-02-28 12:59:00",
                    "1978-02-28 12:59:00",
                    "1979-02-28 12:59:00",
                ],
            );
        }

        #[test]
        fn enumeration_matches_a_brute_force_scan() {
            let cron: Cron = "*/7 3 * * *".parse().unwrap();
            let start = utc("2021-06-10 00:00:00");
            let end = utc("2021-06-12 00:00:00");

            let mut expected = Vec::new();
            let mut probe = start;
            while probe < end {
                if cron.contains(&probe) {
                    expected.push(probe);
                }
                probe = probe + chrono::Duration::minutes(1);
            }

            let actual: Vec<_> = cron.iter(start..end).collect();
            assert_eq!(expected, actual);
            assert_eq!(actual.len(), 18); // 9 per day at 03:00..=03:56
        }
    }
}
