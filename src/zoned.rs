//! Time-zone aware occurrence search.
//!
//! The tick search in the crate root knows nothing about time zones; it walks
//! local civil time. This module drives it across daylight-saving
//! transitions: a result that lands in a spring-forward gap snaps to the
//! first valid instant, and a search starting inside a fall-back overlap is
//! split into a bounded pass per clock reading so repeating schedules fire in
//! both halves while fixed ones fire only once.
//!
//! `chrono` resolves local times the way the search assumes: within a
//! fall-back overlap the earlier boundary reading is ambiguous and the later
//! one is not, so no input biasing is needed here. The tests pin that
//! contract down against the IANA database.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Timelike};

use crate::calendar::{naive_from_ticks, ticks_from_naive};
use crate::{Cron, NOT_FOUND};

impl Cron {
    /// Returns the next time matching the cron value at or after the given
    /// time, or `None` if no such time exists on or before the search
    /// horizon (the end of year 2499).
    ///
    /// The time is interpreted in its own time zone and the search runs over
    /// that zone's civil clock. A matching wall-clock reading skipped by a
    /// spring-forward jump yields the first valid instant after the jump; a
    /// reading repeated by a fall-back overlap yields the earlier
    /// (pre-transition) instant.
    ///
    /// # Example
    /// ```
    /// use cassia::Cron;
    /// use chrono::{TimeZone, Utc};
    ///
    /// let cron: Cron = "0 0 * * *".parse().unwrap();
    /// let midnight = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    ///
    /// assert_eq!(cron.next_from(&midnight), Some(midnight));
    /// ```
    #[inline]
    pub fn next_from<Tz: TimeZone>(&self, start: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.next_occurrence(start, true)
    }

    /// Returns the next time matching the cron value strictly after the
    /// given time, or `None` if no such time exists on or before the search
    /// horizon.
    ///
    /// # Example
    /// ```
    /// use cassia::Cron;
    /// use chrono::{TimeZone, Utc};
    ///
    /// let cron: Cron = "0 0 * * *".parse().unwrap();
    /// let midnight = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    ///
    /// assert_eq!(
    ///     cron.next_after(&midnight),
    ///     Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).single(),
    /// );
    /// ```
    #[inline]
    pub fn next_after<Tz: TimeZone>(&self, start: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.next_occurrence(start, false)
    }

    fn next_occurrence<Tz: TimeZone>(
        &self,
        start: &DateTime<Tz>,
        inclusive: bool,
    ) -> Option<DateTime<Tz>> {
        if !self.any() {
            return None;
        }

        let tz = start.timezone();
        let mut inclusive = inclusive;
        let mut start = start.clone();
        if start.timestamp_subsec_nanos() > 0 {
            // zone conversions of fractional seconds drift near transitions;
            // a sub-second start floors to its second and excludes it
            start = start.with_nanosecond(0)?;
            inclusive = false;
        }
        let mut from_local = start.naive_local();

        if let LocalResult::Ambiguous(earlier, later) = tz.from_local_datetime(&from_local) {
            // the same wall-clock window occurs twice; search each pass
            // separately, bounded by the end of the overlap
            let daylight_offset = earlier.offset().fix();
            let standard_offset = later.offset().fix();
            let overlap = Duration::seconds(i64::from(
                daylight_offset.local_minus_utc() - standard_offset.local_minus_utc(),
            ));
            let interval_end = ambiguous_interval_end(&tz, from_local, overlap);
            let bound = ticks_from_naive(interval_end) - 1;

            if start.offset().fix() != standard_offset {
                // clocks have not fallen back yet
                let found =
                    self.find_occurrence_in_range(ticks_from_naive(from_local), bound, inclusive);
                if found != NOT_FOUND {
                    return tz.from_local_datetime(&naive_from_ticks(found)).earliest();
                }
                from_local = interval_end - overlap;
                inclusive = true;
            }
            if self.is_interval() {
                // a repeating schedule runs again after the clocks fall back;
                // a fixed one already fired in the first pass
                let found =
                    self.find_occurrence_in_range(ticks_from_naive(from_local), bound, inclusive);
                if found != NOT_FOUND {
                    return tz.from_local_datetime(&naive_from_ticks(found)).latest();
                }
            }
            from_local = interval_end;
            inclusive = true;
        }

        let found = self.find_occurrence(ticks_from_naive(from_local), inclusive);
        if found == NOT_FOUND {
            return None;
        }
        let local = naive_from_ticks(found);
        match tz.from_local_datetime(&local) {
            LocalResult::Single(date) => Some(date),
            // a repeated reading resolves to the earlier instant
            LocalResult::Ambiguous(earlier, _) => Some(earlier),
            // a skipped reading snaps to the first valid instant after the gap
            LocalResult::None => tz.from_local_datetime(&gap_end(&tz, local)).earliest(),
        }
    }
}

fn is_ambiguous<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> bool {
    matches!(
        tz.offset_from_local_datetime(&local),
        LocalResult::Ambiguous(..)
    )
}

fn is_invalid<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> bool {
    matches!(tz.offset_from_local_datetime(&local), LocalResult::None)
}

/// First unambiguous local instant after `inside`, which must be ambiguous.
/// The overlap is as long as the offset difference, so the boundary lies
/// within `overlap` of any reading inside it; bisect on whole seconds.
fn ambiguous_interval_end<Tz: TimeZone>(
    tz: &Tz,
    inside: NaiveDateTime,
    overlap: Duration,
) -> NaiveDateTime {
    let mut low = 1;
    let mut high = overlap.num_seconds();
    debug_assert!(high > 0, "ambiguous time with a non-positive overlap");
    while low < high {
        let mid = low + (high - low) / 2;
        if is_ambiguous(tz, inside + Duration::seconds(mid)) {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    inside + Duration::seconds(low)
}

/// First valid local instant at or after `inside`, which must fall in a
/// spring-forward gap. Gaps are usually one hour but can reach a whole day
/// (zones skipping over the date line), so scan coarsely for a valid upper
/// bound and then bisect on whole seconds.
fn gap_end<Tz: TimeZone>(tz: &Tz, inside: NaiveDateTime) -> NaiveDateTime {
    let mut bound = 1;
    while is_invalid(tz, inside + Duration::hours(bound)) && bound < 49 {
        bound += 1;
    }
    let mut low = 1;
    let mut high = bound * 3600;
    while low < high {
        let mid = low + (high - low) / 2;
        if is_invalid(tz, inside + Duration::seconds(mid)) {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    inside + Duration::seconds(low)
}
