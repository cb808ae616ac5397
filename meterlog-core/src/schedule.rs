//! Interval boundaries.
//!
//! A boundary is the instant at which the meter generates an entry on its
//! own. Every policy's boundaries fall on a midnight except `Hourly`.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use meterlog_codec::IntervalPolicy;

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Returns the first boundary of `policy` strictly after `after`.
///
/// `None` only when the calendar overflows.
pub fn next_boundary(policy: IntervalPolicy, after: NaiveDateTime) -> Option<NaiveDateTime> {
    let date = after.date();
    match policy {
        IntervalPolicy::Hourly => {
            let hour_start = date.and_hms_opt(after.hour(), 0, 0)?;
            hour_start.checked_add_signed(Duration::hours(1))
        }
        IntervalPolicy::Daily => date.succ_opt().map(midnight),
        IntervalPolicy::Weekly(_) => {
            let target = policy.weekday()?.num_days_from_sunday() as i64;
            let today = date.weekday().num_days_from_sunday() as i64;
            let mut ahead = (target - today).rem_euclid(7);
            if ahead == 0 {
                ahead = 7;
            }
            date.checked_add_signed(Duration::days(ahead)).map(midnight)
        }
        IntervalPolicy::MonthlyMid => {
            let this_month = NaiveDate::from_ymd_opt(date.year(), date.month(), 15)?;
            if midnight(this_month) > after {
                Some(midnight(this_month))
            } else {
                let next = first_of_next_month(date)?;
                NaiveDate::from_ymd_opt(next.year(), next.month(), 15).map(midnight)
            }
        }
        IntervalPolicy::MonthlyEnd => first_of_next_month(date).map(midnight),
        IntervalPolicy::Yearly => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).map(midnight),
    }
}

/// Returns true if a boundary of `policy` lies in `(prev, now]`.
pub fn crosses(policy: IntervalPolicy, prev: NaiveDateTime, now: NaiveDateTime) -> bool {
    if now <= prev {
        return false;
    }
    next_boundary(policy, prev).is_some_and(|boundary| boundary <= now)
}
