//! Reset times for free spins and missions, and countdown formatting.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::progress::MissionKind;

/// Next free-spin reset after the local wall-clock time `now`.
///
/// Resets happen on odd hours (01:00, 03:00, ... 23:00). From an odd hour
/// the next reset is two hours out; from an even hour it is the next hour.
pub fn next_spin_reset(now: NaiveDateTime) -> NaiveDateTime {
    let hour = now.hour();
    let step = if hour % 2 == 1 { 2 } else { 1 };
    let top_of_hour = now
        .date()
        .and_hms_opt(hour, 0, 0)
        .unwrap_or(now);
    top_of_hour + Duration::hours(step)
}

/// Local-time variant of [`next_spin_reset`].
pub fn next_spin_reset_local(now: DateTime<Local>) -> DateTime<Local> {
    let naive = next_spin_reset(now.naive_local());
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| now + Duration::hours(1))
}

/// Most recent free-spin reset at or before `now`.
pub fn previous_spin_reset(now: NaiveDateTime) -> NaiveDateTime {
    let hour = now.hour();
    let top_of_hour = now
        .date()
        .and_hms_opt(hour, 0, 0)
        .unwrap_or(now);
    if hour % 2 == 1 {
        top_of_hour
    } else {
        top_of_hour - Duration::hours(1)
    }
}

/// True when a spin reset boundary lies in `(last_reset, now]`.
pub fn spin_reset_due(last_reset: NaiveDateTime, now: NaiveDateTime) -> bool {
    next_spin_reset(last_reset) <= now
}

/// Next daily mission reset: the coming UTC midnight.
pub fn next_daily_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight_after(now.date_naive(), 1)
}

/// Next weekly mission reset: the coming Sunday 00:00 UTC. On a Sunday
/// this is the following Sunday.
pub fn next_weekly_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_sunday = now.weekday().num_days_from_sunday();
    let days_until = match days_from_sunday {
        0 => 7,
        n => 7 - n,
    };
    midnight_after(now.date_naive(), i64::from(days_until))
}

/// Next reset for a mission cadence.
pub fn next_mission_reset(kind: MissionKind, now: DateTime<Utc>) -> DateTime<Utc> {
    match kind {
        MissionKind::Daily => next_daily_reset(now),
        MissionKind::Weekly => next_weekly_reset(now),
    }
}

/// Start of the mission period containing `now`.
pub fn previous_mission_reset(kind: MissionKind, now: DateTime<Utc>) -> DateTime<Utc> {
    let period = match kind {
        MissionKind::Daily => Duration::days(1),
        MissionKind::Weekly => Duration::days(7),
    };
    next_mission_reset(kind, now) - period
}

fn midnight_after(date: NaiveDate, days: i64) -> DateTime<Utc> {
    let target = date + Duration::days(days);
    Utc.from_utc_datetime(&target.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// `HH:MM:SS` countdown. Negative durations render as zero.
pub fn format_clock(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Compact countdown: `1d 4h 12m` when at least a day remains, otherwise
/// `4h 12m 30s`.
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else {
        format!("{hours}h {minutes}m {seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: (i32, u32, u32), time: (u32, u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(time.0, time.1, time.2)
            .unwrap()
    }

    #[test]
    fn spin_reset_lands_on_odd_hours() {
        assert_eq!(
            next_spin_reset(at((2024, 5, 10), (4, 30, 0))),
            at((2024, 5, 10), (5, 0, 0))
        );
        assert_eq!(
            next_spin_reset(at((2024, 5, 10), (5, 0, 0))),
            at((2024, 5, 10), (7, 0, 0))
        );
        assert_eq!(
            next_spin_reset(at((2024, 5, 10), (0, 10, 0))),
            at((2024, 5, 10), (1, 0, 0))
        );
    }

    #[test]
    fn spin_reset_wraps_past_midnight() {
        assert_eq!(
            next_spin_reset(at((2024, 5, 10), (23, 15, 0))),
            at((2024, 5, 11), (1, 0, 0))
        );
        assert_eq!(
            next_spin_reset(at((2024, 12, 31), (22, 59, 59))),
            at((2024, 12, 31), (23, 0, 0))
        );
    }

    #[test]
    fn reset_due_once_a_boundary_passes() {
        let last = at((2024, 5, 10), (4, 30, 0));
        assert!(!spin_reset_due(last, at((2024, 5, 10), (4, 59, 59))));
        assert!(spin_reset_due(last, at((2024, 5, 10), (5, 0, 0))));
    }

    #[test]
    fn previous_spin_reset_is_the_last_odd_hour() {
        assert_eq!(
            previous_spin_reset(at((2024, 5, 10), (4, 30, 0))),
            at((2024, 5, 10), (3, 0, 0))
        );
        assert_eq!(
            previous_spin_reset(at((2024, 5, 10), (5, 0, 0))),
            at((2024, 5, 10), (5, 0, 0))
        );
        assert_eq!(
            previous_spin_reset(at((2024, 5, 10), (0, 10, 0))),
            at((2024, 5, 9), (23, 0, 0))
        );
    }

    #[test]
    fn mission_periods_start_at_the_last_reset() {
        let wednesday = Utc.from_utc_datetime(&at((2024, 5, 8), (9, 0, 0)));
        assert_eq!(
            previous_mission_reset(MissionKind::Daily, wednesday),
            Utc.from_utc_datetime(&at((2024, 5, 8), (0, 0, 0)))
        );
        assert_eq!(
            previous_mission_reset(MissionKind::Weekly, wednesday),
            Utc.from_utc_datetime(&at((2024, 5, 5), (0, 0, 0)))
        );
        let sunday = Utc.from_utc_datetime(&at((2024, 5, 12), (0, 0, 0)));
        assert_eq!(previous_mission_reset(MissionKind::Weekly, sunday), sunday);
    }

    #[test]
    fn daily_reset_is_next_utc_midnight() {
        let now = Utc.from_utc_datetime(&at((2024, 2, 28), (13, 0, 0)));
        assert_eq!(
            next_daily_reset(now),
            Utc.from_utc_datetime(&at((2024, 2, 29), (0, 0, 0)))
        );
    }

    #[test]
    fn weekly_reset_is_next_sunday() {
        // 2024-05-08 is a Wednesday
        let wednesday = Utc.from_utc_datetime(&at((2024, 5, 8), (9, 0, 0)));
        assert_eq!(
            next_weekly_reset(wednesday),
            Utc.from_utc_datetime(&at((2024, 5, 12), (0, 0, 0)))
        );
        let sunday = Utc.from_utc_datetime(&at((2024, 5, 12), (0, 0, 0)));
        assert_eq!(
            next_mission_reset(MissionKind::Weekly, sunday),
            Utc.from_utc_datetime(&at((2024, 5, 19), (0, 0, 0)))
        );
    }

    #[test]
    fn countdowns_format_and_clamp() {
        assert_eq!(format_clock(Duration::seconds(3_723)), "01:02:03");
        assert_eq!(format_clock(Duration::seconds(-5)), "00:00:00");
        assert_eq!(format_remaining(Duration::seconds(90_061)), "1d 1h 1m");
        assert_eq!(format_remaining(Duration::seconds(3_723)), "1h 2m 3s");
        assert_eq!(format_remaining(Duration::seconds(-1)), "0h 0m 0s");
    }
}
