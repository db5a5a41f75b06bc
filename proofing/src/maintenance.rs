//! Scheduled maintenance windows for issuing authorities.
//!
//! Many motor-vehicle agencies take their record systems down on a
//! fixed weekly schedule. Failures inside a published window are
//! excused from abuse counting and get a softer user-facing message.

use attest_types::{Jurisdiction, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One recurring weekly window, in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    /// Minute of day the window opens, 0..=1439.
    pub start_minute: u32,
    /// Minute of day the window closes (exclusive). May be smaller than
    /// `start_minute`, in which case the window wraps past midnight into
    /// the next day.
    pub end_minute: u32,
}

impl MaintenanceWindow {
    pub fn contains(&self, now: Timestamp) -> bool {
        let dow = now.day_of_week();
        let minute = now.minute_of_day();
        if self.start_minute <= self.end_minute {
            dow == self.day_of_week && minute >= self.start_minute && minute < self.end_minute
        } else {
            // Wraps past midnight: [start, 24:00) on day N plus [0, end) on day N+1.
            (dow == self.day_of_week && minute >= self.start_minute)
                || (dow == (self.day_of_week + 1) % 7 && minute < self.end_minute)
        }
    }
}

/// Published maintenance windows per jurisdiction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MaintenanceSchedule {
    windows: HashMap<Jurisdiction, Vec<MaintenanceWindow>>,
}

impl MaintenanceSchedule {
    pub fn new(windows: HashMap<Jurisdiction, Vec<MaintenanceWindow>>) -> Self {
        Self { windows }
    }

    pub fn in_maintenance_window(&self, jurisdiction: &Jurisdiction, now: Timestamp) -> bool {
        self.windows
            .get(jurisdiction)
            .is_some_and(|windows| windows.iter().any(|w| w.contains(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1970-01-04 00:00 UTC was a Sunday.
    const SUNDAY_MIDNIGHT: u64 = 3 * 86_400;

    fn schedule(day: u8, start: u32, end: u32) -> MaintenanceSchedule {
        let mut windows = HashMap::new();
        windows.insert(
            "VA".parse().unwrap(),
            vec![MaintenanceWindow {
                day_of_week: day,
                start_minute: start,
                end_minute: end,
            }],
        );
        MaintenanceSchedule::new(windows)
    }

    #[test]
    fn inside_window_is_detected() {
        let schedule = schedule(0, 120, 300); // Sunday 02:00-05:00
        let va = "VA".parse().unwrap();
        let inside = Timestamp::new(SUNDAY_MIDNIGHT + 3 * 3600);
        let before = Timestamp::new(SUNDAY_MIDNIGHT + 3600);
        assert!(schedule.in_maintenance_window(&va, inside));
        assert!(!schedule.in_maintenance_window(&va, before));
    }

    #[test]
    fn unknown_jurisdiction_is_never_in_maintenance() {
        let schedule = schedule(0, 0, 1439);
        let md = "MD".parse().unwrap();
        assert!(!schedule.in_maintenance_window(&md, Timestamp::new(SUNDAY_MIDNIGHT)));
    }

    #[test]
    fn wrapping_window_spans_midnight() {
        // Sunday 23:00 through Monday 01:00.
        let schedule = schedule(0, 1380, 60);
        let va = "VA".parse().unwrap();
        let sunday_night = Timestamp::new(SUNDAY_MIDNIGHT + 23 * 3600 + 1800);
        let monday_early = Timestamp::new(SUNDAY_MIDNIGHT + 24 * 3600 + 1800);
        let monday_later = Timestamp::new(SUNDAY_MIDNIGHT + 24 * 3600 + 2 * 3600);
        assert!(schedule.in_maintenance_window(&va, sunday_night));
        assert!(schedule.in_maintenance_window(&va, monday_early));
        assert!(!schedule.in_maintenance_window(&va, monday_later));
    }

    #[test]
    fn day_boundary_is_exclusive_at_end() {
        let schedule = schedule(0, 120, 300);
        let va = "VA".parse().unwrap();
        let at_end = Timestamp::new(SUNDAY_MIDNIGHT + 300 * 60);
        assert!(!schedule.in_maintenance_window(&va, at_end));
    }
}
