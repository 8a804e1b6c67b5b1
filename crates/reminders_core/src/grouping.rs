//! Day-bucket grouping for reminder lists.
//!
//! Pure function over a list and a reference instant: no I/O, no clock reads.

use crate::model::reminder::Reminder;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};

/// Reminders partitioned into display buckets, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedReminders {
    pub today: Vec<Reminder>,
    pub tomorrow: Vec<Reminder>,
    /// Overdue and later-than-tomorrow reminders.
    pub upcoming: Vec<Reminder>,
}

impl GroupedReminders {
    pub fn len(&self) -> usize {
        self.today.len() + self.tomorrow.len() + self.upcoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits reminders into today / tomorrow / upcoming relative to `now`.
///
/// Day boundaries are local midnights in `now`'s time zone, so a DST change
/// produces a 23 or 25 hour day rather than shifting the boundary.
pub fn group_by_day<Tz: TimeZone>(
    reminders: impl IntoIterator<Item = Reminder>,
    now: &DateTime<Tz>,
) -> GroupedReminders {
    let tz = now.timezone();
    let today = now.date_naive();
    let start_today = start_of_day(&tz, today);
    let start_tomorrow = start_of_day(&tz, today + Days::new(1));
    let start_after = start_of_day(&tz, today + Days::new(2));

    let mut grouped = GroupedReminders::default();
    for reminder in reminders {
        let due = reminder.due_at;
        if due >= start_today && due < start_tomorrow {
            grouped.today.push(reminder);
        } else if due >= start_tomorrow && due < start_after {
            grouped.tomorrow.push(reminder);
        } else {
            grouped.upcoming.push(reminder);
        }
    }
    grouped
}

/// First instant of `date` in `tz`, as UTC.
///
/// Zones that skip midnight on a DST change start the day at the first
/// valid local time after it.
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let mut local = date.and_time(NaiveTime::MIN);
    for _ in 0..4 {
        if let Some(instant) = tz.from_local_datetime(&local).earliest() {
            return instant.with_timezone(&Utc);
        }
        local += chrono::Duration::minutes(30);
    }
    // No zone has a gap longer than two hours; treat the date as UTC.
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
