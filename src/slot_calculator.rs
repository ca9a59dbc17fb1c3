use crate::{configuration::BusinessHours, types::Slot};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Bookable slots of `day`, earliest first.
///
/// Slots step by the configured length from opening time and must end by
/// closing time. One additional slot starting `late_slot_lead_minutes`
/// before closing is added when the regular stepping misses it and it still
/// fits. A closed weekday never has slots.
pub fn slots_for_day(day: NaiveDate, hours: &BusinessHours, timezone: &Tz) -> Vec<Slot> {
    if hours.is_closed_on(day.weekday()) {
        return vec![];
    }

    let step = hours.slot_duration();
    if step <= Duration::zero() {
        return vec![];
    }

    let close = day.and_time(hours.close);
    let mut starts = Vec::new();
    let mut current = day.and_time(hours.open);
    while current + step <= close {
        starts.push(current);
        current += step;
    }

    let late = close - Duration::minutes(i64::from(hours.late_slot_lead_minutes));
    if late >= day.and_time(hours.open) && late + step <= close && !starts.contains(&late) {
        starts.push(late);
    }
    starts.sort_unstable();

    starts
        .into_iter()
        .filter_map(|start| localize(start, timezone))
        .collect()
}

/// The slot of `day` labelled `label`, if it is bookable.
pub fn find_slot(day: NaiveDate, label: &str, hours: &BusinessHours, timezone: &Tz) -> Option<Slot> {
    slots_for_day(day, hours, timezone)
        .into_iter()
        .find(|slot| slot.label == label)
}

// Times inside a DST gap do not exist and are skipped.
fn localize(start: NaiveDateTime, timezone: &Tz) -> Option<Slot> {
    let start = timezone.from_local_datetime(&start).earliest()?;
    Some(Slot {
        label: start.format("%H:%M").to_string(),
        start,
    })
}
