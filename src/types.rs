use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i32,
    pub employee_id: i32,
    pub customer_name: String,
    pub phone: Option<String>,
    pub service: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub reminder_sent: bool,
    pub reminder_attempts: i32,
    pub reminder_last_attempt: Option<DateTime<Utc>>,
    pub reminder_failed: bool,
}

/// Everything a store needs to persist a new appointment. The end time is
/// computed by the caller from the configured slot length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub employee_id: i32,
    pub customer_name: String,
    pub phone: Option<String>,
    pub service: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A bookable start time on one day. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub start: DateTime<Tz>,
    pub label: String,
}

impl Slot {
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }
}
