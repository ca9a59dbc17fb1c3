use chrono::{Duration, NaiveTime, Weekday};
use chrono_tz::Tz;
use std::path::PathBuf;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn host(&self) -> String;
    fn port(&self) -> u16;
    /// `None` runs with an in-memory store.
    fn database_path(&self) -> Option<PathBuf>;
    fn timezone(&self) -> anyhow::Result<Tz>;
    fn business_hours(&self) -> anyhow::Result<BusinessHours>;
    fn employee_names(&self) -> Vec<String>;
    fn services(&self) -> Vec<String>;
    /// Present only when every messaging credential is set.
    fn twilio_credentials(&self) -> Option<TwilioCredentials>;
    fn reminder_interval(&self) -> std::time::Duration;
    fn reminder_policy(&self) -> ReminderPolicy;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub slot_minutes: u32,
    pub closed_weekday: Option<Weekday>,
    /// The extra slot starts this many minutes before closing.
    pub late_slot_lead_minutes: u32,
}

impl BusinessHours {
    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_minutes))
    }

    pub fn is_closed_on(&self, weekday: Weekday) -> bool {
        self.closed_weekday == Some(weekday)
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(19, 30, 0).unwrap_or_default(),
            slot_minutes: 60,
            closed_weekday: Some(Weekday::Sun),
            late_slot_lead_minutes: 60,
        }
    }
}

/// How the reminder dispatcher picks candidates and retries failed deliveries.
///
/// With `retry_grace` at zero an appointment is only ever inside the lookahead
/// window for a single run, so a failed delivery is not retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub lead: Duration,
    pub window: Duration,
    pub retry_grace: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            lead: Duration::minutes(60),
            window: Duration::minutes(1),
            retry_grace: Duration::zero(),
            max_attempts: 3,
            backoff: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
}
