use crate::error::Result;
use crate::types::{Appointment, Employee, NewAppointment};
use chrono::{DateTime, Utc};

/// Storage of employees and appointments.
///
/// Implementations must reject a second appointment for the same
/// `(employee_id, start_time)` with [`crate::error::BookingError::Conflict`],
/// atomically with the insert.
pub trait AppointmentBackend: Clone + Send + Sync + 'static {
    fn employees(&self) -> Result<Vec<Employee>>;
    fn employee(&self, id: i32) -> Result<Option<Employee>>;
    /// Inserts every name that is not stored yet. Never renames or removes.
    fn ensure_employees(&self, names: &[String]) -> Result<()>;

    /// Appointments with `start <= start_time <= end`, ordered by start time.
    fn list_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Appointment>>;
    fn find(&self, employee_id: i32, start_time: DateTime<Utc>) -> Result<Option<Appointment>>;
    fn appointment(&self, id: i32) -> Result<Option<Appointment>>;
    fn create(&self, appointment: NewAppointment) -> Result<Appointment>;
    /// Removes the appointment for good and returns it.
    fn delete(&self, id: i32) -> Result<Appointment>;

    /// Appointments with `from <= start_time < until` whose reminder is
    /// neither sent nor given up on.
    fn pending_reminders(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Appointment>>;
    fn mark_reminder_sent(&self, id: i32) -> Result<()>;
    /// Counts a failed delivery; `terminal` stops any further attempt.
    fn record_reminder_failure(&self, id: i32, at: DateTime<Utc>, terminal: bool) -> Result<()>;
}
