use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};

use crate::{
    backend::AppointmentBackend,
    error::{BookingError, Result},
    local_appointments::LocalAppointments,
    types::{Appointment, Employee, NewAppointment},
};

/// In-memory backend that counts the calls reaching it and can be switched
/// to fail every appointment operation.
pub struct MockAppointmentBackendInner {
    pub success: AtomicBool,
    pub calls_to_list_in_range: AtomicU64,
    pub calls_to_find: AtomicU64,
    pub calls_to_create: AtomicU64,
    pub calls_to_delete: AtomicU64,
    pub calls_to_mark_reminder_sent: AtomicU64,
    pub store: LocalAppointments,
}

#[derive(Clone)]
pub struct MockAppointmentBackend(pub Arc<MockAppointmentBackendInner>);

impl MockAppointmentBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_list_in_range: AtomicU64::default(),
            calls_to_find: AtomicU64::default(),
            calls_to_create: AtomicU64::default(),
            calls_to_delete: AtomicU64::default(),
            calls_to_mark_reminder_sent: AtomicU64::default(),
            store: LocalAppointments::default(),
        }
    }
}

impl MockAppointmentBackend {
    /// Backend with the employees `Merve` (id 1) and `Zeynep` (id 2).
    pub fn new() -> Self {
        let backend = Self(Arc::new(MockAppointmentBackendInner::new()));
        backend
            .0
            .store
            .ensure_employees(&["Merve".to_string(), "Zeynep".to_string()])
            .unwrap();
        backend
    }

    pub fn calls(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }

    fn result(&self) -> Result<()> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(BookingError::Storage("Supposed to fail".into())),
        }
    }
}

impl AppointmentBackend for MockAppointmentBackend {
    fn employees(&self) -> Result<Vec<Employee>> {
        self.0.store.employees()
    }

    fn employee(&self, id: i32) -> Result<Option<Employee>> {
        self.0.store.employee(id)
    }

    fn ensure_employees(&self, names: &[String]) -> Result<()> {
        self.0.store.ensure_employees(names)
    }

    fn list_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Appointment>> {
        self.0.calls_to_list_in_range.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.store.list_in_range(start, end)
    }

    fn find(&self, employee_id: i32, start_time: DateTime<Utc>) -> Result<Option<Appointment>> {
        self.0.calls_to_find.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.store.find(employee_id, start_time)
    }

    fn appointment(&self, id: i32) -> Result<Option<Appointment>> {
        self.0.store.appointment(id)
    }

    fn create(&self, appointment: NewAppointment) -> Result<Appointment> {
        self.0.calls_to_create.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.store.create(appointment)
    }

    fn delete(&self, id: i32) -> Result<Appointment> {
        self.0.calls_to_delete.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.store.delete(id)
    }

    fn pending_reminders(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Appointment>> {
        self.result()?;
        self.0.store.pending_reminders(from, until)
    }

    fn mark_reminder_sent(&self, id: i32) -> Result<()> {
        self.0
            .calls_to_mark_reminder_sent
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.store.mark_reminder_sent(id)
    }

    fn record_reminder_failure(&self, id: i32, at: DateTime<Utc>, terminal: bool) -> Result<()> {
        self.result()?;
        self.0.store.record_reminder_failure(id, at, terminal)
    }
}
