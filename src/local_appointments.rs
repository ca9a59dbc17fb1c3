use crate::{
    backend::AppointmentBackend,
    error::{BookingError, Result},
    types::{Appointment, Employee, NewAppointment},
};
use chrono::{DateTime, Utc};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct LocalState {
    employees: Vec<Employee>,
    appointments: BTreeMap<i32, Appointment>,
    next_appointment_id: i32,
}

/// Appointments kept in process memory, lost on restart.
#[derive(Debug, Clone, Default)]
pub struct LocalAppointments {
    state: Arc<Mutex<LocalState>>,
}

impl LocalAppointments {
    fn state(&self) -> Result<MutexGuard<'_, LocalState>> {
        self.state
            .lock()
            .map_err(|_| BookingError::Storage("in-memory store lock poisoned".into()))
    }

    fn with_appointment<F>(&self, id: i32, update: F) -> Result<()>
    where
        F: FnOnce(&mut Appointment),
    {
        let mut state = self.state()?;
        let appointment = state
            .appointments
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(format!("Appointment {id} does not exist")))?;
        update(appointment);
        Ok(())
    }
}

impl AppointmentBackend for LocalAppointments {
    fn employees(&self) -> Result<Vec<Employee>> {
        Ok(self.state()?.employees.clone())
    }

    fn employee(&self, id: i32) -> Result<Option<Employee>> {
        Ok(self.state()?.employees.iter().find(|e| e.id == id).cloned())
    }

    fn ensure_employees(&self, names: &[String]) -> Result<()> {
        let mut state = self.state()?;
        for name in names {
            if state.employees.iter().any(|e| &e.name == name) {
                continue;
            }
            let id = state.employees.iter().map(|e| e.id).max().unwrap_or(0) + 1;
            info!(employee_id = id, %name, "employee added");
            state.employees.push(Employee {
                id,
                name: name.clone(),
            });
        }
        Ok(())
    }

    fn list_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Appointment>> {
        let state = self.state()?;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.start_time >= start && a.start_time <= end)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| (a.start_time, a.employee_id));
        Ok(appointments)
    }

    fn find(&self, employee_id: i32, start_time: DateTime<Utc>) -> Result<Option<Appointment>> {
        let state = self.state()?;
        Ok(state
            .appointments
            .values()
            .find(|a| a.employee_id == employee_id && a.start_time == start_time)
            .cloned())
    }

    fn appointment(&self, id: i32) -> Result<Option<Appointment>> {
        Ok(self.state()?.appointments.get(&id).cloned())
    }

    fn create(&self, new: NewAppointment) -> Result<Appointment> {
        let mut state = self.state()?;
        if !state.employees.iter().any(|e| e.id == new.employee_id) {
            return Err(BookingError::NotFound("Employee does not exist".into()));
        }
        if state
            .appointments
            .values()
            .any(|a| a.employee_id == new.employee_id && a.start_time == new.start_time)
        {
            return Err(BookingError::Conflict("Slot already taken".into()));
        }

        state.next_appointment_id += 1;
        let appointment = Appointment {
            id: state.next_appointment_id,
            employee_id: new.employee_id,
            customer_name: new.customer_name,
            phone: new.phone,
            service: new.service,
            start_time: new.start_time,
            end_time: new.end_time,
            created_at: Utc::now(),
            reminder_sent: false,
            reminder_attempts: 0,
            reminder_last_attempt: None,
            reminder_failed: false,
        };
        state.appointments.insert(appointment.id, appointment.clone());
        debug!(appointment_id = appointment.id, "appointment stored in memory");
        Ok(appointment)
    }

    fn delete(&self, id: i32) -> Result<Appointment> {
        self.state()?
            .appointments
            .remove(&id)
            .ok_or_else(|| BookingError::NotFound(format!("Appointment {id} does not exist")))
    }

    fn pending_reminders(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Appointment>> {
        let state = self.state()?;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| !a.reminder_sent && !a.reminder_failed)
            .filter(|a| a.start_time >= from && a.start_time < until)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.start_time);
        Ok(appointments)
    }

    fn mark_reminder_sent(&self, id: i32) -> Result<()> {
        self.with_appointment(id, |a| a.reminder_sent = true)
    }

    fn record_reminder_failure(&self, id: i32, at: DateTime<Utc>, terminal: bool) -> Result<()> {
        self.with_appointment(id, |a| {
            a.reminder_attempts += 1;
            a.reminder_last_attempt = Some(at);
            a.reminder_failed |= terminal;
        })
    }
}
