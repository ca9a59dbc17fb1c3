use crate::schema::{appointments, employees};
use crate::{
    backend::AppointmentBackend,
    error::{BookingError, Result},
    types::{Appointment, Employee, NewAppointment},
};
use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, info};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;
     PRAGMA busy_timeout = 5000;
     PRAGMA journal_mode = WAL;";

#[derive(Queryable, Selectable)]
#[diesel(table_name = employees)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct EmployeeRow {
    id: i32,
    name: String,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = appointments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct AppointmentRow {
    id: i32,
    employee_id: i32,
    customer_name: String,
    phone: Option<String>,
    service: String,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    created_at: NaiveDateTime,
    reminder_sent: bool,
    reminder_attempts: i32,
    reminder_last_attempt: Option<NaiveDateTime>,
    reminder_failed: bool,
}

#[derive(Insertable)]
#[diesel(table_name = appointments)]
struct NewAppointmentRow<'a> {
    employee_id: i32,
    customer_name: &'a str,
    phone: Option<&'a str>,
    service: &'a str,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    created_at: NaiveDateTime,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Self {
            id: row.id,
            employee_id: row.employee_id,
            customer_name: row.customer_name,
            phone: row.phone,
            service: row.service,
            start_time: row.start_time.and_utc(),
            end_time: row.end_time.and_utc(),
            created_at: row.created_at.and_utc(),
            reminder_sent: row.reminder_sent,
            reminder_attempts: row.reminder_attempts,
            reminder_last_attempt: row.reminder_last_attempt.map(|at| at.and_utc()),
            reminder_failed: row.reminder_failed,
        }
    }
}

/// SQLite backed store. Timestamps are stored as UTC.
#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<SqliteConnection>>,
}

impl DatabaseInterface {
    /// Opens (or creates) the database file and brings its schema up to date.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(directory) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(directory)
                .with_context(|| format!("cannot create directory {}", directory.display()))?;
        }
        let database_url = path
            .to_str()
            .ok_or_else(|| anyhow!("database path {} is not valid UTF-8", path.display()))?;

        let mut connection = SqliteConnection::establish(database_url)
            .with_context(|| format!("cannot open database {database_url}"))?;
        connection
            .batch_execute(CONNECTION_PRAGMAS)
            .context("cannot configure database connection")?;
        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("cannot migrate database {database_url}: {err}"))?;
        if !applied.is_empty() {
            info!(count = applied.len(), "database migrations applied");
        }

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, SqliteConnection>> {
        self.connection
            .lock()
            .map_err(|_| BookingError::Storage("database connection lock poisoned".into()))
    }
}

fn insert_error(err: diesel::result::Error) -> BookingError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            BookingError::Conflict("Slot already taken".into())
        }
        diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            BookingError::NotFound("Employee does not exist".into())
        }
        err => err.into(),
    }
}

fn appointment_not_found(id: i32) -> BookingError {
    BookingError::NotFound(format!("Appointment {id} does not exist"))
}

impl AppointmentBackend for DatabaseInterface {
    fn employees(&self) -> Result<Vec<Employee>> {
        let mut connection = self.connection()?;
        let rows = employees::table
            .order(employees::id.asc())
            .select(EmployeeRow::as_select())
            .load(&mut *connection)?;
        Ok(rows.into_iter().map(Employee::from).collect())
    }

    fn employee(&self, id: i32) -> Result<Option<Employee>> {
        let mut connection = self.connection()?;
        let row = employees::table
            .find(id)
            .select(EmployeeRow::as_select())
            .first(&mut *connection)
            .optional()?;
        Ok(row.map(Employee::from))
    }

    fn ensure_employees(&self, names: &[String]) -> Result<()> {
        let mut connection = self.connection()?;
        connection.immediate_transaction::<_, BookingError, _>(|connection| {
            for name in names {
                let inserted = diesel::insert_or_ignore_into(employees::table)
                    .values(employees::name.eq(name.as_str()))
                    .execute(connection)?;
                if inserted > 0 {
                    info!(%name, "employee added");
                }
            }
            Ok(())
        })
    }

    fn list_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Appointment>> {
        let mut connection = self.connection()?;
        let rows = appointments::table
            .filter(appointments::start_time.ge(start.naive_utc()))
            .filter(appointments::start_time.le(end.naive_utc()))
            .order((appointments::start_time.asc(), appointments::employee_id.asc()))
            .select(AppointmentRow::as_select())
            .load(&mut *connection)?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    fn find(&self, employee_id: i32, start_time: DateTime<Utc>) -> Result<Option<Appointment>> {
        let mut connection = self.connection()?;
        let row = appointments::table
            .filter(appointments::employee_id.eq(employee_id))
            .filter(appointments::start_time.eq(start_time.naive_utc()))
            .select(AppointmentRow::as_select())
            .first(&mut *connection)
            .optional()?;
        Ok(row.map(Appointment::from))
    }

    fn appointment(&self, id: i32) -> Result<Option<Appointment>> {
        let mut connection = self.connection()?;
        let row = appointments::table
            .find(id)
            .select(AppointmentRow::as_select())
            .first(&mut *connection)
            .optional()?;
        Ok(row.map(Appointment::from))
    }

    fn create(&self, new: NewAppointment) -> Result<Appointment> {
        let row = NewAppointmentRow {
            employee_id: new.employee_id,
            customer_name: &new.customer_name,
            phone: new.phone.as_deref(),
            service: &new.service,
            start_time: new.start_time.naive_utc(),
            end_time: new.end_time.naive_utc(),
            created_at: Utc::now().naive_utc(),
        };

        let mut connection = self.connection()?;
        let created = connection.immediate_transaction::<_, BookingError, _>(|connection| {
            let employee_exists: bool =
                diesel::select(diesel::dsl::exists(employees::table.find(new.employee_id)))
                    .get_result(connection)?;
            if !employee_exists {
                return Err(BookingError::NotFound("Employee does not exist".into()));
            }

            // The unique index on (employee_id, start_time) decides races.
            diesel::insert_into(appointments::table)
                .values(&row)
                .execute(connection)
                .map_err(insert_error)?;

            let created = appointments::table
                .filter(appointments::employee_id.eq(row.employee_id))
                .filter(appointments::start_time.eq(row.start_time))
                .select(AppointmentRow::as_select())
                .first(connection)?;
            Ok(Appointment::from(created))
        })?;

        debug!(appointment_id = created.id, "appointment stored");
        Ok(created)
    }

    fn delete(&self, id: i32) -> Result<Appointment> {
        let mut connection = self.connection()?;
        connection.immediate_transaction::<_, BookingError, _>(|connection| {
            let row = appointments::table
                .find(id)
                .select(AppointmentRow::as_select())
                .first(connection)
                .optional()?
                .ok_or_else(|| appointment_not_found(id))?;
            diesel::delete(appointments::table.find(id)).execute(connection)?;
            Ok(Appointment::from(row))
        })
    }

    fn pending_reminders(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Appointment>> {
        let mut connection = self.connection()?;
        let rows = appointments::table
            .filter(appointments::reminder_sent.eq(false))
            .filter(appointments::reminder_failed.eq(false))
            .filter(appointments::start_time.ge(from.naive_utc()))
            .filter(appointments::start_time.lt(until.naive_utc()))
            .order(appointments::start_time.asc())
            .select(AppointmentRow::as_select())
            .load(&mut *connection)?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    fn mark_reminder_sent(&self, id: i32) -> Result<()> {
        let mut connection = self.connection()?;
        let updated = diesel::update(appointments::table.find(id))
            .set(appointments::reminder_sent.eq(true))
            .execute(&mut *connection)?;
        if updated == 0 {
            return Err(appointment_not_found(id));
        }
        Ok(())
    }

    fn record_reminder_failure(&self, id: i32, at: DateTime<Utc>, terminal: bool) -> Result<()> {
        let mut connection = self.connection()?;
        let target = appointments::table.find(id);
        let attempt = (
            appointments::reminder_attempts.eq(appointments::reminder_attempts + 1),
            appointments::reminder_last_attempt.eq(Some(at.naive_utc())),
        );
        let updated = if terminal {
            diesel::update(target)
                .set((attempt, appointments::reminder_failed.eq(true)))
                .execute(&mut *connection)?
        } else {
            diesel::update(target).set(attempt).execute(&mut *connection)?
        };
        if updated == 0 {
            return Err(appointment_not_found(id));
        }
        Ok(())
    }
}
