use crate::{
    backend::AppointmentBackend,
    configuration::BusinessHours,
    error::{BookingError, Result},
    slot_calculator::{find_slot, slots_for_day},
    types::{Appointment, Employee, NewAppointment, Slot},
    week_builder::{is_supported, week_days, week_start_for, WeekNavigation},
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::info;
use validator::Validate;

/// A visitor's request for one slot, as submitted by the booking form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub employee_id: i32,
    pub date: NaiveDate,
    pub time: String,
    pub customer_name: String,
    pub service: String,
    pub phone: Option<String>,
}

#[derive(Debug, Validate)]
struct CustomerDetails {
    #[validate(length(min = 1, message = "Customer name is required"))]
    customer_name: String,
    #[validate(length(min = 1, message = "Service is required"))]
    service: String,
}

impl CustomerDetails {
    fn check(&self) -> Result<()> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };
        let fields = errors.field_errors();
        let message = ["customer_name", "service"]
            .iter()
            .filter_map(|field| fields.get(*field))
            .flat_map(|errors| errors.iter())
            .filter_map(|error| error.message.as_ref())
            .map(|message| message.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(BookingError::Validation(message))
    }
}

#[derive(Debug, Clone)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Everything needed to draw one week of the grid.
#[derive(Debug, Clone)]
pub struct WeekView {
    pub navigation: WeekNavigation,
    pub days: Vec<DaySchedule>,
    /// Employees shown as columns, after filtering.
    pub employees: Vec<Employee>,
    pub all_employees: Vec<Employee>,
    pub selected_employee: Option<String>,
    occupancy: HashMap<(i32, DateTime<Utc>), Appointment>,
}

impl WeekView {
    pub fn appointment_at(&self, employee_id: i32, slot: &Slot) -> Option<&Appointment> {
        self.occupancy.get(&(employee_id, slot.start_utc()))
    }

    pub fn booked_count(&self) -> usize {
        self.occupancy.len()
    }
}

/// What the slot modal shows: either the booking occupying the slot or an
/// empty form.
#[derive(Debug, Clone)]
pub struct SlotDetail {
    pub employee: Employee,
    pub date: NaiveDate,
    pub time: String,
    pub bookable: bool,
    pub appointment: Option<Appointment>,
}

#[derive(Clone)]
pub struct BookingService<T: AppointmentBackend> {
    backend: T,
    hours: BusinessHours,
    timezone: Tz,
    services: Vec<String>,
}

impl<T: AppointmentBackend> BookingService<T> {
    pub fn new(backend: T, hours: BusinessHours, timezone: Tz, services: Vec<String>) -> Self {
        Self {
            backend,
            hours,
            timezone,
            services,
        }
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Books a slot. The slot is checked against business hours before the
    /// store is touched, so an invalid slot never reports a conflict.
    pub fn request_booking(&self, request: BookingRequest) -> Result<Appointment> {
        ensure_supported(request.date)?;
        if self.hours.is_closed_on(request.date.weekday()) {
            return Err(BookingError::InvalidSlot(format!(
                "The salon is closed on {}",
                request.date.format("%A")
            )));
        }
        let slot = find_slot(request.date, &request.time, &self.hours, &self.timezone).ok_or_else(
            || {
                BookingError::InvalidSlot(format!(
                    "{} is not a bookable time on {}",
                    request.time, request.date
                ))
            },
        )?;

        let details = CustomerDetails {
            customer_name: request.customer_name.trim().to_string(),
            service: request.service.trim().to_string(),
        };
        details.check()?;
        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
            .map(String::from);

        let start_time = slot.start_utc();
        let appointment = self.backend.create(NewAppointment {
            employee_id: request.employee_id,
            customer_name: details.customer_name,
            phone,
            service: details.service,
            start_time,
            end_time: start_time + self.hours.slot_duration(),
        })?;

        info!(
            appointment_id = appointment.id,
            employee_id = appointment.employee_id,
            start = %slot.start,
            "appointment booked"
        );
        Ok(appointment)
    }

    pub fn cancel_booking(&self, appointment_id: i32) -> Result<Appointment> {
        let appointment = self.backend.delete(appointment_id)?;
        info!(
            appointment_id,
            employee_id = appointment.employee_id,
            "appointment cancelled"
        );
        Ok(appointment)
    }

    /// Monday of the week the appointment falls into, in salon time.
    pub fn week_of(&self, appointment: &Appointment) -> NaiveDate {
        week_start_for(appointment.start_time.with_timezone(&self.timezone).date_naive())
    }

    /// Read model of the week containing `day`. `employee_filter` is an
    /// employee name; `None`, `"all"` or an unknown name shows everyone.
    pub fn week_view(&self, day: NaiveDate, employee_filter: Option<&str>) -> Result<WeekView> {
        ensure_supported(day)?;
        let dates = week_days(day);
        let all_employees = self.backend.employees()?;
        let selected_employee = employee_filter
            .filter(|name| !name.eq_ignore_ascii_case("all"))
            .filter(|name| all_employees.iter().any(|e| e.name == *name))
            .map(String::from);
        let employees = match &selected_employee {
            Some(name) => all_employees
                .iter()
                .filter(|e| &e.name == name)
                .cloned()
                .collect(),
            None => all_employees.clone(),
        };

        let start = self.local_instant(dates[0], NaiveTime::MIN);
        let end = self.local_instant(dates[6] + Duration::days(1), NaiveTime::MIN)
            - Duration::seconds(1);
        let occupancy = self
            .backend
            .list_in_range(start, end)?
            .into_iter()
            .map(|a| ((a.employee_id, a.start_time), a))
            .collect();

        Ok(WeekView {
            navigation: WeekNavigation::new(day, self.today()),
            days: dates
                .iter()
                .map(|&date| DaySchedule {
                    date,
                    slots: slots_for_day(date, &self.hours, &self.timezone),
                })
                .collect(),
            employees,
            all_employees,
            selected_employee,
            occupancy,
        })
    }

    pub fn slot_detail(&self, employee_id: i32, date: NaiveDate, time: NaiveTime) -> Result<SlotDetail> {
        ensure_supported(date)?;
        let employee = self
            .backend
            .employee(employee_id)?
            .ok_or_else(|| BookingError::NotFound("Employee does not exist".into()))?;
        let label = time.format("%H:%M").to_string();
        let bookable = find_slot(date, &label, &self.hours, &self.timezone).is_some();
        let appointment = self
            .backend
            .find(employee_id, self.local_instant(date, time))?;

        Ok(SlotDetail {
            employee,
            date,
            time: label,
            bookable,
            appointment,
        })
    }

    fn local_instant(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        match self.timezone.from_local_datetime(&local).earliest() {
            Some(instant) => instant.with_timezone(&Utc),
            // Inside a DST gap; shift by the zone's offset at that UTC time.
            None => self
                .timezone
                .from_utc_datetime(&local)
                .with_timezone(&Utc),
        }
    }
}

fn ensure_supported(day: NaiveDate) -> Result<()> {
    if is_supported(day) {
        Ok(())
    } else {
        Err(BookingError::Validation(format!(
            "Date {day} is outside the supported range"
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{local_appointments::LocalAppointments, testutils::MockAppointmentBackend};
    use chrono_tz::Europe::Istanbul;
    use test_case::test_case;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn service<T: AppointmentBackend>(backend: T) -> BookingService<T> {
        BookingService::new(
            backend,
            BusinessHours::default(),
            Istanbul,
            vec!["Nails".into(), "Skin care".into()],
        )
    }

    fn local_service() -> BookingService<LocalAppointments> {
        let backend = LocalAppointments::default();
        backend
            .ensure_employees(&["Merve".to_string(), "Zeynep".to_string()])
            .unwrap();
        service(backend)
    }

    fn request(employee_id: i32, day: u32, time: &str) -> BookingRequest {
        BookingRequest {
            employee_id,
            date: date(day),
            time: time.into(),
            customer_name: "  Ayse Yilmaz ".into(),
            service: "Nails".into(),
            phone: Some(" +905551112233 ".into()),
        }
    }

    #[test]
    fn test_booking_round_trip() {
        let service = local_service();
        let booked = service.request_booking(request(1, 4, "10:00")).unwrap();
        assert_eq!(booked.customer_name, "Ayse Yilmaz");
        assert_eq!(booked.phone.as_deref(), Some("+905551112233"));
        assert_eq!(booked.end_time - booked.start_time, Duration::minutes(60));
        assert_eq!(
            booked.start_time.with_timezone(&Istanbul).format("%F %H:%M").to_string(),
            "2025-03-04 10:00"
        );

        let found = service
            .backend
            .find(1, booked.start_time)
            .unwrap()
            .unwrap();
        assert_eq!(found, booked);
        assert_eq!(service.week_of(&booked), date(3));
    }

    #[test]
    fn test_blank_phone_is_stored_as_none() {
        let service = local_service();
        let mut request = request(1, 4, "10:00");
        request.phone = Some("   ".into());
        assert_eq!(service.request_booking(request).unwrap().phone, None);
    }

    #[test]
    fn test_closed_day_rejected_before_store() {
        let backend = MockAppointmentBackend::new();
        let service = service(backend.clone());
        // 10:00 is valid on every open day; the 9th is a Sunday.
        let err = service.request_booking(request(1, 9, "10:00")).unwrap_err();
        assert!(matches!(err, BookingError::InvalidSlot(_)));
        assert_eq!(MockAppointmentBackend::calls(&backend.0.calls_to_create), 0);
    }

    #[test_case("08:00" ; "before opening")]
    #[test_case("19:00" ; "slot would end after closing")]
    #[test_case("10:30" ; "not on the grid")]
    #[test_case("ten" ; "not a time")]
    fn test_invalid_slot_rejected_before_store(time: &str) {
        let backend = MockAppointmentBackend::new();
        let service = service(backend.clone());
        service.request_booking(request(1, 4, "10:00")).unwrap();

        let err = service.request_booking(request(1, 4, time)).unwrap_err();
        assert!(matches!(err, BookingError::InvalidSlot(_)));
        assert_eq!(MockAppointmentBackend::calls(&backend.0.calls_to_create), 1);
    }

    #[test]
    fn test_invalid_slot_wins_over_blank_fields() {
        let service = local_service();
        let mut request = request(1, 4, "10:30");
        request.customer_name = " ".into();
        assert!(matches!(
            service.request_booking(request),
            Err(BookingError::InvalidSlot(_))
        ));
    }

    #[test_case(" ", "Nails", "Customer name is required" ; "blank name")]
    #[test_case("Ayse", "\t", "Service is required" ; "blank service")]
    #[test_case("", "", "Customer name is required; Service is required" ; "both blank")]
    fn test_blank_fields_are_rejected(customer_name: &str, service_name: &str, message: &str) {
        let service = local_service();
        let mut request = request(1, 4, "11:00");
        request.customer_name = customer_name.into();
        request.service = service_name.into();
        match service.request_booking(request) {
            Err(BookingError::Validation(actual)) => assert_eq!(actual, message),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_conflict_and_unknown_employee_propagate() {
        let service = local_service();
        service.request_booking(request(1, 4, "18:30")).unwrap();
        assert!(matches!(
            service.request_booking(request(1, 4, "18:30")),
            Err(BookingError::Conflict(_))
        ));
        assert!(matches!(
            service.request_booking(request(7, 4, "18:30")),
            Err(BookingError::NotFound(_))
        ));
    }

    #[test]
    fn test_cancel_booking() {
        let service = local_service();
        let booked = service.request_booking(request(2, 5, "09:00")).unwrap();
        service.cancel_booking(booked.id).unwrap();
        assert!(service.backend.find(2, booked.start_time).unwrap().is_none());
        assert!(matches!(
            service.cancel_booking(booked.id),
            Err(BookingError::NotFound(_))
        ));
    }

    #[test]
    fn test_week_view_maps_bookings_into_grid() {
        let service = local_service();
        let monday = service.request_booking(request(1, 3, "09:00")).unwrap();
        let saturday = service.request_booking(request(2, 8, "18:30")).unwrap();
        // Next week's Monday is outside the grid.
        service.request_booking(request(1, 10, "09:00")).unwrap();

        let view = service.week_view(date(5), None).unwrap();
        assert_eq!(view.days.len(), 7);
        assert_eq!(view.days[0].date, date(3));
        assert!(view.days[6].slots.is_empty());
        assert_eq!(view.employees.len(), 2);
        assert_eq!(view.booked_count(), 2);

        let first_slot = &view.days[0].slots[0];
        assert_eq!(view.appointment_at(1, first_slot), Some(&monday));
        assert_eq!(view.appointment_at(2, first_slot), None);
        let late_slot = view.days[5].slots.last().unwrap();
        assert_eq!(late_slot.label, "18:30");
        assert_eq!(view.appointment_at(2, late_slot), Some(&saturday));
    }

    #[test_case(Some("Zeynep"), &["Zeynep"] ; "single employee")]
    #[test_case(Some("all"), &["Merve", "Zeynep"] ; "all sentinel")]
    #[test_case(Some("Nobody"), &["Merve", "Zeynep"] ; "unknown name")]
    #[test_case(None, &["Merve", "Zeynep"] ; "no filter")]
    fn test_week_view_employee_filter(filter: Option<&str>, expected: &[&str]) {
        let view = local_service().week_view(date(3), filter).unwrap();
        let names: Vec<_> = view.employees.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, expected);
        assert_eq!(view.all_employees.len(), 2);
    }

    #[test]
    fn test_dates_outside_supported_range_are_rejected() {
        let service = service(MockAppointmentBackend::new());
        let far = NaiveDate::MAX;

        assert!(matches!(service.week_view(far, None), Err(BookingError::Validation(_))));
        assert!(matches!(
            service.slot_detail(1, NaiveDate::MIN, NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
            Err(BookingError::Validation(_))
        ));
        let mut request = request(1, 4, "10:00");
        request.date = far;
        assert!(matches!(
            service.request_booking(request),
            Err(BookingError::Validation(_))
        ));
        assert_eq!(MockAppointmentBackend::calls(&service.backend.0.calls_to_create), 0);
    }

    #[test]
    fn test_slot_detail() {
        let service = local_service();
        let booked = service.request_booking(request(1, 4, "12:00")).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        let occupied = service.slot_detail(1, date(4), noon).unwrap();
        assert_eq!(occupied.appointment, Some(booked));
        assert!(occupied.bookable);
        assert_eq!(occupied.time, "12:00");

        let free = service.slot_detail(2, date(4), noon).unwrap();
        assert!(free.appointment.is_none());
        assert_eq!(free.employee.name, "Zeynep");

        assert!(!service.slot_detail(2, date(9), noon).unwrap().bookable);
        assert!(matches!(
            service.slot_detail(9, date(4), noon),
            Err(BookingError::NotFound(_))
        ));
    }
}
