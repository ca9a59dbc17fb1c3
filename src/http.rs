use crate::backend::AppointmentBackend;
use crate::booking_service::BookingRequest;
use crate::error::BookingError;
use crate::{pwa, render, AppState};
use axum::extract::{Path, Query};
use axum::http::header;
use axum::response::{Html, Response};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Form, Json};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WeekQuery {
    week_start: Option<String>,
    emp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SlotQuery {
    date: Option<String>,
    time: Option<String>,
    employee_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AppointmentForm {
    employee_id: Option<String>,
    date: Option<String>,
    time: Option<String>,
    customer_name: Option<String>,
    phone: Option<String>,
    service: Option<String>,
}

pub fn create_app<T: AppointmentBackend>(state: AppState<T>) -> Router {
    Router::new()
        .route("/", get(get_index))
        .route("/calendar_partial", get(get_calendar_partial))
        .route("/slot", get(get_slot))
        .route("/appointments", post(create_appointment))
        .route("/appointments/:id/delete", post(delete_appointment))
        .route("/healthz", get(healthz))
        .route("/manifest.webmanifest", get(get_manifest))
        .route("/sw.js", get(get_service_worker))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server<T, F>(listener: TcpListener, state: AppState<T>, shutdown: F) -> std::io::Result<()>
where
    T: AppointmentBackend,
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, BookingError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| BookingError::Validation(format!("{name} is required")))
}

fn parse_date(value: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| BookingError::Validation(format!("Invalid date '{value}', expected YYYY-MM-DD")))
}

fn parse_employee_id(value: &str) -> Result<i32, BookingError> {
    value
        .parse()
        .map_err(|_| BookingError::Validation(format!("Invalid employee id '{value}'")))
}

/// Empty 200 telling htmx to load the grid of `week_start`.
fn back_to_week(week_start: NaiveDate) -> Response {
    let location = format!("/?week_start={}", week_start.format("%Y-%m-%d"));
    (StatusCode::OK, [("HX-Redirect", location)]).into_response()
}

fn shown_week<T: AppointmentBackend>(
    state: &AppState<T>,
    query: &WeekQuery,
) -> Result<NaiveDate, BookingError> {
    match query.week_start.as_deref().map(str::trim) {
        Some(week_start) if !week_start.is_empty() => parse_date(week_start),
        _ => Ok(state.booking_service.today()),
    }
}

async fn get_index<T: AppointmentBackend>(
    State(state): State<AppState<T>>,
    Query(query): Query<WeekQuery>,
) -> Result<Response, BookingError> {
    let week = shown_week(&state, &query)?;
    let view = state.booking_service.week_view(week, query.emp.as_deref())?;
    Ok((
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Html(render::page(&view)),
    )
        .into_response())
}

async fn get_calendar_partial<T: AppointmentBackend>(
    State(state): State<AppState<T>>,
    Query(query): Query<WeekQuery>,
) -> Result<Html<String>, BookingError> {
    let week = shown_week(&state, &query)?;
    let view = state.booking_service.week_view(week, query.emp.as_deref())?;
    Ok(Html(render::calendar(&view)))
}

async fn get_slot<T: AppointmentBackend>(
    State(state): State<AppState<T>>,
    Query(query): Query<SlotQuery>,
) -> Result<Html<String>, BookingError> {
    let date = parse_date(required(&query.date, "date")?)?;
    let time = required(&query.time, "time")?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| BookingError::Validation(format!("Invalid time '{time}', expected HH:MM")))?;
    let employee_id = parse_employee_id(required(&query.employee_id, "employee_id")?)?;

    let detail = state.booking_service.slot_detail(employee_id, date, time)?;
    Ok(Html(render::slot_modal(
        &detail,
        state.booking_service.services(),
    )))
}

async fn create_appointment<T: AppointmentBackend>(
    State(state): State<AppState<T>>,
    Form(form): Form<AppointmentForm>,
) -> Result<Response, BookingError> {
    let request = BookingRequest {
        employee_id: parse_employee_id(required(&form.employee_id, "employee_id")?)?,
        date: parse_date(required(&form.date, "date")?)?,
        time: required(&form.time, "time")?.to_string(),
        customer_name: form.customer_name.unwrap_or_default(),
        service: form.service.unwrap_or_default(),
        phone: form.phone,
    };
    let appointment = state.booking_service.request_booking(request)?;
    Ok(back_to_week(state.booking_service.week_of(&appointment)))
}

async fn delete_appointment<T: AppointmentBackend>(
    State(state): State<AppState<T>>,
    Path(id): Path<i32>,
) -> Result<Response, BookingError> {
    let appointment = state.booking_service.cancel_booking(id)?;
    Ok(back_to_week(state.booking_service.week_of(&appointment)))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn get_manifest() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        Json(pwa::manifest(render::TITLE)),
    )
}

async fn get_service_worker() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        pwa::SERVICE_WORKER,
    )
}
