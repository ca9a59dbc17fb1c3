use std::sync::Arc;

use crate::{
    backend::AppointmentBackend,
    booking_service::BookingService,
    configuration::Configuration,
    configuration_handler::ConfigurationHandler,
    database_interface::DatabaseInterface,
    http::start_server,
    local_appointments::LocalAppointments,
    notifier::{NoopNotifier, Notifier, TwilioNotifier},
    reminder_dispatcher::ReminderDispatcher,
};
use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod booking_service;
mod configuration;
mod configuration_handler;
mod database_interface;
mod error;
mod http;
mod local_appointments;
mod notifier;
mod pwa;
mod reminder_dispatcher;
mod render;
mod schema;
mod slot_calculator;
#[cfg(test)]
mod testutils;
mod types;
mod week_builder;

#[derive(Clone)]
pub struct AppState<T: AppointmentBackend> {
    booking_service: BookingService<T>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let configuration = ConfigurationHandler::parse_arguments();

    match configuration.database_path() {
        Some(path) => {
            let backend = DatabaseInterface::open(&path)
                .with_context(|| format!("failed to open database {}", path.display()))?;
            info!(path = %path.display(), "using database");
            run(backend, configuration).await
        }
        None => {
            warn!("running without database, appointments are lost on restart");
            run(LocalAppointments::default(), configuration).await
        }
    }
}

async fn run<T: AppointmentBackend>(
    backend: T,
    configuration: impl Configuration,
) -> anyhow::Result<()> {
    let timezone = configuration.timezone()?;
    let hours = configuration.business_hours()?;

    backend
        .ensure_employees(&configuration.employee_names())
        .context("failed to seed employees")?;

    let notifier: Arc<dyn Notifier> = match configuration.twilio_credentials() {
        Some(credentials) => Arc::new(TwilioNotifier::new(credentials)?),
        None => {
            info!("messaging not configured, reminders are only marked as sent");
            Arc::new(NoopNotifier)
        }
    };

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    let dispatcher = ReminderDispatcher::new(
        backend.clone(),
        notifier,
        configuration.reminder_policy(),
        timezone,
    );
    let dispatcher = tokio::spawn(dispatcher.run(configuration.reminder_interval(), shutdown_receiver));

    let state = AppState {
        booking_service: BookingService::new(backend, hours, timezone, configuration.services()),
    };

    let address = format!("{}:{}", configuration.host(), configuration.port());
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "salon scheduler listening");

    start_server(listener, state, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(?err, "failed to listen for shutdown signal");
        }
        info!("shutting down");
    })
    .await?;

    let _ = shutdown_sender.send(true);
    if let Err(err) = dispatcher.await {
        error!(?err, "reminder dispatcher stopped abnormally");
    }
    Ok(())
}
