use crate::{
    backend::AppointmentBackend, configuration::ReminderPolicy, error::Result,
    notifier::Notifier, types::Appointment,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Outcome of one dispatcher run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub skipped_without_phone: usize,
    /// Earlier attempt failed and the backoff has not elapsed yet.
    pub deferred: usize,
    pub failed: usize,
    /// Failures that used up the last allowed attempt.
    pub abandoned: usize,
    /// Appointments the store could not read or update, e.g. cancelled mid-run.
    pub store_errors: usize,
}

enum Outcome {
    Sent,
    SkippedWithoutPhone,
    Deferred,
    Failed,
    Abandoned,
}

/// Periodically sends one reminder per upcoming appointment.
pub struct ReminderDispatcher<T: AppointmentBackend> {
    backend: T,
    notifier: Arc<dyn Notifier>,
    policy: ReminderPolicy,
    timezone: Tz,
}

impl<T: AppointmentBackend> ReminderDispatcher<T> {
    pub fn new(backend: T, notifier: Arc<dyn Notifier>, policy: ReminderPolicy, timezone: Tz) -> Self {
        Self {
            backend,
            notifier,
            policy,
            timezone,
        }
    }

    /// Runs every `interval` until `shutdown` broadcasts `true`.
    pub async fn run(self, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        info!(?interval, "reminder dispatcher started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.dispatch_due(Utc::now()).await {
                        Ok(report) if report != DispatchReport::default() => {
                            info!(?report, "reminder run finished");
                        }
                        Ok(_) => {}
                        Err(err) => error!("reminder run failed: {err}"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("reminder dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over the appointments starting roughly `policy.lead` after `now`.
    /// Only the candidate query aborts the run; errors on a single
    /// appointment are logged and counted.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
        let from = now + self.policy.lead - self.policy.retry_grace;
        let until = now + self.policy.lead + self.policy.window;
        let candidates = self.backend.pending_reminders(from, until)?;

        let mut report = DispatchReport::default();
        for appointment in candidates.into_iter().filter(|a| a.start_time > now) {
            match self.remind(&appointment, now).await {
                Ok(Outcome::Sent) => report.sent += 1,
                Ok(Outcome::SkippedWithoutPhone) => report.skipped_without_phone += 1,
                Ok(Outcome::Deferred) => report.deferred += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::Abandoned) => report.abandoned += 1,
                Err(err) => {
                    warn!(appointment_id = appointment.id, "reminder bookkeeping failed: {err}");
                    report.store_errors += 1;
                }
            }
        }
        Ok(report)
    }

    async fn remind(&self, appointment: &Appointment, now: DateTime<Utc>) -> Result<Outcome> {
        let Some(phone) = appointment.phone.as_deref() else {
            debug!(appointment_id = appointment.id, "no phone number, reminder skipped");
            self.backend.mark_reminder_sent(appointment.id)?;
            return Ok(Outcome::SkippedWithoutPhone);
        };
        if !self.retry_due(appointment, now) {
            return Ok(Outcome::Deferred);
        }

        let body = self.message(appointment)?;
        match self.notifier.send(phone, &body).await {
            Ok(()) => {
                self.backend.mark_reminder_sent(appointment.id)?;
                info!(appointment_id = appointment.id, "reminder sent");
                Ok(Outcome::Sent)
            }
            Err(err) => {
                let attempts = appointment.reminder_attempts.saturating_add(1);
                let terminal = attempts >= i32::try_from(self.policy.max_attempts).unwrap_or(i32::MAX);
                self.backend
                    .record_reminder_failure(appointment.id, now, terminal)?;
                if terminal {
                    error!(appointment_id = appointment.id, attempts, "reminder abandoned: {err}");
                    Ok(Outcome::Abandoned)
                } else {
                    warn!(appointment_id = appointment.id, attempts, "reminder delivery failed: {err}");
                    Ok(Outcome::Failed)
                }
            }
        }
    }

    // Exponential backoff after each failed attempt.
    fn retry_due(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        let Some(last_attempt) = appointment.reminder_last_attempt else {
            return true;
        };
        let exponent = u32::try_from(appointment.reminder_attempts.saturating_sub(1))
            .unwrap_or(0)
            .min(16);
        // An overflowing backoff means the retry never becomes due.
        self.policy
            .backoff
            .checked_mul(2_i32.pow(exponent))
            .and_then(|delay| last_attempt.checked_add_signed(delay))
            .is_some_and(|due| due <= now)
    }

    fn message(&self, appointment: &Appointment) -> Result<String> {
        let employee = self
            .backend
            .employee(appointment.employee_id)?
            .map(|e| e.name)
            .unwrap_or_else(|| "our team".into());
        let start = appointment.start_time.with_timezone(&self.timezone);
        Ok(format!(
            "Hello {}, this is a reminder of your {} appointment with {} on {} at {}.",
            appointment.customer_name,
            appointment.service,
            employee,
            start.format("%d.%m.%Y"),
            start.format("%H:%M"),
        ))
    }
}
