use crate::configuration::{BusinessHours, Configuration, ReminderPolicy, TwilioCredentials};
use anyhow::{anyhow, bail, Context};
use chrono::{Duration, NaiveTime, Weekday};
use chrono_tz::Tz;
use clap::Parser;
use std::path::PathBuf;

/// Every flag can also be given through the environment (or a `.env` file).
#[derive(Debug, Clone, Parser)]
#[command(name = "salon_scheduler", about = "Appointment scheduler for a beauty salon")]
pub struct ConfigurationHandler {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// SQLite database file, created on first run.
    #[arg(long, env = "DATABASE_PATH", default_value = "data/salon.db")]
    database_path: PathBuf,

    /// Keep appointments in memory only.
    #[arg(long, env = "EPHEMERAL", default_value_t = false)]
    ephemeral: bool,

    #[arg(long, env = "TIMEZONE", default_value = "Europe/Istanbul")]
    timezone: String,

    #[arg(long, env = "OPEN_TIME", default_value = "09:00")]
    open_time: String,

    #[arg(long, env = "CLOSE_TIME", default_value = "19:30")]
    close_time: String,

    #[arg(long, env = "SLOT_MINUTES", default_value_t = 60)]
    slot_minutes: u32,

    /// Weekday without any slots, or `none`.
    #[arg(long, env = "CLOSED_WEEKDAY", default_value = "sun")]
    closed_weekday: String,

    #[arg(long, env = "LATE_SLOT_LEAD_MINUTES", default_value_t = 60)]
    late_slot_lead_minutes: u32,

    #[arg(
        long,
        env = "EMPLOYEES",
        value_delimiter = ',',
        default_value = "Merve,Zeynep,İrem,X"
    )]
    employees: Vec<String>,

    #[arg(
        long,
        env = "SERVICES",
        value_delimiter = ',',
        default_value = "Laser epilation,Lashes,Nails,Manicure,Pedicure,Nail art,Smoking cessation,Appetite suppression,Botox,Filler,Tattoo removal,Brows,Skin care"
    )]
    services: Vec<String>,

    #[arg(long, env = "TWILIO_ACCOUNT_SID")]
    twilio_account_sid: Option<String>,

    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    twilio_auth_token: Option<String>,

    #[arg(long, env = "TWILIO_FROM")]
    twilio_from: Option<String>,

    #[arg(long, env = "REMINDER_INTERVAL_SECS", default_value_t = 60)]
    reminder_interval_secs: u64,

    #[arg(long, env = "REMINDER_LEAD_MINUTES", default_value_t = 60)]
    reminder_lead_minutes: i64,

    #[arg(long, env = "REMINDER_WINDOW_MINUTES", default_value_t = 1)]
    reminder_window_minutes: i64,

    /// How long past the lookahead window a failed reminder is still retried.
    #[arg(long, env = "REMINDER_RETRY_GRACE_MINUTES", default_value_t = 0)]
    reminder_retry_grace_minutes: i64,

    #[arg(long, env = "REMINDER_MAX_ATTEMPTS", default_value_t = 3)]
    reminder_max_attempts: u32,

    #[arg(long, env = "REMINDER_BACKOFF_SECS", default_value_t = 60)]
    reminder_backoff_secs: i64,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                eprintln!("Ignoring unreadable .env file: {err}");
            }
        }
        Self::parse()
    }
}

// Reminder durations are capped at a week.
const MAX_REMINDER_MINUTES: i64 = 7 * 24 * 60;

fn parse_time(value: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").with_context(|| format!("invalid time '{value}'"))
}

fn parse_closed_weekday(value: &str) -> anyhow::Result<Option<Weekday>> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value
        .parse::<Weekday>()
        .map(Some)
        .map_err(|_| anyhow!("invalid weekday '{value}'"))
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(String::from)
        .collect()
}

impl Configuration for ConfigurationHandler {
    fn host(&self) -> String {
        self.host.clone()
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn database_path(&self) -> Option<PathBuf> {
        (!self.ephemeral).then(|| self.database_path.clone())
    }

    fn timezone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow!("unknown timezone '{}': {err}", self.timezone))
    }

    fn business_hours(&self) -> anyhow::Result<BusinessHours> {
        let open = parse_time(&self.open_time)?;
        let close = parse_time(&self.close_time)?;
        if open >= close {
            bail!("opening time {open} must be before closing time {close}");
        }
        if self.slot_minutes == 0 {
            bail!("slot length must be at least one minute");
        }
        Ok(BusinessHours {
            open,
            close,
            slot_minutes: self.slot_minutes,
            closed_weekday: parse_closed_weekday(&self.closed_weekday)?,
            late_slot_lead_minutes: self.late_slot_lead_minutes,
        })
    }

    fn employee_names(&self) -> Vec<String> {
        non_blank(&self.employees)
    }

    fn services(&self) -> Vec<String> {
        non_blank(&self.services)
    }

    fn twilio_credentials(&self) -> Option<TwilioCredentials> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(String::from)
        };
        Some(TwilioCredentials {
            account_sid: present(&self.twilio_account_sid)?,
            auth_token: present(&self.twilio_auth_token)?,
            from: present(&self.twilio_from)?,
        })
    }

    fn reminder_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reminder_interval_secs.max(1))
    }

    fn reminder_policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            lead: Duration::minutes(self.reminder_lead_minutes.clamp(0, MAX_REMINDER_MINUTES)),
            window: Duration::minutes(self.reminder_window_minutes.clamp(1, MAX_REMINDER_MINUTES)),
            retry_grace: Duration::minutes(
                self.reminder_retry_grace_minutes.clamp(0, MAX_REMINDER_MINUTES),
            ),
            max_attempts: self.reminder_max_attempts.max(1),
            backoff: Duration::seconds(
                self.reminder_backoff_secs.clamp(0, MAX_REMINDER_MINUTES * 60),
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(arguments: &[&str]) -> ConfigurationHandler {
        let mut argv = vec!["salon_scheduler"];
        argv.extend_from_slice(arguments);
        ConfigurationHandler::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_match_salon_hours() {
        let configuration = parse(&[]);
        let hours = configuration.business_hours().unwrap();
        assert_eq!(hours, BusinessHours::default());
        assert_eq!(configuration.timezone().unwrap(), chrono_tz::Europe::Istanbul);
    }

    #[test]
    fn test_lists_are_split_and_trimmed() {
        let configuration = parse(&["--employees", "Ayse, Fatma,,", "--services", "Nails"]);
        assert_eq!(configuration.employee_names(), vec!["Ayse", "Fatma"]);
        assert_eq!(configuration.services(), vec!["Nails"]);
    }

    #[test]
    fn test_messaging_disabled_unless_all_credentials_present() {
        let configuration = parse(&["--twilio-account-sid", "AC1", "--twilio-from", "+1555"]);
        assert!(configuration.twilio_credentials().is_none());

        let configuration = parse(&[
            "--twilio-account-sid",
            "AC1",
            "--twilio-auth-token",
            "secret",
            "--twilio-from",
            "+1555",
        ]);
        let credentials = configuration.twilio_credentials().unwrap();
        assert_eq!(credentials.account_sid, "AC1");
        assert_eq!(credentials.from, "+1555");
    }

    #[test]
    fn test_invalid_hours_are_rejected() {
        parse(&["--open-time", "20:00"]).business_hours().unwrap_err();
        parse(&["--slot-minutes", "0"]).business_hours().unwrap_err();
        parse(&["--closed-weekday", "someday"]).business_hours().unwrap_err();
        parse(&["--timezone", "Mars/Olympus"]).timezone().unwrap_err();
    }

    #[test]
    fn test_closed_weekday_can_be_disabled() {
        let hours = parse(&["--closed-weekday", "none"]).business_hours().unwrap();
        assert_eq!(hours.closed_weekday, None);
    }

    #[test]
    fn test_extreme_reminder_values_are_clamped() {
        let policy = parse(&[
            "--reminder-lead-minutes",
            "9223372036854775807",
            "--reminder-window-minutes=-3",
            "--reminder-retry-grace-minutes",
            "9223372036854775807",
            "--reminder-backoff-secs",
            "9223372036854775807",
            "--reminder-max-attempts",
            "0",
        ])
        .reminder_policy();

        assert_eq!(policy.lead, Duration::days(7));
        assert_eq!(policy.window, Duration::minutes(1));
        assert_eq!(policy.retry_grace, Duration::days(7));
        assert_eq!(policy.backoff, Duration::days(7));
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_ephemeral_has_no_database_path() {
        assert!(parse(&["--ephemeral"]).database_path().is_none());
        assert_eq!(
            parse(&[]).database_path(),
            Some(PathBuf::from("data/salon.db"))
        );
    }
}
