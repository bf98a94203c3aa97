//! Birthday reminder job.
//!
//! Once a day every user is checked: a reminder goes out 5 days before the
//! yearly birthday and again on the day itself, compared on UTC calendar
//! dates. A send failure for one user is logged and the scan moves on.

mod directory;
mod mailer;

pub use directory::PgUserDirectory;
pub use mailer::{EmailSender, LogMailer, SmtpMailer, BIRTHDAY_BODY, BIRTHDAY_SUBJECT};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use lettre::Address;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::user::User;

/// Days between the first reminder and the birthday.
pub const REMINDER_LEAD_DAYS: i64 = 5;

/// Read-only, bounded listing of users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_all_users(&self, limit: i64) -> Result<Vec<User>, AppError>;
}

/// The birthday as celebrated in `year`; 29 February falls back to the 28th.
pub fn observed_birthday(birthday: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
}

/// Whether `today` is the reminder day or the birthday itself.
pub fn reminder_due(birthday: NaiveDate, today: NaiveDate) -> bool {
    let Some(celebrated) = observed_birthday(birthday, today.year()) else {
        return false;
    };
    if celebrated == today {
        return true;
    }
    celebrated
        .checked_sub_signed(Duration::days(REMINDER_LEAD_DAYS))
        .map_or(false, |reminder| {
            reminder.month() == today.month() && reminder.day() == today.day()
        })
}

/// Time left until the next `hour`:00 UTC strictly after `now`.
pub fn until_next_run(now: DateTime<Utc>, hour: u32) -> std::time::Duration {
    let next = match now.date_naive().and_hms_opt(hour, 0, 0) {
        Some(slot) => {
            let slot = Utc.from_utc_datetime(&slot);
            if slot > now {
                slot
            } else {
                slot + Duration::days(1)
            }
        }
        None => now + Duration::days(1),
    };
    (next - now).to_std().unwrap_or_default()
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub scanned: usize,
    pub matched: usize,
    pub sent: usize,
    pub failed: usize,
    /// Matched but not sent: no email on file, or already reminded today.
    pub skipped: usize,
}

pub struct ReminderScheduler {
    directory: Arc<dyn UserDirectory>,
    mailer: Arc<dyn EmailSender>,
    user_limit: i64,
    // (user, day) pairs already reminded; also serializes runs
    sent: Mutex<HashSet<(Uuid, NaiveDate)>>,
}

impl ReminderScheduler {
    pub fn new(directory: Arc<dyn UserDirectory>, mailer: Arc<dyn EmailSender>, user_limit: i64) -> Self {
        Self {
            directory,
            mailer,
            user_limit,
            sent: Mutex::new(HashSet::new()),
        }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<ReminderReport, AppError> {
        let mut sent = self.sent.lock().await;
        sent.retain(|(_, day)| *day == today);

        let users = self.directory.list_all_users(self.user_limit).await?;
        let mut report = ReminderReport {
            scanned: users.len(),
            ..Default::default()
        };

        for user in users {
            let Some(birthday) = user.birthday else {
                continue;
            };
            if !reminder_due(birthday, today) {
                continue;
            }
            report.matched += 1;

            let Some(email) = user.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
                debug!(user_id = %user.id, "No email on file, skipping birthday reminder");
                report.skipped += 1;
                continue;
            };

            if sent.contains(&(user.id, today)) {
                debug!(user_id = %user.id, "Birthday reminder already sent today");
                report.skipped += 1;
                continue;
            }

            match self.mailer.send(email, BIRTHDAY_SUBJECT, BIRTHDAY_BODY).await {
                Ok(()) => {
                    info!(user_id = %user.id, email = %email, "Birthday reminder sent");
                    sent.insert((user.id, today));
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        user_id = %user.id,
                        name = %user.name,
                        email = %email,
                        error = %e,
                        "Failed to send birthday reminder"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(%today, ?report, "Birthday reminder run finished");
        Ok(report)
    }

    /// Sends the birthday email to one address, bypassing the date check.
    pub async fn send_one(&self, email: &str) -> Result<(), AppError> {
        let email = email.trim();
        email
            .parse::<Address>()
            .map_err(|e| AppError::Validation(format!("Invalid email address {email}: {e}")))?;
        self.mailer.send(email, BIRTHDAY_SUBJECT, BIRTHDAY_BODY).await?;
        info!(email = %email, "Birthday reminder sent on demand");
        Ok(())
    }

    /// Runs forever, once a day at `hour`:00 UTC. Runs never overlap.
    pub async fn run_daily(self: Arc<Self>, hour: u32) {
        loop {
            let wait = until_next_run(Utc::now(), hour);
            info!(next_run_in_secs = wait.as_secs(), "Birthday reminder scheduled");
            tokio::time::sleep(wait).await;

            if let Err(e) = self.run(Utc::now().date_naive()).await {
                error!(error = %e, "Birthday reminder run failed");
            }
        }
    }
}
