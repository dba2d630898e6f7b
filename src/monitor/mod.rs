// Log monitor
//
// Polls a log file, computes the cumulative error rate and raises at most
// one alert per cool-down window.

mod notifier;
mod sampler;

pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use sampler::{count_errors, sample_log, ErrorSample};

use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::errors::{Result, ServiceError};

/// What one poll observed and did
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Log missing or empty
    NoSignal,
    /// Log could not be read this time
    Unreadable,
    /// Error rate at or below threshold
    Healthy(ErrorSample),
    /// Above threshold and an alert was sent (or attempted)
    Alerted(ErrorSample),
    /// Above threshold but still inside the cool-down window
    Suppressed(ErrorSample),
}

/// Monitor state: configuration plus the time of the last alert
pub struct AlertMonitor {
    log_path: PathBuf,
    threshold: f64,
    cooldown: Duration,
    pattern: Regex,
    notifier: Arc<dyn Notifier>,
    last_alert: Option<Instant>,
}

impl AlertMonitor {
    pub fn new(config: &MonitorConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let pattern = Regex::new(&config.error_pattern).map_err(|e| {
            ServiceError::Validation(format!("invalid error pattern: {}", e))
        })?;

        Ok(Self {
            log_path: config.log_file.clone(),
            threshold: config.error_threshold,
            cooldown: config.alert_interval(),
            pattern,
            notifier,
            last_alert: None,
        })
    }

    /// Webhook notifier when a URL is configured, log-only otherwise
    pub fn notifier_for(config: &MonitorConfig) -> Result<Arc<dyn Notifier>> {
        match &config.webhook_url {
            Some(url) => Ok(Arc::new(WebhookNotifier::new(url.clone())?)),
            None => Ok(Arc::new(LogNotifier)),
        }
    }

    pub fn last_alert(&self) -> Option<Instant> {
        self.last_alert
    }

    pub async fn poll_once(&mut self) -> PollOutcome {
        self.poll_at(Instant::now()).await
    }

    /// One poll, evaluated as of `now`
    pub async fn poll_at(&mut self, now: Instant) -> PollOutcome {
        let sample = match sample_log(&self.log_path, &self.pattern).await {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                debug!(path = %self.log_path.display(), "No logs found yet");
                return PollOutcome::NoSignal;
            }
            Err(e) => {
                error!(path = %self.log_path.display(), error = %e, "Failed to read log file");
                return PollOutcome::Unreadable;
            }
        };

        let rate = sample.error_rate();
        debug!(
            lines = sample.total_lines,
            errors = sample.error_lines,
            rate = rate,
            "Checked logs"
        );

        if rate <= self.threshold {
            return PollOutcome::Healthy(sample);
        }

        let cooled_down = self
            .last_alert
            .map_or(true, |last| now.saturating_duration_since(last) > self.cooldown);
        if !cooled_down {
            debug!(rate = rate, "Error rate high, alert suppressed by cool-down");
            return PollOutcome::Suppressed(sample);
        }

        let message = format!(
            "High error rate detected in ML app logs! {} of {} lines are errors ({:.1}% > {:.1}%)",
            sample.error_lines,
            sample.total_lines,
            rate * 100.0,
            self.threshold * 100.0
        );

        // The window restarts on every attempt, delivered or not
        self.last_alert = Some(now);
        match self.notifier.notify(&message).await {
            Ok(()) => info!(notifier = self.notifier.name(), rate = rate, "Alert sent"),
            Err(e) => warn!(notifier = self.notifier.name(), error = %e, "Alert delivery failed"),
        }

        PollOutcome::Alerted(sample)
    }

    /// Poll forever at `poll_interval`
    pub async fn run(mut self, poll_interval: Duration) {
        info!(
            path = %self.log_path.display(),
            threshold = self.threshold,
            cooldown_secs = self.cooldown.as_secs(),
            notifier = self.notifier.name(),
            "Log monitor started"
        );

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}
