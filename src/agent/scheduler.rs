//! Periodic publish loop with bounded concurrency and failure policy
//!
//! The scheduler converts wall-clock ticks into publish attempts. At most
//! one attempt is ever outstanding: the loop awaits each attempt inline, and
//! ticks that arrive while an attempt is still running are dropped and
//! logged rather than queued. Dropping beats pipelining messages into a
//! degraded link.

use crate::config::AgentConfig;
use crate::sensor::ReadingSource;
use crate::telemetry::TelemetryMessage;
use crate::transport::Connection;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Why a publish attempt failed
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// Transport-level failure, transient, subject to the retry pause
    Publish(String),
    /// The attempt did not resolve within the publish timeout
    Timeout(Duration),
    /// Payload could not be serialized. A defect, never retried.
    Encoding(String),
}

impl AttemptError {
    /// Transient failures pause the loop briefly; defects do not
    fn is_transient(&self) -> bool {
        !matches!(self, AttemptError::Encoding(_))
    }
}

/// Result of one publish attempt, consumed by the failure policy
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub sequence: u64,
    pub success: bool,
    pub error: Option<AttemptError>,
}

impl PublishOutcome {
    fn success(sequence: u64) -> Self {
        Self {
            sequence,
            success: true,
            error: None,
        }
    }

    fn failure(sequence: u64, error: AttemptError) -> Self {
        Self {
            sequence,
            success: false,
            error: Some(error),
        }
    }
}

/// Drives the fixed-interval publish cadence
pub struct PublishScheduler {
    device_id: String,
    location: String,
    topic: String,
    period: Duration,
    publish_timeout: Duration,
    retry_delay: Duration,
    sequence: u64,
}

impl PublishScheduler {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            device_id: config.device.id.clone(),
            location: config.device.location.clone(),
            topic: config.telemetry.topic.clone(),
            period: config.publish_period(),
            publish_timeout: config.publish_timeout(),
            retry_delay: config.retry_delay(),
            sequence: 0,
        }
    }

    /// Sequence number of the last attempt made (0 before the first)
    pub fn last_sequence(&self) -> u64 {
        self.sequence
    }

    /// Run the tick loop until `shutdown_rx` flips to true.
    ///
    /// Cancellation is cooperative: the shutdown flag is observed between
    /// attempts, so an in-flight attempt always resolves (bounded by the
    /// publish timeout) before the loop exits.
    pub async fn run<C, S>(
        &mut self,
        connection: &C,
        source: &mut S,
        mut shutdown_rx: watch::Receiver<bool>,
    ) where
        C: Connection,
        S: ReadingSource + ?Sized,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            topic = %self.topic,
            period_secs = self.period.as_secs(),
            "Publish loop started"
        );

        let mut last_tick: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                tick = interval.tick() => {
                    if let Some(previous) = last_tick {
                        self.note_dropped_ticks(tick.duration_since(previous));
                    }
                    last_tick = Some(tick);

                    let outcome = self.publish_once(connection, source).await;

                    if let Some(error) = outcome.error {
                        if error.is_transient() {
                            // Brief pause before resuming the cadence; a single
                            // failed publish never terminates the process.
                            tokio::select! {
                                _ = tokio::time::sleep(self.retry_delay) => {}
                                _ = shutdown_rx.changed() => {
                                    if *shutdown_rx.borrow() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        info!(
            attempts = self.sequence,
            "Publish loop stopped"
        );
    }

    /// One tick: sample, encode, publish, report.
    ///
    /// The reading is sampled here, not at tick scheduling, so a dropped
    /// tick never consumes a sample.
    async fn publish_once<C, S>(&mut self, connection: &C, source: &mut S) -> PublishOutcome
    where
        C: Connection,
        S: ReadingSource + ?Sized,
    {
        self.sequence += 1;
        let sequence = self.sequence;

        let reading = source.next_reading();
        let message = TelemetryMessage::new(&self.device_id, &self.location, reading);

        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!(sequence, error = %e, "Telemetry encoding failed; this is a defect");
                return PublishOutcome::failure(sequence, AttemptError::Encoding(e.to_string()));
            }
        };

        info!(
            sequence,
            reading = %reading.summary(),
            "Publishing telemetry"
        );

        let attempt = connection.publish(&self.topic, payload);
        match tokio::time::timeout(self.publish_timeout, attempt).await {
            Ok(Ok(())) => {
                debug!(sequence, "Publish confirmed");
                PublishOutcome::success(sequence)
            }
            Ok(Err(e)) => {
                warn!(sequence, error = %e, "Publish failed");
                PublishOutcome::failure(sequence, AttemptError::Publish(e.to_string()))
            }
            Err(_) => {
                warn!(
                    sequence,
                    timeout_secs = self.publish_timeout.as_secs(),
                    "Publish timed out"
                );
                PublishOutcome::failure(sequence, AttemptError::Timeout(self.publish_timeout))
            }
        }
    }

    /// Log ticks skipped while the previous attempt was still outstanding
    fn note_dropped_ticks(&self, since_last_tick: Duration) {
        let periods = since_last_tick.as_secs_f64() / self.period.as_secs_f64();
        let dropped = (periods - 1.0).round() as i64;
        if dropped >= 1 {
            warn!(
                dropped,
                "Dropped tick(s) while a publish attempt was outstanding"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_errors_are_not_transient() {
        assert!(!AttemptError::Encoding("bad".to_string()).is_transient());
        assert!(AttemptError::Publish("io".to_string()).is_transient());
        assert!(AttemptError::Timeout(Duration::from_secs(10)).is_transient());
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = PublishOutcome::success(3);
        assert!(ok.success);
        assert_eq!(ok.sequence, 3);
        assert!(ok.error.is_none());

        let failed = PublishOutcome::failure(4, AttemptError::Publish("refused".to_string()));
        assert!(!failed.success);
        assert_eq!(failed.sequence, 4);
        assert!(failed.error.is_some());
    }
}
