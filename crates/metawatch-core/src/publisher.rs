//! Event serialization and delivery to the message bus.
//!
//! [`NotificationPublisher`] turns a detected change into one message per
//! event kind. Delivery goes through an [`EventWriter`], which blocks until
//! the transport accepts the message or fails. Nothing is retried here:
//! the watcher owns the rollback decision.

use std::future::Future;

use chrono::{DateTime, FixedOffset};
use metawatch_types::{CurrentYearEvent, EventKind, SecondaryDbLoadedEvent};
use serde::Serialize;
use tracing::info;

use crate::calendar::EducationCalendar;

/// Errors raised while publishing an event.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The payload could not be serialized.
    #[error("failed to serialize {kind} payload: {source}")]
    Serialize {
        /// The event being serialized.
        kind: EventKind,
        /// The underlying serde error.
        source: serde_json::Error,
    },

    /// The transport rejected or failed to deliver the message.
    #[error("failed to deliver {key} message: {message}")]
    Transport {
        /// Message key.
        key: String,
        /// Transport error description.
        message: String,
    },
}

/// A bus client able to send one keyed message at a time.
pub trait EventWriter {
    /// Send `payload` under `key`, resolving once the transport has it.
    fn send(
        &self,
        key: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Publishes the two change events of the watcher.
#[derive(Debug)]
pub struct NotificationPublisher<W> {
    writer: W,
    calendar: EducationCalendar,
}

impl<W: EventWriter> NotificationPublisher<W> {
    /// Create a publisher over `writer`.
    ///
    /// The calendar supplies the synthetic previous timestamp used when no
    /// snapshot was ever observed.
    pub const fn new(writer: W, calendar: EducationCalendar) -> Self {
        Self { writer, calendar }
    }

    /// The underlying writer.
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Publish [`EventKind::CurrentYear`] with the new year.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if serialization or delivery fails.
    pub async fn publish_year_changed(&self, year: i32) -> Result<(), PublishError> {
        info!(year = year, "sending current year event");
        self.send_event(EventKind::CurrentYear, &CurrentYearEvent { year })
            .await
    }

    /// Publish [`EventKind::SecondaryDbLoaded`].
    ///
    /// `previous` is `None` when nothing was observed before; the payload
    /// then carries the academic start of `year` instead of a sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if serialization or delivery fails.
    pub async fn publish_source_reloaded(
        &self,
        current: DateTime<FixedOffset>,
        previous: Option<DateTime<FixedOffset>>,
        year: i32,
    ) -> Result<(), PublishError> {
        let previous_timestamp = previous
            .or_else(|| self.calendar.academic_start(year))
            .unwrap_or(current);

        info!(
            current = %current.to_rfc3339(),
            previous = %previous_timestamp.to_rfc3339(),
            year = year,
            "sending secondary db loaded event"
        );
        self.send_event(
            EventKind::SecondaryDbLoaded,
            &SecondaryDbLoadedEvent {
                current_timestamp: current,
                previous_timestamp,
                year,
            },
        )
        .await
    }

    async fn send_event<T: Serialize>(&self, kind: EventKind, event: &T) -> Result<(), PublishError> {
        let payload =
            serde_json::to_vec(event).map_err(|source| PublishError::Serialize { kind, source })?;
        self.writer.send(kind.label(), payload).await
    }
}
