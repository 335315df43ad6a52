//! NATS delivery of change events.
//!
//! Each event goes to `{prefix}.{event_kind}` with the kind repeated in an
//! `Event-Kind` header, so consumers can either subscribe per kind or take
//! `{prefix}.>` and switch on the header. A send only resolves after the
//! client has flushed the message to the server.

use std::fmt;

use metawatch_core::{EventWriter, PublishError};
use tracing::{debug, info};

use crate::error::DaemonError;

/// Header carrying the event kind.
const EVENT_KIND_HEADER: &str = "Event-Kind";

/// [`EventWriter`] publishing over a single NATS connection.
pub struct NatsEventWriter {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsEventWriter {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Nats`] if the connection cannot be established.
    pub async fn connect(url: &str, subject_prefix: &str) -> Result<Self, DaemonError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| DaemonError::Nats(format!("failed to connect to {url}: {e}")))?;
        info!(subject_prefix = subject_prefix, "NATS connection established");
        Ok(Self {
            client,
            subject_prefix: subject_prefix.to_owned(),
        })
    }

    fn subject_for(&self, key: &str) -> String {
        format!("{}.{key}", self.subject_prefix)
    }
}

impl fmt::Debug for NatsEventWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsEventWriter")
            .field("subject_prefix", &self.subject_prefix)
            .finish_non_exhaustive()
    }
}

impl EventWriter for NatsEventWriter {
    async fn send(&self, key: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let subject = self.subject_for(key);
        let transport_error = |message: String| PublishError::Transport {
            key: key.to_owned(),
            message,
        };

        let mut headers = async_nats::HeaderMap::new();
        headers.insert(EVENT_KIND_HEADER, key);

        debug!(subject = subject, bytes = payload.len(), "publishing event");
        self.client
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .map_err(|e| transport_error(format!("failed to publish to {subject}: {e}")))?;
        self.client
            .flush()
            .await
            .map_err(|e| transport_error(format!("failed to flush {subject}: {e}")))?;
        Ok(())
    }
}
