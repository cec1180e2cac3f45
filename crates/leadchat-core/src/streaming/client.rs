use futures::StreamExt;
use reqwest::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ConnectionState, LiveEvent, ReconnectPolicy, SseParser, StreamMessage};
use crate::api::ApiClient;
use crate::error::Result;

enum ReadOutcome {
    /// Server closed the stream
    Ended,
    /// Nobody is listening anymore; stop for good
    ReceiverDropped,
}

/// Long-running reader of the live event stream
pub struct EventStreamClient {
    api: ApiClient,
    policy: ReconnectPolicy,
}

impl EventStreamClient {
    pub fn new(api: ApiClient, policy: ReconnectPolicy) -> Self {
        Self { api, policy }
    }

    /// Run the stream client, forwarding events and connection changes
    /// through the channel. Reconnects with exponential backoff until the
    /// receiver is dropped.
    pub async fn run(self, tx: mpsc::Sender<StreamMessage>) {
        let mut attempt: u32 = 0;

        loop {
            if !publish(&tx, ConnectionState::Connecting).await {
                return;
            }

            match self.api.open_event_stream().await {
                Ok(response) => {
                    attempt = 0;
                    info!(url = self.api.base_url(), "Connected to live event stream");
                    if !publish(&tx, ConnectionState::Connected).await {
                        return;
                    }
                    match self.read_stream(response, &tx).await {
                        Ok(ReadOutcome::ReceiverDropped) => {
                            debug!("Stream receiver dropped");
                            return;
                        }
                        Ok(ReadOutcome::Ended) => info!("Live event stream closed by server"),
                        Err(e) => warn!(error = %e, "Live event stream read error"),
                    }
                }
                Err(e) => warn!(error = %e, "Failed to connect to live event stream"),
            }

            let delay = self.policy.delay(attempt);
            attempt = attempt.saturating_add(1);
            let state = ConnectionState::Disconnected {
                retry_in_secs: delay.as_secs(),
            };
            if !publish(&tx, state).await {
                return;
            }
            tokio::time::sleep(delay).await;
        }
    }

    async fn read_stream(
        &self,
        response: Response,
        tx: &mpsc::Sender<StreamMessage>,
    ) -> Result<ReadOutcome> {
        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for payload in parser.feed(&chunk) {
                match LiveEvent::parse(&payload) {
                    Ok(event) => {
                        if tx.send(StreamMessage::Event(event)).await.is_err() {
                            return Ok(ReadOutcome::ReceiverDropped);
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, payload = %payload, "Skipping malformed stream event");
                    }
                }
            }
        }

        Ok(ReadOutcome::Ended)
    }
}

async fn publish(tx: &mpsc::Sender<StreamMessage>, state: ConnectionState) -> bool {
    tx.send(StreamMessage::Connection(state)).await.is_ok()
}
