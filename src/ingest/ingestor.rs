//! Request ingestion
//!
//! Validates the target endpoint, reads the body up to the configured cap,
//! persists the record, and only then hands a copy to the broadcast hub on
//! a detached task. Ingestion success is defined purely by durable
//! persistence: a webhook sender is never penalized for a disconnected
//! viewer, and live delivery stays best-effort.

use std::net::IpAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::{Error, Result};
use crate::hub::{BroadcastHub, RequestEvent};
use crate::model::{CapturedPayload, IngestedRequest};
use crate::store::{Datastore, StoreError};

/// Persists and broadcasts inbound requests.
pub struct CaptureIngestor {
    store: Arc<dyn Datastore>,
    hub: Arc<BroadcastHub>,
    max_body_size: u64,
}

impl CaptureIngestor {
    pub fn new(store: Arc<dyn Datastore>, hub: Arc<BroadcastHub>, max_body_size: u64) -> Self {
        Self {
            store,
            hub,
            max_body_size,
        }
    }

    /// Capture one inbound request against an endpoint reference.
    ///
    /// The body stream is read up to `max_body_size` bytes; exceeding the
    /// cap or failing mid-read aborts with nothing persisted. The returned
    /// record is already durable when this resolves.
    pub async fn ingest<S, E>(
        &self,
        reference: &str,
        body: S,
        headers: Vec<(String, String)>,
        query: String,
        source_ip: Option<IpAddr>,
    ) -> Result<IngestedRequest>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let endpoint = match self.store.find_endpoint_by_reference(reference).await {
            Ok(endpoint) => endpoint,
            Err(StoreError::NotFound) => return Err(Error::EndpointNotFound),
            Err(other) => return Err(Error::Persistence(other)),
        };

        let raw = self.read_capped(body).await?;
        let size = raw.len() as u64;

        let record = IngestedRequest::new(
            endpoint.id,
            CapturedPayload {
                body: String::from_utf8_lossy(&raw).into_owned(),
                query,
                headers,
                source_ip,
                size,
            },
        );

        self.store
            .create_request(&record)
            .await
            .map_err(Error::Persistence)?;

        tracing::info!(
            reference = %reference,
            id = %record.id,
            size = size,
            "Request ingested"
        );

        // Persist-then-publish: delivery runs detached and its outcome
        // never reaches the caller.
        let hub = Arc::clone(&self.hub);
        let published = record.clone();
        let topic = reference.to_owned();
        tokio::spawn(async move {
            match RequestEvent::from_record(&published) {
                Ok(event) => {
                    hub.publish(&topic, event).await;
                }
                Err(err) => {
                    tracing::error!(
                        reference = %topic,
                        error = %err,
                        "Could not encode event for delivery"
                    );
                }
            }
        });

        Ok(record)
    }

    async fn read_capped<S, E>(&self, mut body: S) -> Result<Vec<u8>>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| {
                tracing::error!(error = %err, "Body stream failed mid-read");
                Error::BodyRead
            })?;

            if buf.len() as u64 + chunk.len() as u64 > self.max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: self.max_body_size,
                });
            }

            buf.extend_from_slice(&chunk);
        }

        Ok(buf)
    }
}
