use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, instrument, warn};

use pulsar_core::{DeliveryState, WebhookDelivery, WebhookEndpoint};
use pulsar_store::{DeliveryRepo, EndpointRepo, StoreError};

use crate::signer::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER, sign};

/// Response bodies are truncated to this many bytes before persisting.
pub const MAX_RESPONSE_BYTES: usize = 1 << 20;

/// Tuning for the delivery worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum deliveries selected per tick.
    pub batch_size: usize,
    /// Maximum concurrent in-flight requests.
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            concurrency: 8,
        }
    }
}

/// Counts from one worker tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub failed: usize,
}

enum AttemptOutcome {
    Succeeded,
    Rescheduled,
    Failed,
}

/// Consumer of the persistent delivery queue.
///
/// Each tick selects due pending deliveries, signs and POSTs them, and
/// either marks success, reschedules with the endpoint's fixed retry
/// delay, or fails the delivery once its retry budget is spent.
pub struct WebhookWorker {
    deliveries: Arc<dyn DeliveryRepo>,
    endpoints: Arc<dyn EndpointRepo>,
    client: reqwest::Client,
    config: WorkerConfig,
}

impl WebhookWorker {
    /// Create a worker with a shared HTTP client.
    #[must_use]
    pub fn new(
        deliveries: Arc<dyn DeliveryRepo>,
        endpoints: Arc<dyn EndpointRepo>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            deliveries,
            endpoints,
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Process one batch of due deliveries at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickStats, StoreError> {
        let due = self.deliveries.due(now, self.config.batch_size).await?;
        if due.is_empty() {
            return Ok(TickStats::default());
        }
        debug!(count = due.len(), "webhook worker processing due deliveries");

        let outcomes: Vec<AttemptOutcome> = futures::stream::iter(due)
            .map(|delivery| self.attempt(delivery, now))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut stats = TickStats {
            attempted: outcomes.len(),
            ..TickStats::default()
        };
        for outcome in outcomes {
            match outcome {
                AttemptOutcome::Succeeded => stats.succeeded += 1,
                AttemptOutcome::Rescheduled => stats.rescheduled += 1,
                AttemptOutcome::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    #[instrument(skip(self, delivery), fields(delivery_id = %delivery.id, endpoint_id = %delivery.endpoint_id))]
    async fn attempt(&self, mut delivery: WebhookDelivery, now: DateTime<Utc>) -> AttemptOutcome {
        let endpoint = match self.endpoints.get_any(delivery.endpoint_id).await {
            Ok(endpoint) if endpoint.enabled => endpoint,
            Ok(_) => {
                return self
                    .conclude_failed(delivery, now, None, "endpoint disabled")
                    .await;
            }
            Err(err) => {
                return self
                    .conclude_failed(delivery, now, None, &format!("endpoint missing: {err}"))
                    .await;
            }
        };

        let body = match serde_json::to_vec(&delivery.payload) {
            Ok(body) => body,
            Err(err) => {
                return self
                    .conclude_failed(delivery, now, None, &format!("unserialisable payload: {err}"))
                    .await;
            }
        };

        let request = self.build_request(&endpoint, &delivery, body);

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.bytes().await.unwrap_or_default();
                let truncated = truncate_body(&body);
                if (200..300).contains(&status) {
                    delivery.attempt_count += 1;
                    delivery.state = DeliveryState::Success;
                    delivery.next_retry_at = None;
                    delivery.last_response_status = Some(status);
                    delivery.last_error = None;
                    delivery.updated_at = now;
                    self.persist(&delivery).await;
                    debug!(status, "webhook delivered");
                    AttemptOutcome::Succeeded
                } else {
                    self.handle_failure(delivery, &endpoint, now, Some(status), &truncated)
                        .await
                }
            }
            Err(err) => {
                self.handle_failure(delivery, &endpoint, now, None, &err.to_string())
                    .await
            }
        }
    }

    fn build_request(
        &self,
        endpoint: &WebhookEndpoint,
        delivery: &WebhookDelivery,
        body: Vec<u8>,
    ) -> reqwest::RequestBuilder {
        let signature = sign(&endpoint.secret, &body);
        let mut request = self
            .client
            .post(&endpoint.url)
            .timeout(Duration::from_secs(endpoint.timeout_s));

        // Custom headers first; they cannot shadow the protocol headers.
        for (name, value) in &endpoint.custom_headers {
            if is_protected_header(name) {
                warn!(header = %name, "ignoring custom header that would shadow a protocol header");
                continue;
            }
            request = request.header(name, value);
        }

        request
            .header("Content-Type", "application/json")
            .header(EVENT_HEADER, delivery.event_type.as_str())
            .header(DELIVERY_HEADER, delivery.id.to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(body)
    }

    async fn handle_failure(
        &self,
        mut delivery: WebhookDelivery,
        endpoint: &WebhookEndpoint,
        now: DateTime<Utc>,
        status: Option<u16>,
        error: &str,
    ) -> AttemptOutcome {
        delivery.attempt_count += 1;
        delivery.last_response_status = status;
        delivery.last_error = Some(error.to_owned());
        delivery.updated_at = now;

        if delivery.attempt_count > endpoint.max_retries {
            delivery.state = DeliveryState::Failed;
            delivery.next_retry_at = None;
            warn!(
                attempts = delivery.attempt_count,
                status, "webhook delivery exhausted retries"
            );
            self.persist(&delivery).await;
            AttemptOutcome::Failed
        } else {
            #[allow(clippy::cast_possible_wrap)]
            let delay = chrono::Duration::seconds(endpoint.retry_delay_s as i64);
            delivery.next_retry_at = Some(now + delay);
            debug!(
                attempts = delivery.attempt_count,
                status,
                retry_at = %delivery.next_retry_at.unwrap_or(now),
                "webhook delivery rescheduled"
            );
            self.persist(&delivery).await;
            AttemptOutcome::Rescheduled
        }
    }

    async fn conclude_failed(
        &self,
        mut delivery: WebhookDelivery,
        now: DateTime<Utc>,
        status: Option<u16>,
        error: &str,
    ) -> AttemptOutcome {
        delivery.state = DeliveryState::Failed;
        delivery.next_retry_at = None;
        delivery.last_response_status = status;
        delivery.last_error = Some(error.to_owned());
        delivery.updated_at = now;
        warn!(error, "webhook delivery failed without attempt");
        self.persist(&delivery).await;
        AttemptOutcome::Failed
    }

    /// Persist the mutated delivery. A store failure is logged and the row
    /// stays unchanged, so the attempt re-runs on the next tick; receivers
    /// dedupe on the delivery header.
    async fn persist(&self, delivery: &WebhookDelivery) {
        if let Err(err) = self.deliveries.update(delivery.clone()).await {
            warn!(delivery_id = %delivery.id, error = %err, "failed to persist delivery state");
        }
    }
}

fn is_protected_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("content-type")
        || name.eq_ignore_ascii_case(SIGNATURE_HEADER)
        || name.eq_ignore_ascii_case(EVENT_HEADER)
        || name.eq_ignore_ascii_case(DELIVERY_HEADER)
}

fn truncate_body(body: &[u8]) -> String {
    let slice = &body[..body.len().min(MAX_RESPONSE_BYTES)];
    String::from_utf8_lossy(slice).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::verify;
    use pulsar_core::{EventType, OrgId, WebhookDelivery, WebhookEndpoint};
    use pulsar_store::{DeliveryRepo, EndpointRepo};
    use pulsar_store_memory::MemoryStore;

    /// A minimal mock HTTP server on a tokio listener that serves a fixed
    /// number of connections with canned responses and returns the raw
    /// request bytes it saw.
    struct MockServer {
        listener: tokio::net::TcpListener,
        base_url: String,
    }

    impl MockServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            let port = listener.local_addr().unwrap().port();
            Self {
                listener,
                base_url: format!("http://127.0.0.1:{port}"),
            }
        }

        /// Serve `count` sequential connections, each answered with
        /// `status`/`body`, collecting the raw requests.
        async fn respond_times(self, status: u16, body: &str, count: usize) -> Vec<Vec<u8>> {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let mut requests = Vec::with_capacity(count);
            for _ in 0..count {
                let (mut stream, _) = self.listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                // Read until the headers and declared body are complete.
                loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = find_header_end(&buf) {
                        let expected = content_length(&buf[..pos]).unwrap_or(0);
                        if buf.len() >= pos + expected {
                            break;
                        }
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
                requests.push(buf);
            }
            requests
        }
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|p| p + 4)
    }

    fn content_length(headers: &[u8]) -> Option<usize> {
        let text = String::from_utf8_lossy(headers);
        text.lines()
            .find(|line| line.to_ascii_lowercase().starts_with("content-length:"))
            .and_then(|line| line.split(':').nth(1))
            .and_then(|v| v.trim().parse().ok())
    }

    fn split_request(raw: &[u8]) -> (String, Vec<u8>) {
        let pos = find_header_end(raw).expect("request incomplete");
        (
            String::from_utf8_lossy(&raw[..pos]).into_owned(),
            raw[pos..].to_vec(),
        )
    }

    async fn seed(
        store: &Arc<MemoryStore>,
        url: &str,
        max_retries: u32,
        retry_delay_s: u64,
    ) -> (WebhookEndpoint, WebhookDelivery) {
        let org = OrgId::generate();
        let mut endpoint = WebhookEndpoint::new(org, "hook", url, Utc::now());
        endpoint.max_retries = max_retries;
        endpoint.retry_delay_s = retry_delay_s;
        EndpointRepo::create(store.as_ref(), endpoint.clone())
            .await
            .unwrap();
        let delivery = WebhookDelivery::queue(
            org,
            endpoint.id,
            EventType::AlertCreated,
            serde_json::json!({
                "event_type": "alert.created",
                "data": {"message": "disk full"}
            }),
            Utc::now(),
        );
        DeliveryRepo::create(store.as_ref(), delivery.clone())
            .await
            .unwrap();
        (endpoint, delivery)
    }

    fn worker(store: &Arc<MemoryStore>) -> WebhookWorker {
        WebhookWorker::new(
            Arc::clone(store) as _,
            Arc::clone(store) as _,
            WorkerConfig::default(),
        )
    }

    #[tokio::test]
    async fn successful_delivery_is_signed_and_marked() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let (endpoint, delivery) = seed(&store, &server.base_url, 3, 60).await;
        let server_handle =
            tokio::spawn(async move { server.respond_times(200, r#"{"ok":true}"#, 1).await });

        let now = Utc::now();
        let stats = worker(&store).tick(now).await.unwrap();
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.succeeded, 1);

        let requests = server_handle.await.unwrap();
        let (headers, body) = split_request(&requests[0]);
        let lower = headers.to_ascii_lowercase();
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains(&format!("x-pulsar-event: {}", EventType::AlertCreated)));
        assert!(lower.contains(&format!("x-pulsar-delivery: {}", delivery.id)));

        // The signature verifies over the exact bytes received.
        let signature_line = headers
            .lines()
            .find(|l| l.to_ascii_lowercase().starts_with("x-pulsar-signature:"))
            .expect("signature header present");
        let signature = signature_line.split_once(':').unwrap().1.trim();
        assert!(verify(&endpoint.secret, &body, signature));

        let stored = DeliveryRepo::get(store.as_ref(), delivery.organization_id, delivery.id)
            .await
            .unwrap();
        assert_eq!(stored.state, DeliveryState::Success);
        assert_eq!(stored.last_response_status, Some(200));
        assert_eq!(stored.attempt_count, 1);
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn custom_headers_cannot_shadow_signature() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let org = OrgId::generate();
        let mut endpoint = WebhookEndpoint::new(org, "hook", &server.base_url, Utc::now());
        endpoint
            .custom_headers
            .insert("X-Custom-One".into(), "value1".into());
        endpoint
            .custom_headers
            .insert("X-Pulsar-Signature".into(), "sha256=forged".into());
        let secret = endpoint.secret.clone();
        EndpointRepo::create(store.as_ref(), endpoint.clone())
            .await
            .unwrap();
        let delivery = WebhookDelivery::queue(
            org,
            endpoint.id,
            EventType::AlertClosed,
            serde_json::json!({"event_type": "alert.closed"}),
            Utc::now(),
        );
        DeliveryRepo::create(store.as_ref(), delivery).await.unwrap();

        let server_handle =
            tokio::spawn(async move { server.respond_times(200, "{}", 1).await });
        worker(&store).tick(Utc::now()).await.unwrap();
        let requests = server_handle.await.unwrap();
        let (headers, body) = split_request(&requests[0]);

        assert!(headers.to_ascii_lowercase().contains("x-custom-one: value1"));
        let signature_lines: Vec<&str> = headers
            .lines()
            .filter(|l| l.to_ascii_lowercase().starts_with("x-pulsar-signature:"))
            .collect();
        assert_eq!(signature_lines.len(), 1, "exactly one signature header");
        let signature = signature_lines[0].split_once(':').unwrap().1.trim();
        assert_ne!(signature, "sha256=forged");
        assert!(verify(&secret, &body, signature));
    }

    #[tokio::test]
    async fn retry_schedule_follows_endpoint_budget() {
        // max_retries=2, retry_delay=60s: three 500s, then failed.
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let (_, delivery) = seed(&store, &server.base_url, 2, 60).await;
        let org = delivery.organization_id;
        let server_handle = tokio::spawn(async move {
            server.respond_times(500, r#"{"error":"boom"}"#, 3).await
        });
        let worker = worker(&store);

        let t0 = Utc::now();
        let stats = worker.tick(t0).await.unwrap();
        assert_eq!(stats.rescheduled, 1);
        let after_first = DeliveryRepo::get(store.as_ref(), org, delivery.id)
            .await
            .unwrap();
        assert_eq!(after_first.state, DeliveryState::Pending);
        assert_eq!(after_first.attempt_count, 1);
        assert_eq!(
            after_first.next_retry_at,
            Some(t0 + chrono::Duration::seconds(60))
        );
        assert_eq!(after_first.last_response_status, Some(500));
        assert!(after_first.last_error.as_deref().unwrap_or_default().contains("boom"));

        // Not due yet: the tick is a no-op.
        let idle = worker.tick(t0 + chrono::Duration::seconds(30)).await.unwrap();
        assert_eq!(idle.attempted, 0);

        let t1 = t0 + chrono::Duration::seconds(60);
        worker.tick(t1).await.unwrap();
        let after_second = DeliveryRepo::get(store.as_ref(), org, delivery.id)
            .await
            .unwrap();
        assert_eq!(after_second.state, DeliveryState::Pending);
        assert_eq!(after_second.attempt_count, 2);
        assert_eq!(
            after_second.next_retry_at,
            Some(t1 + chrono::Duration::seconds(60))
        );

        let t2 = t1 + chrono::Duration::seconds(60);
        let final_stats = worker.tick(t2).await.unwrap();
        assert_eq!(final_stats.failed, 1);
        let exhausted = DeliveryRepo::get(store.as_ref(), org, delivery.id)
            .await
            .unwrap();
        assert_eq!(exhausted.state, DeliveryState::Failed);
        assert_eq!(exhausted.attempt_count, 3);
        assert!(exhausted.next_retry_at.is_none());

        server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn transport_error_reschedules() {
        let store = Arc::new(MemoryStore::new());
        // Nothing listens on this port.
        let (_, delivery) = seed(&store, "http://127.0.0.1:1", 1, 30).await;
        let now = Utc::now();
        let stats = worker(&store).tick(now).await.unwrap();
        assert_eq!(stats.rescheduled, 1);
        let stored = DeliveryRepo::get(store.as_ref(), delivery.organization_id, delivery.id)
            .await
            .unwrap();
        assert_eq!(stored.state, DeliveryState::Pending);
        assert!(stored.last_response_status.is_none());
        assert!(stored.last_error.is_some());
    }

    #[tokio::test]
    async fn disabled_endpoint_fails_delivery() {
        let store = Arc::new(MemoryStore::new());
        let (mut endpoint, delivery) = seed(&store, "http://127.0.0.1:1", 1, 30).await;
        endpoint.enabled = false;
        EndpointRepo::update(store.as_ref(), endpoint).await.unwrap();
        let stats = worker(&store).tick(Utc::now()).await.unwrap();
        assert_eq!(stats.failed, 1);
        let stored = DeliveryRepo::get(store.as_ref(), delivery.organization_id, delivery.id)
            .await
            .unwrap();
        assert_eq!(stored.state, DeliveryState::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("endpoint disabled"));
    }

    #[test]
    fn protected_header_detection() {
        assert!(is_protected_header("content-type"));
        assert!(is_protected_header("X-PULSAR-SIGNATURE"));
        assert!(is_protected_header("x-pulsar-event"));
        assert!(is_protected_header("X-Pulsar-Delivery"));
        assert!(!is_protected_header("x-custom"));
    }

    #[test]
    fn truncation_caps_large_bodies() {
        let big = vec![b'a'; MAX_RESPONSE_BYTES + 100];
        assert_eq!(truncate_body(&big).len(), MAX_RESPONSE_BYTES);
        assert_eq!(truncate_body(b"small"), "small");
    }
}
