//! Recording HTTP transport for tests.
//!
//! Responses are matched by URL prefix, in the order they were registered.
//! Every request is recorded, and a request routed to a "hang" rule never
//! completes; when the caller drops it, the drop is recorded too.

use event_importer::app::ports::{HttpClientPort, HttpRequest, HttpResponse, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum Reply {
    Respond(HttpResponse),
    Fail(TransportError),
    Hang,
    Delay(Duration, HttpResponse),
}

#[derive(Default)]
pub struct MockHttpClient {
    rules: Mutex<Vec<(String, Reply)>>,
    requests: Mutex<Vec<HttpRequest>>,
    dropped_in_flight: Arc<AtomicUsize>,
}

/// Increments a counter if dropped before being disarmed.
struct InFlightGuard {
    counter: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.armed {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, prefix: &str, reply: Reply) {
        self.rules.lock().unwrap().push((prefix.to_string(), reply));
    }

    pub fn respond(&self, prefix: &str, status: u16, content_type: &str, body: impl Into<Vec<u8>>) {
        self.push(
            prefix,
            Reply::Respond(HttpResponse {
                status,
                content_type: Some(content_type.to_string()),
                body: body.into(),
            }),
        );
    }

    pub fn respond_json(&self, prefix: &str, status: u16, body: &serde_json::Value) {
        self.respond(prefix, status, "application/json; charset=utf-8", body.to_string());
    }

    pub fn respond_html(&self, prefix: &str, status: u16, html: &str) {
        self.respond(prefix, status, "text/html; charset=utf-8", html);
    }

    pub fn fail(&self, prefix: &str, error: TransportError) {
        self.push(prefix, Reply::Fail(error));
    }

    /// The request never completes.
    pub fn hang(&self, prefix: &str) {
        self.push(prefix, Reply::Hang);
    }

    pub fn respond_after(&self, prefix: &str, delay: Duration, response: HttpResponse) {
        self.push(prefix, Reply::Delay(delay, response));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests abandoned by the caller before they completed.
    pub fn dropped_in_flight(&self) -> usize {
        self.dropped_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClientPort for MockHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = {
            let rules = self.rules.lock().unwrap();
            rules
                .iter()
                .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
                .map(|(_, reply)| reply.clone())
        };
        self.requests.lock().unwrap().push(request.clone());

        let mut guard = InFlightGuard {
            counter: self.dropped_in_flight.clone(),
            armed: true,
        };

        let result = match reply {
            Some(Reply::Respond(resp)) => Ok(resp),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Delay(delay, resp)) => {
                tokio::time::sleep(delay).await;
                Ok(resp)
            }
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future never resolves")
            }
            None => Err(TransportError::Connect(format!(
                "no mock response registered for {}",
                request.url
            ))),
        };

        guard.armed = false;
        result
    }
}
