use crate::app::ports::{HttpClientPort, HttpMethod, HttpRequest, HttpResponse, TransportError};
use crate::constants::MAX_REDIRECTS;
use crate::security::url_safety;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

/// Production transport backed by a shared `reqwest::Client`.
///
/// Redirects are followed only while every hop passes the SSRF check, and
/// response bodies are read up to `max_body_bytes`.
pub struct ReqwestHttp {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestHttp {
    pub fn new(max_body_bytes: usize) -> Result<Self, TransportError> {
        let policy = reqwest::redirect::Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error(format!("more than {MAX_REDIRECTS} redirects"));
            }
            match url_safety::check(attempt.url()) {
                Ok(()) => attempt.follow(),
                Err(reason) => attempt.error(format!("unsafe redirect target: {reason}")),
            }
        });

        let client = reqwest::Client::builder()
            .redirect(policy)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self {
            client,
            max_body_bytes,
        })
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_redirect() {
        TransportError::RedirectBlocked(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let mut resp = builder.send().await.map_err(map_error)?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(map_error)? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(TransportError::BodyTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        debug!(status, bytes = body.len(), "HTTP response received");

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
