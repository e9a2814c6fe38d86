//! Synchronous request/response channel to the collecting service.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use pilotscope_core::config::PilotConfig;

use crate::directive::Endpoint;
use crate::error::TransportError;

pub trait Transport {
    /// Deliver `payload` and return the response body.
    fn round_trip(&mut self, endpoint: &Endpoint, payload: &str) -> Result<String, TransportError>;
}

/// JSON `POST` of the record through a blocking HTTP client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    path: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(cfg: &PilotConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.io_timeout())
            .no_proxy()
            .build()?;
        Ok(Self {
            path: cfg.http_path.clone(),
            client,
        })
    }

    fn url(&self, endpoint: &Endpoint) -> String {
        format!("http://{}:{}{}", endpoint.bare_host(), endpoint.port, self.path)
    }
}

impl Transport for HttpTransport {
    fn round_trip(&mut self, endpoint: &Endpoint, payload: &str) -> Result<String, TransportError> {
        let resp = self
            .client
            .post(self.url(endpoint))
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_owned())
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        debug!(status = status.as_u16(), bytes = body.len(), "collector response read");

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// One delivery captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub endpoint: Endpoint,
    pub payload: String,
}

/// In-process transport that records deliveries. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<Sent>>>,
    response: String,
    refuse: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body returned for every delivery.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// A transport whose every delivery fails after being recorded.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.log().len()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log().clone()
    }

    pub fn last_payload(&self) -> Option<String> {
        self.log().last().map(|s| s.payload.clone())
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<Sent>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn round_trip(&mut self, endpoint: &Endpoint, payload: &str) -> Result<String, TransportError> {
        self.log().push(Sent {
            endpoint: endpoint.clone(),
            payload: payload.to_string(),
        });
        if self.refuse {
            return Err(TransportError::Refused(endpoint.to_string()));
        }
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_transport_shares_log_between_clones() {
        let observer = MemoryTransport::new().with_response("ok");
        let mut sender = observer.clone();
        let endpoint = Endpoint::new("localhost", 8888);
        assert_eq!(sender.round_trip(&endpoint, "{}").unwrap(), "ok");
        assert_eq!(observer.calls(), 1);
        assert_eq!(observer.last_payload().as_deref(), Some("{}"));
        assert_eq!(observer.sent()[0].endpoint, endpoint);
    }

    #[test]
    fn refusing_transport_still_records() {
        let mut t = MemoryTransport::refusing();
        let err = t
            .round_trip(&Endpoint::new("localhost", 1), "{}")
            .unwrap_err();
        assert!(matches!(err, TransportError::Refused(_)));
        assert_eq!(t.calls(), 1);
    }
}
